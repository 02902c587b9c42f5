// [tests/mirror/apps/cache_daemon/lease_protocol.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL PROTOCOLO DE LEASES
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: TRY/RENEW/RELEASE CON TOKENS Y EXPIRACIÓN
 * =================================================================
 */

use serenity_cache_daemon::CacheState;
use serenity_infra_cache_protocol::{CacheRequest, CacheResponse};

fn lock_try(state: &mut CacheState, key: &str, ttl_ms: u64, owner: &str, now_ms: u64) -> CacheResponse {
    state.handle(
        CacheRequest::LockTry {
            key: key.into(),
            ttl_ms,
            owner: owner.into(),
        },
        now_ms,
    )
}

#[test]
fn certify_lease_lifecycle() {
    let mut state = CacheState::new();

    // 1. adquisición sobre clave libre
    let token = match lock_try(&mut state, "prep:geo:lock", 5_000, "worker-a", 0) {
        CacheResponse::LockAcquire { acquired: true, token: Some(token), .. } => token,
        other => panic!("expected acquisition, got {other:?}"),
    };

    // 2. intento concurrente antes del TTL: denegado, con holder visible
    match lock_try(&mut state, "prep:geo:lock", 5_000, "worker-b", 1_000) {
        CacheResponse::LockAcquire { acquired: false, owner: Some(owner), .. } => {
            assert_eq!(owner, "worker-a");
        }
        other => panic!("expected denial, got {other:?}"),
    }

    // 3. release con token ajeno: false
    let foreign_release = state.handle(
        CacheRequest::LockRelease {
            key: "prep:geo:lock".into(),
            token: "not-the-token".into(),
        },
        2_000,
    );
    assert!(matches!(
        foreign_release,
        CacheResponse::LockReleased { released: false, .. }
    ));

    // 4. renew con el token correcto extiende el lease
    let renewed = state.handle(
        CacheRequest::LockRenew {
            key: "prep:geo:lock".into(),
            ttl_ms: 5_000,
            token: token.clone(),
        },
        4_000,
    );
    assert!(matches!(renewed, CacheResponse::LockRenewed { renewed: true, .. }));

    // sin el renew habría muerto en t=5000; sigue tomado en t=8000
    assert!(matches!(
        lock_try(&mut state, "prep:geo:lock", 5_000, "worker-b", 8_000),
        CacheResponse::LockAcquire { acquired: false, .. }
    ));

    // 5. release con el token correcto libera
    let released = state.handle(
        CacheRequest::LockRelease {
            key: "prep:geo:lock".into(),
            token,
        },
        8_500,
    );
    assert!(matches!(released, CacheResponse::LockReleased { released: true, .. }));

    // 6. la clave vuelve a estar disponible
    assert!(matches!(
        lock_try(&mut state, "prep:geo:lock", 5_000, "worker-b", 8_600),
        CacheResponse::LockAcquire { acquired: true, .. }
    ));
}

#[test]
fn certify_expired_lease_is_reacquirable() {
    let mut state = CacheState::new();

    assert!(matches!(
        lock_try(&mut state, "prep:contacts:eid:1:42", 900_000, "worker-a", 0),
        CacheResponse::LockAcquire { acquired: true, .. }
    ));

    // pasado el TTL, otro worker la toma
    assert!(matches!(
        lock_try(&mut state, "prep:contacts:eid:1:42", 900_000, "worker-b", 900_001),
        CacheResponse::LockAcquire { acquired: true, .. }
    ));

    // y el renew del lease muerto reporta not_held
    let renewed = state.handle(
        CacheRequest::LockRenew {
            key: "prep:contacts:eid:1:99".into(),
            ttl_ms: 1_000,
            token: "whatever".into(),
        },
        0,
    );
    match renewed {
        CacheResponse::LockRenewed { renewed: false, reason } => {
            assert_eq!(reason.as_deref(), Some("not_held"));
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[test]
fn certify_lock_status_reports_holder() {
    let mut state = CacheState::new();

    lock_try(&mut state, "cbq:lock", 60_000, "crawler-1", 0);

    match state.handle(CacheRequest::LockStatus { key: "cbq:lock".into() }, 1_000) {
        CacheResponse::LockStatus { held: true, owner: Some(owner), .. } => {
            assert_eq!(owner, "crawler-1");
        }
        other => panic!("unexpected reply {other:?}"),
    }

    match state.handle(CacheRequest::LockStatus { key: "cbq:lock".into() }, 61_000) {
        CacheResponse::LockStatus { held: false, .. } => {}
        other => panic!("expired lease still reported held: {other:?}"),
    }
}

#[test]
fn certify_malformed_lock_requests_reply_errors() {
    let mut state = CacheState::new();

    assert!(matches!(
        state.handle(
            CacheRequest::LockTry { key: "".into(), ttl_ms: 1_000, owner: "x".into() },
            0
        ),
        CacheResponse::Error { .. }
    ));

    assert!(matches!(
        state.handle(
            CacheRequest::LockTry { key: "k".into(), ttl_ms: 0, owner: "x".into() },
            0
        ),
        CacheResponse::Error { .. }
    ));

    assert!(matches!(
        state.handle(
            CacheRequest::LockTry { key: "k".into(), ttl_ms: 1_000, owner: "".into() },
            0
        ),
        CacheResponse::Error { .. }
    ));
}
