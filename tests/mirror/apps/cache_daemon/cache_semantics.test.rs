// [tests/mirror/apps/cache_daemon/cache_semantics.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE SEMÁNTICA DE CACHE
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: SET/GET, SLIDING TTL, TOPE DE VALOR Y EVICCIÓN AL 60%
 *
 * El kernel de estado recibe now_ms explícito: toda la semántica temporal
 * se certifica sin dormir ni depender del reloj físico.
 * =================================================================
 */

use serde_bytes::ByteBuf;

use serenity_cache_daemon::CacheState;
use serenity_infra_cache_protocol::{CacheRequest, CacheResponse, GC_TARGET_RATIO, MAX_CACHE_BYTES, MAX_VALUE_BYTES};

fn set(state: &mut CacheState, key: &str, payload: Vec<u8>, ttl_sec: u64, now_ms: u64) -> CacheResponse {
    state.handle(
        CacheRequest::Set {
            key: key.into(),
            payload: ByteBuf::from(payload),
            ttl_sec: Some(ttl_sec),
        },
        now_ms,
    )
}

fn get(state: &mut CacheState, key: &str, ttl_sec: u64, now_ms: u64) -> CacheResponse {
    state.handle(
        CacheRequest::Get {
            key: key.into(),
            ttl_sec: Some(ttl_sec),
        },
        now_ms,
    )
}

#[test]
fn certify_set_get_round_trip() {
    let mut state = CacheState::new();

    let stored = set(&mut state, "k1", b"payload-bytes".to_vec(), 60, 1_000);
    assert!(matches!(stored, CacheResponse::Stored { stored: true, .. }));

    match get(&mut state, "k1", 60, 1_500) {
        CacheResponse::Value { hit: true, payload: Some(payload) } => {
            assert_eq!(payload.as_ref(), b"payload-bytes");
        }
        other => panic!("expected hit, got {other:?}"),
    }

    // clave ausente: miss limpio
    assert!(matches!(
        get(&mut state, "missing", 60, 1_500),
        CacheResponse::Value { hit: false, .. }
    ));
}

#[test]
fn certify_sliding_ttl_on_hit() {
    let mut state = CacheState::new();
    set(&mut state, "k1", vec![7u8; 16], 10, 0);

    // a los 8s el GET acierta Y desliza la expiración a now+10s
    assert!(matches!(
        get(&mut state, "k1", 10, 8_000),
        CacheResponse::Value { hit: true, .. }
    ));

    // a los 16s (habría muerto a los 10s sin sliding) sigue vivo
    assert!(matches!(
        get(&mut state, "k1", 10, 16_000),
        CacheResponse::Value { hit: true, .. }
    ));

    // sin más accesos, a los 30s ya expiró
    assert!(matches!(
        get(&mut state, "k1", 10, 30_000),
        CacheResponse::Value { hit: false, .. }
    ));
}

#[test]
fn certify_value_size_cap() {
    let mut state = CacheState::new();

    let verdict = set(&mut state, "big", vec![0u8; MAX_VALUE_BYTES + 1], 60, 0);
    match verdict {
        CacheResponse::Stored { stored, reason } => {
            assert!(!stored);
            assert_eq!(reason.as_deref(), Some("too_big"));
        }
        other => panic!("unexpected reply {other:?}"),
    }

    // el payload vacío también se rechaza
    assert!(matches!(
        set(&mut state, "empty", Vec::new(), 60, 0),
        CacheResponse::Stored { stored: false, .. }
    ));

    // exactamente en el tope: aceptado
    assert!(matches!(
        set(&mut state, "edge", vec![0u8; MAX_VALUE_BYTES], 60, 0),
        CacheResponse::Stored { stored: true, .. }
    ));
}

#[test]
fn certify_eviction_drains_to_sixty_percent_biggest_first() {
    let mut state = CacheState::new();

    // pequeño y caliente: debe sobrevivir a la purga
    set(&mut state, "small-hot", vec![1u8; 64], 3_600, 0);

    // exactamente el presupuesto en valores grandes: el último SET cruza
    // el tope (presupuesto + 64 bytes) y dispara la evicción
    let big = MAX_VALUE_BYTES;
    let exact_budget_count = MAX_CACHE_BYTES as usize / big;
    for index in 0..exact_budget_count {
        set(&mut state, &format!("big-{index}"), vec![2u8; big], 3_600, 10 + index as u64);
    }

    let target = (MAX_CACHE_BYTES as f64 * GC_TARGET_RATIO) as u64;
    assert!(
        state.total_bytes() <= MAX_CACHE_BYTES,
        "eviction left total above the budget"
    );
    assert!(
        state.total_bytes() <= target,
        "eviction must drain to the 60% target, got {}",
        state.total_bytes()
    );

    // el pequeño sobrevive: los grandes caen primero
    assert!(matches!(
        get(&mut state, "small-hot", 3_600, 50_000),
        CacheResponse::Value { hit: true, .. }
    ));
}

#[test]
fn certify_bulk_variants() {
    let mut state = CacheState::new();

    let stored = state.handle(
        CacheRequest::SetMany {
            items: vec![
                ("a".into(), ByteBuf::from(vec![1u8; 8])),
                ("b".into(), ByteBuf::from(vec![2u8; 8])),
                ("oversize".into(), ByteBuf::from(vec![3u8; MAX_VALUE_BYTES + 1])),
            ],
            ttl_sec: Some(60),
        },
        0,
    );
    assert!(matches!(stored, CacheResponse::StoredMany { stored: 2 }));

    match state.handle(
        CacheRequest::MGet {
            keys: vec!["a".into(), "missing".into(), "b".into()],
            ttl_sec: Some(60),
        },
        100,
    ) {
        CacheResponse::Values { payloads } => {
            assert_eq!(payloads.len(), 3);
            assert!(payloads[0].is_some());
            assert!(payloads[1].is_none());
            assert!(payloads[2].is_some());
        }
        other => panic!("unexpected reply {other:?}"),
    }

    let removed = state.handle(
        CacheRequest::Del {
            keys: vec!["a".into(), "missing".into()],
        },
        200,
    );
    assert!(matches!(removed, CacheResponse::Deleted { removed: 1 }));
}
