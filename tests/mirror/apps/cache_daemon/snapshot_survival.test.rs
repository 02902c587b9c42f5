// [tests/mirror/apps/cache_daemon/snapshot_survival.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE SUPERVIVENCIA A CRASH
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: DUMP ATÓMICO + RESTORE SELECTIVO + BORRADO DEL DUMP
 * =================================================================
 */

use serde_bytes::ByteBuf;

use serenity_cache_daemon::snapshot::{try_restore_dump, write_dump};
use serenity_cache_daemon::CacheState;
use serenity_infra_cache_protocol::{CacheRequest, CacheResponse};

fn set(state: &mut CacheState, key: &str, payload: &[u8], ttl_sec: u64, now_ms: u64) {
    let verdict = state.handle(
        CacheRequest::Set {
            key: key.into(),
            payload: ByteBuf::from(payload.to_vec()),
            ttl_sec: Some(ttl_sec),
        },
        now_ms,
    );
    assert!(matches!(verdict, CacheResponse::Stored { stored: true, .. }));
}

#[test]
fn certify_dump_restore_cycle() {
    println!("\n💾 [INICIO]: Auditoría de dump/restore del cache...");
    let workdir = tempfile::tempdir().expect("tempdir");
    let dump_path = workdir.path().join("cache.dump");

    // 1. estado con una entrada longeva y una a punto de morir
    let mut original = CacheState::new();
    set(&mut original, "long-lived", b"survivor", 3_600, 0);
    set(&mut original, "short-lived", b"doomed", 1, 0);

    // lease vivo: JAMÁS debe viajar en el dump
    let grant = original.handle(
        CacheRequest::LockTry {
            key: "prep:geo:lock".into(),
            ttl_ms: 600_000,
            owner: "worker".into(),
        },
        0,
    );
    assert!(matches!(grant, CacheResponse::LockAcquire { acquired: true, .. }));

    write_dump(&original, &dump_path, 0).expect("dump write");
    assert!(dump_path.exists());

    // 2. "reinicio" pasado el TTL de la entrada corta
    let mut restored = CacheState::new();
    try_restore_dump(&mut restored, &dump_path, 5_000);

    // el dump se borra incondicionalmente tras el restore
    assert!(!dump_path.exists(), "dump file must be deleted after restore");

    // la longeva sobrevive, la expirada no se levanta
    assert!(matches!(
        restored.handle(
            CacheRequest::Get { key: "long-lived".into(), ttl_sec: Some(3_600) },
            5_100
        ),
        CacheResponse::Value { hit: true, .. }
    ));
    assert!(matches!(
        restored.handle(
            CacheRequest::Get { key: "short-lived".into(), ttl_sec: Some(3_600) },
            5_100
        ),
        CacheResponse::Value { hit: false, .. }
    ));

    // los leases no se restauran nunca
    assert_eq!(restored.locks_held(), 0, "leases must never survive a restart");

    println!("🏁 [INFORME]: ciclo dump/restore certificado.");
}

#[test]
fn certify_unreadable_dump_is_discarded_and_deleted() {
    let workdir = tempfile::tempdir().expect("tempdir");
    let dump_path = workdir.path().join("cache.dump");

    std::fs::write(&dump_path, b"this is not a msgpack dump").expect("write garbage");

    let mut state = CacheState::new();
    try_restore_dump(&mut state, &dump_path, 0);

    assert_eq!(state.items(), 0);
    assert!(!dump_path.exists(), "even an unreadable dump must be deleted");
}

#[test]
fn certify_missing_dump_is_a_clean_start() {
    let workdir = tempfile::tempdir().expect("tempdir");
    let dump_path = workdir.path().join("cache.dump");

    let mut state = CacheState::new();
    try_restore_dump(&mut state, &dump_path, 0);
    assert_eq!(state.items(), 0);
}
