// [tests/mirror/apps/cache_daemon/socket_roundtrip.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL CICLO SOCKET COMPLETO
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: DAEMON REAL SOBRE SOCKET LOCAL + FRAMES EN SECUENCIA
 * =================================================================
 */

use std::time::Duration;

use serde_bytes::ByteBuf;
use tokio::net::UnixStream;

use serenity_cache_daemon::CacheDaemon;
use serenity_infra_cache_protocol::codec;
use serenity_infra_cache_protocol::{CacheRequest, CacheResponse};

async fn connect_with_retry(path: &std::path::Path) -> UnixStream {
    for _ in 0..50 {
        if let Ok(stream) = UnixStream::connect(path).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("daemon socket never came up at {path:?}");
}

async fn call(stream: &mut UnixStream, request: &CacheRequest) -> CacheResponse {
    codec::write_message(stream, request).await.expect("frame write");
    codec::read_message(stream).await.expect("frame read")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_live_daemon_round_trip() {
    println!("\n🗄️  [INICIO]: Auditoría extremo a extremo del daemon...");
    let workdir = tempfile::tempdir().expect("tempdir");
    let socket_path = workdir.path().join("cache.sock");

    let daemon = CacheDaemon::new(&socket_path);
    let server = tokio::spawn(async move {
        let _ = daemon.serve_forever().await;
    });

    let mut stream = connect_with_retry(&socket_path).await;

    // 1. SET + GET sobre la MISMA conexión (frames en secuencia)
    let stored = call(
        &mut stream,
        &CacheRequest::Set {
            key: "cbq:list".into(),
            payload: ByteBuf::from(b"queue-bytes".to_vec()),
            ttl_sec: Some(3_600),
        },
    )
    .await;
    assert!(matches!(stored, CacheResponse::Stored { stored: true, .. }));

    match call(
        &mut stream,
        &CacheRequest::Get { key: "cbq:list".into(), ttl_sec: Some(3_600) },
    )
    .await
    {
        CacheResponse::Value { hit: true, payload: Some(payload) } => {
            assert_eq!(payload.as_ref(), b"queue-bytes");
        }
        other => panic!("expected hit, got {other:?}"),
    }

    // 2. lease desde una SEGUNDA conexión: el estado es compartido
    let mut second_stream = connect_with_retry(&socket_path).await;
    let grant = call(
        &mut second_stream,
        &CacheRequest::LockTry {
            key: "cbq:lock".into(),
            ttl_ms: 30_000,
            owner: "conn-2".into(),
        },
    )
    .await;
    let token = match grant {
        CacheResponse::LockAcquire { acquired: true, token: Some(token), .. } => token,
        other => panic!("expected acquisition, got {other:?}"),
    };

    // la primera conexión ve el lock tomado
    assert!(matches!(
        call(
            &mut stream,
            &CacheRequest::LockTry {
                key: "cbq:lock".into(),
                ttl_ms: 30_000,
                owner: "conn-1".into(),
            },
        )
        .await,
        CacheResponse::LockAcquire { acquired: false, .. }
    ));

    // 3. release cruzado con el token legítimo
    assert!(matches!(
        call(
            &mut stream,
            &CacheRequest::LockRelease { key: "cbq:lock".into(), token },
        )
        .await,
        CacheResponse::LockReleased { released: true, .. }
    ));

    // 4. STATS refleja el estado vivo
    match call(&mut stream, &CacheRequest::Stats).await {
        CacheResponse::Stats { items, locks, total_bytes, .. } => {
            assert_eq!(items, 1);
            assert_eq!(locks, 0);
            assert!(total_bytes > 0);
        }
        other => panic!("unexpected reply {other:?}"),
    }

    server.abort();
    println!("🏁 [INFORME]: ciclo socket certificado.");
}
