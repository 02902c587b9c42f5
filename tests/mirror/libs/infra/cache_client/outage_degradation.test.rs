// [tests/mirror/libs/infra/cache_client/outage_degradation.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE DEGRADACIÓN POR CAÍDA
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: EL CACHE CAÍDO DEGRADA A NO-OP SIN BLOQUEAR NADA
 * =================================================================
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serenity_infra_cache_client::memo::{memo, MemoSpec};
use serenity_infra_cache_client::CacheClient;

fn dead_client() -> CacheClient {
    // ruta sin daemon: toda conexión falla con ECONNREFUSED/ENOENT
    CacheClient::new("/tmp/serenity-no-such-daemon.sock")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_calls_degrade_to_absent() {
    let client = dead_client();

    let started = Instant::now();
    assert!(client.get("any-key", 60).await.is_none());
    assert!(!client.set("any-key", vec![1, 2, 3], 60).await);
    assert_eq!(client.get_many(&["a".into(), "b".into()], 60).await, vec![None, None]);
    assert!(client.lock_try("lock", Duration::from_secs(60), "w").await.is_none());
    assert!(!client.lock_release("lock", "token").await);

    // ninguna de estas llamadas puede colgarse: cada una corta por
    // circuito o por el timeout de 1s
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "degraded calls must be fast"
    );

    // el circuito queda abierto tras un fallo de conexión (el poke
    // reabre la ventana si el back-off de 500ms ya venció)
    let _ = client.get("poke", 60).await;
    assert!(client.is_down(), "circuit must open after a connection fault");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_memo_computes_every_call_under_outage() {
    let client = dead_client();
    let executions = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let executions_inner = Arc::clone(&executions);
        let value = memo(
            &client,
            &("query", 1i64),
            MemoSpec::new("serenity_tests::outage", "v1").ttl(60),
            || {
                let executions = Arc::clone(&executions_inner);
                async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    Ok::<i64, std::convert::Infallible>(42)
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(value, 42);
    }

    // sin daemon no hay hits: el fallback computa en CADA llamada
    assert_eq!(
        executions.load(Ordering::SeqCst),
        3,
        "memo must fall back to computing under cache outage"
    );
}
