// [tests/mirror/libs/infra/cache_client/memo_discipline.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE LA DISCIPLINA DE MEMOIZACIÓN
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: UNA EJECUCIÓN POR (FINGERPRINT, VERSION, QUERY)
 * =================================================================
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serenity_cache_daemon::CacheDaemon;
use serenity_infra_cache_client::memo::{memo, memo_many, MemoSpec};
use serenity_infra_cache_client::CacheClient;

async fn boot_daemon(socket_path: &std::path::Path) -> tokio::task::JoinHandle<()> {
    let daemon = CacheDaemon::new(socket_path);
    let handle = tokio::spawn(async move {
        let _ = daemon.serve_forever().await;
    });

    // esperar a que el socket exista
    for _ in 0..50 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    handle
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_memo_executes_once_per_key() {
    let workdir = tempfile::tempdir().expect("tempdir");
    let socket_path = workdir.path().join("cache.sock");
    let server = boot_daemon(&socket_path).await;

    let client = CacheClient::new(&socket_path);
    let executions = Arc::new(AtomicUsize::new(0));

    let compute = |executions: Arc<AtomicUsize>| {
        move || {
            let executions = Arc::clone(&executions);
            async move {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok::<Vec<i64>, std::convert::Infallible>(vec![1, 2, 3])
            }
        }
    };

    let spec = || MemoSpec::new("serenity_tests::window", "v-hash-1").ttl(3_600);

    // 1. primera llamada: computa y cachea
    let first = memo(&client, &("crawler", 7i64), spec(), compute(Arc::clone(&executions)))
        .await
        .unwrap();
    assert_eq!(first, vec![1, 2, 3]);
    assert_eq!(executions.load(Ordering::SeqCst), 1);

    // 2. misma (fingerprint, version, query): hit, sin recomputar
    let second = memo(&client, &("crawler", 7i64), spec(), compute(Arc::clone(&executions)))
        .await
        .unwrap();
    assert_eq!(second, vec![1, 2, 3]);
    assert_eq!(executions.load(Ordering::SeqCst), 1, "memo recomputed on a hit");

    // 3. version distinta = clave distinta: recomputa
    let other_spec = MemoSpec::new("serenity_tests::window", "v-hash-2").ttl(3_600);
    memo(&client, &("crawler", 7i64), other_spec, compute(Arc::clone(&executions)))
        .await
        .unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 2);

    // 4. update fuerza recomputar y sobreescribe la misma clave
    let update_spec = MemoSpec::new("serenity_tests::window", "v-hash-1")
        .ttl(3_600)
        .update(true);
    memo(&client, &("crawler", 7i64), update_spec, compute(Arc::clone(&executions)))
        .await
        .unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 3);

    server.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_memo_many_mixes_hits_and_misses() {
    let workdir = tempfile::tempdir().expect("tempdir");
    let socket_path = workdir.path().join("cache.sock");
    let server = boot_daemon(&socket_path).await;

    let client = CacheClient::new(&socket_path);
    let executions = Arc::new(AtomicUsize::new(0));

    // precalentar solo la query 2
    let warm_exec = Arc::clone(&executions);
    memo(
        &client,
        &2i64,
        MemoSpec::new("serenity_tests::batch", "v1").ttl(3_600),
        || {
            let executions = Arc::clone(&warm_exec);
            async move {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok::<i64, std::convert::Infallible>(20)
            }
        },
    )
    .await
    .unwrap();
    assert_eq!(executions.load(Ordering::SeqCst), 1);

    // batch 1..=3: el 2 acierta, el 1 y el 3 se computan
    let batch_exec = Arc::clone(&executions);
    let mut pairs = memo_many(
        &client,
        vec![1i64, 2, 3],
        MemoSpec::new("serenity_tests::batch", "v1").ttl(3_600),
        move |query| {
            let executions = Arc::clone(&batch_exec);
            let query = *query;
            async move {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok::<i64, std::convert::Infallible>(query * 10)
            }
        },
    )
    .await
    .unwrap();

    // el orden es indefinido: normalizamos para la aserción
    pairs.sort();
    assert_eq!(pairs, vec![(1, 10), (2, 20), (3, 30)]);
    assert_eq!(
        executions.load(Ordering::SeqCst),
        3,
        "memo_many must compute exactly the misses"
    );

    server.abort();
}
