// [tests/mirror/libs/core/scheduler/ticker_semantics.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL TICK SCHEDULER
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: SINGLETON, EXCLUSIÓN HEAVY, TIMEOUT Y CADENCIA
 * =================================================================
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serenity_core_scheduler::{TaskFactory, TaskOutcome, TaskSpec, Worker};

fn counting_factory(counter: Arc<AtomicUsize>) -> TaskFactory {
    Arc::new(move || {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::Value::Null)
        })
    })
}

fn pending_factory() -> TaskFactory {
    Arc::new(|| Box::pin(std::future::pending::<TaskOutcome>()))
}

#[tokio::test(start_paused = true)]
async fn certify_singleton_and_heavy_exclusion() {
    let light_runs = Arc::new(AtomicUsize::new(0));

    let mut worker = Worker::new("cert", 0.5, 50);
    worker
        .register(
            TaskSpec::new("heavy_wall", 1).heavy(true).priority(1),
            pending_factory(),
        )
        .unwrap();
    worker
        .register(
            TaskSpec::new("light", 1).priority(50),
            counting_factory(Arc::clone(&light_runs)),
        )
        .unwrap();

    // el heavy arranca solo y bloquea todo lo demás mientras viva
    worker.run_cycle().await;
    assert!(worker.heavy_is_running());
    assert_eq!(worker.running_count(), 1);

    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(2)).await;
        worker.run_cycle().await;
    }

    assert_eq!(
        light_runs.load(Ordering::SeqCst),
        0,
        "heavy exclusion violated: a task started under a live heavy run"
    );
    assert_eq!(worker.running_count(), 1, "singleton heavy duplicated");
}

#[tokio::test(start_paused = true)]
async fn certify_timeout_kill_and_reschedule() {
    let mut worker = Worker::new("cert", 0.5, 50);
    worker
        .register(TaskSpec::new("stuck", 2).timeout_sec(3), pending_factory())
        .unwrap();

    worker.run_cycle().await;
    assert_eq!(worker.running_count(), 1);

    // pasa el deadline: terminate + hard-kill + reap
    tokio::time::advance(Duration::from_secs(4)).await;
    worker.run_cycle().await;
    assert_eq!(worker.running_count(), 0, "overdue run was not reaped");

    // la tarea sigue registrada y vuelve a arrancar al vencer la cadencia
    tokio::time::advance(Duration::from_secs(3)).await;
    worker.run_cycle().await;
    assert_eq!(worker.running_count(), 1, "killed task lost its registration");
}

#[tokio::test(start_paused = true)]
async fn certify_cadence_after_completion() {
    let runs = Arc::new(AtomicUsize::new(0));

    let mut worker = Worker::new("cert", 0.5, 50);
    worker
        .register(TaskSpec::new("pulse", 10), counting_factory(Arc::clone(&runs)))
        .unwrap();

    // primer arranque inmediato
    worker.run_cycle().await;
    tokio::task::yield_now().await;
    worker.run_cycle().await; // reap + re-agenda

    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // antes de vencer la cadencia NO se repite
    tokio::time::advance(Duration::from_secs(5)).await;
    worker.run_cycle().await;
    tokio::task::yield_now().await;
    assert_eq!(runs.load(Ordering::SeqCst), 1, "task ran before its cadence");

    // vencida la cadencia, corre de nuevo
    tokio::time::advance(Duration::from_secs(6)).await;
    worker.run_cycle().await;
    tokio::task::yield_now().await;
    worker.run_cycle().await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}
