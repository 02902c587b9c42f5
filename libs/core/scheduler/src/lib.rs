// [libs/core/scheduler/src/lib.rs]
/*!
 * =================================================================
 * APARATO: TICK SCHEDULER
 * CLASIFICACIÓN: CORE RUNTIME (ESTRATO L2)
 * RESPONSABILIDAD: ORQUESTACIÓN DE TAREAS NOMBRADAS CON CADENCIA PROPIA
 *
 * Semántica del bucle (cada tick, por este orden):
 *   1. reap: recolectar runs terminados y re-agendar.
 *   2. timeouts: abortar runs vencidos (gracia 2s) y SIEMPRE esperar
 *      su JoinHandle para no filtrar recursos.
 *   3. starts: arrancar tareas vencidas en orden (priority, name) bajo
 *      el cupo global, con singleton por nombre y exclusión heavy total.
 *
 * Un error de tarea jamás quita su registro; una excepción del propio
 * bucle se registra y el ticker no muere nunca.
 * =================================================================
 */

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Resultado de un run: payload estructurado opcional para el log.
pub type TaskOutcome = anyhow::Result<serde_json::Value>;

type TaskFuture = Pin<Box<dyn Future<Output = TaskOutcome> + Send>>;

/// Fábrica del cuerpo de la tarea: una invocación por run.
pub type TaskFactory = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Gracia entre la señal de aborto y el kill definitivo del reap.
const KILL_GRACE: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("[L2_SCHED_FAULT]: TASK_NAME_EMPTY")]
    EmptyName,

    #[error("[L2_SCHED_FAULT]: TASK_ALREADY_REGISTERED -> {0}")]
    DuplicateName(String),

    #[error("[L2_SCHED_FAULT]: BAD_CADENCE -> every_sec must be > 0")]
    BadCadence,
}

/// Parámetros de registro de una tarea.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub every_sec: u64,
    pub timeout_sec: Option<u64>,
    pub singleton: bool,
    pub heavy: bool,
    /// Menor = arranca antes dentro del mismo tick.
    pub priority: i32,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, every_sec: u64) -> Self {
        Self {
            name: name.into(),
            every_sec,
            timeout_sec: None,
            singleton: true,
            heavy: false,
            priority: 50,
        }
    }

    pub fn timeout_sec(mut self, timeout_sec: u64) -> Self {
        self.timeout_sec = Some(timeout_sec);
        self
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    pub fn heavy(mut self, heavy: bool) -> Self {
        self.heavy = heavy;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

struct Registration {
    spec: TaskSpec,
    factory: TaskFactory,
}

struct RunningTask {
    task_name: String,
    handle: JoinHandle<TaskOutcome>,
    started_at: Instant,
    deadline_at: Option<Instant>,
}

pub struct Worker {
    worker_name: String,
    tick: Duration,
    max_parallel: usize,

    registry: HashMap<String, Registration>,
    next_run_at: HashMap<String, Instant>,
    running: HashMap<String, RunningTask>,
    heavy_running_name: Option<String>,
    run_sequence: u64,

    stop_flag: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(worker_name: impl Into<String>, tick_sec: f64, max_parallel: usize) -> Self {
        Self {
            worker_name: worker_name.into(),
            tick: Duration::from_secs_f64(tick_sec.max(0.05)),
            max_parallel,
            registry: HashMap::new(),
            next_run_at: HashMap::new(),
            running: HashMap::new(),
            heavy_running_name: None,
            run_sequence: 0,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bandera compartida de parada (para señales del proceso).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_flag)
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn heavy_is_running(&self) -> bool {
        self.heavy_running_name.is_some()
    }

    pub fn register(&mut self, spec: TaskSpec, factory: TaskFactory) -> Result<(), SchedulerError> {
        if spec.name.is_empty() {
            return Err(SchedulerError::EmptyName);
        }
        if self.registry.contains_key(&spec.name) {
            return Err(SchedulerError::DuplicateName(spec.name));
        }
        if spec.every_sec == 0 {
            return Err(SchedulerError::BadCadence);
        }

        info!(
            "🗓️  [SCHED_REGISTER]: worker={} task={} every={}s timeout={:?} singleton={} heavy={} prio={}",
            self.worker_name, spec.name, spec.every_sec, spec.timeout_sec, spec.singleton, spec.heavy, spec.priority
        );

        // arrancable de inmediato
        self.next_run_at.insert(spec.name.clone(), Instant::now());
        self.registry.insert(spec.name.clone(), Registration { spec, factory });
        Ok(())
    }

    /// Bucle eterno del ticker. El ticker no muere nunca: cualquier fallo
    /// de ciclo queda registrado y el siguiente tick continúa.
    pub async fn run_forever(&mut self) {
        info!(
            "🗓️  [SCHED_START]: worker={} tasks={} tick={:?} max_parallel={}",
            self.worker_name,
            self.registry.len(),
            self.tick,
            self.max_parallel
        );

        while !self.stop_flag.load(Ordering::Relaxed) {
            self.run_cycle().await;
            tokio::time::sleep(self.tick).await;
        }

        info!("🗓️  [SCHED_STOP]: worker={}", self.worker_name);
    }

    /// Un paso del ticker: reap -> timeouts -> starts.
    pub async fn run_cycle(&mut self) {
        self.collect_finished().await;
        self.kill_timeouts().await;
        self.schedule_starts();
    }

    async fn collect_finished(&mut self) {
        let finished_keys: Vec<String> = self
            .running
            .iter()
            .filter(|(_, run)| run.handle.is_finished())
            .map(|(key, _)| key.clone())
            .collect();

        for key in finished_keys {
            let Some(run) = self.running.remove(&key) else { continue };
            let duration_ms = run.started_at.elapsed().as_millis() as u64;
            let task_name = run.task_name.clone();

            match run.handle.await {
                Ok(Ok(result)) => {
                    info!(
                        "🗓️  [SCHED_OK]: worker={} task={} duration_ms={} result={}",
                        self.worker_name, task_name, duration_ms, result
                    );
                }
                Ok(Err(task_fault)) => {
                    warn!(
                        "⚠️  [SCHED_EXCEPTION]: worker={} task={} duration_ms={} error={:#}",
                        self.worker_name, task_name, duration_ms, task_fault
                    );
                }
                Err(join_fault) if join_fault.is_panic() => {
                    error!(
                        "🔥 [SCHED_PANIC]: worker={} task={} duration_ms={}",
                        self.worker_name, task_name, duration_ms
                    );
                }
                Err(_cancelled) => {
                    info!(
                        "🗓️  [SCHED_ENDED]: worker={} task={} duration_ms={} (aborted)",
                        self.worker_name, task_name, duration_ms
                    );
                }
            }

            self.reschedule(&task_name);
            if self.heavy_running_name.as_deref() == Some(task_name.as_str()) {
                self.heavy_running_name = None;
            }
        }
    }

    async fn kill_timeouts(&mut self) {
        let now = Instant::now();
        let overdue_keys: Vec<String> = self
            .running
            .iter()
            .filter(|(_, run)| {
                matches!(run.deadline_at, Some(deadline) if now > deadline) && !run.handle.is_finished()
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in overdue_keys {
            let Some(mut run) = self.running.remove(&key) else { continue };
            let task_name = run.task_name.clone();

            warn!(
                "⏱️  [SCHED_TIMEOUT]: worker={} task={} -> terminate",
                self.worker_name, task_name
            );

            // señal de terminación; gracia; luego el run ya está muerto o
            // quedó colgado en código bloqueante (nada más que hacer).
            run.handle.abort();
            if tokio::time::timeout(KILL_GRACE, &mut run.handle).await.is_err() {
                error!(
                    "💀 [SCHED_HARD_KILL]: worker={} task={} did not die within grace",
                    self.worker_name, task_name
                );
            }

            self.reschedule(&task_name);
            if self.heavy_running_name.as_deref() == Some(task_name.as_str()) {
                self.heavy_running_name = None;
            }
        }
    }

    fn reschedule(&mut self, task_name: &str) {
        if let Some(registration) = self.registry.get(task_name) {
            self.next_run_at.insert(
                task_name.to_string(),
                Instant::now() + Duration::from_secs(registration.spec.every_sec),
            );
        }
    }

    fn due_names(&self) -> Vec<String> {
        let now = Instant::now();
        let mut due: Vec<&Registration> = self
            .registry
            .values()
            .filter(|registration| {
                self.next_run_at
                    .get(&registration.spec.name)
                    .map(|at| *at <= now)
                    .unwrap_or(true)
            })
            .collect();

        due.sort_by(|a, b| {
            a.spec
                .priority
                .cmp(&b.spec.priority)
                .then_with(|| a.spec.name.cmp(&b.spec.name))
        });
        due.into_iter().map(|r| r.spec.name.clone()).collect()
    }

    fn singleton_is_live(&self, task_name: &str) -> bool {
        self.running.values().any(|run| run.task_name == task_name)
    }

    fn schedule_starts(&mut self) {
        if self.registry.is_empty() || self.running.len() >= self.max_parallel {
            return;
        }

        for task_name in self.due_names() {
            // heavy vivo => no arranca nada nuevo
            if self.heavy_running_name.is_some() {
                return;
            }
            if self.running.len() >= self.max_parallel {
                return;
            }

            let Some(registration) = self.registry.get(&task_name) else { continue };
            let spec = registration.spec.clone();

            if spec.singleton && self.singleton_is_live(&spec.name) {
                continue;
            }

            let heavy = spec.heavy;
            let started = self.start_task(&task_name);

            if heavy && started {
                self.heavy_running_name = Some(task_name);
                // heavy arrancó => nada más arranca en este tick
                return;
            }
        }
    }

    fn start_task(&mut self, task_name: &str) -> bool {
        let Some(registration) = self.registry.get(task_name) else {
            return false;
        };

        let spec = registration.spec.clone();
        let future = (registration.factory)();

        let started_at = Instant::now();
        let deadline_at = spec
            .timeout_sec
            .map(|timeout| started_at + Duration::from_secs(timeout));

        let handle = tokio::spawn(future);

        self.run_sequence += 1;
        let run_key = if spec.singleton {
            spec.name.clone()
        } else {
            format!("{}#{}", spec.name, self.run_sequence)
        };

        info!(
            "🗓️  [SCHED_STARTED]: worker={} task={} heavy={} timeout={:?}",
            self.worker_name, spec.name, spec.heavy, spec.timeout_sec
        );

        self.running.insert(
            run_key,
            RunningTask {
                task_name: spec.name.clone(),
                handle,
                started_at,
                deadline_at,
            },
        );
        true
    }
}
