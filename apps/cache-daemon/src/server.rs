// [apps/cache-daemon/src/server.rs]
/*!
 * =================================================================
 * APARATO: CACHE DAEMON SERVER LOOP
 * CLASIFICACIÓN: INFRASTRUCTURE DAEMON (ESTRATO L3)
 * RESPONSABILIDAD: SOCKET LOCAL, ACTOR ÚNICO DE ESTADO Y WATCHDOG
 *
 * # Mathematical Proof (Serialized State):
 * Las conexiones solo traducen frames a mensajes de un canal mpsc cuyo
 * único consumidor es el actor dueño del estado. Toda operación se aplica
 * en orden de llegada al canal: equivalente al event-loop mono-hilo del
 * modelo canónico.
 * =================================================================
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use serenity_infra_cache_protocol::codec;
use serenity_infra_cache_protocol::{CacheRequest, CacheResponse, MAX_CACHE_BYTES};

use crate::snapshot;
use crate::state::CacheState;

/// Si el actor no late en este lapso, el proceso muere con código 2.
const WATCHDOG_STALL_SEC: u64 = 60;
/// Cadencia del alive-log con contadores de periodo.
const ALIVE_EVERY_SEC: u64 = 10;
/// Cadencia del barrido de expiración de fondo.
const SWEEP_EVERY_SEC: u64 = 1;

pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

enum DaemonCommand {
    Request(CacheRequest, oneshot::Sender<CacheResponse>),
    Shutdown(oneshot::Sender<()>),
}

pub struct CacheDaemon {
    socket_path: PathBuf,
    dump_path: PathBuf,
}

impl CacheDaemon {
    /// El dump vive al lado del socket (mismo directorio, extensión .dump).
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        let socket_path: PathBuf = socket_path.into();
        let dump_path = socket_path.with_extension("dump");
        Self { socket_path, dump_path }
    }

    pub fn dump_path(&self) -> &Path {
        &self.dump_path
    }

    /// Ignición del daemon: restore, bind, watchdog y bucle de aceptación.
    /// Retorna tras un apagado limpio (SIGINT/SIGTERM) con dump sellado.
    pub async fn serve_forever(self) -> anyhow::Result<()> {
        info!(
            "🗄️  [CACHE_BOOT]: watchdog={}s alive_log={}s max_mem={}MB gc_to=60% ttl_default=7d locks=lease",
            WATCHDOG_STALL_SEC,
            ALIVE_EVERY_SEC,
            MAX_CACHE_BYTES / 1024 / 1024
        );

        let mut state = CacheState::new();
        snapshot::try_restore_dump(&mut state, &self.dump_path, now_epoch_ms());

        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("🗄️  [CACHE_BOOT]: listening on {:?}", self.socket_path);

        // latido observado por el watchdog desde un hilo OS independiente
        let heartbeat_ms = Arc::new(AtomicU64::new(now_epoch_ms()));
        spawn_watchdog_thread(Arc::clone(&heartbeat_ms));

        let (command_tx, command_rx) = mpsc::channel::<DaemonCommand>(256);

        let dump_path = self.dump_path.clone();
        let actor_heartbeat = Arc::clone(&heartbeat_ms);
        let actor = tokio::spawn(run_state_actor(state, command_rx, actor_heartbeat, dump_path));

        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let per_conn_tx = command_tx.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, per_conn_tx).await;
                            });
                        }
                        Err(fault) => {
                            warn!("⚠️ [CACHE_ACCEPT_FAULT]: {}", fault);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("🗄️  [CACHE_SIGNAL]: SIGINT, shutting down (dump...)");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("🗄️  [CACHE_SIGNAL]: SIGTERM, shutting down (dump...)");
                    break;
                }
            }
        }

        // apagado limpio: el actor sella el dump antes de morir
        let (ack_tx, ack_rx) = oneshot::channel();
        let _ = command_tx.send(DaemonCommand::Shutdown(ack_tx)).await;
        let _ = ack_rx.await;
        let _ = actor.await;

        let _ = std::fs::remove_file(&self.socket_path);
        info!("🗄️  [CACHE_STOP]: daemon stopped.");
        Ok(())
    }
}

/// Hilo watchdog separado del runtime: mejor muerto que colgado.
fn spawn_watchdog_thread(heartbeat_ms: Arc<AtomicU64>) {
    std::thread::Builder::new()
        .name("cache-watchdog".into())
        .spawn(move || loop {
            std::thread::sleep(Duration::from_secs(2));
            let last_beat = heartbeat_ms.load(Ordering::Relaxed);
            let now = now_epoch_ms();
            if now.saturating_sub(last_beat) > WATCHDOG_STALL_SEC * 1000 {
                eprintln!("[cache] WATCHDOG: stalled > {WATCHDOG_STALL_SEC}s, exiting");
                std::process::exit(2);
            }
        })
        .expect("watchdog thread spawn");
}

/// Actor único dueño del estado: requests, barridos, alive-log y dump final.
async fn run_state_actor(
    mut state: CacheState,
    mut command_rx: mpsc::Receiver<DaemonCommand>,
    heartbeat_ms: Arc<AtomicU64>,
    dump_path: PathBuf,
) {
    let mut sweep_ticker = tokio::time::interval(Duration::from_secs(SWEEP_EVERY_SEC));
    let mut alive_ticker = tokio::time::interval(Duration::from_secs(ALIVE_EVERY_SEC));

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                heartbeat_ms.store(now_epoch_ms(), Ordering::Relaxed);
                match command {
                    Some(DaemonCommand::Request(request, reply_tx)) => {
                        let response = state.handle(request, now_epoch_ms());
                        let _ = reply_tx.send(response);
                    }
                    Some(DaemonCommand::Shutdown(ack_tx)) => {
                        if let Err(fault) = snapshot::write_dump(&state, &dump_path, now_epoch_ms()) {
                            error!("❌ [CACHE_DUMP_FAULT]: {}", fault);
                        }
                        let _ = ack_tx.send(());
                        return;
                    }
                    None => return,
                }
            }
            _ = sweep_ticker.tick() => {
                heartbeat_ms.store(now_epoch_ms(), Ordering::Relaxed);
                state.expire_sweep(now_epoch_ms());
            }
            _ = alive_ticker.tick() => {
                heartbeat_ms.store(now_epoch_ms(), Ordering::Relaxed);
                let counters = state.take_counters();
                info!(
                    "🗄️  [CACHE_ALIVE]: items={} locks={} | mem={:.2}MB/{}MB | evicted={} expired={} errors={}",
                    state.items(),
                    state.locks_held(),
                    state.total_bytes() as f64 / 1024.0 / 1024.0,
                    MAX_CACHE_BYTES / 1024 / 1024,
                    counters.evicted,
                    counters.expired,
                    counters.errors,
                );
            }
        }
    }
}

/// Una conexión del pool de clientes: frames en secuencia hasta EOF.
/// Request malformado responde error; fallo de IO tira la conexión.
async fn handle_connection(mut stream: UnixStream, command_tx: mpsc::Sender<DaemonCommand>) {
    loop {
        let request: CacheRequest = match codec::read_message(&mut stream).await {
            Ok(request) => request,
            Err(serenity_infra_cache_protocol::codec::FrameError::Io(fault))
                if fault.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                return;
            }
            Err(fault) => {
                debug!("⚠️ [CACHE_CONN]: malformed frame: {}", fault);
                let reply = CacheResponse::Error { err: "bad_req".into() };
                let _ = codec::write_message(&mut stream, &reply).await;
                return;
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if command_tx
            .send(DaemonCommand::Request(request, reply_tx))
            .await
            .is_err()
        {
            return;
        }

        let response = match reply_rx.await {
            Ok(response) => response,
            Err(_) => CacheResponse::Error { err: "server_error".into() },
        };

        if codec::write_message(&mut stream, &response).await.is_err() {
            return;
        }
    }
}
