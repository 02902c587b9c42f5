// [apps/sender/src/supervisor.rs]
/*!
 * =================================================================
 * APARATO: SENDER SUPERVISOR
 * CLASIFICACIÓN: APPLICATION ORCHESTRATOR (ESTRATO L1)
 * RESPONSABILIDAD: RECONCILIACIÓN DE SENDERS, STALENESS Y CRASH-LOOP
 *
 * Cada tick: construir estado deseado {mailbox -> campañas en ventana},
 * drenar heartbeats, matar senders cuyo pulso venció su propio
 * next_wake_at + gracia, arrancar los que falten, y evaluar la política
 * de crash-loop sobre los eventos START.
 * =================================================================
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use serenity_domain_models::heartbeat::{HeartbeatPulse, SenderSignal};
use serenity_domain_sending::{is_now_in_send_window, now_berlin};
use serenity_infra_db::repositories::CampaignRepository;
use serenity_infra_db::{DbError, SerenityDb};

use crate::crashloop::{CrashLoopAction, CrashLoopPolicy, SOFT_PAUSE_SEC};
use crate::mailbox::MailboxSender;
use crate::transport::MailTransport;

const TICK: Duration = Duration::from_secs(2);
const HB_GRACE_SEC: f64 = 60.0;
const KILL_GRACE: Duration = Duration::from_secs(2);

fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

struct SenderRuntime {
    handle: JoinHandle<()>,
    stop_flag: Arc<AtomicBool>,
}

pub struct SenderSupervisor {
    database: SerenityDb,
    transport: Arc<dyn MailTransport>,

    currently_sending: HashMap<i64, SenderRuntime>,
    heartbeats: HashMap<i64, HeartbeatPulse>,
    policy: CrashLoopPolicy,

    signal_tx: UnboundedSender<SenderSignal>,
    signal_rx: UnboundedReceiver<SenderSignal>,
}

impl SenderSupervisor {
    pub fn new(database: SerenityDb, transport: Arc<dyn MailTransport>) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            database,
            transport,
            currently_sending: HashMap::new(),
            heartbeats: HashMap::new(),
            policy: CrashLoopPolicy::new(),
            signal_tx,
            signal_rx,
        }
    }

    /// Estado deseado: buzones con campañas activas DENTRO de su ventana.
    async fn build_desired_targets(&self) -> Result<HashMap<i64, Vec<i64>>, DbError> {
        let campaigns = CampaignRepository::new(self.database.get_connection()?);
        let active = campaigns.active_campaigns().await?;
        if active.is_empty() {
            return Ok(HashMap::new());
        }

        let mut workspace_ids: Vec<String> = active
            .iter()
            .map(|campaign| campaign.workspace_id.clone())
            .filter(|ws| !ws.is_empty())
            .collect();
        workspace_ids.sort();
        workspace_ids.dedup();

        let global_windows = campaigns.global_windows(&workspace_ids).await?;
        let berlin_now = now_berlin();

        let mut targets: HashMap<i64, Vec<i64>> = HashMap::new();
        for campaign in active {
            let global = global_windows
                .get(&campaign.workspace_id)
                .cloned()
                .unwrap_or(Value::Object(Default::default()));

            if !is_now_in_send_window(berlin_now, &campaign.window, &global) {
                continue;
            }
            targets.entry(campaign.mailbox_id).or_default().push(campaign.id);
        }
        Ok(targets)
    }

    fn start_sender(&mut self, mailbox_id: i64, campaign_ids: Vec<i64>) {
        let stop_flag = Arc::new(AtomicBool::new(false));

        info!(
            "📮 [SUPERVISOR]: START mailbox_id={} campaigns={}",
            mailbox_id,
            campaign_ids.len()
        );

        let sender = MailboxSender::new(
            mailbox_id,
            campaign_ids,
            self.database.clone(),
            Arc::clone(&self.transport),
            self.signal_tx.clone(),
            Arc::clone(&stop_flag),
        );

        let handle = tokio::spawn(sender.run());

        self.currently_sending.insert(
            mailbox_id,
            SenderRuntime { handle, stop_flag },
        );

        // solo los START alimentan la política; jamás los terminate
        self.policy.record_start(now_ts());
    }

    async fn terminate_runtime(&mut self, mailbox_id: i64, reason: &str) {
        let Some(runtime) = self.currently_sending.remove(&mailbox_id) else {
            return;
        };

        runtime.stop_flag.store(true, Ordering::Relaxed);

        let mut handle = runtime.handle;
        if !handle.is_finished() {
            // señal cooperativa; pasada la gracia, kill duro
            if tokio::time::timeout(KILL_GRACE, &mut handle).await.is_err() {
                handle.abort();
                let _ = tokio::time::timeout(KILL_GRACE, &mut handle).await;
            }
        } else {
            let _ = handle.await;
        }

        self.heartbeats.remove(&mailbox_id);
        info!("📮 [SUPERVISOR]: TERMINATED mailbox_id={} reason={}", mailbox_id, reason);
    }

    async fn kill_all_senders(&mut self) {
        let mailbox_ids: Vec<i64> = self.currently_sending.keys().copied().collect();
        for mailbox_id in mailbox_ids {
            self.terminate_runtime(mailbox_id, "kill_all").await;
        }
    }

    async fn drain_signals(&mut self) {
        while let Ok(signal) = self.signal_rx.try_recv() {
            match signal {
                SenderSignal::Hb(pulse) => {
                    self.heartbeats.insert(pulse.mailbox_id, pulse);
                }
                SenderSignal::Dead(notice) => {
                    info!(
                        "📮 [SUPERVISOR]: DEAD mailbox_id={} reason={}",
                        notice.mailbox_id, notice.reason
                    );
                    self.heartbeats.remove(&notice.mailbox_id);
                }
            }
        }

        // hijos que terminaron sin avisar
        let exited: Vec<i64> = self
            .currently_sending
            .iter()
            .filter(|(_, runtime)| runtime.handle.is_finished())
            .map(|(mailbox_id, _)| *mailbox_id)
            .collect();

        for mailbox_id in exited {
            info!("📮 [SUPERVISOR]: DEAD mailbox_id={} reason=EXITED", mailbox_id);
            if let Some(runtime) = self.currently_sending.remove(&mailbox_id) {
                let mut handle = runtime.handle;
                // reap SIEMPRE: nunca dejamos un JoinHandle huérfano
                let _ = tokio::time::timeout(KILL_GRACE, &mut handle).await;
            }
            self.heartbeats.remove(&mailbox_id);
        }
    }

    /// Bucle eterno del supervisor.
    pub async fn main_guide(&mut self) {
        info!("📮 [SUPERVISOR]: main guide started (tick={:?} grace={}s)", TICK, HB_GRACE_SEC);

        loop {
            if self.policy.is_hard_dead() {
                error!("📮 [SUPERVISOR]: HARD-DEAD: permanently down");
                tokio::time::sleep(Duration::from_secs(60)).await;
                continue;
            }

            let desired_targets = match self.build_desired_targets().await {
                Ok(targets) => targets,
                Err(fault) => {
                    warn!("📮 [SUPERVISOR]: desired_targets error: {}", fault);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            self.drain_signals().await;

            // kill por staleness: el contrato es el next_wake_at declarado
            let now = now_ts();
            let stale: Vec<i64> = self
                .currently_sending
                .keys()
                .filter(|mailbox_id| {
                    self.heartbeats
                        .get(*mailbox_id)
                        .map(|pulse| now > pulse.next_wake_at + HB_GRACE_SEC)
                        .unwrap_or(false)
                })
                .copied()
                .collect();

            for mailbox_id in stale {
                warn!("📮 [SUPERVISOR]: STALE mailbox_id={} -> terminate", mailbox_id);
                self.terminate_runtime(mailbox_id, "stale_kill").await;
            }

            // arrancar lo que falte del estado deseado
            let mut desired_mailboxes: Vec<i64> = desired_targets.keys().copied().collect();
            desired_mailboxes.sort();

            for mailbox_id in desired_mailboxes {
                let already_alive = self
                    .currently_sending
                    .get(&mailbox_id)
                    .map(|runtime| !runtime.handle.is_finished())
                    .unwrap_or(false);
                if already_alive {
                    continue;
                }

                let campaign_ids = desired_targets.get(&mailbox_id).cloned().unwrap_or_default();
                self.start_sender(mailbox_id, campaign_ids);
            }

            // política global de crash-loop por tasa de STARTs
            match self.policy.evaluate(now_ts()) {
                CrashLoopAction::Continue => {}
                CrashLoopAction::SoftPause => {
                    warn!(
                        "📮 [SUPERVISOR]: CRASHLOOP >=10 starts/60s -> kill all, sleep {}s",
                        SOFT_PAUSE_SEC
                    );
                    self.kill_all_senders().await;
                    tokio::time::sleep(Duration::from_secs(SOFT_PAUSE_SEC)).await;
                    info!("📮 [SUPERVISOR]: WAKE after soft pause");
                }
                CrashLoopAction::HardDead => {
                    error!("📮 [SUPERVISOR]: CRASHLOOP AGAIN -> HARD-DEAD");
                    self.kill_all_senders().await;
                    continue;
                }
            }

            tokio::time::sleep(TICK).await;
        }
    }
}
