// [apps/sender/src/mailbox.rs]
/*!
 * =================================================================
 * APARATO: MAILBOX SENDER LOOP
 * CLASIFICACIÓN: APPLICATION (ESTRATO L1)
 * RESPONSABILIDAD: RITMO DE ENVÍO DE UN BUZÓN BAJO SU LÍMITE HORARIO
 *
 * Contrato de vida: el loop declara en cada pulso su next_wake_at; el
 * supervisor solo lo mata pasado next_wake_at + grace. El loop se
 * auto-termina con jitter uniforme (25-45 min) para romper olas
 * sincronizadas de senders.
 * =================================================================
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use serenity_domain_models::heartbeat::{DeadNotice, HeartbeatPulse, SenderSignal, SenderState};
use serenity_domain_sending::{is_now_in_send_window, now_berlin};
use serenity_infra_db::repositories::CampaignRepository;
use serenity_infra_db::SerenityDb;

use crate::transport::MailTransport;

/// Jitter de auto-terminación: 25-45 minutos.
const DEATH_AT_MIN_SEC: f64 = 25.0 * 60.0;
const DEATH_AT_MAX_SEC: f64 = 45.0 * 60.0;

fn now_ts() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub struct MailboxSender {
    pub mailbox_id: i64,
    pub campaign_ids: Vec<i64>,
    database: SerenityDb,
    transport: Arc<dyn MailTransport>,
    signal_tx: UnboundedSender<SenderSignal>,
    stop_flag: Arc<AtomicBool>,
}

impl MailboxSender {
    pub fn new(
        mailbox_id: i64,
        campaign_ids: Vec<i64>,
        database: SerenityDb,
        transport: Arc<dyn MailTransport>,
        signal_tx: UnboundedSender<SenderSignal>,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            mailbox_id,
            campaign_ids,
            database,
            transport,
            signal_tx,
            stop_flag,
        }
    }

    fn heartbeat(&self, next_wake_at: f64, state: SenderState, campaign_id: Option<i64>, reason: &str) {
        let _ = self.signal_tx.send(SenderSignal::Hb(HeartbeatPulse {
            mailbox_id: self.mailbox_id,
            ts: now_ts(),
            next_wake_at,
            state,
            campaign_id,
            reason: reason.to_string(),
        }));
    }

    fn dead(&self, reason: &str) {
        let _ = self.signal_tx.send(SenderSignal::Dead(DeadNotice {
            mailbox_id: self.mailbox_id,
            ts: now_ts(),
            reason: reason.to_string(),
        }));
    }

    fn should_stop(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Cuerpo completo del sender de un buzón.
    pub async fn run(self) {
        let death_at_ts = now_ts() + rand::thread_rng().gen_range(DEATH_AT_MIN_SEC..DEATH_AT_MAX_SEC);

        if let Err(fault) = self.run_inner(death_at_ts).await {
            warn!(
                "📮 [SENDER_FAULT]: mailbox_id={} err={:#}",
                self.mailbox_id, fault
            );
            self.dead(&format!("EXCEPTION:{fault}"));
        }
    }

    async fn run_inner(&self, death_at_ts: f64) -> anyhow::Result<()> {
        let campaigns = CampaignRepository::new(self.database.get_connection()?);

        let limit_hour_sent = campaigns.mailbox_hourly_limit(self.mailbox_id).await?;
        if limit_hour_sent <= 0 {
            // buzón pausado: latido ocioso hasta la muerte programada
            while !self.should_stop() && now_ts() < death_at_ts {
                self.heartbeat(now_ts() + 60.0, SenderState::NoLimit, None, "limit_hour_sent<=0");
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.dead("DONE");
            return Ok(());
        }

        let send_interval = 3600.0 / limit_hour_sent as f64;

        let campaign_ids: Vec<i64> = self.campaign_ids.iter().copied().filter(|id| *id > 0).collect();
        if campaign_ids.is_empty() {
            while !self.should_stop() && now_ts() < death_at_ts {
                self.heartbeat(now_ts() + 30.0, SenderState::NoCampaigns, None, "");
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.dead("DONE");
            return Ok(());
        }

        loop {
            if self.should_stop() {
                self.dead("STOP");
                return Ok(());
            }
            if now_ts() >= death_at_ts {
                self.dead("DEATH_AT");
                return Ok(());
            }

            let berlin_now = now_berlin();

            let active = campaigns
                .active_campaigns_for_mailbox(self.mailbox_id, &campaign_ids)
                .await?;

            if active.is_empty() {
                let pause = send_interval.min(60.0);
                self.heartbeat(now_ts() + pause, SenderState::NoActiveCampaigns, None, "");
                tokio::time::sleep(Duration::from_secs_f64(pause)).await;
                continue;
            }

            let workspace_ids: Vec<String> = {
                let mut ids: Vec<String> = active
                    .iter()
                    .map(|campaign| campaign.workspace_id.clone())
                    .filter(|ws| !ws.is_empty())
                    .collect();
                ids.sort();
                ids.dedup();
                ids
            };
            let global_windows = campaigns.global_windows(&workspace_ids).await?;

            // peso = contactos activos de la lista aún sin envío
            let mut weighted: Vec<(i64, i64)> = Vec::new();
            for campaign in &active {
                let global = global_windows
                    .get(&campaign.workspace_id)
                    .cloned()
                    .unwrap_or(Value::Object(Default::default()));

                if !is_now_in_send_window(berlin_now, &campaign.window, &global) {
                    continue;
                }

                let weight = campaigns
                    .unsent_active_count(campaign.id, campaign.mailing_list_id)
                    .await?;
                if weight > 0 {
                    weighted.push((campaign.id, weight));
                }
            }

            if weighted.is_empty() {
                let pause = send_interval.min(60.0);
                self.heartbeat(now_ts() + pause, SenderState::NoPendingOrWindow, None, "");
                tokio::time::sleep(Duration::from_secs_f64(pause)).await;
                continue;
            }

            // pick ponderado por peso
            let total_weight: i64 = weighted.iter().map(|(_, weight)| weight).sum();
            let pick = rand::thread_rng().gen_range(1..=total_weight);
            let mut chosen_campaign = weighted[0].0;
            let mut accumulated = 0i64;
            for (campaign_id, weight) in &weighted {
                accumulated += weight;
                if pick <= accumulated {
                    chosen_campaign = *campaign_id;
                    break;
                }
            }

            let Some(list_contact_id) = campaigns.next_candidate(chosen_campaign).await? else {
                let pause = send_interval.min(30.0);
                self.heartbeat(now_ts() + pause, SenderState::NoCandidate, Some(chosen_campaign), "");
                tokio::time::sleep(Duration::from_secs_f64(pause)).await;
                continue;
            };

            // pulso ANTES de enviar, con despertar generoso, para que el
            // supervisor no mate al sender a mitad de un envío lento
            self.heartbeat(
                now_ts() + send_interval + 60.0,
                SenderState::Sending,
                Some(chosen_campaign),
                "",
            );

            if let Err(fault) = self.transport.send_one(chosen_campaign, list_contact_id).await {
                self.dead(&format!("SEND_ONE_EXCEPTION:{fault}"));
                return Ok(());
            }

            info!(
                "📮 [SENDER]: mailbox_id={} campaign_id={} list_contact_id={} sent",
                self.mailbox_id, chosen_campaign, list_contact_id
            );

            self.heartbeat(now_ts() + send_interval, SenderState::Sleep, Some(chosen_campaign), "");
            tokio::time::sleep(Duration::from_secs_f64(send_interval.max(0.0))).await;
        }
    }
}
