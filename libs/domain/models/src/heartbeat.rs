// [libs/domain/models/src/heartbeat.rs]
/*!
 * =================================================================
 * APARATO: SENDER HEARTBEAT PROTOCOL
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO DEL CANAL HIJO -> SUPERVISOR
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Estado declarado por un sender en su pulso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderState {
    NoLimit,
    NoCampaigns,
    NoActiveCampaigns,
    NoPendingOrWindow,
    NoCandidate,
    Sending,
    Sleep,
}

/// Pulso de vida de un sender: el campo `next_wake_at` es el contrato de
/// staleness — el supervisor solo mata pasado `next_wake_at + grace`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPulse {
    pub mailbox_id: i64,
    /// Epoch seconds del pulso.
    pub ts: f64,
    /// Epoch seconds del próximo despertar auto-declarado.
    pub next_wake_at: f64,
    pub state: SenderState,
    pub campaign_id: Option<i64>,
    pub reason: String,
}

/// Señal terminal de un sender (salida limpia o colapso).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadNotice {
    pub mailbox_id: i64,
    pub ts: f64,
    pub reason: String,
}

/// Mensaje del canal unidireccional hijo -> supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SenderSignal {
    Hb(HeartbeatPulse),
    Dead(DeadNotice),
}
