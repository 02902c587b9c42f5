// [libs/domain/models/src/campaign.rs]
/*!
 * =================================================================
 * APARATO: CAMPAIGN & MAILBOX MODELS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE DESPACHO DE CORREO
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Campaña activa tal como la consume el supervisor de envío.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignRow {
    pub id: i64,
    pub workspace_id: String,
    pub mailbox_id: i64,
    pub mailing_list_id: i64,
    /// Ventana de envío propia; objeto vacío delega en la global del workspace.
    pub window: Value,
}

/// Buzón SMTP con su límite horario de envío.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxRow {
    pub mailbox_id: i64,
    /// Envíos por hora; <= 0 significa buzón pausado.
    pub limit_hour_sent: i64,
}
