// [apps/sender/src/transport.rs]
/*!
 * =================================================================
 * APARATO: MAIL TRANSPORT SEAM
 * CLASIFICACIÓN: APPLICATION CONTRACT (ESTRATO L1)
 * RESPONSABILIDAD: FRONTERA CON RENDER + SMTP + REGISTRO DE ENVÍO
 *
 * send_one encapsula render de plantilla, entrega SMTP y el registro en
 * mailbox_sent. El sender solo gobierna ritmo y ventanas.
 * =================================================================
 */

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use serenity_infra_db::repositories::CampaignRepository;
use serenity_infra_db::{DbError, SerenityDb};

pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

pub trait MailTransport: Send + Sync {
    /// Envía una carta a un contacto de lista de una campaña.
    fn send_one<'a>(
        &'a self,
        campaign_id: i64,
        list_contact_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;
}

/// Transporte de ensayo: no toca SMTP pero SÍ sella mailbox_sent, de modo
/// que la garantía de no-doble-envío se ejercita de punta a punta.
pub struct DryRunTransport {
    database: SerenityDb,
}

impl DryRunTransport {
    pub fn new(database: SerenityDb) -> Self {
        Self { database }
    }
}

impl MailTransport for DryRunTransport {
    fn send_one<'a>(
        &'a self,
        campaign_id: i64,
        list_contact_id: i64,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let campaigns = CampaignRepository::new(
                self.database.get_connection().map_err(box_db)?,
            );

            let contact_id = campaigns
                .contact_of_list_row(list_contact_id)
                .await
                .map_err(box_db)?
                .ok_or_else(|| -> TransportError { "list_contact row vanished".into() })?;

            let fresh = campaigns
                .record_sent(campaign_id, contact_id)
                .await
                .map_err(box_db)?;

            info!(
                "📮 [DRY_RUN_SEND]: campaign_id={} list_contact_id={} contact_id={} fresh={}",
                campaign_id, list_contact_id, contact_id, fresh
            );
            Ok(())
        })
    }
}

fn box_db(fault: DbError) -> TransportError {
    Box::new(fault)
}
