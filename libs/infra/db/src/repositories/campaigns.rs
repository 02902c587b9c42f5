// [libs/infra/db/src/repositories/campaigns.rs]
/*!
 * =================================================================
 * APARATO: CAMPAIGN & MAILBOX REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ESTADO DESEADO DEL SENDER Y SELECCIÓN DE CANDIDATOS
 *
 * La unicidad de mailbox_sent (campaign, contact) es la garantía dura de
 * que send_one ocurre a lo sumo una vez por par.
 * =================================================================
 */

use std::collections::HashMap;

use libsql::{params, Connection};
use serde_json::Value;

use serenity_domain_models::campaign::CampaignRow;

use crate::errors::DbError;

const ACTIVE_CAMPAIGN_FILTER: &str = r#"
    active = 1
    AND start_at <= datetime('now')
    AND (end_at IS NULL OR end_at >= datetime('now'))
"#;

pub struct CampaignRepository {
    database_connection: Connection,
}

impl CampaignRepository {
    pub fn new(connection: Connection) -> Self {
        Self {
            database_connection: connection,
        }
    }

    fn map_campaign(row: &libsql::Row) -> Result<CampaignRow, DbError> {
        let window_raw: String = row.get(4)?;
        Ok(CampaignRow {
            id: row.get::<i64>(0)?,
            workspace_id: row.get::<String>(1)?,
            mailbox_id: row.get::<i64>(2)?,
            mailing_list_id: row.get::<i64>(3)?,
            window: serde_json::from_str(&window_raw).unwrap_or(Value::Null),
        })
    }

    /// Todas las campañas temporalmente activas (el filtro de ventana lo
    /// aplica el motor de ventanas, no SQL).
    pub async fn active_campaigns(&self) -> Result<Vec<CampaignRow>, DbError> {
        let sql = format!(
            r#"
            SELECT id, workspace_id, mailbox_id, mailing_list_id, window
            FROM campaigns_campaigns
            WHERE {ACTIVE_CAMPAIGN_FILTER}
            "#
        );

        let mut rows = self.database_connection.query(&sql, ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::map_campaign(&row)?);
        }
        Ok(out)
    }

    /// Campañas activas de un buzón, restringidas al set asignado.
    pub async fn active_campaigns_for_mailbox(
        &self,
        mailbox_id: i64,
        campaign_ids: &[i64],
    ) -> Result<Vec<CampaignRow>, DbError> {
        if campaign_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids_json = serde_json::to_string(campaign_ids)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;
        let sql = format!(
            r#"
            SELECT id, workspace_id, mailbox_id, mailing_list_id, window
            FROM campaigns_campaigns
            WHERE mailbox_id = ?1
              AND id IN (SELECT value FROM json_each(?2))
              AND {ACTIVE_CAMPAIGN_FILTER}
            "#
        );

        let mut rows = self
            .database_connection
            .query(&sql, params![mailbox_id, ids_json])
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::map_campaign(&row)?);
        }
        Ok(out)
    }

    /// Ventanas globales por workspace.
    pub async fn global_windows(&self, workspace_ids: &[String]) -> Result<HashMap<String, Value>, DbError> {
        if workspace_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids_json = serde_json::to_string(workspace_ids)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;

        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT workspace_id, value_json
                FROM aap_settings_sending_settings
                WHERE workspace_id IN (SELECT value FROM json_each(?1))
                "#,
                params![ids_json],
            )
            .await?;

        let mut out = HashMap::new();
        while let Some(row) = rows.next().await? {
            let workspace_id: String = row.get(0)?;
            let value_raw: String = row.get(1)?;
            out.insert(
                workspace_id,
                serde_json::from_str(&value_raw).unwrap_or(Value::Null),
            );
        }
        Ok(out)
    }

    /// Límite horario del buzón; 0 si no está configurado.
    pub async fn mailbox_hourly_limit(&self, mailbox_id: i64) -> Result<i64, DbError> {
        let mut rows = self
            .database_connection
            .query(
                "SELECT limit_hour_sent FROM aap_settings_smtp_mailboxes WHERE mailbox_id = ?1",
                params![mailbox_id],
            )
            .await?;

        Ok(match rows.next().await? {
            Some(row) => row.get::<Option<i64>>(0)?.unwrap_or(0),
            None => 0,
        })
    }

    /// Peso de una campaña: contactos activos de su lista aún sin envío.
    pub async fn unsent_active_count(&self, campaign_id: i64, mailing_list_id: i64) -> Result<i64, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT COUNT(*)
                FROM lists_contacts lc
                LEFT JOIN mailbox_sent ms
                  ON ms.campaign_id = ?1
                 AND ms.rate_contact_id = lc.contact_id
                WHERE lc.list_id = ?2
                  AND lc.active = 1
                  AND ms.id IS NULL
                "#,
                params![campaign_id, mailing_list_id],
            )
            .await?;

        let row = rows.next().await?.ok_or(DbError::TransactionError)?;
        Ok(row.get::<i64>(0)?)
    }

    /// Próximo candidato de la campaña: mejor rating primero
    /// (rate_cl asc, rate_cb asc, list_contact_id asc), excluyendo pares
    /// ya enviados.
    pub async fn next_candidate(&self, campaign_id: i64) -> Result<Option<i64>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT lc.id AS list_contact_id
                FROM campaigns_campaigns c
                JOIN lists_contacts lc
                  ON lc.list_id = c.mailing_list_id
                 AND lc.active = 1
                LEFT JOIN mailbox_sent ms
                  ON ms.campaign_id = c.id
                 AND ms.rate_contact_id = lc.contact_id
                LEFT JOIN rate_contacts rc
                  ON rc.contact_id = lc.contact_id
                WHERE c.id = ?1
                  AND ms.id IS NULL
                ORDER BY
                  rc.rate_cl ASC NULLS LAST,
                  rc.rate_cb ASC NULLS LAST,
                  lc.id ASC
                LIMIT 1
                "#,
                params![campaign_id],
            )
            .await?;

        Ok(match rows.next().await? {
            Some(row) => Some(row.get::<i64>(0)?),
            None => None,
        })
    }

    /// Registro append-only de envío; false si el par ya existía.
    pub async fn record_sent(&self, campaign_id: i64, rate_contact_id: i64) -> Result<bool, DbError> {
        let inserted = self
            .database_connection
            .execute(
                r#"
                INSERT INTO mailbox_sent (campaign_id, rate_contact_id)
                VALUES (?1, ?2)
                ON CONFLICT (campaign_id, rate_contact_id) DO NOTHING
                "#,
                params![campaign_id, rate_contact_id],
            )
            .await?;
        Ok(inserted > 0)
    }

    /// contact_id detrás de una fila de lista (para registrar el envío).
    pub async fn contact_of_list_row(&self, list_contact_id: i64) -> Result<Option<i64>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                "SELECT contact_id FROM lists_contacts WHERE id = ?1",
                params![list_contact_id],
            )
            .await?;

        Ok(match rows.next().await? {
            Some(row) => Some(row.get::<i64>(0)?),
            None => None,
        })
    }
}
