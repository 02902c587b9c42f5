// [libs/infra/db/src/repositories/rating_jobs.rs]
/*!
 * =================================================================
 * APARATO: RATING JOB LEDGER REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DEL LEDGER APPEND-ONLY __tasks_rating
 *
 * Contrato: crear un registro done=0 SOLICITA trabajo; los workers sellan
 * done=1. El registro más reciente done=0 por tipo es la señal "en curso".
 * =================================================================
 */

use libsql::{params, Connection};

use serenity_domain_models::rating::{RatingJob, RatingKind};

use crate::errors::DbError;

fn kinds_sql_list(kinds: &[RatingKind]) -> String {
    kinds
        .iter()
        .map(|kind| format!("'{}'", kind.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

pub struct RatingJobRepository {
    database_connection: Connection,
}

impl RatingJobRepository {
    pub fn new(connection: Connection) -> Self {
        Self {
            database_connection: connection,
        }
    }

    /// Solicita trabajo: nuevo registro done=0 con la huella objetivo.
    pub async fn request(&self, task_id: i64, kind: RatingKind, target_hash: i64) -> Result<i64, DbError> {
        self.database_connection
            .execute(
                r#"
                INSERT INTO __tasks_rating (task_id, type, hash_task, done)
                VALUES (?1, ?2, ?3, 0)
                "#,
                params![task_id, kind.as_str(), target_hash],
            )
            .await?;

        let mut rows = self
            .database_connection
            .query("SELECT last_insert_rowid()", ())
            .await?;
        let row = rows.next().await?.ok_or(DbError::TransactionError)?;
        Ok(row.get::<i64>(0)?)
    }

    /// Cola de candidatos newest-first para el pop_batch.
    pub async fn build_queue(&self, kinds: &[RatingKind], limit: u32) -> Result<Vec<i64>, DbError> {
        let sql = format!(
            r#"
            SELECT id
            FROM __tasks_rating
            WHERE done = 0
              AND type IN ({})
              AND hash_task IS NOT NULL
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
            kinds_sql_list(kinds)
        );

        let mut rows = self.database_connection.query(&sql, params![limit as i64]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row.get::<i64>(0)?);
        }
        Ok(out)
    }

    /// Un trabajo sigue vivo si existe, no está sellado y su tipo es visible
    /// para este stream.
    pub async fn load_alive(&self, rating_id: i64, kinds: &[RatingKind]) -> Result<Option<RatingJob>, DbError> {
        let sql = format!(
            r#"
            SELECT id, task_id, type, hash_task
            FROM __tasks_rating
            WHERE id = ?1
              AND done = 0
              AND type IN ({})
              AND hash_task IS NOT NULL
            LIMIT 1
            "#,
            kinds_sql_list(kinds)
        );

        let mut rows = self.database_connection.query(&sql, params![rating_id]).await?;
        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let kind_label: String = row.get(2)?;
        let kind = RatingKind::from_db(&kind_label)
            .ok_or_else(|| DbError::MappingError(format!("unknown rating type '{kind_label}'")))?;

        Ok(Some(RatingJob {
            id: row.get::<i64>(0)?,
            task_id: row.get::<i64>(1)?,
            kind,
            target_hash: row.get::<i64>(3)?,
        }))
    }

    pub async fn close_done(&self, rating_id: i64) -> Result<(), DbError> {
        self.database_connection
            .execute(
                r#"
                UPDATE __tasks_rating
                SET done = 1, updated_at = CURRENT_TIMESTAMP
                WHERE id = ?1
                "#,
                params![rating_id],
            )
            .await?;
        Ok(())
    }

    /// Abiertos más antiguos primero, para el done_scan periódico.
    pub async fn scan_open(&self, kinds: &[RatingKind], limit: u32) -> Result<Vec<RatingJob>, DbError> {
        let sql = format!(
            r#"
            SELECT id, task_id, type, hash_task
            FROM __tasks_rating
            WHERE done = 0
              AND type IN ({})
              AND hash_task IS NOT NULL
            ORDER BY updated_at ASC, id ASC
            LIMIT ?1
            "#,
            kinds_sql_list(kinds)
        );

        let mut rows = self.database_connection.query(&sql, params![limit as i64]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let kind_label: String = row.get(2)?;
            let Some(kind) = RatingKind::from_db(&kind_label) else {
                continue;
            };
            out.push(RatingJob {
                id: row.get::<i64>(0)?,
                task_id: row.get::<i64>(1)?,
                kind,
                target_hash: row.get::<i64>(3)?,
            });
        }
        Ok(out)
    }
}
