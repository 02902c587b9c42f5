// [libs/infra/db/src/repositories/rate_contacts.rs]
/*!
 * =================================================================
 * APARATO: RATE CONTACTS REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: RATINGS POR (task, contact), CANDIDATOS Y SEMBRADO
 *
 * Un rating válido exige rate_cl no nulo y hash_task fuera del conjunto
 * reservado {-1, 0, 1} (NULL incluido como inválido).
 * =================================================================
 */

use libsql::{params, Connection};

use crate::errors::DbError;

const VALID_HASH_FILTER: &str = "rate_cl IS NOT NULL AND hash_task IS NOT NULL AND hash_task NOT IN (-1, 0, 1)";

pub struct RateContactsRepository {
    database_connection: Connection,
}

impl RateContactsRepository {
    pub fn new(connection: Connection) -> Self {
        Self {
            database_connection: connection,
        }
    }

    /// Contactos de la tarea con rating válido (cualquier huella).
    pub async fn rated_count(&self, task_id: i64) -> Result<i64, DbError> {
        let sql = format!(
            "SELECT COUNT(*) FROM rate_contacts WHERE task_id = ?1 AND {VALID_HASH_FILTER}"
        );
        let mut rows = self.database_connection.query(&sql, params![task_id]).await?;
        let row = rows.next().await?.ok_or(DbError::TransactionError)?;
        Ok(row.get::<i64>(0)?)
    }

    /// ¿Queda algún rating válido con huella distinta a la objetivo?
    pub async fn has_stale_for_update(&self, task_id: i64, target_hash: i64) -> Result<bool, DbError> {
        let sql = format!(
            r#"
            SELECT 1
            FROM rate_contacts
            WHERE task_id = ?1 AND {VALID_HASH_FILTER} AND hash_task IS NOT ?2
            LIMIT 1
            "#
        );
        let mut rows = self
            .database_connection
            .query(&sql, params![task_id, target_hash])
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Candidatos del stream `contacts`: sin rate_cl o con huella inválida
    /// (NULL incluido).
    pub async fn candidates_contacts(&self, task_id: i64, limit: u32) -> Result<Vec<i64>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT contact_id
                FROM rate_contacts
                WHERE task_id = ?1
                  AND (
                       rate_cl IS NULL
                    OR hash_task IS NULL
                    OR hash_task IN (-1, 0, 1)
                  )
                ORDER BY rate_cb ASC NULLS LAST, contact_id ASC
                LIMIT ?2
                "#,
                params![task_id, limit as i64],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row.get::<i64>(0)?);
        }
        Ok(out)
    }

    /// Candidatos del stream `contacts_update`: rating válido pero con
    /// huella desalineada (los NULL NO entran aquí).
    pub async fn candidates_contacts_update(
        &self,
        task_id: i64,
        target_hash: i64,
        limit: u32,
    ) -> Result<Vec<i64>, DbError> {
        let sql = format!(
            r#"
            SELECT contact_id
            FROM rate_contacts
            WHERE task_id = ?1 AND {VALID_HASH_FILTER} AND hash_task IS NOT ?2
            ORDER BY rate_cb ASC NULLS LAST, contact_id ASC
            LIMIT ?3
            "#
        );
        let mut rows = self
            .database_connection
            .query(&sql, params![task_id, target_hash, limit as i64])
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row.get::<i64>(0)?);
        }
        Ok(out)
    }

    /// Upsert del veredicto del oráculo: clave natural (task, contact).
    pub async fn upsert_rates(
        &self,
        task_id: i64,
        target_hash: i64,
        rows_to_write: &[(i64, i64)],
    ) -> Result<usize, DbError> {
        for (contact_id, rate_cl) in rows_to_write {
            self.database_connection
                .execute(
                    r#"
                    INSERT INTO rate_contacts (task_id, contact_id, rate_cl, hash_task)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT (task_id, contact_id) DO UPDATE SET
                        rate_cl = excluded.rate_cl,
                        hash_task = excluded.hash_task,
                        updated_at = CURRENT_TIMESTAMP
                    "#,
                    params![task_id, *contact_id, *rate_cl, target_hash],
                )
                .await?;
        }
        Ok(rows_to_write.len())
    }

    /// Sembrado idempotente desde celdas recolectadas: cada contacto entra
    /// con su mejor celda (min rate_cb, luego min cb_id).
    pub async fn seed_from_cells(
        &self,
        task_id: i64,
        seeds: &[(i64, i64, i64)], // (contact_id, best_cb_id, best_rate_cb)
    ) -> Result<u64, DbError> {
        let mut inserted = 0u64;
        for (contact_id, cb_id, rate_cb) in seeds {
            inserted += self
                .database_connection
                .execute(
                    r#"
                    INSERT INTO rate_contacts (task_id, contact_id, cb_id, rate_cb, updated_at)
                    VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP)
                    ON CONFLICT (task_id, contact_id) DO NOTHING
                    "#,
                    params![task_id, *contact_id, *cb_id, *rate_cb],
                )
                .await?;
        }
        Ok(inserted)
    }

    /// ¿La tarea tiene al menos `offset + 1` filas de rating?
    pub async fn has_row_at_offset(&self, task_id: i64, offset: i64) -> Result<bool, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT 1
                FROM rate_contacts
                WHERE task_id = ?1
                ORDER BY id ASC
                LIMIT 1 OFFSET ?2
                "#,
                params![task_id, offset],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    pub async fn has_any(&self, task_id: i64) -> Result<bool, DbError> {
        self.has_row_at_offset(task_id, 0).await
    }
}
