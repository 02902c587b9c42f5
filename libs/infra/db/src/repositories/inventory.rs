// [libs/infra/db/src/repositories/inventory.rs]
/*!
 * =================================================================
 * APARATO: DIRECTORY INVENTORY REPOSITORY (cb_crawler)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CELDAS DEL DIRECTORIO, ATRIBUCIÓN Y LEDGERS DE PRIORIDAD
 * =================================================================
 */

use std::collections::HashMap;

use libsql::{params, Connection};

use crate::errors::DbError;

pub struct InventoryRepository {
    database_connection: Connection,
}

impl InventoryRepository {
    pub fn new(connection: Connection) -> Self {
        Self {
            database_connection: connection,
        }
    }

    fn ids_json(ids: &[i64]) -> Result<String, DbError> {
        serde_json::to_string(ids).map_err(|fault| DbError::MappingError(fault.to_string()))
    }

    /// Flags `collected` frescos para un lote de celdas.
    pub async fn collected_map(&self, cb_ids: &[i64]) -> Result<HashMap<i64, bool>, DbError> {
        if cb_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT id, collected
                FROM cb_crawler
                WHERE id IN (SELECT value FROM json_each(?1))
                "#,
                params![Self::ids_json(cb_ids)?],
            )
            .await?;

        let mut out = HashMap::new();
        while let Some(row) = rows.next().await? {
            out.insert(row.get::<i64>(0)?, row.get::<i64>(1)? != 0);
        }
        Ok(out)
    }

    /// Meta (plz, branch_slug) para los items de la cola de despacho.
    pub async fn meta_map(&self, cb_ids: &[i64]) -> Result<HashMap<i64, (String, String)>, DbError> {
        if cb_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT id, plz, branch_slug
                FROM cb_crawler
                WHERE id IN (SELECT value FROM json_each(?1))
                "#,
                params![Self::ids_json(cb_ids)?],
            )
            .await?;

        let mut out = HashMap::new();
        while let Some(row) = rows.next().await? {
            out.insert(
                row.get::<i64>(0)?,
                (row.get::<String>(1)?, row.get::<String>(2)?),
            );
        }
        Ok(out)
    }

    /// Enriquecimiento de la ventana top-K: resuelve (plz, branch_id) a
    /// (cb_id, collected) por lote de pares.
    pub async fn resolve_cells(
        &self,
        pairs: &[(String, i64)],
    ) -> Result<Vec<(String, i64, i64, bool)>, DbError> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let pairs_json = serde_json::to_string(
            &pairs
                .iter()
                .map(|(plz, branch_id)| serde_json::json!([plz, branch_id]))
                .collect::<Vec<_>>(),
        )
        .map_err(|fault| DbError::MappingError(fault.to_string()))?;

        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT cb.plz, cb.branch_id, cb.id, cb.collected
                FROM json_each(?1) AS je
                JOIN cb_crawler cb
                  ON cb.plz = json_extract(je.value, '$[0]')
                 AND cb.branch_id = json_extract(je.value, '$[1]')
                "#,
                params![pairs_json],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((
                row.get::<String>(0)?,
                row.get::<i64>(1)?,
                row.get::<i64>(2)?,
                row.get::<i64>(3)? != 0,
            ));
        }
        Ok(out)
    }

    /// Sella una celda tras el paso del spider.
    pub async fn mark_cell_collected(&self, cb_id: i64, collected_num: i64) -> Result<(), DbError> {
        self.database_connection
            .execute(
                r#"
                UPDATE cb_crawler
                SET collected = 1, collected_num = ?2
                WHERE id = ?1
                "#,
                params![cb_id, collected_num],
            )
            .await?;
        Ok(())
    }

    /// Atribución de despacho: liga (task, cb) para que los resultados del
    /// spider sean atribuibles aguas abajo.
    pub async fn record_dispatch(&self, task_id: i64, cb_crawler_id: i64) -> Result<(), DbError> {
        self.database_connection
            .execute(
                "INSERT INTO queue_sys (task_id, cb_crawler_id) VALUES (?1, ?2)",
                params![task_id, cb_crawler_id],
            )
            .await?;
        Ok(())
    }

    // -------------------- LEDGER ___crawler_priority --------------------

    /// Siembra prio=1 para toda tarea en procesamiento (idempotente).
    pub async fn seed_priorities(&self) -> Result<(), DbError> {
        self.database_connection
            .execute(
                r#"
                INSERT INTO ___crawler_priority (task_id, prio)
                SELECT t.id, 1
                FROM aap_audience_audiencetask t
                WHERE t.run_processing = 1
                ON CONFLICT (task_id) DO NOTHING
                "#,
                (),
            )
            .await?;
        Ok(())
    }

    /// Promueve prio 1 -> 2 cuando la tarea acumuló más de `threshold`
    /// filas crudas vía la atribución de queue_sys. Nunca vuelve a 1.
    pub async fn promote_priorities(&self, threshold: i64, batch_limit: u32) -> Result<u64, DbError> {
        let updated = self
            .database_connection
            .execute(
                r#"
                UPDATE ___crawler_priority
                SET prio = 2, updated_at = CURRENT_TIMESTAMP
                WHERE prio = 1
                  AND task_id IN (
                      SELECT c.task_id
                      FROM ___crawler_priority c
                      WHERE c.prio = 1
                        AND (
                            SELECT COUNT(*)
                            FROM raw_contacts_gb r
                            JOIN queue_sys q ON q.cb_crawler_id = r.cb_crawler_id
                            WHERE q.task_id = c.task_id
                        ) > ?1
                      ORDER BY c.task_id
                      LIMIT ?2
                  )
                "#,
                params![threshold, batch_limit as i64],
            )
            .await?;
        Ok(updated)
    }

    // -------------------- LEDGER __enrich_priority --------------------

    /// Sincroniza el ledger de enriquecimiento con las tareas activas:
    /// upsert de en_needed (limit/2) sin tocar en_done; borra inactivas;
    /// recuenta en_done SOLO para las tareas aún en cero.
    pub async fn sync_enrich_priorities(&self) -> Result<(), DbError> {
        self.database_connection
            .execute(
                r#"
                INSERT INTO __enrich_priority (task_id, en_needed, en_done)
                SELECT t.id, MAX(0, t.subscribers_limit / 2), 0
                FROM aap_audience_audiencetask t
                WHERE t.run_processing = 1
                ON CONFLICT (task_id) DO UPDATE SET
                    en_needed = excluded.en_needed,
                    updated_at = CURRENT_TIMESTAMP
                "#,
                (),
            )
            .await?;

        self.database_connection
            .execute(
                r#"
                DELETE FROM __enrich_priority
                WHERE NOT EXISTS (
                    SELECT 1 FROM aap_audience_audiencetask t
                    WHERE t.id = __enrich_priority.task_id
                      AND t.run_processing = 1
                )
                "#,
                (),
            )
            .await?;

        let mut rows = self
            .database_connection
            .query(
                "SELECT task_id FROM __enrich_priority WHERE en_done = 0 ORDER BY task_id",
                (),
            )
            .await?;

        let mut pending: Vec<i64> = Vec::new();
        while let Some(row) = rows.next().await? {
            pending.push(row.get::<i64>(0)?);
        }

        for task_id in pending {
            let mut count_rows = self
                .database_connection
                .query(
                    r#"
                    SELECT COUNT(*)
                    FROM raw_contacts_aggr a
                    WHERE EXISTS (
                        SELECT 1 FROM json_each(a.sources) s WHERE s.value = 'GPT'
                    )
                    AND EXISTS (
                        SELECT 1
                        FROM queue_sys q
                        WHERE q.task_id = ?1
                          AND q.cb_crawler_id IN (SELECT value FROM json_each(a.cb_crawler_ids))
                    )
                    "#,
                    params![task_id],
                )
                .await?;

            let done = match count_rows.next().await? {
                Some(row) => row.get::<i64>(0)?,
                None => 0,
            };

            self.database_connection
                .execute(
                    r#"
                    UPDATE __enrich_priority
                    SET en_done = ?2, updated_at = CURRENT_TIMESTAMP
                    WHERE task_id = ?1
                    "#,
                    params![task_id, done],
                )
                .await?;
        }

        Ok(())
    }
}
