// [libs/infra/db/src/repositories/cells.rs]
/*!
 * =================================================================
 * APARATO: CELL REPOSITORY (crawl_tasks)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CELDAS PUNTUADAS, CANDIDATOS, HUELLA kt_hash Y GUARD
 *
 * # Mathematical Proof (Hash-Guard Atomicity):
 * run_hash_guard ejecuta touch -> recompute -> purge -> reset -> store
 * dentro de UNA transacción: la huella sellada y la purga de ratings son
 * consistentes o no ocurren en absoluto.
 * =================================================================
 */

use libsql::{params, Connection};
use sha1::{Digest, Sha1};
use tracing::info;

use serenity_domain_models::crawl::CellKind;
use serenity_domain_models::task::AudienceTask;

use crate::errors::DbError;

/// Tope duro de candidatos de un fill: superarlo es una alarma de
/// correctitud, no una condición de recorte.
pub const MAX_CANDIDATES: usize = 2000;

/// Candidato de inventario para el ranking GPT (ciudad con extras
/// geográficos, rama solo id+nombre).
#[derive(Debug, Clone, serde::Serialize)]
pub struct CellCandidate {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub land: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urban_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pop_total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_km2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pop_density: Option<f64>,
}

pub struct CellRepository {
    database_connection: Connection,
}

impl CellRepository {
    pub fn new(connection: Connection) -> Self {
        Self {
            database_connection: connection,
        }
    }

    fn inventory_table(kind: CellKind) -> &'static str {
        match kind {
            CellKind::City => "cities_sys",
            CellKind::Branch => "gb_branches",
        }
    }

    pub async fn count_cells(&self, task_id: i64, kind: CellKind) -> Result<i64, DbError> {
        let mut rows = self
            .database_connection
            .query(
                "SELECT COUNT(*) FROM crawl_tasks WHERE task_id = ?1 AND type = ?2",
                params![task_id, kind.as_str()],
            )
            .await?;
        let row = rows.next().await?.ok_or(DbError::TransactionError)?;
        Ok(row.get::<i64>(0)?)
    }

    /// Candidatos de inventario aún sin celda para la tarea, al azar.
    /// Para city incluye los extras geográficos que alimentan al oráculo.
    pub async fn pick_random_candidates(
        &self,
        task_id: i64,
        kind: CellKind,
        limit: u32,
    ) -> Result<Vec<CellCandidate>, DbError> {
        let sql = match kind {
            CellKind::Branch => {
                r#"
                SELECT b.id, b.name, NULL, NULL, NULL, NULL, NULL, NULL
                FROM gb_branches b
                WHERE NOT EXISTS (
                    SELECT 1 FROM crawl_tasks ct
                    WHERE ct.task_id = ?1 AND ct.type = 'branch' AND ct.value_id = b.id
                )
                ORDER BY RANDOM()
                LIMIT ?2
                "#
            }
            CellKind::City => {
                r#"
                SELECT c.id, c.name, c.state_name, c.urban_name, c.travel_name,
                       c.pop_total, c.area_km2, c.pop_density
                FROM cities_sys c
                WHERE NOT EXISTS (
                    SELECT 1 FROM crawl_tasks ct
                    WHERE ct.task_id = ?1 AND ct.type = 'city' AND ct.value_id = c.id
                )
                ORDER BY RANDOM()
                LIMIT ?2
                "#
            }
        };

        let mut rows = self
            .database_connection
            .query(sql, params![task_id, limit as i64])
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(CellCandidate {
                id: row.get::<i64>(0)?,
                name: row.get::<String>(1)?,
                land: row.get::<Option<String>>(2)?,
                urban_name: row.get::<Option<String>>(3)?,
                travel_name: row.get::<Option<String>>(4)?,
                pop_total: row.get::<Option<i64>>(5)?,
                area_km2: row.get::<Option<f64>>(6)?,
                pop_density: row.get::<Option<f64>>(7)?,
            });
        }
        Ok(out)
    }

    fn guard_candidate_count(rows: usize, what: &'static str) -> Result<(), DbError> {
        if rows > MAX_CANDIDATES {
            return Err(DbError::TooManyCandidates {
                what,
                count: rows,
                cap: MAX_CANDIDATES,
            });
        }
        Ok(())
    }

    /// Celdas faltantes del need_fill: inventario sin fila en crawl_tasks.
    /// Devuelve TODAS (con guard > MAX_CANDIDATES).
    pub async fn missing_cell_ids(&self, task_id: i64, kind: CellKind) -> Result<Vec<i64>, DbError> {
        let sql = format!(
            r#"
            SELECT inv.id
            FROM {} inv
            WHERE NOT EXISTS (
                SELECT 1 FROM crawl_tasks ct
                WHERE ct.task_id = ?1 AND ct.type = ?2 AND ct.value_id = inv.id
            )
            ORDER BY RANDOM()
            LIMIT ?3
            "#,
            Self::inventory_table(kind)
        );

        let mut rows = self
            .database_connection
            .query(&sql, params![task_id, kind.as_str(), (MAX_CANDIDATES + 1) as i64])
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row.get::<i64>(0)?);
        }
        Self::guard_candidate_count(out.len(), "missing_cells")?;
        Ok(out)
    }

    /// Celdas con huella desalineada (stale) para la huella objetivo.
    pub async fn stale_cell_ids(&self, task_id: i64, kind: CellKind, target_hash: i64) -> Result<Vec<i64>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT value_id
                FROM crawl_tasks
                WHERE task_id = ?1 AND type = ?2 AND hash_task IS NOT ?3
                ORDER BY updated_at ASC, id ASC
                LIMIT ?4
                "#,
                params![task_id, kind.as_str(), target_hash, (MAX_CANDIDATES + 1) as i64],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row.get::<i64>(0)?);
        }
        Self::guard_candidate_count(out.len(), "stale_cells")?;
        Ok(out)
    }

    /// Nombres de inventario por id (payload del oráculo).
    pub async fn load_names(&self, kind: CellKind, ids: &[i64]) -> Result<Vec<(i64, String)>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids_json = serde_json::to_string(ids).map_err(|f| DbError::MappingError(f.to_string()))?;
        let sql = format!(
            r#"
            SELECT inv.id, inv.name
            FROM {} inv
            WHERE inv.id IN (SELECT value FROM json_each(?1))
            "#,
            Self::inventory_table(kind)
        );

        let mut rows = self.database_connection.query(&sql, params![ids_json]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((row.get::<i64>(0)?, row.get::<String>(1)?));
        }
        Ok(out)
    }

    /// Alta idempotente de celdas puntuadas (auto-fill 200/200).
    pub async fn insert_ranked_cells(
        &self,
        task: &AudienceTask,
        kind: CellKind,
        items: &[(i64, i64)],
    ) -> Result<usize, DbError> {
        for (value_id, rate) in items {
            self.database_connection
                .execute(
                    r#"
                    INSERT INTO crawl_tasks (workspace_id, user_id, task_id, type, value_id, rate)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT (task_id, type, value_id) DO NOTHING
                    "#,
                    params![
                        task.workspace_id.clone(),
                        task.user_id,
                        task.id,
                        kind.as_str(),
                        *value_id,
                        *rate
                    ],
                )
                .await?;
        }
        Ok(items.len())
    }

    /// Upsert del camino de trabajo del rating: sella rate + huella.
    pub async fn upsert_cell_rates(
        &self,
        task_id: i64,
        kind: CellKind,
        target_hash: i64,
        items: &[(i64, i64)],
    ) -> Result<usize, DbError> {
        for (value_id, rate) in items {
            self.database_connection
                .execute(
                    r#"
                    INSERT INTO crawl_tasks (task_id, type, value_id, rate, hash_task)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT (task_id, type, value_id) DO UPDATE SET
                        rate = excluded.rate,
                        hash_task = excluded.hash_task,
                        updated_at = CURRENT_TIMESTAMP
                    "#,
                    params![task_id, kind.as_str(), *value_id, *rate, target_hash],
                )
                .await?;
        }
        Ok(items.len())
    }

    // -------------------- RATES PARA EL TOP-K --------------------

    /// Rates de PLZ derivados de las ciudades puntuadas vía el mapa
    /// city->PLZ. Orden: (rate asc, plz asc).
    pub async fn plz_rates(&self, task_id: i64) -> Result<Vec<(i64, String)>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT ct.rate, m.plz
                FROM __city__plz_map m
                JOIN crawl_tasks ct
                  ON ct.task_id = ?1
                 AND ct.type = 'city'
                 AND ct.value_id = m.city_id
                ORDER BY ct.rate ASC, m.plz ASC
                "#,
                params![task_id],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((row.get::<i64>(0)?, row.get::<String>(1)?));
        }
        Ok(out)
    }

    /// Rates de ramas. Orden: (rate asc, value_id asc).
    pub async fn branch_rates(&self, task_id: i64) -> Result<Vec<(i64, i64)>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT rate, value_id
                FROM crawl_tasks
                WHERE task_id = ?1 AND type = 'branch'
                ORDER BY rate ASC, value_id ASC
                "#,
                params![task_id],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((row.get::<i64>(0)?, row.get::<i64>(1)?));
        }
        Ok(out)
    }

    // -------------------- kt_hash Y HASH-GUARD --------------------

    /// Digest de versión de la ventana top-K: huella de TODAS las filas
    /// (type:value=rate) de la tarea en orden estable. Vacío si no hay filas.
    pub async fn kt_hash(&self, task_id: i64) -> Result<String, DbError> {
        kt_hash_on(&self.database_connection, task_id).await
    }

    pub async fn stored_task_hash(&self, task_id: i64) -> Result<Option<String>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                "SELECT kt_hash FROM __task__kt_hash WHERE task_id = ?1",
                params![task_id],
            )
            .await?;
        Ok(match rows.next().await? {
            Some(row) => Some(row.get::<String>(0)?),
            None => None,
        })
    }

    /// Guard de invalidación de UNA tarea. Si la huella sellada falta o no
    /// coincide: touch + recompute + purga de rate_contacts + reset de
    /// subscribers_limit + sellado, todo en una transacción.
    ///
    /// Devuelve true si la tarea fue purgada.
    pub async fn run_hash_guard(&self, task_id: i64) -> Result<bool, DbError> {
        let transaction = self
            .database_connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let stored = {
            let mut rows = transaction
                .query(
                    "SELECT kt_hash FROM __task__kt_hash WHERE task_id = ?1",
                    params![task_id],
                )
                .await?;
            match rows.next().await? {
                Some(row) => Some(row.get::<String>(0)?),
                None => None,
            }
        };

        let current = kt_hash_on(&transaction, task_id).await?;

        if stored.as_deref() == Some(current.as_str()) {
            transaction.commit().await.map_err(|_| DbError::TransactionError)?;
            return Ok(false);
        }

        // touch: fuerza una versión nueva de kt_hash, recalculada por el
        // MISMO tunel transaccional que hará la purga.
        transaction
            .execute(
                r#"
                UPDATE crawl_tasks
                SET updated_at = CURRENT_TIMESTAMP
                WHERE task_id = ?1
                  AND id = (
                      SELECT id FROM crawl_tasks
                      WHERE task_id = ?1
                      ORDER BY id ASC
                      LIMIT 1
                  )
                "#,
                params![task_id],
            )
            .await?;

        let new_hash = kt_hash_on(&transaction, task_id).await?;

        transaction
            .execute("DELETE FROM rate_contacts WHERE task_id = ?1", params![task_id])
            .await?;

        transaction
            .execute(
                r#"
                UPDATE aap_audience_audiencetask
                SET subscribers_limit = 0, updated_at = CURRENT_TIMESTAMP
                WHERE id = ?1
                "#,
                params![task_id],
            )
            .await?;

        transaction
            .execute(
                r#"
                INSERT INTO __task__kt_hash (task_id, kt_hash)
                VALUES (?1, ?2)
                ON CONFLICT (task_id) DO UPDATE SET
                    kt_hash = excluded.kt_hash,
                    updated_at = CURRENT_TIMESTAMP
                "#,
                params![task_id, new_hash.clone()],
            )
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        info!(
            "🧹 [HASH_GUARD]: task_id={} purged (stored_was_present={})",
            task_id,
            stored.is_some()
        );
        Ok(true)
    }
}

const KT_ROWS_SQL: &str = r#"
    SELECT type || ':' || CAST(value_id AS TEXT) || '=' || CAST(rate AS TEXT)
    FROM crawl_tasks
    WHERE task_id = ?1
    ORDER BY type, value_id
"#;

/// kt_hash computado sobre una conexión o una transacción (deref a
/// Connection): el hash-guard exige que recompute y purga compartan túnel.
async fn kt_hash_on(connection: &Connection, task_id: i64) -> Result<String, DbError> {
    let mut rows = connection.query(KT_ROWS_SQL, params![task_id]).await?;
    let mut encoded_rows: Vec<String> = Vec::new();
    while let Some(row) = rows.next().await? {
        encoded_rows.push(row.get::<String>(0)?);
    }

    if encoded_rows.is_empty() {
        return Ok(String::new());
    }

    let material = encoded_rows.join("|");
    let mut hasher = Sha1::new();
    hasher.update(material.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
