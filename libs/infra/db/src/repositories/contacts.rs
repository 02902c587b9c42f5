// [libs/infra/db/src/repositories/contacts.rs]
/*!
 * =================================================================
 * APARATO: CONTACTS REPOSITORY (raw + aggregate)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: INGESTA CRUDA, VALIDACIÓN DE EMAIL Y TABLA AGREGADA
 *
 * Invariante: la fila agregada jamás se parte; todo merge pasa por el
 * UPDATE de la fila encontrada por email normalizado.
 * =================================================================
 */

use libsql::{params, Connection};
use serde_json::Value;

use serenity_domain_models::crawl::RawCandidate;

use crate::errors::DbError;

/// Fila cruda lista para agregación.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub id: i64,
    pub cb_crawler_id: i64,
    pub company_name: String,
    pub email: String,
    pub company_data: Value,
}

/// Proyección mutable de la fila agregada durante un merge.
#[derive(Debug, Clone)]
pub struct AggregateRow {
    pub id: i64,
    pub cb_crawler_ids: Vec<i64>,
    pub sources: Vec<String>,
    pub branches: Vec<i64>,
    pub plz_list: Vec<String>,
    pub address_list: Vec<String>,
    pub company_data: Value,
}

fn parse_json_column<T: serde::de::DeserializeOwned + Default>(raw: &str) -> T {
    serde_json::from_str(raw).unwrap_or_default()
}

fn to_json_text<T: serde::Serialize>(value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|fault| DbError::MappingError(fault.to_string()))
}

pub struct ContactsRepository {
    database_connection: Connection,
}

impl ContactsRepository {
    pub fn new(connection: Connection) -> Self {
        Self {
            database_connection: connection,
        }
    }

    // -------------------- INGESTA CRUDA --------------------

    /// Ingesta de filas emitidas por un spider para una celda.
    pub async fn insert_raw_candidates(&self, rows: &[RawCandidate]) -> Result<usize, DbError> {
        for candidate in rows {
            self.database_connection
                .execute(
                    r#"
                    INSERT INTO raw_contacts_gb (cb_crawler_id, company_name, email, company_data)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![
                        candidate.cb_crawler_id,
                        candidate.company_name.clone(),
                        candidate.email.clone().unwrap_or_default(),
                        to_json_text(&candidate.company_data)?
                    ],
                )
                .await?;
        }
        Ok(rows.len())
    }

    // -------------------- VALIDACIÓN DE EMAIL --------------------

    pub async fn pick_unvalidated(&self, limit: u32) -> Result<Vec<(i64, Option<String>)>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT id, email
                FROM raw_contacts_gb
                WHERE processed_email = 0
                ORDER BY id
                LIMIT ?1
                "#,
                params![limit as i64],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((row.get::<i64>(0)?, row.get::<Option<String>>(1)?));
        }
        Ok(out)
    }

    pub async fn set_email_status(&self, raw_id: i64, email: &str, status: &str) -> Result<(), DbError> {
        self.database_connection
            .execute(
                r#"
                UPDATE raw_contacts_gb
                SET email = ?2,
                    status_email = ?3,
                    processed_email = 1,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ?1
                "#,
                params![raw_id, email, status],
            )
            .await?;
        Ok(())
    }

    // -------------------- AGREGACIÓN --------------------

    /// Filas con email OK pendientes de agregación.
    pub async fn pick_ok_unprocessed(&self, limit: u32) -> Result<Vec<RawRow>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT id, cb_crawler_id, company_name, email, company_data
                FROM raw_contacts_gb
                WHERE processed = 0
                  AND processed_email = 1
                  AND status_email = 'OK'
                  AND email IS NOT NULL
                  AND TRIM(email) <> ''
                ORDER BY id
                LIMIT ?1
                "#,
                params![limit as i64],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw_json: String = row.get(4)?;
            out.push(RawRow {
                id: row.get::<i64>(0)?,
                cb_crawler_id: row.get::<i64>(1)?,
                company_name: row.get::<String>(2)?,
                email: row.get::<String>(3)?,
                company_data: serde_json::from_str(&raw_json).unwrap_or(Value::Null),
            });
        }
        Ok(out)
    }

    /// Celda de origen de una fila cruda: (branch_id, plz).
    pub async fn cell_of(&self, cb_crawler_id: i64) -> Result<Option<(i64, String)>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                "SELECT branch_id, plz FROM cb_crawler WHERE id = ?1",
                params![cb_crawler_id],
            )
            .await?;

        Ok(match rows.next().await? {
            Some(row) => Some((row.get::<i64>(0)?, row.get::<String>(1)?)),
            None => None,
        })
    }

    pub async fn find_aggregate_by_email(&self, email: &str) -> Result<Option<AggregateRow>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT id, cb_crawler_ids, sources, branches, plz_list, address_list, company_data
                FROM raw_contacts_aggr
                WHERE email = ?1
                "#,
                params![email],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        Ok(Some(AggregateRow {
            id: row.get::<i64>(0)?,
            cb_crawler_ids: parse_json_column(&row.get::<String>(1)?),
            sources: parse_json_column(&row.get::<String>(2)?),
            branches: parse_json_column(&row.get::<String>(3)?),
            plz_list: parse_json_column(&row.get::<String>(4)?),
            address_list: parse_json_column(&row.get::<String>(5)?),
            company_data: serde_json::from_str(&row.get::<String>(6)?).unwrap_or(Value::Null),
        }))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_aggregate(
        &self,
        email: &str,
        company_name: &str,
        cb_crawler_ids: &[i64],
        sources: &[String],
        branches: &[i64],
        plz_list: &[String],
        address_list: &[String],
        company_data: &Value,
        status_data: &str,
    ) -> Result<i64, DbError> {
        self.database_connection
            .execute(
                r#"
                INSERT INTO raw_contacts_aggr
                    (cb_crawler_ids, sources, company_name, branches, plz_list,
                     address_list, email, company_data, status_data, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, CURRENT_TIMESTAMP)
                "#,
                params![
                    to_json_text(&cb_crawler_ids)?,
                    to_json_text(&sources)?,
                    company_name,
                    to_json_text(&branches)?,
                    to_json_text(&plz_list)?,
                    to_json_text(&address_list)?,
                    email,
                    to_json_text(company_data)?,
                    status_data
                ],
            )
            .await?;

        let mut rows = self
            .database_connection
            .query("SELECT last_insert_rowid()", ())
            .await?;
        let row = rows.next().await?.ok_or(DbError::TransactionError)?;
        Ok(row.get::<i64>(0)?)
    }

    pub async fn update_aggregate(&self, merged: &AggregateRow, status_data: &str) -> Result<(), DbError> {
        self.database_connection
            .execute(
                r#"
                UPDATE raw_contacts_aggr
                SET cb_crawler_ids = ?2,
                    sources = ?3,
                    branches = ?4,
                    plz_list = ?5,
                    address_list = ?6,
                    company_data = ?7,
                    status_data = ?8,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ?1
                "#,
                params![
                    merged.id,
                    to_json_text(&merged.cb_crawler_ids)?,
                    to_json_text(&merged.sources)?,
                    to_json_text(&merged.branches)?,
                    to_json_text(&merged.plz_list)?,
                    to_json_text(&merged.address_list)?,
                    to_json_text(&merged.company_data)?,
                    status_data
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn mark_raw_processed(&self, raw_id: i64) -> Result<(), DbError> {
        self.database_connection
            .execute(
                r#"
                UPDATE raw_contacts_gb
                SET processed = 1, updated_at = CURRENT_TIMESTAMP
                WHERE id = ?1
                "#,
                params![raw_id],
            )
            .await?;
        Ok(())
    }

    // -------------------- PAYLOADS PARA EL RATING --------------------

    /// Documentos `company_data` de agregados por id (orden de entrada
    /// preservado; ausentes se omiten).
    pub async fn load_company_payloads(&self, ids: &[i64]) -> Result<Vec<(i64, Value)>, DbError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids_json = to_json_text(&ids)?;
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT id, company_data
                FROM raw_contacts_aggr
                WHERE id IN (SELECT value FROM json_each(?1))
                "#,
                params![ids_json],
            )
            .await?;

        let mut by_id: std::collections::HashMap<i64, Value> = std::collections::HashMap::new();
        while let Some(row) = rows.next().await? {
            let contact_id = row.get::<i64>(0)?;
            let document = serde_json::from_str(&row.get::<String>(1)?).unwrap_or(Value::Null);
            by_id.insert(contact_id, document);
        }

        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id).map(|doc| (*id, doc)))
            .collect())
    }

    /// Agregados cuyo inventario de celdas interseca el lote dado:
    /// (contact_id, cb_crawler_ids). Base del sembrado de rate_contacts.
    pub async fn aggregates_touching_cells(&self, cb_ids: &[i64]) -> Result<Vec<(i64, Vec<i64>)>, DbError> {
        if cb_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids_json = to_json_text(&cb_ids)?;
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT a.id, a.cb_crawler_ids
                FROM raw_contacts_aggr a
                WHERE EXISTS (
                    SELECT 1
                    FROM json_each(a.cb_crawler_ids) u
                    WHERE u.value IN (SELECT value FROM json_each(?1))
                )
                "#,
                params![ids_json],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((
                row.get::<i64>(0)?,
                parse_json_column(&row.get::<String>(1)?),
            ));
        }
        Ok(out)
    }
}
