// [libs/infra/db/src/repositories/audience.rs]
/*!
 * =================================================================
 * APARATO: AUDIENCE TASK REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: LECTURA Y TRANSICIONES DE LA ESPECIFICACIÓN DE AUDIENCIA
 * =================================================================
 */

use libsql::{params, Connection};

use serenity_domain_models::task::{AudienceTask, TaskMode};

use crate::errors::DbError;

const SELECT_TASK_COLUMNS: &str = r#"
    SELECT id, workspace_id, user_id, type, task, task_geo, task_branches,
           task_client, subscribers_limit, run_processing, collected, archived
    FROM aap_audience_audiencetask
"#;

pub struct AudienceRepository {
    database_connection: Connection,
}

impl AudienceRepository {
    pub fn new(connection: Connection) -> Self {
        Self {
            database_connection: connection,
        }
    }

    fn map_row(row: &libsql::Row) -> Result<AudienceTask, DbError> {
        Ok(AudienceTask {
            id: row.get::<i64>(0)?,
            workspace_id: row.get::<String>(1)?,
            user_id: row.get::<i64>(2)?,
            mode: TaskMode::from_db(&row.get::<String>(3)?),
            task: row.get::<String>(4)?,
            task_geo: row.get::<String>(5)?,
            task_branches: row.get::<String>(6)?,
            task_client: row.get::<String>(7)?,
            subscribers_limit: row.get::<i64>(8)?,
            run_processing: row.get::<i64>(9)? != 0,
            collected: row.get::<i64>(10)? != 0,
            archived: row.get::<i64>(11)? != 0,
        })
    }

    pub async fn load(&self, task_id: i64) -> Result<Option<AudienceTask>, DbError> {
        let sql = format!("{SELECT_TASK_COLUMNS} WHERE id = ?1 LIMIT 1");
        let mut rows = self.database_connection.query(&sql, params![task_id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Tareas objetivo del crawl: en procesamiento y aún no colectadas.
    pub async fn active_task_ids(&self) -> Result<Vec<i64>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT id
                FROM aap_audience_audiencetask
                WHERE run_processing = 1 AND collected = 0
                ORDER BY id ASC
                "#,
                (),
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row.get::<i64>(0)?);
        }
        Ok(out)
    }

    pub async fn random_active_task_id(&self) -> Result<Option<i64>, DbError> {
        let mut rows = self
            .database_connection
            .query(
                r#"
                SELECT id
                FROM aap_audience_audiencetask
                WHERE run_processing = 1 AND collected = 0
                ORDER BY RANDOM()
                LIMIT 1
                "#,
                (),
            )
            .await?;

        Ok(match rows.next().await? {
            Some(row) => Some(row.get::<i64>(0)?),
            None => None,
        })
    }

    /// Tareas con procesamiento activo (para el auto-fill de celdas).
    pub async fn processing_tasks(&self, limit: Option<u32>) -> Result<Vec<AudienceTask>, DbError> {
        let mut sql = format!(
            "{SELECT_TASK_COLUMNS} WHERE run_processing = 1 ORDER BY id ASC"
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut rows = self.database_connection.query(&sql, ()).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(Self::map_row(&row)?);
        }
        Ok(out)
    }

    pub async fn mark_collected(&self, task_id: i64) -> Result<(), DbError> {
        self.database_connection
            .execute(
                r#"
                UPDATE aap_audience_audiencetask
                SET collected = 1, updated_at = CURRENT_TIMESTAMP
                WHERE id = ?1
                "#,
                params![task_id],
            )
            .await?;
        Ok(())
    }
}
