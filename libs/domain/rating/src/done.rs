// [libs/domain/rating/src/done.rs]
/*!
 * =================================================================
 * APARATO: DONE SCAN
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: CIERRE PERIÓDICO DE TRABAJOS DE RATING
 *
 * Reglas de cierre:
 * - geo/branches:      sin celdas faltantes NI stale para la huella actual
 * - contacts:          rated >= subscribers_limit + BATCH_SIZE
 * - contacts_update:   sin stale restante (una carrera entre scan y cierre
 *                      la corrige la siguiente pasada periódica)
 * - huella en {NULL,-1,0,1} o tipo desconocido: cierre inmediato
 * =================================================================
 */

use serde_json::{json, Value};
use tracing::info;

use serenity_core_crypto::fingerprint::fingerprint_is_valid;
use serenity_domain_models::crawl::CellKind;
use serenity_domain_models::rating::{RatingJob, RatingKind};
use serenity_infra_db::repositories::{
    AudienceRepository, CellRepository, RateContactsRepository, RatingJobRepository,
};
use serenity_infra_db::DbError;

use crate::{RatingPipeline, WorkStream};

impl RatingPipeline {
    /// Una pasada del done_scan sobre los jobs abiertos del stream.
    pub async fn run_done_scan(&self, stream: WorkStream) -> Result<Value, DbError> {
        let ledger = RatingJobRepository::new(self.database.get_connection()?);
        let open_jobs = ledger
            .scan_open(stream.kinds(), self.config.done_scan_limit)
            .await?;

        let mut scanned = 0usize;
        let mut closed = 0usize;

        for job in open_jobs {
            scanned += 1;
            if self.scan_one(&job).await? {
                closed += 1;
            }
        }

        info!(
            "🎯 [DONE_SCAN]: stream={} scanned={} closed={}",
            stream.namespace(),
            scanned,
            closed
        );
        Ok(json!({"mode": "ok", "scanned": scanned, "closed": closed}))
    }

    /// Evalúa un job abierto; true si lo cerró.
    async fn scan_one(&self, job: &RatingJob) -> Result<bool, DbError> {
        if !fingerprint_is_valid(Some(job.target_hash)) {
            self.close_job(job.id, "bad_target_hash").await?;
            return Ok(true);
        }

        let audience = AudienceRepository::new(self.database.get_connection()?);
        let Some(task) = audience.load(job.task_id).await? else {
            self.close_job(job.id, "task_missing").await?;
            return Ok(true);
        };

        match job.kind {
            RatingKind::Contacts => {
                let ratings = RateContactsRepository::new(self.database.get_connection()?);
                let rated = ratings.rated_count(job.task_id).await?;
                let threshold = task.subscribers_limit + self.config.batch_size as i64;

                if rated >= threshold {
                    self.close_job(job.id, "enough").await?;
                    return Ok(true);
                }
                Ok(false)
            }

            RatingKind::ContactsUpdate => {
                let ratings = RateContactsRepository::new(self.database.get_connection()?);
                if !ratings.has_stale_for_update(job.task_id, job.target_hash).await? {
                    self.close_job(job.id, "no_stale").await?;
                    return Ok(true);
                }
                Ok(false)
            }

            RatingKind::Geo | RatingKind::Branches => {
                let kind = if job.kind == RatingKind::Geo {
                    CellKind::City
                } else {
                    CellKind::Branch
                };

                let cells = CellRepository::new(self.database.get_connection()?);
                let missing = cells.missing_cell_ids(job.task_id, kind).await?;
                if !missing.is_empty() {
                    return Ok(false);
                }

                let stale = cells.stale_cell_ids(job.task_id, kind, job.target_hash).await?;
                if !stale.is_empty() {
                    return Ok(false);
                }

                self.close_job(job.id, "complete").await?;
                Ok(true)
            }
        }
    }

    /// Guard de invalidación para todas las tareas activas: recalcula la
    /// huella de crawl_tasks y purga los ratings desalineados (una
    /// transacción por tarea, dentro del repositorio).
    pub async fn run_hash_guard(&self) -> Result<Value, DbError> {
        let audience = AudienceRepository::new(self.database.get_connection()?);
        let task_ids = audience.active_task_ids().await?;

        let cells = CellRepository::new(self.database.get_connection()?);
        let mut purged = 0usize;

        for task_id in &task_ids {
            if cells.run_hash_guard(*task_id).await? {
                purged += 1;
            }
        }

        Ok(json!({"mode": "ok", "tasks": task_ids.len(), "purged": purged}))
    }
}
