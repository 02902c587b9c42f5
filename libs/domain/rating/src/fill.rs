// [libs/domain/rating/src/fill.rs]
/*!
 * =================================================================
 * APARATO: ENTITY QUEUE FILL
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: POBLADO DE LA COLA DE ENTIDADES Y CIERRES POR ESTADO
 *
 * El fill corre bajo el lock de cola (sección corta): decide cierres por
 * estado (task_missing / enough / no_stale) ANTES de generar candidatos,
 * para no fabricar trabajo muerto.
 * =================================================================
 */

use serde_json::json;
use tracing::info;

use serenity_core_crypto::fingerprint::fingerprint_is_valid;
use serenity_domain_models::crawl::CellKind;
use serenity_domain_models::rating::{RatingJob, RatingKind};
use serenity_infra_db::repositories::{
    AudienceRepository, CellRepository, RateContactsRepository, RatingJobRepository,
};
use serenity_infra_db::DbError;

use crate::queue::{key_entities_queue, key_queue_lock};
use crate::{RatingPipeline, WorkStream};

/// Resultado estructurado de un tick de fill (para el log del scheduler).
pub type FillReport = serde_json::Value;

impl RatingPipeline {
    pub(crate) async fn close_job(&self, rating_id: i64, reason: &str) -> Result<(), DbError> {
        let ledger = RatingJobRepository::new(self.database.get_connection()?);
        ledger.close_done(rating_id).await?;
        info!("🎯 [CLOSE]: rating_id={} reason={}", rating_id, reason);
        Ok(())
    }

    /// Camino need_fill completo, bajo el lock de cola.
    pub async fn run_fill(&self, stream: WorkStream, job: &RatingJob) -> Result<FillReport, DbError> {
        let lock_key = key_queue_lock(stream);
        let owner = self.lock_owner(stream, "fillgate");
        let token = self
            .cache
            .lock_acquire_blocking(&lock_key, self.config.queue_lock_ttl, &owner)
            .await;

        let report = self.run_fill_locked(stream, job).await;

        self.cache.lock_release(&lock_key, &token).await;
        report
    }

    async fn run_fill_locked(&self, stream: WorkStream, job: &RatingJob) -> Result<FillReport, DbError> {
        let entities_key = key_entities_queue(stream, job.id);

        // huella objetivo inválida: el job se cierra, no se alimenta
        if !fingerprint_is_valid(Some(job.target_hash)) {
            self.close_job(job.id, "bad_target_hash").await?;
            return Ok(json!({"mode": "closed", "reason": "bad_target_hash"}));
        }

        // otro worker pudo llenar mientras esperábamos el lock
        let existing = self.cache_get_ids(&entities_key).await;
        if !existing.is_empty() {
            info!(
                "🎯 [FILL]: SKIP rating_id={} reason=already_filled eq={}",
                job.id,
                existing.len()
            );
            return Ok(json!({"mode": "noop", "step": "already_filled"}));
        }

        let audience = AudienceRepository::new(self.database.get_connection()?);
        let Some(task) = audience.load(job.task_id).await? else {
            self.close_job(job.id, "task_missing").await?;
            self.cache_set_ids(&entities_key, &[]).await;
            return Ok(json!({"mode": "closed", "reason": "task_missing"}));
        };

        match job.kind {
            RatingKind::Contacts => {
                let ratings = RateContactsRepository::new(self.database.get_connection()?);
                let rated = ratings.rated_count(job.task_id).await?;
                let threshold = task.subscribers_limit + self.config.batch_size as i64;

                if rated >= threshold {
                    self.close_job(job.id, "enough").await?;
                    self.cache_set_ids(&entities_key, &[]).await;
                    return Ok(json!({"mode": "closed", "reason": "enough"}));
                }

                let ids = ratings
                    .candidates_contacts(job.task_id, self.config.max_fill)
                    .await?;
                info!(
                    "🎯 [FILL]: rating_id={} task_id={} type=contacts rated={}/{} put={}",
                    job.id,
                    job.task_id,
                    rated,
                    threshold,
                    ids.len()
                );
                self.cache_set_ids(&entities_key, &ids).await;
                Ok(json!({"mode": "filled", "queued": ids.len()}))
            }

            RatingKind::ContactsUpdate => {
                let ratings = RateContactsRepository::new(self.database.get_connection()?);
                if !ratings.has_stale_for_update(job.task_id, job.target_hash).await? {
                    self.close_job(job.id, "no_stale").await?;
                    self.cache_set_ids(&entities_key, &[]).await;
                    return Ok(json!({"mode": "closed", "reason": "no_stale"}));
                }

                let ids = ratings
                    .candidates_contacts_update(job.task_id, job.target_hash, self.config.max_fill)
                    .await?;
                info!(
                    "🎯 [FILL]: rating_id={} task_id={} type=contacts_update put={}",
                    job.id,
                    job.task_id,
                    ids.len()
                );
                self.cache_set_ids(&entities_key, &ids).await;
                Ok(json!({"mode": "filled", "queued": ids.len()}))
            }

            RatingKind::Geo | RatingKind::Branches => {
                let kind = if job.kind == RatingKind::Geo {
                    CellKind::City
                } else {
                    CellKind::Branch
                };

                let cells = CellRepository::new(self.database.get_connection()?);

                // primero lo faltante; si no falta nada, lo stale
                let missing = cells.missing_cell_ids(job.task_id, kind).await?;
                let (phase, ids) = if !missing.is_empty() {
                    ("missing", missing)
                } else {
                    ("stale", cells.stale_cell_ids(job.task_id, kind, job.target_hash).await?)
                };

                info!(
                    "🎯 [FILL]: rating_id={} task_id={} type={} phase={} put={}",
                    job.id,
                    job.task_id,
                    job.kind.as_str(),
                    phase,
                    ids.len()
                );
                self.cache_set_ids(&entities_key, &ids).await;
                Ok(json!({"mode": "filled", "phase": phase, "queued": ids.len()}))
            }
        }
    }
}
