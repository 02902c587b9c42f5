// [libs/domain/rating/src/queue.rs]
/*!
 * =================================================================
 * APARATO: RATING QUEUE COORDINATION
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: POP ATÓMICO DE LOTES Y ROTACIÓN FAIR ENTRE TENANTS
 *
 * Estado en cache:
 *   prep:<ns>:tasks:q            ids de rating-jobs, newest-first
 *   prep:<ns>:entities:q:<id>    entidades pendientes del job
 *   prep:<ns>:lock               lock SOLO de mutación de colas
 *   prep:<ns>:eid:<task>:<ent>   lease por entidad durante el lote LLM
 * =================================================================
 */

use rand::Rng;
use tracing::info;
use uuid::Uuid;

use serenity_domain_models::rating::{RatingJob, RatingKind};
use serenity_infra_db::repositories::{AudienceRepository, RateContactsRepository, RatingJobRepository};
use serenity_infra_db::DbError;

use crate::guard::{admission_allows, remaining_quota};
use crate::{RatingPipeline, WorkStream};

/// Resultado de un pop de lote.
#[derive(Debug, Clone)]
pub enum PopOutcome {
    /// Hay entidades: procesar este lote fuera del lock.
    Work { job: RatingJob, ids: Vec<i64> },
    /// La cola de entidades del head está vacía: toca fill.
    NeedFill { job: RatingJob },
    /// Nada que hacer en este tick.
    Noop,
}

pub fn key_tasks_queue(stream: WorkStream) -> String {
    format!("prep:{}:tasks:q", stream.namespace())
}

pub fn key_queue_lock(stream: WorkStream) -> String {
    format!("prep:{}:lock", stream.namespace())
}

pub fn key_entities_queue(stream: WorkStream, rating_id: i64) -> String {
    format!("prep:{}:entities:q:{}", stream.namespace(), rating_id)
}

pub fn key_entity_lease(stream: WorkStream, task_id: i64, entity_id: i64) -> String {
    format!("prep:{}:eid:{}:{}", stream.namespace(), task_id, entity_id)
}

fn rotate_front<T>(queue: &mut Vec<T>) {
    if queue.len() > 1 {
        let head = queue.remove(0);
        queue.push(head);
    }
}

impl RatingPipeline {
    pub(crate) async fn cache_get_ids(&self, key: &str) -> Vec<i64> {
        let Some(payload) = self.cache.get(key, self.config.queue_ttl_sec).await else {
            return Vec::new();
        };
        rmp_serde::from_slice::<Vec<i64>>(&payload).unwrap_or_default()
    }

    pub(crate) async fn cache_set_ids(&self, key: &str, ids: &[i64]) {
        if let Ok(payload) = rmp_serde::to_vec_named(&ids.to_vec()) {
            self.cache.set(key, payload, self.config.queue_ttl_sec).await;
        }
    }

    pub(crate) fn lock_owner(&self, stream: WorkStream, role: &str) -> String {
        format!(
            "prep:{}:{}:{}",
            stream.namespace(),
            role,
            Uuid::new_v4().simple()
        )
    }

    /// Cola de jobs poblada: la existente, o reconstruida desde el ledger.
    async fn ensure_tasks_queue(&self, stream: WorkStream) -> Result<Vec<i64>, DbError> {
        let queue_key = key_tasks_queue(stream);

        let cached = self.cache_get_ids(&queue_key).await;
        if !cached.is_empty() {
            return Ok(cached);
        }

        let ledger = RatingJobRepository::new(self.database.get_connection()?);
        let rebuilt = ledger
            .build_queue(stream.kinds(), self.config.tasks_queue_limit)
            .await?;
        self.cache_set_ids(&queue_key, &rebuilt).await;
        Ok(rebuilt)
    }

    /// Pop atómico bajo el lock de cola. La decisión completa (drop de
    /// heads muertos, guard de admisión, DO/JUMP, need_fill) ocurre con el
    /// lock tomado; el trabajo (LLM + DB) ocurre fuera.
    pub async fn pop_batch(&self, stream: WorkStream) -> Result<PopOutcome, DbError> {
        let lock_key = key_queue_lock(stream);
        let owner = self.lock_owner(stream, "proc");
        let token = self
            .cache
            .lock_acquire_blocking(&lock_key, self.config.queue_lock_ttl, &owner)
            .await;

        let outcome = self.pop_batch_locked(stream).await;

        self.cache.lock_release(&lock_key, &token).await;
        outcome
    }

    async fn pop_batch_locked(&self, stream: WorkStream) -> Result<PopOutcome, DbError> {
        let queue_key = key_tasks_queue(stream);
        let mut queue = self.ensure_tasks_queue(stream).await?;
        if queue.is_empty() {
            return Ok(PopOutcome::Noop);
        }

        let ledger = RatingJobRepository::new(self.database.get_connection()?);
        let mut tries = queue.len();

        while tries > 0 && !queue.is_empty() {
            let rating_id = queue[0];

            let Some(job) = ledger.load_alive(rating_id, stream.kinds()).await? else {
                info!("🎯 [POP]: DROP rating_id={} (dead/done) -> rotate", rating_id);
                queue.remove(0);
                self.cache_set_ids(&queue_key, &queue).await;
                tries -= 1;
                continue;
            };

            let entities_key = key_entities_queue(stream, rating_id);
            let entity_queue = self.cache_get_ids(&entities_key).await;

            if !entity_queue.is_empty() {
                // guard de admisión: solo el stream contacts cerca del límite
                if job.kind == RatingKind::Contacts && !self.admission_check(&job).await? {
                    info!(
                        "🎯 [POP]: GUARD_SKIP rating_id={} task_id={} eq={} -> JUMP",
                        rating_id,
                        job.task_id,
                        entity_queue.len()
                    );
                    rotate_front(&mut queue);
                    self.cache_set_ids(&queue_key, &queue).await;
                    tries -= 1;
                    continue;
                }

                if rand::thread_rng().gen::<f64>() <= self.config.do_prob {
                    let take: Vec<i64> = entity_queue
                        .iter()
                        .take(self.config.batch_size)
                        .copied()
                        .collect();
                    let rest: Vec<i64> = entity_queue
                        .iter()
                        .skip(self.config.batch_size)
                        .copied()
                        .collect();
                    self.cache_set_ids(&entities_key, &rest).await;

                    info!(
                        "🎯 [POP]: HEAD rating_id={} task_id={} type={} eq={} -> DO take={} rest={}",
                        rating_id,
                        job.task_id,
                        job.kind.as_str(),
                        entity_queue.len(),
                        take.len(),
                        rest.len()
                    );
                    return Ok(PopOutcome::Work { job, ids: take });
                }

                info!(
                    "🎯 [POP]: HEAD rating_id={} task_id={} eq={} -> JUMP",
                    rating_id,
                    job.task_id,
                    entity_queue.len()
                );
                rotate_front(&mut queue);
                self.cache_set_ids(&queue_key, &queue).await;
                tries -= 1;
                continue;
            }

            info!(
                "🎯 [POP]: HEAD rating_id={} task_id={} eq=0 -> NEED_FILL",
                rating_id, job.task_id
            );
            return Ok(PopOutcome::NeedFill { job });
        }

        Ok(PopOutcome::Noop)
    }

    async fn admission_check(&self, job: &RatingJob) -> Result<bool, DbError> {
        let audience = AudienceRepository::new(self.database.get_connection()?);
        let Some(task) = audience.load(job.task_id).await? else {
            // la decisión de cierre por task_missing la toma el need_fill
            return Ok(true);
        };

        let ratings = RateContactsRepository::new(self.database.get_connection()?);
        let rated = ratings.rated_count(job.task_id).await?;
        let remaining = remaining_quota(task.subscribers_limit, self.config.batch_size as i64, rated);

        Ok(admission_allows(
            &mut rand::thread_rng(),
            remaining,
            self.config.batch_size as i64,
            self.config.guard_max_parallel,
        ))
    }

    /// Vaciado periódico de la cola de jobs: los muertos se lavan solos en
    /// el siguiente rebuild; las colas de entidades expiran por TTL.
    pub async fn reset_queues(&self, stream: WorkStream) {
        self.cache_set_ids(&key_tasks_queue(stream), &[]).await;
        info!(
            "🎯 [RESET]: prep:{}:tasks:q cleared (entities expire by TTL)",
            stream.namespace()
        );
    }
}
