// [libs/domain/rating/src/lib.rs]
/*!
 * =================================================================
 * APARATO: RATING PIPELINE ROOT
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: COORDINACIÓN DE LOS DOS STREAMS DE RATING
 *
 * Dos corrientes paralelas — celdas (geo/branches) y contactos
 * (contacts/contacts_update) — coordinadas por colas en cache y leases
 * por entidad. El lock de cola protege SOLO la mutación de colas; jamás
 * se sostiene durante una llamada al oráculo ni una escritura de DB.
 * =================================================================
 */

pub mod autofill;
pub mod done;
pub mod fill;
pub mod guard;
pub mod queue;
pub mod work;

use std::sync::Arc;
use std::time::Duration;

use serenity_domain_models::rating::RatingKind;
use serenity_infra_cache_client::CacheClient;
use serenity_infra_db::SerenityDb;
use serenity_infra_llm::LlmClient;

/// Corriente de trabajo de la pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStream {
    Geo,
    Branches,
    Contacts,
}

impl WorkStream {
    /// Espacio de claves de cache del stream.
    pub fn namespace(&self) -> &'static str {
        match self {
            WorkStream::Geo => "geo",
            WorkStream::Branches => "branches",
            WorkStream::Contacts => "contacts",
        }
    }

    /// Tipos del ledger visibles para este stream.
    pub fn kinds(&self) -> &'static [RatingKind] {
        match self {
            WorkStream::Geo => &[RatingKind::Geo],
            WorkStream::Branches => &[RatingKind::Branches],
            WorkStream::Contacts => &[RatingKind::Contacts, RatingKind::ContactsUpdate],
        }
    }
}

/// Configuración operativa. El guard de paralelismo es configurable por
/// estar atado a la concurrencia real del scheduler.
#[derive(Debug, Clone)]
pub struct RatingConfig {
    pub batch_size: usize,
    /// Probabilidad de tomar lote con cola no vacía (el resto rota: eso
    /// reparte el turno entre tenants sin dejar morir de hambre a nadie).
    pub do_prob: f64,
    pub guard_max_parallel: i64,
    pub tasks_queue_limit: u32,
    pub done_scan_limit: u32,
    pub max_fill: u32,
    pub queue_ttl_sec: u64,
    pub queue_lock_ttl: Duration,
    pub entity_lock_ttl: Duration,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            do_prob: 0.70,
            guard_max_parallel: 10,
            tasks_queue_limit: 500,
            done_scan_limit: 200,
            max_fill: 1000,
            queue_ttl_sec: 60 * 60,
            queue_lock_ttl: Duration::from_secs(60),
            entity_lock_ttl: Duration::from_secs(900),
        }
    }
}

#[derive(Clone)]
pub struct RatingPipeline {
    pub(crate) database: SerenityDb,
    pub(crate) cache: Arc<CacheClient>,
    pub(crate) llm: LlmClient,
    pub(crate) config: RatingConfig,
}

impl RatingPipeline {
    pub fn new(database: SerenityDb, cache: Arc<CacheClient>, llm: LlmClient, config: RatingConfig) -> Self {
        Self {
            database,
            cache,
            llm,
            config,
        }
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    /// Un tick completo del stream: pop bajo lock, luego fill (lock corto)
    /// o trabajo LLM (sin lock), según toque.
    pub async fn run_once(
        &self,
        stream: WorkStream,
    ) -> Result<serde_json::Value, serenity_infra_db::DbError> {
        use serenity_core_crypto::fingerprint::fingerprint_is_valid;

        match self.pop_batch(stream).await? {
            queue::PopOutcome::Noop => Ok(serde_json::json!({"mode": "noop"})),
            queue::PopOutcome::NeedFill { job } => self.run_fill(stream, &job).await,
            queue::PopOutcome::Work { job, ids } => {
                // sanity: una huella objetivo reservada cierra el job aquí
                if !fingerprint_is_valid(Some(job.target_hash)) {
                    self.close_job(job.id, "bad_target_hash").await?;
                    return Ok(serde_json::json!({"mode": "closed", "reason": "bad_target_hash"}));
                }
                self.run_work(stream, &job, &ids).await
            }
        }
    }
}
