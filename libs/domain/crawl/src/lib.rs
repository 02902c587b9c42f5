// [libs/domain/crawl/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CRAWL COORDINATOR
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: COLA DE DESPACHO ROUND-ROBIN Y ALIMENTACIÓN DE SPIDERS
 *
 * Disciplina de lock: el lock cbq:lock cubre SOLO pop/rebuild de la cola;
 * el spider corre fuera del lock. Cola vacía = skip (el siguiente rebuild
 * la rellena). Junto a la cola viaja el reverse-map cb_id -> task_id para
 * atribuir resultados aguas abajo.
 * =================================================================
 */

pub mod robin;
pub mod spider;

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use serenity_domain_inventory::QueueBuilder;
use serenity_domain_models::crawl::{CellValue, QueueItem};
use serenity_infra_cache_client::CacheClient;
use serenity_infra_db::repositories::{
    AudienceRepository, ContactsRepository, InventoryRepository, RateContactsRepository,
};
use serenity_infra_db::{DbError, SerenityDb};

pub use spider::Spider;

/// Tope combinado de la cola reconstruida.
pub const QUEUE_BUILD_LIMIT: usize = 500;
/// Tope de picks por tarea en un rebuild.
pub const PER_TASK_PICK_LIMIT: usize = 500;
/// Una tarea con menos ratings que este umbral es "underdone" y monopoliza
/// la cola hasta nivelarse.
pub const RATE_CONTACTS_PRIORITY_OFFSET: i64 = 50;
/// Umbral de filas crudas para promover prio 1 -> 2.
pub const PRIO_PROMOTE_THRESHOLD: i64 = 1000;
pub const PRIO_PROMOTE_BATCH_LIMIT: u32 = 200;

const CBQ_LIST_KEY: &str = "cbq:list";
const CB2TASK_PREFIX: &str = "cbq:cb2task:";
const QUEUE_LOCK_KEY: &str = "cbq:lock";
const QUEUE_TTL_SEC: u64 = 60 * 60;
const LOCK_TTL: std::time::Duration = std::time::Duration::from_secs(60);

pub struct CrawlCoordinator {
    database: SerenityDb,
    cache: Arc<CacheClient>,
    queue_builder: QueueBuilder,
    spider: Arc<dyn Spider>,
}

impl CrawlCoordinator {
    pub fn new(
        database: SerenityDb,
        cache: Arc<CacheClient>,
        queue_builder: QueueBuilder,
        spider: Arc<dyn Spider>,
    ) -> Self {
        Self {
            database,
            cache,
            queue_builder,
            spider,
        }
    }

    // -------------------- CACHE DE LA COLA --------------------

    async fn cache_get_queue(&self) -> Vec<QueueItem> {
        let Some(payload) = self.cache.get(CBQ_LIST_KEY, QUEUE_TTL_SEC).await else {
            return Vec::new();
        };
        rmp_serde::from_slice::<Vec<QueueItem>>(&payload).unwrap_or_default()
    }

    async fn cache_set_queue(&self, items: &[QueueItem]) {
        if let Ok(payload) = rmp_serde::to_vec_named(&items.to_vec()) {
            self.cache.set(CBQ_LIST_KEY, payload, QUEUE_TTL_SEC).await;
        }
    }

    async fn cache_set_cb2task(&self, cb_crawler_id: i64, task_id: i64) {
        if let Ok(payload) = rmp_serde::to_vec_named(&task_id) {
            let key = format!("{CB2TASK_PREFIX}{cb_crawler_id}");
            self.cache.set(&key, payload, QUEUE_TTL_SEC).await;
        }
    }

    pub async fn reset_queue(&self) -> Value {
        self.cache_set_queue(&[]).await;
        info!("🕷️  [CBQ]: RESET cbq:list cleared");
        json!({"mode": "ok"})
    }

    // -------------------- SELECCIÓN DE OBJETIVOS --------------------

    async fn task_is_underdone(&self, task_id: i64) -> Result<bool, DbError> {
        let ratings = RateContactsRepository::new(self.database.get_connection()?);
        Ok(!ratings
            .has_row_at_offset(task_id, RATE_CONTACTS_PRIORITY_OFFSET)
            .await?)
    }

    /// Tareas objetivo: las underdone monopolizan; si no hay, compiten todas.
    async fn target_task_ids(&self, active: &[i64]) -> Result<(String, Vec<i64>), DbError> {
        let mut underdone = Vec::new();
        for task_id in active {
            if self.task_is_underdone(*task_id).await? {
                underdone.push(*task_id);
            }
        }

        if !underdone.is_empty() {
            return Ok((
                format!("A_UNDERDONE_LT_{}", RATE_CONTACTS_PRIORITY_OFFSET + 1),
                underdone,
            ));
        }
        Ok((
            format!("B_ALL_GE_{}", RATE_CONTACTS_PRIORITY_OFFSET + 1),
            active.to_vec(),
        ))
    }

    /// Refresca flags de la vista crawler contra el inventario, persiste el
    /// write-back y devuelve los cb_id aún no colectados (hasta `limit`).
    async fn refresh_crawler_and_pick(&self, task_id: i64, limit: usize) -> Result<Vec<i64>, DbError> {
        let crawler_view = self.queue_builder.get_crawler(task_id).await?;
        if crawler_view.is_empty() {
            return Ok(Vec::new());
        }

        let inventory = InventoryRepository::new(self.database.get_connection()?);
        let cb_ids: Vec<i64> = crawler_view.iter().map(|value| value.cb_id).collect();
        let collected_now = inventory.collected_map(&cb_ids).await?;

        let mut refreshed: Vec<CellValue> = Vec::with_capacity(crawler_view.len());
        let mut picked: Vec<i64> = Vec::new();

        for value in &crawler_view {
            let now_collected = collected_now.get(&value.cb_id).copied().unwrap_or(value.collected);
            refreshed.push(CellValue {
                cb_id: value.cb_id,
                rate: value.rate,
                collected: now_collected,
            });
            if !now_collected && picked.len() < limit {
                picked.push(value.cb_id);
            }
        }

        self.queue_builder.put_crawler(task_id, refreshed).await?;
        Ok(picked)
    }

    // -------------------- REBUILD --------------------

    async fn rebuild_queue(&self) -> Result<Vec<QueueItem>, DbError> {
        let audience = AudienceRepository::new(self.database.get_connection()?);
        let active = audience.active_task_ids().await?;
        info!("🕷️  [CBQ]: rebuild active_tasks={}", active.len());

        if active.is_empty() {
            return Ok(Vec::new());
        }

        let (mode, targets) = self.target_task_ids(&active).await?;
        info!(
            "🕷️  [CBQ]: rebuild mode={} target_tasks={} build_limit={}",
            mode,
            targets.len(),
            QUEUE_BUILD_LIMIT
        );

        let mut picked: Vec<(i64, Vec<i64>)> = Vec::new();
        for task_id in &targets {
            let cb_ids = self
                .refresh_crawler_and_pick(*task_id, PER_TASK_PICK_LIMIT)
                .await?;
            if !cb_ids.is_empty() {
                picked.push((*task_id, cb_ids));
            }
        }

        let interleaved = robin::round_robin_one_by_one(picked, QUEUE_BUILD_LIMIT);

        let inventory = InventoryRepository::new(self.database.get_connection()?);
        let all_cb_ids: Vec<i64> = interleaved.iter().map(|(cb_id, _)| *cb_id).collect();
        let meta = inventory.meta_map(&all_cb_ids).await?;

        let mut out: Vec<QueueItem> = Vec::with_capacity(interleaved.len());
        let mut missing_meta = 0usize;
        for (cb_id, task_id) in interleaved {
            let Some((plz, branch_slug)) = meta.get(&cb_id) else {
                missing_meta += 1;
                continue;
            };
            out.push(QueueItem {
                cb_crawler_id: cb_id,
                plz: plz.clone(),
                branch_slug: branch_slug.clone(),
                task_id,
            });
        }

        info!(
            "🕷️  [CBQ]: rebuild done out={} meta_miss={}",
            out.len(),
            missing_meta
        );
        Ok(out)
    }

    // -------------------- TICK DEL WORKER --------------------

    /// Un tick: pop del head bajo lock corto; spider síncrono fuera del
    /// lock; ingesta de filas emitidas y sellado de la celda.
    pub async fn worker_run_once(&self) -> Result<Value, DbError> {
        let owner = format!("crawl_cb:{}", Uuid::new_v4().simple());
        let token = self
            .cache
            .lock_acquire_blocking(QUEUE_LOCK_KEY, LOCK_TTL, &owner)
            .await;

        let popped = self.pop_head_locked().await;

        self.cache.lock_release(QUEUE_LOCK_KEY, &token).await;

        let item = match popped {
            Ok(Some(item)) => item,
            Ok(None) => {
                info!("🕷️  [CBQ]: queue empty; nothing to do");
                return Ok(json!({"mode": "noop"}));
            }
            Err(fault) => return Err(fault),
        };

        info!(
            "🕷️  [CBQ]: pop cb_crawler_id={} task_id={} plz='{}' branch='{}'",
            item.cb_crawler_id, item.plz, item.branch_slug, item.task_id
        );

        let emitted = match self.spider.crawl(&item).await {
            Ok(rows) => rows,
            Err(fault) => {
                warn!(
                    "🕷️  [CBQ]: spider fault cb_crawler_id={} err={}",
                    item.cb_crawler_id, fault
                );
                return Ok(json!({"mode": "error", "reason": "spider_fault"}));
            }
        };

        let contacts = ContactsRepository::new(self.database.get_connection()?);
        let ingested = contacts.insert_raw_candidates(&emitted).await?;

        let inventory = InventoryRepository::new(self.database.get_connection()?);
        inventory
            .mark_cell_collected(item.cb_crawler_id, ingested as i64)
            .await?;

        info!(
            "🕷️  [CBQ]: collected cb_crawler_id={} rows={}",
            item.cb_crawler_id, ingested
        );
        Ok(json!({"mode": "ok", "cb_crawler_id": item.cb_crawler_id, "rows": ingested}))
    }

    async fn pop_head_locked(&self) -> Result<Option<QueueItem>, DbError> {
        let mut queue = self.cache_get_queue().await;
        if queue.is_empty() {
            queue = self.rebuild_queue().await?;
            self.cache_set_queue(&queue).await;
        }

        if queue.is_empty() {
            return Ok(None);
        }

        let item = queue.remove(0);
        self.cache_set_queue(&queue).await;
        self.cache_set_cb2task(item.cb_crawler_id, item.task_id).await;

        // atribución durable del despacho
        let inventory = InventoryRepository::new(self.database.get_connection()?);
        inventory.record_dispatch(item.task_id, item.cb_crawler_id).await?;

        Ok(Some(item))
    }

    // -------------------- LEDGER DE PRIORIDAD --------------------

    pub async fn seed_priorities_once(&self) -> Result<Value, DbError> {
        let inventory = InventoryRepository::new(self.database.get_connection()?);
        inventory.seed_priorities().await?;
        Ok(json!({"mode": "ok"}))
    }

    pub async fn promote_priorities_once(&self) -> Result<Value, DbError> {
        let inventory = InventoryRepository::new(self.database.get_connection()?);
        let updated = inventory
            .promote_priorities(PRIO_PROMOTE_THRESHOLD, PRIO_PROMOTE_BATCH_LIMIT)
            .await?;
        info!(
            "🕷️  [PRIO]: promote updated={} batch_limit={}",
            updated, PRIO_PROMOTE_BATCH_LIMIT
        );
        Ok(json!({"mode": "ok", "updated": updated}))
    }
}
