// [libs/domain/validate/src/expand.rs]
/*!
 * =================================================================
 * APARATO: RATE-CONTACTS EXPANDER
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: SEMBRADO DE rate_contacts DESDE CELDAS COLECTADAS
 *
 * Dos estrategias sobre la misma ventana top-K:
 * - light: celdas recién colectadas del slice crawler (fetch continuo)
 * - full:  reconciliación del prefijo expand_full (pasada heavy)
 * Ambas siembran con la mejor celda por contacto (min rate_cb, min cb_id)
 * e inserciones idempotentes.
 * =================================================================
 */

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::info;

use serenity_domain_models::crawl::CellValue;
use serenity_domain_inventory::QueueBuilder;
use serenity_infra_db::repositories::{
    AudienceRepository, ContactsRepository, InventoryRepository, RateContactsRepository,
};
use serenity_infra_db::{DbError, SerenityDb};

const LIGHT_CB_BATCH: usize = 50;
const FULL_CB_BATCH: usize = 10;
/// Una tarea con este volumen de ratings queda sellada como colectada.
pub const MAX_RATE_CONTACTS_PER_TASK: i64 = 50_000;

pub struct Expander {
    database: SerenityDb,
    queue_builder: QueueBuilder,
}

impl Expander {
    pub fn new(database: SerenityDb, queue_builder: QueueBuilder) -> Self {
        Self {
            database,
            queue_builder,
        }
    }

    /// Mejor celda por contacto dentro del lote: (min rate_cb, min cb_id).
    fn best_cell_seeds(
        aggregates: &[(i64, Vec<i64>)],
        batch: &[(i64, i64)],
    ) -> Vec<(i64, i64, i64)> {
        let rate_of: HashMap<i64, i64> = batch.iter().copied().collect();

        let mut seeds = Vec::with_capacity(aggregates.len());
        for (contact_id, cell_ids) in aggregates {
            let best = cell_ids
                .iter()
                .filter_map(|cb_id| rate_of.get(cb_id).map(|rate| (*rate, *cb_id)))
                .min();
            if let Some((rate_cb, cb_id)) = best {
                seeds.push((*contact_id, cb_id, rate_cb));
            }
        }
        seeds
    }

    async fn seed_batch(&self, task_id: i64, batch: &[(i64, i64)]) -> Result<u64, DbError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let contacts = ContactsRepository::new(self.database.get_connection()?);
        let cb_ids: Vec<i64> = batch.iter().map(|(cb_id, _)| *cb_id).collect();
        let aggregates = contacts.aggregates_touching_cells(&cb_ids).await?;

        let seeds = Self::best_cell_seeds(&aggregates, batch);
        if seeds.is_empty() {
            return Ok(0);
        }

        let ratings = RateContactsRepository::new(self.database.get_connection()?);
        ratings.seed_from_cells(task_id, &seeds).await
    }

    /// Tick light: refresca flags de la vista crawler, siembra lo recién
    /// colectado y persiste los flags de vuelta.
    pub async fn light_run_once(&self) -> Result<Value, DbError> {
        let audience = AudienceRepository::new(self.database.get_connection()?);
        let Some(task_id) = audience.random_active_task_id().await? else {
            return Ok(json!({"mode": "noop"}));
        };

        let ratings = RateContactsRepository::new(self.database.get_connection()?);
        if !ratings.has_any(task_id).await? {
            // tarea virgen: directamente la reconciliación completa
            return self.full_reconcile_task(task_id).await;
        }

        let crawler_view = self.queue_builder.get_crawler(task_id).await?;
        if crawler_view.is_empty() {
            return Ok(json!({"mode": "noop", "step": "empty_crawler_view"}));
        }

        let inventory = InventoryRepository::new(self.database.get_connection()?);
        let cb_ids: Vec<i64> = crawler_view.iter().map(|value| value.cb_id).collect();
        let collected_now = inventory.collected_map(&cb_ids).await?;

        let mut newly_collected: Vec<(i64, i64)> = Vec::new();
        let mut refreshed: Vec<CellValue> = Vec::with_capacity(crawler_view.len());

        for value in &crawler_view {
            let now_collected = collected_now.get(&value.cb_id).copied().unwrap_or(value.collected);
            if !value.collected && now_collected {
                newly_collected.push((value.cb_id, value.rate));
            }
            refreshed.push(CellValue {
                cb_id: value.cb_id,
                rate: value.rate,
                collected: now_collected,
            });
        }

        let mut inserted = 0u64;
        for chunk in newly_collected.chunks(LIGHT_CB_BATCH) {
            inserted += self.seed_batch(task_id, chunk).await?;
        }

        if !newly_collected.is_empty() {
            info!(
                "🌱 [EXPAND_LIGHT]: task_id={} newly_collected={} inserted={}",
                task_id,
                newly_collected.len(),
                inserted
            );
        }

        self.queue_builder.put_crawler(task_id, refreshed).await?;
        Ok(json!({"mode": "ok", "newly_collected": newly_collected.len(), "inserted": inserted}))
    }

    /// Reconciliación completa del prefijo expand_full de una tarea.
    pub async fn full_reconcile_task(&self, task_id: i64) -> Result<Value, DbError> {
        let values = self.queue_builder.get_expand_full(task_id).await?;
        if values.is_empty() {
            return Ok(json!({"mode": "noop", "step": "empty_prefix"}));
        }

        let batch: Vec<(i64, i64)> = values.iter().map(|value| (value.cb_id, value.rate)).collect();

        let mut inserted = 0u64;
        for chunk in batch.chunks(FULL_CB_BATCH) {
            inserted += self.seed_batch(task_id, chunk).await?;
        }

        info!(
            "🌱 [EXPAND_FULL]: task_id={} values={} inserted={}",
            task_id,
            values.len(),
            inserted
        );
        Ok(json!({"mode": "ok", "values": values.len(), "inserted": inserted}))
    }

    /// Pasada heavy periódica sobre una tarea al azar.
    pub async fn full_reconcile_once(&self) -> Result<Value, DbError> {
        let audience = AudienceRepository::new(self.database.get_connection()?);
        match audience.random_active_task_id().await? {
            Some(task_id) => self.full_reconcile_task(task_id).await,
            None => Ok(json!({"mode": "noop"})),
        }
    }

    /// Sella como colectadas las tareas que alcanzaron el tope de ratings.
    pub async fn mark_collected_once(&self) -> Result<Value, DbError> {
        let audience = AudienceRepository::new(self.database.get_connection()?);
        let ratings = RateContactsRepository::new(self.database.get_connection()?);

        let mut marked = 0usize;
        for task_id in audience.active_task_ids().await? {
            if ratings
                .has_row_at_offset(task_id, MAX_RATE_CONTACTS_PER_TASK - 1)
                .await?
            {
                audience.mark_collected(task_id).await?;
                info!(
                    "🌱 [MARK]: task_id={} -> collected=true (limit={})",
                    task_id, MAX_RATE_CONTACTS_PER_TASK
                );
                marked += 1;
            }
        }

        Ok(json!({"mode": "ok", "marked": marked}))
    }

    /// Sincronización horaria del ledger de prioridad de enriquecimiento.
    pub async fn sync_enrich_priorities(&self) -> Result<Value, DbError> {
        let inventory = InventoryRepository::new(self.database.get_connection()?);
        inventory.sync_enrich_priorities().await?;
        Ok(json!({"mode": "ok"}))
    }
}
