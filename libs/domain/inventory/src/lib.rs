// [libs/domain/inventory/src/lib.rs]
/*!
 * =================================================================
 * APARATO: QUEUE BUILDER (TOP-K DE CELDAS)
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: VENTANAS TOP-K MATERIALIZADAS Y SLICES MEMOIZADOS
 *
 * Las tres vistas cacheadas (crawler / expand / expand_full) comparten
 * versión = kt_hash(task): cualquier cambio de rates invalida el slice.
 * TTL aleatorio 2-4h para des-sincronizar recomputaciones de tenants.
 * =================================================================
 */

pub mod topk;

use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use serenity_domain_models::crawl::CellValue;
use serenity_infra_cache_client::memo::{memo, MemoSpec};
use serenity_infra_cache_client::CacheClient;
use serenity_infra_db::repositories::{CellRepository, InventoryRepository};
use serenity_infra_db::{DbError, SerenityDb};

use crate::topk::top_k_pairs;

/// Tope de la ventana materializada: acota memoria en tareas anchas.
pub const CB_WINDOW: usize = 100_000;
/// Tamaño de lote del enriquecimiento contra cb_crawler.
pub const CB_BATCH: usize = 1_000;
/// Radio de las vistas acotadas alrededor del primer no-colectado.
pub const CB_DIFF: usize = 1_000;

const FINGERPRINT_CRAWLER: &str = concat!(module_path!(), "::crawler_window");
const FINGERPRINT_EXPAND: &str = concat!(module_path!(), "::expand_window");
const FINGERPRINT_EXPAND_FULL: &str = concat!(module_path!(), "::expand_full_window");

fn ttl_2_4h_sec() -> u64 {
    rand::thread_rng().gen_range(2 * 60 * 60..=4 * 60 * 60)
}

/// Índice del primer valor no colectado; None si todo está colectado.
pub fn first_uncollected_idx(values: &[CellValue]) -> Option<usize> {
    values.iter().position(|value| !value.collected)
}

/// Vista "crawler": hasta 2×CB_DIFF celdas NO colectadas desde la primera
/// no colectada.
pub fn crawler_slice(values: &[CellValue]) -> Vec<CellValue> {
    let Some(first_idx) = first_uncollected_idx(values) else {
        return Vec::new();
    };

    values[first_idx..]
        .iter()
        .filter(|value| !value.collected)
        .take(2 * CB_DIFF)
        .copied()
        .collect()
}

/// Vista "expand": ventana ±CB_DIFF alrededor de la primera no colectada.
pub fn expand_slice(values: &[CellValue]) -> Vec<CellValue> {
    let Some(first_idx) = first_uncollected_idx(values) else {
        return Vec::new();
    };

    let lo = first_idx.saturating_sub(CB_DIFF);
    let hi = (first_idx + CB_DIFF).min(values.len());
    values[lo..hi].to_vec()
}

/// Vista "expand_full": prefijo hasta la primera no colectada inclusive;
/// la lista completa cuando ya no queda nada por colectar.
pub fn expand_full_slice(values: &[CellValue]) -> Vec<CellValue> {
    match first_uncollected_idx(values) {
        Some(first_idx) => values[..=first_idx].to_vec(),
        None => values.to_vec(),
    }
}

pub struct QueueBuilder {
    database: SerenityDb,
    cache: Arc<CacheClient>,
}

impl QueueBuilder {
    pub fn new(database: SerenityDb, cache: Arc<CacheClient>) -> Self {
        Self { database, cache }
    }

    /// Ventana completa ordenada (sin cache): top-K de productos de rates
    /// enriquecido con (cb_id, collected) del inventario del directorio.
    pub async fn build_cb_window_values(&self, task_id: i64, k: usize) -> Result<Vec<CellValue>, DbError> {
        let cells = CellRepository::new(self.database.get_connection()?);
        let inventory = InventoryRepository::new(self.database.get_connection()?);

        let plz_rates = cells.plz_rates(task_id).await?;
        let branch_rates = cells.branch_rates(task_id).await?;

        let pairs = top_k_pairs(&plz_rates, &branch_rates, k);
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let rate_of: std::collections::HashMap<(String, i64), i64> = pairs
            .iter()
            .map(|(plz, branch_id, score)| ((plz.clone(), *branch_id), *score))
            .collect();

        let keys: Vec<(String, i64)> = pairs
            .iter()
            .map(|(plz, branch_id, _)| (plz.clone(), *branch_id))
            .collect();

        let mut values: Vec<CellValue> = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(CB_BATCH) {
            for (plz, branch_id, cb_id, collected) in inventory.resolve_cells(chunk).await? {
                let Some(rate) = rate_of.get(&(plz, branch_id)).copied() else {
                    continue;
                };
                values.push(CellValue { cb_id, rate, collected });
            }
        }

        values.sort_by_key(|value| (value.rate, value.cb_id));
        debug!(
            "🧭 [CB_WINDOW]: task_id={} pairs={} resolved={}",
            task_id,
            pairs.len(),
            values.len()
        );
        Ok(values)
    }

    async fn kt_hash(&self, task_id: i64) -> Result<String, DbError> {
        CellRepository::new(self.database.get_connection()?)
            .kt_hash(task_id)
            .await
    }

    /// Vista crawler cacheada (clave compartida con put_crawler).
    pub async fn get_crawler(&self, task_id: i64) -> Result<Vec<CellValue>, DbError> {
        let version = self.kt_hash(task_id).await?;
        let spec = MemoSpec::new(FINGERPRINT_CRAWLER, version).ttl(ttl_2_4h_sec());

        memo(&self.cache, &("crawler", task_id), spec, || async {
            Ok(crawler_slice(&self.build_cb_window_values(task_id, CB_WINDOW).await?))
        })
        .await
    }

    /// Write-back de flags refrescados sobre la MISMA clave de la vista
    /// crawler (memo con update forzado).
    pub async fn put_crawler(&self, task_id: i64, values: Vec<CellValue>) -> Result<(), DbError> {
        let version = self.kt_hash(task_id).await?;
        let spec = MemoSpec::new(FINGERPRINT_CRAWLER, version)
            .ttl(ttl_2_4h_sec())
            .update(true);

        memo(&self.cache, &("crawler", task_id), spec, || async move {
            Ok::<Vec<CellValue>, DbError>(values)
        })
        .await?;
        Ok(())
    }

    pub async fn get_expand(&self, task_id: i64) -> Result<Vec<CellValue>, DbError> {
        let version = self.kt_hash(task_id).await?;
        let spec = MemoSpec::new(FINGERPRINT_EXPAND, version).ttl(ttl_2_4h_sec());

        memo(&self.cache, &("expand", task_id), spec, || async {
            Ok(expand_slice(&self.build_cb_window_values(task_id, CB_WINDOW).await?))
        })
        .await
    }

    /// El prefijo completo puede exceder el tope de valor del cache: en ese
    /// caso memo devuelve el valor sin cachear, lo cual es aceptable.
    pub async fn get_expand_full(&self, task_id: i64) -> Result<Vec<CellValue>, DbError> {
        let version = self.kt_hash(task_id).await?;
        let spec = MemoSpec::new(FINGERPRINT_EXPAND_FULL, version).ttl(ttl_2_4h_sec());

        memo(&self.cache, &("expand_full", task_id), spec, || async {
            Ok(expand_full_slice(&self.build_cb_window_values(task_id, CB_WINDOW).await?))
        })
        .await
    }
}
