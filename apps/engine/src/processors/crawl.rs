// [apps/engine/src/processors/crawl.rs]
/*!
 * =================================================================
 * APARATO: CRAWL PROCESSOR
 * CLASIFICACIÓN: APPLICATION (ESTRATO L1)
 * RESPONSABILIDAD: DESPACHO DE SPIDERS + LEDGER DE PRIORIDAD
 * =================================================================
 */

use std::sync::Arc;

use serenity_core_scheduler::{TaskSpec, Worker};
use serenity_domain_crawl::{spider::NullSpider, CrawlCoordinator};
use serenity_domain_inventory::QueueBuilder;

use crate::EngineContext;

const TASK_TIMEOUT_SEC: u64 = 900;

const PRIO_SEED_EVERY_SEC: u64 = 60;
const PRIO_PROMOTE_EVERY_SEC: u64 = 60 * 60;

pub async fn main(context: EngineContext) -> anyhow::Result<()> {
    let queue_builder = QueueBuilder::new(context.database.clone(), Arc::clone(&context.cache));

    // el spider HTML real es un colaborador externo; sin él, la cola se
    // drena con el spider nulo (celdas selladas con cero filas)
    let coordinator = Arc::new(CrawlCoordinator::new(
        context.database.clone(),
        Arc::clone(&context.cache),
        queue_builder,
        Arc::new(NullSpider),
    ));

    let mut worker = Worker::new("cb_processor", 0.5, 5);

    {
        let coordinator = Arc::clone(&coordinator);
        worker.register(
            TaskSpec::new("gs_cb_spider", 1)
                .timeout_sec(TASK_TIMEOUT_SEC)
                .singleton(false)
                .priority(40),
            Arc::new(move || {
                let coordinator = Arc::clone(&coordinator);
                Box::pin(async move { Ok(coordinator.worker_run_once().await?) })
            }),
        )?;
    }

    {
        let coordinator = Arc::clone(&coordinator);
        worker.register(
            TaskSpec::new("db_prio_seed", PRIO_SEED_EVERY_SEC).timeout_sec(30).priority(5),
            Arc::new(move || {
                let coordinator = Arc::clone(&coordinator);
                Box::pin(async move { Ok(coordinator.seed_priorities_once().await?) })
            }),
        )?;
    }

    {
        let coordinator = Arc::clone(&coordinator);
        worker.register(
            TaskSpec::new("db_prio_promote", PRIO_PROMOTE_EVERY_SEC)
                .timeout_sec(600)
                .priority(6),
            Arc::new(move || {
                let coordinator = Arc::clone(&coordinator);
                Box::pin(async move { Ok(coordinator.promote_priorities_once().await?) })
            }),
        )?;
    }

    worker.run_forever().await;
    Ok(())
}
