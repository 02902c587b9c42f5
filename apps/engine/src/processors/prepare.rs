// [apps/engine/src/processors/prepare.rs]
/*!
 * =================================================================
 * APARATO: PREPARE PROCESSOR
 * CLASIFICACIÓN: APPLICATION (ESTRATO L1)
 * RESPONSABILIDAD: STREAMS GEO/BRANCHES + AUTO-FILL + DONE + RESET
 * =================================================================
 */

use std::sync::Arc;

use serenity_core_scheduler::{TaskSpec, Worker};
use serenity_domain_rating::{RatingConfig, RatingPipeline, WorkStream};

use crate::EngineContext;

const TASK_TIMEOUT_SEC: u64 = 900;

pub async fn main(context: EngineContext) -> anyhow::Result<()> {
    let llm = context.llm_client()?;
    let pipeline = Arc::new(RatingPipeline::new(
        context.database.clone(),
        Arc::clone(&context.cache),
        llm,
        RatingConfig::default(),
    ));

    let mut worker = Worker::new("prepare_cb_processor", 3.0, 16);

    {
        let pipeline = Arc::clone(&pipeline);
        worker.register(
            TaskSpec::new("prepare_geo", 2)
                .timeout_sec(TASK_TIMEOUT_SEC)
                .singleton(false)
                .priority(10),
            Arc::new(move || {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move { Ok(pipeline.run_once(WorkStream::Geo).await?) })
            }),
        )?;
    }

    {
        let pipeline = Arc::clone(&pipeline);
        worker.register(
            TaskSpec::new("prepare_branches", 3)
                .timeout_sec(TASK_TIMEOUT_SEC)
                .singleton(false)
                .priority(10),
            Arc::new(move || {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move { Ok(pipeline.run_once(WorkStream::Branches).await?) })
            }),
        )?;
    }

    {
        let pipeline = Arc::clone(&pipeline);
        worker.register(
            TaskSpec::new("prepare_cells_autofill", 600)
                .timeout_sec(TASK_TIMEOUT_SEC)
                .priority(20),
            Arc::new(move || {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move { Ok(pipeline.run_cell_autofill(None).await?) })
            }),
        )?;
    }

    {
        let pipeline = Arc::clone(&pipeline);
        worker.register(
            TaskSpec::new("prepare_done", 15)
                .timeout_sec(TASK_TIMEOUT_SEC)
                .priority(30),
            Arc::new(move || {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move {
                    let geo = pipeline.run_done_scan(WorkStream::Geo).await?;
                    let branches = pipeline.run_done_scan(WorkStream::Branches).await?;
                    Ok(serde_json::json!({"geo": geo, "branches": branches}))
                })
            }),
        )?;
    }

    {
        let pipeline = Arc::clone(&pipeline);
        worker.register(
            TaskSpec::new("prepare_reset_queues", 60).timeout_sec(30).priority(90),
            Arc::new(move || {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move {
                    pipeline.reset_queues(WorkStream::Geo).await;
                    pipeline.reset_queues(WorkStream::Branches).await;
                    Ok(serde_json::json!({"mode": "ok"}))
                })
            }),
        )?;
    }

    worker.run_forever().await;
    Ok(())
}
