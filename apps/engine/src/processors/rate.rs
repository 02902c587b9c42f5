// [apps/engine/src/processors/rate.rs]
/*!
 * =================================================================
 * APARATO: RATE PROCESSOR
 * CLASIFICACIÓN: APPLICATION (ESTRATO L1)
 * RESPONSABILIDAD: STREAM CONTACTS/CONTACTS_UPDATE + DONE + RESET
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

    let mut worker = Worker::new("core_rate_contacts_processor", 2.0, 5);

    {
        let pipeline = Arc::clone(&pipeline);
        worker.register(
            TaskSpec::new("rate_contacts_once", 2)
                .timeout_sec(TASK_TIMEOUT_SEC)
                .singleton(false)
                .priority(40),
            Arc::new(move || {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move { Ok(pipeline.run_once(WorkStream::Contacts).await?) })
            }),
        )?;
    }

    {
        let pipeline = Arc::clone(&pipeline);
        worker.register(
            TaskSpec::new("rate_contacts_done_scan", 20).timeout_sec(60).priority(60),
            Arc::new(move || {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move { Ok(pipeline.run_done_scan(WorkStream::Contacts).await?) })
            }),
        )?;
    }

    {
        let pipeline = Arc::clone(&pipeline);
        worker.register(
            TaskSpec::new("rate_contacts_reset_cache", 600).timeout_sec(30).priority(80),
            Arc::new(move || {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move {
                    pipeline.reset_queues(WorkStream::Contacts).await;
                    Ok(serde_json::json!({"mode": "ok"}))
                })
            }),
        )?;
    }

    worker.run_forever().await;
    Ok(())
}
