// [apps/engine/src/processors/validate.rs]
/*!
 * =================================================================
 * APARATO: VALIDATE PROCESSOR
 * CLASIFICACIÓN: APPLICATION (ESTRATO L1)
 * RESPONSABILIDAD: EMAIL + AGREGACIÓN + EXPANSIÓN + HASH-GUARD
 * =================================================================
 */

use std::collections::HashSet;
use std::sync::Arc;

use serenity_core_scheduler::{TaskSpec, Worker};
use serenity_domain_inventory::QueueBuilder;
use serenity_domain_rating::{RatingConfig, RatingPipeline};
use serenity_domain_validate::{Aggregator, EmailValidator, Expander};
use serenity_infra_llm::oracle::{LlmOracle, OracleReply, OracleRequest};
use serenity_infra_llm::{LlmClient, LlmError};

use crate::resolver::SystemMxResolver;
use crate::EngineContext;

/// Dominios de confianza que saltan la resolución MX.
const DOMAIN_ALLOWLIST: &str = include_str!("domains.json");

/// El validate no llama al oráculo; el hash-guard vive en la pipeline,
/// que exige un LlmClient. Este oráculo inerte lo deja explícito.
struct NoOracle;

impl LlmOracle for NoOracle {
    fn invoke<'a>(
        &'a self,
        _request: &'a OracleRequest,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<OracleReply, LlmError>> + Send + 'a>>
    {
        Box::pin(async {
            Err(LlmError::Validation("oracle not wired in validate processor".into()))
        })
    }
}

fn parse_allowlist() -> HashSet<String> {
    let parsed: Vec<serde_json::Value> = serde_json::from_str(DOMAIN_ALLOWLIST).unwrap_or_default();
    parsed
        .iter()
        .filter_map(|entry| entry.get("domain").and_then(serde_json::Value::as_str))
        .map(|domain| domain.trim().to_ascii_lowercase())
        .filter(|domain| !domain.is_empty())
        .collect()
}

pub async fn main(context: EngineContext) -> anyhow::Result<()> {
    let email_validator = Arc::new(EmailValidator::new(
        context.database.clone(),
        Arc::new(SystemMxResolver),
        parse_allowlist(),
    ));
    let aggregator = Arc::new(Aggregator::new(context.database.clone()));

    let queue_builder = QueueBuilder::new(context.database.clone(), Arc::clone(&context.cache));
    let expander = Arc::new(Expander::new(context.database.clone(), queue_builder));

    let pipeline = Arc::new(RatingPipeline::new(
        context.database.clone(),
        Arc::clone(&context.cache),
        LlmClient::new(Arc::new(NoOracle), Arc::clone(&context.cache)),
        RatingConfig::default(),
    ));

    let mut worker = Worker::new("core_validate_processor", 1.0, 4);

    {
        let email_validator = Arc::clone(&email_validator);
        worker.register(
            TaskSpec::new("val_email", 2).timeout_sec(120).priority(10),
            Arc::new(move || {
                let email_validator = Arc::clone(&email_validator);
                Box::pin(async move { Ok(email_validator.run_batch().await?) })
            }),
        )?;
    }

    {
        let aggregator = Arc::clone(&aggregator);
        worker.register(
            TaskSpec::new("val_aggregate", 2).timeout_sec(120).priority(20),
            Arc::new(move || {
                let aggregator = Arc::clone(&aggregator);
                Box::pin(async move { Ok(aggregator.run_batch().await?) })
            }),
        )?;
    }

    {
        let expander = Arc::clone(&expander);
        worker.register(
            TaskSpec::new("light_expand_rate_contacts", 2).timeout_sec(120).priority(5),
            Arc::new(move || {
                let expander = Arc::clone(&expander);
                Box::pin(async move { Ok(expander.light_run_once().await?) })
            }),
        )?;
    }

    {
        let expander = Arc::clone(&expander);
        worker.register(
            TaskSpec::new("full_reconcile_rate_contacts", 1200)
                .timeout_sec(1800)
                .heavy(true)
                .priority(3),
            Arc::new(move || {
                let expander = Arc::clone(&expander);
                Box::pin(async move { Ok(expander.full_reconcile_once().await?) })
            }),
        )?;
    }

    {
        let pipeline = Arc::clone(&pipeline);
        worker.register(
            TaskSpec::new("hash_guard_tasks", 1000).timeout_sec(600).priority(2),
            Arc::new(move || {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move { Ok(pipeline.run_hash_guard().await?) })
            }),
        )?;
    }

    {
        let expander = Arc::clone(&expander);
        worker.register(
            TaskSpec::new("mark_tasks_collected", 1200).timeout_sec(900).priority(1),
            Arc::new(move || {
                let expander = Arc::clone(&expander);
                Box::pin(async move { Ok(expander.mark_collected_once().await?) })
            }),
        )?;
    }

    {
        let expander = Arc::clone(&expander);
        worker.register(
            TaskSpec::new("enrich_priority_sync", 3600).timeout_sec(600).priority(50),
            Arc::new(move || {
                let expander = Arc::clone(&expander);
                Box::pin(async move { Ok(expander.sync_enrich_priorities().await?) })
            }),
        )?;
    }

    worker.run_forever().await;
    Ok(())
}
