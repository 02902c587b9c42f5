// [libs/domain/rating/src/autofill.rs]
/*!
 * =================================================================
 * APARATO: CELL AUTO-FILL
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: POBLADO 200/200 DE crawl_tasks VIA RANKING DEL ORÁCULO
 *
 * Inserciones idempotentes (ON CONFLICT DO NOTHING): repetir una ronda
 * jamás duplica celdas. El bucle corta cuando el inventario se agota.
 * =================================================================
 */

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::info;

use serenity_domain_models::crawl::CellKind;
use serenity_domain_models::task::AudienceTask;
use serenity_infra_db::repositories::{AudienceRepository, CellRepository};
use serenity_infra_db::DbError;
use serenity_infra_llm::prompts::get_prompt;
use serenity_infra_llm::rank::{parse_strict_ranked_list, validate_against_candidates};
use serenity_infra_llm::{AskSpec, ServiceTier};

use crate::RatingPipeline;

/// Celdas objetivo por tipo y tarea.
pub const CELLS_TARGET: i64 = 200;
/// Candidatos por ronda de ranking.
const ROUND_BATCH: u32 = 25;
/// Tope duro de rondas por tarea y tick.
const MAX_ROUNDS: usize = 200;
/// Modelo del ranking de celdas.
const RANK_MODEL: &str = "maxi";

impl RatingPipeline {
    /// Rellena city/branch hasta el objetivo para toda tarea activa.
    pub async fn run_cell_autofill(&self, limit_tasks: Option<u32>) -> Result<Value, DbError> {
        let audience = AudienceRepository::new(self.database.get_connection()?);
        let tasks = audience.processing_tasks(limit_tasks).await?;

        let mut report = Vec::new();
        for task in &tasks {
            let outcome = self.fill_task_cells(task).await?;
            report.push(outcome);
        }

        Ok(json!({"mode": "ok", "tasks": report}))
    }

    async fn fill_task_cells(&self, task: &AudienceTask) -> Result<Value, DbError> {
        let cells = CellRepository::new(self.database.get_connection()?);

        let mut city_count = cells.count_cells(task.id, CellKind::City).await?;
        let mut branch_count = cells.count_cells(task.id, CellKind::Branch).await?;
        let mut rounds = 0usize;

        while rounds < MAX_ROUNDS && (city_count < CELLS_TARGET || branch_count < CELLS_TARGET) {
            rounds += 1;

            if city_count < CELLS_TARGET {
                self.rank_and_insert_round(task, CellKind::City).await?;
                city_count = cells.count_cells(task.id, CellKind::City).await?;
            }

            if branch_count < CELLS_TARGET {
                self.rank_and_insert_round(task, CellKind::Branch).await?;
                branch_count = cells.count_cells(task.id, CellKind::Branch).await?;
            }

            // inventario agotado: seguir iterando no aporta nada
            if city_count < CELLS_TARGET
                && cells.pick_random_candidates(task.id, CellKind::City, 1).await?.is_empty()
            {
                break;
            }
            if branch_count < CELLS_TARGET
                && cells.pick_random_candidates(task.id, CellKind::Branch, 1).await?.is_empty()
            {
                break;
            }
        }

        info!(
            "🧭 [AUTOFILL]: task_id={} city={}/{} branch={}/{} rounds={}",
            task.id, city_count, CELLS_TARGET, branch_count, CELLS_TARGET, rounds
        );

        Ok(json!({
            "task_id": task.id,
            "city": city_count,
            "branch": branch_count,
            "rounds": rounds,
        }))
    }

    /// Una ronda: candidatos al azar -> ranking del oráculo -> insert.
    /// Ranking inválido (fail-closed) inserta cero y deja que la próxima
    /// ronda lo reintente.
    async fn rank_and_insert_round(&self, task: &AudienceTask, kind: CellKind) -> Result<usize, DbError> {
        let cells = CellRepository::new(self.database.get_connection()?);
        let candidates = cells.pick_random_candidates(task.id, kind, ROUND_BATCH).await?;
        if candidates.is_empty() {
            return Ok(0);
        }

        let (prompt_name, sub_label, sub_text) = match kind {
            CellKind::City => ("audience_clar_city", "Geo task", task.task_geo.as_str()),
            CellKind::Branch => ("audience_clar_branch", "Branches task", task.task_branches.as_str()),
        };

        let base = get_prompt(&self.llm, prompt_name, "en").await;
        if base.is_empty() {
            return Ok(0);
        }

        let candidate_json = serde_json::to_value(&candidates)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;

        let user_prompt = format!(
            "Main task:\n{}\n\n{}:\n{}\n\nCandidates (rate ALL):\n{}",
            task.task.trim(),
            sub_label,
            sub_text.trim(),
            candidate_json
        );

        let oracle_text = match self
            .llm
            .ask(AskSpec {
                model: RANK_MODEL.into(),
                instructions: base,
                input: user_prompt,
                service_tier: ServiceTier::Flex,
                use_cache: true,
                user_id: task.user_id.to_string(),
            })
            .await
        {
            Ok(text) => text,
            Err(_) => return Ok(0),
        };

        let Some(ranked) = parse_strict_ranked_list(&oracle_text) else {
            return Ok(0);
        };

        let candidate_names: HashMap<i64, String> = candidates
            .iter()
            .map(|candidate| (candidate.id, candidate.name.clone()))
            .collect();

        let validated = validate_against_candidates(&ranked, &candidate_names);
        if validated.is_empty() {
            return Ok(0);
        }

        cells.insert_ranked_cells(task, kind, &validated).await
    }
}
