// [libs/domain/rating/src/work.rs]
/*!
 * =================================================================
 * APARATO: LLM BATCH WORK PATH
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: LEASES, PAYLOAD, ORÁCULO Y UPSERT DEL LOTE
 *
 * Disciplina de fallos: salida inválida del oráculo descarta el lote
 * completo sin escrituras; los leases se liberan SIEMPRE (perderlos solo
 * cuesta gasto duplicado de LLM, jamás corrupción).
 * =================================================================
 */

use std::collections::HashMap;

use serde_json::{json, Value};
use tracing::{info, warn};

use serenity_domain_models::crawl::CellKind;
use serenity_domain_models::rating::{RatingJob, RatingKind};
use serenity_domain_models::task::{AudienceTask, TaskMode};
use serenity_infra_db::repositories::{AudienceRepository, CellRepository, ContactsRepository, RateContactsRepository};
use serenity_infra_db::DbError;
use serenity_infra_llm::prompts::{get_prompt, translate_text};
use serenity_infra_llm::rank::{parse_strict_ranked_list, validate_against_candidates};
use serenity_infra_llm::{AskSpec, ServiceTier};

use crate::queue::key_entity_lease;
use crate::{RatingPipeline, WorkStream};

const WORK_MODEL: &str = "maxi";

/// Campos del perfil `norm` que no aportan señal al oráculo.
const NORM_NOISE_KEYS: [&str; 5] = ["source_urls", "city", "plz", "email", "fax"];

/// Limpia el perfil para el payload: quita ruido y valores vacíos.
pub fn clean_norm(norm: &Value) -> Value {
    let Value::Object(map) = norm else {
        return json!({});
    };

    let mut cleaned = serde_json::Map::new();
    for (key, value) in map {
        if NORM_NOISE_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(kept) = drop_empty(value) {
            cleaned.insert(key.clone(), kept);
        }
    }
    Value::Object(cleaned)
}

fn drop_empty(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(Value::String(trimmed.to_string()))
            }
        }
        Value::Array(items) => {
            let kept: Vec<Value> = items.iter().filter_map(drop_empty).collect();
            if kept.is_empty() {
                None
            } else {
                Some(Value::Array(kept))
            }
        }
        Value::Object(map) => {
            let mut kept = serde_json::Map::new();
            for (key, inner) in map {
                if let Some(v) = drop_empty(inner) {
                    kept.insert(key.clone(), v);
                }
            }
            if kept.is_empty() {
                None
            } else {
                Some(Value::Object(kept))
            }
        }
        other => Some(other.clone()),
    }
}

/// Veredictos `{items:[{id, rate}]}` indexados por id; ids no numéricos
/// se ignoran (cuentan como bad en la escritura).
fn verdicts_by_id(oracle_data: &Value) -> HashMap<i64, i64> {
    let mut out = HashMap::new();
    let Some(items) = oracle_data.get("items").and_then(Value::as_array) else {
        return out;
    };

    for item in items {
        let Some(id) = item.get("id").and_then(Value::as_i64) else {
            continue;
        };
        if let Some(rate) = item.get("rate").and_then(Value::as_i64) {
            out.insert(id, rate);
        }
    }
    out
}

struct LeaseSet {
    reserved: Vec<i64>,
    tokens: Vec<(String, String)>,
}

impl RatingPipeline {
    /// Reserva leases por entidad; las no reservables se saltan (otro
    /// worker ya paga ese lote), el resto continúa.
    async fn reserve_entities(&self, stream: WorkStream, task_id: i64, ids: &[i64]) -> LeaseSet {
        let owner = self.lock_owner(stream, "work");
        let mut reserved = Vec::with_capacity(ids.len());
        let mut tokens = Vec::with_capacity(ids.len());

        for entity_id in ids {
            let lease_key = key_entity_lease(stream, task_id, *entity_id);
            let grant = self
                .cache
                .lock_try(&lease_key, self.config.entity_lock_ttl, &owner)
                .await;

            if let Some(grant) = grant {
                if grant.acquired {
                    if let Some(token) = grant.token {
                        reserved.push(*entity_id);
                        tokens.push((lease_key, token));
                    }
                }
            }
        }

        LeaseSet { reserved, tokens }
    }

    async fn release_leases(&self, leases: &LeaseSet) {
        for (lease_key, token) in &leases.tokens {
            self.cache.lock_release(lease_key, token).await;
        }
    }

    /// Camino de trabajo de un lote, fuera de todo lock de cola.
    pub async fn run_work(
        &self,
        stream: WorkStream,
        job: &RatingJob,
        ids: &[i64],
    ) -> Result<Value, DbError> {
        let audience = AudienceRepository::new(self.database.get_connection()?);
        let Some(task) = audience.load(job.task_id).await? else {
            self.close_job(job.id, "task_missing").await?;
            return Ok(json!({"mode": "closed", "reason": "task_missing"}));
        };

        let leases = self.reserve_entities(stream, job.task_id, ids).await;
        if leases.reserved.is_empty() {
            info!(
                "🎯 [WORK]: rating_id={} all {} entities leased elsewhere -> skip",
                job.id,
                ids.len()
            );
            return Ok(json!({"mode": "noop", "step": "all_leased"}));
        }

        let outcome = match job.kind {
            RatingKind::Contacts | RatingKind::ContactsUpdate => {
                self.work_contacts(job, &task, &leases.reserved).await
            }
            RatingKind::Geo | RatingKind::Branches => self.work_cells(job, &task, &leases.reserved).await,
        };

        self.release_leases(&leases).await;
        outcome
    }

    // -------------------- CONTACTS --------------------

    async fn contacts_instructions(&self, task: &AudienceTask) -> Option<String> {
        let prompt_name = match task.mode {
            TaskMode::Buy => "rate_contacts_buy",
            TaskMode::Sell => "rate_contacts_sell",
        };

        let base = get_prompt(&self.llm, prompt_name, "en").await;
        if base.is_empty() {
            return None;
        }

        // task y client viajan traducidos a DE dentro de instructions
        let task_de = translate_text(&self.llm, &task.task, "de").await;
        let client_de = translate_text(&self.llm, &task.task_client, "de").await;

        Some(format!(
            "{}\n\nTASK (DE):\n{}\n\nCLIENT (DE):\n{}",
            base,
            task_de.trim(),
            client_de.trim()
        ))
    }

    async fn work_contacts(
        &self,
        job: &RatingJob,
        task: &AudienceTask,
        ids: &[i64],
    ) -> Result<Value, DbError> {
        let Some(instructions) = self.contacts_instructions(task).await else {
            warn!("🎯 [WORK]: rating_id={} reason=prompt_empty", job.id);
            return Ok(json!({"mode": "error", "reason": "prompt_empty"}));
        };

        let contacts = ContactsRepository::new(self.database.get_connection()?);
        let payloads = contacts.load_company_payloads(ids).await?;
        if payloads.is_empty() {
            return Ok(json!({"mode": "noop", "step": "no_contacts_in_db"}));
        }

        let items: Vec<Value> = payloads
            .iter()
            .map(|(contact_id, document)| {
                let norm = document.get("norm").cloned().unwrap_or(json!({}));
                json!({"id": contact_id, "norm": clean_norm(&norm)})
            })
            .collect();

        info!(
            "🎯 [WORK]: BATCH rating_id={} task_id={} type={} send={}",
            job.id,
            job.task_id,
            job.kind.as_str(),
            items.len()
        );

        let oracle_text = match self
            .llm
            .ask(AskSpec {
                model: WORK_MODEL.into(),
                instructions,
                input: json!({"items": items}).to_string(),
                service_tier: ServiceTier::Flex,
                use_cache: false,
                user_id: task.user_id.to_string(),
            })
            .await
        {
            Ok(text) => text,
            Err(fault) => {
                warn!("🎯 [WORK]: FAIL rating_id={} step=oracle err={}", job.id, fault);
                return Ok(json!({"mode": "error", "reason": "oracle_exception"}));
            }
        };

        let Ok(oracle_data) = serde_json::from_str::<Value>(&oracle_text) else {
            warn!("🎯 [WORK]: FAIL rating_id={} step=parse_json", job.id);
            return Ok(json!({"mode": "error", "reason": "bad_json"}));
        };
        if !oracle_data.is_object() {
            warn!("🎯 [WORK]: FAIL rating_id={} step=parse_json", job.id);
            return Ok(json!({"mode": "error", "reason": "bad_json"}));
        }

        let verdicts = verdicts_by_id(&oracle_data);
        let allowed: Vec<i64> = payloads.iter().map(|(id, _)| *id).collect();

        let mut rows_to_write: Vec<(i64, i64)> = Vec::new();
        let mut bad = 0usize;
        for contact_id in &allowed {
            match verdicts.get(contact_id) {
                Some(rate) if (1..=100).contains(rate) => rows_to_write.push((*contact_id, *rate)),
                _ => bad += 1,
            }
        }

        if rows_to_write.is_empty() {
            return Ok(json!({"mode": "ok", "written": 0, "bad": bad}));
        }

        let ratings = RateContactsRepository::new(self.database.get_connection()?);
        let written = ratings
            .upsert_rates(job.task_id, job.target_hash, &rows_to_write)
            .await?;

        info!(
            "🎯 [WORK]: DB_OK rating_id={} task_id={} written={} bad={}",
            job.id, job.task_id, written, bad
        );
        Ok(json!({"mode": "ok", "written": written, "bad": bad}))
    }

    // -------------------- CELLS (GEO / BRANCHES) --------------------

    async fn cells_instructions(&self, job: &RatingJob, task: &AudienceTask) -> Option<String> {
        let (prompt_name, sub_label, sub_text) = match job.kind {
            RatingKind::Geo => ("audience_clar_city", "Geo task", task.task_geo.clone()),
            _ => ("audience_clar_branch", "Branches task", task.task_branches.clone()),
        };

        let base = get_prompt(&self.llm, prompt_name, "en").await;
        if base.is_empty() {
            return None;
        }

        Some(format!(
            "{}\n\nMain task:\n{}\n\n{}:\n{}",
            base,
            task.task.trim(),
            sub_label,
            sub_text.trim()
        ))
    }

    async fn work_cells(&self, job: &RatingJob, task: &AudienceTask, ids: &[i64]) -> Result<Value, DbError> {
        let kind = if job.kind == RatingKind::Geo {
            CellKind::City
        } else {
            CellKind::Branch
        };

        let Some(instructions) = self.cells_instructions(job, task).await else {
            warn!("🎯 [WORK]: rating_id={} reason=prompt_empty", job.id);
            return Ok(json!({"mode": "error", "reason": "prompt_empty"}));
        };

        let cells = CellRepository::new(self.database.get_connection()?);
        let named = cells.load_names(kind, ids).await?;
        if named.is_empty() {
            return Ok(json!({"mode": "noop", "step": "no_cells_in_db"}));
        }

        let candidates: HashMap<i64, String> = named.iter().cloned().collect();
        let candidate_items: Vec<Value> = named
            .iter()
            .map(|(id, name)| json!({"id": id, "name": name}))
            .collect();

        info!(
            "🎯 [WORK]: BATCH rating_id={} task_id={} type={} send={}",
            job.id,
            job.task_id,
            job.kind.as_str(),
            candidate_items.len()
        );

        let oracle_text = match self
            .llm
            .ask(AskSpec {
                model: WORK_MODEL.into(),
                instructions,
                input: format!(
                    "Candidates (rate ALL):\n{}",
                    Value::Array(candidate_items)
                ),
                service_tier: ServiceTier::Flex,
                use_cache: true,
                user_id: task.user_id.to_string(),
            })
            .await
        {
            Ok(text) => text,
            Err(fault) => {
                warn!("🎯 [WORK]: FAIL rating_id={} step=oracle err={}", job.id, fault);
                return Ok(json!({"mode": "error", "reason": "oracle_exception"}));
            }
        };

        // validación estricta fail-closed: un solo desvío anula el lote
        let Some(ranked) = parse_strict_ranked_list(&oracle_text) else {
            warn!("🎯 [WORK]: FAIL rating_id={} step=parse_ranked", job.id);
            return Ok(json!({"mode": "error", "reason": "bad_json"}));
        };

        let validated = validate_against_candidates(&ranked, &candidates);
        if validated.is_empty() {
            warn!("🎯 [WORK]: FAIL rating_id={} step=validate_ranked", job.id);
            return Ok(json!({"mode": "error", "reason": "bad_ranking"}));
        }

        let written = cells
            .upsert_cell_rates(job.task_id, kind, job.target_hash, &validated)
            .await?;

        info!(
            "🎯 [WORK]: DB_OK rating_id={} task_id={} type={} written={}",
            job.id,
            job.task_id,
            job.kind.as_str(),
            written
        );
        Ok(json!({"mode": "ok", "written": written}))
    }
}
