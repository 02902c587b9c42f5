// [libs/infra/llm/src/rank.rs]
/*!
 * =================================================================
 * APARATO: STRICT RANKING VALIDATOR
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: VALIDACIÓN FAIL-CLOSED DEL RANKING DEL ORÁCULO
 *
 * Contrato de salida del oráculo (ranking de celdas):
 *   [{"id": <int>, "name": <str>, "rate": <int 1..100>}, ...]
 * sin fences ni texto alrededor. CUALQUIER desviación anula el lote
 * completo: ninguna fila inválida llega jamás a la base.
 * =================================================================
 */

use std::collections::{HashMap, HashSet};

use serde_json::Value;

/// Item validado del ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedItem {
    pub id: i64,
    pub name: String,
    pub rate: i64,
}

/// Parse estricto de la lista rankeada. None ante el menor desvío.
pub fn parse_strict_ranked_list(raw_content: &str) -> Option<Vec<RankedItem>> {
    let trimmed = raw_content.trim();
    if trimmed.is_empty() || trimmed.contains("```") {
        return None;
    }
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return None;
    }

    let parsed: Value = serde_json::from_str(trimmed).ok()?;
    let items = parsed.as_array()?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let object = item.as_object()?;

        let expected: HashSet<&str> = ["id", "name", "rate"].into_iter().collect();
        let actual: HashSet<&str> = object.keys().map(String::as_str).collect();
        if expected != actual {
            return None;
        }

        let id = object.get("id")?.as_i64()?;
        let rate = object.get("rate")?.as_i64()?;
        if !(1..=100).contains(&rate) {
            return None;
        }

        let name = object.get("name")?.as_str()?.trim();
        if name.is_empty() {
            return None;
        }

        out.push(RankedItem {
            id,
            name: name.to_string(),
            rate,
        });
    }

    Some(out)
}

/// Cruza el ranking contra el set de candidatos enviado: ids dentro del
/// set, nombres idénticos, sin duplicados. Fail-closed a lista vacía.
pub fn validate_against_candidates(
    ranked: &[RankedItem],
    candidates: &HashMap<i64, String>,
) -> Vec<(i64, i64)> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut out: Vec<(i64, i64)> = Vec::with_capacity(ranked.len());

    for item in ranked {
        let Some(expected_name) = candidates.get(&item.id) else {
            return Vec::new();
        };
        if expected_name != &item.name {
            return Vec::new();
        }
        if !seen.insert(item.id) {
            return Vec::new();
        }
        out.push((item.id, item.rate));
    }

    out
}
