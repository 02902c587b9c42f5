// [libs/domain/validate/src/aggregate.rs]
/*!
 * =================================================================
 * APARATO: CONTACT AGGREGATOR
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: DEDUP POR EMAIL Y MERGE MONÓTONO DE PERFILES
 *
 * Invariantes:
 * - clave de dedup = email lowercase recortado; a lo sumo una fila por email
 * - merge monótono: escalares first-wins, arrays por unión, email colapsa
 *   por cardinalidad (0 -> null, 1 -> string, N -> array)
 * - cada fuente queda adjunta intacta como shard gs-N; solo `norm` se
 *   recalcula
 * =================================================================
 */

use serde_json::{json, Map, Value};
use tracing::info;

use serenity_domain_models::contact::{STATUS_NO_WEB_NO_DESCR, STATUS_NO_WEB_YES_DESCR, STATUS_YES_WEB};
use serenity_infra_db::repositories::contacts::AggregateRow;
use serenity_infra_db::repositories::ContactsRepository;
use serenity_infra_db::{DbError, SerenityDb};

const BATCH_SIZE: u32 = 100;
pub const SOURCE_NAME: &str = "GelbeSeiten";

fn trimmed(value: Option<&Value>) -> Option<String> {
    let text = value?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn string_list(value: Option<&Value>) -> Vec<Value> {
    value
        .and_then(Value::as_array)
        .map(|items| items.to_vec())
        .unwrap_or_default()
}

/// Unión preservando orden de llegada, sin duplicados ni nulls.
fn uniq_union(base: Vec<Value>, add: Vec<Value>) -> Vec<Value> {
    let mut out = base;
    for item in add {
        if item.is_null() {
            continue;
        }
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn uniq_union_typed<T: PartialEq + Clone>(base: &[T], add: &[T]) -> Vec<T> {
    let mut out = base.to_vec();
    for item in add {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Próxima clave de shard libre: gs-1, gs-2, ...
pub fn next_shard_key(company_data: &Map<String, Value>, prefix: &str) -> String {
    let mut index = 1usize;
    loop {
        let key = format!("{prefix}-{index}");
        if !company_data.contains_key(&key) {
            return key;
        }
        index += 1;
    }
}

/// Perfil `norm` construido desde una fila cruda del directorio.
pub fn build_norm(company_name: &str, src: &Value) -> Value {
    let source_url = trimmed(src.get("source_url"));
    json!({
        "company_name": trimmed(Some(&Value::String(company_name.to_string()))),
        "source_urls": source_url.map(|u| vec![u]).unwrap_or_default(),
        "branches": string_list(src.get("branches")),
        "address": trimmed(src.get("address")).or_else(|| trimmed(src.get("address_text"))),
        "city": trimmed(src.get("city")),
        "plz": trimmed(src.get("plz")),
        "phone": string_list(src.get("phone")),
        "email": src.get("email").cloned().unwrap_or(Value::Null),
        "fax": src.get("fax").cloned().unwrap_or(Value::Null),
        "website": trimmed(src.get("website")),
        "socials": string_list(src.get("socials")),
        "description": trimmed(src.get("description")),
    })
}

/// Merge monótono de perfiles `norm`.
pub fn merge_norm(dst: &Value, src: &Value) -> Value {
    let mut out = dst.as_object().cloned().unwrap_or_default();
    let src_map = src.as_object().cloned().unwrap_or_default();

    // escalares: solo si el destino está vacío
    for key in ["company_name", "address", "city", "plz", "website", "fax", "description"] {
        let dst_is_empty = trimmed(out.get(key)).is_none();
        if dst_is_empty {
            out.insert(key.to_string(), src_map.get(key).cloned().unwrap_or(Value::Null));
        }
    }

    // arrays: unión única
    for key in ["source_urls", "phone", "socials", "branches"] {
        let merged = uniq_union(string_list(out.get(key)), string_list(src_map.get(key)));
        out.insert(key.to_string(), Value::Array(merged));
    }

    // email: colapso por cardinalidad
    let to_list = |value: Option<&Value>| -> Vec<Value> {
        match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(single) => vec![single.clone()],
        }
    };

    let emails = uniq_union(to_list(out.get("email")), to_list(src_map.get("email")));
    let email_value = match emails.len() {
        0 => Value::Null,
        1 => emails.into_iter().next().unwrap_or(Value::Null),
        _ => Value::Array(emails),
    };
    out.insert("email".to_string(), email_value);

    Value::Object(out)
}

/// Estado de datos derivado del perfil: web > descripción > nada.
pub fn calc_status(norm: &Value) -> &'static str {
    if trimmed(norm.get("website")).is_some() {
        return STATUS_YES_WEB;
    }
    if trimmed(norm.get("description")).is_some() {
        return STATUS_NO_WEB_YES_DESCR;
    }
    STATUS_NO_WEB_NO_DESCR
}

pub struct Aggregator {
    database: SerenityDb,
}

impl Aggregator {
    pub fn new(database: SerenityDb) -> Self {
        Self { database }
    }

    /// Un lote de agregación de filas crudas con email OK.
    pub async fn run_batch(&self) -> Result<Value, DbError> {
        let contacts = ContactsRepository::new(self.database.get_connection()?);
        let raw_rows = contacts.pick_ok_unprocessed(BATCH_SIZE).await?;

        let mut inserted = 0usize;
        let mut merged = 0usize;

        for raw in &raw_rows {
            let email_norm = raw.email.trim().to_lowercase();

            let Some((branch_id, cb_plz)) = contacts.cell_of(raw.cb_crawler_id).await? else {
                // celda huérfana: la fila queda para inspección manual
                continue;
            };

            let src_json = if raw.company_data.is_object() {
                raw.company_data.clone()
            } else {
                json!({})
            };

            let norm_src = build_norm(&raw.company_name, &src_json);

            let mut plz_add: Vec<String> = Vec::new();
            if let Some(plz) = trimmed(src_json.get("plz")) {
                plz_add.push(plz);
            }
            let cell_plz = cb_plz.trim().to_string();
            if !cell_plz.is_empty() {
                plz_add.push(cell_plz);
            }

            let mut addr_add: Vec<String> = Vec::new();
            if let Some(addr) =
                trimmed(src_json.get("address")).or_else(|| trimmed(src_json.get("address_text")))
            {
                addr_add.push(addr);
            }

            match contacts.find_aggregate_by_email(&email_norm).await? {
                None => {
                    let company_data = json!({"norm": norm_src, "gs-1": src_json});
                    let status = calc_status(&company_data["norm"]);

                    contacts
                        .insert_aggregate(
                            &email_norm,
                            raw.company_name.trim(),
                            &[raw.cb_crawler_id],
                            &[SOURCE_NAME.to_string()],
                            &[branch_id],
                            &plz_add,
                            &addr_add,
                            &company_data,
                            status,
                        )
                        .await?;
                    inserted += 1;
                }
                Some(existing) => {
                    let mut company_data = existing.company_data.as_object().cloned().unwrap_or_default();

                    let shard_key = next_shard_key(&company_data, "gs");
                    company_data.insert(shard_key, src_json.clone());

                    let merged_norm = merge_norm(
                        company_data.get("norm").unwrap_or(&Value::Null),
                        &norm_src,
                    );
                    let status = calc_status(&merged_norm);
                    company_data.insert("norm".to_string(), merged_norm);

                    let updated = AggregateRow {
                        id: existing.id,
                        cb_crawler_ids: uniq_union_typed(&existing.cb_crawler_ids, &[raw.cb_crawler_id]),
                        sources: uniq_union_typed(&existing.sources, &[SOURCE_NAME.to_string()]),
                        branches: uniq_union_typed(&existing.branches, &[branch_id]),
                        plz_list: uniq_union_typed(&existing.plz_list, &plz_add),
                        address_list: uniq_union_typed(&existing.address_list, &addr_add),
                        company_data: Value::Object(company_data),
                    };

                    contacts.update_aggregate(&updated, status).await?;
                    merged += 1;
                }
            }

            contacts.mark_raw_processed(raw.id).await?;
        }

        if !raw_rows.is_empty() {
            info!(
                "🧬 [AGGREGATE]: batch={} inserted={} merged={}",
                raw_rows.len(),
                inserted,
                merged
            );
        }

        Ok(json!({"mode": "ok", "batch": raw_rows.len(), "inserted": inserted, "merged": merged}))
    }
}
