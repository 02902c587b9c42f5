// [libs/domain/models/src/contact.rs]
/*!
 * =================================================================
 * APARATO: CONTACT AGGREGATE MODELS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: PERFIL NORMALIZADO Y SHARDS DE LA TABLA AGREGADA
 *
 * # Mathematical Proof (Monotonic Merge):
 * El merge de perfiles es monótono: escalares first-wins, arrays por
 * unión preservando orden de llegada, email colapsado por cardinalidad
 * (0 -> null, 1 -> string, N -> array). Una fila agregada nunca se parte.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Campo email del perfil normalizado: null, un valor, o varios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmailField {
    One(String),
    Many(Vec<String>),
}

/// Perfil `norm` dentro de `company_data` del agregado.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default)]
    pub source_urls: Vec<String>,
    #[serde(default)]
    pub branches: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plz: Option<String>,
    #[serde(default)]
    pub phone: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fax: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub socials: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Estado de datos de un agregado, derivado del perfil `norm`.
pub const STATUS_YES_WEB: &str = "YES WEB";
pub const STATUS_NO_WEB_YES_DESCR: &str = "NO WEB - YES DESCR";
pub const STATUS_NO_WEB_NO_DESCR: &str = "NO WEB - NO DESCR";

/// Fila agregada de contacto. Clave de dedup = email normalizado
/// (lowercase + trim); cada email no vacío mapea a lo sumo a una fila.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateContact {
    pub id: i64,
    pub email: String,
    pub company_name: Option<String>,
    pub cb_crawler_ids: Vec<i64>,
    pub sources: Vec<String>,
    pub branches: Vec<i64>,
    pub plz_list: Vec<String>,
    pub address_list: Vec<String>,
    /// Documento completo: `norm` + shards `gs-N` / `gpt-N`.
    pub company_data: Value,
    pub status_data: String,
}
