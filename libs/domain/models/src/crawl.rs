// [libs/domain/models/src/crawl.rs]
/*!
 * =================================================================
 * APARATO: CRAWL INVENTORY MODELS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE CELDAS (PLZ × BRANCH) Y DESPACHO DE SPIDERS
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Tipo de valor puntuado en `crawl_tasks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    City,
    Branch,
}

impl CellKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellKind::City => "city",
            CellKind::Branch => "branch",
        }
    }
}

/// Valor materializado de la ventana top-K: `(cb_id, rate, collected)`.
///
/// El orden natural del dominio es `(rate asc, cb_id asc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellValue {
    pub cb_id: i64,
    pub rate: i64,
    pub collected: bool,
}

/// Elemento de la cola de despacho de spiders (cbq:list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub cb_crawler_id: i64,
    pub plz: String,
    pub branch_slug: String,
    pub task_id: i64,
}

/// Fila cruda emitida por un spider de directorio para una celda.
///
/// El JSON de origen se adjunta intacto: la agregación lo preserva como
/// shard (`gs-N`) y solo el campo `norm` se recalcula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub cb_crawler_id: i64,
    pub company_name: String,
    pub email: Option<String>,
    pub company_data: serde_json::Value,
}
