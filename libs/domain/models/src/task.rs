// [libs/domain/models/src/task.rs]
/*!
 * =================================================================
 * APARATO: AUDIENCE TASK MODELS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO SOBERANO DE LA ESPECIFICACIÓN DE AUDIENCIA
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Dirección comercial de la tarea: comprar o vender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Buy,
    Sell,
}

impl TaskMode {
    pub fn from_db(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "buy" => TaskMode::Buy,
            _ => TaskMode::Sell,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskMode::Buy => "buy",
            TaskMode::Sell => "sell",
        }
    }
}

/// Especificación de audiencia creada por el usuario al confirmar el "how".
///
/// Las huellas derivadas (`h64(task || task_geo)` etc.) NO viven aquí: se
/// calculan por contexto (geo/branches/client) en el punto de consumo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceTask {
    pub id: i64,
    pub workspace_id: String,
    pub user_id: i64,
    pub mode: TaskMode,
    /// Texto principal: a quién vender, dónde, qué.
    pub task: String,
    pub task_geo: String,
    pub task_branches: String,
    pub task_client: String,
    pub subscribers_limit: i64,
    pub run_processing: bool,
    pub collected: bool,
    pub archived: bool,
}

impl AudienceTask {
    /// Texto combinado para la huella del contexto de branches.
    pub fn fingerprint_text_branches(&self) -> String {
        format!("{}{}", self.task, self.task_branches)
    }

    /// Texto combinado para la huella del contexto geográfico.
    pub fn fingerprint_text_geo(&self) -> String {
        format!("{}{}", self.task, self.task_geo)
    }

    /// Texto combinado para la huella del contexto de cliente (contacts).
    pub fn fingerprint_text_client(&self) -> String {
        format!("{}{}", self.task, self.task_client)
    }
}
