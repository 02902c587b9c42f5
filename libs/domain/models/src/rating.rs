// [libs/domain/models/src/rating.rs]
/*!
 * =================================================================
 * APARATO: RATING JOB MODELS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO DEL LEDGER APPEND-ONLY DE TRABAJOS DE RATING
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Tipo de trabajo de rating solicitado en `__tasks_rating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingKind {
    Geo,
    Branches,
    Contacts,
    ContactsUpdate,
}

impl RatingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingKind::Geo => "geo",
            RatingKind::Branches => "branches",
            RatingKind::Contacts => "contacts",
            RatingKind::ContactsUpdate => "contacts_update",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "geo" => Some(RatingKind::Geo),
            "branches" => Some(RatingKind::Branches),
            "contacts" => Some(RatingKind::Contacts),
            "contacts_update" => Some(RatingKind::ContactsUpdate),
            _ => None,
        }
    }

    /// Prefijo del espacio de claves de cache de este stream de trabajo.
    /// Los dos tipos de contacts comparten cola (como comparten candidatos).
    pub fn queue_namespace(&self) -> &'static str {
        match self {
            RatingKind::Geo => "geo",
            RatingKind::Branches => "branches",
            RatingKind::Contacts | RatingKind::ContactsUpdate => "contacts",
        }
    }
}

/// Registro append-only que solicita trabajo de rating. `done=false` más
/// reciente por tipo es la señal de "en curso"; los workers sellan done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingJob {
    pub id: i64,
    pub task_id: i64,
    pub kind: RatingKind,
    /// Huella objetivo del contexto; {NULL,-1,0,1} son marcadores inválidos.
    pub target_hash: i64,
}

/// Valoración de un contacto frente a una tarea (rate_cl ∈ [1,100]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRating {
    pub task_id: i64,
    pub contact_id: i64,
    pub rate_cl: i64,
    pub hash_task: i64,
}
