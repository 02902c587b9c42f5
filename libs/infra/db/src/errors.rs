// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de configuración de la base.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,

    /// La tarea de audiencia solicitada no existe.
    #[error("[L3_AUDIENCE_FAULT]: TASK_NOT_FOUND")]
    TaskNotFound,

    /// El conjunto de candidatos supera el tope de correctitud: datos
    /// corruptos aguas arriba, hay que fallar ruidosamente.
    #[error("[L3_RATING_FAULT]: TOO_MANY_CANDIDATES -> {what}: {count} > {cap}")]
    TooManyCandidates {
        what: &'static str,
        count: usize,
        cap: usize,
    },
}
