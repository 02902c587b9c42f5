// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS ROOT
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE CONTRATOS DEL DOMINIO
 * =================================================================
 */

pub mod campaign;
pub mod contact;
pub mod crawl;
pub mod heartbeat;
pub mod rating;
pub mod task;
