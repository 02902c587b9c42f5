// [apps/engine/src/processors/mod.rs]
/*!
 * =================================================================
 * APARATO: PROCESSORS REGISTRY
 * CLASIFICACIÓN: APPLICATION (ESTRATO L1)
 * RESPONSABILIDAD: PROCESADORES DE LARGA VIDA DEL MOTOR
 * =================================================================
 */

pub mod crawl;
pub mod prepare;
pub mod rate;
pub mod validate;
