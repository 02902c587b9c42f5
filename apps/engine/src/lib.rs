// [apps/engine/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ENGINE ROOT
 * CLASIFICACIÓN: APPLICATION (ESTRATO L1)
 * RESPONSABILIDAD: CONTEXTO COMPARTIDO Y PROCESADORES DEL MOTOR
 * =================================================================
 */

pub mod context;
pub mod processors;
pub mod resolver;

pub use context::EngineContext;
