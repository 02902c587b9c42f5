// [libs/domain/validate/src/lib.rs]
/*!
 * =================================================================
 * APARATO: VALIDATE / AGGREGATE ROOT
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: EXPOSICIÓN DE VALIDADOR, AGREGADOR Y EXPANSOR
 * =================================================================
 */

pub mod aggregate;
pub mod email;
pub mod expand;

pub use aggregate::Aggregator;
pub use email::{EmailValidator, MxResolver};
pub use expand::Expander;
