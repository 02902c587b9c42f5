// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DATABASE INFRA ROOT
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN DEL CLIENTE, ESQUEMA Y REPOSITORIOS
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::SerenityDb;
pub use errors::DbError;
