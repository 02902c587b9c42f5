// [apps/cache-daemon/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CACHE DAEMON ROOT
 * CLASIFICACIÓN: INFRASTRUCTURE DAEMON (ESTRATO L3)
 * RESPONSABILIDAD: EXPOSICIÓN DEL NÚCLEO DE ESTADO Y DEL SERVIDOR
 * =================================================================
 */

pub mod server;
pub mod snapshot;
pub mod state;

pub use server::CacheDaemon;
pub use state::CacheState;
