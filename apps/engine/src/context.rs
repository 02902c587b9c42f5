// [apps/engine/src/context.rs]
/*!
 * =================================================================
 * APARATO: ENGINE CONTEXT
 * CLASIFICACIÓN: APPLICATION BOOTSTRAP (ESTRATO L1)
 * RESPONSABILIDAD: CONSTRUCCIÓN DE LOS SERVICIOS COMPARTIDOS DEL MOTOR
 * =================================================================
 */

use std::sync::Arc;

use serenity_infra_cache_client::CacheClient;
use serenity_infra_db::SerenityDb;
use serenity_infra_llm::oracle::HttpOracle;
use serenity_infra_llm::LlmClient;

/// Parámetros de arranque comunes a todos los procesadores.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub database_url: String,
    pub database_token: Option<String>,
    pub cache_socket: String,
}

/// Servicios compartidos ya conectados.
#[derive(Clone)]
pub struct EngineContext {
    pub database: SerenityDb,
    pub cache: Arc<CacheClient>,
}

impl EngineContext {
    /// Conecta base y cache. La conexión de base es fatal si falla; el
    /// cache es advisory y solo necesita la ruta del socket.
    pub async fn bootstrap(settings: &EngineSettings) -> anyhow::Result<Self> {
        let database = SerenityDb::connect(&settings.database_url, settings.database_token.clone()).await?;
        let cache = Arc::new(CacheClient::new(settings.cache_socket.clone()));

        Ok(Self { database, cache })
    }

    /// Gateway del oráculo real. La clave ausente es fatal en el arranque
    /// de los procesadores que lo necesitan (prepare / rate).
    pub fn llm_client(&self) -> anyhow::Result<LlmClient> {
        let oracle = HttpOracle::from_environment()?;
        Ok(LlmClient::new(Arc::new(oracle), Arc::clone(&self.cache)))
    }
}
