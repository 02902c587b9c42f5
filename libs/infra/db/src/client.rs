// [libs/infra/db/src/client.rs]
/*!
 * =================================================================
 * APARATO: DATABASE CONNECTION CLIENT
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTIÓN DE ENLACES Y BOOTSTRAP DE ESQUEMA
 *
 * # Mathematical Proof (In-Memory Consistency):
 * En modo RAM el cliente abre el ancla de persistencia ANTES del
 * bootstrap, garantizando que el esquema resida en el segmento de
 * memoria compartido visible para todas las conexiones del proceso.
 * =================================================================
 */

use std::sync::Arc;

use libsql::{Builder, Connection, Database};
use tracing::{error, info};

use crate::errors::DbError;
use crate::schema::apply_full_schema;

#[derive(Clone)]
pub struct SerenityDb {
    internal_database_driver: Arc<Database>,
    /// Mantiene viva la base en memoria evitando que SQLite la purgue.
    _memory_persistence_anchor: Option<Arc<Connection>>,
}

impl SerenityDb {
    /// Conecta y aplica el esquema completo.
    ///
    /// `database_url`: ruta local (`file:...`), `:memory:` o remoto
    /// (`libsql://` / `https://` con token).
    pub async fn connect(database_url: &str, auth_token: Option<String>) -> Result<Self, DbError> {
        if database_url.is_empty() {
            return Err(DbError::ConnectionError("SERENITY_DATABASE_URL_UNDEFINED".into()));
        }

        info!("🔌 [DATABASE]: Initiating link to [{}]", database_url);

        let is_remote = database_url.starts_with("libsql://") || database_url.starts_with("https://");
        let is_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");

        let database_driver = if is_remote {
            let token = auth_token.ok_or_else(|| {
                DbError::ConnectionError("SECURITY_FAULT: remote access denied (token missing)".into())
            })?;
            Builder::new_remote(database_url.to_string(), token).build().await
        } else {
            Builder::new_local(database_url).build().await
        }
        .map_err(|fault| DbError::ConnectionError(format!("DRIVER_IGNITION_FAILURE: {fault}")))?;

        let shared_driver = Arc::new(database_driver);
        let mut anchor = None;

        if is_memory {
            let anchor_connection = shared_driver
                .connect()
                .map_err(|fault| DbError::ConnectionError(format!("ANCHOR_FAULT: {fault}")))?;

            apply_full_schema(&anchor_connection)
                .await
                .map_err(|fault| DbError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {fault}")))?;

            anchor = Some(Arc::new(anchor_connection));
            info!("⚓ [DATABASE]: Memory strata solidified and anchored.");
        } else {
            let bootstrap_connection = shared_driver
                .connect()
                .map_err(|fault| DbError::ConnectionError(format!("BOOTSTRAP_LINK_FAULT: {fault}")))?;
            apply_full_schema(&bootstrap_connection)
                .await
                .map_err(|fault| DbError::ConnectionError(format!("SCHEMA_SYNC_FAULT: {fault}")))?;
        }

        Ok(Self {
            internal_database_driver: shared_driver,
            _memory_persistence_anchor: anchor,
        })
    }

    pub fn get_connection(&self) -> Result<Connection, DbError> {
        self.internal_database_driver.connect().map_err(|fault| {
            error!("⚠️ [POOL_FAULT]: Connection allocation failed: {}", fault);
            DbError::ConnectionError(fault.to_string())
        })
    }
}
