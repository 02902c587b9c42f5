// [libs/infra/cache-client/src/pool.rs]
/*!
 * =================================================================
 * APARATO: CONNECTION POOL
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: REUSO DE CONEXIONES FRAMED AL SOCKET DEL DAEMON
 *
 * Disciplina: acquire entrega una conexión libre o crea una nueva (la
 * creación por encima del cupo está permitida; release la descarta si el
 * pool ya está lleno). Una conexión que falló se descarta siempre.
 * =================================================================
 */

use std::path::PathBuf;

use tokio::net::UnixStream;
use tokio::sync::Mutex;

use serenity_infra_cache_protocol::codec::{self, FrameError};
use serenity_infra_cache_protocol::{CacheRequest, CacheResponse, MAX_RESPONSE_BYTES};

/// Conexión perezosa: el stream se abre en la primera llamada.
pub struct PooledConnection {
    socket_path: PathBuf,
    stream: Option<UnixStream>,
}

impl PooledConnection {
    fn new(socket_path: PathBuf) -> Self {
        Self { socket_path, stream: None }
    }

    async fn ensure(&mut self) -> Result<&mut UnixStream, FrameError> {
        if self.stream.is_none() {
            let stream = UnixStream::connect(&self.socket_path).await?;
            self.stream = Some(stream);
        }
        Ok(self.stream.as_mut().expect("just ensured"))
    }

    /// Un request, una respuesta, misma conexión. La lectura usa el tope
    /// de respuestas (los MGET de lote pueden superar el tope de request).
    pub async fn call(&mut self, request: &CacheRequest) -> Result<CacheResponse, FrameError> {
        let stream = self.ensure().await?;
        codec::write_message(stream, request).await?;
        codec::read_message_with_limit(stream, MAX_RESPONSE_BYTES).await
    }
}

pub struct ConnectionPool {
    socket_path: PathBuf,
    free: Mutex<Vec<PooledConnection>>,
    capacity: usize,
}

impl ConnectionPool {
    pub fn new(socket_path: PathBuf, capacity: usize) -> Self {
        Self {
            socket_path,
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub async fn acquire(&self) -> PooledConnection {
        let mut free = self.free.lock().await;
        free.pop()
            .unwrap_or_else(|| PooledConnection::new(self.socket_path.clone()))
    }

    pub async fn release(&self, connection: PooledConnection) {
        let mut free = self.free.lock().await;
        if free.len() < self.capacity {
            free.push(connection);
        }
        // pool lleno: la conexión se cierra al salir de scope
    }

    /// Conexión sospechosa: jamás vuelve al pool.
    pub fn discard(&self, connection: PooledConnection) {
        drop(connection);
    }
}
