// [libs/infra/cache-client/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CACHE CLIENT UPLINK
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: POOL DE CONEXIONES, BACK-OFF Y OPERACIONES DE CACHE
 *
 * # Mathematical Proof (Advisory Cache):
 * El cache es reconstructible: toda operación degrada a ausencia/no-op
 * cuando el daemon no responde. El circuito DOWN_UNTIL (50ms en timeout,
 * 500ms en fallo de conexión) acota el coste de una caída a un intento
 * por ventana, y el resto del sistema progresa sin el cache.
 * =================================================================
 */

pub mod memo;
pub mod pool;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_bytes::ByteBuf;
use thiserror::Error;
use tracing::debug;

use serenity_infra_cache_protocol::{CacheRequest, CacheResponse, MAX_VALUE_BYTES};

use crate::pool::ConnectionPool;

/// Timeout de cada RPC individual contra el daemon.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(1);
/// Back-off tras timeout de socket (el daemon vive pero va lento).
const TIMEOUT_BACKOFF_MS: u64 = 50;
/// Back-off tras error de conexión/IO (el daemon probablemente no está).
const FAIL_BACKOFF_MS: u64 = 500;

pub const POOL_SIZE: usize = 10;

#[derive(Error, Debug)]
pub enum CacheClientError {
    #[error("[L3_CACHE_CLIENT_FAULT]: RPC_TIMEOUT")]
    Timeout,

    #[error("[L3_CACHE_CLIENT_FAULT]: WIRE -> {0}")]
    Wire(#[from] serenity_infra_cache_protocol::codec::FrameError),
}

/// Resultado de una adquisición de lease.
#[derive(Debug, Clone)]
pub struct LockGrant {
    pub acquired: bool,
    pub token: Option<String>,
    pub held_by: Option<String>,
}

/// Vista del STATS del daemon.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub items: u64,
    pub locks: u64,
    pub total_bytes: u64,
    pub max_bytes: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Cliente del daemon. Estado mutable de proceso (circuito caído) vive como
/// campo atómico del servicio, no como global de módulo.
pub struct CacheClient {
    pool: ConnectionPool,
    down_until_ms: AtomicU64,
}

impl CacheClient {
    pub fn new(socket_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            pool: ConnectionPool::new(socket_path.into(), POOL_SIZE),
            down_until_ms: AtomicU64::new(0),
        }
    }

    /// Circuito abierto: toda llamada corta en seco hasta `down_until`.
    pub fn is_down(&self) -> bool {
        now_ms() < self.down_until_ms.load(Ordering::Relaxed)
    }

    fn open_circuit(&self, backoff_ms: u64) {
        self.down_until_ms.store(now_ms() + backoff_ms, Ordering::Relaxed);
    }

    /// RPC crudo con timeout + clasificación de fallos en el circuito.
    async fn call(&self, request: CacheRequest) -> Option<CacheResponse> {
        if self.is_down() {
            return None;
        }

        let mut connection = self.pool.acquire().await;

        let outcome = tokio::time::timeout(RPC_TIMEOUT, connection.call(&request)).await;

        match outcome {
            Ok(Ok(response)) => {
                self.pool.release(connection).await;
                Some(response)
            }
            Ok(Err(fault)) => {
                debug!("⚠️ [CACHE_UPLINK]: io fault, opening circuit: {}", fault);
                self.open_circuit(FAIL_BACKOFF_MS);
                self.pool.discard(connection);
                None
            }
            Err(_elapsed) => {
                debug!("⚠️ [CACHE_UPLINK]: rpc timeout, opening circuit");
                self.open_circuit(TIMEOUT_BACKOFF_MS);
                self.pool.discard(connection);
                None
            }
        }
    }

    // -------------------- CACHE SURFACE --------------------

    pub async fn get(&self, key: &str, ttl_sec: u64) -> Option<Vec<u8>> {
        let response = self
            .call(CacheRequest::Get {
                key: key.to_string(),
                ttl_sec: Some(ttl_sec),
            })
            .await?;

        match response {
            CacheResponse::Value { hit: true, payload: Some(payload) } => {
                let bytes = payload.into_vec();
                if bytes.len() > MAX_VALUE_BYTES {
                    return None;
                }
                Some(bytes)
            }
            _ => None,
        }
    }

    pub async fn set(&self, key: &str, payload: Vec<u8>, ttl_sec: u64) -> bool {
        if payload.is_empty() || payload.len() > MAX_VALUE_BYTES {
            return false;
        }

        let response = self
            .call(CacheRequest::Set {
                key: key.to_string(),
                payload: ByteBuf::from(payload),
                ttl_sec: Some(ttl_sec),
            })
            .await;

        matches!(response, Some(CacheResponse::Stored { stored: true, .. }))
    }

    pub async fn get_many(&self, keys: &[String], ttl_sec: u64) -> Vec<Option<Vec<u8>>> {
        if keys.is_empty() {
            return Vec::new();
        }

        let absent = || vec![None; keys.len()];

        let response = match self
            .call(CacheRequest::MGet {
                keys: keys.to_vec(),
                ttl_sec: Some(ttl_sec),
            })
            .await
        {
            Some(response) => response,
            None => return absent(),
        };

        match response {
            CacheResponse::Values { payloads } => {
                let mut out: Vec<Option<Vec<u8>>> = payloads
                    .into_iter()
                    .map(|maybe| {
                        maybe.map(ByteBuf::into_vec).filter(|b| b.len() <= MAX_VALUE_BYTES)
                    })
                    .collect();
                out.resize(keys.len(), None);
                out
            }
            _ => absent(),
        }
    }

    pub async fn set_many(&self, items: Vec<(String, Vec<u8>)>, ttl_sec: u64) -> u64 {
        let kept: Vec<(String, ByteBuf)> = items
            .into_iter()
            .filter(|(_, payload)| !payload.is_empty() && payload.len() <= MAX_VALUE_BYTES)
            .map(|(key, payload)| (key, ByteBuf::from(payload)))
            .collect();

        if kept.is_empty() {
            return 0;
        }

        match self
            .call(CacheRequest::SetMany { items: kept, ttl_sec: Some(ttl_sec) })
            .await
        {
            Some(CacheResponse::StoredMany { stored }) => stored,
            _ => 0,
        }
    }

    pub async fn delete_many(&self, keys: &[String]) -> u64 {
        if keys.is_empty() {
            return 0;
        }
        match self.call(CacheRequest::Del { keys: keys.to_vec() }).await {
            Some(CacheResponse::Deleted { removed }) => removed,
            _ => 0,
        }
    }

    pub async fn stats(&self) -> Option<CacheStats> {
        match self.call(CacheRequest::Stats).await? {
            CacheResponse::Stats { items, locks, total_bytes, max_bytes } => Some(CacheStats {
                items,
                locks,
                total_bytes,
                max_bytes,
            }),
            _ => None,
        }
    }

    // -------------------- LEASE SURFACE --------------------

    pub async fn lock_try(&self, key: &str, ttl: Duration, owner: &str) -> Option<LockGrant> {
        match self
            .call(CacheRequest::LockTry {
                key: key.to_string(),
                ttl_ms: ttl.as_millis() as u64,
                owner: owner.to_string(),
            })
            .await?
        {
            CacheResponse::LockAcquire { acquired, owner, token, .. } => Some(LockGrant {
                acquired,
                token,
                held_by: if acquired { None } else { owner },
            }),
            _ => None,
        }
    }

    pub async fn lock_renew(&self, key: &str, ttl: Duration, token: &str) -> bool {
        matches!(
            self.call(CacheRequest::LockRenew {
                key: key.to_string(),
                ttl_ms: ttl.as_millis() as u64,
                token: token.to_string(),
            })
            .await,
            Some(CacheResponse::LockRenewed { renewed: true, .. })
        )
    }

    pub async fn lock_release(&self, key: &str, token: &str) -> bool {
        matches!(
            self.call(CacheRequest::LockRelease {
                key: key.to_string(),
                token: token.to_string(),
            })
            .await,
            Some(CacheResponse::LockReleased { released: true, .. })
        )
    }

    pub async fn lock_status_held(&self, key: &str) -> Option<bool> {
        match self.call(CacheRequest::LockStatus { key: key.to_string() }).await? {
            CacheResponse::LockStatus { held, .. } => Some(held),
            _ => None,
        }
    }

    /// Adquisición bloqueante de un lock de cola: reintenta cada 100ms.
    /// Solo para locks de mutación de colas (secciones cortas).
    pub async fn lock_acquire_blocking(&self, key: &str, ttl: Duration, owner: &str) -> String {
        loop {
            if let Some(grant) = self.lock_try(key, ttl, owner).await {
                if grant.acquired {
                    if let Some(token) = grant.token {
                        return token;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
