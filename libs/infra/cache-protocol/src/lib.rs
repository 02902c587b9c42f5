// [libs/infra/cache-protocol/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CACHE WIRE PROTOCOL
 * CLASIFICACIÓN: INFRASTRUCTURE CONTRACT (ESTRATO L3)
 * RESPONSABILIDAD: COMANDOS ETIQUETADOS Y FRAMING DEL CACHE-DAEMON
 *
 * # Mathematical Proof (Atomicity Window):
 * Cada frame transporta exactamente una operación; el daemon procesa un
 * frame por turno de su bucle único, por lo que toda operación es atómica
 * desde la perspectiva de cualquier cliente.
 * =================================================================
 */

pub mod codec;

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

// Límites fijos del daemon (contrato, no configuración).
pub const MAX_VALUE_BYTES: usize = 128 * 1024;
pub const MAX_CACHE_BYTES: u64 = 50 * 1024 * 1024;
pub const GC_TARGET_RATIO: f64 = 0.60;
pub const DEFAULT_TTL_SEC: u64 = 7 * 24 * 60 * 60;
pub const DEFAULT_LOCK_TTL_MS: u64 = 60_000;

/// Protección del protocolo: un request jamás supera este tamaño.
pub const MAX_REQUEST_BYTES: usize = 256 * 1024;

/// Tope del lado cliente para respuestas: un MGET de lote completo puede
/// transportar muchos valores al tope de 128KiB cada uno.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

/// Comando dirigido al daemon. La gran rama dinámica del origen se expresa
/// como unión etiquetada con matching exhaustivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheRequest {
    Get {
        key: String,
        /// TTL al que desliza la expiración en un hit.
        ttl_sec: Option<u64>,
    },
    Set {
        key: String,
        payload: ByteBuf,
        ttl_sec: Option<u64>,
    },
    Del {
        keys: Vec<String>,
    },
    #[serde(rename = "MGET")]
    MGet {
        keys: Vec<String>,
        ttl_sec: Option<u64>,
    },
    SetMany {
        items: Vec<(String, ByteBuf)>,
        ttl_sec: Option<u64>,
    },
    Stats,
    LockTry {
        key: String,
        ttl_ms: u64,
        owner: String,
    },
    LockRenew {
        key: String,
        ttl_ms: u64,
        token: String,
    },
    LockRelease {
        key: String,
        token: String,
    },
    LockStatus {
        key: String,
    },
}

/// Respuesta del daemon. `Error` cubre todo camino `ok=false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum CacheResponse {
    Error {
        err: String,
    },
    Value {
        hit: bool,
        payload: Option<ByteBuf>,
    },
    Stored {
        stored: bool,
        reason: Option<String>,
    },
    Values {
        payloads: Vec<Option<ByteBuf>>,
    },
    Deleted {
        removed: u64,
    },
    StoredMany {
        stored: u64,
    },
    Stats {
        items: u64,
        locks: u64,
        total_bytes: u64,
        max_bytes: u64,
    },
    LockAcquire {
        acquired: bool,
        owner: Option<String>,
        token: Option<String>,
        expire_in_ms: Option<u64>,
    },
    LockRenewed {
        renewed: bool,
        reason: Option<String>,
    },
    LockReleased {
        released: bool,
        reason: Option<String>,
    },
    LockStatus {
        held: bool,
        owner: Option<String>,
        token: Option<String>,
        expire_in_ms: Option<u64>,
    },
}
