// [libs/infra/cache-client/src/memo.rs]
/*!
 * =================================================================
 * APARATO: CONTENT-ADDRESSED MEMOIZATION
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: MEMO DETERMINISTA SOBRE EL CACHE-DAEMON
 *
 * # Mathematical Proof (Key Stability):
 * key = sha1(fingerprint | version | sha1(msgpack(query))). La huella de
 * función es el nombre módulo-calificado pasado por el call-site
 * (module_path!): renombrar la función ES invalidar su cache, por diseño.
 * =================================================================
 */

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::future::Future;

use serenity_infra_cache_protocol::{DEFAULT_TTL_SEC, MAX_VALUE_BYTES};

use crate::CacheClient;

/// Una query serializada jamás supera este tamaño; por encima se computa
/// directo sin cachear.
pub const MAX_QUERY_BYTES: usize = 32 * 1024;

const SET_MANY_CHUNK: usize = 200;

/// Parámetros de memoización de un call-site.
#[derive(Debug, Clone)]
pub struct MemoSpec {
    /// Nombre módulo-calificado estable del cómputo (p.ej.
    /// `concat!(module_path!(), "::build_cb_window")`).
    pub fingerprint: &'static str,
    /// Versión lógica: cambiarla invalida todo lo memorizado.
    pub version: String,
    pub ttl_sec: u64,
    /// true fuerza recomputar y sobreescribir (write-back).
    pub update: bool,
}

impl MemoSpec {
    pub fn new(fingerprint: &'static str, version: impl Into<String>) -> Self {
        Self {
            fingerprint,
            version: version.into(),
            ttl_sec: DEFAULT_TTL_SEC,
            update: false,
        }
    }

    pub fn ttl(mut self, ttl_sec: u64) -> Self {
        self.ttl_sec = ttl_sec;
        self
    }

    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }
}

fn sha1_hex(raw: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(raw);
    hex::encode(hasher.finalize())
}

/// Construye la clave content-addressed; None si la query no es cacheable.
pub fn memo_key<Q: Serialize>(query: &Q, spec: &MemoSpec) -> Option<String> {
    let raw = rmp_serde::to_vec_named(query).ok()?;
    if raw.len() > MAX_QUERY_BYTES {
        return None;
    }

    let query_hash = sha1_hex(&raw);
    let material = format!("{}|{}|{}", spec.fingerprint, spec.version, query_hash);
    Some(sha1_hex(material.as_bytes()))
}

/// Memoización de un cómputo. Semántica exacta:
/// - clave no construible -> computa directo;
/// - hit decodificable    -> devuelve el valor cacheado;
/// - miss o update        -> computa; si el encode falla o excede el tope,
///   devuelve el valor SIN cachear; si no, lo almacena con TTL.
///
/// Bajo caída del daemon cada llamada computa (el cache es advisory).
pub async fn memo<Q, R, E, F, Fut>(
    client: &CacheClient,
    query: &Q,
    spec: MemoSpec,
    compute: F,
) -> Result<R, E>
where
    Q: Serialize,
    R: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let key = match memo_key(query, &spec) {
        Some(key) => key,
        None => return compute().await,
    };

    if !spec.update {
        if let Some(payload) = client.get(&key, spec.ttl_sec).await {
            if let Ok(value) = rmp_serde::from_slice::<R>(&payload) {
                return Ok(value);
            }
        }
    }

    let value = compute().await?;

    if let Ok(encoded) = rmp_serde::to_vec_named(&value) {
        if encoded.len() <= MAX_VALUE_BYTES {
            client.set(&key, encoded, spec.ttl_sec).await;
        }
    }

    Ok(value)
}

/// Memo por lotes: produce pares `(query, value)` en orden NO definido.
/// Hits por MGET; misses computados y agrupados en SET_MANY por chunks.
pub async fn memo_many<Q, R, E, F, Fut>(
    client: &CacheClient,
    queries: Vec<Q>,
    spec: MemoSpec,
    mut compute: F,
) -> Result<Vec<(Q, R)>, E>
where
    Q: Serialize,
    R: Serialize + DeserializeOwned,
    F: FnMut(&Q) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let mut out: Vec<(Q, R)> = Vec::with_capacity(queries.len());

    // queries no cacheables se computan directo
    let mut keyed: Vec<(Q, String)> = Vec::with_capacity(queries.len());
    for query in queries {
        match memo_key(&query, &spec) {
            Some(key) => keyed.push((query, key)),
            None => {
                let value = compute(&query).await?;
                out.push((query, value));
            }
        }
    }

    while !keyed.is_empty() {
        let take = keyed.len().min(SET_MANY_CHUNK);
        let chunk: Vec<(Q, String)> = keyed.drain(..take).collect();

        let keys: Vec<String> = chunk.iter().map(|(_, key)| key.clone()).collect();
        let payloads = if spec.update {
            vec![None; keys.len()]
        } else {
            client.get_many(&keys, spec.ttl_sec).await
        };

        let mut to_store: Vec<(String, Vec<u8>)> = Vec::new();

        for ((query, key), payload) in chunk.into_iter().zip(payloads.into_iter()) {
            let cached = payload.and_then(|raw| rmp_serde::from_slice::<R>(&raw).ok());

            match cached {
                Some(value) => out.push((query, value)),
                None => {
                    let value = compute(&query).await?;
                    if let Ok(encoded) = rmp_serde::to_vec_named(&value) {
                        if encoded.len() <= MAX_VALUE_BYTES {
                            to_store.push((key, encoded));
                        }
                    }
                    out.push((query, value));
                }
            }
        }

        if !to_store.is_empty() {
            client.set_many(to_store, spec.ttl_sec).await;
        }
    }

    Ok(out)
}
