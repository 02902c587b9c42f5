// [apps/cache-daemon/src/state.rs]
/*!
 * =================================================================
 * APARATO: CACHE STATE KERNEL
 * CLASIFICACIÓN: INFRASTRUCTURE DAEMON (ESTRATO L3)
 * RESPONSABILIDAD: SEMÁNTICA PURA DE CACHE, LEASES Y EVICCIÓN
 *
 * # Mathematical Proof (OOM Impossibility):
 * Todo SET está acotado por MAX_VALUE_BYTES y el total por
 * MAX_CACHE_BYTES; al superar el presupuesto, la evicción ordena por
 * (-size, expire_at, last_access) y drena hasta el 60%. El estado nunca
 * puede crecer sin límite.
 *
 * El kernel es puro respecto al reloj: todo método recibe `now_ms`
 * (epoch millis), lo que hace la semántica certificable sin dormir.
 * =================================================================
 */

use std::collections::HashMap;

use serde_bytes::ByteBuf;
use uuid::Uuid;

use serenity_infra_cache_protocol::{
    CacheRequest, CacheResponse, DEFAULT_TTL_SEC, GC_TARGET_RATIO, MAX_CACHE_BYTES, MAX_VALUE_BYTES,
};

/// Entrada de cache viva (dumpeable).
#[derive(Debug, Clone)]
pub struct Entry {
    pub payload: Vec<u8>,
    pub size: u64,
    pub expire_at_ms: u64,
    pub last_access_ms: u64,
}

/// Lease volátil de coordinación (jamás se dumpea ni cuenta en memoria).
#[derive(Debug, Clone)]
pub struct Lease {
    pub owner: String,
    pub token: String,
    pub expire_at_ms: u64,
}

/// Contadores por periodo para el alive-log; se resetean al emitir.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeriodCounters {
    pub evicted: u64,
    pub expired: u64,
    pub errors: u64,
}

#[derive(Debug, Default)]
pub struct CacheState {
    data: HashMap<String, Entry>,
    locks: HashMap<String, Lease>,
    total_bytes: u64,
    pub counters: PeriodCounters,
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> usize {
        self.data.len()
    }

    pub fn locks_held(&self) -> usize {
        self.locks.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn take_counters(&mut self) -> PeriodCounters {
        std::mem::take(&mut self.counters)
    }

    /// Vista de entradas vivas para el snapshot de apagado.
    pub fn live_entries(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.data.iter()
    }

    /// Reinyección desde snapshot. El llamador ya validó la entrada.
    pub fn restore_entry(&mut self, key: String, entry: Entry) {
        self.total_bytes += entry.size;
        self.data.insert(key, entry);
    }

    fn drop_entry(&mut self, key: &str) {
        if let Some(entry) = self.data.remove(key) {
            self.total_bytes -= entry.size;
        }
    }

    /// Barrido de expiración: cache y leases.
    pub fn expire_sweep(&mut self, now_ms: u64) {
        let dead_keys: Vec<String> = self
            .data
            .iter()
            .filter(|(_, e)| now_ms >= e.expire_at_ms)
            .map(|(k, _)| k.clone())
            .collect();

        for key in dead_keys {
            self.drop_entry(&key);
            self.counters.expired += 1;
        }

        // Leases expirados no cuentan en la métrica de cache.
        self.locks.retain(|_, lease| now_ms < lease.expire_at_ms);
    }

    /// Evicción por tamaño: grandes primero, luego los que mueren antes,
    /// luego los menos accedidos; drena hasta el objetivo del 60%.
    pub fn run_eviction(&mut self, now_ms: u64) {
        self.expire_sweep(now_ms);

        if self.total_bytes <= MAX_CACHE_BYTES {
            return;
        }

        let target = (MAX_CACHE_BYTES as f64 * GC_TARGET_RATIO) as u64;

        let mut victims: Vec<(String, u64, u64, u64)> = self
            .data
            .iter()
            .map(|(k, e)| (k.clone(), e.size, e.expire_at_ms, e.last_access_ms))
            .collect();
        victims.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(a.2.cmp(&b.2))
                .then(a.3.cmp(&b.3))
        });

        for (key, _size, _exp, _acc) in victims {
            if self.total_bytes <= target {
                break;
            }
            self.drop_entry(&key);
            self.counters.evicted += 1;
        }
    }

    /// Normaliza TTL de request: ausente o 0 cae al default de 7 días.
    fn effective_ttl_ms(ttl_sec: Option<u64>) -> u64 {
        let ttl = match ttl_sec {
            Some(v) if v > 0 => v,
            _ => DEFAULT_TTL_SEC,
        };
        ttl.saturating_mul(1000)
    }

    fn new_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    // -------------------- CACHE OPS --------------------

    fn op_get(&mut self, key: &str, ttl_sec: Option<u64>, now_ms: u64) -> CacheResponse {
        let ttl_ms = Self::effective_ttl_ms(ttl_sec);

        let expired = match self.data.get(key) {
            None => {
                return CacheResponse::Value { hit: false, payload: None };
            }
            Some(entry) => now_ms >= entry.expire_at_ms,
        };

        if expired {
            self.drop_entry(key);
            self.counters.expired += 1;
            return CacheResponse::Value { hit: false, payload: None };
        }

        let entry = self.data.get_mut(key).expect("checked above");
        entry.last_access_ms = now_ms;
        entry.expire_at_ms = now_ms + ttl_ms;

        CacheResponse::Value {
            hit: true,
            payload: Some(ByteBuf::from(entry.payload.clone())),
        }
    }

    fn op_set(&mut self, key: String, payload: Vec<u8>, ttl_sec: Option<u64>, now_ms: u64) -> CacheResponse {
        let size = payload.len() as u64;
        if size == 0 || size > MAX_VALUE_BYTES as u64 {
            return CacheResponse::Stored {
                stored: false,
                reason: Some("too_big".into()),
            };
        }

        let ttl_ms = Self::effective_ttl_ms(ttl_sec);

        self.drop_entry(&key);
        self.data.insert(
            key,
            Entry {
                payload,
                size,
                expire_at_ms: now_ms + ttl_ms,
                last_access_ms: now_ms,
            },
        );
        self.total_bytes += size;

        if self.total_bytes > MAX_CACHE_BYTES {
            self.run_eviction(now_ms);
        }

        CacheResponse::Stored { stored: true, reason: None }
    }

    // -------------------- LEASE OPS --------------------

    fn op_lock_try(&mut self, key: String, ttl_ms: u64, owner: String, now_ms: u64) -> CacheResponse {
        if owner.is_empty() {
            return CacheResponse::Error { err: "bad_owner".into() };
        }
        if ttl_ms == 0 {
            return CacheResponse::Error { err: "bad_ttl".into() };
        }

        if let Some(current) = self.locks.get(&key) {
            if now_ms < current.expire_at_ms {
                return CacheResponse::LockAcquire {
                    acquired: false,
                    owner: Some(current.owner.clone()),
                    token: Some(current.token.clone()),
                    expire_in_ms: Some(current.expire_at_ms - now_ms),
                };
            }
        }

        let token = Self::new_token();
        self.locks.insert(
            key,
            Lease {
                owner: owner.clone(),
                token: token.clone(),
                expire_at_ms: now_ms + ttl_ms,
            },
        );

        CacheResponse::LockAcquire {
            acquired: true,
            owner: Some(owner),
            token: Some(token),
            expire_in_ms: Some(ttl_ms),
        }
    }

    fn op_lock_renew(&mut self, key: &str, ttl_ms: u64, token: &str, now_ms: u64) -> CacheResponse {
        if token.is_empty() {
            return CacheResponse::Error { err: "bad_token".into() };
        }
        if ttl_ms == 0 {
            return CacheResponse::Error { err: "bad_ttl".into() };
        }

        match self.locks.get_mut(key) {
            None => CacheResponse::LockRenewed {
                renewed: false,
                reason: Some("not_held".into()),
            },
            Some(lease) if now_ms >= lease.expire_at_ms => {
                self.locks.remove(key);
                CacheResponse::LockRenewed {
                    renewed: false,
                    reason: Some("not_held".into()),
                }
            }
            Some(lease) if lease.token != token => CacheResponse::LockRenewed {
                renewed: false,
                reason: Some("token_mismatch".into()),
            },
            Some(lease) => {
                lease.expire_at_ms = now_ms + ttl_ms;
                CacheResponse::LockRenewed { renewed: true, reason: None }
            }
        }
    }

    fn op_lock_release(&mut self, key: &str, token: &str, now_ms: u64) -> CacheResponse {
        if token.is_empty() {
            return CacheResponse::Error { err: "bad_token".into() };
        }

        match self.locks.get(key) {
            None => CacheResponse::LockReleased {
                released: false,
                reason: Some("not_held".into()),
            },
            Some(lease) if now_ms >= lease.expire_at_ms => {
                self.locks.remove(key);
                CacheResponse::LockReleased {
                    released: false,
                    reason: Some("not_held".into()),
                }
            }
            Some(lease) if lease.token != token => CacheResponse::LockReleased {
                released: false,
                reason: Some("token_mismatch".into()),
            },
            Some(_) => {
                self.locks.remove(key);
                CacheResponse::LockReleased { released: true, reason: None }
            }
        }
    }

    fn op_lock_status(&mut self, key: &str, now_ms: u64) -> CacheResponse {
        match self.locks.get(key) {
            Some(lease) if now_ms < lease.expire_at_ms => CacheResponse::LockStatus {
                held: true,
                owner: Some(lease.owner.clone()),
                token: Some(lease.token.clone()),
                expire_in_ms: Some(lease.expire_at_ms - now_ms),
            },
            Some(_) => {
                self.locks.remove(key);
                CacheResponse::LockStatus {
                    held: false,
                    owner: None,
                    token: None,
                    expire_in_ms: None,
                }
            }
            None => CacheResponse::LockStatus {
                held: false,
                owner: None,
                token: None,
                expire_in_ms: None,
            },
        }
    }

    // -------------------- DISPATCH --------------------

    /// Procesa una operación completa. Atómico por construcción: el bucle
    /// del daemon entrega una request por turno.
    pub fn handle(&mut self, request: CacheRequest, now_ms: u64) -> CacheResponse {
        match request {
            CacheRequest::Stats => {
                self.expire_sweep(now_ms);
                CacheResponse::Stats {
                    items: self.data.len() as u64,
                    locks: self.locks.len() as u64,
                    total_bytes: self.total_bytes,
                    max_bytes: MAX_CACHE_BYTES,
                }
            }

            CacheRequest::Get { key, ttl_sec } => {
                if key.is_empty() {
                    return CacheResponse::Error { err: "bad_key".into() };
                }
                self.op_get(&key, ttl_sec, now_ms)
            }

            CacheRequest::Set { key, payload, ttl_sec } => {
                if key.is_empty() {
                    return CacheResponse::Error { err: "bad_key".into() };
                }
                self.op_set(key, payload.into_vec(), ttl_sec, now_ms)
            }

            CacheRequest::Del { keys } => {
                let mut removed = 0u64;
                for key in keys {
                    if self.data.contains_key(&key) {
                        self.drop_entry(&key);
                        removed += 1;
                    }
                }
                CacheResponse::Deleted { removed }
            }

            CacheRequest::MGet { keys, ttl_sec } => {
                let payloads = keys
                    .iter()
                    .map(|key| match self.op_get(key, ttl_sec, now_ms) {
                        CacheResponse::Value { hit: true, payload } => payload,
                        _ => None,
                    })
                    .collect();
                CacheResponse::Values { payloads }
            }

            CacheRequest::SetMany { items, ttl_sec } => {
                let mut stored = 0u64;
                for (key, payload) in items {
                    if key.is_empty() {
                        continue;
                    }
                    if let CacheResponse::Stored { stored: true, .. } =
                        self.op_set(key, payload.into_vec(), ttl_sec, now_ms)
                    {
                        stored += 1;
                    }
                }
                CacheResponse::StoredMany { stored }
            }

            CacheRequest::LockTry { key, ttl_ms, owner } => {
                if key.is_empty() {
                    return CacheResponse::Error { err: "bad_key".into() };
                }
                self.expire_sweep(now_ms);
                self.op_lock_try(key, ttl_ms, owner, now_ms)
            }

            CacheRequest::LockRenew { key, ttl_ms, token } => {
                if key.is_empty() {
                    return CacheResponse::Error { err: "bad_key".into() };
                }
                self.expire_sweep(now_ms);
                self.op_lock_renew(&key, ttl_ms, &token, now_ms)
            }

            CacheRequest::LockRelease { key, token } => {
                if key.is_empty() {
                    return CacheResponse::Error { err: "bad_key".into() };
                }
                self.expire_sweep(now_ms);
                self.op_lock_release(&key, &token, now_ms)
            }

            CacheRequest::LockStatus { key } => {
                if key.is_empty() {
                    return CacheResponse::Error { err: "bad_key".into() };
                }
                self.expire_sweep(now_ms);
                self.op_lock_status(&key, now_ms)
            }
        }
    }
}
