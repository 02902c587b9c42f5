// [apps/cache-daemon/src/snapshot.rs]
/*!
 * =================================================================
 * APARATO: CRASH-SURVIVAL SNAPSHOT
 * CLASIFICACIÓN: INFRASTRUCTURE DAEMON (ESTRATO L3)
 * RESPONSABILIDAD: DUMP ATÓMICO Y RESTORE SELECTIVO DEL CACHE
 *
 * Invariantes:
 * - La escritura es temp-file + rename: nunca existe un dump parcial.
 * - Los leases jamás viajan en el dump.
 * - El restore borra el archivo SIEMPRE, incluso si no pudo leerlo.
 * =================================================================
 */

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use tracing::{info, warn};

use serenity_infra_cache_protocol::{MAX_CACHE_BYTES, MAX_VALUE_BYTES};

use crate::state::{CacheState, Entry};

const DUMP_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct DumpItem {
    key: String,
    payload: ByteBuf,
    size: u64,
    expire_at_ms: u64,
    last_access_ms: u64,
}

#[derive(Serialize, Deserialize)]
struct DumpFile {
    v: u32,
    ts_ms: u64,
    total_bytes: u64,
    items: Vec<DumpItem>,
}

/// Serializa el estado vivo al dump, de forma atómica.
pub fn write_dump(state: &CacheState, dump_path: &Path, now_ms: u64) -> std::io::Result<()> {
    let items: Vec<DumpItem> = state
        .live_entries()
        .map(|(key, entry)| DumpItem {
            key: key.clone(),
            payload: ByteBuf::from(entry.payload.clone()),
            size: entry.size,
            expire_at_ms: entry.expire_at_ms,
            last_access_ms: entry.last_access_ms,
        })
        .collect();

    let dump = DumpFile {
        v: DUMP_VERSION,
        ts_ms: now_ms,
        total_bytes: state.total_bytes(),
        items,
    };

    let raw = rmp_serde::to_vec_named(&dump)
        .map_err(|fault| std::io::Error::new(std::io::ErrorKind::InvalidData, fault))?;

    let tmp_path = dump_path.with_extension("dump.tmp");
    std::fs::write(&tmp_path, &raw)?;
    std::fs::rename(&tmp_path, dump_path)?;
    Ok(())
}

/// Restaura el dump si existe: entradas válidas y no expiradas únicamente.
/// El archivo se elimina incondicionalmente; si el total restaurado supera
/// el presupuesto, corre una evicción inmediata.
pub fn try_restore_dump(state: &mut CacheState, dump_path: &Path, now_ms: u64) {
    let raw = match std::fs::read(dump_path) {
        Ok(bytes) => bytes,
        Err(_) => return,
    };

    let restore_outcome = rmp_serde::from_slice::<DumpFile>(&raw);

    match restore_outcome {
        Ok(dump) if dump.v == DUMP_VERSION => {
            let mut restored = 0usize;

            for item in dump.items {
                let payload = item.payload.into_vec();

                if item.size != payload.len() as u64 {
                    continue;
                }
                if item.size == 0 || item.size > MAX_VALUE_BYTES as u64 {
                    continue;
                }
                // no levantamos lo ya muerto
                if now_ms >= item.expire_at_ms {
                    continue;
                }

                state.restore_entry(
                    item.key,
                    Entry {
                        payload,
                        size: item.size,
                        expire_at_ms: item.expire_at_ms,
                        last_access_ms: item.last_access_ms,
                    },
                );
                restored += 1;
            }

            if state.total_bytes() > MAX_CACHE_BYTES {
                state.run_eviction(now_ms);
            }

            info!(
                "💾 [CACHE_RESTORE]: restored_items={} mem={:.2}MB",
                restored,
                state.total_bytes() as f64 / 1024.0 / 1024.0
            );
        }
        Ok(_) => warn!("💾 [CACHE_RESTORE]: dump version mismatch, discarded."),
        Err(fault) => warn!("💾 [CACHE_RESTORE]: dump unreadable, discarded: {}", fault),
    }

    // contrato: el dump se borra aunque no se haya podido leer
    let _ = std::fs::remove_file(dump_path);
}
