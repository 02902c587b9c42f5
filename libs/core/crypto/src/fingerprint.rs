// [libs/core/crypto/src/fingerprint.rs]
/*!
 * =================================================================
 * APARATO: TASK FINGERPRINT ENGINE
 * CLASIFICACIÓN: CORE CRYPTO (ESTRATO L2)
 * RESPONSABILIDAD: HUELLA h64 DE TEXTOS DE TAREA (BIGINT-COMPATIBLE)
 *
 * # Mathematical Proof (Invalidation Signal):
 * blake2b con digest de 8 bytes sobre UTF-8, interpretado big-endian y
 * mapeado a i64 por complemento a dos. El mismo texto produce la misma
 * huella en cualquier proceso; un cambio de texto produce una huella
 * nueva, que es la única señal de invalidación de ratings.
 * =================================================================
 */

use blake2::digest::consts::U8;
use blake2::{Blake2b, Digest};

type Blake2b8 = Blake2b<U8>;

/// Huellas reservadas como "inválidas" en el dominio (junto con NULL).
pub const INVALID_FINGERPRINTS: [i64; 3] = [-1, 0, 1];

/// Huella estable de 64 bits de un texto, apta para columnas BIGINT.
pub fn h64_text(text: &str) -> i64 {
    let mut hasher = Blake2b8::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest);

    // unsigned big-endian -> signed i64 (dos-complemento)
    u64::from_be_bytes(bytes) as i64
}

/// Un valor de huella almacenado es válido si no es un marcador reservado.
pub fn fingerprint_is_valid(value: Option<i64>) -> bool {
    match value {
        None => false,
        Some(v) => !INVALID_FINGERPRINTS.contains(&v),
    }
}
