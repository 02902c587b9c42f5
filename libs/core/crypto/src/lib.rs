// [libs/core/crypto/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CRYPTO CORE
 * CLASIFICACIÓN: CORE LIBRARY (ESTRATO L2)
 * RESPONSABILIDAD: SELLADO DE SECRETOS Y HUELLAS DE INVALIDACIÓN
 * =================================================================
 */

pub mod fingerprint;
pub mod sealing;

pub use fingerprint::h64_text;
pub use sealing::{decrypt_secret, encrypt_secret, parse_key_material, CryptoError, SEALED_PREFIX};
