// [libs/core/crypto/src/sealing.rs]
/*!
 * =================================================================
 * APARATO: SECRET SEALING VAULT
 * CLASIFICACIÓN: CORE CRYPTO (ESTRATO L2)
 * RESPONSABILIDAD: CIFRADO AEAD DE SECRETOS PARA PERSISTENCIA
 *
 * # Mathematical Proof (Ciphertext Integrity):
 * AES-256-GCM con nonce de 12 bytes produce un tag de autenticación de
 * 16 bytes. Cualquier mutación de un solo byte en nonce, ciphertext o tag
 * invalida la autenticación completa del blob.
 * =================================================================
 */

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

/// Prefijo de formato de los secretos sellados en base de datos.
pub const SEALED_PREFIX: &str = "v1:gcm:";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum CryptoError {
    /// La variable de entorno de clave está vacía o ausente.
    #[error("[L2_CRYPTO_FAULT]: KEY_MATERIAL_VOID -> missing {0} in environment")]
    MissingKey(String),

    /// La clave no decodifica a exactamente 32 bytes.
    #[error("[L2_CRYPTO_FAULT]: KEY_MATERIAL_MALFORMED -> {0} must be 32 bytes (got {1})")]
    BadKeyLength(String, usize),

    /// La clave no es hex ni base64url válido.
    #[error("[L2_CRYPTO_FAULT]: KEY_MATERIAL_UNDECODABLE -> {0}")]
    BadKeyEncoding(String),

    /// El secreto almacenado no lleva el prefijo de formato conocido.
    #[error("[L2_CRYPTO_FAULT]: SEALED_FORMAT_UNKNOWN -> missing '{SEALED_PREFIX}' prefix")]
    UnknownFormat,

    /// El blob es demasiado corto para contener nonce + tag.
    #[error("[L2_CRYPTO_FAULT]: SEALED_BLOB_TRUNCATED -> {0} bytes")]
    BlobTooShort(usize),

    /// Fallo de autenticación o de decodificación del blob.
    #[error("[L2_CRYPTO_FAULT]: SEAL_AUTHENTICATION_REJECTED")]
    AuthenticationFailed,

    /// El texto plano recuperado no es UTF-8.
    #[error("[L2_CRYPTO_FAULT]: PLAINTEXT_NOT_UTF8")]
    BadPlaintext,
}

fn b64_decode_padded_or_not(value: &str) -> Result<Vec<u8>, CryptoError> {
    let trimmed = value.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed.as_bytes())
        .map_err(|fault| CryptoError::BadKeyEncoding(fault.to_string()))
}

fn is_hex_64(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Decodifica material de clave desde su representación textual.
///
/// Formatos aceptados: `hex:<64hex>`, `<64hex>` desnudo, o base64url.
/// El resultado DEBE medir exactamente 32 bytes.
pub fn parse_key_material(env_name: &str, raw_value: &str) -> Result<[u8; 32], CryptoError> {
    let value = raw_value.trim();
    if value.is_empty() {
        return Err(CryptoError::MissingKey(env_name.to_string()));
    }

    let decoded: Vec<u8> = if let Some(hex_part) = value.strip_prefix("hex:") {
        decode_hex(hex_part.trim())?
    } else if is_hex_64(value) {
        decode_hex(value)?
    } else {
        b64_decode_padded_or_not(value)?
    };

    if decoded.len() != 32 {
        return Err(CryptoError::BadKeyLength(env_name.to_string(), decoded.len()));
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&decoded);
    Ok(key)
}

fn decode_hex(value: &str) -> Result<Vec<u8>, CryptoError> {
    if value.len() % 2 != 0 {
        return Err(CryptoError::BadKeyEncoding("odd hex length".into()));
    }
    (0..value.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&value[i..i + 2], 16)
                .map_err(|fault| CryptoError::BadKeyEncoding(fault.to_string()))
        })
        .collect()
}

/// Sella un secreto para almacenamiento en base de datos.
///
/// Texto plano vacío produce cadena vacía (contrato de columnas opcionales).
pub fn encrypt_secret(plaintext: &str, key: &[u8; 32]) -> Result<String, CryptoError> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);

    Ok(format!("{}{}", SEALED_PREFIX, URL_SAFE_NO_PAD.encode(blob)))
}

/// Abre un secreto sellado. Cadena vacía devuelve cadena vacía.
pub fn decrypt_secret(sealed: &str, key: &[u8; 32]) -> Result<String, CryptoError> {
    let value = sealed.trim();
    if value.is_empty() {
        return Ok(String::new());
    }

    let encoded = value.strip_prefix(SEALED_PREFIX).ok_or(CryptoError::UnknownFormat)?;
    let blob = b64_decode_padded_or_not(encoded).map_err(|_| CryptoError::AuthenticationFailed)?;

    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::BlobTooShort(blob.len()));
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::BadPlaintext)
}
