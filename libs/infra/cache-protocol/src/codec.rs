// [libs/infra/cache-protocol/src/codec.rs]
/*!
 * =================================================================
 * APARATO: FRAME CODEC
 * CLASIFICACIÓN: INFRASTRUCTURE TRANSPORT (ESTRATO L3)
 * RESPONSABILIDAD: FRAMING u32-BE + MESSAGEPACK SOBRE STREAM LOCAL
 * =================================================================
 */

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::MAX_REQUEST_BYTES;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("[L3_CACHE_WIRE_FAULT]: IO -> {0}")]
    Io(#[from] std::io::Error),

    /// Longitud declarada fuera de rango (0 o mayor al tope de protocolo).
    #[error("[L3_CACHE_WIRE_FAULT]: BAD_LEN -> {0}")]
    BadLength(u32),

    #[error("[L3_CACHE_WIRE_FAULT]: ENCODE -> {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("[L3_CACHE_WIRE_FAULT]: DECODE -> {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Serializa un mensaje en MessagePack con structs-como-mapas: requisito
/// para que las uniones etiquetadas (`op`/`reply`) viajen auto-descritas.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, FrameError> {
    Ok(rmp_serde::to_vec_named(message)?)
}

pub fn decode<T: DeserializeOwned>(raw: &[u8]) -> Result<T, FrameError> {
    Ok(rmp_serde::from_slice(raw)?)
}

/// Escribe un frame: cabecera u32 big-endian + cuerpo MessagePack.
pub async fn write_message<S, T>(stream: &mut S, message: &T) -> Result<(), FrameError>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = encode(message)?;
    let header = (body.len() as u32).to_be_bytes();

    stream.write_all(&header).await?;
    stream.write_all(&body).await?;
    stream.flush().await?;
    Ok(())
}

/// Lee un frame completo validando la longitud declarada contra el tope
/// de requests (lado daemon).
pub async fn read_message<S, T>(stream: &mut S) -> Result<T, FrameError>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    read_message_with_limit(stream, MAX_REQUEST_BYTES).await
}

/// Variante con tope explícito: el cliente lee respuestas (MGET de lotes
/// grandes) con un límite mayor al de requests.
pub async fn read_message_with_limit<S, T>(stream: &mut S, max_len: usize) -> Result<T, FrameError>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;

    let declared_len = u32::from_be_bytes(header);
    if declared_len == 0 || declared_len as usize > max_len {
        return Err(FrameError::BadLength(declared_len));
    }

    let mut body = vec![0u8; declared_len as usize];
    stream.read_exact(&mut body).await?;

    decode(&body)
}
