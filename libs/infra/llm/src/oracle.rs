// [libs/infra/llm/src/oracle.rs]
/*!
 * =================================================================
 * APARATO: ORACLE TRANSPORT
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: INVOCACIÓN HTTP DEL PROVEEDOR Y FALLOS BLANDOS
 * =================================================================
 */

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{LlmError, ServiceTier};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_API_BASE: &str = "https://api.openai.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Petición completa al oráculo.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub model: String,
    pub instructions: String,
    pub input: String,
    pub service_tier: ServiceTier,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct OracleReply {
    pub content: String,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
}

/// Seam del oráculo: la pipeline se certifica con un oráculo guionado.
pub trait LlmOracle: Send + Sync {
    fn invoke<'a>(
        &'a self,
        request: &'a OracleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<OracleReply, LlmError>> + Send + 'a>>;
}

fn soft_message_for_status(status: StatusCode) -> &'static str {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return "Oracle rate limit reached. Try again later or change the request.";
    }
    if status.is_server_error() {
        return "Oracle internal server error. Try again later or change the request.";
    }
    "Oracle request failed. Try again later or change the request."
}

fn short_hash(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())[..16].to_string()
}

/// Extrae el texto de salida de una respuesta estilo Responses API:
/// `output_text` directo, o concatenación de los items de tipo
/// output_text dentro de `output[].content[]`.
fn extract_output_text(body: &Value) -> String {
    if let Some(direct) = body.get("output_text").and_then(Value::as_str) {
        return direct.to_string();
    }

    let mut collected = String::new();
    if let Some(outputs) = body.get("output").and_then(Value::as_array) {
        for output in outputs {
            let Some(contents) = output.get("content").and_then(Value::as_array) else {
                continue;
            };
            for item in contents {
                if item.get("type").and_then(Value::as_str) == Some("output_text") {
                    if let Some(text) = item.get("text").and_then(Value::as_str) {
                        collected.push_str(text);
                    }
                }
            }
        }
    }
    collected
}

/// Adaptador HTTP real del proveedor.
pub struct HttpOracle {
    network_client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl HttpOracle {
    /// Valida la presencia de la clave en el entorno: su ausencia es fatal
    /// en el arranque, no a mitad de un batch.
    pub fn from_environment() -> Result<Self, LlmError> {
        let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(API_KEY_ENV));
        }

        let api_base = std::env::var("OPENAI_API_BASE")
            .ok()
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        info!("🧠 [ORACLE_LINK]: HTTP oracle initialized against [{}]", api_base);

        Ok(Self {
            network_client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent("Serenity-Engine-Oracle/0.2")
                .build()?,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn build_payload(request: &OracleRequest) -> Value {
        let mut payload = json!({
            "model": request.model,
            "input": request.input,
            "service_tier": request.service_tier.api_label(),
            "store": false,
        });

        if !request.instructions.is_empty() {
            payload["instructions"] = json!(request.instructions);
            payload["prompt_cache_key"] = json!(short_hash(&request.instructions));
        }

        payload
    }
}

impl LlmOracle for HttpOracle {
    fn invoke<'a>(
        &'a self,
        request: &'a OracleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<OracleReply, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            let endpoint = format!("{}/v1/responses", self.api_base);
            let payload = Self::build_payload(request);

            debug!(
                "🧠 [ORACLE_CALL]: model={} tier={} user={} input_bytes={}",
                request.model,
                request.service_tier.api_label(),
                request.user_id,
                request.input.len()
            );

            let response = self
                .network_client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                warn!("⚠️ [ORACLE_REJECTED]: status={} detail={}", status, detail);
                return Err(LlmError::Soft {
                    user_message: soft_message_for_status(status).to_string(),
                    detail: format!("HTTP_{status}: {detail}"),
                });
            }

            let body: Value = response.json().await?;
            let usage = body.get("usage").cloned().unwrap_or(Value::Null);

            Ok(OracleReply {
                content: extract_output_text(&body),
                input_tokens: usage.get("input_tokens").and_then(Value::as_i64),
                output_tokens: usage.get("output_tokens").and_then(Value::as_i64),
            })
        })
    }
}
