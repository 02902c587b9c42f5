// [libs/infra/llm/src/lib.rs]
/*!
 * =================================================================
 * APARATO: LLM ORACLE GATEWAY
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PUNTO ÚNICO DE COMUNICACIÓN CON EL ORÁCULO
 *
 * Contrato: el oráculo recibe {model, instructions, input, service_tier}
 * y devuelve texto. El contenido puede memoizarse (7 días) con clave
 * determinista sobre (model, instructions, input); un fallo del proveedor
 * jamás escribe cache.
 * =================================================================
 */

pub mod oracle;
pub mod prompts;
pub mod rank;

use std::sync::Arc;

use thiserror::Error;

use serenity_infra_cache_client::memo::{memo, MemoSpec};
use serenity_infra_cache_client::CacheClient;

use crate::oracle::{LlmOracle, OracleRequest};

/// TTL de la memoización de contenido del oráculo.
pub const CONTENT_MEMO_TTL_SEC: u64 = 7 * 24 * 60 * 60;
const CONTENT_MEMO_VERSION: &str = "gpt.content.v1";

#[derive(Error, Debug)]
pub enum LlmError {
    /// Clave de API ausente: fatal en el arranque del proceso.
    #[error("[L3_LLM_CONFIG_FAULT]: API_KEY_VOID -> set {0}")]
    MissingApiKey(&'static str),

    #[error("[L3_LLM_VALIDATION_FAULT]: {0}")]
    Validation(String),

    /// Fallo blando del proveedor: mensaje estable para superficies de
    /// usuario, detalle técnico para el log. Nunca se cachea.
    #[error("[L3_LLM_SOFT_FAULT]: {user_message}")]
    Soft {
        user_message: String,
        detail: String,
    },

    #[error("[L3_LLM_NET_FAULT]: {0}")]
    Network(#[from] reqwest::Error),
}

/// Tier legado de modelo -> id concreto.
pub fn resolve_model_alias(model: &str) -> &str {
    match model {
        "nano" => "gpt-5-nano",
        "mini" => "gpt-5-mini",
        "maxi" | "maxi-51" => "gpt-5.1",
        other => other,
    }
}

/// Tier de servicio del proveedor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceTier {
    Flex,
    Standard,
    Priority,
}

impl ServiceTier {
    /// `standard` viaja como el tier por defecto de la API.
    pub fn api_label(&self) -> &'static str {
        match self {
            ServiceTier::Flex => "flex",
            ServiceTier::Standard => "default",
            ServiceTier::Priority => "priority",
        }
    }
}

/// Parámetros de una consulta al oráculo.
#[derive(Debug, Clone)]
pub struct AskSpec {
    pub model: String,
    pub instructions: String,
    pub input: String,
    pub service_tier: ServiceTier,
    pub use_cache: bool,
    /// Solo para el rastro de logs.
    pub user_id: String,
}

/// Gateway del oráculo: oráculo intercambiable (seam de pruebas) + cache.
#[derive(Clone)]
pub struct LlmClient {
    oracle: Arc<dyn LlmOracle>,
    cache: Arc<CacheClient>,
}

impl LlmClient {
    pub fn new(oracle: Arc<dyn LlmOracle>, cache: Arc<CacheClient>) -> Self {
        Self { oracle, cache }
    }

    /// Una consulta completa. Con `use_cache` el contenido se memoiza por
    /// (model, instructions, input); sin él, va directo al proveedor.
    pub async fn ask(&self, spec: AskSpec) -> Result<String, LlmError> {
        let model = resolve_model_alias(&spec.model).to_string();

        if spec.instructions.trim().is_empty() && spec.input.trim().is_empty() {
            // consulta vacía: no se llama a la plataforma
            return Ok(String::new());
        }

        let request = OracleRequest {
            model: model.clone(),
            instructions: spec.instructions.clone(),
            input: spec.input.clone(),
            service_tier: spec.service_tier,
            user_id: spec.user_id.clone(),
        };

        if !spec.use_cache {
            return Ok(self.oracle.invoke(&request).await?.content);
        }

        let query = (model, spec.instructions, spec.input);
        let memo_spec = MemoSpec::new(
            concat!(module_path!(), "::ask"),
            CONTENT_MEMO_VERSION,
        )
        .ttl(CONTENT_MEMO_TTL_SEC);

        let oracle = Arc::clone(&self.oracle);
        memo(&self.cache, &query, memo_spec, || async move {
            Ok::<String, LlmError>(oracle.invoke(&request).await?.content)
        })
        .await
    }
}
