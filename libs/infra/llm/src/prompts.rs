// [libs/infra/llm/src/prompts.rs]
/*!
 * =================================================================
 * APARATO: PROMPT LIBRARY
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PLANTILLAS EMPAQUETADAS Y TRADUCCIÓN VIA ORÁCULO
 * =================================================================
 */

use crate::{AskSpec, LlmClient, ServiceTier};

const PROMPT_TRANSLATE: &str = include_str!("prompts/prompt_translate.txt");
const RATE_CONTACTS_BUY: &str = include_str!("prompts/rate_contacts_buy.txt");
const RATE_CONTACTS_SELL: &str = include_str!("prompts/rate_contacts_sell.txt");
const AUDIENCE_CLAR_CITY: &str = include_str!("prompts/audience_clar_city.txt");
const AUDIENCE_CLAR_BRANCH: &str = include_str!("prompts/audience_clar_branch.txt");

fn language_name(lang: &str) -> &str {
    match lang.trim().to_ascii_lowercase().as_str() {
        "en" | "eng" => "English",
        "de" | "deu" => "German",
        "fr" => "French",
        "es" => "Spanish",
        "uk" | "ukr" => "Ukrainian",
        _ => "English",
    }
}

fn raw_template(key: &str) -> Option<&'static str> {
    match key {
        "rate_contacts_buy" => Some(RATE_CONTACTS_BUY),
        "rate_contacts_sell" => Some(RATE_CONTACTS_SELL),
        "audience_clar_city" => Some(AUDIENCE_CLAR_CITY),
        "audience_clar_branch" => Some(AUDIENCE_CLAR_BRANCH),
        _ => None,
    }
}

fn translate_instructions(lang: &str) -> String {
    PROMPT_TRANSLATE.replace("{LANG}", language_name(lang))
}

/// Plantilla por clave, traducida al idioma pedido a través del oráculo
/// (memoizado). Fallos degradan a cadena vacía: el call-site decide.
pub async fn get_prompt(llm: &LlmClient, key: &str, lang: &str) -> String {
    let Some(template) = raw_template(key) else {
        return String::new();
    };

    if lang.trim().eq_ignore_ascii_case("en") {
        // las plantillas maestras ya están en inglés
        return template.trim().to_string();
    }

    let outcome = llm
        .ask(AskSpec {
            model: "mini".into(),
            instructions: translate_instructions(lang),
            input: template.to_string(),
            service_tier: ServiceTier::Flex,
            use_cache: true,
            user_id: "SYSTEM".into(),
        })
        .await;

    outcome.map(|content| content.trim().to_string()).unwrap_or_default()
}

/// Traducción de texto arbitrario (memoizada). Vacío entra, vacío sale.
pub async fn translate_text(llm: &LlmClient, text: &str, lang: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let outcome = llm
        .ask(AskSpec {
            model: "mini".into(),
            instructions: translate_instructions(lang),
            input: text.to_string(),
            service_tier: ServiceTier::Flex,
            use_cache: true,
            user_id: "SYSTEM".into(),
        })
        .await;

    outcome.map(|content| content.trim().to_string()).unwrap_or_default()
}
