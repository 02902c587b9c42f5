// [libs/domain/validate/src/email.rs]
/*!
 * =================================================================
 * APARATO: EMAIL VALIDATOR
 * CLASIFICACIÓN: DOMAIN SERVICE (ESTRATO L2)
 * RESPONSABILIDAD: ESTADOS DE EMAIL CRUDO (SINTAXIS / ALLOWLIST / MX)
 *
 * La resolución MX vive detrás del seam `MxResolver`: el resolver de red
 * real es un colaborador externo; las pruebas usan una tabla fija.
 * =================================================================
 */

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use serenity_infra_db::repositories::ContactsRepository;
use serenity_infra_db::{DbError, SerenityDb};

pub const STATUS_EMPTY: &str = "EMPTY";
pub const STATUS_BAD_SYNTAX: &str = "WRONG EMAIL SYNTAX";
pub const STATUS_BAD_MX: &str = "WRONG DOMAIN MX";
pub const STATUS_OK: &str = "OK";

const BATCH_SIZE: u32 = 100;

/// Seam de resolución MX.
pub trait MxResolver: Send + Sync {
    fn has_mx<'a>(&'a self, domain: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

fn split_email(email: &str) -> Option<(&str, &str)> {
    let mut parts = email.splitn(3, '@');
    let local = parts.next()?;
    let domain = parts.next()?;
    if parts.next().is_some() || local.is_empty() || domain.is_empty() {
        return None;
    }
    Some((local, domain))
}

/// Reglas de sintaxis del dominio (camino feliz permisivo, fallos duros):
/// longitudes RFC, un solo @, sin espacios/control, puntos del local-part,
/// labels del dominio.
pub fn is_bad_syntax(email: &str) -> bool {
    if email.len() > 254 {
        return true;
    }

    let Some((local, domain)) = split_email(email) else {
        return true;
    };

    if local.len() > 64 {
        return true;
    }

    if email
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return true;
    }

    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return true;
    }

    let domain = domain.trim().to_ascii_lowercase();
    if !domain.contains('.') {
        return true;
    }
    if !domain
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        return true;
    }

    for label in domain.split('.') {
        if label.is_empty() || label.len() > 63 {
            return true;
        }
        if label.starts_with('-') || label.ends_with('-') {
            return true;
        }
    }

    false
}

pub fn domain_of(email: &str) -> Option<String> {
    split_email(email).map(|(_, domain)| domain.trim().to_ascii_lowercase())
}

pub struct EmailValidator {
    database: SerenityDb,
    resolver: Arc<dyn MxResolver>,
    /// Dominios de confianza que saltan la resolución MX.
    allowlist: HashSet<String>,
}

impl EmailValidator {
    pub fn new(database: SerenityDb, resolver: Arc<dyn MxResolver>, allowlist: HashSet<String>) -> Self {
        Self {
            database,
            resolver,
            allowlist,
        }
    }

    /// Un lote de validación: cada fila cruda pendiente recibe su estado y
    /// queda sellada como processed_email.
    pub async fn run_batch(&self) -> Result<Value, DbError> {
        let contacts = ContactsRepository::new(self.database.get_connection()?);
        let pending = contacts.pick_unvalidated(BATCH_SIZE).await?;

        let mut by_status: std::collections::HashMap<&'static str, usize> = Default::default();

        for (raw_id, email) in &pending {
            let trimmed = email.as_deref().unwrap_or("").trim().to_string();

            let status: &'static str = if trimmed.is_empty() {
                STATUS_EMPTY
            } else if is_bad_syntax(&trimmed) {
                STATUS_BAD_SYNTAX
            } else {
                match domain_of(&trimmed) {
                    None => STATUS_BAD_SYNTAX,
                    Some(domain) if self.allowlist.contains(&domain) => STATUS_OK,
                    Some(domain) => {
                        if self.resolver.has_mx(&domain).await {
                            STATUS_OK
                        } else {
                            STATUS_BAD_MX
                        }
                    }
                }
            };

            // en éxito el email queda reescrito ya recortado
            contacts.set_email_status(*raw_id, &trimmed, status).await?;
            *by_status.entry(status).or_default() += 1;
        }

        if !pending.is_empty() {
            info!("✉️  [VAL_EMAIL]: batch={} statuses={:?}", pending.len(), by_status);
        }

        Ok(json!({
            "mode": "ok",
            "batch": pending.len(),
            "ok": by_status.get(STATUS_OK).copied().unwrap_or(0),
        }))
    }
}
