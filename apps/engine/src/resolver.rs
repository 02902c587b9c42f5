// [apps/engine/src/resolver.rs]
/*!
 * =================================================================
 * APARATO: MX RESOLVER (EDGE)
 * CLASIFICACIÓN: APPLICATION ADAPTER (ESTRATO L1)
 * RESPONSABILIDAD: RESOLUCIÓN MX BEST-EFFORT PARA EL VALIDADOR
 *
 * Cadena de intentos: `dig +short MX` (timeout 4s) y, si la herramienta
 * no está disponible, lookup del host como última aproximación. Un
 * dominio irresoluble cuenta como sin MX.
 * =================================================================
 */

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use serenity_domain_validate::MxResolver;

const DIG_TIMEOUT: Duration = Duration::from_secs(4);

pub struct SystemMxResolver;

async fn dig_has_mx(domain: &str) -> Option<bool> {
    let invocation = Command::new("dig")
        .args(["+short", "MX", domain])
        .output();

    match tokio::time::timeout(DIG_TIMEOUT, invocation).await {
        Ok(Ok(output)) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            Some(!stdout.trim().is_empty())
        }
        Ok(Ok(_)) => Some(false),
        Ok(Err(_launch_fault)) => None, // dig no disponible
        Err(_elapsed) => Some(false),
    }
}

async fn lookup_fallback(domain: &str) -> bool {
    tokio::net::lookup_host((domain, 25u16))
        .await
        .map(|mut addrs| addrs.next().is_some())
        .unwrap_or(false)
}

impl MxResolver for SystemMxResolver {
    fn has_mx<'a>(&'a self, domain: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            if let Some(verdict) = dig_has_mx(domain).await {
                return verdict;
            }
            debug!("✉️  [MX]: dig unavailable, falling back to host lookup for {}", domain);
            lookup_fallback(domain).await
        })
    }
}
