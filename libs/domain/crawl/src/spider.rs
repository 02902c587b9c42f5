// [libs/domain/crawl/src/spider.rs]
/*!
 * =================================================================
 * APARATO: SPIDER SEAM
 * CLASIFICACIÓN: DOMAIN CONTRACT (ESTRATO L2)
 * RESPONSABILIDAD: FRONTERA CON LOS SPIDERS DE DIRECTORIO
 *
 * Los spiders HTML son colaboradores externos: este contrato los define
 * únicamente por los items que emiten para una celda despachada.
 * =================================================================
 */

use std::future::Future;
use std::pin::Pin;

use serenity_domain_models::crawl::{QueueItem, RawCandidate};

/// Fallo opaco del spider: el coordinador solo registra y continúa.
pub type SpiderError = Box<dyn std::error::Error + Send + Sync>;

pub trait Spider: Send + Sync {
    /// Rastrea una celda (plz × branch) y emite las filas crudas halladas.
    fn crawl<'a>(
        &'a self,
        item: &'a QueueItem,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawCandidate>, SpiderError>> + Send + 'a>>;
}

/// Spider nulo para entornos sin crawler real: emite cero filas.
pub struct NullSpider;

impl Spider for NullSpider {
    fn crawl<'a>(
        &'a self,
        _item: &'a QueueItem,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawCandidate>, SpiderError>> + Send + 'a>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}
