// [apps/engine/src/main.rs]
/*!
 * =================================================================
 * APARATO: ENGINE ENTRYPOINT
 * CLASIFICACIÓN: BINARY BOOTSTRAP (ESTRATO L0)
 * RESPONSABILIDAD: SELECCIÓN E IGNICIÓN DEL PROCESADOR
 * =================================================================
 */

use clap::{Parser, Subcommand};

use serenity_engine::context::{EngineContext, EngineSettings};
use serenity_engine::processors;

#[derive(Parser, Debug)]
#[command(name = "engine", about = "Serenity engine worker processes")]
struct CliArguments {
    /// URL de la base (file:..., :memory:, libsql://...).
    #[arg(long, env = "SERENITY_DATABASE_URL", default_value = "file:serenity.db")]
    database_url: String,

    /// Token de acceso para bases remotas.
    #[arg(long, env = "SERENITY_DATABASE_TOKEN")]
    database_token: Option<String>,

    /// Socket del cache-daemon.
    #[arg(long, env = "SERENITY_CACHE_SOCKET", default_value = "run/cache.sock")]
    cache_socket: String,

    #[command(subcommand)]
    processor: ProcessorCommand,
}

#[derive(Subcommand, Debug)]
enum ProcessorCommand {
    /// Streams geo/branches: fill, ranking, done-scan y reset.
    Prepare,
    /// Stream contacts/contacts_update: lotes LLM y cierres.
    Rate,
    /// Validación de emails, agregación, expansión y hash-guard.
    Validate,
    /// Despacho de spiders y ledger de prioridad.
    Crawl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let arguments = CliArguments::parse();

    let service_name = match arguments.processor {
        ProcessorCommand::Prepare => "serenity-engine-prepare",
        ProcessorCommand::Rate => "serenity-engine-rate",
        ProcessorCommand::Validate => "serenity-engine-validate",
        ProcessorCommand::Crawl => "serenity-engine-crawl",
    };
    serenity_shared_watchtower::init_tracing(service_name);

    let settings = EngineSettings {
        database_url: arguments.database_url.clone(),
        database_token: arguments.database_token.clone(),
        cache_socket: arguments.cache_socket.clone(),
    };
    let context = EngineContext::bootstrap(&settings).await?;

    match arguments.processor {
        ProcessorCommand::Prepare => processors::prepare::main(context).await,
        ProcessorCommand::Rate => processors::rate::main(context).await,
        ProcessorCommand::Validate => processors::validate::main(context).await,
        ProcessorCommand::Crawl => processors::crawl::main(context).await,
    }
}
