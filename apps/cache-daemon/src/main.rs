// [apps/cache-daemon/src/main.rs]
/*!
 * =================================================================
 * APARATO: CACHE DAEMON ENTRYPOINT
 * CLASIFICACIÓN: BINARY BOOTSTRAP (ESTRATO L0)
 * RESPONSABILIDAD: IGNICIÓN DEL DAEMON DE CACHE Y LEASES
 * =================================================================
 */

use clap::Parser;

use serenity_cache_daemon::CacheDaemon;

#[derive(Parser, Debug)]
#[command(name = "cache-daemon", about = "Serenity RAM cache + lease-lock daemon")]
struct CliArguments {
    /// Ruta del socket local; el dump vive al lado con extensión .dump.
    #[arg(long, env = "SERENITY_CACHE_SOCKET", default_value = "run/cache.sock")]
    socket: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let arguments = CliArguments::parse();

    serenity_shared_watchtower::init_tracing("serenity-cache-daemon");

    CacheDaemon::new(arguments.socket).serve_forever().await
}
