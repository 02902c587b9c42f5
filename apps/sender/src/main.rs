// [apps/sender/src/main.rs]
/*!
 * =================================================================
 * APARATO: SENDER ENTRYPOINT
 * CLASIFICACIÓN: BINARY BOOTSTRAP (ESTRATO L0)
 * RESPONSABILIDAD: IGNICIÓN DEL SUPERVISOR DE ENVÍO
 * =================================================================
 */

use std::sync::Arc;

use clap::Parser;

use serenity_core_crypto::parse_key_material;
use serenity_infra_db::SerenityDb;
use serenity_sender::transport::DryRunTransport;
use serenity_sender::SenderSupervisor;

const PASS_KEY_ENV: &str = "SERENITY_PASS_KEY";

#[derive(Parser, Debug)]
#[command(name = "sender", about = "Serenity sender supervisor")]
struct CliArguments {
    /// URL de la base (file:..., :memory:, libsql://...).
    #[arg(long, env = "SERENITY_DATABASE_URL", default_value = "file:serenity.db")]
    database_url: String,

    /// Token de acceso para bases remotas.
    #[arg(long, env = "SERENITY_DATABASE_TOKEN")]
    database_token: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let arguments = CliArguments::parse();

    serenity_shared_watchtower::init_tracing("serenity-sender");

    // Las credenciales SMTP viven selladas (v1:gcm) en la base: una clave
    // ausente o malformada es fatal AQUÍ, no a mitad de una campaña.
    let pass_key_raw = std::env::var(PASS_KEY_ENV).unwrap_or_default();
    let _mailbox_key = parse_key_material(PASS_KEY_ENV, &pass_key_raw)?;

    let database = SerenityDb::connect(&arguments.database_url, arguments.database_token).await?;
    let transport = Arc::new(DryRunTransport::new(database.clone()));

    let mut supervisor = SenderSupervisor::new(database, transport);
    supervisor.main_guide().await;
    Ok(())
}
