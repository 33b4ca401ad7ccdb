use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

mod context;
mod error;
mod identity;
mod routes;
mod server;

#[derive(Parser, Debug, Clone)]
#[command(name = "chorely")]
#[command(author, version, about = "Chorely - chore streaks, rewards and lucky boxes")]
pub struct Args {
    /// Address to which the HTTP server will bind
    #[arg(long, env = "CHORELY_SERVER_ADDR", default_value = "0.0.0.0:8080")]
    server_addr: String,

    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://chorely@localhost:5432/chorely")]
    db_url: String,

    /// IANA timezone that decides where one day ends and the next begins
    #[arg(long, env = "CHORELY_TIMEZONE", default_value = "Asia/Shanghai")]
    timezone: String,

    /// Consecutive missed days that reset the streak counter
    #[arg(long, env = "CHORELY_MISSED_RESET_THRESHOLD", default_value_t = 1)]
    missed_reset_threshold: i32,

    /// How many past days reads backfill and scan for date rewards
    #[arg(long, env = "CHORELY_BACKFILL_WINDOW_DAYS", default_value_t = 90)]
    backfill_window_days: i64,

    /// Apply pending migrations before serving
    #[arg(long, env = "CHORELY_MIGRATE", default_value = "false")]
    migrate: bool,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("chorely=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!(
        "Chorely starting. addr={}, timezone={}, missed_reset_threshold={}, backfill_window_days={}",
        args.server_addr, args.timezone, args.missed_reset_threshold, args.backfill_window_days
    );

    if let Err(e) = server::run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}
