//! chorely-server/src/server.rs
//!
//! Connects storage, builds the context and serves HTTP until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use axum_server::Handle;
use tracing::{error, info};

use chorely_core::Database;
use chorely_core::config::SettlementConfig;

use crate::Args;
use crate::context::AppContext;
use crate::routes::router;

pub async fn run_server(args: Args) -> anyhow::Result<()> {
    let config = SettlementConfig {
        timezone: args.timezone.clone(),
        missed_reset_threshold: args.missed_reset_threshold,
        backfill_window_days: args.backfill_window_days,
    };
    config.validate()?;

    info!("Using Postgres DB URL: {}", redact(&args.db_url));
    let db = Database::new(&args.db_url).await?;
    if args.migrate {
        db.migrate().await?;
    }

    let ctx = Arc::new(AppContext::postgres(&db, config)?);
    let app = router(ctx);

    let addr: SocketAddr = args.server_addr.parse()?;
    let handle = Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {:?}", e);
            return;
        }
        info!("Ctrl-C detected; shutting down...");
        shutdown.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
    });

    info!("Chorely listening on http://{}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    info!("Server stopped.");
    Ok(())
}

/// Hides the password part of a connection URL.
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let creds = &url[scheme_end + 3..at];
            match creds.find(':') {
                Some(colon) => format!("{}{}:***{}", &url[..scheme_end + 3], &creds[..colon], &url[at..]),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::redact;

    #[test]
    fn test_redact_password() {
        assert_eq!(redact("postgres://kid:hunter2@db:5432/chorely"), "postgres://kid:***@db:5432/chorely");
        assert_eq!(redact("postgres://kid@db/chorely"), "postgres://kid@db/chorely");
    }
}
