use agrichain::api::{router, AppState};
use agrichain::config::AppConfig;
use agrichain::BatchEngine;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agrichain=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let config = AppConfig::parse();
    let store = config.build_store().context("failed to set up document store")?;
    let ledger = config.build_ledger().context("failed to set up ledger client")?;
    info!(
        store = store.backend_name(),
        ledger = ledger.as_ref().map(|l| l.ledger_name()).unwrap_or("none"),
        timeout_ms = config.ledger_call_timeout_ms,
        "starting agrichain"
    );

    let engine = BatchEngine::new(store, ledger).with_ledger_timeout(config.ledger_call_timeout_ms);
    let app = router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("listening on {}", config.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
