use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_ledger::adapters::PostgresLedgerStore;
use wallet_ledger::cli::{self, Cli, Commands, DbCommands, TxCommands};
use wallet_ledger::config::{parse_allowed_origins, Config, LogFormat};
use wallet_ledger::{create_app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Tx(TxCommands::SetStatus { tx_id, status }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_tx_set_status(&pool, tx_id, &status).await
        }
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let ledger = Arc::new(PostgresLedgerStore::new(pool.clone()));
    let state = AppState::new(pool, ledger, config.gift_card_validity_days)
        .with_signing_secret(config.status_signing_secret.clone())
        .with_cors_origins(
            config
                .cors_allowed_origins
                .as_deref()
                .and_then(parse_allowed_origins),
        );
    if state.signing_secret.is_none() {
        tracing::warn!("STATUS_SIGNING_SECRET not set; status updates are accepted unsigned");
    }

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
