pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod validation;

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::handlers::ws::TransactionStatusUpdate;
use crate::ports::LedgerStore;
use crate::services::{GiftCardService, TransactionStatusService};

const BROADCAST_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub status_service: TransactionStatusService,
    pub gift_cards: GiftCardService,
    pub tx_broadcast: broadcast::Sender<TransactionStatusUpdate>,
    pub signing_secret: Option<String>,
    /// `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
}

impl AppState {
    /// Wires the services around `ledger`. Postgres deployments pass a
    /// `PostgresLedgerStore` over the same pool.
    pub fn new(db: sqlx::PgPool, ledger: Arc<dyn LedgerStore>, gift_card_validity_days: i64) -> Self {
        let (tx_broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            status_service: TransactionStatusService::new(ledger).with_broadcast(tx_broadcast.clone()),
            gift_cards: GiftCardService::new(db.clone(), gift_card_validity_days),
            db,
            tx_broadcast,
            signing_secret: None,
            cors_origins: None,
        }
    }

    pub fn with_signing_secret(mut self, secret: Option<String>) -> Self {
        self.signing_secret = secret;
        self
    }

    pub fn with_cors_origins(mut self, origins: Option<Vec<String>>) -> Self {
        self.cors_origins = origins;
        self
    }
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    match origins {
        None => layer.allow_origin(Any),
        Some(origins) => {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(parsed))
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(state.cors_origins.as_deref());

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/wallets", post(handlers::wallets::create_wallet))
        .route("/wallets/:id", get(handlers::wallets::get_wallet))
        .route(
            "/wallets/:id/transactions",
            get(handlers::wallets::list_wallet_transactions),
        )
        .route("/wallets/:id/deposits", post(handlers::wallets::create_deposit))
        .route("/wallets/:id/withdrawals", post(handlers::wallets::create_withdrawal))
        .route("/transactions", post(handlers::transactions::create_transaction))
        .route("/transactions/status", post(handlers::transactions::update_status))
        .route("/transactions/:id", get(handlers::transactions::get_transaction))
        .route(
            "/giftcards/catalog",
            get(handlers::gift_cards::list_catalog).post(handlers::gift_cards::create_catalog_entry),
        )
        .route("/giftcards/purchase", post(handlers::gift_cards::purchase))
        .route("/giftcards/redeem", post(handlers::gift_cards::redeem))
        .route("/giftcards/validate/:code", get(handlers::gift_cards::validate))
        .layer(axum::middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(cors)
        .with_state(state)
}
