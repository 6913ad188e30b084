//! # dealdesk-api
//!
//! HTTP surface of the DealDesk escrow desk.
//!
//! ```text
//!   client ──X-User-Id──▶ axum Router ──▶ handlers ──lock──▶ Desk
//!                                            │
//!                                            └──▶ WalletClient (outside the lock)
//! ```
//!
//! The desk is shared as `Arc<Mutex<Desk>>`. A handler holds the lock for
//! one desk call at a time and never across an `.await`.

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    routing::{get, post, put},
};
use dealdesk_escrow::{Desk, FixedPriceSource};
use dealdesk_types::Result;
use parking_lot::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod actor;
pub mod config;
pub mod error;
pub mod routes;
pub mod sweeper;
pub mod wallet;

pub use actor::{Actor, Admin};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use wallet::{MockWalletClient, WalletClient};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<Mutex<Desk>>,
    pub wallet: Arc<dyn WalletClient>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build a fresh desk from `config`, seeding its reference prices.
    pub fn new(config: Config, wallet: Arc<dyn WalletClient>) -> Result<Self> {
        let prices = config
            .reference_prices
            .iter()
            .fold(FixedPriceSource::new(), |prices, p| {
                prices.with_price(&p.asset, &p.fiat, p.price)
            });
        let desk = Desk::new(config.desk.clone(), Box::new(prices))?;
        Ok(Self {
            desk: Arc::new(Mutex::new(desk)),
            wallet,
            config: Arc::new(config),
        })
    }
}

/// Build the router.
///
/// # Route Structure
///
/// ```text
/// GET    /health
///
/// POST   /p2p/listings/:side              search buy or sell listings
/// GET    /p2p/ads                         caller's listings
/// POST   /p2p/ads                         create listing
/// GET    /p2p/ads/:id
/// PUT    /p2p/ads/:id                     edit listing
/// DELETE /p2p/ads/:id
/// PUT    /p2p/ads/:id/status
///
/// GET    /p2p/deals                       caller's deals
/// POST   /p2p/deals                       open deal
/// GET    /p2p/deals/:id
/// PUT    /p2p/deals/:id/confirm-payment
/// PUT    /p2p/deals/:id/release
/// PUT    /p2p/deals/:id/cancel
/// POST   /p2p/deals/:id/appeal
/// GET    /p2p/deals/:id/appeals
/// PUT    /p2p/appeals/:id/resolve         admin
///
/// GET    /p2p/payment-methods
/// POST   /p2p/payment-methods
/// PUT    /p2p/payment-methods/:id/status
///
/// GET    /wallet/balance
/// POST   /wallet/withdraw
/// GET    /wallet/deposit-address/:currency
/// POST   /wallet/deposits                 admin
/// ```
pub fn create_router(state: AppState) -> Router {
    let cors = if state.config.is_production() {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                header::CONTENT_TYPE,
                HeaderName::from_static(actor::USER_ID_HEADER),
            ])
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))

        // Listings
        .route("/p2p/listings/:side", post(routes::listings::search_listings))
        .route(
            "/p2p/ads",
            get(routes::listings::my_listings).post(routes::listings::create_listing),
        )
        .route(
            "/p2p/ads/:id",
            get(routes::listings::get_listing)
                .put(routes::listings::update_listing)
                .delete(routes::listings::delete_listing),
        )
        .route("/p2p/ads/:id/status", put(routes::listings::set_listing_status))

        // Deals
        .route(
            "/p2p/deals",
            get(routes::deals::my_deals).post(routes::deals::open_deal),
        )
        .route("/p2p/deals/:id", get(routes::deals::get_deal))
        .route("/p2p/deals/:id/confirm-payment", put(routes::deals::confirm_payment))
        .route("/p2p/deals/:id/release", put(routes::deals::release))
        .route("/p2p/deals/:id/cancel", put(routes::deals::cancel_deal))

        // Appeals
        .route("/p2p/deals/:id/appeal", post(routes::appeals::raise_appeal))
        .route("/p2p/deals/:id/appeals", get(routes::appeals::deal_appeals))
        .route("/p2p/appeals/:id/resolve", put(routes::appeals::resolve_appeal))

        // Payment methods
        .route(
            "/p2p/payment-methods",
            get(routes::payment_methods::list_payment_methods)
                .post(routes::payment_methods::add_payment_method),
        )
        .route(
            "/p2p/payment-methods/:id/status",
            put(routes::payment_methods::set_payment_method_status),
        )

        // Wallet
        .route("/wallet/balance", get(routes::wallet::balance))
        .route("/wallet/withdraw", post(routes::wallet::withdraw))
        .route(
            "/wallet/deposit-address/:currency",
            get(routes::wallet::deposit_address),
        )
        .route("/wallet/deposits", post(routes::wallet::confirm_deposit))

        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
