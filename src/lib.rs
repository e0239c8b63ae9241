pub mod accounts;
pub mod config;
pub mod coupons;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod redemption;
pub mod referrals;
pub mod util;
pub mod vault;

use axum::Router;

use crate::db::AppState;

/// Every route, with state applied. Transport layers are added by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::public::router(state.clone()))
        .merge(handlers::account::router(state.clone()))
        .merge(handlers::admin::router(state.clone()))
        .with_state(state)
}
