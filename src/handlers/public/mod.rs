mod coupons;

pub use coupons::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::extractors::Json;
use crate::middleware::optional_account_auth;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/coupons/{id}", get(get_coupon))
        .route("/coupons/{id}/click", post(track_click))
        .merge(
            Router::new()
                // Identity is optional here so that anonymous callers get a
                // structured 401 from the engine.
                .route("/coupons/{id}/redeem", post(redeem_coupon))
                .layer(middleware::from_fn_with_state(state, optional_account_auth)),
        )
}
