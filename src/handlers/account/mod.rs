mod affiliate;
mod credits;
mod profile;
mod shop;

pub use affiliate::*;
pub use credits::*;
pub use profile::*;
pub use shop::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::account_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/credit-log", get(my_credit_log))
        .route("/me/redemptions", get(my_redemptions))
        // Shop owner
        .route("/coupons", post(create_coupon))
        .route("/shop/coupons", get(list_shop_coupons))
        .route("/shop/referrals", get(list_shop_referrals))
        .route("/credit-requests", post(submit_credit_request))
        .route("/credit-requests", get(list_my_credit_requests))
        .route("/credit-keys", get(list_credit_keys))
        .route("/credit-keys/activate", post(activate_credit_key))
        // Affiliate
        .route("/affiliate/redemptions", get(list_affiliate_redemptions))
        .route("/affiliate/links/{coupon_id}", get(get_affiliate_link))
        .layer(middleware::from_fn_with_state(state, account_auth))
}
