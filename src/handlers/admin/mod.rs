mod accounts;
mod credit_requests;
mod logs;
mod overview;

pub use accounts::*;
pub use credit_requests::*;
pub use logs::*;
pub use overview::*;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::db::AppState;
use crate::middleware::require_admin;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/admin/accounts", post(create_account))
        .route("/admin/accounts", get(list_accounts))
        .route("/admin/accounts/{id}/roles", put(update_account_roles))
        .route("/admin/accounts/{id}/deactivate", post(deactivate_account))
        .route("/admin/accounts/{id}/credits", post(adjust_account_credits))
        .route("/admin/accounts/{id}/reconcile", get(reconcile_account))
        // Credit requests and keys
        .route("/admin/credit-requests", get(list_credit_requests))
        .route("/admin/credit-requests/{id}/keys", post(issue_credit_key))
        // Logs
        .route("/admin/credit-log", get(query_credit_log))
        .route("/admin/audit-logs", get(query_audit_logs))
        // Read-only views
        .route("/admin/coupons", get(list_coupons))
        .route("/admin/redemptions", get(list_redemptions))
        .route("/admin/referrals", get(list_referrals))
        .layer(middleware::from_fn_with_state(state, require_admin))
}
