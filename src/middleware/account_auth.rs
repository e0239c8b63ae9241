use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::error::AppError;
use crate::models::{Account, Role};
use crate::util::extract_bearer_token;

#[derive(Clone)]
pub struct AccountContext {
    pub account: Account,
}

impl AccountContext {
    pub fn id(&self) -> &str {
        &self.account.id
    }
}

/// Resolve the bearer key to an active account.
/// `Ok(None)` means no credentials were sent at all.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Option<Account>, AppError> {
    let Some(api_key) = extract_bearer_token(headers) else {
        return Ok(None);
    };
    let conn = state.db.get()?;
    let account = queries::get_account_by_api_key(&conn, api_key)?.ok_or(AppError::Unauthorized)?;
    Ok(Some(account))
}

pub async fn account_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let account = authenticate(&state, request.headers())?.ok_or(AppError::Unauthorized)?;
    request.extensions_mut().insert(AccountContext { account });
    Ok(next.run(request).await)
}

/// Attach an `AccountContext` when credentials are present. Invalid
/// credentials are still rejected; missing ones pass through.
pub async fn optional_account_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(account) = authenticate(&state, request.headers())? {
        request.extensions_mut().insert(AccountContext { account });
    }
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let account = authenticate(&state, request.headers())?.ok_or(AppError::Unauthorized)?;
    account.require_role(Role::Admin)?;
    request.extensions_mut().insert(AccountContext { account });
    Ok(next.run(request).await)
}
