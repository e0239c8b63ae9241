use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};
use crate::ledger;
use crate::middleware::AccountContext;
use crate::models::{Account, CreditLogEntry, CreditLogQuery, Redemption};
use crate::pagination::Paginated;

/// The calling account, re-read so the balance is current.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<Account>> {
    let conn = state.db.get()?;
    let account = queries::get_account_by_id(&conn, ctx.id())?
        .ok_or_else(|| AppError::NotFound("Account not found".into()))?;
    Ok(Json(account))
}

pub async fn my_credit_log(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    Query(mut query): Query<CreditLogQuery>,
) -> Result<Json<Paginated<CreditLogEntry>>> {
    // Scoped to the caller regardless of what was asked for
    query.account_id = Some(ctx.account.id.clone());

    let conn = state.db.get()?;
    let (entries, total) = ledger::history(&conn, &query)?;
    let page = query.pagination();
    Ok(Json(Paginated::new(entries, total, page.limit(), page.offset())))
}

pub async fn my_redemptions(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<Vec<Redemption>>> {
    let conn = state.db.get()?;
    let redemptions = queries::list_redemptions_for_customer(&conn, ctx.id())?;
    Ok(Json(redemptions))
}
