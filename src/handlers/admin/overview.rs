use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::{CouponView, Redemption, Referral};
use crate::pagination::{Paginated, PaginationQuery};

pub async fn list_coupons(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<CouponView>>> {
    let conn = state.db.get()?;
    let limit = query.limit();
    let offset = query.offset();
    let (coupons, total) = queries::list_coupons_paginated(&conn, limit, offset)?;
    let now = queries::now();
    let items = coupons.into_iter().map(|c| CouponView::new(c, now)).collect();
    Ok(Json(Paginated::new(items, total, limit, offset)))
}

pub async fn list_redemptions(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<Redemption>>> {
    let conn = state.db.get()?;
    let limit = query.limit();
    let offset = query.offset();
    let (redemptions, total) = queries::list_redemptions_paginated(&conn, limit, offset)?;
    Ok(Json(Paginated::new(redemptions, total, limit, offset)))
}

pub async fn list_referrals(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Paginated<Referral>>> {
    let conn = state.db.get()?;
    let limit = query.limit();
    let offset = query.offset();
    let (referrals, total) = queries::list_referrals_paginated(&conn, limit, offset)?;
    Ok(Json(Paginated::new(referrals, total, limit, offset)))
}
