use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::HeaderMap,
};
use serde::Serialize;

use crate::coupons;
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::{Json, Path};
use crate::middleware::AccountContext;
use crate::models::{ActorType, AuditAction, CouponView, RedeemBody, RedeemResponse, RedemptionOutcome};
use crate::redemption::{self, RedeemRequest};
use crate::util::AuditLogBuilder;

#[derive(Serialize)]
pub struct ClickResponse {
    ok: bool,
}

pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CouponView>> {
    let conn = state.db.get()?;
    let coupon = coupons::get_coupon(&conn, &id)?;
    Ok(Json(CouponView::new(coupon, queries::now())))
}

/// Count a coupon view. Always succeeds, even for unknown coupons or when
/// the database is unavailable.
pub async fn track_click(State(state): State<AppState>, Path(id): Path<String>) -> Json<ClickResponse> {
    match state.db.get() {
        Ok(conn) => coupons::record_click(&conn, &id),
        Err(e) => tracing::debug!("Skipping click for coupon {}: {}", id, e),
    }
    Json(ClickResponse { ok: true })
}

/// Redeem a coupon for the calling customer.
///
/// Business rejections come back as `200 { success: false, code, message }`;
/// only missing identity and infrastructure failures are HTTP errors.
pub async fn redeem_coupon(
    State(state): State<AppState>,
    ctx: Option<Extension<AccountContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<RedeemResponse>> {
    // The body is optional; an empty one means no attribution.
    let body: RedeemBody = if body.iter().all(u8::is_ascii_whitespace) {
        RedeemBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))?
    };

    let request = RedeemRequest {
        coupon_id: id,
        customer_id: ctx.map(|Extension(ctx)| ctx.account.id),
        affiliate_id: body.affiliate_id,
        affiliate_sig: body.affiliate_sig,
        idempotency_key: body.idempotency_key,
    };

    let mut conn = state.db.get()?;
    let outcome = redemption::redeem(&mut conn, &request, &state.redemption_policy)?;

    if let RedemptionOutcome::Succeeded {
        redemption,
        replayed: false,
    } = &outcome
    {
        // Committed already; the audit trail is best effort from here.
        if let Some(audit_conn) = state.audit_conn() {
            AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
                .actor(ActorType::Account, Some(&redemption.customer_id))
                .action(AuditAction::RedeemCoupon)
                .resource("redemption", &redemption.id)
                .details(&serde_json::json!({
                    "coupon_id": redemption.coupon_id,
                    "affiliate_id": redemption.affiliate_id,
                    "reward_points": redemption.reward_points,
                    "commission": redemption.commission,
                }))
                .save_best_effort();
        }
    }

    Ok(Json(outcome.into()))
}
