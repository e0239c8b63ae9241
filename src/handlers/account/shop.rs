use axum::{
    extract::{Extension, State},
    http::HeaderMap,
};

use crate::coupons;
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::AccountContext;
use crate::models::{ActorType, AuditAction, CouponView, CreateCoupon, Referral, Role};
use crate::referrals;
use crate::util::AuditLogBuilder;

/// Create a coupon, paying the issuance fee from the shop's balance.
pub async fn create_coupon(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    headers: HeaderMap,
    Json(input): Json<CreateCoupon>,
) -> Result<Json<CouponView>> {
    let mut conn = state.db.get()?;
    let (coupon, referral) = coupons::create_coupon(&mut conn, &state.economy, &ctx.account, &input)?;

    if let Some(audit_conn) = state.audit_conn() {
        AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
            .actor(ActorType::Account, Some(ctx.id()))
            .action(AuditAction::CreateCoupon)
            .resource("coupon", &coupon.id)
            .details(&serde_json::json!({
                "title": coupon.title,
                "max_uses": coupon.max_uses,
                "fee": state.economy.coupon_issuance_fee,
            }))
            .save_best_effort();

        if let Some(referral) = &referral {
            AuditLogBuilder::new(&audit_conn, state.audit_log_enabled, &headers)
                .actor(ActorType::System, None)
                .action(AuditAction::RewardReferral)
                .resource("referral", &referral.id)
                .details(&serde_json::json!({
                    "referrer_shop_id": referral.referrer_shop_id,
                    "referred_shop_id": referral.referred_shop_id,
                    "bonus": referral.bonus,
                }))
                .save_best_effort();
        }
    }

    Ok(Json(CouponView::new(coupon, queries::now())))
}

pub async fn list_shop_coupons(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<Vec<CouponView>>> {
    ctx.account.require_role(Role::ShopOwner)?;
    let conn = state.db.get()?;
    let now = queries::now();
    let coupons = coupons::coupons_for_shop(&conn, ctx.id())?
        .into_iter()
        .map(|c| CouponView::new(c, now))
        .collect();
    Ok(Json(coupons))
}

pub async fn list_shop_referrals(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<Vec<Referral>>> {
    ctx.account.require_role(Role::ShopOwner)?;
    let conn = state.db.get()?;
    Ok(Json(referrals::referrals_for_referrer(&conn, ctx.id())?))
}
