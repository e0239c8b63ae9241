use axum::extract::{Extension, State};
use serde::Serialize;

use crate::coupons;
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::middleware::AccountContext;
use crate::models::{Redemption, Role};
use crate::redemption::sign_affiliate_link;

#[derive(Debug, Serialize)]
pub struct AffiliateLink {
    pub coupon_id: String,
    pub affiliate_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affiliate_sig: Option<String>,
    pub url: String,
}

pub async fn list_affiliate_redemptions(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
) -> Result<Json<Vec<Redemption>>> {
    ctx.account.require_role(Role::Affiliate)?;
    let conn = state.db.get()?;
    Ok(Json(queries::list_redemptions_for_affiliate(&conn, ctx.id())?))
}

/// Build a shareable link attributing redemptions of a coupon to the caller.
/// Signed when a link secret is configured.
pub async fn get_affiliate_link(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccountContext>,
    Path(coupon_id): Path<String>,
) -> Result<Json<AffiliateLink>> {
    ctx.account.require_role(Role::Affiliate)?;
    let conn = state.db.get()?;
    let coupon = coupons::get_coupon(&conn, &coupon_id)?;

    let affiliate_sig = state
        .redemption_policy
        .affiliate_link_secret
        .as_deref()
        .map(|secret| sign_affiliate_link(secret, &coupon.id, ctx.id()))
        .transpose()?;

    let mut url = format!(
        "{}/coupons/{}?affiliate_id={}",
        state.base_url.trim_end_matches('/'),
        urlencoding::encode(&coupon.id),
        urlencoding::encode(ctx.id())
    );
    if let Some(sig) = &affiliate_sig {
        url.push_str(&format!("&affiliate_sig={}", urlencoding::encode(sig)));
    }

    Ok(Json(AffiliateLink {
        coupon_id: coupon.id,
        affiliate_id: ctx.account.id.clone(),
        affiliate_sig,
        url,
    }))
}
