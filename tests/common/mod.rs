//! Shared fixtures for integration tests. Databases are real files in a
//! temporary directory so that concurrent connections see WAL semantics.

#![allow(dead_code, unused_imports)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use rusqlite::Connection;
use tempfile::TempDir;

pub use couponledger::accounts;
pub use couponledger::config::Economy;
pub use couponledger::coupons;
pub use couponledger::db::{AppState, create_pool, init_audit_db, init_db, queries};
pub use couponledger::error::{AppError, Rejection};
pub use couponledger::ledger;
pub use couponledger::models::*;
pub use couponledger::redemption::{self, RedeemRequest, RedemptionPolicy};
pub use couponledger::referrals;
pub use couponledger::vault;

pub const ONE_DAY: i64 = 86400;

pub struct TestEnv {
    pub state: AppState,
    // Dropping this deletes the databases
    _dir: TempDir,
}

impl TestEnv {
    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }

    pub fn app(&self) -> Router {
        couponledger::app(self.state.clone())
    }
}

pub fn create_test_env() -> TestEnv {
    create_test_env_with_policy(RedemptionPolicy {
        max_per_customer: 1,
        affiliate_link_secret: None,
    })
}

pub fn create_test_env_with_policy(policy: RedemptionPolicy) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("ledger.db");
    let audit_path = dir.path().join("audit.db");

    let db = create_pool(db_path.to_str().unwrap(), 16).unwrap();
    init_db(&db.get().unwrap()).unwrap();

    let audit = create_pool(audit_path.to_str().unwrap(), 4).unwrap();
    init_audit_db(&audit.get().unwrap()).unwrap();

    let state = AppState {
        db,
        audit,
        base_url: "http://localhost:3000".to_string(),
        audit_log_enabled: true,
        economy: Economy::default(),
        redemption_policy: policy,
    };

    TestEnv { state, _dir: dir }
}

/// Create an account and return it with its plaintext API key.
pub fn create_test_account(conn: &mut Connection, name: &str, roles: &[Role]) -> (Account, String) {
    let created = accounts::create_account(
        conn,
        &Economy::default(),
        &CreateAccount {
            name: name.to_string(),
            roles: Roles::new(roles.iter().copied()),
            referred_by: None,
        },
    )
    .unwrap();
    (created.account, created.api_key)
}

pub fn create_test_customer(conn: &mut Connection, name: &str) -> Account {
    create_test_account(conn, name, &[Role::Customer]).0
}

pub fn create_test_affiliate(conn: &mut Connection, name: &str) -> Account {
    create_test_account(conn, name, &[Role::Affiliate]).0
}

/// A shop owner with `credits` already on the books.
pub fn create_test_shop(conn: &mut Connection, name: &str, credits: i64) -> Account {
    let (shop, _) = create_test_account(conn, name, &[Role::ShopOwner]);
    if credits > 0 {
        fund(conn, &shop.id, credits);
    }
    queries::get_account_by_id(conn, &shop.id).unwrap().unwrap()
}

pub fn fund(conn: &mut Connection, account_id: &str, amount: i64) {
    ledger::adjust(
        conn,
        account_id,
        &AdjustCredits {
            delta: amount,
            note: None,
        },
        "test-admin",
    )
    .unwrap();
}

pub fn coupon_input(max_uses: i64, reward: i64, commission: i64) -> CreateCoupon {
    CreateCoupon {
        title: "Ten percent off".to_string(),
        description: "Everything in store".to_string(),
        discount_type: DiscountType::Percentage,
        discount_value: 10,
        max_uses,
        validity_type: ValidityType::Days,
        expiry_date: None,
        validity_days: Some(30),
        affiliate_commission: commission,
        customer_reward_points: reward,
    }
}

/// Create a coupon through the engine, paying the issuance fee.
pub fn create_test_coupon(
    conn: &mut Connection,
    shop: &Account,
    max_uses: i64,
    reward: i64,
    commission: i64,
) -> Coupon {
    let shop = queries::get_account_by_id(conn, &shop.id).unwrap().unwrap();
    coupons::create_coupon(
        conn,
        &Economy::default(),
        &shop,
        &coupon_input(max_uses, reward, commission),
    )
    .unwrap()
    .0
}

pub fn expire_coupon(conn: &Connection, coupon_id: &str) {
    conn.execute(
        "UPDATE coupons SET expires_at = ?1 WHERE id = ?2",
        rusqlite::params![queries::now() - 1, coupon_id],
    )
    .unwrap();
}

pub fn redeem_request(coupon_id: &str, customer_id: &str, affiliate_id: Option<&str>) -> RedeemRequest {
    RedeemRequest {
        coupon_id: coupon_id.to_string(),
        customer_id: Some(customer_id.to_string()),
        affiliate_id: affiliate_id.map(String::from),
        ..Default::default()
    }
}

pub fn balance_of(conn: &Connection, account_id: &str) -> i64 {
    ledger::balance(conn, account_id).unwrap()
}

pub fn assert_ledger_consistent(conn: &Connection, account_id: &str) {
    let report = ledger::reconcile(conn, account_id).unwrap();
    assert!(
        report.consistent,
        "balance {} != log total {} for {}",
        report.balance, report.log_total, account_id
    );
}

/// Issue a credit key for `shop` through a request, as an admin would.
pub fn issue_test_key(conn: &mut Connection, shop: &Account, amount: i64) -> CreditKey {
    let request = vault::submit_request(
        conn,
        &Economy::default(),
        shop,
        &SubmitCreditRequest {
            amount,
            message: "Top up please".to_string(),
        },
    )
    .unwrap();
    vault::issue(
        conn,
        &request.id,
        &IssueCreditKey {
            amount: None,
            expires_at: None,
            expires_in_days: Some(7),
            admin_response: Some("Approved".to_string()),
        },
    )
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(method: &str, uri: &str, api_key: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("Authorization", format!("Bearer {}", key));
    }
    builder.body(Body::empty()).unwrap()
}
