//! Credit requests and one-time credit keys.

use std::sync::{Arc, Barrier};
use std::thread;

mod common;
use common::*;

fn rejection(outcome: &ActivationOutcome) -> Option<Rejection> {
    match outcome {
        ActivationOutcome::Rejected(reason) => Some(*reason),
        ActivationOutcome::Activated { .. } => None,
    }
}

#[test]
fn test_submit_request_validation() {
    let env = create_test_env();
    let mut conn = env.conn();
    let shop = create_test_shop(&mut conn, "Shop", 0);
    let customer = create_test_customer(&mut conn, "Customer");
    let economy = Economy::default();

    let too_small = SubmitCreditRequest {
        amount: 99,
        message: "Need credits".into(),
    };
    assert!(matches!(
        vault::submit_request(&conn, &economy, &shop, &too_small),
        Err(AppError::Validation(_))
    ));

    let too_large = SubmitCreditRequest {
        amount: MAX_CREDIT_AMOUNT + 1,
        message: "Need credits".into(),
    };
    assert!(matches!(
        vault::submit_request(&conn, &economy, &shop, &too_large),
        Err(AppError::Validation(_))
    ));

    let no_message = SubmitCreditRequest {
        amount: 500,
        message: "  ".into(),
    };
    assert!(matches!(
        vault::submit_request(&conn, &economy, &shop, &no_message),
        Err(AppError::Validation(_))
    ));

    let valid = SubmitCreditRequest {
        amount: 500,
        message: "Need credits".into(),
    };
    assert!(matches!(
        vault::submit_request(&conn, &economy, &customer, &valid),
        Err(AppError::Forbidden(_))
    ));

    let request = vault::submit_request(&conn, &economy, &shop, &valid).unwrap();
    assert_eq!(request.status, CreditRequestStatus::Pending);
    assert_eq!(request.requested_amount, 500);
    assert_eq!(vault::requests_for_shop(&conn, &shop.id).unwrap().len(), 1);
}

#[test]
fn test_issue_moves_request_and_is_single_shot() {
    let env = create_test_env();
    let mut conn = env.conn();
    let shop = create_test_shop(&mut conn, "Shop", 0);
    let key = issue_test_key(&mut conn, &shop, 1000);

    assert_eq!(key.shop_id, shop.id);
    assert_eq!(key.credit_amount, 1000);
    assert!(!key.is_used);
    assert!(key.key_code.starts_with("CK-"));
    assert_eq!(key.key_code.len(), "CK-XXXX-XXXX-XXXX-XXXX".len());

    let request_id = key.request_id.clone().unwrap();
    let request = queries::get_credit_request_by_id(&conn, &request_id).unwrap().unwrap();
    assert_eq!(request.status, CreditRequestStatus::KeyGenerated);
    assert_eq!(request.admin_response.as_deref(), Some("Approved"));

    let again = vault::issue(
        &mut conn,
        &request_id,
        &IssueCreditKey {
            amount: Some(5),
            expires_at: None,
            expires_in_days: None,
            admin_response: None,
        },
    );
    assert!(matches!(again, Err(AppError::Validation(_))));

    let (pending, total) =
        vault::list_requests(&conn, Some(CreditRequestStatus::Pending), 50, 0).unwrap();
    assert!(pending.is_empty());
    assert_eq!(total, 0);
}

#[test]
fn test_issue_rejects_bad_terms_and_unknown_request() {
    let env = create_test_env();
    let mut conn = env.conn();
    let shop = create_test_shop(&mut conn, "Shop", 0);
    let request = vault::submit_request(
        &conn,
        &Economy::default(),
        &shop,
        &SubmitCreditRequest {
            amount: 200,
            message: "please".into(),
        },
    )
    .unwrap();

    let past = vault::issue(
        &mut conn,
        &request.id,
        &IssueCreditKey {
            amount: None,
            expires_at: Some(queries::now() - ONE_DAY),
            expires_in_days: None,
            admin_response: None,
        },
    );
    assert!(matches!(past, Err(AppError::Validation(_))));

    for (amount, expires_in_days) in [(Some(MAX_CREDIT_AMOUNT + 1), None), (None, Some(i64::MAX))] {
        let result = vault::issue(
            &mut conn,
            &request.id,
            &IssueCreditKey {
                amount,
                expires_at: None,
                expires_in_days,
                admin_response: None,
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
    // None of the refusals consumed the request
    let stored = queries::get_credit_request_by_id(&conn, &request.id).unwrap().unwrap();
    assert_eq!(stored.status, CreditRequestStatus::Pending);

    let missing = vault::issue(
        &mut conn,
        "missing",
        &IssueCreditKey {
            amount: None,
            expires_at: None,
            expires_in_days: None,
            admin_response: None,
        },
    );
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[test]
fn test_activate_credits_exactly_once() {
    let env = create_test_env();
    let mut conn = env.conn();
    let shop = create_test_shop(&mut conn, "Shop", 0);
    let key = issue_test_key(&mut conn, &shop, 1000);

    // Codes match regardless of case and surrounding whitespace
    let typed = format!("  {}  ", key.key_code.to_lowercase());
    let outcome = vault::activate(&mut conn, &typed, &shop.id).unwrap();
    let ActivationOutcome::Activated {
        key: activated,
        credited,
        balance,
    } = outcome
    else {
        panic!("expected activation, got {:?}", outcome);
    };
    assert!(activated.is_used);
    assert_eq!(credited, 1000);
    assert_eq!(balance, 1000);

    let again = vault::activate(&mut conn, &key.key_code, &shop.id).unwrap();
    assert_eq!(rejection(&again), Some(Rejection::KeyAlreadyUsed));

    assert_eq!(balance_of(&conn, &shop.id), 1000);
    assert_ledger_consistent(&conn, &shop.id);

    let request = queries::get_credit_request_by_id(&conn, key.request_id.as_deref().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(request.status, CreditRequestStatus::Completed);
}

#[test]
fn test_activate_expired_key_leaves_it_unused() {
    let env = create_test_env();
    let mut conn = env.conn();
    let shop = create_test_shop(&mut conn, "Shop", 0);
    let key = issue_test_key(&mut conn, &shop, 1000);
    conn.execute(
        "UPDATE credit_keys SET expires_at = ?1 WHERE id = ?2",
        rusqlite::params![queries::now() - 1, key.id],
    )
    .unwrap();

    let outcome = vault::activate(&mut conn, &key.key_code, &shop.id).unwrap();
    assert_eq!(rejection(&outcome), Some(Rejection::KeyExpired));

    let stored = queries::get_credit_key_by_code(&conn, &key.key_code).unwrap().unwrap();
    assert!(!stored.is_used);
    assert_eq!(stored.used_at, None);
    assert_eq!(balance_of(&conn, &shop.id), 0);

    assert!(vault::keys_for_shop(&conn, &shop.id, true).unwrap().is_empty());
    assert_eq!(vault::keys_for_shop(&conn, &shop.id, false).unwrap().len(), 1);
}

#[test]
fn test_activate_rejections() {
    let env = create_test_env();
    let mut conn = env.conn();
    let shop = create_test_shop(&mut conn, "Shop", 0);
    let other = create_test_shop(&mut conn, "Other", 0);
    let key = issue_test_key(&mut conn, &shop, 300);

    let outcome = vault::activate(&mut conn, "CK-NOPE-NOPE-NOPE-NOPE", &shop.id).unwrap();
    assert_eq!(rejection(&outcome), Some(Rejection::InvalidKey));

    let outcome = vault::activate(&mut conn, "", &shop.id).unwrap();
    assert_eq!(rejection(&outcome), Some(Rejection::InvalidKey));

    let outcome = vault::activate(&mut conn, &key.key_code, &other.id).unwrap();
    assert_eq!(rejection(&outcome), Some(Rejection::OwnerMismatch));

    assert_eq!(balance_of(&conn, &other.id), 0);
    assert!(vault::keys_for_shop(&conn, &shop.id, true).unwrap()[0].is_available(queries::now()));
}

#[test]
fn test_concurrent_activation_single_winner() {
    const CALLERS: usize = 6;

    let env = create_test_env();
    let (shop, key) = {
        let mut conn = env.conn();
        let shop = create_test_shop(&mut conn, "Shop", 0);
        let key = issue_test_key(&mut conn, &shop, 1000);
        (shop, key)
    };

    let barrier = Arc::new(Barrier::new(CALLERS));
    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let pool = env.state.db.clone();
            let barrier = Arc::clone(&barrier);
            let code = key.key_code.clone();
            let shop_id = shop.id.clone();
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                barrier.wait();
                vault::activate(&mut conn, &code, &shop_id).unwrap()
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners = outcomes
        .iter()
        .filter(|o| matches!(o, ActivationOutcome::Activated { .. }))
        .count();
    let losers = outcomes
        .iter()
        .filter(|o| rejection(o) == Some(Rejection::KeyAlreadyUsed))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(losers, CALLERS - 1);

    let conn = env.conn();
    assert_eq!(balance_of(&conn, &shop.id), 1000);
    assert_ledger_consistent(&conn, &shop.id);
}
