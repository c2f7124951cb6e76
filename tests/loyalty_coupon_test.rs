mod common;

use assert_matches::assert_matches;
use common::{TestApp, TEST_API_KEY};
use rstest::rstest;
use tour_package_api::{errors::ServiceError, services::coupons::CouponInput};
use uuid::Uuid;

#[tokio::test]
async fn balance_defaults_to_zero_and_accumulates() {
    let app = TestApp::new().await;
    let loyalty = &app.services.loyalty;
    let customer = Uuid::new_v4();

    assert_eq!(loyalty.get_balance(customer).await.unwrap(), 0);

    loyalty.add_points(customer, 150).await.unwrap();
    let row = loyalty.add_points(customer, 50).await.unwrap();
    assert_eq!(row.points, 200);
    assert_eq!(loyalty.get_balance(customer).await.unwrap(), 200);
}

#[rstest]
#[case(0)]
#[case(-25)]
#[tokio::test]
async fn non_positive_grants_are_rejected(#[case] amount: i64) {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    assert_matches!(
        app.services.loyalty.add_points(customer, amount).await,
        Err(ServiceError::InvalidInput(_))
    );
    assert_eq!(app.services.loyalty.get_balance(customer).await.unwrap(), 0);
}

#[tokio::test]
async fn insufficient_points_leave_balance_untouched() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let coupon = app.seed_coupon("Premium", 300, 25).await;
    app.services.loyalty.add_points(customer, 200).await.unwrap();

    let err = app
        .services
        .loyalty
        .purchase_coupon(customer, coupon.id)
        .await
        .unwrap_err();
    assert_matches!(&err, ServiceError::Conflict(msg) if msg.contains("insufficient points"));
    assert_eq!(app.services.loyalty.get_balance(customer).await.unwrap(), 200);
    assert!(app.services.loyalty.get_purchased_coupons(customer).await.unwrap().is_empty());
}

#[tokio::test]
async fn purchase_of_unknown_coupon_is_not_found() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    app.services.loyalty.add_points(customer, 1_000).await.unwrap();

    assert_matches!(
        app.services.loyalty.purchase_coupon(customer, Uuid::new_v4()).await,
        Err(ServiceError::NotFound(_))
    );
    assert_eq!(app.services.loyalty.get_balance(customer).await.unwrap(), 1_000);
}

#[tokio::test]
async fn repeated_purchases_get_distinct_codes_and_debit_once_each() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let coupon = app.seed_coupon("Summer Saver", 100, 10).await;
    app.services.loyalty.add_points(customer, 250).await.unwrap();

    let first = app.services.loyalty.purchase_coupon(customer, coupon.id).await.unwrap();
    let second = app.services.loyalty.purchase_coupon(customer, coupon.id).await.unwrap();

    assert_ne!(first.code, second.code);
    assert!(first.code.starts_with("SUMMER-"));
    assert!(first.code.ends_with("-1"));
    assert!(second.code.ends_with("-2"));
    assert!(first.used_date.is_none());
    assert_eq!(app.services.loyalty.get_balance(customer).await.unwrap(), 50);
}

#[tokio::test]
async fn code_collision_bumps_the_sequence() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    // Both names sanitize to the same prefix
    let a = app.seed_coupon("Beach!", 10, 5).await;
    let b = app.seed_coupon("beach", 10, 5).await;
    app.services.loyalty.add_points(customer, 100).await.unwrap();

    let first = app.services.loyalty.purchase_coupon(customer, a.id).await.unwrap();
    let second = app.services.loyalty.purchase_coupon(customer, b.id).await.unwrap();

    assert!(first.code.ends_with("-1"));
    assert_ne!(first.code, second.code);
    assert!(second.code.ends_with("-2"));
}

#[tokio::test]
async fn redeem_is_single_use() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let coupon = app.seed_coupon("Weekend", 50, 15).await;
    app.services.loyalty.add_points(customer, 50).await.unwrap();
    let purchase = app.services.loyalty.purchase_coupon(customer, coupon.id).await.unwrap();

    let redemption = app
        .services
        .loyalty
        .redeem_coupon(&purchase.code, customer)
        .await
        .unwrap();
    assert!(redemption.valid);
    assert_eq!(redemption.percent_off, 15);
    assert_eq!(redemption.coupon_id, coupon.id);
    assert_eq!(redemption.code, purchase.code);

    let err = app
        .services
        .loyalty
        .redeem_coupon(&purchase.code, customer)
        .await
        .unwrap_err();
    assert_matches!(&err, ServiceError::Conflict(msg) if msg.contains("already used"));
}

#[tokio::test]
async fn redeem_checks_code_and_owner() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let coupon = app.seed_coupon("Weekend", 50, 15).await;
    app.services.loyalty.add_points(customer, 50).await.unwrap();
    let purchase = app.services.loyalty.purchase_coupon(customer, coupon.id).await.unwrap();

    assert_matches!(
        app.services.loyalty.redeem_coupon("NOPE-000000-1", customer).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        app.services.loyalty.redeem_coupon(&purchase.code, Uuid::new_v4()).await,
        Err(ServiceError::InvalidInput(_))
    );
    // Still redeemable by its owner
    assert!(app.services.loyalty.redeem_coupon(&purchase.code, customer).await.is_ok());
}

#[tokio::test]
async fn dashboard_counts_active_and_redeemed() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    let cheap = app.seed_coupon("Snack", 10, 5).await;
    app.seed_coupon("Upgrade", 500, 50).await;
    app.services.loyalty.add_points(customer, 100).await.unwrap();

    let first = app.services.loyalty.purchase_coupon(customer, cheap.id).await.unwrap();
    app.services.loyalty.purchase_coupon(customer, cheap.id).await.unwrap();
    app.services.loyalty.redeem_coupon(&first.code, customer).await.unwrap();

    let dashboard = app.services.loyalty.dashboard(customer).await.unwrap();
    assert_eq!(dashboard.points, 80);
    assert_eq!(dashboard.total_purchased, 2);
    assert_eq!(dashboard.active_coupons, 1);
    assert_eq!(dashboard.redeemed_coupons, 1);
    assert_eq!(dashboard.available_coupon_count, 2);
    assert!(dashboard
        .purchased_coupons
        .iter()
        .all(|c| c.coupon_name == "Snack" && c.percent_off == 5));
}

#[tokio::test]
async fn coupon_catalog_create_update_and_list() {
    let app = TestApp::new().await;
    let coupons = &app.services.coupons;

    let coupon = app.seed_coupon("Early Bird", 100, 10).await;
    let updated = coupons
        .update(
            coupon.id,
            CouponInput {
                name: "Early Bird Plus".to_string(),
                description: None,
                points: 120,
                percent_off: 12,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, coupon.id);
    assert_eq!(updated.points, 120);
    assert!(updated.updated_date >= coupon.updated_date);

    assert_matches!(
        coupons
            .update(
                Uuid::new_v4(),
                CouponInput {
                    name: "Ghost".to_string(),
                    description: None,
                    points: 1,
                    percent_off: 1,
                },
            )
            .await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        coupons
            .create(CouponInput {
                name: "Too generous".to_string(),
                description: None,
                points: 10,
                percent_off: 150,
            })
            .await,
        Err(ServiceError::ValidationError(_))
    );

    assert_eq!(coupons.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn external_calls_need_the_configured_key() {
    let app = TestApp::new().await;
    let loyalty = &app.services.loyalty;

    assert!(loyalty.authorize_external(Some(TEST_API_KEY)).is_ok());
    assert_matches!(
        loyalty.authorize_external(Some("wrong-key-wrong-key-00")),
        Err(ServiceError::Unauthorized(_))
    );
    assert_matches!(loyalty.authorize_external(None), Err(ServiceError::Unauthorized(_)));
}
