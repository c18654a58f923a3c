mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, body_text, TestApp};
use rust_decimal_macros::dec;
use saferpay_gateway::entities::payment;
use saferpay_gateway::lock::reconcile_lock_name;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn payments_for(app: &TestApp, order_id: Uuid) -> Vec<payment::Model> {
    payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .all(&*app.state.db)
        .await
        .expect("payment lookup in tests")
}

fn assert_response(transaction_id: &str, status: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ResponseHeader": {"SpecVersion": "1.10", "RequestId": "ignored"},
        "Transaction": {"Id": transaction_id, "Status": status}
    }))
}

fn capture_response(status: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "ResponseHeader": {"SpecVersion": "1.10", "RequestId": "ignored"},
        "Status": status
    }))
}

#[tokio::test]
async fn replayed_notification_is_rejected_without_second_payment() {
    let app = TestApp::new().await;
    let order = app
        .seed_order_with_token("ORD-3001", dec!(19.99), "CHF", "tok-3001")
        .await;

    // The provider is consulted exactly once; the replay is refused before
    // any provider call.
    Mock::given(method("POST"))
        .and(path("/Payment/v1/PaymentPage/Assert"))
        .respond_with(assert_response("txn-3001", "AUTHORIZED"))
        .expect(1)
        .mount(&app.saferpay_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Payment/v1/Transaction/Capture"))
        .respond_with(capture_response("CAPTURED"))
        .expect(1)
        .mount(&app.saferpay_server)
        .await;

    let uri = format!("/api/v1/saferpay/notify?order={}", order.id);
    let first = app.request(Method::POST, &uri, None).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_text(first).await, "OK");

    let replay = app.request(Method::POST, &uri, None).await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(replay).await, "Error while processing payment.");

    let payments = payments_for(&app, order.id).await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].state, "completed");
    assert_eq!(payments[0].remote_id, "txn-3001");
    assert_eq!(payments[0].remote_state, "CAPTURED");
    assert!(payments[0].test);

    // Amount comes from the order as stored.
    let reloaded = app.reload_order(order.id).await;
    assert_eq!(payments[0].amount, reloaded.total_amount);
    assert_eq!(payments[0].currency, "CHF");
}

#[tokio::test]
async fn autocomplete_disabled_leaves_payment_authorized() {
    let app = TestApp::with_config_tweak(|cfg| {
        cfg.saferpay.autocomplete = false;
    })
    .await;
    let order = app
        .seed_order_with_token("ORD-3002", dec!(25.00), "EUR", "tok-3002")
        .await;

    Mock::given(method("POST"))
        .and(path("/Payment/v1/PaymentPage/Assert"))
        .respond_with(assert_response("txn-3002", "AUTHORIZED"))
        .expect(1)
        .mount(&app.saferpay_server)
        .await;
    // No capture call may happen.
    Mock::given(method("POST"))
        .and(path("/Payment/v1/Transaction/Capture"))
        .respond_with(capture_response("CAPTURED"))
        .expect(0)
        .mount(&app.saferpay_server)
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/saferpay/notify?order={}", order.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let payments = payments_for(&app, order.id).await;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].state, "authorization");
    assert_eq!(payments[0].remote_state, "AUTHORIZED");

    assert!(app.reload_order(order.id).await.is_paid);
}

#[tokio::test]
async fn captured_assert_status_is_rejected() {
    let app = TestApp::new().await;
    let order = app
        .seed_order_with_token("ORD-3003", dec!(8.50), "CHF", "tok-3003")
        .await;

    // Only AUTHORIZED passes; an already captured transaction is refused
    // and no capture call happens.
    Mock::given(method("POST"))
        .and(path("/Payment/v1/PaymentPage/Assert"))
        .respond_with(assert_response("txn-3003", "CAPTURED"))
        .expect(1)
        .mount(&app.saferpay_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Payment/v1/Transaction/Capture"))
        .respond_with(capture_response("CAPTURED"))
        .expect(0)
        .mount(&app.saferpay_server)
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/saferpay/notify?order={}", order.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Error while processing payment.");

    assert!(payments_for(&app, order.id).await.is_empty());

    let reloaded = app.reload_order(order.id).await;
    assert!(!reloaded.is_paid);
    assert_eq!(
        reloaded.data["saferpay_paymentpage"]["transaction_id"],
        "txn-3003"
    );
}

#[tokio::test]
async fn failed_capture_persists_no_payment() {
    let app = TestApp::new().await;
    let order = app
        .seed_order_with_token("ORD-3004", dec!(42.00), "CHF", "tok-3004")
        .await;

    Mock::given(method("POST"))
        .and(path("/Payment/v1/PaymentPage/Assert"))
        .respond_with(assert_response("txn-3004", "AUTHORIZED"))
        .expect(1)
        .mount(&app.saferpay_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Payment/v1/Transaction/Capture"))
        .respond_with(capture_response("PENDING"))
        .expect(1)
        .mount(&app.saferpay_server)
        .await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/saferpay/notify?order={}", order.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "Error while processing payment.");

    assert!(payments_for(&app, order.id).await.is_empty());

    let reloaded = app.reload_order(order.id).await;
    assert!(!reloaded.is_paid);
    // The transaction id is still recorded for operator follow-up.
    assert_eq!(
        reloaded.data["saferpay_paymentpage"]["transaction_id"],
        "txn-3004"
    );
}

#[tokio::test]
async fn concurrent_entries_persist_at_most_one_payment() {
    let app = TestApp::new().await;
    let order = app
        .seed_order_with_token("ORD-3005", dec!(19.99), "CHF", "tok-3005")
        .await;

    Mock::given(method("POST"))
        .and(path("/Payment/v1/PaymentPage/Assert"))
        .respond_with(assert_response("txn-3005", "AUTHORIZED"))
        .mount(&app.saferpay_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Payment/v1/Transaction/Capture"))
        .respond_with(capture_response("CAPTURED"))
        .mount(&app.saferpay_server)
        .await;

    let uri = format!("/api/v1/saferpay/notify?order={}", order.id);
    let (first, second) = tokio::join!(
        app.request(Method::POST, &uri, None),
        app.request(Method::POST, &uri, None),
    );

    // One notification wins and answers OK. The loser either sees the lock
    // held (OK) or arrives after the payment exists (400). Exactly one
    // payment is persisted either way.
    let statuses = [first.status(), second.status()];
    assert!(statuses.contains(&StatusCode::OK));
    for status in statuses {
        assert!(status == StatusCode::OK || status == StatusCode::BAD_REQUEST);
    }
    assert_eq!(payments_for(&app, order.id).await.len(), 1);
    assert!(app.reload_order(order.id).await.is_paid);
}

#[tokio::test]
async fn browser_return_makes_no_provider_calls() {
    let app = TestApp::new().await;
    let order = app
        .seed_order_with_token("ORD-3006", dec!(19.99), "CHF", "tok-3006")
        .await;

    // Even with a session token and a free lock, the return path never
    // reconciles; it only reads what the notification persisted.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/saferpay/return?order={}", order.id),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Payment was not completed.");

    assert!(app
        .saferpay_server
        .received_requests()
        .await
        .unwrap()
        .is_empty());
    assert!(payments_for(&app, order.id).await.is_empty());
    assert!(!app.reload_order(order.id).await.is_paid);
}

#[tokio::test]
async fn browser_return_reports_existing_payment_without_provider_calls() {
    let app = TestApp::new().await;
    let order = app
        .seed_order_with_token("ORD-3007", dec!(19.99), "CHF", "tok-3007")
        .await;

    Mock::given(method("POST"))
        .and(path("/Payment/v1/PaymentPage/Assert"))
        .respond_with(assert_response("txn-3007", "AUTHORIZED"))
        .expect(1)
        .mount(&app.saferpay_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Payment/v1/Transaction/Capture"))
        .respond_with(capture_response("CAPTURED"))
        .expect(1)
        .mount(&app.saferpay_server)
        .await;

    // Notification arrives first and persists the payment.
    let notify = app
        .request(
            Method::POST,
            &format!("/api/v1/saferpay/notify?order={}", order.id),
            None,
        )
        .await;
    assert_eq!(notify.status(), StatusCode::OK);

    // The browser return afterwards answers from storage.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/saferpay/return?order={}", order.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["paid"], true);
}

#[tokio::test]
async fn browser_return_gives_up_after_bounded_wait() {
    // return_wait_secs is 1 in the test config.
    let app = TestApp::new().await;
    let order = app
        .seed_order_with_token("ORD-3008", dec!(19.99), "CHF", "tok-3008")
        .await;

    let lock_name = reconcile_lock_name(order.id);
    assert!(app.state.lock.try_acquire(&lock_name).await.unwrap());

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/saferpay/return?order={}", order.id),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Payment still processing.");
}

#[tokio::test]
async fn browser_return_rejects_missing_order_parameter() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/saferpay/return", None)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
