mod common;

use common::TestApp;
use serde_json::json;

async fn current_user_id(app: &TestApp, token: &str) -> String {
    let response = app.get("/users/me", token).await;
    assert_eq!(response.status(), 200);
    let me: serde_json::Value = response.json().await.unwrap();
    me["user_id"].as_str().unwrap().to_string()
}

async fn create_plan(app: &TestApp, token: &str, name: &str) -> serde_json::Value {
    let response = app
        .post(
            "/plans",
            token,
            &json!({
                "name": name,
                "description": "Plan institucional",
                "price": "49.99",
                "max_users": 25,
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn plan_lifecycle() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let plan = create_plan(&app, &admin, "Basico").await;
    assert_eq!(plan["currency"], "USD");
    assert_eq!(plan["billing_interval"], "monthly");
    assert_eq!(plan["active"], true);

    // Negative price is rejected.
    let response = app
        .post("/plans", &admin, &json!({ "name": "Gratis", "price": "-1" }))
        .await;
    assert_eq!(response.status(), 400);

    let plan_id = plan["plan_id"].as_str().unwrap();
    let response = app
        .put(
            &format!("/plans/{}", plan_id),
            &admin,
            &json!({ "active": false }),
        )
        .await;
    assert_eq!(response.status(), 200);

    // Inactive plans are hidden from the default listing.
    let response = app.get("/plans", &admin).await;
    let plans: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(plans.is_empty());

    let response = app.get("/plans?include_inactive=true", &admin).await;
    let plans: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(plans.len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn subscription_lifecycle() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let user_id = current_user_id(&app, &admin).await;

    let plan = create_plan(&app, &admin, "Escolar").await;
    let plan_id = plan["plan_id"].as_str().unwrap();

    let response = app
        .post(
            "/subscriptions",
            &admin,
            &json!({ "user_id": user_id, "plan_id": plan_id }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let subscription: serde_json::Value = response.json().await.unwrap();
    assert_eq!(subscription["status"], "active");
    let subscription_id = subscription["subscription_id"].as_str().unwrap();

    let response = app
        .get(&format!("/users/{}/subscriptions", user_id), &admin)
        .await;
    let subscriptions: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(subscriptions.len(), 1);

    let response = app
        .post(
            &format!("/subscriptions/{}/cancel", subscription_id),
            &admin,
            &json!({}),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cancelled: serde_json::Value = response.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert!(cancelled["ends_on"].is_string());

    app.cleanup().await;
}

#[tokio::test]
async fn subscription_requires_an_active_plan_and_a_real_user() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let user_id = current_user_id(&app, &admin).await;

    // Unknown plan
    let response = app
        .post(
            "/subscriptions",
            &admin,
            &json!({
                "user_id": user_id,
                "plan_id": "00000000-0000-0000-0000-000000000000",
            }),
        )
        .await;
    assert_eq!(response.status(), 404);

    // Unknown user
    let plan = create_plan(&app, &admin, "Escolar").await;
    let plan_id = plan["plan_id"].as_str().unwrap().to_string();
    let response = app
        .post(
            "/subscriptions",
            &admin,
            &json!({
                "user_id": "00000000-0000-0000-0000-000000000000",
                "plan_id": plan_id,
            }),
        )
        .await;
    assert_eq!(response.status(), 404);

    // Inactive plan
    app.put(
        &format!("/plans/{}", plan_id),
        &admin,
        &json!({ "active": false }),
    )
    .await;
    let response = app
        .post(
            "/subscriptions",
            &admin,
            &json!({ "user_id": user_id, "plan_id": plan_id }),
        )
        .await;
    assert_eq!(response.status(), 400);

    app.cleanup().await;
}

#[tokio::test]
async fn payment_claims_are_verified_manually() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let user_id = current_user_id(&app, &admin).await;

    let plan = create_plan(&app, &admin, "Escolar").await;
    let response = app
        .post(
            "/subscriptions",
            &admin,
            &json!({
                "user_id": user_id,
                "plan_id": plan["plan_id"].as_str().unwrap(),
            }),
        )
        .await;
    let subscription: serde_json::Value = response.json().await.unwrap();
    let subscription_id = subscription["subscription_id"].as_str().unwrap();

    let response = app
        .post(
            "/payments",
            &admin,
            &json!({
                "subscription_id": subscription_id,
                "amount": "49.99",
                "reference": "TRANS-0042",
                "method": "transferencia",
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let payment: serde_json::Value = response.json().await.unwrap();
    assert_eq!(payment["status"], "pending");
    assert!(payment["verified_by"].is_null());
    let payment_id = payment["payment_id"].as_str().unwrap();

    // Zero amount is rejected.
    let response = app
        .post(
            "/payments",
            &admin,
            &json!({ "subscription_id": subscription_id, "amount": "0" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    // Pending is not a verification outcome.
    let response = app
        .post(
            &format!("/payments/{}/verify", payment_id),
            &admin,
            &json!({ "status": "pending" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .post(
            &format!("/payments/{}/verify", payment_id),
            &admin,
            &json!({ "status": "verified" }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let verified: serde_json::Value = response.json().await.unwrap();
    assert_eq!(verified["status"], "verified");
    assert_eq!(verified["verified_by"], json!(current_user_id(&app, &admin).await));

    let response = app
        .get(&format!("/subscriptions/{}/payments", subscription_id), &admin)
        .await;
    let payments: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["status"], "verified");

    app.cleanup().await;
}
