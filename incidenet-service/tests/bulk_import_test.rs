mod common;

use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn import_reports_per_row_outcomes() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let rows = json!([
        {
            "national_id": "1-0001-0001",
            "full_name": "Estudiante Uno",
            "title": "Deuda de matricula",
            "category": "deuda",
            "amount": "50.00",
        },
        {
            "national_id": "1-0002-0002",
            "full_name": "",
            "title": "Deuda de matricula",
            "category": "deuda",
        },
        {
            "national_id": "1-0003-0003",
            "full_name": "Estudiante Tres",
            "title": "Conducta en clase",
            "category": "conducta",
            "institution_code": "ESC-002",
            "institution_name": "Escuela Norte",
            "family_national_id": "2-0003-0003",
            "family_full_name": "Encargado Tres",
            "family_relationship": "padre",
        },
    ]);

    let response = app.post("/incidences/import", &admin, &rows).await;
    assert_eq!(response.status(), 200);
    let report: serde_json::Value = response.json().await.unwrap();

    assert_eq!(report["created"], 2);
    let errors = report["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["row"], 2);
    assert!(errors[0]["error"].as_str().unwrap().contains("full_name"));

    // The failing row wrote nothing; the good rows wrote everything.
    let incidences: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incidences")
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(incidences, 2);

    let missing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM persons WHERE national_id = '1-0002-0002'")
            .fetch_one(app.db.pool())
            .await
            .unwrap();
    assert_eq!(missing, 0);

    let family_links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM family_links")
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(family_links, 1);

    app.cleanup().await;
}

#[tokio::test]
async fn import_enforces_cross_field_rules() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let rows = json!([
        // institution_code without a name
        {
            "national_id": "1-0004-0004",
            "full_name": "Estudiante Cuatro",
            "title": "Deuda",
            "category": "deuda",
            "institution_code": "ESC-003",
        },
        // partial family triple
        {
            "national_id": "1-0005-0005",
            "full_name": "Estudiante Cinco",
            "title": "Deuda",
            "category": "deuda",
            "family_national_id": "2-0005-0005",
        },
    ]);

    let response = app.post("/incidences/import", &admin, &rows).await;
    assert_eq!(response.status(), 200);
    let report: serde_json::Value = response.json().await.unwrap();

    assert_eq!(report["created"], 0);
    let errors = report["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["row"], 1);
    assert_eq!(errors[1]["row"], 2);

    app.cleanup().await;
}

#[tokio::test]
async fn import_requires_create_permission() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let role_id = app.create_role(&admin, "Lector").await;
    let reader = app.token_for_role(role_id).await;

    let response = app
        .post(
            "/incidences/import",
            &reader,
            &json!([{
                "national_id": "1-0006-0006",
                "full_name": "Estudiante Seis",
                "title": "Deuda",
                "category": "deuda",
            }]),
        )
        .await;
    assert_eq!(response.status(), 403);

    app.cleanup().await;
}
