mod common;

use common::TestApp;
use serde_json::json;

fn sample_bundle(title: &str) -> serde_json::Value {
    json!({
        "person": {
            "national_id": "1-2345-6789",
            "full_name": "Carlos Jimenez",
            "birth_date": "2010-03-14",
        },
        "institution": {
            "code": "ESC-001",
            "name": "Escuela Central",
            "kind": "primaria",
        },
        "incidence": {
            "title": title,
            "description": "Mensualidad pendiente",
            "category": "deuda",
            "amount": "125.50",
            "occurred_on": "2026-08-01",
        },
        "family_members": [
            {
                "national_id": "1-1111-1111",
                "full_name": "Maria Jimenez",
                "relationship": "madre",
            },
            {
                "national_id": "1-2222-2222",
                "full_name": "Jorge Jimenez",
                "relationship": "padre",
            },
        ],
    })
}

#[tokio::test]
async fn composite_create_resolves_and_links_everything() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let response = app.post("/incidences", &admin, &sample_bundle("Deuda agosto")).await;
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["person"]["national_id"], "1-2345-6789");
    assert_eq!(body["incidence"]["status"], "abierta");
    assert_eq!(body["incidence"]["confidentiality"], "publica");
    assert_eq!(body["institution"]["code"], "ESC-001");
    assert_eq!(body["family_links"].as_array().unwrap().len(), 2);
    assert!(
        body["incidence"]["reported_by"].is_string(),
        "reporter is taken from the caller"
    );

    // Family members were materialized as persons too.
    let persons: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM persons")
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(persons, 3);

    app.cleanup().await;
}

#[tokio::test]
async fn resubmission_reuses_persons_and_institutions() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let first = app.post("/incidences", &admin, &sample_bundle("Deuda agosto")).await;
    assert_eq!(first.status(), 201);
    let first: serde_json::Value = first.json().await.unwrap();

    let second = app
        .post("/incidences", &admin, &sample_bundle("Deuda septiembre"))
        .await;
    assert_eq!(second.status(), 201);
    let second: serde_json::Value = second.json().await.unwrap();

    // Same natural keys resolve to the same rows; only the incidence is new.
    assert_eq!(first["person"]["person_id"], second["person"]["person_id"]);
    assert_eq!(
        first["institution"]["institution_id"],
        second["institution"]["institution_id"]
    );
    assert_ne!(
        first["incidence"]["incidence_id"],
        second["incidence"]["incidence_id"]
    );

    let persons: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM persons")
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(persons, 3);

    let incidences: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incidences")
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(incidences, 2);

    app.cleanup().await;
}

#[tokio::test]
async fn relinking_updates_the_relationship_in_place() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let mut bundle = sample_bundle("Deuda agosto");
    app.post("/incidences", &admin, &bundle).await;

    // Same pair, different relationship label.
    bundle["family_members"] = json!([{
        "national_id": "1-1111-1111",
        "full_name": "Maria Jimenez",
        "relationship": "encargada",
    }]);
    let response = app.post("/incidences", &admin, &bundle).await;
    assert_eq!(response.status(), 201);

    let links: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM family_links fl \
         JOIN persons fm ON fm.person_id = fl.family_member_id \
         WHERE fm.national_id = '1-1111-1111'",
    )
    .fetch_one(app.db.pool())
    .await
    .unwrap();
    assert_eq!(links, 1);

    let relationship: String = sqlx::query_scalar(
        "SELECT fl.relationship FROM family_links fl \
         JOIN persons fm ON fm.person_id = fl.family_member_id \
         WHERE fm.national_id = '1-1111-1111'",
    )
    .fetch_one(app.db.pool())
    .await
    .unwrap();
    assert_eq!(relationship, "encargada");

    app.cleanup().await;
}

#[tokio::test]
async fn bundle_validation_rejects_incomplete_input() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let mut bundle = sample_bundle("Deuda agosto");
    bundle["person"]["national_id"] = json!("   ");
    let response = app.post("/incidences", &admin, &bundle).await;
    assert_eq!(response.status(), 400);

    let mut bundle = sample_bundle("");
    bundle["incidence"]["title"] = json!("");
    let response = app.post("/incidences", &admin, &bundle).await;
    assert_eq!(response.status(), 400);

    // Nothing was written by the rejected requests.
    let persons: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM persons")
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(persons, 0);

    app.cleanup().await;
}

#[tokio::test]
async fn list_filters_by_national_id_and_status() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    app.post("/incidences", &admin, &sample_bundle("Deuda agosto")).await;

    let mut other = sample_bundle("Conducta");
    other["person"] = json!({
        "national_id": "9-8765-4321",
        "full_name": "Lucia Vargas",
    });
    other["incidence"]["category"] = json!("conducta");
    app.post("/incidences", &admin, &other).await;

    let response = app.get("/incidences?national_id=1-2345-6789", &admin).await;
    assert_eq!(response.status(), 200);
    let list: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Deuda agosto");

    let response = app.get("/incidences?category=conducta", &admin).await;
    let list: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Conducta");

    let response = app.get("/incidences", &admin).await;
    let list: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(list.len(), 2);

    app.cleanup().await;
}

#[tokio::test]
async fn update_and_delete_incidence() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let response = app.post("/incidences", &admin, &sample_bundle("Deuda agosto")).await;
    let body: serde_json::Value = response.json().await.unwrap();
    let incidence_id = body["incidence"]["incidence_id"].as_str().unwrap().to_string();

    let response = app
        .put(
            &format!("/incidences/{}", incidence_id),
            &admin,
            &json!({ "status": "resuelta" }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated: serde_json::Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "resuelta");
    assert_eq!(updated["title"], "Deuda agosto");

    let response = app.get(&format!("/incidences/{}", incidence_id), &admin).await;
    assert_eq!(response.status(), 200);
    let detail: serde_json::Value = response.json().await.unwrap();
    assert_eq!(detail["person_national_id"], "1-2345-6789");
    assert_eq!(detail["institution_name"], "Escuela Central");

    let response = app.delete(&format!("/incidences/{}", incidence_id), &admin).await;
    assert_eq!(response.status(), 200);

    let response = app.get(&format!("/incidences/{}", incidence_id), &admin).await;
    assert_eq!(response.status(), 404);

    app.cleanup().await;
}
