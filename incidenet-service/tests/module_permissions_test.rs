mod common;

use common::TestApp;
use serde_json::json;

fn names(permissions: &[serde_json::Value]) -> Vec<String> {
    permissions
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn replace_normalizes_and_reconciles_the_set() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let module_id = app.create_module(&admin, "matriculas").await;

    // Mixed case, whitespace, duplicates and empties collapse away.
    let response = app
        .put(
            &format!("/modules/{}/permissions", module_id),
            &admin,
            &json!({ "permissions": ["Ver", " crear ", "ver", ""] }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let permissions: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(names(&permissions), vec!["crear", "ver"]);

    // Replacing with the same set is a no-op: ids are stable.
    let ids_before: Vec<&str> = permissions
        .iter()
        .map(|p| p["permission_id"].as_str().unwrap())
        .collect();

    let response = app
        .put(
            &format!("/modules/{}/permissions", module_id),
            &admin,
            &json!({ "permissions": ["crear", "ver"] }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let again: Vec<serde_json::Value> = response.json().await.unwrap();
    let ids_after: Vec<&str> = again
        .iter()
        .map(|p| p["permission_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids_before, ids_after);

    // Dropping one and adding another only touches the difference.
    let response = app
        .put(
            &format!("/modules/{}/permissions", module_id),
            &admin,
            &json!({ "permissions": ["ver", "eliminar"] }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let reconciled: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(names(&reconciled), vec!["eliminar", "ver"]);
    let ver_after = reconciled
        .iter()
        .find(|p| p["name"] == "ver")
        .unwrap()["permission_id"]
        .as_str()
        .unwrap();
    let ver_before = permissions
        .iter()
        .find(|p| p["name"] == "ver")
        .unwrap()["permission_id"]
        .as_str()
        .unwrap();
    assert_eq!(ver_before, ver_after, "retained permission keeps its id");

    app.cleanup().await;
}

#[tokio::test]
async fn replace_keeps_grants_on_retained_permissions() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let role_id = app.create_role(&admin, "Secretaria").await;
    let module_id = app.create_module(&admin, "personas").await;

    app.put(
        &format!("/modules/{}/permissions", module_id),
        &admin,
        &json!({ "permissions": ["ver", "crear"] }),
    )
    .await;

    let response = app
        .get(&format!("/modules/{}/permissions", module_id), &admin)
        .await;
    let permissions: Vec<serde_json::Value> = response.json().await.unwrap();
    let ver_id = permissions
        .iter()
        .find(|p| p["name"] == "ver")
        .unwrap()["permission_id"]
        .as_str()
        .unwrap()
        .to_string();
    let crear_id = permissions
        .iter()
        .find(|p| p["name"] == "crear")
        .unwrap()["permission_id"]
        .as_str()
        .unwrap()
        .to_string();

    for id in [&ver_id, &crear_id] {
        app.put(
            &format!("/roles/{}/grants", role_id),
            &admin,
            &json!({ "permission_id": id, "granted": true }),
        )
        .await;
    }

    // Drop "crear"; the grant on "ver" must survive, the one on "crear" must go.
    let response = app
        .put(
            &format!("/modules/{}/permissions", module_id),
            &admin,
            &json!({ "permissions": ["ver"] }),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app.get(&format!("/roles/{}/grants", role_id), &admin).await;
    let grants: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0]["permission_id"].as_str().unwrap(), ver_id);

    app.cleanup().await;
}

#[tokio::test]
async fn merge_only_adds_names() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;
    let module_id = app.create_module(&admin, "pagos").await;

    app.put(
        &format!("/modules/{}/permissions", module_id),
        &admin,
        &json!({ "permissions": ["ver"] }),
    )
    .await;

    let response = app
        .post(
            &format!("/modules/{}/permissions", module_id),
            &admin,
            &json!({ "permissions": ["editar", "Ver"] }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let permissions: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(names(&permissions), vec!["editar", "ver"]);

    app.cleanup().await;
}

#[tokio::test]
async fn module_delete_cascades_to_permissions_and_grants() {
    let app = TestApp::spawn().await;
    let admin = app.admin_token().await;

    let role_id = app.create_role(&admin, "Auxiliar").await;
    let module_id = app.create_module(&admin, "familias").await;

    app.put(
        &format!("/modules/{}/permissions", module_id),
        &admin,
        &json!({ "permissions": ["ver"] }),
    )
    .await;
    let response = app
        .get(&format!("/modules/{}/permissions", module_id), &admin)
        .await;
    let permissions: Vec<serde_json::Value> = response.json().await.unwrap();
    let ver_id = permissions[0]["permission_id"].as_str().unwrap().to_string();

    app.put(
        &format!("/roles/{}/grants", role_id),
        &admin,
        &json!({ "permission_id": ver_id, "granted": true }),
    )
    .await;

    let response = app.delete(&format!("/modules/{}", module_id), &admin).await;
    assert_eq!(response.status(), 200);

    let response = app.get(&format!("/modules/{}", module_id), &admin).await;
    assert_eq!(response.status(), 404);

    // The grant went with the module.
    let response = app.get(&format!("/roles/{}/grants", role_id), &admin).await;
    let grants: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(grants.is_empty());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE module_id = $1")
        .bind(module_id)
        .fetch_one(app.db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);

    app.cleanup().await;
}
