//! Admin login, bootstrap seeding, and admin account management.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use coursereg_core::AdminId;
use coursereg_integration_tests::{ADMIN_PASSWORD, BOOTSTRAP_EMAIL, TestApp, status_and_json};

async fn login_body(app: &TestApp, email: &str, password: &str) -> (StatusCode, Value) {
    status_and_json(
        app.post(
            "/api/admin/login",
            &json!({ "email": email, "password": password }),
        )
        .await,
    )
    .await
}

async fn admin_id(app: &TestApp, token: &str, email: &str) -> String {
    let (_, admins) = status_and_json(app.get_as(token, "/api/admins").await).await;
    admins
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["email"] == email)
        .map(|a| a["id"].as_str().unwrap().to_string())
        .unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = app.client.get(app.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Seeding & Login
// ============================================================================

#[tokio::test]
async fn test_only_bootstrap_email_becomes_super_admin() {
    let app = TestApp::spawn().await;

    let (status, body) = status_and_json(app.seed("ROOT@example.com").await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert_eq!(app.seed("other@example.com").await.status(), StatusCode::OK);

    let (status, body) = login_body(&app, BOOTSTRAP_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isSuperAdmin"], true);
    assert_eq!(body["token"].as_str().unwrap().split('.').count(), 3);

    let (status, body) = login_body(&app, "Other@Example.com", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isSuperAdmin"], false);
}

#[tokio::test]
async fn test_seed_resets_password() {
    let app = TestApp::spawn().await;
    app.seed(BOOTSTRAP_EMAIL).await;

    let resp = app
        .post(
            "/api/admin/seed",
            &json!({ "email": BOOTSTRAP_EMAIL, "password": "a brand new password" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, _) = login_body(&app, BOOTSTRAP_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = login_body(&app, BOOTSTRAP_EMAIL, "a brand new password").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isSuperAdmin"], true);
}

#[tokio::test]
async fn test_seed_requires_token_when_configured() {
    let app = TestApp::builder().seed_token("let-me-in").spawn().await;
    let body = json!({ "email": BOOTSTRAP_EMAIL, "password": ADMIN_PASSWORD });

    let (status, resp) = status_and_json(app.post("/api/admin/seed", &body).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp["error"], "unauthorized");

    let resp = app
        .client
        .post(app.url("/api/admin/seed"))
        .header("x-seed-token", "wrong")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .client
        .post(app.url("/api/admin/seed"))
        .header("x-seed-token", "let-me-in")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_seed_requires_email_and_password() {
    let app = TestApp::spawn().await;

    let (status, body) = status_and_json(
        app.post("/api/admin/seed", &json!({ "email": BOOTSTRAP_EMAIL }))
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing email or password");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::spawn().await;
    app.seed(BOOTSTRAP_EMAIL).await;

    let (status, wrong_password) = login_body(&app, BOOTSTRAP_EMAIL, "nope").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, unknown_email) = login_body(&app, "ghost@example.com", "nope").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, garbage_email) = login_body(&app, "not an email", "nope").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(wrong_password, json!({ "error": "invalid credentials" }));
    assert_eq!(wrong_password, unknown_email);
    assert_eq!(wrong_password, garbage_email);
}

// ============================================================================
// Password Change
// ============================================================================

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::spawn().await;
    let token = app.super_admin().await;

    let (status, body) = status_and_json(
        app.put_as(
            &token,
            "/api/admin/change-password",
            &json!({ "currentPassword": "wrong", "newPassword": "next password" }),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "current password is incorrect");

    let (status, body) = status_and_json(
        app.put_as(
            &token,
            "/api/admin/change-password",
            &json!({ "currentPassword": ADMIN_PASSWORD, "newPassword": "next password" }),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, _) = login_body(&app, BOOTSTRAP_EMAIL, "next password").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_needs_claim() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .put(app.url("/api/admin/change-password"))
        .json(&json!({ "currentPassword": "a", "newPassword": "b" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Admin Management
// ============================================================================

#[tokio::test]
async fn test_plain_admin_is_forbidden_from_admin_management() {
    let app = TestApp::spawn().await;
    let super_token = app.super_admin().await;
    let plain_token = app.plain_admin(&super_token, "staff@example.com").await;

    let (status, body) = status_and_json(app.get_as(&plain_token, "/api/admins").await).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "super admin privileges required");

    let resp = app
        .post_as(
            &plain_token,
            "/api/admin/grant",
            &json!({ "email": "sneaky@example.com", "password": "pw" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let target = format!("/api/admin/{}", AdminId::new_random());
    assert_eq!(
        app.delete_as(&plain_token, &target).await.status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_list_admins_hides_password_hashes() {
    let app = TestApp::spawn().await;
    let token = app.super_admin().await;
    app.plain_admin(&token, "staff@example.com").await;

    let (status, body) = status_and_json(app.get_as(&token, "/api/admins").await).await;
    assert_eq!(status, StatusCode::OK);
    let admins = body.as_array().unwrap();
    assert_eq!(admins.len(), 2);

    for admin in admins {
        let keys: Vec<&String> = admin.as_object().unwrap().keys().collect();
        assert!(!keys.iter().any(|k| k.contains("password")));
    }

    let staff = admins.iter().find(|a| a["email"] == "staff@example.com").unwrap();
    assert_eq!(staff["is_superadmin"], false);
}

#[tokio::test]
async fn test_grant_keeps_existing_super_admin_role() {
    let app = TestApp::spawn().await;
    let token = app.super_admin().await;

    let resp = app
        .post_as(
            &token,
            "/api/admin/grant",
            &json!({ "email": BOOTSTRAP_EMAIL, "password": "granted password" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, body) = login_body(&app, BOOTSTRAP_EMAIL, "granted password").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isSuperAdmin"], true);
}

#[tokio::test]
async fn test_update_admin_email_and_password() {
    let app = TestApp::spawn().await;
    let token = app.super_admin().await;
    app.plain_admin(&token, "staff@example.com").await;
    let id = admin_id(&app, &token, "staff@example.com").await;
    let path = format!("/api/admin/{id}");

    let (status, body) = status_and_json(
        app.put_as(
            &token,
            &path,
            &json!({ "email": "Renamed@Example.com", "password": "renamed password" }),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "renamed@example.com");
    assert_eq!(body["id"], id.as_str());

    let (status, _) = login_body(&app, "renamed@example.com", "renamed password").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        status_and_json(app.put_as(&token, &path, &json!({ "email": "" })).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "no changes");

    let (status, body) = status_and_json(
        app.put_as(&token, &path, &json!({ "email": BOOTSTRAP_EMAIL }))
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already exists"));

    let missing = format!("/api/admin/{}", AdminId::new_random());
    let (status, body) = status_and_json(
        app.put_as(&token, &missing, &json!({ "password": "x" }))
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "admin not found");
}

#[tokio::test]
async fn test_delete_admin() {
    let app = TestApp::spawn().await;
    let token = app.super_admin().await;
    app.plain_admin(&token, "staff@example.com").await;

    let own = format!("/api/admin/{}", admin_id(&app, &token, BOOTSTRAP_EMAIL).await);
    let (status, body) = status_and_json(app.delete_as(&token, &own).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "cannot delete your own account");

    let (_, admins) = status_and_json(app.get_as(&token, "/api/admins").await).await;
    assert!(admins.as_array().unwrap().iter().any(|a| a["email"] == BOOTSTRAP_EMAIL));
    let (status, _) = login_body(&app, BOOTSTRAP_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    let staff = format!(
        "/api/admin/{}",
        admin_id(&app, &token, "staff@example.com").await
    );
    let (status, body) = status_and_json(app.delete_as(&token, &staff).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, _) = login_body(&app, "staff@example.com", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = status_and_json(app.delete_as(&token, &staff).await).await;
    assert_eq!(status, StatusCode::OK);
}
