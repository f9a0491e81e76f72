//! `PgStore` against a real `PostgreSQL` database.
//!
//! These run the same service code the HTTP tests use, but through the SQL
//! paths: the conditional token update, the admin upsert, and the partial
//! admin update.
//!
//! Run with:
//! ```bash
//! COURSEREG_TEST_DATABASE_URL=postgres://localhost/coursereg_test \
//!     cargo test -p coursereg-integration-tests --test postgres_store -- --ignored
//! ```

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use secrecy::SecretString;
use uuid::Uuid;

use coursereg_api::db::{PgStore, RegistrationStore, RepositoryError, create_pool};
use coursereg_api::models::RegistrationFields;
use coursereg_api::services::{
    AdminAuthService, AuthError, Redeemed, VerificationError, VerificationService,
};
use coursereg_core::{Email, RegistrationId, VerificationToken};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

async fn store() -> PgStore {
    let url = std::env::var("COURSEREG_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("COURSEREG_TEST_DATABASE_URL or DATABASE_URL must be set");
    let pool = create_pool(&SecretString::from(url)).await.unwrap();
    sqlx::migrate!("../api/migrations").run(&pool).await.unwrap();
    PgStore::new(pool)
}

fn unique_email(prefix: &str) -> Email {
    Email::parse(&format!("{prefix}-{}@example.com", Uuid::new_v4().simple())).unwrap()
}

fn fields(email: Email) -> RegistrationFields {
    RegistrationFields {
        full_name: "Jane Doe".to_string(),
        email,
        phone: "+15551234567".to_string(),
        organization: Some("Initech".to_string()),
        job_title: None,
        street_address: None,
        city: None,
        country: None,
        heard_about_us: None,
        future_interests: vec!["rust".to_string()],
    }
}

async fn backdate(store: &PgStore, id: RegistrationId, hours: i32) {
    sqlx::query(
        "UPDATE registrations SET created_at = NOW() - make_interval(hours => $1) WHERE id = $2",
    )
    .bind(hours)
    .bind(id.as_uuid())
    .execute(store.pool())
    .await
    .unwrap();
}

// ============================================================================
// Registrations
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_pg_redeem_once_then_repeat() {
    let store = store().await;
    let token = VerificationToken::generate();
    let created = store
        .insert(&fields(unique_email("verify")), &token)
        .await
        .unwrap();
    assert!(!created.verified);
    assert_eq!(created.verification_token.as_deref(), Some(token.as_str()));

    let service = VerificationService::new(&store, Some(DAY));
    assert_eq!(
        service.redeem(token.as_str()).await.unwrap(),
        Redeemed::Verified(created.id)
    );

    let row = store
        .find_by_redeemed_digest(&token.digest())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.id, created.id);
    assert!(row.verified);
    assert!(row.verified_at.is_some());
    assert!(row.verification_token.is_none());
    assert!(store.find_by_token(&token).await.unwrap().is_none());

    assert_eq!(
        service.redeem(token.as_str()).await.unwrap(),
        Redeemed::AlreadyVerified(created.id)
    );
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_pg_concurrent_redeems_verify_once() {
    let store = store().await;
    let token = VerificationToken::generate();
    let created = store
        .insert(&fields(unique_email("race")), &token)
        .await
        .unwrap();

    let service = VerificationService::new(&store, Some(DAY));
    let (a, b) = tokio::join!(service.redeem(token.as_str()), service.redeem(token.as_str()));
    let mut outcomes = [a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| matches!(o, Redeemed::AlreadyVerified(_)));

    assert_eq!(
        outcomes,
        [
            Redeemed::Verified(created.id),
            Redeemed::AlreadyVerified(created.id)
        ]
    );
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_pg_expired_token_leaves_row_unverified() {
    let store = store().await;
    let token = VerificationToken::generate();
    let created = store
        .insert(&fields(unique_email("stale")), &token)
        .await
        .unwrap();
    backdate(&store, created.id, 25).await;

    let err = VerificationService::new(&store, Some(DAY))
        .redeem(token.as_str())
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::Expired));

    let row = store.find_by_token(&token).await.unwrap().unwrap();
    assert!(!row.verified);
    assert!(row.verified_at.is_none());

    let redeemed = VerificationService::new(&store, None)
        .redeem(token.as_str())
        .await
        .unwrap();
    assert_eq!(redeemed, Redeemed::Verified(created.id));
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_pg_update_and_delete_registration() {
    let store = store().await;
    let token = VerificationToken::generate();
    let created = store
        .insert(&fields(unique_email("edit")), &token)
        .await
        .unwrap();

    let mut changed = fields(unique_email("edited"));
    changed.city = Some("Lisbon".to_string());
    changed.future_interests = Vec::new();
    let updated = store.update(created.id, &changed).await.unwrap().unwrap();
    assert_eq!(updated.city.as_deref(), Some("Lisbon"));
    assert!(updated.future_interests.is_empty());
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.verification_token, created.verification_token);

    assert!(
        store
            .update(RegistrationId::new_random(), &changed)
            .await
            .unwrap()
            .is_none()
    );

    assert!(store.delete(created.id).await.unwrap());
    assert!(!store.delete(created.id).await.unwrap());
}

// ============================================================================
// Admins
// ============================================================================

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_pg_seed_and_grant_roles() {
    let store = store().await;
    let auth = AdminAuthService::new(&store);
    let bootstrap = unique_email("root");

    let root = auth.seed(bootstrap.as_str(), "pw", &bootstrap).await.unwrap();
    assert!(root.is_superadmin);

    let granted = auth.grant(bootstrap.as_str(), "new pw").await.unwrap();
    assert_eq!(granted.id, root.id);
    assert!(granted.is_superadmin);

    let other = unique_email("staff");
    let staff = auth.seed(other.as_str(), "pw", &bootstrap).await.unwrap();
    assert!(!staff.is_superadmin);

    let shouted = other.as_str().to_uppercase();
    let again = auth.grant(&shouted, "pw").await.unwrap();
    assert_eq!(again.id, staff.id);
}

#[tokio::test]
#[ignore = "Requires a running PostgreSQL database"]
async fn test_pg_admin_partial_update_and_conflict() {
    let store = store().await;
    let auth = AdminAuthService::new(&store);
    let ada = auth.grant(unique_email("ada").as_str(), "pw").await.unwrap();
    let bob = auth.grant(unique_email("bob").as_str(), "pw").await.unwrap();

    let unchanged = auth.update_admin(ada.id, None, Some("next")).await.unwrap();
    assert_eq!(unchanged.email, ada.email);
    auth.change_password(ada.id, "next", "after").await.unwrap();

    let err = auth
        .update_admin(ada.id, Some(bob.email.as_str()), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::Repository(RepositoryError::Conflict(_))
    ));

    let err = auth.delete_admin(ada.id, ada.id).await.unwrap_err();
    assert!(matches!(err, AuthError::SelfDelete));
    assert!(
        auth.list_admins()
            .await
            .unwrap()
            .iter()
            .any(|a| a.id == ada.id)
    );

    auth.delete_admin(ada.id, bob.id).await.unwrap();
    auth.delete_admin(ada.id, bob.id).await.unwrap();
}
