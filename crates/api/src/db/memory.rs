//! In-process store used by tests and local demos.
//!
//! Mirrors the constraints the `PostgreSQL` schema enforces: unique admin
//! emails, unique live verification tokens, and single-step redemption.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use coursereg_core::{AdminId, Email, RegistrationId, VerificationToken};

use super::{AdminStore, RegistrationStore, RepositoryError, RoleOnConflict};
use crate::models::{Admin, AdminCredentials, Registration, RegistrationFields};

#[derive(Debug, Default)]
struct Tables {
    registrations: Vec<Registration>,
    admins: Vec<AdminCredentials>,
}

/// Store backed by process memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic while holding the lock cannot leave a row half-written.
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rewrite the creation time of a registration.
    ///
    /// Lets tests age a registration past the verification window.
    pub fn set_registration_created_at(&self, id: RegistrationId, created_at: DateTime<Utc>) {
        if let Some(row) = self.lock().registrations.iter_mut().find(|r| r.id == id) {
            row.created_at = created_at;
        }
    }

    /// Stored password hash for an admin, if present.
    #[must_use]
    pub fn password_hash(&self, email: &Email) -> Option<String> {
        self.lock()
            .admins
            .iter()
            .find(|a| a.admin.email == *email)
            .map(|a| a.password_hash.clone())
    }
}

/// Newest first; rows created in the same instant keep reverse insertion order.
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().rev().cloned().collect();
    out.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    out
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn insert(
        &self,
        fields: &RegistrationFields,
        token: &VerificationToken,
    ) -> Result<Registration, RepositoryError> {
        let mut tables = self.lock();

        if tables
            .registrations
            .iter()
            .any(|r| r.verification_token.as_deref() == Some(token.as_str()))
        {
            return Err(RepositoryError::Conflict(
                "verification token already exists".to_string(),
            ));
        }

        let registration = Registration {
            id: RegistrationId::new_random(),
            full_name: fields.full_name.clone(),
            email: fields.email.clone(),
            phone: fields.phone.clone(),
            organization: fields.organization.clone(),
            job_title: fields.job_title.clone(),
            street_address: fields.street_address.clone(),
            city: fields.city.clone(),
            country: fields.country.clone(),
            heard_about_us: fields.heard_about_us.clone(),
            future_interests: fields.future_interests.clone(),
            verification_token: Some(token.as_str().to_owned()),
            verified: false,
            verified_at: None,
            redeemed_token_digest: None,
            created_at: Utc::now(),
        };
        tables.registrations.push(registration.clone());

        Ok(registration)
    }

    async fn list(&self) -> Result<Vec<Registration>, RepositoryError> {
        Ok(newest_first(&self.lock().registrations, |r| r.created_at))
    }

    async fn update(
        &self,
        id: RegistrationId,
        fields: &RegistrationFields,
    ) -> Result<Option<Registration>, RepositoryError> {
        let mut tables = self.lock();
        let Some(row) = tables.registrations.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };

        row.full_name.clone_from(&fields.full_name);
        row.email = fields.email.clone();
        row.phone.clone_from(&fields.phone);
        row.organization.clone_from(&fields.organization);
        row.job_title.clone_from(&fields.job_title);
        row.street_address.clone_from(&fields.street_address);
        row.city.clone_from(&fields.city);
        row.country.clone_from(&fields.country);
        row.heard_about_us.clone_from(&fields.heard_about_us);
        row.future_interests.clone_from(&fields.future_interests);

        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: RegistrationId) -> Result<bool, RepositoryError> {
        let mut tables = self.lock();
        let before = tables.registrations.len();
        tables.registrations.retain(|r| r.id != id);
        Ok(tables.registrations.len() < before)
    }

    async fn consume_token(
        &self,
        token: &VerificationToken,
        issued_after: Option<DateTime<Utc>>,
    ) -> Result<Option<RegistrationId>, RepositoryError> {
        let mut tables = self.lock();
        let Some(row) = tables.registrations.iter_mut().find(|r| {
            !r.verified
                && r.verification_token.as_deref() == Some(token.as_str())
                && issued_after.is_none_or(|not_before| r.created_at >= not_before)
        }) else {
            return Ok(None);
        };

        row.verified = true;
        row.verified_at = Some(Utc::now());
        row.verification_token = None;
        row.redeemed_token_digest = Some(token.digest());

        Ok(Some(row.id))
    }

    async fn find_by_token(
        &self,
        token: &VerificationToken,
    ) -> Result<Option<Registration>, RepositoryError> {
        Ok(self
            .lock()
            .registrations
            .iter()
            .find(|r| r.verification_token.as_deref() == Some(token.as_str()))
            .cloned())
    }

    async fn find_by_redeemed_digest(
        &self,
        digest: &str,
    ) -> Result<Option<Registration>, RepositoryError> {
        Ok(self
            .lock()
            .registrations
            .iter()
            .find(|r| r.verified && r.redeemed_token_digest.as_deref() == Some(digest))
            .cloned())
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<AdminCredentials>, RepositoryError> {
        Ok(self
            .lock()
            .admins
            .iter()
            .find(|a| a.admin.email == *email)
            .cloned())
    }

    async fn find_by_id(&self, id: AdminId) -> Result<Option<AdminCredentials>, RepositoryError> {
        Ok(self.lock().admins.iter().find(|a| a.admin.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Admin>, RepositoryError> {
        let tables = self.lock();
        let admins: Vec<Admin> = tables.admins.iter().map(|a| a.admin.clone()).collect();
        Ok(newest_first(&admins, |a| a.created_at))
    }

    async fn upsert(
        &self,
        email: &Email,
        password_hash: &str,
        is_superadmin: bool,
        on_conflict: RoleOnConflict,
    ) -> Result<Admin, RepositoryError> {
        let mut tables = self.lock();

        if let Some(existing) = tables.admins.iter_mut().find(|a| a.admin.email == *email) {
            existing.password_hash = password_hash.to_owned();
            if on_conflict == RoleOnConflict::Overwrite {
                existing.admin.is_superadmin = is_superadmin;
            }
            return Ok(existing.admin.clone());
        }

        let admin = Admin {
            id: AdminId::new_random(),
            email: email.clone(),
            is_superadmin,
            created_at: Utc::now(),
        };
        tables.admins.push(AdminCredentials {
            admin: admin.clone(),
            password_hash: password_hash.to_owned(),
        });

        Ok(admin)
    }

    async fn update(
        &self,
        id: AdminId,
        email: Option<&Email>,
        password_hash: Option<&str>,
    ) -> Result<Option<Admin>, RepositoryError> {
        let mut tables = self.lock();

        if let Some(email) = email
            && tables
                .admins
                .iter()
                .any(|a| a.admin.id != id && a.admin.email == *email)
        {
            return Err(RepositoryError::Conflict(
                "admin email already exists".to_string(),
            ));
        }

        let Some(row) = tables.admins.iter_mut().find(|a| a.admin.id == id) else {
            return Ok(None);
        };
        if let Some(email) = email {
            row.admin.email = email.clone();
        }
        if let Some(hash) = password_hash {
            hash.clone_into(&mut row.password_hash);
        }

        Ok(Some(row.admin.clone()))
    }

    async fn delete(&self, id: AdminId) -> Result<bool, RepositoryError> {
        let mut tables = self.lock();
        let before = tables.admins.len();
        tables.admins.retain(|a| a.admin.id != id);
        Ok(tables.admins.len() < before)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fields(name: &str) -> RegistrationFields {
        RegistrationFields {
            full_name: name.to_string(),
            email: Email::parse("jane@example.com").unwrap(),
            phone: "+15551234567".to_string(),
            organization: None,
            job_title: None,
            street_address: None,
            city: None,
            country: None,
            heard_about_us: None,
            future_interests: vec!["rust".to_string()],
        }
    }

    #[tokio::test]
    async fn test_consume_token_is_single_use() {
        let store = MemoryStore::new();
        let token = VerificationToken::generate();
        let reg = RegistrationStore::insert(&store, &fields("Jane"), &token)
            .await
            .unwrap();

        let first = store.consume_token(&token, None).await.unwrap();
        assert_eq!(first, Some(reg.id));
        let second = store.consume_token(&token, None).await.unwrap();
        assert_eq!(second, None);

        let row = store
            .find_by_redeemed_digest(&token.digest())
            .await
            .unwrap()
            .unwrap();
        assert!(row.verified);
        assert!(row.verified_at.is_some());
        assert!(row.verification_token.is_none());
    }

    #[tokio::test]
    async fn test_consume_token_respects_issued_after() {
        let store = MemoryStore::new();
        let token = VerificationToken::generate();
        let reg = RegistrationStore::insert(&store, &fields("Jane"), &token)
            .await
            .unwrap();
        store.set_registration_created_at(reg.id, Utc::now() - chrono::Duration::hours(48));

        let cutoff = Utc::now() - chrono::Duration::hours(24);
        assert_eq!(store.consume_token(&token, Some(cutoff)).await.unwrap(), None);
        assert!(store.find_by_token(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MemoryStore::new();
        let old = RegistrationStore::insert(&store, &fields("Old"), &VerificationToken::generate())
            .await
            .unwrap();
        let new = RegistrationStore::insert(&store, &fields("New"), &VerificationToken::generate())
            .await
            .unwrap();
        store.set_registration_created_at(old.id, Utc::now() - chrono::Duration::minutes(5));

        let ids: Vec<_> = RegistrationStore::list(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[tokio::test]
    async fn test_upsert_keep_preserves_super_flag() {
        let store = MemoryStore::new();
        let email = Email::parse_normalized("Boss@Example.com").unwrap();
        let boss = store
            .upsert(&email, "hash-1", true, RoleOnConflict::Overwrite)
            .await
            .unwrap();

        let again = store
            .upsert(&email, "hash-2", false, RoleOnConflict::Keep)
            .await
            .unwrap();
        assert_eq!(again.id, boss.id);
        assert!(again.is_superadmin);
        assert_eq!(store.password_hash(&email).as_deref(), Some("hash-2"));
    }

    #[tokio::test]
    async fn test_admin_update_rejects_duplicate_email() {
        let store = MemoryStore::new();
        let a = Email::parse("a@example.com").unwrap();
        let b = Email::parse("b@example.com").unwrap();
        store.upsert(&a, "h", false, RoleOnConflict::Keep).await.unwrap();
        let second = store.upsert(&b, "h", false, RoleOnConflict::Keep).await.unwrap();

        let result = AdminStore::update(&store, second.id, Some(&a), None).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_reports_missing_rows() {
        let store = MemoryStore::new();
        assert!(!AdminStore::delete(&store, AdminId::new_random()).await.unwrap());
        assert!(
            !RegistrationStore::delete(&store, RegistrationId::new_random())
                .await
                .unwrap()
        );
    }
}
