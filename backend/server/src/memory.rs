use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::{
    error::StoreError,
    models::{Grievance, GrievanceStatus, IdentityCheck, OfficialApp, SuspiciousApp, User},
    store::Store,
};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    user_by_email: HashMap<String, String>,
    identity_checks: Vec<IdentityCheck>,
    official_apps: Vec<OfficialApp>,
    suspicious_apps: Vec<SuspiciousApp>,
    grievances: Vec<Grievance>,
}

/// Vectors hold insertion order, so "most recent" is iteration from the back.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn recent<T: Clone>(items: impl DoubleEndedIterator<Item = T>, limit: usize) -> Vec<T> {
    items.rev().take(limit).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();

        if tables.user_by_email.contains_key(&user.email) {
            return Err(StoreError::Duplicate("email"));
        }

        tables
            .user_by_email
            .insert(user.email.clone(), user.id.clone());
        tables.users.insert(user.id.clone(), user.clone());

        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock();

        Ok(tables
            .user_by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn insert_identity_check(&self, check: &IdentityCheck) -> Result<(), StoreError> {
        self.tables.lock().identity_checks.push(check.clone());
        Ok(())
    }

    async fn find_identity_check(&self, id: &str) -> Result<Option<IdentityCheck>, StoreError> {
        Ok(self
            .tables
            .lock()
            .identity_checks
            .iter()
            .find(|check| check.id == id)
            .cloned())
    }

    async fn list_identity_checks(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<IdentityCheck>, StoreError> {
        let tables = self.tables.lock();

        Ok(recent(
            tables
                .identity_checks
                .iter()
                .filter(|check| check.user_id == user_id)
                .cloned(),
            limit,
        ))
    }

    async fn insert_official_app(&self, app: &OfficialApp) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();

        if let Some(package_name) = &app.package_name {
            if tables
                .official_apps
                .iter()
                .any(|existing| existing.package_name.as_ref() == Some(package_name))
            {
                return Err(StoreError::Duplicate("package_name"));
            }
        }

        tables.official_apps.push(app.clone());
        Ok(())
    }

    async fn find_official_app(
        &self,
        package_name: Option<&str>,
        sha256_hash: Option<&str>,
    ) -> Result<Option<OfficialApp>, StoreError> {
        let tables = self.tables.lock();

        let by_package = package_name.and_then(|name| {
            tables
                .official_apps
                .iter()
                .find(|app| app.package_name.as_deref() == Some(name))
        });

        let by_hash = || {
            sha256_hash.and_then(|hash| {
                tables
                    .official_apps
                    .iter()
                    .find(|app| app.sha256_hash.as_deref() == Some(hash))
            })
        };

        Ok(by_package.or_else(by_hash).cloned())
    }

    async fn list_official_apps(&self, limit: usize) -> Result<Vec<OfficialApp>, StoreError> {
        Ok(recent(
            self.tables.lock().official_apps.iter().cloned(),
            limit,
        ))
    }

    async fn insert_suspicious_app(&self, app: &SuspiciousApp) -> Result<(), StoreError> {
        self.tables.lock().suspicious_apps.push(app.clone());
        Ok(())
    }

    async fn find_suspicious_app(
        &self,
        package_name: &str,
    ) -> Result<Option<SuspiciousApp>, StoreError> {
        Ok(self
            .tables
            .lock()
            .suspicious_apps
            .iter()
            .find(|app| app.package_name == package_name)
            .cloned())
    }

    async fn list_suspicious_apps(&self, limit: usize) -> Result<Vec<SuspiciousApp>, StoreError> {
        Ok(recent(
            self.tables.lock().suspicious_apps.iter().cloned(),
            limit,
        ))
    }

    async fn insert_grievance(&self, grievance: &Grievance) -> Result<(), StoreError> {
        let mut tables = self.tables.lock();

        if tables
            .grievances
            .iter()
            .any(|existing| existing.complaint_id == grievance.complaint_id)
        {
            return Err(StoreError::Duplicate("complaint_id"));
        }

        tables.grievances.push(grievance.clone());
        Ok(())
    }

    async fn find_grievance(&self, complaint_id: &str) -> Result<Option<Grievance>, StoreError> {
        Ok(self
            .tables
            .lock()
            .grievances
            .iter()
            .find(|grievance| grievance.complaint_id == complaint_id)
            .cloned())
    }

    async fn list_user_grievances(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Grievance>, StoreError> {
        let tables = self.tables.lock();

        Ok(recent(
            tables
                .grievances
                .iter()
                .filter(|grievance| grievance.user_id == user_id)
                .cloned(),
            limit,
        ))
    }

    async fn list_grievances(&self) -> Result<Vec<Grievance>, StoreError> {
        Ok(self.tables.lock().grievances.clone())
    }

    async fn update_grievance_status(
        &self,
        complaint_id: &str,
        status: GrievanceStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Grievance>, StoreError> {
        let mut tables = self.tables.lock();

        Ok(tables
            .grievances
            .iter_mut()
            .find(|grievance| grievance.complaint_id == complaint_id)
            .map(|grievance| {
                grievance.status = status;
                grievance.updated_at = at;
                grievance.clone()
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn official(id: &str, package_name: Option<&str>, hash: Option<&str>) -> OfficialApp {
        OfficialApp {
            id: id.to_string(),
            package_name: package_name.map(str::to_string),
            sha256_hash: hash.map(str::to_string),
            publisher: Some("Bank".to_string()),
            google_play_link: None,
            last_verified: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_official_package_is_unique() {
        let store = MemoryStore::new();
        store
            .insert_official_app(&official("1", Some("com.bank.app"), None))
            .await
            .unwrap();

        let err = store
            .insert_official_app(&official("2", Some("com.bank.app"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("package_name")));

        // entries without a package name never collide
        store
            .insert_official_app(&official("3", None, Some("aa")))
            .await
            .unwrap();
        store
            .insert_official_app(&official("4", None, Some("bb")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_official_lookup_either_key() {
        let store = MemoryStore::new();
        store
            .insert_official_app(&official("1", Some("com.a"), Some("hash-a")))
            .await
            .unwrap();
        store
            .insert_official_app(&official("2", Some("com.b"), Some("hash-b")))
            .await
            .unwrap();

        let hit = store
            .find_official_app(Some("com.a"), Some("hash-b"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, "1");

        let hit = store
            .find_official_app(Some("com.unknown"), Some("hash-b"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, "2");

        assert!(store.find_official_app(None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lists_are_most_recent_first() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert_suspicious_app(&SuspiciousApp {
                    id: i.to_string(),
                    package_name: format!("com.fake{i}"),
                    publisher: None,
                    google_play_link: None,
                    confidence: 0.8,
                })
                .await
                .unwrap();
        }

        let listed = store.list_suspicious_apps(3).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|app| app.id.as_str()).collect();
        assert_eq!(ids, ["4", "3", "2"]);
    }
}
