//! # Redis
//!
//! Production storage backend.
//!
//! ## Layout
//!
//! Key names below are prefixed with the store namespace (empty by default).
//!
//! - `users`: hash of user id to JSON record
//! - `users:email`: hash of lowercase email to user id, written with `HSETNX`
//! - `identity_checks`: hash of check id to JSON record
//! - `identity_checks:user:{id}`: list of check ids, newest at the head
//! - `apps:official`: hash of entry id to JSON record
//! - `apps:official:package` / `apps:official:hash`: lookup indexes to entry id
//! - `apps:suspicious`: hash of entry id to JSON record
//! - `apps:suspicious:package`: package name to earliest entry id
//! - `apps:{official,suspicious}:recent`: list of entry ids, newest at the head
//! - `grievances`: hash of complaint id to JSON record, written with `HSETNX`
//! - `grievances:user:{id}`: list of complaint ids, newest at the head
//!
//! ## Atomicity
//!
//! Unique inserts rely on `HSETNX` so two concurrent writers can never both
//! claim the same email, package name or complaint id. Secondary indexes are
//! written afterwards in a `MULTI` pipeline; a failed pipeline releases the
//! package claim it followed. Status transitions run as one Lua script.
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client, RedisResult, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::{
    error::StoreError,
    models::{Grievance, GrievanceStatus, IdentityCheck, OfficialApp, SuspiciousApp, User},
    store::Store,
};

const USERS: &str = "users";
const USERS_BY_EMAIL: &str = "users:email";
const IDENTITY_CHECKS: &str = "identity_checks";
const OFFICIAL_APPS: &str = "apps:official";
const OFFICIAL_BY_PACKAGE: &str = "apps:official:package";
const OFFICIAL_BY_HASH: &str = "apps:official:hash";
const OFFICIAL_RECENT: &str = "apps:official:recent";
const SUSPICIOUS_APPS: &str = "apps:suspicious";
const SUSPICIOUS_BY_PACKAGE: &str = "apps:suspicious:package";
const SUSPICIOUS_RECENT: &str = "apps:suspicious:recent";
const GRIEVANCES: &str = "grievances";

/// Read-modify-write of one grievance in a single step.
/// ARGV holds JSON-encoded values, hence the extra `cjson.decode`.
const UPDATE_STATUS: &str = r#"
local raw = redis.call('HGET', KEYS[1], ARGV[1])
if not raw then
    return false
end
local record = cjson.decode(raw)
record.status = cjson.decode(ARGV[2])
record.updated_at = cjson.decode(ARGV[3])
local updated = cjson.encode(record)
redis.call('HSET', KEYS[1], ARGV[1], updated)
return updated
"#;

pub async fn init_redis(redis_url: &str) -> RedisResult<ConnectionManager> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_millis(500));

    let client = Client::open(redis_url)?;

    client.get_connection_manager_with_config(config).await
}

pub struct RedisStore {
    connection: ConnectionManager,
    namespace: String,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> RedisResult<Self> {
        Self::with_namespace(redis_url, "").await
    }

    /// Every key is prefixed with `namespace`, so several deployments can
    /// share one Redis.
    pub async fn with_namespace(redis_url: &str, namespace: &str) -> RedisResult<Self> {
        Ok(Self {
            connection: init_redis(redis_url).await?,
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, name: &str) -> String {
        format!("{}{name}", self.namespace)
    }

    fn identity_checks_of(&self, user_id: &str) -> String {
        self.key(&format!("identity_checks:user:{user_id}"))
    }

    fn grievances_of(&self, user_id: &str) -> String {
        self.key(&format!("grievances:user:{user_id}"))
    }

    async fn load<T: DeserializeOwned>(
        &self,
        hash: &str,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        let mut con = self.connection.clone();
        let raw: Option<String> = con.hget(hash, id).await?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn load_many<T: DeserializeOwned>(
        &self,
        hash: &str,
        ids: &[String],
    ) -> Result<Vec<T>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut con = self.connection.clone();
        let raw: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(hash)
            .arg(ids)
            .query_async(&mut con)
            .await?;

        raw.into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .collect()
    }

    async fn recent<T: DeserializeOwned>(
        &self,
        list: &str,
        hash: &str,
        limit: usize,
    ) -> Result<Vec<T>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut con = self.connection.clone();
        let ids: Vec<String> = con.lrange(list, 0, limit as isize - 1).await?;

        self.load_many(hash, &ids).await
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        index: &str,
        key: &str,
        hash: &str,
    ) -> Result<Option<T>, StoreError> {
        let mut con = self.connection.clone();
        let id: Option<String> = con.hget(index, key).await?;

        match id {
            Some(id) => self.load(hash, &id).await,
            None => Ok(None),
        }
    }
}

fn encode<T: Serialize>(record: &T) -> Result<String, StoreError> {
    serde_json::to_string(record).map_err(StoreError::from)
}

#[async_trait]
impl Store for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut con = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut con).await?;

        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut con = self.connection.clone();

        let _: () = con.hset(&self.key(USERS), &user.id, encode(user)?).await?;

        let claimed: bool = con
            .hset_nx(&self.key(USERS_BY_EMAIL), &user.email, &user.id)
            .await?;
        if !claimed {
            let _: () = con.hdel(&self.key(USERS), &user.id).await?;
            return Err(StoreError::Duplicate("email"));
        }

        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.load(&self.key(USERS), id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.lookup(&self.key(USERS_BY_EMAIL), email, &self.key(USERS)).await
    }

    async fn insert_identity_check(&self, check: &IdentityCheck) -> Result<(), StoreError> {
        let mut con = self.connection.clone();

        let _: () = redis::pipe()
            .atomic()
            .hset(&self.key(IDENTITY_CHECKS), &check.id, encode(check)?)
            .ignore()
            .lpush(self.identity_checks_of(&check.user_id), &check.id)
            .ignore()
            .query_async(&mut con)
            .await?;

        Ok(())
    }

    async fn find_identity_check(&self, id: &str) -> Result<Option<IdentityCheck>, StoreError> {
        self.load(&self.key(IDENTITY_CHECKS), id).await
    }

    async fn list_identity_checks(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<IdentityCheck>, StoreError> {
        self.recent(
            &self.identity_checks_of(user_id),
            &self.key(IDENTITY_CHECKS),
            limit,
        )
        .await
    }

    async fn insert_official_app(&self, app: &OfficialApp) -> Result<(), StoreError> {
        let mut con = self.connection.clone();

        if let Some(package_name) = &app.package_name {
            let claimed: bool = con
                .hset_nx(&self.key(OFFICIAL_BY_PACKAGE), package_name, &app.id)
                .await?;
            if !claimed {
                return Err(StoreError::Duplicate("package_name"));
            }
        }

        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset(&self.key(OFFICIAL_APPS), &app.id, encode(app)?)
            .ignore()
            .lpush(&self.key(OFFICIAL_RECENT), &app.id)
            .ignore();

        if let Some(hash) = &app.sha256_hash {
            pipe.hset_nx(&self.key(OFFICIAL_BY_HASH), hash, &app.id).ignore();
        }

        let written: RedisResult<()> = pipe.query_async(&mut con).await;
        if let Err(e) = written {
            // release the claim so the package can be registered again
            if let Some(package_name) = &app.package_name {
                let released: RedisResult<()> =
                    con.hdel(&self.key(OFFICIAL_BY_PACKAGE), package_name).await;
                if let Err(release_err) = released {
                    warn!("Failed to release package claim {package_name}: {release_err}");
                }
            }
            return Err(e.into());
        }

        Ok(())
    }

    async fn find_official_app(
        &self,
        package_name: Option<&str>,
        sha256_hash: Option<&str>,
    ) -> Result<Option<OfficialApp>, StoreError> {
        if let Some(package_name) = package_name {
            let hit = self
                .lookup(
                    &self.key(OFFICIAL_BY_PACKAGE),
                    package_name,
                    &self.key(OFFICIAL_APPS),
                )
                .await?;
            if hit.is_some() {
                return Ok(hit);
            }
        }

        match sha256_hash {
            Some(hash) => {
                self.lookup(&self.key(OFFICIAL_BY_HASH), hash, &self.key(OFFICIAL_APPS))
                    .await
            }
            None => Ok(None),
        }
    }

    async fn list_official_apps(&self, limit: usize) -> Result<Vec<OfficialApp>, StoreError> {
        self.recent(&self.key(OFFICIAL_RECENT), &self.key(OFFICIAL_APPS), limit)
            .await
    }

    async fn insert_suspicious_app(&self, app: &SuspiciousApp) -> Result<(), StoreError> {
        let mut con = self.connection.clone();

        let _: () = redis::pipe()
            .atomic()
            .hset(&self.key(SUSPICIOUS_APPS), &app.id, encode(app)?)
            .ignore()
            .hset_nx(&self.key(SUSPICIOUS_BY_PACKAGE), &app.package_name, &app.id)
            .ignore()
            .lpush(&self.key(SUSPICIOUS_RECENT), &app.id)
            .ignore()
            .query_async(&mut con)
            .await?;

        Ok(())
    }

    async fn find_suspicious_app(
        &self,
        package_name: &str,
    ) -> Result<Option<SuspiciousApp>, StoreError> {
        self.lookup(
            &self.key(SUSPICIOUS_BY_PACKAGE),
            package_name,
            &self.key(SUSPICIOUS_APPS),
        )
        .await
    }

    async fn list_suspicious_apps(&self, limit: usize) -> Result<Vec<SuspiciousApp>, StoreError> {
        self.recent(
            &self.key(SUSPICIOUS_RECENT),
            &self.key(SUSPICIOUS_APPS),
            limit,
        )
        .await
    }

    async fn insert_grievance(&self, grievance: &Grievance) -> Result<(), StoreError> {
        let mut con = self.connection.clone();

        let claimed: bool = con
            .hset_nx(
                &self.key(GRIEVANCES),
                &grievance.complaint_id,
                encode(grievance)?,
            )
            .await?;
        if !claimed {
            return Err(StoreError::Duplicate("complaint_id"));
        }

        let _: () = con
            .lpush(self.grievances_of(&grievance.user_id), &grievance.complaint_id)
            .await?;

        Ok(())
    }

    async fn find_grievance(&self, complaint_id: &str) -> Result<Option<Grievance>, StoreError> {
        self.load(&self.key(GRIEVANCES), complaint_id).await
    }

    async fn list_user_grievances(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Grievance>, StoreError> {
        self.recent(&self.grievances_of(user_id), &self.key(GRIEVANCES), limit)
            .await
    }

    async fn list_grievances(&self) -> Result<Vec<Grievance>, StoreError> {
        let mut con = self.connection.clone();
        let raw: Vec<String> = con.hvals(&self.key(GRIEVANCES)).await?;

        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }

    async fn update_grievance_status(
        &self,
        complaint_id: &str,
        status: GrievanceStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Grievance>, StoreError> {
        let mut con = self.connection.clone();

        let raw: Option<String> = Script::new(UPDATE_STATUS)
            .key(&self.key(GRIEVANCES))
            .arg(complaint_id)
            .arg(encode(&status)?)
            .arg(encode(&at)?)
            .invoke_async(&mut con)
            .await?;

        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }
}
