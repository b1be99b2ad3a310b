//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! Every repository call is scoped by owner; a plugin must never return or
//! delete another owner's rows.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Identity, QueryRecord, Session, UserAccount, UserProfile};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

/// Persistence contract for query records.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait QueryRepo: Send + Sync {
    async fn create_query(&self, record: &QueryRecord) -> anyhow::Result<()>;
    /// Newest first.
    async fn list_queries(&self, owner_id: Uuid) -> anyhow::Result<Vec<QueryRecord>>;
    async fn get_query(&self, owner_id: Uuid, id: Uuid) -> anyhow::Result<Option<QueryRecord>>;
    /// Returns `false` when no matching row existed.
    async fn delete_query(&self, owner_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
    /// Returns the number of rows removed.
    async fn delete_all_queries(&self, owner_id: Uuid) -> anyhow::Result<u64>;
}

/// Persistence contract for farm profiles.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn get_profile(&self, owner_id: Uuid) -> anyhow::Result<Option<UserProfile>>;
    async fn upsert_profile(&self, owner_id: Uuid, profile: &UserProfile) -> anyhow::Result<()>;
}

/// Persistence contract for login accounts.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Fails with a conflict when the email is already registered.
    async fn create_user(&self, account: &UserAccount) -> Result<()>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserAccount>>;
}

/// Media storage contract for image previews.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Saves raw bytes and returns a media_id usable for preview URLs.
    async fn save_upload(&self, data: Vec<u8>, content_type: &str) -> anyhow::Result<String>;
    /// Deletes an upload and its thumbnail. Missing files are not an error.
    async fn remove(&self, media_id: &str) -> anyhow::Result<()>;
    /// Returns the URL or path to the original media.
    fn get_url(&self, media_id: &str) -> String;
    /// Returns the URL or path to the thumbnail.
    fn get_thumbnail_url(&self, media_id: &str) -> String;
}

/// Identity collaborator. Services never mint identities themselves.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    /// Session for the fixed demo identity.
    fn demo_session(&self) -> Result<Session>;
    fn resolve(&self, token: &str) -> Option<Identity>;
    fn sign_out(&self, token: &str);
}
