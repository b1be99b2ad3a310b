//! # ag-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `ag-core` domain models. One store backs the query, profile and
//! user ports; every query is filtered by owner.

use std::str::FromStr;

use ag_core::error::{AppError, Result};
use ag_core::models::{Category, QueryRecord, QueryStatus, UserAccount, UserProfile};
use ag_core::traits::{ProfileRepo, QueryRepo, UserRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS farmer_queries (
    id          BLOB PRIMARY KEY,
    user_id     BLOB NOT NULL,
    question    TEXT NOT NULL,
    crop_type   TEXT NOT NULL,
    category    TEXT NOT NULL,
    response    TEXT NOT NULL,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_farmer_queries_user ON farmer_queries (user_id, created_at);
CREATE TABLE IF NOT EXISTS profiles (
    user_id            BLOB PRIMARY KEY,
    full_name          TEXT NOT NULL DEFAULT '',
    farm_location      TEXT NOT NULL DEFAULT '',
    farm_size          TEXT NOT NULL DEFAULT '',
    primary_crops      TEXT NOT NULL DEFAULT '[]',
    farming_experience TEXT NOT NULL DEFAULT '',
    phone_number       TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS users (
    id            BLOB PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
)
"#;

pub struct SqliteStore {
    pool: SqlitePool,
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> anyhow::Result<Uuid> {
    Ok(Uuid::from_slice(blob)?)
}

impl SqliteStore {
    /// Opens (or creates) the database at `url` and applies the schema.
    ///
    /// `sqlite::memory:` is pinned to a single connection that never expires,
    /// since each in-memory connection is its own database.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().max_connections(5).connect_with(options).await?
        };

        let store = Self { pool };
        store.migrate().await?;
        log::info!("sqlite store ready at {}", url);
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn row_to_query(row: &SqliteRow) -> anyhow::Result<QueryRecord> {
    Ok(QueryRecord {
        id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id")?.as_slice())?,
        owner_id: blob_to_uuid(row.try_get::<Vec<u8>, _>("user_id")?.as_slice())?,
        question: row.try_get("question")?,
        crop_type: row.try_get("crop_type")?,
        category: Category::from_str(&row.try_get::<String, _>("category")?)?,
        response: row.try_get("response")?,
        status: QueryStatus::from_str(&row.try_get::<String, _>("status")?)?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl QueryRepo for SqliteStore {
    async fn create_query(&self, record: &QueryRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO farmer_queries (id, user_id, question, crop_type, category, response, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid_to_blob(record.id))
        .bind(uuid_to_blob(record.owner_id))
        .bind(&record.question)
        .bind(&record.crop_type)
        .bind(record.category.slug())
        .bind(&record.response)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_queries(&self, owner_id: Uuid) -> anyhow::Result<Vec<QueryRecord>> {
        sqlx::query("SELECT * FROM farmer_queries WHERE user_id = ? ORDER BY created_at DESC, id DESC")
            .bind(uuid_to_blob(owner_id))
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_query)
            .collect()
    }

    async fn get_query(&self, owner_id: Uuid, id: Uuid) -> anyhow::Result<Option<QueryRecord>> {
        let row = sqlx::query("SELECT * FROM farmer_queries WHERE id = ? AND user_id = ?")
            .bind(uuid_to_blob(id))
            .bind(uuid_to_blob(owner_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_query).transpose()
    }

    async fn delete_query(&self, owner_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM farmer_queries WHERE id = ? AND user_id = ?")
            .bind(uuid_to_blob(id))
            .bind(uuid_to_blob(owner_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_all_queries(&self, owner_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM farmer_queries WHERE user_id = ?")
            .bind(uuid_to_blob(owner_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProfileRepo for SqliteStore {
    async fn get_profile(&self, owner_id: Uuid) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT * FROM profiles WHERE user_id = ?")
            .bind(uuid_to_blob(owner_id))
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(UserProfile {
            full_name: row.try_get("full_name")?,
            farm_location: row.try_get("farm_location")?,
            farm_size: row.try_get("farm_size")?,
            primary_crops: serde_json::from_str(&row.try_get::<String, _>("primary_crops")?)?,
            farming_experience: row.try_get("farming_experience")?,
            phone_number: row.try_get("phone_number")?,
        }))
    }

    async fn upsert_profile(&self, owner_id: Uuid, profile: &UserProfile) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, full_name, farm_location, farm_size, primary_crops, farming_experience, phone_number) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET \
                full_name = excluded.full_name, \
                farm_location = excluded.farm_location, \
                farm_size = excluded.farm_size, \
                primary_crops = excluded.primary_crops, \
                farming_experience = excluded.farming_experience, \
                phone_number = excluded.phone_number",
        )
        .bind(uuid_to_blob(owner_id))
        .bind(&profile.full_name)
        .bind(&profile.farm_location)
        .bind(&profile.farm_size)
        .bind(serde_json::to_string(&profile.primary_crops)?)
        .bind(&profile.farming_experience)
        .bind(&profile.phone_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepo for SqliteStore {
    async fn create_user(&self, account: &UserAccount) -> Result<()> {
        let result = sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
            .bind(uuid_to_blob(account.id))
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(account.created_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(AppError::Conflict(format!("{} is already registered", account.email)))
            }
            Err(e) => Err(AppError::backend(e.into())),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<UserAccount>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(UserAccount {
            id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id")?.as_slice())?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ag_core::advisor::generate_response;
    use chrono::{Duration, Utc};

    async fn store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn record(owner_id: Uuid, question: &str, minutes_ago: i64) -> QueryRecord {
        QueryRecord {
            id: Uuid::now_v7(),
            owner_id,
            question: question.to_string(),
            crop_type: "wheat".to_string(),
            category: Category::Irrigation,
            response: generate_response(question, Some("wheat"), Category::Irrigation),
            status: QueryStatus::Resolved,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_newest_first() {
        let repo = store().await;
        let owner = Uuid::now_v7();

        repo.create_query(&record(owner, "older", 10)).await.unwrap();
        repo.create_query(&record(owner, "newer", 1)).await.unwrap();

        let listed = repo.list_queries(owner).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].question, "newer");
        assert_eq!(listed[1].question, "older");
        assert_eq!(listed[0].category, Category::Irrigation);
        assert_eq!(listed[0].status, QueryStatus::Resolved);
    }

    #[tokio::test]
    async fn test_get_is_owner_scoped() {
        let repo = store().await;
        let owner = Uuid::now_v7();
        let stranger = Uuid::now_v7();
        let rec = record(owner, "mine", 0);
        repo.create_query(&rec).await.unwrap();

        assert_eq!(repo.get_query(owner, rec.id).await.unwrap().unwrap().question, "mine");
        assert!(repo.get_query(stranger, rec.id).await.unwrap().is_none());
        assert!(!repo.delete_query(stranger, rec.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let repo = store().await;
        let owner = Uuid::now_v7();
        let keep = record(owner, "keep", 2);
        let gone = record(owner, "gone", 1);
        repo.create_query(&keep).await.unwrap();
        repo.create_query(&gone).await.unwrap();

        assert!(repo.delete_query(owner, gone.id).await.unwrap());
        assert!(!repo.delete_query(owner, gone.id).await.unwrap());

        let left = repo.list_queries(owner).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_delete_all_leaves_other_owners() {
        let repo = store().await;
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        repo.create_query(&record(alice, "a1", 2)).await.unwrap();
        repo.create_query(&record(alice, "a2", 1)).await.unwrap();
        repo.create_query(&record(bob, "b1", 1)).await.unwrap();

        assert_eq!(repo.delete_all_queries(alice).await.unwrap(), 2);
        assert!(repo.list_queries(alice).await.unwrap().is_empty());
        assert_eq!(repo.list_queries(bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_profile_upsert() {
        let repo = store().await;
        let owner = Uuid::now_v7();
        assert!(repo.get_profile(owner).await.unwrap().is_none());

        let mut profile = UserProfile {
            full_name: "Demo Farmer".into(),
            primary_crops: vec!["rice".into(), "coconut".into()],
            ..Default::default()
        };
        repo.upsert_profile(owner, &profile).await.unwrap();
        profile.farm_location = "Thrissur".into();
        repo.upsert_profile(owner, &profile).await.unwrap();

        assert_eq!(repo.get_profile(owner).await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let repo = store().await;
        let account = UserAccount {
            id: Uuid::now_v7(),
            email: "farmer@example.com".into(),
            password_hash: "$argon2id$fake".into(),
            created_at: Utc::now(),
        };
        repo.create_user(&account).await.unwrap();

        let again = UserAccount {
            id: Uuid::now_v7(),
            ..account.clone()
        };
        assert!(matches!(repo.create_user(&again).await, Err(AppError::Conflict(_))));

        let found = repo.find_user_by_email("farmer@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert!(repo.find_user_by_email("nobody@example.com").await.unwrap().is_none());
    }
}
