// Database - SQLite pool, schema bootstrap and transaction entry point
// Every service goes through this type for connections

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use tracing::info;

use crate::error::{AppError, AppResult};

/// A write transaction; commit explicitly, dropping rolls back.
pub type DatabaseTransaction = Transaction<'static, Sqlite>;

const SCHEMA: [(&str, &str); 9] = [
    (
        "users table",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            user_name TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            bio TEXT,
            profile_picture TEXT,
            cover_photo TEXT,
            profile_visibility TEXT NOT NULL DEFAULT 'public',
            post_visibility TEXT NOT NULL DEFAULT 'public',
            notify_follow INTEGER NOT NULL DEFAULT 1,
            notify_like INTEGER NOT NULL DEFAULT 1,
            notify_comment INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "followers table",
        r#"
        CREATE TABLE IF NOT EXISTS followers (
            follower_id INTEGER NOT NULL REFERENCES users(id),
            following_id INTEGER NOT NULL REFERENCES users(id),
            created_at INTEGER NOT NULL,
            PRIMARY KEY (follower_id, following_id),
            CHECK (follower_id <> following_id)
        )
        "#,
    ),
    (
        "posts table",
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            content TEXT,
            media TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER
        )
        "#,
    ),
    (
        "post_likes table",
        r#"
        CREATE TABLE IF NOT EXISTS post_likes (
            user_id INTEGER NOT NULL REFERENCES users(id),
            post_id INTEGER NOT NULL REFERENCES posts(id),
            created_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, post_id)
        )
        "#,
    ),
    (
        "comments table",
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY,
            post_id INTEGER NOT NULL REFERENCES posts(id),
            user_id INTEGER NOT NULL REFERENCES users(id),
            comment TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER
        )
        "#,
    ),
    (
        "notifications table",
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            type TEXT NOT NULL,
            message TEXT NOT NULL,
            read INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER
        )
        "#,
    ),
    (
        "revoked_tokens table",
        r#"
        CREATE TABLE IF NOT EXISTS revoked_tokens (
            jti TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            revoked_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "posts feed index",
        "CREATE INDEX IF NOT EXISTS idx_posts_user_created ON posts(user_id, created_at DESC)",
    ),
    (
        "followers reverse index",
        "CREATE INDEX IF NOT EXISTS idx_followers_following ON followers(following_id, follower_id)",
    ),
];

const SECONDARY_INDEXES: [(&str, &str); 3] = [
    (
        "post_likes post index",
        "CREATE INDEX IF NOT EXISTS idx_post_likes_post ON post_likes(post_id)",
    ),
    (
        "comments post index",
        "CREATE INDEX IF NOT EXISTS idx_comments_post_created ON comments(post_id, created_at)",
    ),
    (
        "notifications inbox index",
        "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, read, created_at DESC)",
    ),
];

/// SQLite-backed relational store shared by all services.
#[derive(Debug, Clone)]
pub struct SocialDatabase {
    pool: SqlitePool,
}

impl SocialDatabase {
    /// Connect to `url`, creating the database file when missing.
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::DatabaseError(format!("Invalid database url {}: {}", url, e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to {}: {}", url, e)))?;

        let db = Self { pool };
        db.initialize().await?;
        info!(url, "Database ready");
        Ok(db)
    }

    /// In-memory store pinned to a single long-lived connection, since each
    /// SQLite memory connection is its own database.
    pub async fn new_in_memory() -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| AppError::DatabaseError(format!("Invalid in-memory url: {}", e)))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect_with(options)
            .await
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e))
            })?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Create tables and indexes that do not exist yet.
    pub async fn initialize(&self) -> AppResult<()> {
        for (name, ddl) in SCHEMA.iter().chain(SECONDARY_INDEXES.iter()) {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to create {}: {}", name, e)))?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to begin transaction: {}", e)))
    }

    /// Health check to verify database connectivity
    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Database health check failed: {}", e)))?;
        Ok(())
    }
}

/// Commit `tx`, mapping failures like every other store error.
pub async fn commit(tx: DatabaseTransaction) -> AppResult<()> {
    tx.commit()
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to commit transaction: {}", e)))
}

/// True when `err` is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let db = SocialDatabase::new_in_memory().await.unwrap();
        db.initialize().await.unwrap();
        db.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_self_follow_rejected_by_schema() {
        let db = SocialDatabase::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, user_name, email, password_hash, created_at, updated_at)
             VALUES (1, 'A', 'B', 'ab', 'ab@example.com', 'x', 0, 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let result = sqlx::query(
            "INSERT INTO followers (follower_id, following_id, created_at) VALUES (1, 1, 0)",
        )
        .execute(db.pool())
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_like_is_unique_violation() {
        let db = SocialDatabase::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, user_name, email, password_hash, created_at, updated_at)
             VALUES (1, 'A', 'B', 'ab', 'ab@example.com', 'x', 0, 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query("INSERT INTO posts (id, user_id, created_at, updated_at) VALUES (10, 1, 0, 0)")
            .execute(db.pool())
            .await
            .unwrap();

        let insert = "INSERT INTO post_likes (user_id, post_id, created_at) VALUES (1, 10, 0)";
        sqlx::query(insert).execute(db.pool()).await.unwrap();
        let err = sqlx::query(insert).execute(db.pool()).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }
}
