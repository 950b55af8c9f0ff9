//! Accounts and API key storage.
//!
//! The same key authenticates HTTP requests and the WebSocket `token`
//! query parameter.

use chrono::Utc;
use sqlx::Row;

use jugo_core::repository::credential::CredentialVerifier;
use jugo_types::error::{AuthError, RepositoryError};
use jugo_types::work::UserId;

use crate::crypto::hash::{generate_api_key, hash_api_key};

use super::pool::DatabasePool;
use super::{format_datetime, query_error};

/// SQLite-backed API key store.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: DatabasePool,
}

impl SqliteCredentialStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Register a user and return its id.
    pub async fn create_user(&self, username: &str) -> Result<UserId, RepositoryError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(RepositoryError::Query("username must not be empty".into()));
        }

        let result = sqlx::query("INSERT INTO users (username, created_at) VALUES (?, ?)")
            .bind(username)
            .bind(format_datetime(&Utc::now()))
            .execute(&self.pool.writer)
            .await;

        match result {
            Ok(done) => Ok(UserId(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                RepositoryError::Conflict(format!("username '{username}' is taken")),
            ),
            Err(e) => Err(query_error(e)),
        }
    }

    /// Create a key for `user_id` and return the plaintext, which is not
    /// stored anywhere.
    pub async fn create_key(&self, user_id: UserId, name: &str) -> Result<String, RepositoryError> {
        let plaintext_key = generate_api_key();
        let id = uuid::Uuid::now_v7().to_string();

        let result = sqlx::query(
            "INSERT INTO api_keys (id, key_hash, user_id, name, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(hash_api_key(&plaintext_key))
        .bind(user_id.0)
        .bind(name)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(plaintext_key),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("FOREIGN KEY") => {
                Err(RepositoryError::NotFound)
            }
            Err(e) => Err(query_error(e)),
        }
    }
}

impl CredentialVerifier for SqliteCredentialStore {
    async fn verify(&self, credential: &str) -> Result<UserId, AuthError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(AuthError::Missing);
        }

        let row = sqlx::query("SELECT id, user_id FROM api_keys WHERE key_hash = ?")
            .bind(hash_api_key(credential))
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let Some(row) = row else {
            return Err(AuthError::Invalid);
        };
        let key_id: String = row.try_get("id").map_err(|e| AuthError::Storage(e.to_string()))?;
        let user_id: i64 = row
            .try_get("user_id")
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        // Best effort: a failed timestamp update must not fail the request.
        let touched = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(format_datetime(&Utc::now()))
            .bind(&key_id)
            .execute(&self.pool.writer)
            .await;
        if let Err(err) = touched {
            tracing::debug!(error = %err, "failed to update api key last_used_at");
        }

        Ok(UserId(user_id))
    }
}
