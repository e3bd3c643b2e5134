use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

use crate::database::Database;

/// A session or recovery credential. `expiry` is in unix seconds and the
/// token is valid only while `expiry > now`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuthToken {
    pub user: String,
    pub token: String,
    pub created_by: String,
    pub expiry: i64,
    pub is_recovery: bool,
}

impl AuthToken {
    pub async fn insert(&self, db: &Database) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (user, token, created_by, expiry, is_recovery)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&self.user)
        .bind(&self.token)
        .bind(&self.created_by)
        .bind(self.expiry)
        .bind(self.is_recovery)
        .execute(&**db)
        .await?;

        Ok(())
    }

    /// An unexpired token of the requested kind, if one matches
    pub async fn find_valid(
        user: &str,
        token: &str,
        is_recovery: bool,
        now: i64,
        db: &Database,
    ) -> Result<Option<AuthToken>, sqlx::Error> {
        sqlx::query_as::<_, AuthToken>(
            r#"
            SELECT user, token, created_by, expiry, is_recovery
            FROM auth_tokens
            WHERE user = ?1 AND token = ?2 AND is_recovery = ?3 AND expiry > ?4
            "#,
        )
        .bind(user)
        .bind(token)
        .bind(is_recovery)
        .bind(now)
        .fetch_optional(&**db)
        .await
    }

    /// Delete a session token
    pub async fn delete_session(
        user: &str,
        token: &str,
        db: &Database,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM auth_tokens WHERE user = ?1 AND token = ?2 AND is_recovery = 0",
        )
        .bind(user)
        .bind(token)
        .execute(&**db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check and spend a recovery token in one statement. Of any number of
    /// concurrent callers presenting the same token, exactly one sees `true`.
    pub async fn consume_recovery<'e, E>(
        user: &str,
        token: &str,
        now: i64,
        conn: E,
    ) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"
            DELETE FROM auth_tokens
            WHERE user = ?1 AND token = ?2 AND is_recovery = 1 AND expiry > ?3
            "#,
        )
        .bind(user)
        .bind(token)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Drop every session token of a user
    pub async fn delete_sessions_for<'e, E>(user: &str, conn: E) -> Result<u64, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE user = ?1 AND is_recovery = 0")
            .bind(user)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn purge_expired(now: i64, db: &Database) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE expiry <= ?1")
            .bind(now)
            .execute(&**db)
            .await?;

        Ok(result.rows_affected())
    }
}
