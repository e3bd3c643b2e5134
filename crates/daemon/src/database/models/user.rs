use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};

use crate::database::Database;

/// An account. `password` holds an argon2 PHC string and never leaves the
/// process.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub admin: bool,
}

impl User {
    /// Insert a new account with an already hashed password
    pub async fn create(
        email: &str,
        password_hash: &str,
        admin: bool,
        db: &Database,
    ) -> Result<User, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (email, password, admin)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(admin)
        .execute(&**db)
        .await?;

        Self::get(email, db).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get(email: &str, db: &Database) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT email, password, admin
            FROM users
            WHERE email = ?1
            "#,
        )
        .bind(email)
        .fetch_optional(&**db)
        .await
    }

    pub async fn list(db: &Database) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT email, password, admin
            FROM users
            ORDER BY email ASC
            "#,
        )
        .fetch_all(&**db)
        .await
    }

    /// Replace the stored hash. Usable inside a transaction.
    pub async fn set_password<'e, E>(
        email: &str,
        password_hash: &str,
        conn: E,
    ) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET password = ?1 WHERE email = ?2")
            .bind(password_hash)
            .bind(email)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_admin(email: &str, admin: bool, db: &Database) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET admin = ?1 WHERE email = ?2")
            .bind(admin)
            .bind(email)
            .execute(&**db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove an account; its tokens and grants go with it
    pub async fn delete(email: &str, db: &Database) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE email = ?1")
            .bind(email)
            .execute(&**db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
