//! Credential checks and token lifecycle.

use std::time::Duration;

use common::prelude::generate_token;
use tokio::sync::OnceCell;

use crate::database::models::{AuthToken, User};
use crate::database::Database;

use super::password::{hash_password_blocking, verify_password_blocking};
use super::AccessError;

const MAX_EMAIL_LEN: usize = 254;

/// The `(user, token)` pair a client presents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub token: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn expiry_after(ttl: Duration) -> i64 {
    now().saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

/// Stands in for the stored hash when a login names no existing user.
async fn unknown_user_hash() -> Result<String, AccessError> {
    static HASH: OnceCell<String> = OnceCell::const_new();
    let hash = HASH
        .get_or_try_init(|| hash_password_blocking(generate_token()))
        .await?;
    Ok(hash.clone())
}

fn validate_email(email: &str) -> Result<(), AccessError> {
    let valid = !email.is_empty()
        && email.len() <= MAX_EMAIL_LEN
        && email.contains('@')
        && !email.chars().any(|c| c.is_whitespace() || c.is_control());
    if !valid {
        return Err(AccessError::Malformed(format!("invalid email {email:?}")));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct AuthValidator {
    db: Database,
    token_ttl: Duration,
    recovery_ttl: Duration,
}

impl AuthValidator {
    pub fn new(db: Database, token_ttl: Duration, recovery_ttl: Duration) -> Self {
        Self {
            db,
            token_ttl,
            recovery_ttl,
        }
    }

    /// The user behind an unexpired session token.
    pub async fn validate(&self, email: &str, token: &str) -> Result<User, AccessError> {
        let found = AuthToken::find_valid(email, token, false, now(), &self.db).await?;
        if found.is_none() {
            tracing::debug!(user = email, "rejected session token");
            return Err(AccessError::AuthFailure);
        }

        User::get(email, &self.db)
            .await?
            .ok_or(AccessError::AuthFailure)
    }

    /// No credentials means anonymous; bad credentials never do.
    pub async fn authenticate(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<Option<User>, AccessError> {
        match credentials {
            None => Ok(None),
            Some(c) => self.validate(&c.user, &c.token).await.map(Some),
        }
    }

    pub async fn create_user(
        &self,
        email: &str,
        password: &str,
        admin: bool,
    ) -> Result<User, AccessError> {
        validate_email(email)?;
        if User::get(email, &self.db).await?.is_some() {
            return Err(AccessError::Conflict(format!("user {email} exists")));
        }

        let hash = hash_password_blocking(password.to_string()).await?;
        let user = User::create(email, &hash, admin, &self.db).await?;
        tracing::info!(user = email, admin, "user created");
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AccessError> {
        Ok(User::list(&self.db).await?)
    }

    pub async fn set_admin(&self, email: &str, admin: bool) -> Result<(), AccessError> {
        if !User::set_admin(email, admin, &self.db).await? {
            return Err(AccessError::not_found(format!("user {email}")));
        }
        tracing::info!(user = email, admin, "admin flag changed");
        Ok(())
    }

    /// Removes the user with every token and grant they hold.
    pub async fn delete_user(&self, email: &str) -> Result<(), AccessError> {
        if !User::delete(email, &self.db).await? {
            return Err(AccessError::not_found(format!("user {email}")));
        }
        tracing::info!(user = email, "user deleted");
        Ok(())
    }

    /// Administrative password change. Existing sessions are revoked.
    pub async fn set_password(&self, email: &str, password: &str) -> Result<(), AccessError> {
        let hash = hash_password_blocking(password.to_string()).await?;

        let mut tx = self.db.begin().await?;
        if !User::set_password(email, &hash, &mut *tx).await? {
            return Err(AccessError::not_found(format!("user {email}")));
        }
        AuthToken::delete_sessions_for(email, &mut *tx).await?;
        tx.commit().await?;

        tracing::info!(user = email, "password changed");
        Ok(())
    }

    /// Exchange a password for a fresh session token.
    /// Unknown users cost the same argon2 verification as a wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken, AccessError> {
        let Some(user) = User::get(email, &self.db).await? else {
            verify_password_blocking(unknown_user_hash().await?, password.to_string()).await?;
            tracing::debug!(user = email, "unknown user");
            return Err(AccessError::AuthFailure);
        };

        if !verify_password_blocking(user.password, password.to_string()).await? {
            tracing::debug!(user = email, "wrong password");
            return Err(AccessError::AuthFailure);
        }

        let token = AuthToken {
            user: user.email,
            token: generate_token(),
            created_by: "login".to_string(),
            expiry: expiry_after(self.token_ttl),
            is_recovery: false,
        };
        token.insert(&self.db).await?;
        Ok(token)
    }

    /// Revoke the presented session token. `false` if it was already gone.
    pub async fn logout(&self, credentials: &Credentials) -> Result<bool, AccessError> {
        Ok(AuthToken::delete_session(&credentials.user, &credentials.token, &self.db).await?)
    }

    /// Mint a single-use recovery token for `email`.
    pub async fn issue_recovery_token(
        &self,
        email: &str,
        created_by: &str,
    ) -> Result<AuthToken, AccessError> {
        if User::get(email, &self.db).await?.is_none() {
            return Err(AccessError::not_found(format!("user {email}")));
        }

        let token = AuthToken {
            user: email.to_string(),
            token: generate_token(),
            created_by: created_by.to_string(),
            expiry: expiry_after(self.recovery_ttl),
            is_recovery: true,
        };
        token.insert(&self.db).await?;
        tracing::info!(user = email, created_by, "recovery token issued");
        Ok(token)
    }

    /// Spend a recovery token. Succeeds at most once per token, however
    /// many callers race on it.
    pub async fn consume_recovery_token(&self, email: &str, token: &str) -> Result<(), AccessError> {
        if AuthToken::consume_recovery(email, token, now(), &*self.db).await? {
            Ok(())
        } else {
            Err(AccessError::AuthFailure)
        }
    }

    /// Consume a recovery token and set a new password in one transaction.
    /// A failed attempt leaves both the token and the password untouched.
    pub async fn reset_password(
        &self,
        email: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), AccessError> {
        let hash = hash_password_blocking(new_password.to_string()).await?;

        let mut tx = self.db.begin().await?;
        if !AuthToken::consume_recovery(email, token, now(), &mut *tx).await? {
            return Err(AccessError::AuthFailure);
        }
        User::set_password(email, &hash, &mut *tx).await?;
        AuthToken::delete_sessions_for(email, &mut *tx).await?;
        tx.commit().await?;

        tracing::info!(user = email, "password reset through recovery token");
        Ok(())
    }

    /// Drop every expired token; returns how many went.
    pub async fn purge_expired(&self) -> Result<u64, AccessError> {
        Ok(AuthToken::purge_expired(now(), &self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);
    const HOUR: Duration = Duration::from_secs(60 * 60);

    async fn validator() -> AuthValidator {
        let db = Database::in_memory().await.unwrap();
        let auth = AuthValidator::new(db, DAY, HOUR);
        auth.create_user("alice@example.com", "alice-password", false)
            .await
            .unwrap();
        auth
    }

    #[tokio::test]
    async fn test_login_then_validate() {
        let auth = validator().await;
        let session = auth
            .login("alice@example.com", "alice-password")
            .await
            .unwrap();
        assert_eq!(session.token.len(), common::prelude::TOKEN_LENGTH);
        assert!(!session.is_recovery);

        let user = auth.validate("alice@example.com", &session.token).await.unwrap();
        assert_eq!(user.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_bad_credentials_fail() {
        let auth = validator().await;
        assert!(matches!(
            auth.login("alice@example.com", "wrong-password").await,
            Err(AccessError::AuthFailure)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "whatever-pass").await,
            Err(AccessError::AuthFailure)
        ));
        assert!(matches!(
            auth.validate("alice@example.com", "deadbeef").await,
            Err(AccessError::AuthFailure)
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_is_checked_against_a_real_hash() {
        let hash = unknown_user_hash().await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert_eq!(unknown_user_hash().await.unwrap(), hash);
        assert!(!verify_password_blocking(hash, "whatever-pass".to_string())
            .await
            .unwrap());

        let auth = validator().await;
        assert!(matches!(
            auth.login("nobody@example.com", "whatever-pass").await,
            Err(AccessError::AuthFailure)
        ));
    }

    #[tokio::test]
    async fn test_expired_token_rejected_and_purged() {
        let auth = validator().await;
        AuthToken {
            user: "alice@example.com".into(),
            token: "stale".into(),
            created_by: "test".into(),
            expiry: now() - 1,
            is_recovery: false,
        }
        .insert(&auth.db)
        .await
        .unwrap();

        assert!(matches!(
            auth.validate("alice@example.com", "stale").await,
            Err(AccessError::AuthFailure)
        ));
        assert_eq!(auth.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recovery_token_is_not_a_session() {
        let auth = validator().await;
        let recovery = auth
            .issue_recovery_token("alice@example.com", "admin@example.com")
            .await
            .unwrap();
        assert!(matches!(
            auth.validate("alice@example.com", &recovery.token).await,
            Err(AccessError::AuthFailure)
        ));
    }

    #[tokio::test]
    async fn test_recovery_token_consumed_once() {
        let auth = validator().await;
        let recovery = auth
            .issue_recovery_token("alice@example.com", "admin@example.com")
            .await
            .unwrap();

        let attempts = (0..8).map(|_| {
            let auth = auth.clone();
            let token = recovery.token.clone();
            tokio::spawn(async move {
                auth.consume_recovery_token("alice@example.com", &token)
                    .await
                    .is_ok()
            })
        });
        let results = futures::future::join_all(attempts).await;
        let successes = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_expired_recovery_token_fails() {
        let auth = validator().await;
        AuthToken {
            user: "alice@example.com".into(),
            token: "old-recovery".into(),
            created_by: "admin@example.com".into(),
            expiry: now() - 1,
            is_recovery: true,
        }
        .insert(&auth.db)
        .await
        .unwrap();

        assert!(matches!(
            auth.consume_recovery_token("alice@example.com", "old-recovery")
                .await,
            Err(AccessError::AuthFailure)
        ));
    }

    #[tokio::test]
    async fn test_reset_password_revokes_sessions() {
        let auth = validator().await;
        let session = auth
            .login("alice@example.com", "alice-password")
            .await
            .unwrap();
        let recovery = auth
            .issue_recovery_token("alice@example.com", "admin@example.com")
            .await
            .unwrap();

        auth.reset_password("alice@example.com", &recovery.token, "new-password-1")
            .await
            .unwrap();

        assert!(auth.validate("alice@example.com", &session.token).await.is_err());
        assert!(auth.login("alice@example.com", "alice-password").await.is_err());
        auth.login("alice@example.com", "new-password-1").await.unwrap();

        assert!(matches!(
            auth.reset_password("alice@example.com", &recovery.token, "another-pass")
                .await,
            Err(AccessError::AuthFailure)
        ));
    }

    #[tokio::test]
    async fn test_failed_reset_keeps_token() {
        let auth = validator().await;
        let recovery = auth
            .issue_recovery_token("alice@example.com", "admin@example.com")
            .await
            .unwrap();

        // too short, rejected before the token is touched
        assert!(matches!(
            auth.reset_password("alice@example.com", &recovery.token, "short")
                .await,
            Err(AccessError::Malformed(_))
        ));
        auth.consume_recovery_token("alice@example.com", &recovery.token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_logout() {
        let auth = validator().await;
        let session = auth
            .login("alice@example.com", "alice-password")
            .await
            .unwrap();
        let creds = Credentials::new("alice@example.com", session.token);
        assert!(auth.logout(&creds).await.unwrap());
        assert!(!auth.logout(&creds).await.unwrap());
        assert!(auth.authenticate(Some(&creds)).await.is_err());
        assert!(auth.authenticate(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_user_conflicts() {
        let auth = validator().await;
        assert!(matches!(
            auth.create_user("alice@example.com", "whatever-pass", false)
                .await,
            Err(AccessError::Conflict(_))
        ));
        assert!(matches!(
            auth.create_user("not an email", "whatever-pass", false).await,
            Err(AccessError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_user_drops_sessions() {
        let auth = validator().await;
        let session = auth
            .login("alice@example.com", "alice-password")
            .await
            .unwrap();
        auth.set_admin("alice@example.com", true).await.unwrap();
        assert!(auth.list_users().await.unwrap()[0].admin);

        auth.delete_user("alice@example.com").await.unwrap();
        assert!(auth.list_users().await.unwrap().is_empty());
        assert!(matches!(
            auth.validate("alice@example.com", &session.token).await,
            Err(AccessError::AuthFailure)
        ));
        assert!(matches!(
            auth.delete_user("alice@example.com").await,
            Err(AccessError::NotFound(_))
        ));
    }
}
