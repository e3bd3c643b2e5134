use clap::Args;

use gfhs_daemon::http_server::api::auth::{LoginRequest, LogoutRequest, ResetRequest};
use gfhs_daemon::http_server::api::client::ApiError;
use gfhs_daemon::state::StateError;

use crate::cli::op::SavedSession;

#[derive(Args, Debug, Clone)]
pub struct Login {
    #[command(flatten)]
    pub request: LoginRequest,
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("failed to save session: {0}")]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Login {
    type Error = LoginError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let response = ctx.client.call(self.request.clone()).await?;
        let path = SavedSession {
            user: response.user.clone(),
            token: response.token,
        }
        .save(ctx.config_path.clone())?;

        let expires = chrono::DateTime::from_timestamp(response.expiry, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| response.expiry.to_string());
        Ok(format!(
            "Logged in as {} until {}\nSession saved to {}",
            response.user,
            expires,
            path.display()
        ))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Logout;

#[async_trait::async_trait]
impl crate::cli::op::Op for Logout {
    type Error = LoginError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let result = ctx.client.call(LogoutRequest).await;
        // A stale saved session is dropped either way.
        SavedSession::clear(ctx.config_path.clone())?;
        result?;
        Ok("Logged out".to_string())
    }
}

/// Set a new password with a recovery token from an admin.
#[derive(Args, Debug, Clone)]
pub struct Reset {
    #[command(flatten)]
    pub request: ResetRequest,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Reset {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        ctx.client.call(self.request.clone()).await?;
        Ok(format!(
            "Password reset for {}; log in again",
            self.request.email
        ))
    }
}
