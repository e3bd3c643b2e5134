//! Account administration. Works on the local database directly, so the
//! first admin can be created before any session exists.

use clap::{Args, Subcommand};

use gfhs_daemon::access::AccessError;

use crate::cli::op::{LocalStateError, Op, OpContext};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error(transparent)]
    Local(#[from] LocalStateError),
    #[error("{0}")]
    Access(#[from] AccessError),
}

#[derive(Args, Debug, Clone)]
pub struct Add {
    /// Account email
    pub email: String,
    /// Initial password
    #[arg(long)]
    pub password: String,
    /// Grant administrator rights
    #[arg(long)]
    pub admin: bool,
}

#[async_trait::async_trait]
impl Op for Add {
    type Error = UserError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.local_state().await?;
        let user = state
            .gate()
            .auth()
            .create_user(&self.email, &self.password, self.admin)
            .await?;
        Ok(format!(
            "Created {}{}",
            user.email,
            if user.admin { " (admin)" } else { "" }
        ))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Passwd {
    /// Account email
    pub email: String,
    /// New password
    #[arg(long)]
    pub password: String,
}

#[async_trait::async_trait]
impl Op for Passwd {
    type Error = UserError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.local_state().await?;
        state
            .gate()
            .auth()
            .set_password(&self.email, &self.password)
            .await?;
        Ok(format!("Password changed for {}; sessions revoked", self.email))
    }
}

#[derive(Args, Debug, Clone)]
pub struct List;

#[async_trait::async_trait]
impl Op for List {
    type Error = UserError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.local_state().await?;
        let users = state.gate().auth().list_users().await?;
        if users.is_empty() {
            return Ok("No users".to_string());
        }
        Ok(users
            .iter()
            .map(|u| format!("{}{}", u.email, if u.admin { " (admin)" } else { "" }))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Admin {
    /// Account email
    pub email: String,
    /// Remove administrator rights instead of granting them
    #[arg(long)]
    pub revoke: bool,
}

#[async_trait::async_trait]
impl Op for Admin {
    type Error = UserError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.local_state().await?;
        state
            .gate()
            .auth()
            .set_admin(&self.email, !self.revoke)
            .await?;
        let verb = if self.revoke { "is no longer" } else { "is now" };
        Ok(format!("{} {verb} an admin", self.email))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// Account email
    pub email: String,
}

#[async_trait::async_trait]
impl Op for Rm {
    type Error = UserError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.local_state().await?;
        state.gate().auth().delete_user(&self.email).await?;
        Ok(format!("Deleted {}", self.email))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Recover {
    /// Account to issue a recovery token for
    pub email: String,
}

#[async_trait::async_trait]
impl Op for Recover {
    type Error = UserError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.local_state().await?;
        let token = state
            .gate()
            .auth()
            .issue_recovery_token(&self.email, "cli")
            .await?;
        Ok(format!("Recovery token for {}: {}", token.user, token.token))
    }
}

crate::command_enum! {
    (Add, Add),
    (Passwd, Passwd),
    (List, List),
    (Admin, Admin),
    (Rm, Rm),
    (Recover, Recover),
}

pub type UserCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct User {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[async_trait::async_trait]
impl Op for User {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
