use clap::{Args, Subcommand};

use gfhs_daemon::http_server::api::client::ApiError;
use gfhs_daemon::http_server::api::permission::{
    GrantRequest, ListPermissionsRequest, RevokeRequest,
};

use crate::cli::op::{Op, OpContext};

#[derive(Args, Debug, Clone)]
pub struct Add {
    #[command(flatten)]
    pub request: GrantRequest,
}

#[async_trait::async_trait]
impl Op for Add {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let permission = ctx.client.call(self.request.clone()).await?;
        Ok(format!(
            "{} now has {} on {} {}",
            permission.user, permission.value, permission.target_type, permission.target
        ))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Rm {
    #[command(flatten)]
    pub request: RevokeRequest,
}

#[async_trait::async_trait]
impl Op for Rm {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        ctx.client.call(self.request.clone()).await?;
        Ok(format!(
            "Revoked {}'s grant on {} {}",
            self.request.user, self.request.target_type, self.request.target
        ))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Ls;

#[async_trait::async_trait]
impl Op for Ls {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let permissions = ctx.client.call(ListPermissionsRequest).await?;
        if permissions.is_empty() {
            return Ok("No explicit grants".to_string());
        }
        Ok(permissions
            .iter()
            .map(|p| format!("{} {}: {}", p.target_type, p.target, p.value))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

crate::command_enum! {
    (Add, Add),
    (Rm, Rm),
    (Ls, Ls),
}

pub type PermissionCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Permission {
    #[command(subcommand)]
    pub command: PermissionCommand,
}

#[async_trait::async_trait]
impl Op for Permission {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
