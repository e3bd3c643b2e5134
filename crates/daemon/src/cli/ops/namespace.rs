use clap::{Args, Subcommand};

use gfhs_daemon::http_server::api::client::ApiError;
use gfhs_daemon::http_server::api::namespace::{
    CreateNamespaceRequest, DeleteNamespaceRequest, GetNamespaceRequest, NamespaceInfo,
    UpdateNamespaceRequest,
};

use crate::cli::op::{Op, OpContext};

fn describe(namespace: &NamespaceInfo) -> String {
    let mime = if namespace.mime_types.is_empty() {
        "no uploads".to_string()
    } else {
        namespace.mime_types.join(", ")
    };
    format!(
        "{} (default: {}, accepts: {})",
        namespace.name, namespace.default_permission, mime
    )
}

#[derive(Args, Debug, Clone)]
pub struct Add {
    #[command(flatten)]
    pub request: CreateNamespaceRequest,
}

#[async_trait::async_trait]
impl Op for Add {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let namespace = ctx.client.call(self.request.clone()).await?;
        Ok(format!("Created {}", describe(&namespace)))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Namespace to list
    pub name: String,
}

#[async_trait::async_trait]
impl Op for Ls {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let listing = ctx
            .client
            .call(GetNamespaceRequest {
                name: self.name.clone(),
            })
            .await?;

        let mut lines = vec![describe(&listing.namespace)];
        lines.extend(
            listing
                .children
                .iter()
                .map(|child| format!("  {}/ (namespace)", child.name)),
        );
        lines.extend(listing.files.iter().map(|file| {
            format!(
                "  {} [{}] {} bytes, {}",
                file.name, file.id, file.size, file.mime
            )
        }));
        Ok(lines.join("\n"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Set {
    #[command(flatten)]
    pub request: UpdateNamespaceRequest,
}

#[async_trait::async_trait]
impl Op for Set {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let namespace = ctx.client.call(self.request.clone()).await?;
        Ok(format!("Updated {}", describe(&namespace)))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// Namespace to delete, with every child namespace and file in it
    pub name: String,
}

#[async_trait::async_trait]
impl Op for Rm {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let response = ctx
            .client
            .call(DeleteNamespaceRequest {
                name: self.name.clone(),
            })
            .await?;
        Ok(format!(
            "Deleted {} and {} file(s)",
            response.name, response.files_removed
        ))
    }
}

crate::command_enum! {
    (Add, Add),
    (Ls, Ls),
    (Set, Set),
    (Rm, Rm),
}

pub type NamespaceCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Namespace {
    #[command(subcommand)]
    pub command: NamespaceCommand,
}

#[async_trait::async_trait]
impl Op for Namespace {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
