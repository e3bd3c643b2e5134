use std::path::PathBuf;

use clap::{Args, Subcommand};

use gfhs_daemon::http_server::api::client::ApiError;
use gfhs_daemon::http_server::api::file::{DeleteFileRequest, UploadRequest};

use crate::cli::op::{Op, OpContext};

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Args, Debug, Clone)]
pub struct Get {
    /// `direct/{id}` or `{namespace}/{name}`
    pub route: String,
    /// Write the bytes here instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[async_trait::async_trait]
impl Op for Get {
    type Error = FileError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let (mime, bytes) = ctx.client.download(&self.route).await?;
        match &self.output {
            Some(path) => {
                tokio::fs::write(path, &bytes).await?;
                Ok(format!(
                    "Wrote {} bytes ({}) to {}",
                    bytes.len(),
                    mime,
                    path.display()
                ))
            }
            None => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct Put {
    /// `direct/{id}` or `{namespace}/{name}`
    pub route: String,
    /// Local file to upload
    pub source: PathBuf,
}

#[async_trait::async_trait]
impl Op for Put {
    type Error = FileError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        let bytes = tokio::fs::read(&self.source).await?;
        let file_name = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let file = ctx
            .client
            .call(UploadRequest {
                route: self.route.clone(),
                file_name,
                bytes,
            })
            .await?;
        Ok(format!(
            "{}/{} [{}] {} bytes, {}",
            file.namespace, file.name, file.id, file.size, file.mime
        ))
    }
}

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// `direct/{id}` or `{namespace}/{name}`
    pub route: String,
}

#[async_trait::async_trait]
impl Op for Rm {
    type Error = FileError;
    type Output = String;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        ctx.client
            .call(DeleteFileRequest {
                route: self.route.clone(),
            })
            .await?;
        Ok(format!("Deleted {}", self.route))
    }
}

crate::command_enum! {
    (Get, Get),
    (Put, Put),
    (Rm, Rm),
}

pub type FileCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct File {
    #[command(subcommand)]
    pub command: FileCommand,
}

#[async_trait::async_trait]
impl Op for File {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
