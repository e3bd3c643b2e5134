use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::prelude::PermissionValue;

use super::client::{ApiError, ApiRequest};
use super::file::FileInfo;
use super::{json_body, MaybeCredentials};
use crate::access::{AccessError, NamespaceListing, NewNamespace};
use crate::database::models::Namespace;
use crate::ServiceState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub name: String,
    pub parent: Option<String>,
    pub default_permission: PermissionValue,
    pub mime_types: Vec<String>,
}

impl From<Namespace> for NamespaceInfo {
    fn from(namespace: Namespace) -> Self {
        Self {
            name: namespace.name,
            parent: namespace.parent,
            default_permission: *namespace.default_permission,
            mime_types: namespace.mime_types.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct CreateNamespaceRequest {
    /// Full namespace name, e.g. `photos/2024`
    pub name: String,
    /// Parent namespace; omit for a root namespace
    #[arg(long)]
    #[serde(default)]
    pub parent: Option<String>,
    /// Permission for users without an explicit grant
    #[arg(long, default_value = "nothing")]
    #[serde(default)]
    pub default_permission: PermissionValue,
    /// Allowed upload MIME types; repeat for several. None allows nothing.
    #[arg(long = "mime")]
    #[serde(default)]
    pub mime_types: Vec<String>,
}

pub async fn create_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    payload: Result<Json<CreateNamespaceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<NamespaceInfo>), AccessError> {
    let req = json_body(payload)?;
    let namespace = state
        .gate()
        .create_namespace(
            credentials.credentials(),
            NewNamespace {
                name: req.name,
                parent: req.parent,
                default_permission: req.default_permission,
                mime_types: req.mime_types.into_iter().collect(),
            },
        )
        .await?;
    tracing::info!(namespace = %namespace.name, "namespace created");
    Ok((StatusCode::CREATED, Json(namespace.into())))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceListingResponse {
    pub namespace: NamespaceInfo,
    pub children: Vec<NamespaceInfo>,
    pub files: Vec<FileInfo>,
}

impl From<NamespaceListing> for NamespaceListingResponse {
    fn from(listing: NamespaceListing) -> Self {
        Self {
            namespace: listing.namespace.into(),
            children: listing.children.into_iter().map(Into::into).collect(),
            files: listing.files.into_iter().map(Into::into).collect(),
        }
    }
}

pub async fn get_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    Path(name): Path<String>,
) -> Result<Json<NamespaceListingResponse>, AccessError> {
    let listing = state
        .gate()
        .list_namespace(credentials.credentials(), name.trim_matches('/'))
        .await?;
    Ok(Json(listing.into()))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, clap::Args)]
pub struct UpdateNamespaceRequest {
    /// Namespace to update
    #[serde(skip)]
    pub name: String,
    /// Replace the allowed upload MIME types
    #[arg(long = "mime")]
    #[serde(default)]
    pub mime_types: Option<Vec<String>>,
    /// Replace the default permission
    #[arg(long)]
    #[serde(default)]
    pub default_permission: Option<PermissionValue>,
}

pub async fn update_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    Path(name): Path<String>,
    payload: Result<Json<UpdateNamespaceRequest>, JsonRejection>,
) -> Result<Json<NamespaceInfo>, AccessError> {
    let req = json_body(payload)?;
    let namespace = state
        .gate()
        .update_namespace(
            credentials.credentials(),
            name.trim_matches('/'),
            req.mime_types.map(|types| types.into_iter().collect()),
            req.default_permission,
        )
        .await?;
    Ok(Json(namespace.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteNamespaceResponse {
    pub name: String,
    pub files_removed: usize,
}

pub async fn delete_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    Path(name): Path<String>,
) -> Result<Json<DeleteNamespaceResponse>, AccessError> {
    let name = name.trim_matches('/').to_string();
    let files_removed = state
        .gate()
        .delete_namespace(credentials.credentials(), &name)
        .await?;
    tracing::info!(namespace = %name, files_removed, "namespace deleted");
    Ok(Json(DeleteNamespaceResponse {
        name,
        files_removed,
    }))
}

impl ApiRequest for CreateNamespaceRequest {
    type Response = NamespaceInfo;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.post(base_url.join("namespace")?).json(&self))
    }
}

#[derive(Debug, Clone)]
pub struct GetNamespaceRequest {
    pub name: String,
}

impl ApiRequest for GetNamespaceRequest {
    type Response = NamespaceListingResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.get(base_url.join(&format!("namespace/{}", self.name))?))
    }
}

impl ApiRequest for UpdateNamespaceRequest {
    type Response = NamespaceInfo;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join(&format!("namespace/{}", self.name))?;
        Ok(client.put(full_url).json(&self))
    }
}

#[derive(Debug, Clone)]
pub struct DeleteNamespaceRequest {
    pub name: String,
}

impl ApiRequest for DeleteNamespaceRequest {
    type Response = DeleteNamespaceResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.delete(base_url.join(&format!("namespace/{}", self.name))?))
    }
}
