use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::prelude::{PermissionValue, TargetType};

use super::client::{ApiError, ApiRequest};
use super::{json_body, MaybeCredentials};
use crate::access::AccessError;
use crate::database::models::Permission;
use crate::ServiceState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionInfo {
    pub user: String,
    pub target: String,
    pub target_type: TargetType,
    pub value: PermissionValue,
}

impl From<Permission> for PermissionInfo {
    fn from(permission: Permission) -> Self {
        Self {
            value: *permission.value,
            user: permission.user,
            target: permission.target,
            target_type: permission.target_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct GrantRequest {
    /// User receiving the grant
    #[arg(long)]
    pub user: String,
    /// File id or namespace name
    #[arg(long)]
    pub target: String,
    /// `file` or `namespace`
    #[arg(long)]
    pub target_type: TargetType,
    /// `read`, `write`, `read_write`, `creator` or a raw bitmask
    #[arg(long)]
    pub value: PermissionValue,
}

/// Grant, or replace an existing grant.
pub async fn grant_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    payload: Result<Json<GrantRequest>, JsonRejection>,
) -> Result<Json<PermissionInfo>, AccessError> {
    let req = json_body(payload)?;
    let permission = state
        .gate()
        .grant(
            credentials.credentials(),
            &req.user,
            &req.target,
            req.target_type,
            req.value,
        )
        .await?;
    let value: PermissionValue = *permission.value;
    tracing::info!(
        user = %permission.user,
        target = %permission.target,
        target_type = %permission.target_type,
        value = %value,
        "permission granted"
    );
    Ok(Json(permission.into()))
}

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct RevokeRequest {
    /// User losing the grant
    #[arg(long)]
    pub user: String,
    /// File id or namespace name
    #[arg(long)]
    pub target: String,
    /// `file` or `namespace`
    #[arg(long)]
    pub target_type: TargetType,
}

pub async fn revoke_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    payload: Result<Json<RevokeRequest>, JsonRejection>,
) -> Result<StatusCode, AccessError> {
    let req = json_body(payload)?;
    let removed = state
        .gate()
        .revoke(
            credentials.credentials(),
            &req.user,
            &req.target,
            req.target_type,
        )
        .await?;
    if !removed {
        return Err(AccessError::not_found(format!(
            "grant for {} on {} {}",
            req.user, req.target_type, req.target
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's own explicit grants.
pub async fn list_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
) -> Result<Json<Vec<PermissionInfo>>, AccessError> {
    let permissions = state
        .gate()
        .my_permissions(credentials.credentials())
        .await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}

impl ApiRequest for GrantRequest {
    type Response = PermissionInfo;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.put(base_url.join("permission")?).json(&self))
    }
}

impl ApiRequest for RevokeRequest {
    type Response = ();

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.delete(base_url.join("permission")?).json(&self))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListPermissionsRequest;

impl ApiRequest for ListPermissionsRequest {
    type Response = Vec<PermissionInfo>;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.get(base_url.join("permission")?))
    }
}
