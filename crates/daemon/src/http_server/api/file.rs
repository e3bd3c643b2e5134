use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use reqwest::{multipart, Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::prelude::PermissionValue;

use super::client::{ApiError, ApiRequest};
use super::{MaybeCredentials, UPLOAD_FIELD};
use crate::access::{AccessError, FileLocator};
use crate::database::models::File;
use crate::http_server::MAX_UPLOAD_SIZE_BYTES;
use crate::ServiceState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub mime: String,
    pub size: i64,
    pub default_permission: PermissionValue,
}

impl From<File> for FileInfo {
    fn from(file: File) -> Self {
        Self {
            id: file.id.to_string(),
            default_permission: *file.default_permission,
            name: file.name,
            namespace: file.namespace,
            mime: file.mime,
            size: file.size,
        }
    }
}

/// The bytes of the `upload` field; other fields are ignored.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Bytes, AccessError> {
    let mut multipart = multipart.map_err(|e| AccessError::Malformed(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AccessError::Malformed(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            tracing::debug!(field = ?field.name(), "ignoring multipart field");
            continue;
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AccessError::Malformed(e.body_text()))?;
        if bytes.len() > MAX_UPLOAD_SIZE_BYTES {
            return Err(AccessError::Malformed(format!(
                "upload larger than {MAX_UPLOAD_SIZE_BYTES} bytes"
            )));
        }
        return Ok(bytes);
    }

    Err(AccessError::Malformed(format!(
        "missing multipart field `{UPLOAD_FIELD}`"
    )))
}

pub async fn get_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    Path(route): Path<String>,
) -> Result<Response, AccessError> {
    let locator = FileLocator::from_route(&route)?;
    let content = state.gate().read(credentials.credentials(), &locator).await?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, content.file.mime),
            (X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
        ],
        content.bytes,
    )
        .into_response())
}

/// 201 when the upload created the file, 200 when it replaced it.
pub async fn put_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    Path(route): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AccessError> {
    let locator = FileLocator::from_route(&route)?;
    let bytes = read_upload(multipart).await?;
    let outcome = state
        .gate()
        .write(credentials.credentials(), &locator, bytes)
        .await?;

    let status = if outcome.created {
        tracing::info!(id = %outcome.file.id, namespace = %outcome.file.namespace, name = %outcome.file.name, "file created");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(FileInfo::from(outcome.file))).into_response())
}

pub async fn delete_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    Path(route): Path<String>,
) -> Result<StatusCode, AccessError> {
    let locator = FileLocator::from_route(&route)?;
    state
        .gate()
        .delete(credentials.credentials(), &locator)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload `bytes` to `route` (`direct/{id}` or `{namespace}/{name}`).
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub route: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ApiRequest for UploadRequest {
    type Response = FileInfo;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join(&format!("file/{}", self.route.trim_start_matches('/')))?;
        let part = multipart::Part::bytes(self.bytes).file_name(self.file_name);
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);
        Ok(client.put(full_url).multipart(form))
    }
}

#[derive(Debug, Clone)]
pub struct DeleteFileRequest {
    pub route: String,
}

impl ApiRequest for DeleteFileRequest {
    type Response = ();

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        let full_url = base_url.join(&format!("file/{}", self.route.trim_start_matches('/')))?;
        Ok(client.delete(full_url))
    }
}
