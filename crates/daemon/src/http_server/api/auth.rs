use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use super::client::{ApiError, ApiRequest};
use super::{json_body, MaybeCredentials, TOKEN_COOKIE, USER_COOKIE};
use crate::access::AccessError;
use crate::database::models::AuthToken;
use crate::ServiceState;

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct LoginRequest {
    /// Account email
    #[arg(long)]
    pub email: String,
    /// Account password
    #[arg(long)]
    pub password: String,
}

/// A session or recovery token. `expiry` is unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub user: String,
    pub token: String,
    pub expiry: i64,
}

impl From<AuthToken> for TokenResponse {
    fn from(token: AuthToken) -> Self {
        Self {
            user: token.user,
            token: token.token,
            expiry: token.expiry,
        }
    }
}

fn session_cookie(name: &'static str, value: String, path: &str) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(path.to_string())
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn clear_session(jar: SignedCookieJar, path: &str) -> SignedCookieJar {
    jar.remove(Cookie::build(USER_COOKIE).path(path.to_string()))
        .remove(Cookie::build(TOKEN_COOKIE).path(path.to_string()))
}

pub async fn login_handler(
    State(state): State<ServiceState>,
    jar: SignedCookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(SignedCookieJar, Json<TokenResponse>), AccessError> {
    let req = json_body(payload)?;
    let token = state.gate().login(&req.email, &req.password).await?;
    tracing::info!(user = %token.user, "login");

    let path = state.cookie_path();
    let jar = jar
        .add(session_cookie(USER_COOKIE, token.user.clone(), path))
        .add(session_cookie(TOKEN_COOKIE, token.token.clone(), path));
    Ok((jar, Json(token.into())))
}

/// Always clears the session cookies; 401 when no session matched.
pub async fn logout_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    jar: SignedCookieJar,
) -> Response {
    let jar = clear_session(jar, state.cookie_path());
    match state.gate().logout(credentials.credentials()).await {
        Ok(true) => (jar, StatusCode::NO_CONTENT).into_response(),
        Ok(false) => (jar, AccessError::AuthFailure).into_response(),
        Err(e) => (jar, e).into_response(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct RecoveryRequest {
    /// Account to issue a recovery token for
    #[arg(long)]
    pub email: String,
}

pub async fn recovery_handler(
    State(state): State<ServiceState>,
    credentials: MaybeCredentials,
    payload: Result<Json<RecoveryRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AccessError> {
    let req = json_body(payload)?;
    let token = state
        .gate()
        .issue_recovery(credentials.credentials(), &req.email)
        .await?;
    tracing::info!(user = %token.user, created_by = %token.created_by, "recovery token issued");
    Ok(Json(token.into()))
}

#[derive(Debug, Clone, Serialize, Deserialize, clap::Args)]
pub struct ResetRequest {
    /// Account email
    #[arg(long)]
    pub email: String,
    /// Recovery token
    #[arg(long)]
    pub token: String,
    /// New password
    #[arg(long)]
    pub password: String,
}

pub async fn reset_handler(
    State(state): State<ServiceState>,
    payload: Result<Json<ResetRequest>, JsonRejection>,
) -> Result<StatusCode, AccessError> {
    let req = json_body(payload)?;
    state
        .gate()
        .reset_password(&req.email, &req.token, &req.password)
        .await?;
    tracing::info!(user = %req.email, "password reset");
    Ok(StatusCode::NO_CONTENT)
}

impl ApiRequest for LoginRequest {
    type Response = TokenResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.post(base_url.join("auth/login")?).json(&self))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogoutRequest;

impl ApiRequest for LogoutRequest {
    type Response = ();

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.post(base_url.join("auth/logout")?))
    }
}

impl ApiRequest for RecoveryRequest {
    type Response = TokenResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.post(base_url.join("auth/recovery")?).json(&self))
    }
}

impl ApiRequest for ResetRequest {
    type Response = ();

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(client.post(base_url.join("auth/reset")?).json(&self))
    }
}
