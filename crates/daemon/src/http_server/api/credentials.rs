use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use http::request::Parts;
use http::HeaderMap;

use crate::access::{AccessError, Credentials};

pub const AUTH_USER_HEADER: &str = "authuser";
pub const AUTH_TOKEN_HEADER: &str = "authtoken";
pub const USER_COOKIE: &str = "gfhs_user";
pub const TOKEN_COOKIE: &str = "gfhs_token";

/// The `(user, token)` pair a request presents, if any.
///
/// Headers win over the signed session cookies. Half a pair from either
/// source is an authentication failure, not an anonymous request.
#[derive(Debug, Clone, Default)]
pub struct MaybeCredentials(pub Option<Credentials>);

impl MaybeCredentials {
    pub fn credentials(&self) -> Option<&Credentials> {
        self.0.as_ref()
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>, AccessError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim().to_string()))
            .map_err(|_| AccessError::AuthFailure),
    }
}

fn pair(user: Option<String>, token: Option<String>) -> Result<Option<Credentials>, AccessError> {
    match (user, token) {
        (Some(user), Some(token)) => Ok(Some(Credentials::new(user, token))),
        (None, None) => Ok(None),
        _ => Err(AccessError::AuthFailure),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeCredentials
where
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AccessError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let from_headers = pair(
            header_value(&parts.headers, AUTH_USER_HEADER)?,
            header_value(&parts.headers, AUTH_TOKEN_HEADER)?,
        )?;
        if from_headers.is_some() {
            return Ok(Self(from_headers));
        }

        let jar = SignedCookieJar::from_headers(&parts.headers, Key::from_ref(state));
        let from_cookies = pair(
            jar.get(USER_COOKIE).map(|c| c.value().to_string()),
            jar.get(TOKEN_COOKIE).map(|c| c.value().to_string()),
        )?;
        Ok(Self(from_cookies))
    }
}
