use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};
use url::Url;

use super::error::ApiError;
use super::ApiRequest;
use crate::access::Credentials;
use crate::http_server::api::{AUTH_TOKEN_HEADER, AUTH_USER_HEADER};

#[derive(Debug, Clone)]
pub struct ApiClient {
    pub remote: Url,
    client: Client,
}

/// Joined paths are relative, so the base must end in `/` or its last
/// segment (the path prefix) would be replaced.
fn with_trailing_slash(remote: &Url) -> Url {
    let mut remote = remote.clone();
    if !remote.path().ends_with('/') {
        let path = format!("{}/", remote.path());
        remote.set_path(&path);
    }
    remote
}

impl ApiClient {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        Self::build(remote, HeaderMap::new())
    }

    /// A client that presents `credentials` on every request.
    pub fn with_credentials(remote: &Url, credentials: &Credentials) -> Result<Self, ApiError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(AUTH_USER_HEADER, HeaderValue::from_str(&credentials.user)?);
        let mut token = HeaderValue::from_str(&credentials.token)?;
        token.set_sensitive(true);
        default_headers.insert(AUTH_TOKEN_HEADER, token);
        Self::build(remote, default_headers)
    }

    fn build(remote: &Url, default_headers: HeaderMap) -> Result<Self, ApiError> {
        let client = Client::builder().default_headers(default_headers).build()?;
        Ok(Self {
            remote: with_trailing_slash(remote),
            client,
        })
    }

    async fn check(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ApiError::HttpStatus(
                response.status(),
                response.text().await?,
            ))
        }
    }

    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<T::Response, ApiError> {
        let request_builder = request.build_request(&self.remote, &self.client)?;
        let response = Self::check(request_builder.send().await?).await?;

        // 204s carry no body; `()` responses decode from `null`
        let body = response.bytes().await?;
        let body: &[u8] = if body.is_empty() { b"null" } else { &body };
        Ok(serde_json::from_slice(body)?)
    }

    /// Fetch a file's bytes by its route (`direct/{id}` or
    /// `{namespace}/{name}`), with the content type the server sniffed.
    pub async fn download(&self, route: &str) -> Result<(String, Bytes), ApiError> {
        let url = self.remote.join(&format!("file/{}", route.trim_start_matches('/')))?;
        let response = Self::check(self.client.get(url).send().await?).await?;
        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok((mime, response.bytes().await?))
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    /// Get the underlying HTTP client for custom requests
    pub fn http_client(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_survives_join() {
        let client = ApiClient::new(&Url::parse("http://localhost:29320/gfhs").unwrap()).unwrap();
        assert_eq!(
            client.base_url().join("file/direct/x").unwrap().as_str(),
            "http://localhost:29320/gfhs/file/direct/x"
        );

        let client = ApiClient::new(&Url::parse("http://localhost:29320").unwrap()).unwrap();
        assert_eq!(
            client.base_url().join("auth/login").unwrap().as_str(),
            "http://localhost:29320/auth/login"
        );
    }
}
