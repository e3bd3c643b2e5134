//! Shared harness: the full router over an in-memory database and content
//! store, driven with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::Router;
use http::{header, Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower::ServiceExt;

use gfhs_daemon::access::{Credentials, NewNamespace};
use gfhs_daemon::http_server;
use gfhs_daemon::{ServiceConfig, ServiceState};

use common::prelude::PermissionValue;

pub const ADMIN: &str = "admin@example.com";
pub const ALICE: &str = "alice@example.com";
pub const BOB: &str = "bob@example.com";
pub const PASSWORD: &str = "correct-horse";

pub const PNG: &[u8] = b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00\x00\x0DIHDR\x00\x00\x00\x01";
pub const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00";

const BOUNDARY: &str = "gfhs-test-boundary";

pub struct Harness {
    pub state: ServiceState,
    pub router: Router,
    pub admin: Credentials,
    pub alice: Credentials,
    pub bob: Credentials,
}

pub async fn harness() -> Harness {
    harness_with_prefix("").await
}

pub async fn harness_with_prefix(prefix: &str) -> Harness {
    let config = ServiceConfig {
        path_prefix: prefix.to_string(),
        ..Default::default()
    };
    let state = ServiceState::from_config(&config).await.unwrap();
    let router = http_server::router(
        &http_server::Config::new(config.listen_addr, config.path_prefix.clone()),
        state.clone(),
    );

    let auth = state.gate().auth();
    auth.create_user(ADMIN, PASSWORD, true).await.unwrap();
    auth.create_user(ALICE, PASSWORD, false).await.unwrap();
    auth.create_user(BOB, PASSWORD, false).await.unwrap();

    let session = |email: &'static str| {
        let auth = auth.clone();
        async move {
            let token = auth.login(email, PASSWORD).await.unwrap();
            Credentials::new(email, token.token)
        }
    };

    Harness {
        admin: session(ADMIN).await,
        alice: session(ALICE).await,
        bob: session(BOB).await,
        state,
        router,
    }
}

impl Harness {
    /// Root namespace owned by the admin.
    pub async fn namespace(&self, name: &str, default: PermissionValue, mime: &[&str]) {
        self.state
            .gate()
            .create_namespace(
                Some(&self.admin),
                NewNamespace {
                    name: name.to_string(),
                    parent: None,
                    default_permission: default,
                    mime_types: mime.iter().collect(),
                },
            )
            .await
            .unwrap();
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn request(method: Method, uri: &str, credentials: Option<&Credentials>) -> http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match credentials {
        Some(c) => builder
            .header("AuthUser", &c.user)
            .header("AuthToken", &c.token),
        None => builder,
    }
}

pub fn upload(uri: &str, credentials: Option<&Credentials>, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"blob\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    request(Method::PUT, uri, credentials)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn json(method: Method, uri: &str, credentials: Option<&Credentials>, body: Value) -> Request<Body> {
    request(method, uri, credentials)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str, credentials: Option<&Credentials>) -> Request<Body> {
    request(Method::GET, uri, credentials)
        .body(Body::empty())
        .unwrap()
}

pub fn delete(uri: &str, credentials: Option<&Credentials>) -> Request<Body> {
    request(Method::DELETE, uri, credentials)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status for response");
}
