use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post, put};
use axum::{Json, Router};

pub mod auth;
pub mod client;
mod credentials;
pub mod file;
pub mod namespace;
pub mod permission;

pub use credentials::{
    MaybeCredentials, AUTH_TOKEN_HEADER, AUTH_USER_HEADER, TOKEN_COOKIE, USER_COOKIE,
};

use crate::access::AccessError;
use crate::ServiceState;

/// Multipart field carrying upload bytes.
pub const UPLOAD_FIELD: &str = "upload";

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route(
            "/file/*path",
            get(file::get_handler)
                .put(file::put_handler)
                .delete(file::delete_handler),
        )
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/recovery", post(auth::recovery_handler))
        .route("/auth/reset", post(auth::reset_handler))
        .route("/namespace", post(namespace::create_handler))
        .route(
            "/namespace/*name",
            get(namespace::get_handler)
                .put(namespace::update_handler)
                .delete(namespace::delete_handler),
        )
        .route(
            "/permission",
            put(permission::grant_handler)
                .get(permission::list_handler)
                .delete(permission::revoke_handler),
        )
        .with_state(state)
}

/// Bodies that fail to parse are `Malformed` like any other bad input.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AccessError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AccessError::Malformed(e.body_text()))
}
