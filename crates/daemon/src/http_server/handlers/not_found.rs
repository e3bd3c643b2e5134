use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

/// Fallback for unknown routes. Never echoes the requested path.
pub async fn not_found_handler(headers: HeaderMap) -> Response {
    if wants_json(&headers) {
        let err_msg = serde_json::json!({"msg": "not found"});
        return (StatusCode::NOT_FOUND, Json(err_msg)).into_response();
    }

    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        "not found",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_content_negotiation() {
        let mut headers = HeaderMap::new();
        let response = not_found_handler(headers.clone()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");

        headers.insert(header::ACCEPT, "application/json".parse().unwrap());
        let response = not_found_handler(headers).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }
}
