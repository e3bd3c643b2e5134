mod support;

use http::{header, Method, StatusCode};
use serde_json::{json, Value};

use common::prelude::{PermissionValue, TargetType};
use gfhs_daemon::http_server::api::file::FileInfo;
use gfhs_daemon::http_server::api::namespace::{
    DeleteNamespaceResponse, NamespaceInfo, NamespaceListingResponse,
};
use gfhs_daemon::http_server::api::permission::PermissionInfo;

use support::*;

async fn grant(h: &Harness, by: &gfhs_daemon::access::Credentials, body: Value) -> StatusCode {
    h.send(json(Method::PUT, "/permission", Some(by), body))
        .await
        .status()
}

#[tokio::test]
async fn test_namespace_lifecycle() {
    let h = harness().await;

    let team = json!({"name": "team", "mime_types": ["text/plain"]});
    let response = h
        .send(json(Method::POST, "/namespace", Some(&h.alice), team.clone()))
        .await;
    assert_status(&response, StatusCode::FORBIDDEN);
    let response = h
        .send(json(Method::POST, "/namespace", None, team.clone()))
        .await;
    assert_status(&response, StatusCode::UNAUTHORIZED);

    let response = h
        .send(json(Method::POST, "/namespace", Some(&h.admin), team.clone()))
        .await;
    assert_status(&response, StatusCode::CREATED);
    let created: NamespaceInfo = body_json(response).await;
    assert_eq!(created.default_permission, PermissionValue::NOTHING);
    assert_eq!(created.mime_types, vec!["text/plain".to_string()]);

    let response = h
        .send(json(Method::POST, "/namespace", Some(&h.admin), team))
        .await;
    assert_status(&response, StatusCode::CONFLICT);

    // alice may create under team once she can write to it
    assert_eq!(
        grant(&h, &h.admin, json!({"user": ALICE, "target": "team", "target_type": "namespace", "value": "read_write"})).await,
        StatusCode::OK
    );
    let response = h
        .send(json(
            Method::POST,
            "/namespace",
            Some(&h.alice),
            json!({"name": "team/alice", "parent": "team", "mime_types": ["text/plain"]}),
        ))
        .await;
    assert_status(&response, StatusCode::CREATED);

    let listing: NamespaceListingResponse =
        body_json(h.send(get("/namespace/team", Some(&h.alice))).await).await;
    assert_eq!(listing.namespace.name, "team");
    assert_eq!(listing.children.len(), 1);
    assert_eq!(listing.children[0].name, "team/alice");
    assert!(listing.files.is_empty());

    let response = h.send(get("/namespace/team", Some(&h.bob))).await;
    assert_status(&response, StatusCode::FORBIDDEN);

    // only the creator (or an admin) reconfigures
    let response = h
        .send(json(
            Method::PUT,
            "/namespace/team",
            Some(&h.alice),
            json!({"default_permission": "read"}),
        ))
        .await;
    assert_status(&response, StatusCode::FORBIDDEN);
    let response = h
        .send(json(
            Method::PUT,
            "/namespace/team/alice",
            Some(&h.alice),
            json!({"mime_types": ["image/png", "Text/Plain"], "default_permission": "read"}),
        ))
        .await;
    assert_status(&response, StatusCode::OK);
    let updated: NamespaceInfo = body_json(response).await;
    assert_eq!(updated.default_permission, PermissionValue::READ);
    assert_eq!(updated.mime_types.len(), 2);

    // the new default opens reads to everyone
    let response = h.send(get("/namespace/team/alice", None)).await;
    assert_status(&response, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_namespace_names() {
    let h = harness().await;
    for name in ["", "direct", "direct/x", "a//b", "../up", "sp ace"] {
        let response = h
            .send(json(
                Method::POST,
                "/namespace",
                Some(&h.admin),
                json!({"name": name}),
            ))
            .await;
        assert_status(&response, StatusCode::BAD_REQUEST);
    }

    let response = h
        .send(json(
            Method::POST,
            "/namespace",
            Some(&h.admin),
            json!({"name": "orphan", "parent": "missing"}),
        ))
        .await;
    assert_status(&response, StatusCode::NOT_FOUND);

    h.namespace("team", PermissionValue::NOTHING, &["text/plain"])
        .await;
    for (name, parent) in [
        (json!("elsewhere/x"), json!("team")),
        (json!("team/a/b"), json!("team")),
        (json!("team/x"), Value::Null),
    ] {
        let response = h
            .send(json(
                Method::POST,
                "/namespace",
                Some(&h.admin),
                json!({"name": name, "parent": parent}),
            ))
            .await;
        assert_status(&response, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_namespace_delete_cascades() {
    let h = harness().await;
    h.namespace("images", PermissionValue::NOTHING, &["image/png"])
        .await;
    h.state
        .gate()
        .create_namespace(
            Some(&h.admin),
            gfhs_daemon::access::NewNamespace {
                name: "images/cats".to_string(),
                parent: Some("images".to_string()),
                mime_types: ["image/png"].iter().collect(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let top: FileInfo =
        body_json(h.send(upload("/file/images/a.png", Some(&h.admin), PNG)).await).await;
    let nested: FileInfo =
        body_json(h.send(upload("/file/images/cats/b.png", Some(&h.admin), PNG)).await).await;
    assert_eq!(
        grant(&h, &h.admin, json!({"user": BOB, "target": nested.id, "target_type": "file", "value": "read"})).await,
        StatusCode::OK
    );
    assert_eq!(
        grant(&h, &h.admin, json!({"user": BOB, "target": "images/cats", "target_type": "namespace", "value": "read"})).await,
        StatusCode::OK
    );

    // bob is not the creator
    let response = h.send(delete("/namespace/images", Some(&h.bob))).await;
    assert_status(&response, StatusCode::FORBIDDEN);

    let response = h.send(delete("/namespace/images", Some(&h.admin))).await;
    assert_status(&response, StatusCode::OK);
    let deleted: DeleteNamespaceResponse = body_json(response).await;
    assert_eq!(deleted.files_removed, 2);

    for uri in [
        format!("/file/direct/{}", top.id),
        format!("/file/direct/{}", nested.id),
        "/file/images/cats/b.png".to_string(),
    ] {
        let response = h.send(get(&uri, Some(&h.admin))).await;
        assert_status(&response, StatusCode::NOT_FOUND);
    }
    let response = h.send(get("/namespace/images/cats", Some(&h.admin))).await;
    assert_status(&response, StatusCode::NOT_FOUND);

    let bob_grants: Vec<PermissionInfo> =
        body_json(h.send(get("/permission", Some(&h.bob))).await).await;
    assert!(bob_grants.is_empty(), "{bob_grants:?}");
    let on_file = h
        .state
        .gate()
        .resolver()
        .permissions_on_target(&nested.id, TargetType::File)
        .await
        .unwrap();
    assert!(on_file.is_empty());

    let response = h.send(delete("/namespace/images", Some(&h.admin))).await;
    assert_status(&response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_grant_rules() {
    let h = harness().await;
    h.namespace("shared", PermissionValue::NOTHING, &["text/plain"])
        .await;

    // no capability on the target
    assert_eq!(
        grant(&h, &h.bob, json!({"user": BOB, "target": "shared", "target_type": "namespace", "value": "write"})).await,
        StatusCode::FORBIDDEN
    );

    assert_eq!(
        grant(&h, &h.admin, json!({"user": ALICE, "target": "shared", "target_type": "namespace", "value": "write"})).await,
        StatusCode::OK
    );
    // write lets alice share, but not hand out creator
    assert_eq!(
        grant(&h, &h.alice, json!({"user": BOB, "target": "shared", "target_type": "namespace", "value": "read"})).await,
        StatusCode::OK
    );
    assert_eq!(
        grant(&h, &h.alice, json!({"user": BOB, "target": "shared", "target_type": "namespace", "value": "creator"})).await,
        StatusCode::FORBIDDEN
    );

    // re-granting replaces the value
    assert_eq!(
        grant(&h, &h.admin, json!({"user": BOB, "target": "shared", "target_type": "namespace", "value": 3})).await,
        StatusCode::OK
    );
    let bob_grants: Vec<PermissionInfo> =
        body_json(h.send(get("/permission", Some(&h.bob))).await).await;
    assert_eq!(bob_grants.len(), 1);
    assert_eq!(bob_grants[0].value, PermissionValue::READ_WRITE);

    // malformed values and targets
    assert_eq!(
        grant(&h, &h.admin, json!({"user": BOB, "target": "shared", "target_type": "namespace", "value": 9})).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        grant(&h, &h.admin, json!({"user": BOB, "target": "shared", "target_type": "bucket", "value": 1})).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        grant(&h, &h.admin, json!({"user": BOB, "target": "not-an-id", "target_type": "file", "value": 1})).await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        grant(&h, &h.admin, json!({"user": "ghost@example.com", "target": "shared", "target_type": "namespace", "value": 1})).await,
        StatusCode::NOT_FOUND
    );

    let revoke = json!({"user": BOB, "target": "shared", "target_type": "namespace"});
    let response = h
        .send(json(Method::DELETE, "/permission", Some(&h.admin), revoke.clone()))
        .await;
    assert_status(&response, StatusCode::NO_CONTENT);
    let response = h
        .send(json(Method::DELETE, "/permission", Some(&h.admin), revoke))
        .await;
    assert_status(&response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_routes() {
    let h = harness().await;
    for uri in ["/_status/livez", "/_status/readyz", "/_status/version"] {
        let response = h.send(get(uri, None)).await;
        assert_status(&response, StatusCode::OK);
    }

    let response = h.send(get("/nope", None)).await;
    assert_status(&response, StatusCode::NOT_FOUND);

    let response = h
        .send(
            request(Method::GET, "/nope", None)
                .header(header::ACCEPT, "application/json")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await;
    assert_status(&response, StatusCode::NOT_FOUND);
    let body: Value = body_json(response).await;
    assert_eq!(body["msg"], "not found");
}

#[tokio::test]
async fn test_path_prefix() {
    let h = harness_with_prefix("/gfhs/").await;
    h.namespace("drop", PermissionValue::READ_WRITE, &["text/plain"])
        .await;

    let response = h.send(get("/gfhs/_status/livez", None)).await;
    assert_status(&response, StatusCode::OK);
    let response = h.send(get("/_status/livez", None)).await;
    assert_status(&response, StatusCode::NOT_FOUND);

    let response = h
        .send(upload("/gfhs/file/drop/note.txt", None, b"hi"))
        .await;
    assert_status(&response, StatusCode::CREATED);
    let response = h.send(get("/gfhs/file/drop/note.txt", None)).await;
    assert_eq!(body_bytes(response).await, b"hi");

    // session cookies are scoped to the prefix
    let response = h
        .send(json(
            Method::POST,
            "/gfhs/auth/login",
            None,
            json!({"email": ALICE, "password": PASSWORD}),
        ))
        .await;
    assert_status(&response, StatusCode::OK);
    for cookie in response.headers().get_all(header::SET_COOKIE) {
        assert!(cookie.to_str().unwrap().contains("Path=/gfhs"));
    }
}
