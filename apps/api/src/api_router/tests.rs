use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderName, Method, Request, StatusCode};
use lineage_application::{HierarchyGraph, RoleService};
use lineage_infrastructure::InMemoryRoleRepository;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::build_router;
use crate::api_config::RoleStoreBackend;
use crate::dev_seed;
use crate::state::AppState;

const PRINCIPAL_HEADER: &str = "x-principal-roles";

async fn seeded_router() -> Router {
    let graph = match HierarchyGraph::load(Arc::new(InMemoryRoleRepository::new())).await {
        Ok(graph) => graph,
        Err(error) => panic!("empty store should load: {error}"),
    };
    let role_service = RoleService::new(graph);
    if let Err(error) = dev_seed::run(&role_service).await {
        panic!("seed should apply: {error}");
    }

    let state = AppState {
        role_service,
        principal_header: HeaderName::from_static(PRINCIPAL_HEADER),
        admin_role_name: "admin".to_owned(),
        role_store: RoleStoreBackend::Memory,
    };

    match build_router(state, "http://localhost:3000") {
        Ok(router) => router,
        Err(error) => panic!("router should build: {error}"),
    }
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    roles: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(roles) = roles {
        builder = builder.header(PRINCIPAL_HEADER, roles);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    };
    let request = match request {
        Ok(request) => request,
        Err(error) => panic!("request should build: {error}"),
    };

    let response = match router.clone().oneshot(request).await {
        Ok(response) => response,
        Err(error) => panic!("router is infallible: {error}"),
    };
    let status = response.status();
    let bytes = match to_bytes(response.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => panic!("body should be readable: {error}"),
    };

    (status, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(error) => panic!("body should be json: {error}"),
    }
}

#[tokio::test]
async fn health_needs_no_principal() {
    let router = seeded_router().await;

    let (status, body) = send(&router, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({ "status": "ok", "role_store": "memory" })
    );
}

#[tokio::test]
async fn missing_principal_header_is_unauthorized() {
    let router = seeded_router().await;

    let (status, _) = send(&router, Method::GET, "/api/roles", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&router, Method::GET, "/api/access/public", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&router, Method::GET, "/api/roles", Some("id:x"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_administration_requires_admin() {
    let router = seeded_router().await;

    let (status, _) = send(&router, Method::GET, "/api/roles", Some("manager"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&router, Method::GET, "/api/roles", Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<Value> = match json_body(&body) {
        Value::Array(roles) => roles.into_iter().map(|role| role["name"].clone()).collect(),
        other => panic!("expected a role list, got {other}"),
    };
    assert_eq!(names, ["user", "editor", "manager", "admin"]);

    let (status, _) = send(&router, Method::GET, "/api/roles", Some("id:4"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn role_lifecycle_through_http() {
    let router = seeded_router().await;
    let admin = Some("admin");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/roles",
        admin,
        Some(json!({
            "name": "reviewer",
            "description": "Reviews content",
            "capabilities": ["review:content"],
            "parent_role_id": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json_body(&body)["id"], 5);

    let (status, body) = send(&router, Method::GET, "/api/roles/5/ancestors", admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)[0]["name"], "editor");

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/roles/5/check-capability?name=read:own",
        admin,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["granted"], true);

    let (status, body) = send(
        &router,
        Method::PATCH,
        "/api/roles/5",
        admin,
        Some(json!({ "parent_role_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["description"], "Reviews content");

    let (status, body) = send(&router, Method::GET, "/api/roles/5/capabilities", admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["capabilities"], json!(["review:content", "reviewer"]));

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/roles",
        admin,
        Some(json!({ "name": "reviewer" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&router, Method::DELETE, "/api/roles/5", admin, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&router, Method::GET, "/api/roles/5", admin, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn hierarchy_edges_reject_cycles_and_delete_idempotently() {
    let router = seeded_router().await;
    let admin = Some("admin");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/roles/hierarchy",
        admin,
        Some(json!({ "parent_role_id": 4, "child_role_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["message"].is_string());

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/roles/hierarchy",
        admin,
        Some(json!({ "parent_role_id": 1, "child_role_id": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json_body(&body)["child_role_id"], 4);

    for _ in 0..2 {
        let (status, _) = send(
            &router,
            Method::DELETE,
            "/api/roles/hierarchy/1/4",
            admin,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (status, body) = send(&router, Method::DELETE, "/api/roles/2/hierarchy", admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["removed_edges"], 2);
}

#[tokio::test]
async fn visualization_is_plain_text() {
    let router = seeded_router().await;

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/roles/hierarchy/visualization",
        Some("admin"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8_lossy(&body),
        "Role Hierarchy:\nuser (ID: 1)\n  editor (ID: 2)\n    manager (ID: 3)\n      admin (ID: 4)\n"
    );
}

#[tokio::test]
async fn access_routes_follow_inheritance() {
    let router = seeded_router().await;

    let cases = [
        ("/api/access/public", "", StatusCode::OK),
        ("/api/access/user", "", StatusCode::FORBIDDEN),
        ("/api/access/user", "admin", StatusCode::OK),
        ("/api/access/editor", "manager", StatusCode::OK),
        ("/api/access/editor", "user", StatusCode::FORBIDDEN),
        ("/api/access/manager", "user, manager", StatusCode::OK),
        ("/api/access/admin", "manager", StatusCode::FORBIDDEN),
        ("/api/access/admin", "ghost", StatusCode::FORBIDDEN),
    ];

    for (uri, roles, expected) in cases {
        let (status, _) = send(&router, Method::GET, uri, Some(roles), None).await;
        assert_eq!(status, expected, "{uri} with roles '{roles}'");
    }
}

#[tokio::test]
async fn revoked_edge_denies_the_next_request() {
    let router = seeded_router().await;

    let (status, _) = send(&router, Method::GET, "/api/access/user", Some("editor"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &router,
        Method::DELETE,
        "/api/roles/hierarchy/1/2",
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&router, Method::GET, "/api/access/user", Some("editor"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
