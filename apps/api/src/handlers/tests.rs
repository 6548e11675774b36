use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use castellan_application::DirectoryBootstrapService;
use castellan_domain::{AdminId, RoleName};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::api_router::build_router;
use crate::api_services::{DirectoryAdapters, ServiceSettings, build_app_state};

struct TestApi {
    router: Router,
    adapters: DirectoryAdapters,
    super_admin_id: AdminId,
}

async fn test_api() -> TestApi {
    let adapters = DirectoryAdapters::in_memory();
    let state = match build_app_state(
        adapters.clone(),
        ServiceSettings {
            identity_header: "x-admin-id".to_owned(),
            max_conflict_retries: 3,
            hierarchy_hop_limit: 64,
            list_deadline: None,
            bootstrap_super_admin_email: None,
        },
    )
    .await
    {
        Ok(state) => state,
        Err(error) => panic!("failed to build state: {error}"),
    };

    let report = DirectoryBootstrapService::new(
        state.role_catalog_service.clone(),
        adapters.roles.clone(),
        adapters.admins.clone(),
    )
    .bootstrap("root@example.com")
    .await;
    let super_admin_id = match report {
        Ok(report) => report.super_admin_id,
        Err(error) => panic!("bootstrap failed: {error}"),
    };

    let router = match build_router(state, None) {
        Ok(router) => router,
        Err(error) => panic!("failed to build router: {error}"),
    };

    TestApi {
        router,
        adapters,
        super_admin_id,
    }
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    actor: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header("x-admin-id", actor);
    }
    let body = match body {
        Some(body) => {
            builder = builder.header("content-type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let request = match builder.body(body) {
        Ok(request) => request,
        Err(error) => panic!("invalid request: {error}"),
    };

    let response = match router.clone().oneshot(request).await {
        Ok(response) => response,
        Err(error) => panic!("request failed: {error}"),
    };
    let status = response.status();
    let bytes = match axum::body::to_bytes(response.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => panic!("failed to read body: {error}"),
    };
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, value)
}

async fn system_role_id(api: &TestApi, name: &str) -> String {
    let name = match RoleName::new(name) {
        Ok(name) => name,
        Err(error) => panic!("invalid role name: {error}"),
    };
    match api.adapters.roles.find_active_role_by_name(&name).await {
        Ok(Some(role)) => role.role_id().to_string(),
        other => panic!("system role missing: {other:?}"),
    }
}

#[tokio::test]
async fn health_is_public() {
    let api = test_api().await;

    let (status, body) = send(&api.router, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_require_identity_header() {
    let api = test_api().await;

    let (missing, body) = send(&api.router, Method::GET, "/api/roles", None, None).await;
    let (malformed, _) = send(
        &api.router,
        Method::GET,
        "/api/roles",
        Some("not-an-admin"),
        None,
    )
    .await;
    let (unknown, _) = send(
        &api.router,
        Method::GET,
        "/api/roles",
        Some(AdminId::new().to_string().as_str()),
        None,
    )
    .await;

    assert_eq!(missing, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthorized");
    assert_eq!(malformed, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn super_admin_creates_and_lists_sub_role() {
    let api = test_api().await;
    let actor = api.super_admin_id.to_string();

    let (created, role) = send(
        &api.router,
        Method::POST,
        "/api/roles",
        Some(actor.as_str()),
        Some(json!({
            "name": "regional_ops",
            "display_name": "Regional Ops",
            "level": 25,
            "permissions": { "analytics": { "read": true } }
        })),
    )
    .await;
    let (listed, roles) = send(
        &api.router,
        Method::GET,
        "/api/roles?kind=custom",
        Some(actor.as_str()),
        None,
    )
    .await;

    assert_eq!(created, StatusCode::CREATED);
    assert_eq!(role["access_level"], "finance_admin");
    assert_eq!(role["permissions"]["analytics"]["read"], true);
    assert_eq!(role["permissions"]["analytics"]["export"], false);
    assert_eq!(listed, StatusCode::OK);
    assert_eq!(roles.as_array().map(Vec::len), Some(1));
    assert_eq!(roles[0]["name"], "regional_ops");
}

#[tokio::test]
async fn unknown_permission_key_is_bad_request() {
    let api = test_api().await;
    let actor = api.super_admin_id.to_string();

    let (status, body) = send(
        &api.router,
        Method::POST,
        "/api/roles",
        Some(actor.as_str()),
        Some(json!({
            "name": "broken",
            "display_name": "Broken",
            "level": 30,
            "permissions": { "spaceships": { "read": true } }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_permission_key");
}

#[tokio::test]
async fn permission_check_reports_caller_grants() {
    let api = test_api().await;
    let actor = api.super_admin_id.to_string();

    let (status, body) = send(
        &api.router,
        Method::GET,
        "/api/permissions/check?resource=payouts&action=approve",
        Some(actor.as_str()),
        None,
    )
    .await;
    let (invalid, _) = send(
        &api.router,
        Method::GET,
        "/api/permissions/check?resource=payouts&action=publish",
        Some(actor.as_str()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);
    assert_eq!(invalid, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn agent_cannot_assign_roles_but_can_read_itself() {
    let api = test_api().await;
    let actor = api.super_admin_id.to_string();
    let agent_role_id = system_role_id(&api, "merchant_support_agent").await;

    let (created, agent) = send(
        &api.router,
        Method::POST,
        "/api/admins",
        Some(actor.as_str()),
        Some(json!({ "email": "Agent@Example.com", "role_id": agent_role_id })),
    )
    .await;
    let agent_id = agent["admin_id"].as_str().unwrap_or_default().to_owned();

    let (assigned, body) = send(
        &api.router,
        Method::PUT,
        format!("/api/admins/{actor}/role").as_str(),
        Some(agent_id.as_str()),
        Some(json!({ "role_id": agent_role_id })),
    )
    .await;
    let (own, own_body) = send(
        &api.router,
        Method::GET,
        format!("/api/admins/{agent_id}").as_str(),
        Some(agent_id.as_str()),
        None,
    )
    .await;

    assert_eq!(created, StatusCode::CREATED);
    assert_eq!(agent["email"], "agent@example.com");
    assert_eq!(agent["access_level"], "merchant_support_agent");
    assert_eq!(assigned, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "permission_denied");
    assert_eq!(own, StatusCode::OK);
    assert_eq!(own_body["manager_id"], actor.as_str());
}

#[tokio::test]
async fn deleting_system_role_is_conflict() {
    let api = test_api().await;
    let actor = api.super_admin_id.to_string();
    let agent_role_id = system_role_id(&api, "merchant_support_agent").await;

    let (status, body) = send(
        &api.router,
        Method::DELETE,
        format!("/api/roles/{agent_role_id}").as_str(),
        Some(actor.as_str()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "system_role_immutable");
}

#[tokio::test]
async fn managers_list_their_own_sub_users() {
    let api = test_api().await;
    let actor = api.super_admin_id.to_string();
    let agent_role_id = system_role_id(&api, "merchant_support_agent").await;

    let (_, agent) = send(
        &api.router,
        Method::POST,
        "/api/admins",
        Some(actor.as_str()),
        Some(json!({ "email": "desk@example.com", "role_id": agent_role_id })),
    )
    .await;
    let agent_id = agent["admin_id"].as_str().unwrap_or_default().to_owned();

    let (listed, sub_users) = send(
        &api.router,
        Method::GET,
        format!("/api/admins/{actor}/sub-users?limit=10").as_str(),
        Some(actor.as_str()),
        None,
    )
    .await;
    let (own, own_sub_users) = send(
        &api.router,
        Method::GET,
        format!("/api/admins/{agent_id}/sub-users").as_str(),
        Some(agent_id.as_str()),
        None,
    )
    .await;
    let (foreign, _) = send(
        &api.router,
        Method::GET,
        format!("/api/admins/{actor}/sub-users").as_str(),
        Some(agent_id.as_str()),
        None,
    )
    .await;

    assert_eq!(listed, StatusCode::OK);
    let emails: Vec<&str> = sub_users
        .as_array()
        .map(|admins| admins.iter().filter_map(|a| a["email"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(emails, vec!["desk@example.com"]);
    assert_eq!(own, StatusCode::OK);
    assert_eq!(own_sub_users, json!([]));
    assert_eq!(foreign, StatusCode::FORBIDDEN);
}
