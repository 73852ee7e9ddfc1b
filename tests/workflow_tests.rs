//! End-to-end tests against PostgreSQL. Run with `cargo test -- --ignored`
//! and `DATABASE_URL` pointing at a disposable database.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::util::ServiceExt;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

mod common;

use common::{app, login, make_request, seed_account, seed_tenant, setup_test_db, test_settings, SeededTenant};
use safetynexus::{model::Role, AppState};

struct Site {
    state: AppState,
    tenant: SeededTenant,
    _storage: tempfile::TempDir,
}

async fn site(pool: PgPool, user_limit: i32) -> Site {
    let storage = tempfile::tempdir().unwrap();
    let state = AppState::new(pool.clone(), test_settings(storage.path().to_str().unwrap()));
    let tenant = seed_tenant(&pool, user_limit, true).await;
    Site {
        state,
        tenant,
        _storage: storage,
    }
}

impl Site {
    async fn member(&self, role: Role) -> (Uuid, String) {
        let (id, email) = seed_account(&self.state.pool, self.tenant.tenant_id, role).await;
        let token = login(app(self.state.clone()), &email, &self.tenant.code).await;
        (id, token)
    }

    async fn call(&self, method: &str, path: &str, body: Option<Value>, token: &str) -> (StatusCode, Value) {
        make_request(app(self.state.clone()), method, path, body, Some(token)).await
    }
}

fn permit_body(supervisor_id: Uuid, worker_id: Uuid) -> Value {
    let starts = OffsetDateTime::now_utc() + Duration::hours(1);
    let ends = starts + Duration::hours(8);
    json!({
        "permit_type": "hot_work",
        "title": "Weld repair on line 3",
        "location": "Plant A",
        "starts_at": starts.format(&time::format_description::well_known::Rfc3339).unwrap(),
        "ends_at": ends.format(&time::format_description::well_known::Rfc3339).unwrap(),
        "supervisor_id": supervisor_id,
        "worker_ids": [worker_id],
        "hazards": ["fire"],
        "ppe": ["helmet", "gloves"]
    })
}

#[tokio::test]
#[ignore]
async fn test_permit_walks_the_approval_chain() {
    let site = site(setup_test_db().await, 50).await;
    let (_, requester) = site.member(Role::Employee).await;
    let (supervisor_id, supervisor) = site.member(Role::Supervisor).await;
    let (_, other_supervisor) = site.member(Role::Supervisor).await;
    let (worker_id, _) = site.member(Role::Worker).await;
    let (_, incharge) = site.member(Role::ShiftIncharge).await;
    let (_, hse) = site.member(Role::HseManager).await;

    let (status, permit) = site
        .call("POST", "/api/permits", Some(permit_body(supervisor_id, worker_id)), &requester)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", permit);
    assert_eq!(permit["status"], "pending_supervisor");
    assert_eq!(permit["is_critical"], true);
    assert!(permit["code"].as_str().unwrap().starts_with("PTW-"));
    let id = permit["permit_id"].as_str().unwrap().to_string();

    // Only the named supervisor may sign the first stage
    let (status, _) = site
        .call("POST", &format!("/api/permits/{}/approve", id), None, &other_supervisor)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, pending) = site.call("GET", "/api/permits/pending", None, &supervisor).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);

    let expected = ["pending_incharge", "pending_hse", "active"];
    for (n, (token, status_after)) in [&supervisor, &incharge, &hse].into_iter().zip(expected).enumerate() {
        let (status, permit) = site
            .call("POST", &format!("/api/permits/{}/approve", id), Some(json!({})), token)
            .await;
        assert_eq!(status, StatusCode::OK, "{}", permit);
        assert_eq!(permit["status"], status_after);
        assert_eq!(permit["approvals"].as_array().unwrap().len(), n + 1);
    }

    let (_, permit) = site.call("GET", &format!("/api/permits/{}", id), None, &requester).await;
    let stages: Vec<&str> = permit["approvals"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["stage"].as_str().unwrap())
        .collect();
    assert_eq!(stages, vec!["supervisor", "incharge", "hse"]);

    // Closing needs the requester and remarks
    let (status, _) = site
        .call("POST", &format!("/api/permits/{}/close", id), Some(json!({ "remarks": "done" })), &hse)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = site
        .call("POST", &format!("/api/permits/{}/close", id), Some(json!({})), &requester)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, permit) = site
        .call("POST", &format!("/api/permits/{}/close", id), Some(json!({ "remarks": "Work complete" })), &requester)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(permit["status"], "closed");
}

#[tokio::test]
#[ignore]
async fn test_rejected_permit_is_terminal() {
    let site = site(setup_test_db().await, 50).await;
    let (_, requester) = site.member(Role::Employee).await;
    let (supervisor_id, supervisor) = site.member(Role::Supervisor).await;
    let (worker_id, _) = site.member(Role::Worker).await;

    let (_, permit) = site
        .call("POST", "/api/permits", Some(permit_body(supervisor_id, worker_id)), &requester)
        .await;
    let id = permit["permit_id"].as_str().unwrap().to_string();

    let (status, _) = site
        .call("POST", &format!("/api/permits/{}/reject", id), Some(json!({})), &supervisor)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "rejection without remarks");

    let (status, permit) = site
        .call("POST", &format!("/api/permits/{}/reject", id), Some(json!({ "remarks": "No gas test" })), &supervisor)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(permit["status"], "rejected");

    for action in ["approve", "suspend", "close"] {
        let (status, _) = site
            .call("POST", &format!("/api/permits/{}/{}", id, action), Some(json!({ "remarks": "retry" })), &supervisor)
            .await;
        assert_eq!(status, StatusCode::CONFLICT, "{} on a rejected permit", action);
    }

    let (_, permit) = site.call("GET", &format!("/api/permits/{}", id), None, &requester).await;
    assert_eq!(permit["status"], "rejected");
}

#[tokio::test]
#[ignore]
async fn test_stop_work_suspends_the_permit() {
    let site = site(setup_test_db().await, 50).await;
    let (_, requester) = site.member(Role::Employee).await;
    let (supervisor_id, _) = site.member(Role::Supervisor).await;
    let (worker_id, worker) = site.member(Role::Worker).await;

    let (_, permit) = site
        .call("POST", "/api/permits", Some(permit_body(supervisor_id, worker_id)), &requester)
        .await;
    let code = permit["code"].as_str().unwrap().to_string();
    let id = permit["permit_id"].as_str().unwrap().to_string();

    let (status, incident) = site
        .call(
            "POST",
            "/api/incidents",
            Some(json!({
                "kind": "stop_work",
                "title": "Gas leak near tank 4",
                "location": "Tank farm",
                "related_permit_code": code.to_lowercase(),
                "stop_work_reason": "H2S alarm"
            })),
            &worker,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", incident);
    assert_eq!(incident["status"], "stop_work_active");
    assert_eq!(incident["suspended_permit"], code.as_str());

    let (_, permit) = site.call("GET", &format!("/api/permits/{}", id), None, &requester).await;
    assert_eq!(permit["status"], "suspended");
    assert_eq!(permit["suspension_remarks"], "Stop Work issued: H2S alarm");
    assert_eq!(permit["related_incident_code"], incident["code"]);

    // A mistyped permit code still records the report
    let (status, incident) = site
        .call(
            "POST",
            "/api/incidents",
            Some(json!({
                "kind": "stop_work",
                "title": "Scaffold collapse",
                "location": "Bay 2",
                "related_permit_code": "PTW-1999-999",
                "stop_work_reason": "Structural failure"
            })),
            &worker,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", incident);
    assert_eq!(incident["status"], "stop_work_active");
    assert_eq!(incident["related_permit_code"], "PTW-1999-999");
    assert!(incident["suspended_permit"].is_null());

    let (_, incidents) = site.call("GET", "/api/incidents", None, &worker).await;
    assert_eq!(incidents.as_array().unwrap().len(), 2);
}

#[tokio::test]
#[ignore]
async fn test_demoted_account_loses_stage_authority() {
    let site = site(setup_test_db().await, 50).await;
    let (_, admin) = site.member(Role::CompanyAdmin).await;
    let (_, requester) = site.member(Role::Employee).await;
    let (supervisor_id, supervisor) = site.member(Role::Supervisor).await;
    let (worker_id, _) = site.member(Role::Worker).await;
    let (_, incharge) = site.member(Role::ShiftIncharge).await;
    let (hse_id, hse) = site.member(Role::HseManager).await;

    let (_, permit) = site
        .call("POST", "/api/permits", Some(permit_body(supervisor_id, worker_id)), &requester)
        .await;
    let id = permit["permit_id"].as_str().unwrap().to_string();
    for token in [&supervisor, &incharge] {
        let (status, _) = site
            .call("POST", &format!("/api/permits/{}/approve", id), None, token)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = site
        .call("PUT", &format!("/api/users/{}", hse_id), Some(json!({ "role": "worker" })), &admin)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["role"], "worker");

    // The token still says hse_manager; the stored role decides
    let (status, _) = site
        .call("POST", &format!("/api/permits/{}/approve", id), None, &hse)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, permit) = site.call("GET", &format!("/api/permits/{}", id), None, &requester).await;
    assert_eq!(permit["status"], "pending_hse");

    let (_, me) = site.call("GET", "/api/auth/me", None, &hse).await;
    assert_eq!(me["account"]["role"], "worker");
}

#[tokio::test]
#[ignore]
async fn test_garbled_action_body_is_refused() {
    let site = site(setup_test_db().await, 50).await;
    let (_, requester) = site.member(Role::Employee).await;
    let (supervisor_id, supervisor) = site.member(Role::Supervisor).await;
    let (worker_id, _) = site.member(Role::Worker).await;

    let (_, permit) = site
        .call("POST", "/api/permits", Some(permit_body(supervisor_id, worker_id)), &requester)
        .await;
    let id = permit["permit_id"].as_str().unwrap().to_string();

    let response = app(site.state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/permits/{}/approve", id))
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", supervisor))
                .body(Body::from(r#"{"remarks": "Gas test ok", "#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (_, permit) = site.call("GET", &format!("/api/permits/{}", id), None, &requester).await;
    assert_eq!(permit["status"], "pending_supervisor");
}

#[tokio::test]
#[ignore]
async fn test_seat_limit_blocks_provisioning() {
    let site = site(setup_test_db().await, 2).await;
    let (_, admin) = site.member(Role::CompanyAdmin).await;
    let tenant_id = site.tenant.tenant_id.to_string();

    let request = |email: &str| {
        json!({
            "email": email,
            "password": "Worker@123",
            "displayName": "New Worker",
            "role": "worker",
            "companyId": tenant_id
        })
    };

    let first = format!("first_{}@example.com", Uuid::new_v4().simple());
    let (status, body) = site.call("POST", "/api/users/create", Some(request(&first)), &admin).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);

    let email = format!("second_{}@example.com", Uuid::new_v4().simple());
    let (status, body) = site.call("POST", "/api/users/create", Some(request(&email)), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "User limit reached (2 users). Please upgrade your subscription to add more users."
    );

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM account WHERE email = $1)")
        .bind(&email)
        .fetch_one(&site.state.pool)
        .await
        .unwrap();
    assert!(!exists);

    let (status, body) = site
        .call("POST", "/api/users/create", Some(json!({ "email": "x@example.com" })), &admin)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");
}

#[tokio::test]
#[ignore]
async fn test_reactivation_needs_a_free_seat() {
    let site = site(setup_test_db().await, 2).await;
    let (_, admin) = site.member(Role::CompanyAdmin).await;
    let (worker_id, _) = seed_account(&site.state.pool, site.tenant.tenant_id, Role::Worker).await;

    let (status, _) = site
        .call("POST", &format!("/api/users/{}/deactivate", worker_id), None, &admin)
        .await;
    assert_eq!(status, StatusCode::OK);

    let email = format!("replacement_{}@example.com", Uuid::new_v4().simple());
    let (status, body) = site
        .call(
            "POST",
            "/api/users/create",
            Some(json!({
                "email": email,
                "password": "Worker@123",
                "displayName": "Replacement Worker",
                "role": "worker",
                "companyId": site.tenant.tenant_id.to_string()
            })),
            &admin,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, body) = site
        .call("POST", &format!("/api/users/{}/activate", worker_id), None, &admin)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "User limit reached (2 users). Please upgrade your subscription to add more users."
    );

    let active: bool = sqlx::query_scalar("SELECT is_active FROM account WHERE account_id = $1")
        .bind(worker_id)
        .fetch_one(&site.state.pool)
        .await
        .unwrap();
    assert!(!active);
}

#[tokio::test]
#[ignore]
async fn test_created_company_code_round_trips_to_login() {
    let site = site(setup_test_db().await, 50).await;
    let (_, platform) = site.member(Role::PlatformAdmin).await;

    let suffix = Uuid::new_v4().simple().to_string()[..8].to_string();
    let expiry = (OffsetDateTime::now_utc() + Duration::days(365))
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap();
    let (status, company) = site
        .call(
            "POST",
            "/api/companies",
            Some(json!({
                "name": format!("Demo Industry {}", suffix),
                "code": format!(" demo-{} ", suffix),
                "expiry_date": expiry
            })),
            &platform,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", company);
    let code = format!("DEMO-{}", suffix.to_uppercase());
    assert_eq!(company["code"], code.as_str());

    let email = format!("member_{}@example.com", suffix);
    let (status, body) = site
        .call(
            "POST",
            "/api/users/create",
            Some(json!({
                "email": email,
                "password": common::PASSWORD,
                "displayName": "Demo Member",
                "role": "employee",
                "companyId": company["tenant_id"]
            })),
            &platform,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let token = login(app(site.state.clone()), &email, &format!("Demo-{}", suffix)).await;
    let (_, me) = site.call("GET", "/api/auth/me", None, &token).await;
    assert_eq!(me["company_code"], code.as_str());
}

#[tokio::test]
#[ignore]
async fn test_malformed_provisioning_body_is_json_error() {
    let site = site(setup_test_db().await, 50).await;
    let (_, admin) = site.member(Role::CompanyAdmin).await;

    let response = app(site.state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/users/create")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", admin))
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_login_normalizes_company_code() {
    let site = site(setup_test_db().await, 50).await;
    let (_, email) = seed_account(&site.state.pool, site.tenant.tenant_id, Role::Supervisor).await;

    let token = login(app(site.state.clone()), &email, &format!("  {}  ", site.tenant.code.to_lowercase())).await;
    assert!(!token.is_empty());

    let (status, body) = make_request(
        app(site.state.clone()),
        "POST",
        "/api/auth/login",
        Some(json!({ "email": email, "password": common::PASSWORD, "company_code": "OTHER" })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid company code");

    let (status, body) = make_request(
        app(site.state.clone()),
        "POST",
        "/api/auth/login",
        Some(json!({ "email": email, "password": "wrong", "company_code": site.tenant.code })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
#[ignore]
async fn test_self_registration_creates_a_worker() {
    let site = site(setup_test_db().await, 50).await;
    let email = format!("self_{}@example.com", Uuid::new_v4().simple());

    let (status, body) = make_request(
        app(site.state.clone()),
        "POST",
        "/api/auth/register",
        Some(json!({
            "email": email,
            "password": "Worker@123",
            "display_name": "Self Registered",
            "company_code": site.tenant.code.to_lowercase()
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["profile"]["account"]["role"], "worker");
    assert_eq!(body["profile"]["company_code"], site.tenant.code.as_str());
}
