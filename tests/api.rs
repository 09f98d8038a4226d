// HTTP tests for the planner API, driven through the router with tower's
// oneshot.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use swarfarm_backend::api;
use swarfarm_backend::db::Database;
use swarfarm_backend::metrics;
use swarfarm_backend::rate_limit::RateLimiter;

struct TestApp {
    app: Router,
    db: Arc<Database>,
}

impl TestApp {
    async fn new() -> Self {
        let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
        let app = api::app(db.clone(), RateLimiter::new());
        TestApp { app, db }
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Register a summoner, seed its roster, and return its token.
    async fn summoner(&self, username: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "hunter2hunter2"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }
}

async fn seeded() -> (TestApp, String) {
    let app = TestApp::new().await;
    let token = app.summoner("porksmash").await;
    seed(&app.db, "porksmash").await;
    (app, token)
}

async fn create_team(app: &TestApp, token: &str, doc: Value) -> i64 {
    let (status, body) = app
        .send("POST", "/api/planner/teams", Some(token), Some(doc))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

fn chain(name: &str) -> Value {
    json!({
        "name": name,
        "monsters": [
            {"monster": {"com2us_id": MEGAN}, "slower_than_by": []},
            {"monster": {"com2us_id": BELLADEON},
             "slower_than_by": [{"slower_than": {"monster": MEGAN}, "type": 0}]},
            {"monster": {"com2us_id": VEROMOS},
             "slower_than_by": [
                 {"slower_than": {"monster": BELLADEON}, "type": 0},
                 {"slower_than": {"monster": MEGAN}, "type": 0}
             ]}
        ]
    })
}

// ── Basics ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "service": "swarfarm-backend"}));
}

#[tokio::test]
async fn test_planner_requires_token() {
    let app = TestApp::new().await;
    let (status, _) = app.send("GET", "/api/planner/teams", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send("GET", "/api/planner/teams", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_and_me() {
    let app = TestApp::new().await;
    app.summoner("porksmash").await;

    let (status, _) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"username": "porksmash", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"username": "porksmash", "password": "hunter2hunter2"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();

    let (status, me) = app.send("GET", "/api/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "porksmash");
    assert!(me.get("password_hash").is_none());
}

// ── Teams ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_team_document_round_trip() {
    let (app, token) = seeded().await;
    let (status, created) = app
        .send(
            "POST",
            "/api/planner/teams",
            Some(&token),
            Some(dragons_lair_team("Standard Rezzer")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    assert_eq!(created["dungeon"]["name"], "Dragon's Lair - Level 10");
    assert_eq!(created["dungeon"]["max_slots"], 5);
    let monsters = created["monsters"].as_array().unwrap();
    assert_eq!(monsters.len(), 5);
    assert_eq!(monsters[1]["monster"]["name"], "Belladeon");
    assert_eq!(monsters[1]["min_spd"], 190);
    assert_eq!(
        monsters[1]["slower_than_by"],
        json!([{"slower_than": {"monster": MEGAN}, "type": 0, "amount": null}])
    );
    assert_eq!(monsters[4]["leader"], true);

    let (status, fetched) = app
        .send("GET", &format!("/api/planner/teams/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    // PUT the read document back
    let (status, updated) = app
        .send(
            "PUT",
            &format!("/api/planner/teams/{id}"),
            Some(&token),
            Some(fetched.clone()),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated, fetched);

    let (status, page) = app
        .send("GET", "/api/planner/teams", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 1);
    assert_eq!(page["page"], 1);
    assert_eq!(page["results"][0]["name"], "Standard Rezzer");

    let (status, _) = app
        .send("DELETE", &format!("/api/planner/teams/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .send("GET", &format!("/api/planner/teams/{id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_team_rejects_edge_to_non_member() {
    let (app, token) = seeded().await;
    let doc = json!({
        "name": "Broken",
        "monsters": [{
            "monster": {"com2us_id": BELLADEON},
            "slower_than_by": [{"slower_than": {"monster": MEGAN}, "type": 0}]
        }]
    });
    let (status, body) = app
        .send("POST", "/api/planner/teams", Some(&token), Some(doc))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("slower_than").is_some());
}

#[tokio::test]
async fn test_foreign_team_is_forbidden() {
    let (app, token) = seeded().await;
    let id = create_team(&app, &token, chain("Mine")).await;
    let other = app.summoner("stranger").await;

    for (method, uri) in [
        ("GET", format!("/api/planner/teams/{id}")),
        ("DELETE", format!("/api/planner/teams/{id}")),
        ("POST", format!("/api/planner/teams/{id}/eliminate")),
    ] {
        let (status, _) = app.send(method, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
    }

    // Someone else's roster monster cannot be planned either
    let (status, body) = app
        .send("POST", "/api/planner/teams", Some(&other), Some(chain("Stolen")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("monster").is_some());
}

// ── Composite ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_composite_validation_and_creation() {
    let (app, token) = seeded().await;
    let a = create_team(&app, &token, chain("A")).await;
    let b = create_team(&app, &token, dragons_lair_team("B")).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/planner/teams/composite",
            Some(&token),
            Some(json!({"teams": [a, b]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"name": "Value is required"}));

    let (status, body) = app
        .send(
            "POST",
            "/api/planner/teams/composite",
            Some(&token),
            Some(json!({"name": "Combined"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"teams": "Value is required"}));

    let (status, body) = app
        .send("POST", "/api/planner/teams/composite", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"name": "Value is required", "teams": "Value is required"})
    );

    let (status, body) = app
        .send(
            "POST",
            "/api/planner/teams/composite",
            Some(&token),
            Some(json!({"name": "Combined", "teams": [a, 999]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("teams").is_some());

    let (status, body) = app
        .send(
            "POST",
            "/api/planner/teams/composite",
            Some(&token),
            Some(json!({"name": "Combined", "teams": [a, b]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("created"));

    let (status, body) = app
        .send(
            "POST",
            "/api/planner/teams/composite",
            Some(&token),
            Some(json!({"name": "Combined", "teams": [a]})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"name": "Object with name already exists"}));

    // The composite was simplified: Megan -> Veromos is implied
    let (_, page) = app
        .send("GET", "/api/planner/teams", Some(&token), None)
        .await;
    let combined = page["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "Combined")
        .unwrap()
        .clone();
    assert_eq!(combined["dungeon"], Value::Null);
    let veromos = combined["monsters"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["monster"]["com2us_id"] == VEROMOS)
        .unwrap();
    assert_eq!(
        veromos["slower_than_by"],
        json!([{"slower_than": {"monster": BELLADEON}, "type": 0, "amount": null}])
    );
}

// ── Elimination ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_eliminate_endpoints() {
    let (app, token) = seeded().await;
    let id = create_team(&app, &token, chain("Chain")).await;

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/planner/teams/{id}/eliminate"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"removed": 1}));

    let (_, body) = app
        .send(
            "POST",
            &format!("/api/planner/teams/{id}/eliminate"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(body, json!({"removed": 0}));

    let slots = app.db.list_team_monsters(id).await.unwrap();
    let (status, body) = app
        .send(
            "POST",
            &format!("/api/planner/teams/{id}/monsters/{}/eliminate", slots[2].id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"removed": 0}));

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/planner/teams/{id}/monsters/9999/eliminate"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cycle_is_a_server_error() {
    let (app, token) = seeded().await;
    let id = create_team(
        &app,
        &token,
        json!({
            "name": "Loop",
            "monsters": [
                {"monster": {"com2us_id": MEGAN},
                 "slower_than_by": [{"slower_than": {"monster": BELLADEON}, "type": 1}]},
                {"monster": {"com2us_id": BELLADEON},
                 "slower_than_by": [{"slower_than": {"monster": MEGAN}, "type": 1}]}
            ]
        }),
    )
    .await;

    let (status, body) = app
        .send(
            "POST",
            &format!("/api/planner/teams/{id}/eliminate"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Internal server error"}));
    assert_eq!(app.db.list_team_tunes(id).await.unwrap().len(), 2);
}

// ── Reference data ───────────────────────────────────────────────────

#[tokio::test]
async fn test_dungeons_and_roster() {
    let (app, token) = seeded().await;

    let (status, page) = app
        .send("GET", "/api/planner/dungeons", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2);
    assert_eq!(
        page["results"][0],
        json!({"id": DRAGONS_LAIR_10, "name": "Dragon's Lair - Level 10", "max_slots": 5})
    );

    let (_, page) = app
        .send("GET", "/api/planner/dungeons?page=2", Some(&token), None)
        .await;
    assert_eq!(page["page"], 2);
    assert!(page["results"].as_array().unwrap().is_empty());

    let (status, roster) = app
        .send("GET", "/api/planner/roster", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roster.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    metrics::register_metrics();
    let app = TestApp::new().await;
    app.send("GET", "/health", None, None).await;

    let response = app
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("swarfarm_api_requests_total"));
}
