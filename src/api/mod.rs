// HTTP API routes for the team planner.

pub mod teams;

use axum::{
    extract::{Json, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

use crate::auth::{self, AuthUser};
use crate::db::{Database, DbError};
use crate::metrics;
use crate::planner::PlannerError;
use crate::rate_limit::{RateLimitType, RateLimiter};

/// Page size of every paginated listing.
pub const PAGE_SIZE: i64 = 10;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PaginationParams {
    pub page: Option<i64>,
}

impl PaginationParams {
    fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(PAGE_SIZE)
    }
}

#[derive(Deserialize)]
pub struct CompositeRequest {
    pub name: Option<String>,
    pub teams: Option<Vec<i64>>,
}

// ── Response types ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: i64,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DungeonView {
    pub id: i64,
    pub name: String,
    pub max_slots: Option<i64>,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub rate_limiter: RateLimiter,
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn internal_error(e: impl std::fmt::Display) -> impl IntoResponse {
    tracing::error!("Database error: {e}");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Field-keyed validation body, e.g. `{"name": "Value is required"}`.
fn field_error(status: StatusCode, field: &str, msg: &str) -> Response {
    let mut body = serde_json::Map::new();
    body.insert(field.to_string(), json!(msg));
    (status, Json(serde_json::Value::Object(body))).into_response()
}

fn db_error(e: DbError) -> Response {
    match e {
        DbError::Validation { field, message } => {
            field_error(StatusCode::BAD_REQUEST, field, &message)
        }
        DbError::TeamNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "Team not found").into_response()
        }
        DbError::TeamMonsterNotFound(_) => {
            json_error(StatusCode::NOT_FOUND, "Team monster not found").into_response()
        }
        DbError::Planner(e @ PlannerError::CyclicConstraint { .. }) => {
            metrics::CYCLIC_CONSTRAINTS_TOTAL.inc();
            tracing::error!("Speed tuning graph rejected: {e}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
        other => internal_error(other).into_response(),
    }
}

// ── Router ────────────────────────────────────────────────────────────

/// The whole HTTP application: health, metrics, auth and planner routes.
pub fn app(db: Arc<Database>, rate_limiter: RateLimiter) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .with_state(db.clone())
        .merge(router(db, rate_limiter))
        .layer(middleware::from_fn(track_metrics))
        .layer(CorsLayer::permissive())
}

pub fn router(db: Arc<Database>, rate_limiter: RateLimiter) -> Router {
    let state = AppState { db, rate_limiter };

    Router::new()
        // Teams
        .route(
            "/api/planner/teams",
            get(teams::list_teams).post(teams::create_team),
        )
        .route("/api/planner/teams/composite", post(create_composite))
        .route(
            "/api/planner/teams/{id}",
            get(teams::get_team)
                .put(teams::update_team)
                .delete(teams::delete_team),
        )
        // Constraint simplification
        .route("/api/planner/teams/{id}/eliminate", post(eliminate_team))
        .route(
            "/api/planner/teams/{id}/monsters/{monster_id}/eliminate",
            post(eliminate_team_monster),
        )
        // Reference data
        .route("/api/planner/dungeons", get(list_dungeons))
        .route("/api/planner/roster", get(list_roster))
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "swarfarm-backend" }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        metrics::gather_metrics(),
    )
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = metrics::normalize_path(req.uri().path());
    let start = Instant::now();

    let response = next.run(req).await;

    metrics::API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint.as_str()])
        .observe(start.elapsed().as_secs_f64());
    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    response
}

// ── Composite ─────────────────────────────────────────────────────────

/// Merge several of the caller's teams into a new team and simplify its
/// speed tuning, all in one transaction.
async fn create_composite(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CompositeRequest>,
) -> impl IntoResponse {
    let name = req.name.filter(|n| !n.trim().is_empty());
    let team_ids = req.teams.filter(|t| !t.is_empty());
    let (name, team_ids) = match (name, team_ids) {
        (Some(name), Some(team_ids)) => (name, team_ids),
        (name, team_ids) => {
            let mut missing = serde_json::Map::new();
            if name.is_none() {
                missing.insert("name".to_string(), json!("Value is required"));
            }
            if team_ids.is_none() {
                missing.insert("teams".to_string(), json!("Value is required"));
            }
            return (StatusCode::BAD_REQUEST, Json(serde_json::Value::Object(missing)))
                .into_response();
        }
    };

    let owner_id = auth.summoner_id();
    match state.db.team_name_exists(owner_id, &name).await {
        Ok(false) => {}
        Ok(true) => {
            return field_error(
                StatusCode::CONFLICT,
                "name",
                "Object with name already exists",
            )
        }
        Err(e) => return internal_error(e).into_response(),
    }

    if let Err(e) = state
        .rate_limiter
        .check_limit(owner_id, RateLimitType::CompositeBuilds)
    {
        return json_error(StatusCode::TOO_MANY_REQUESTS, &e.to_string()).into_response();
    }

    match state
        .db
        .create_simplified_composite(owner_id, &name, &team_ids)
        .await
    {
        Ok((team, removed)) => {
            metrics::COMPOSITES_BUILT_TOTAL.inc();
            metrics::SPEED_TUNES_REMOVED_TOTAL
                .with_label_values(&["team"])
                .inc_by(removed.len() as u64);
            tracing::info!(
                team_id = team.id,
                owner_id,
                sources = team_ids.len(),
                removed = removed.len(),
                "Created composite team"
            );
            (StatusCode::OK, Json(json!("created"))).into_response()
        }
        Err(e) => db_error(e),
    }
}

// ── Elimination ───────────────────────────────────────────────────────

async fn eliminate_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    let team = match teams::owned_team(&state.db, id, &auth).await {
        Ok(team) => team,
        Err(response) => return response,
    };
    if let Err(e) = state
        .rate_limiter
        .check_limit(auth.summoner_id(), RateLimitType::Eliminations)
    {
        return json_error(StatusCode::TOO_MANY_REQUESTS, &e.to_string()).into_response();
    }

    match state.db.list_team_tunes(team.id).await {
        Ok(tunes) => metrics::ELIMINATION_GRAPH_SIZE.observe(tunes.len() as f64),
        Err(e) => return db_error(e),
    }

    match state.db.eliminate_redundant_constraints(team.id).await {
        Ok(removed) => {
            metrics::SPEED_TUNES_REMOVED_TOTAL
                .with_label_values(&["team"])
                .inc_by(removed.len() as u64);
            (StatusCode::OK, Json(json!({ "removed": removed.len() }))).into_response()
        }
        Err(e) => db_error(e),
    }
}

async fn eliminate_team_monster(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((id, monster_id)): Path<(i64, i64)>,
) -> impl IntoResponse {
    let team = match teams::owned_team(&state.db, id, &auth).await {
        Ok(team) => team,
        Err(response) => return response,
    };
    match state.db.list_team_monsters(team.id).await {
        Ok(slots) if slots.iter().any(|s| s.id == monster_id) => {}
        Ok(_) => {
            return json_error(StatusCode::NOT_FOUND, "Team monster not found").into_response()
        }
        Err(e) => return internal_error(e).into_response(),
    }

    match state.db.eliminate_redundant_constraints_mon(monster_id).await {
        Ok(removed) => {
            metrics::SPEED_TUNES_REMOVED_TOTAL
                .with_label_values(&["monster"])
                .inc_by(removed.len() as u64);
            (StatusCode::OK, Json(json!({ "removed": removed.len() }))).into_response()
        }
        Err(e) => db_error(e),
    }
}

// ── Reference data ────────────────────────────────────────────────────

async fn list_dungeons(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let count = match state.db.count_levels().await {
        Ok(count) => count,
        Err(e) => return internal_error(e).into_response(),
    };
    match state.db.list_levels(PAGE_SIZE, params.offset()).await {
        Ok(levels) => {
            let results = levels
                .into_iter()
                .map(|level| DungeonView {
                    id: level.id,
                    name: level.display_name(),
                    max_slots: level.max_slots,
                })
                .collect();
            let page = Page {
                count,
                page: params.page(),
                results,
            };
            (StatusCode::OK, Json(json!(page))).into_response()
        }
        Err(e) => internal_error(e).into_response(),
    }
}

async fn list_roster(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match state.db.list_roster(auth.summoner_id()).await {
        Ok(roster) => (StatusCode::OK, Json(json!(roster))).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}
