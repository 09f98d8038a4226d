// Nested team endpoints. A team is read and written as one document with its
// monsters and their incoming speed tunes; roster monsters are referenced by
// com2us id so a read document can be written back unchanged.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use super::{db_error, internal_error, json_error, AppState, DungeonView, Page, PaginationParams, PAGE_SIZE};
use crate::auth::AuthUser;
use crate::db::{Database, DbError, MonsterDraft, RosterEntry, TeamDraft, TuneDraft};
use crate::metrics;
use crate::planner::{StatTargets, Team, TuneKind};

// ── Documents ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonsterRef {
    /// com2us id
    pub monster: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeedTuneDoc {
    pub slower_than: MonsterRef,
    #[serde(rename = "type")]
    pub kind: TuneKind,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterView {
    pub com2us_id: i64,
    pub name: String,
    pub stars: i64,
    pub level: i64,
    pub notes: Option<String>,
}

impl From<RosterEntry> for RosterView {
    fn from(entry: RosterEntry) -> Self {
        RosterView {
            com2us_id: entry.com2us_id,
            name: entry.name,
            stars: entry.stars,
            level: entry.level,
            notes: entry.notes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamMonsterView {
    pub monster: RosterView,
    pub leader: bool,
    #[serde(flatten)]
    pub targets: StatTargets,
    pub slower_than_by: Vec<SpeedTuneDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamView {
    pub id: i64,
    pub name: String,
    pub dungeon: Option<DungeonView>,
    pub monsters: Vec<TeamMonsterView>,
}

#[derive(Debug, Deserialize)]
pub struct RosterRef {
    pub com2us_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DungeonRef {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TeamMonsterWrite {
    pub monster: RosterRef,
    #[serde(default)]
    pub leader: bool,
    #[serde(flatten)]
    pub targets: StatTargets,
    #[serde(default)]
    pub slower_than_by: Vec<SpeedTuneDoc>,
}

#[derive(Debug, Deserialize)]
pub struct TeamWrite {
    pub name: String,
    #[serde(default)]
    pub dungeon: Option<DungeonRef>,
    #[serde(default)]
    pub monsters: Vec<TeamMonsterWrite>,
}

impl From<TeamWrite> for TeamDraft {
    fn from(write: TeamWrite) -> Self {
        TeamDraft {
            name: write.name,
            dungeon_id: write.dungeon.map(|d| d.id),
            monsters: write
                .monsters
                .into_iter()
                .map(|m| MonsterDraft {
                    com2us_id: m.monster.com2us_id,
                    leader: m.leader,
                    targets: m.targets,
                    slower_than_by: m
                        .slower_than_by
                        .into_iter()
                        .map(|t| TuneDraft {
                            slower_than: t.slower_than.monster,
                            kind: t.kind,
                            amount: t.amount,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Assemble the nested document of a persisted team.
pub async fn team_view(db: &Database, team: &Team) -> Result<TeamView, DbError> {
    let dungeon = match team.dungeon_id {
        Some(level_id) => db.get_level(level_id).await?.map(|level| DungeonView {
            id: level.id,
            name: level.display_name(),
            max_slots: level.max_slots,
        }),
        None => None,
    };

    let slots = db.list_team_monsters(team.id).await?;
    let mut roster: HashMap<i64, RosterEntry> = db
        .list_team_roster(team.id)
        .await?
        .into_iter()
        .map(|entry| (entry.id, entry))
        .collect();
    let com2us: HashMap<i64, i64> = slots
        .iter()
        .filter_map(|slot| roster.get(&slot.monster_id).map(|e| (slot.id, e.com2us_id)))
        .collect();

    let mut incoming: HashMap<i64, Vec<SpeedTuneDoc>> = HashMap::new();
    for tune in db.list_team_tunes(team.id).await? {
        let Some(&slower) = com2us.get(&tune.slower_than) else {
            continue;
        };
        incoming.entry(tune.faster_than).or_default().push(SpeedTuneDoc {
            slower_than: MonsterRef { monster: slower },
            kind: tune.kind,
            amount: tune.amount,
        });
    }

    let mut monsters = Vec::with_capacity(slots.len());
    for slot in slots {
        let Some(entry) = roster.remove(&slot.monster_id) else {
            tracing::warn!(team_id = team.id, slot = slot.id, "Team slot without roster monster");
            continue;
        };
        monsters.push(TeamMonsterView {
            monster: entry.into(),
            leader: slot.leader,
            slower_than_by: incoming.remove(&slot.id).unwrap_or_default(),
            targets: slot.targets,
        });
    }

    Ok(TeamView {
        id: team.id,
        name: team.name.clone(),
        dungeon,
        monsters,
    })
}

/// Load a team the caller owns, or the error response to return.
pub(super) async fn owned_team(db: &Database, id: i64, auth: &AuthUser) -> Result<Team, Response> {
    match db.get_team(id).await {
        Ok(Some(team)) if team.owner_id == auth.summoner_id() => Ok(team),
        Ok(Some(_)) => Err(json_error(StatusCode::FORBIDDEN, "You do not own this team").into_response()),
        Ok(None) => Err(json_error(StatusCode::NOT_FOUND, "Team not found").into_response()),
        Err(e) => Err(internal_error(e).into_response()),
    }
}

async fn view_response(db: &Database, team: &Team, status: StatusCode) -> Response {
    match team_view(db, team).await {
        Ok(view) => (status, Json(json!(view))).into_response(),
        Err(e) => db_error(e),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────

pub async fn list_teams(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let owner_id = auth.summoner_id();
    let count = match state.db.count_teams(owner_id).await {
        Ok(count) => count,
        Err(e) => return internal_error(e).into_response(),
    };
    let teams = match state.db.list_teams(owner_id, PAGE_SIZE, params.offset()).await {
        Ok(teams) => teams,
        Err(e) => return internal_error(e).into_response(),
    };

    let mut results = Vec::with_capacity(teams.len());
    for team in &teams {
        match team_view(&state.db, team).await {
            Ok(view) => results.push(view),
            Err(e) => return db_error(e),
        }
    }
    let page = Page {
        count,
        page: params.page(),
        results,
    };
    (StatusCode::OK, Json(json!(page))).into_response()
}

pub async fn create_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<TeamWrite>,
) -> impl IntoResponse {
    let draft = TeamDraft::from(req);
    match state.db.save_team(auth.summoner_id(), None, &draft).await {
        Ok(team) => {
            metrics::TEAMS_SAVED_TOTAL.with_label_values(&["create"]).inc();
            view_response(&state.db, &team, StatusCode::CREATED).await
        }
        Err(e) => db_error(e),
    }
}

pub async fn get_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match owned_team(&state.db, id, &auth).await {
        Ok(team) => view_response(&state.db, &team, StatusCode::OK).await,
        Err(response) => response,
    }
}

pub async fn update_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<TeamWrite>,
) -> impl IntoResponse {
    if let Err(response) = owned_team(&state.db, id, &auth).await {
        return response;
    }
    let draft = TeamDraft::from(req);
    match state.db.save_team(auth.summoner_id(), Some(id), &draft).await {
        Ok(team) => {
            metrics::TEAMS_SAVED_TOTAL.with_label_values(&["update"]).inc();
            view_response(&state.db, &team, StatusCode::OK).await
        }
        Err(e) => db_error(e),
    }
}

pub async fn delete_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    if let Err(response) = owned_team(&state.db, id, &auth).await {
        return response;
    }
    match state.db.delete_team(id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, "Team not found").into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}
