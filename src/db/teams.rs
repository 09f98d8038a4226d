// Team plan persistence and the transactional composite/elimination services.

use std::collections::{HashMap, HashSet};

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection, SqliteRow};

use super::{fetch_level, Database, DbError};
use crate::planner::model::STAT_COLUMNS;
use crate::planner::{
    self, ConstraintGraph, Element, LeaderSkill, SourceMonster, SourceTeam,
    SpeedTune, StatTargets, Team, TeamMonster, TuneKind,
};

const TEAM_COLUMNS: &str = "id, owner_id, dungeon_id, name";

/// Incoming edge of a monster in a nested team write, by roster identity.
#[derive(Debug, Clone, PartialEq)]
pub struct TuneDraft {
    /// com2us id of the monster that has to end up slower.
    pub slower_than: i64,
    pub kind: TuneKind,
    pub amount: Option<f64>,
}

impl TuneDraft {
    /// Check the amount against the kind. `AtLeastFlat` is never accepted
    /// from a team write.
    fn validate(&self) -> Result<(), DbError> {
        match (self.kind, self.amount) {
            (TuneKind::AtLeastFlat, _) => Err(DbError::validation(
                "type",
                format!("Tuning kind {} is reserved", self.kind.code()),
            )),
            (TuneKind::AnyAmount | TuneKind::AsLittleAsPossible, Some(_)) => Err(
                DbError::validation("amount", "Amount is not used by this tuning kind"),
            ),
            (TuneKind::AnyAmount | TuneKind::AsLittleAsPossible, None) => Ok(()),
            (TuneKind::WithinPercent | TuneKind::WithinFlat, None) => {
                Err(DbError::validation("amount", "Value is required"))
            }
            (TuneKind::WithinPercent, Some(amount)) if !(0.0..1.0).contains(&amount) => Err(
                DbError::validation("amount", format!("{amount} is not a fraction in [0, 1)")),
            ),
            (TuneKind::WithinFlat, Some(amount)) if !amount.is_finite() || amount < 0.0 => Err(
                DbError::validation("amount", format!("{amount} is not a non-negative SPD amount")),
            ),
            (TuneKind::WithinPercent | TuneKind::WithinFlat, Some(_)) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonsterDraft {
    /// com2us id of a roster monster owned by the team owner.
    pub com2us_id: i64,
    pub leader: bool,
    pub targets: StatTargets,
    pub slower_than_by: Vec<TuneDraft>,
}

/// A whole team as written by the nested team endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamDraft {
    pub name: String,
    pub dungeon_id: Option<i64>,
    pub monsters: Vec<MonsterDraft>,
}

impl TeamDraft {
    fn validate(&self) -> Result<(), DbError> {
        if self.name.trim().is_empty() {
            return Err(DbError::validation("name", "Value is required"));
        }
        let mut members = HashSet::new();
        for monster in &self.monsters {
            if !members.insert(monster.com2us_id) {
                return Err(DbError::validation(
                    "monsters",
                    format!("Monster {} is listed twice", monster.com2us_id),
                ));
            }
        }
        for monster in &self.monsters {
            for tune in &monster.slower_than_by {
                if !members.contains(&tune.slower_than) {
                    return Err(DbError::validation(
                        "slower_than",
                        format!("Monster {} is not a member of this team", tune.slower_than),
                    ));
                }
                tune.validate()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SpeedTuneRow {
    id: i64,
    slower_than_id: i64,
    faster_than_id: i64,
    kind: i64,
    amount: Option<f64>,
}

impl TryFrom<SpeedTuneRow> for SpeedTune {
    type Error = planner::PlannerError;

    fn try_from(row: SpeedTuneRow) -> Result<Self, Self::Error> {
        Ok(SpeedTune {
            id: row.id,
            slower_than: row.slower_than_id,
            faster_than: row.faster_than_id,
            kind: TuneKind::try_from(row.kind)?,
            amount: row.amount,
        })
    }
}

/// A team slot joined with the bestiary data of its monster.
#[derive(Debug, sqlx::FromRow)]
struct SourceMonsterRow {
    #[sqlx(flatten)]
    slot: TeamMonster,
    element: String,
    skill_attribute: Option<i64>,
    skill_amount: Option<i64>,
    skill_area: Option<i64>,
    skill_element: Option<String>,
}

impl TryFrom<SourceMonsterRow> for SourceMonster {
    type Error = planner::PlannerError;

    fn try_from(row: SourceMonsterRow) -> Result<Self, Self::Error> {
        let leader_skill = match (row.skill_attribute, row.skill_amount, row.skill_area) {
            (Some(attribute), Some(amount), Some(area)) => Some(LeaderSkill {
                attribute: attribute.try_into()?,
                amount,
                area: area.try_into()?,
                element: row
                    .skill_element
                    .as_deref()
                    .map(str::parse::<Element>)
                    .transpose()?,
            }),
            _ => None,
        };
        Ok(SourceMonster {
            slot: row.slot,
            element: row.element.parse()?,
            leader_skill,
        })
    }
}

fn bind_targets<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    targets: &StatTargets,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(targets.min_spd)
        .bind(targets.max_spd)
        .bind(targets.min_hp)
        .bind(targets.max_hp)
        .bind(targets.min_def)
        .bind(targets.max_def)
        .bind(targets.min_ehp)
        .bind(targets.max_ehp)
        .bind(targets.min_ehp_d)
        .bind(targets.max_ehp_d)
        .bind(targets.min_res)
        .bind(targets.max_res)
        .bind(targets.min_acc)
        .bind(targets.max_acc)
        .bind(targets.min_atk)
        .bind(targets.max_atk)
        .bind(targets.min_cdmg)
        .bind(targets.max_cdmg)
        .bind(targets.min_crate)
        .bind(targets.max_crate)
        .bind(targets.min_dps)
        .bind(targets.max_dps)
        .bind(targets.min_rune_avg)
        .bind(targets.max_rune_avg)
}

// ── Connection-level helpers (usable inside a transaction) ───────────

async fn insert_team(
    conn: &mut SqliteConnection,
    owner_id: i64,
    name: &str,
    dungeon_id: Option<i64>,
) -> Result<Team, sqlx::Error> {
    sqlx::query_as::<_, Team>(&format!(
        "INSERT INTO optimize_teams (owner_id, dungeon_id, name) VALUES (?, ?, ?) RETURNING {TEAM_COLUMNS}"
    ))
    .bind(owner_id)
    .bind(dungeon_id)
    .bind(name)
    .fetch_one(&mut *conn)
    .await
}

async fn fetch_team(conn: &mut SqliteConnection, id: i64) -> Result<Option<Team>, sqlx::Error> {
    sqlx::query_as::<_, Team>(&format!(
        "SELECT {TEAM_COLUMNS} FROM optimize_teams WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
}

async fn insert_team_monster(
    conn: &mut SqliteConnection,
    team_id: i64,
    monster_id: i64,
    leader: bool,
    targets: &StatTargets,
) -> Result<TeamMonster, sqlx::Error> {
    let placeholders = vec!["?"; STAT_COLUMNS.len()].join(", ");
    let sql = format!(
        "INSERT INTO optimize_monsters (team_id, monster_id, leader, {}) VALUES (?, ?, ?, {}) RETURNING *",
        STAT_COLUMNS.join(", "),
        placeholders
    );
    let query = sqlx::query(&sql).bind(team_id).bind(monster_id).bind(leader);
    let row = bind_targets(query, targets).fetch_one(&mut *conn).await?;
    <TeamMonster as sqlx::FromRow<'_, SqliteRow>>::from_row(&row)
}

async fn fetch_team_monster(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<TeamMonster>, sqlx::Error> {
    sqlx::query_as::<_, TeamMonster>("SELECT * FROM optimize_monsters WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

async fn fetch_team_monsters(
    conn: &mut SqliteConnection,
    team_id: i64,
) -> Result<Vec<TeamMonster>, sqlx::Error> {
    sqlx::query_as::<_, TeamMonster>(
        "SELECT * FROM optimize_monsters WHERE team_id = ? ORDER BY id",
    )
    .bind(team_id)
    .fetch_all(&mut *conn)
    .await
}

async fn insert_speed_tune(
    conn: &mut SqliteConnection,
    slower_than: i64,
    faster_than: i64,
    kind: TuneKind,
    amount: Option<f64>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO speed_tunes (slower_than_id, faster_than_id, kind, amount) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(slower_than)
    .bind(faster_than)
    .bind(kind.code())
    .bind(amount)
    .fetch_one(&mut *conn)
    .await
}

/// Incoming edges of every slot of a team, in id order.
async fn fetch_team_tunes(
    conn: &mut SqliteConnection,
    team_id: i64,
) -> Result<Vec<SpeedTune>, DbError> {
    let rows = sqlx::query_as::<_, SpeedTuneRow>(
        "SELECT st.id, st.slower_than_id, st.faster_than_id, st.kind, st.amount \
         FROM speed_tunes st JOIN optimize_monsters om ON om.id = st.faster_than_id \
         WHERE om.team_id = ? ORDER BY st.id",
    )
    .bind(team_id)
    .fetch_all(&mut *conn)
    .await?;
    let tunes = rows
        .into_iter()
        .map(SpeedTune::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tunes)
}

async fn delete_tunes(conn: &mut SqliteConnection, ids: &[i64]) -> Result<(), sqlx::Error> {
    for id in ids {
        sqlx::query("DELETE FROM speed_tunes WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn load_graph(conn: &mut SqliteConnection, team_id: i64) -> Result<ConstraintGraph, DbError> {
    let monsters = fetch_team_monsters(conn, team_id).await?;
    let tunes = fetch_team_tunes(conn, team_id).await?;
    let graph = ConstraintGraph::new(monsters.iter().map(|m| m.id), tunes)?;
    Ok(graph)
}

async fn load_source_team(conn: &mut SqliteConnection, team: Team) -> Result<SourceTeam, DbError> {
    let dungeon_category = match team.dungeon_id {
        Some(level_id) => match fetch_level(conn, level_id).await? {
            Some(level) => level.category()?,
            None => None,
        },
        None => None,
    };

    let rows = sqlx::query_as::<_, SourceMonsterRow>(
        "SELECT om.*, m.element AS element, ls.attribute AS skill_attribute, \
         ls.amount AS skill_amount, ls.area AS skill_area, ls.element AS skill_element \
         FROM optimize_monsters om \
         JOIN monster_instances mi ON mi.id = om.monster_id \
         JOIN monsters m ON m.id = mi.monster_id \
         LEFT JOIN leader_skills ls ON ls.id = m.leader_skill_id \
         WHERE om.team_id = ? ORDER BY om.id",
    )
    .bind(team.id)
    .fetch_all(&mut *conn)
    .await?;
    let monsters = rows
        .into_iter()
        .map(SourceMonster::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let tunes = fetch_team_tunes(conn, team.id).await?;

    Ok(SourceTeam {
        dungeon_category,
        team,
        monsters,
        tunes,
    })
}

async fn build_composite(
    conn: &mut SqliteConnection,
    owner_id: i64,
    name: &str,
    team_ids: &[i64],
) -> Result<Team, DbError> {
    let mut ids = team_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut sources = Vec::with_capacity(ids.len());
    for id in ids {
        let team = match fetch_team(conn, id).await? {
            Some(team) if team.owner_id == owner_id => team,
            _ => return Err(DbError::validation("teams", format!("Unknown team {id}"))),
        };
        sources.push(load_source_team(conn, team).await?);
    }

    let plan = planner::make_composite(&sources)?;

    let team = insert_team(conn, owner_id, name, None).await?;
    let mut slots = HashMap::with_capacity(plan.monsters.len());
    for monster in &plan.monsters {
        let slot = insert_team_monster(conn, team.id, monster.monster_id, false, &monster.targets).await?;
        slots.insert(monster.monster_id, slot.id);
    }
    for tune in &plan.tunes {
        let (Some(&slower), Some(&faster)) = (slots.get(&tune.slower_than), slots.get(&tune.faster_than))
        else {
            tracing::warn!(team_id = team.id, ?tune, "Dropping composite tune without a slot");
            continue;
        };
        insert_speed_tune(conn, slower, faster, tune.kind, tune.amount).await?;
    }

    tracing::info!(
        team_id = team.id,
        sources = sources.len(),
        monsters = plan.monsters.len(),
        tunes = plan.tunes.len(),
        "Built composite team"
    );
    Ok(team)
}

async fn eliminate_team(conn: &mut SqliteConnection, team_id: i64) -> Result<Vec<i64>, DbError> {
    let mut graph = load_graph(conn, team_id).await?;
    let removed = match graph.eliminate() {
        Ok(removed) => removed,
        Err(e) => {
            tracing::warn!(team_id, error = %e, "Speed tune elimination aborted");
            return Err(e.into());
        }
    };
    delete_tunes(conn, &removed).await?;
    tracing::debug!(team_id, removed = removed.len(), "Eliminated redundant speed tunes");
    Ok(removed)
}

// ── Database services ────────────────────────────────────────────────

impl Database {
    pub async fn get_team(&self, id: i64) -> Result<Option<Team>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_team(&mut conn, id).await
    }

    /// A page of an owner's teams, ordered by dungeon name then team name.
    pub async fn list_teams(
        &self,
        owner_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Team>, sqlx::Error> {
        let rows = sqlx::query_as::<_, Team>(
            "SELECT t.id, t.owner_id, t.dungeon_id, t.name FROM optimize_teams t \
             LEFT JOIN levels l ON l.id = t.dungeon_id \
             LEFT JOIN dungeons d ON d.id = l.dungeon_id \
             WHERE t.owner_id = ? ORDER BY d.name, t.name, t.id LIMIT ? OFFSET ?",
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_teams(&self, owner_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM optimize_teams WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn team_name_exists(&self, owner_id: i64, name: &str) -> Result<bool, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM optimize_teams WHERE owner_id = ? AND name = ?")
                .bind(owner_id)
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    pub async fn delete_team(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM optimize_teams WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_team(
        &self,
        owner_id: i64,
        name: &str,
        dungeon_id: Option<i64>,
    ) -> Result<Team, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        insert_team(&mut conn, owner_id, name, dungeon_id).await
    }

    pub async fn list_team_monsters(&self, team_id: i64) -> Result<Vec<TeamMonster>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_team_monsters(&mut conn, team_id).await
    }

    pub async fn list_team_tunes(&self, team_id: i64) -> Result<Vec<SpeedTune>, DbError> {
        let mut conn = self.pool.acquire().await?;
        fetch_team_tunes(&mut conn, team_id).await
    }

    /// Add an edge between two slots. Both slots have to belong to the same team.
    pub async fn add_speed_tune(
        &self,
        slower_than: i64,
        faster_than: i64,
        kind: TuneKind,
        amount: Option<f64>,
    ) -> Result<SpeedTune, DbError> {
        let mut conn = self.pool.acquire().await?;
        let slower = fetch_team_monster(&mut conn, slower_than)
            .await?
            .ok_or(DbError::TeamMonsterNotFound(slower_than))?;
        let faster = fetch_team_monster(&mut conn, faster_than)
            .await?
            .ok_or(DbError::TeamMonsterNotFound(faster_than))?;
        if slower.team_id != faster.team_id {
            return Err(DbError::validation(
                "slower_than",
                format!("Monster {slower_than} is not a member of team {}", faster.team_id),
            ));
        }
        let id = insert_speed_tune(&mut conn, slower_than, faster_than, kind, amount).await?;
        Ok(SpeedTune {
            id,
            slower_than,
            faster_than,
            kind,
            amount,
        })
    }

    /// Create (`team_id` None) or fully replace a team from a nested write.
    /// The monsters and edges of a replaced team are recreated from scratch.
    pub async fn save_team(
        &self,
        owner_id: i64,
        team_id: Option<i64>,
        draft: &TeamDraft,
    ) -> Result<Team, DbError> {
        draft.validate()?;
        let mut tx = self.pool.begin().await?;

        if let Some(level_id) = draft.dungeon_id {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM levels WHERE id = ?")
                .bind(level_id)
                .fetch_one(&mut *tx)
                .await?;
            if exists == 0 {
                return Err(DbError::validation("dungeon", format!("Unknown dungeon {level_id}")));
            }
        }

        let team = match team_id {
            None => insert_team(&mut tx, owner_id, &draft.name, draft.dungeon_id).await?,
            Some(id) => {
                let team = sqlx::query_as::<_, Team>(&format!(
                    "UPDATE optimize_teams SET name = ?, dungeon_id = ? WHERE id = ? RETURNING {TEAM_COLUMNS}"
                ))
                .bind(&draft.name)
                .bind(draft.dungeon_id)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(DbError::TeamNotFound(id))?;
                sqlx::query("DELETE FROM optimize_monsters WHERE team_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                team
            }
        };

        // com2us id -> slot id
        let mut slots = HashMap::with_capacity(draft.monsters.len());
        for monster in &draft.monsters {
            let instance: Option<(i64, i64)> =
                sqlx::query_as("SELECT id, owner_id FROM monster_instances WHERE com2us_id = ?")
                    .bind(monster.com2us_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let instance_id = match instance {
                Some((id, owner)) if owner == owner_id => id,
                _ => {
                    return Err(DbError::validation(
                        "monster",
                        format!("Monster {} is not in your roster", monster.com2us_id),
                    ))
                }
            };
            let slot =
                insert_team_monster(&mut tx, team.id, instance_id, monster.leader, &monster.targets)
                    .await?;
            slots.insert(monster.com2us_id, slot.id);
        }

        for monster in &draft.monsters {
            let faster = slots[&monster.com2us_id];
            for tune in &monster.slower_than_by {
                let slower = slots[&tune.slower_than];
                insert_speed_tune(&mut tx, slower, faster, tune.kind, tune.amount).await?;
            }
        }

        tx.commit().await?;
        tracing::info!(
            team_id = team.id,
            owner_id,
            monsters = draft.monsters.len(),
            "Saved team"
        );
        Ok(team)
    }

    /// Merge the given teams into a new team named `name`.
    pub async fn create_composite(
        &self,
        owner_id: i64,
        name: &str,
        team_ids: &[i64],
    ) -> Result<Team, DbError> {
        let mut tx = self.pool.begin().await?;
        let team = build_composite(&mut tx, owner_id, name, team_ids).await?;
        tx.commit().await?;
        Ok(team)
    }

    /// Build a composite team and run the team-wide elimination pass on it in
    /// the same transaction. Returns the new team and the removed edge ids.
    pub async fn create_simplified_composite(
        &self,
        owner_id: i64,
        name: &str,
        team_ids: &[i64],
    ) -> Result<(Team, Vec<i64>), DbError> {
        let mut tx = self.pool.begin().await?;
        let team = build_composite(&mut tx, owner_id, name, team_ids).await?;
        let removed = eliminate_team(&mut tx, team.id).await?;
        tx.commit().await?;
        Ok((team, removed))
    }

    /// Team-wide pass against persisted state. Nothing is deleted on error.
    pub async fn eliminate_redundant_constraints(&self, team_id: i64) -> Result<Vec<i64>, DbError> {
        let mut tx = self.pool.begin().await?;
        if fetch_team(&mut tx, team_id).await?.is_none() {
            return Err(DbError::TeamNotFound(team_id));
        }
        let removed = eliminate_team(&mut tx, team_id).await?;
        tx.commit().await?;
        Ok(removed)
    }

    /// Single-monster pass over one slot's incoming edges.
    pub async fn eliminate_redundant_constraints_mon(
        &self,
        team_monster_id: i64,
    ) -> Result<Vec<i64>, DbError> {
        let mut tx = self.pool.begin().await?;
        let slot = fetch_team_monster(&mut tx, team_monster_id)
            .await?
            .ok_or(DbError::TeamMonsterNotFound(team_monster_id))?;
        let mut graph = load_graph(&mut tx, slot.team_id).await?;
        let removed = graph.eliminate_monster(slot.id);
        delete_tunes(&mut tx, &removed).await?;
        tx.commit().await?;
        tracing::debug!(
            team_id = slot.team_id,
            team_monster_id,
            removed = removed.len(),
            "Collapsed parallel speed tunes"
        );
        Ok(removed)
    }
}
