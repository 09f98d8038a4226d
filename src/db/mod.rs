// Database access layer (SQLite via sqlx).

pub mod fixture;
mod teams;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use thiserror::Error;

use crate::planner::model::STAT_COLUMNS;
use crate::planner::{DungeonCategory, Element, LeaderSkill, PlannerError};

pub use teams::{MonsterDraft, TeamDraft, TuneDraft};

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error("team {0} not found")]
    TeamNotFound(i64),

    #[error("team monster {0} not found")]
    TeamMonsterNotFound(i64),

    /// Rejected input, keyed by the offending request field.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("failed to read fixture: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid fixture: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DbError::Validation {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Summoner {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: String,
}

/// A dungeon floor teams can be planned for.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DungeonLevel {
    pub id: i64,
    pub dungeon_id: i64,
    pub dungeon_name: String,
    pub category: Option<i64>,
    pub floor: i64,
    pub max_slots: Option<i64>,
}

impl DungeonLevel {
    pub fn display_name(&self) -> String {
        format!("{} - Level {}", self.dungeon_name, self.floor)
    }

    pub fn category(&self) -> Result<Option<DungeonCategory>, PlannerError> {
        self.category.map(DungeonCategory::try_from).transpose()
    }
}

/// A monster instance in a summoner's collection.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RosterEntry {
    pub id: i64,
    pub com2us_id: i64,
    pub owner_id: i64,
    pub monster_id: i64,
    pub name: String,
    pub element: String,
    pub stars: i64,
    pub level: i64,
    pub notes: Option<String>,
}

const SUMMONER_COLUMNS: &str = "id, username, email, password_hash, created_at";

const LEVEL_SELECT: &str = "SELECT l.id, l.dungeon_id, d.name AS dungeon_name, d.category, l.floor, l.max_slots \
     FROM levels l JOIN dungeons d ON d.id = l.dungeon_id";

async fn fetch_level(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<DungeonLevel>, sqlx::Error> {
    sqlx::query_as::<_, DungeonLevel>(&format!("{LEVEL_SELECT} WHERE l.id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

const ROSTER_SELECT: &str = "SELECT mi.id, mi.com2us_id, mi.owner_id, mi.monster_id, m.name, m.element, mi.stars, mi.level, mi.notes \
     FROM monster_instances mi JOIN monsters m ON m.id = mi.monster_id";

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        // Speed tunes cascade with their team monsters.
        let options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS summoners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS leader_skills (
                id INTEGER PRIMARY KEY,
                attribute INTEGER NOT NULL,
                amount INTEGER NOT NULL,
                area INTEGER NOT NULL DEFAULT 1,
                element TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monsters (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                element TEXT NOT NULL,
                leader_skill_id INTEGER REFERENCES leader_skills(id) ON DELETE SET NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dungeons (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT,
                category INTEGER
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS levels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dungeon_id INTEGER NOT NULL REFERENCES dungeons(id) ON DELETE CASCADE,
                floor INTEGER NOT NULL,
                max_slots INTEGER
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monster_instances (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                com2us_id INTEGER NOT NULL UNIQUE,
                owner_id INTEGER NOT NULL REFERENCES summoners(id) ON DELETE CASCADE,
                monster_id INTEGER NOT NULL REFERENCES monsters(id) ON DELETE CASCADE,
                stars INTEGER NOT NULL DEFAULT 1,
                level INTEGER NOT NULL DEFAULT 1,
                notes TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS optimize_teams (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL REFERENCES summoners(id) ON DELETE CASCADE,
                dungeon_id INTEGER REFERENCES levels(id) ON DELETE CASCADE,
                name TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        let stat_columns: Vec<String> = STAT_COLUMNS
            .iter()
            .map(|column| {
                let sql_type = if column.ends_with("rune_avg") { "REAL" } else { "INTEGER" };
                format!("{column} {sql_type}")
            })
            .collect();
        let optimize_monsters = format!(
            r#"
            CREATE TABLE IF NOT EXISTS optimize_monsters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                team_id INTEGER NOT NULL REFERENCES optimize_teams(id) ON DELETE CASCADE,
                monster_id INTEGER NOT NULL REFERENCES monster_instances(id) ON DELETE CASCADE,
                leader INTEGER NOT NULL DEFAULT 0,
                {}
            )
        "#,
            stat_columns.join(",\n                ")
        );
        sqlx::query(&optimize_monsters).execute(&self.pool).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS speed_tunes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slower_than_id INTEGER NOT NULL REFERENCES optimize_monsters(id) ON DELETE CASCADE,
                faster_than_id INTEGER NOT NULL REFERENCES optimize_monsters(id) ON DELETE CASCADE,
                kind INTEGER NOT NULL,
                amount REAL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Summoners ─────────────────────────────────────────────────────

    pub async fn create_summoner(
        &self,
        username: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<Summoner, sqlx::Error> {
        let row = sqlx::query_as::<_, Summoner>(&format!(
            "INSERT INTO summoners (username, email, password_hash) VALUES (?, ?, ?) RETURNING {SUMMONER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_summoner(&self, id: i64) -> Result<Option<Summoner>, sqlx::Error> {
        let row = sqlx::query_as::<_, Summoner>(&format!(
            "SELECT {SUMMONER_COLUMNS} FROM summoners WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_summoner_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Summoner>, sqlx::Error> {
        let row = sqlx::query_as::<_, Summoner>(&format!(
            "SELECT {SUMMONER_COLUMNS} FROM summoners WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Create the summoner with a fixed id unless it already exists.
    pub async fn ensure_summoner(&self, id: i64, username: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO summoners (id, username, email) VALUES (?, ?, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(id)
        .bind(username)
        .bind(format!("{username}@localhost"))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── Bestiary reference data ───────────────────────────────────────

    pub async fn upsert_leader_skill(
        &self,
        id: i64,
        skill: &LeaderSkill,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO leader_skills (id, attribute, amount, area, element) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET attribute = excluded.attribute, amount = excluded.amount, \
             area = excluded.area, element = excluded.element",
        )
        .bind(id)
        .bind(skill.attribute.code())
        .bind(skill.amount)
        .bind(skill.area.code())
        .bind(skill.element.map(Element::as_str))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_monster(
        &self,
        id: i64,
        name: &str,
        element: Element,
        leader_skill_id: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO monsters (id, name, element, leader_skill_id) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, element = excluded.element, \
             leader_skill_id = excluded.leader_skill_id",
        )
        .bind(id)
        .bind(name)
        .bind(element.as_str())
        .bind(leader_skill_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_dungeon(
        &self,
        id: i64,
        name: &str,
        slug: Option<&str>,
        category: Option<DungeonCategory>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO dungeons (id, name, slug, category) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, slug = excluded.slug, \
             category = excluded.category",
        )
        .bind(id)
        .bind(name)
        .bind(slug)
        .bind(category.map(DungeonCategory::code))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_level(
        &self,
        id: i64,
        dungeon_id: i64,
        floor: i64,
        max_slots: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO levels (id, dungeon_id, floor, max_slots) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET dungeon_id = excluded.dungeon_id, floor = excluded.floor, \
             max_slots = excluded.max_slots",
        )
        .bind(id)
        .bind(dungeon_id)
        .bind(floor)
        .bind(max_slots)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_level(&self, id: i64) -> Result<Option<DungeonLevel>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        fetch_level(&mut conn, id).await
    }

    pub async fn list_levels(&self, limit: i64, offset: i64) -> Result<Vec<DungeonLevel>, sqlx::Error> {
        let rows = sqlx::query_as::<_, DungeonLevel>(&format!(
            "{LEVEL_SELECT} ORDER BY d.name, l.floor, l.id LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_levels(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM levels")
            .fetch_one(&self.pool)
            .await
    }

    // ── Roster ────────────────────────────────────────────────────────

    pub async fn upsert_monster_instance(
        &self,
        com2us_id: i64,
        owner_id: i64,
        monster_id: i64,
        stars: i64,
        level: i64,
        notes: Option<&str>,
    ) -> Result<RosterEntry, sqlx::Error> {
        sqlx::query(
            "INSERT INTO monster_instances (com2us_id, owner_id, monster_id, stars, level, notes) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(com2us_id) DO UPDATE SET owner_id = excluded.owner_id, \
             monster_id = excluded.monster_id, stars = excluded.stars, level = excluded.level, \
             notes = excluded.notes",
        )
        .bind(com2us_id)
        .bind(owner_id)
        .bind(monster_id)
        .bind(stars)
        .bind(level)
        .bind(notes)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, RosterEntry>(&format!("{ROSTER_SELECT} WHERE mi.com2us_id = ?"))
            .bind(com2us_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_roster(&self, owner_id: i64) -> Result<Vec<RosterEntry>, sqlx::Error> {
        let rows = sqlx::query_as::<_, RosterEntry>(&format!(
            "{ROSTER_SELECT} WHERE mi.owner_id = ? ORDER BY mi.id"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Roster entries behind the slots of a team.
    pub async fn list_team_roster(&self, team_id: i64) -> Result<Vec<RosterEntry>, sqlx::Error> {
        let rows = sqlx::query_as::<_, RosterEntry>(&format!(
            "{ROSTER_SELECT} JOIN optimize_monsters om ON om.monster_id = mi.id WHERE om.team_id = ? ORDER BY om.id"
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
