// JSON fixture with bestiary reference data and roster entries, loaded at
// startup when FIXTURE_PATH is set.

use std::path::Path;

use serde::Deserialize;

use super::{Database, DbError};
use crate::planner::{DungeonCategory, Element, LeaderSkill};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub leader_skills: Vec<LeaderSkillRecord>,
    pub monsters: Vec<MonsterRecord>,
    pub dungeons: Vec<DungeonRecord>,
    pub levels: Vec<LevelRecord>,
    pub roster: Vec<RosterRecord>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderSkillRecord {
    pub id: i64,
    #[serde(flatten)]
    pub skill: LeaderSkill,
}

#[derive(Debug, Deserialize)]
pub struct MonsterRecord {
    pub id: i64,
    pub name: String,
    pub element: Element,
    #[serde(default)]
    pub leader_skill: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DungeonRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub category: Option<DungeonCategory>,
}

#[derive(Debug, Deserialize)]
pub struct LevelRecord {
    pub id: i64,
    pub dungeon: i64,
    pub floor: i64,
    #[serde(default)]
    pub max_slots: Option<i64>,
}

/// Roster monster of an existing summoner, referenced by username.
#[derive(Debug, Deserialize)]
pub struct RosterRecord {
    pub com2us_id: i64,
    pub owner: String,
    pub monster: i64,
    #[serde(default = "default_stars")]
    pub stars: i64,
    #[serde(default = "default_level")]
    pub level: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_stars() -> i64 {
    1
}

fn default_level() -> i64 {
    1
}

impl Fixture {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl Database {
    /// Upsert every record of the fixture. Roster entries whose owner does
    /// not exist are skipped.
    pub async fn load_fixture(&self, fixture: &Fixture) -> Result<(), DbError> {
        for record in &fixture.leader_skills {
            self.upsert_leader_skill(record.id, &record.skill).await?;
        }
        for record in &fixture.monsters {
            self.upsert_monster(record.id, &record.name, record.element, record.leader_skill)
                .await?;
        }
        for record in &fixture.dungeons {
            self.upsert_dungeon(record.id, &record.name, record.slug.as_deref(), record.category)
                .await?;
        }
        for record in &fixture.levels {
            self.upsert_level(record.id, record.dungeon, record.floor, record.max_slots)
                .await?;
        }

        let mut skipped = 0;
        for record in &fixture.roster {
            let Some(owner) = self.get_summoner_by_username(&record.owner).await? else {
                tracing::warn!(owner = %record.owner, com2us_id = record.com2us_id, "Skipping roster entry of unknown summoner");
                skipped += 1;
                continue;
            };
            self.upsert_monster_instance(
                record.com2us_id,
                owner.id,
                record.monster,
                record.stars,
                record.level,
                record.notes.as_deref(),
            )
            .await?;
        }

        tracing::info!(
            monsters = fixture.monsters.len(),
            levels = fixture.levels.len(),
            roster = fixture.roster.len() - skipped,
            "Loaded reference fixture"
        );
        Ok(())
    }
}
