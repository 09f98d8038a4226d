// Team planner core: stat targets, relative speed tuning, leader skill
// compensation, composite building and redundant constraint elimination.

pub mod composite;
pub mod leader;
pub mod model;
pub mod redundancy;

use thiserror::Error;

pub use composite::{make_composite, CompositePlan, SourceMonster, SourceTeam};
pub use leader::{apply_leader_adjustment, Area, Attribute, DungeonCategory, Element, LeaderSkill};
pub use model::{SpeedTune, StatTargets, Team, TeamMonster, TuneKind};
pub use redundancy::{ConstraintGraph, ImpliedTune};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlannerError {
    /// No monster could be resolved during a full round of the team-wide pass.
    #[error("Cyclic Constraint Detected ({} monsters unresolved)", .remaining.len())]
    CyclicConstraint { remaining: Vec<i64> },

    /// A speed tune whose endpoints are not both members of the same team.
    #[error("speed tune {edge} references monster {monster} outside of its team")]
    CrossTeamEdge { edge: i64, monster: i64 },

    #[error("unknown speed tune type {0}")]
    UnknownTuneKind(i64),

    #[error("unknown leader skill attribute {0}")]
    UnknownAttribute(i64),

    #[error("unknown leader skill area {0}")]
    UnknownArea(i64),

    #[error("unknown dungeon category {0}")]
    UnknownCategory(i64),

    #[error("unknown element {0:?}")]
    UnknownElement(String),
}
