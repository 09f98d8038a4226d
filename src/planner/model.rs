// Planner data model: per-monster stat targets and the relative speed edges
// between monsters of one team.

use serde::{Deserialize, Serialize};

use super::PlannerError;

// ── Tuning kinds ──────────────────────────────────────────────────────

/// How strictly `faster_than` has to outspeed `slower_than`.
///
/// The integer codes are part of the external JSON contract, except for
/// `AtLeastFlat` which is reserved for leader ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TuneKind {
    AnyAmount,
    AsLittleAsPossible,
    WithinPercent,
    WithinFlat,
    AtLeastFlat,
}

impl TuneKind {
    pub fn code(self) -> i64 {
        match self {
            TuneKind::AnyAmount => 0,
            TuneKind::AsLittleAsPossible => 1,
            TuneKind::WithinPercent => 2,
            TuneKind::WithinFlat => 3,
            TuneKind::AtLeastFlat => 4,
        }
    }

    /// Whether a constraint of this kind carrying `amount` is no stricter than
    /// one carrying `other`. Only meaningful between constraints of the same kind.
    ///
    /// Tolerance kinds get weaker as the amount grows, `AtLeastFlat` gets
    /// stronger. A missing amount never constrains anything.
    pub fn not_stricter(self, amount: Option<f64>, other: Option<f64>) -> bool {
        match (amount, other) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => match self {
                TuneKind::AtLeastFlat => a <= b,
                _ => a >= b,
            },
        }
    }
}

impl TryFrom<i64> for TuneKind {
    type Error = PlannerError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TuneKind::AnyAmount),
            1 => Ok(TuneKind::AsLittleAsPossible),
            2 => Ok(TuneKind::WithinPercent),
            3 => Ok(TuneKind::WithinFlat),
            4 => Ok(TuneKind::AtLeastFlat),
            other => Err(PlannerError::UnknownTuneKind(other)),
        }
    }
}

impl From<TuneKind> for i64 {
    fn from(kind: TuneKind) -> Self {
        kind.code()
    }
}

// ── Stat targets ──────────────────────────────────────────────────────

/// Optional lower/upper bounds a monster's rune build should satisfy.
/// `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct StatTargets {
    // SPD
    pub min_spd: Option<i64>,
    pub max_spd: Option<i64>,
    // Survivability
    pub min_hp: Option<i64>,
    pub max_hp: Option<i64>,
    pub min_def: Option<i64>,
    pub max_def: Option<i64>,
    pub min_ehp: Option<i64>,
    pub max_ehp: Option<i64>,
    pub min_ehp_d: Option<i64>,
    pub max_ehp_d: Option<i64>,
    pub min_res: Option<i64>,
    pub max_res: Option<i64>,
    // Damage
    pub min_acc: Option<i64>,
    pub max_acc: Option<i64>,
    pub min_atk: Option<i64>,
    pub max_atk: Option<i64>,
    pub min_cdmg: Option<i64>,
    pub max_cdmg: Option<i64>,
    pub min_crate: Option<i64>,
    pub max_crate: Option<i64>,
    pub min_dps: Option<i64>,
    pub max_dps: Option<i64>,
    // Rune quality
    pub min_rune_avg: Option<f64>,
    pub max_rune_avg: Option<f64>,
}

/// Column order used by the persistence layer.
pub const STAT_COLUMNS: [&str; 24] = [
    "min_spd",
    "max_spd",
    "min_hp",
    "max_hp",
    "min_def",
    "max_def",
    "min_ehp",
    "max_ehp",
    "min_ehp_d",
    "max_ehp_d",
    "min_res",
    "max_res",
    "min_acc",
    "max_acc",
    "min_atk",
    "max_atk",
    "min_cdmg",
    "max_cdmg",
    "min_crate",
    "max_crate",
    "min_dps",
    "max_dps",
    "min_rune_avg",
    "max_rune_avg",
];

fn stricter<T: PartialOrd + Copy>(current: &mut Option<T>, other: Option<T>, pick: fn(T, T) -> T) {
    *current = match (*current, other) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (None, b) => b,
        (a, None) => a,
    };
}

fn larger<T: PartialOrd>(a: T, b: T) -> T {
    if b > a {
        b
    } else {
        a
    }
}

fn smaller<T: PartialOrd>(a: T, b: T) -> T {
    if b < a {
        b
    } else {
        a
    }
}

impl StatTargets {
    /// Fold another set of targets for the same monster into this one, keeping
    /// the stricter bound per field: the larger minimum and the smaller maximum.
    pub fn reconcile(&mut self, other: &StatTargets) {
        stricter(&mut self.min_spd, other.min_spd, larger);
        stricter(&mut self.max_spd, other.max_spd, smaller);
        stricter(&mut self.min_hp, other.min_hp, larger);
        stricter(&mut self.max_hp, other.max_hp, smaller);
        stricter(&mut self.min_def, other.min_def, larger);
        stricter(&mut self.max_def, other.max_def, smaller);
        stricter(&mut self.min_ehp, other.min_ehp, larger);
        stricter(&mut self.max_ehp, other.max_ehp, smaller);
        stricter(&mut self.min_ehp_d, other.min_ehp_d, larger);
        stricter(&mut self.max_ehp_d, other.max_ehp_d, smaller);
        stricter(&mut self.min_res, other.min_res, larger);
        stricter(&mut self.max_res, other.max_res, smaller);
        stricter(&mut self.min_acc, other.min_acc, larger);
        stricter(&mut self.max_acc, other.max_acc, smaller);
        stricter(&mut self.min_atk, other.min_atk, larger);
        stricter(&mut self.max_atk, other.max_atk, smaller);
        stricter(&mut self.min_cdmg, other.min_cdmg, larger);
        stricter(&mut self.max_cdmg, other.max_cdmg, smaller);
        stricter(&mut self.min_crate, other.min_crate, larger);
        stricter(&mut self.max_crate, other.max_crate, smaller);
        stricter(&mut self.min_dps, other.min_dps, larger);
        stricter(&mut self.max_dps, other.max_dps, smaller);
        stricter(&mut self.min_rune_avg, other.min_rune_avg, larger);
        stricter(&mut self.max_rune_avg, other.max_rune_avg, smaller);
    }
}

// ── Teams, slots and edges ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    pub id: i64,
    pub owner_id: i64,
    /// Dungeon level the team is planned for.
    pub dungeon_id: Option<i64>,
    pub name: String,
}

/// One slot of a team, wrapping a roster monster instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TeamMonster {
    pub id: i64,
    pub team_id: i64,
    /// Roster monster instance id.
    pub monster_id: i64,
    pub leader: bool,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub targets: StatTargets,
}

/// Directed edge: `faster_than` has to end up faster than `slower_than`.
/// Both ends are team monster ids of the same team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTune {
    pub id: i64,
    pub slower_than: i64,
    pub faster_than: i64,
    pub kind: TuneKind,
    pub amount: Option<f64>,
}

impl SpeedTune {
    /// Whether this edge's amount is no stricter than `other`'s. Both edges are
    /// expected to share a kind.
    pub fn not_stricter_than(&self, other: &SpeedTune) -> bool {
        self.kind.not_stricter(self.amount, other.amount)
    }
}
