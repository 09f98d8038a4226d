// Leader skills: element/area gating and the stat target compensation used
// when teams are merged into a composite plan.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::model::StatTargets;
use super::PlannerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Pure,
    Fire,
    Wind,
    Water,
    Light,
    Dark,
}

impl Element {
    pub fn as_str(self) -> &'static str {
        match self {
            Element::Pure => "pure",
            Element::Fire => "fire",
            Element::Wind => "wind",
            Element::Water => "water",
            Element::Light => "light",
            Element::Dark => "dark",
        }
    }
}

impl FromStr for Element {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pure" => Ok(Element::Pure),
            "fire" => Ok(Element::Fire),
            "wind" => Ok(Element::Wind),
            "water" => Ok(Element::Water),
            "light" => Ok(Element::Light),
            "dark" => Ok(Element::Dark),
            _ => Err(PlannerError::UnknownElement(s.to_string())),
        }
    }
}

/// Stat boosted by a leader skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Attribute {
    Hp,
    Atk,
    Def,
    Spd,
    CritRate,
    Resist,
    Accuracy,
    CritDmg,
}

impl Attribute {
    pub fn code(self) -> i64 {
        match self {
            Attribute::Hp => 1,
            Attribute::Atk => 2,
            Attribute::Def => 3,
            Attribute::Spd => 4,
            Attribute::CritRate => 5,
            Attribute::Resist => 6,
            Attribute::Accuracy => 7,
            Attribute::CritDmg => 8,
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Attribute::Hp => "HP",
            Attribute::Atk => "Attack Power",
            Attribute::Def => "Defense",
            Attribute::Spd => "Attack Speed",
            Attribute::CritRate => "Critical Rate",
            Attribute::Resist => "Resistance",
            Attribute::Accuracy => "Accuracy",
            Attribute::CritDmg => "Critical DMG",
        }
    }
}

impl TryFrom<i64> for Attribute {
    type Error = PlannerError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Attribute::Hp),
            2 => Ok(Attribute::Atk),
            3 => Ok(Attribute::Def),
            4 => Ok(Attribute::Spd),
            5 => Ok(Attribute::CritRate),
            6 => Ok(Attribute::Resist),
            7 => Ok(Attribute::Accuracy),
            8 => Ok(Attribute::CritDmg),
            other => Err(PlannerError::UnknownAttribute(other)),
        }
    }
}

impl From<Attribute> for i64 {
    fn from(attribute: Attribute) -> Self {
        attribute.code()
    }
}

/// Where a leader skill takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Area {
    General,
    Dungeon,
    Element,
    Arena,
    Guild,
}

impl Area {
    pub fn code(self) -> i64 {
        match self {
            Area::General => 1,
            Area::Dungeon => 2,
            Area::Element => 3,
            Area::Arena => 4,
            Area::Guild => 5,
        }
    }
}

impl TryFrom<i64> for Area {
    type Error = PlannerError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Area::General),
            2 => Ok(Area::Dungeon),
            3 => Ok(Area::Element),
            4 => Ok(Area::Arena),
            5 => Ok(Area::Guild),
            other => Err(PlannerError::UnknownArea(other)),
        }
    }
}

impl From<Area> for i64 {
    fn from(area: Area) -> Self {
        area.code()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum DungeonCategory {
    Scenario,
    RuneDungeon,
    EssenceDungeon,
    OtherDungeon,
    Raid,
    HallOfHeroes,
}

impl DungeonCategory {
    pub fn code(self) -> i64 {
        match self {
            DungeonCategory::Scenario => 0,
            DungeonCategory::RuneDungeon => 1,
            DungeonCategory::EssenceDungeon => 2,
            DungeonCategory::OtherDungeon => 3,
            DungeonCategory::Raid => 4,
            DungeonCategory::HallOfHeroes => 5,
        }
    }
}

impl TryFrom<i64> for DungeonCategory {
    type Error = PlannerError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(DungeonCategory::Scenario),
            1 => Ok(DungeonCategory::RuneDungeon),
            2 => Ok(DungeonCategory::EssenceDungeon),
            3 => Ok(DungeonCategory::OtherDungeon),
            4 => Ok(DungeonCategory::Raid),
            5 => Ok(DungeonCategory::HallOfHeroes),
            other => Err(PlannerError::UnknownCategory(other)),
        }
    }
}

impl From<DungeonCategory> for i64 {
    fn from(category: DungeonCategory) -> Self {
        category.code()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderSkill {
    pub attribute: Attribute,
    /// Bonus in percent.
    pub amount: i64,
    pub area: Area,
    /// Restricts the bonus to monsters of one element.
    pub element: Option<Element>,
}

impl LeaderSkill {
    /// Whether the skill has an effect in a team planned for a dungeon of the
    /// given category.
    pub fn is_active_in(&self, category: Option<DungeonCategory>) -> bool {
        match self.area {
            Area::General | Area::Element => true,
            Area::Arena | Area::Guild => false,
            Area::Dungeon => matches!(
                category,
                Some(
                    DungeonCategory::RuneDungeon
                        | DungeonCategory::EssenceDungeon
                        | DungeonCategory::Raid
                        | DungeonCategory::HallOfHeroes
                )
            ),
        }
    }

    pub fn applies_to(&self, element: Element) -> bool {
        self.element.map_or(true, |restricted| restricted == element)
    }

    /// Stat target fields lowered by this skill's bonus.
    fn adjusted_fields<'a>(&self, targets: &'a mut StatTargets) -> Vec<&'a mut Option<i64>> {
        match self.attribute {
            Attribute::Spd => vec![&mut targets.min_spd],
            Attribute::Hp => vec![&mut targets.min_hp],
            Attribute::Def => vec![&mut targets.min_def],
            Attribute::Atk | Attribute::CritDmg => Vec::new(),
            Attribute::CritRate => vec![&mut targets.min_crate, &mut targets.max_crate],
            Attribute::Accuracy => vec![&mut targets.min_acc],
            Attribute::Resist => vec![&mut targets.min_res],
        }
    }
}

impl fmt::Display for LeaderSkill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let condition = match self.area {
            Area::Dungeon => "in the Dungeons ".to_string(),
            Area::Arena => "in the Arena ".to_string(),
            Area::Guild => "in Guild Content ".to_string(),
            Area::Element => match self.element {
                Some(element) => format!("with {} attribute ", element.as_str()),
                None => String::new(),
            },
            Area::General => String::new(),
        };
        write!(
            f,
            "Increase the {} of ally monsters {}by {}%",
            self.attribute.display_name(),
            condition,
            self.amount
        )
    }
}

/// Convert buffed stat requirements into the unbuffed requirement a rune
/// build has to reach once `skill` is applied to a monster of `element`.
///
/// Only fields that are already set are lowered. Area gating is the
/// caller's job, see [`LeaderSkill::is_active_in`].
pub fn apply_leader_adjustment(
    targets: &StatTargets,
    skill: Option<&LeaderSkill>,
    element: Element,
) -> StatTargets {
    let mut adjusted = targets.clone();
    let Some(skill) = skill else {
        return adjusted;
    };
    if !skill.applies_to(element) {
        return adjusted;
    }

    for field in skill.adjusted_fields(&mut adjusted) {
        if let Some(value) = field {
            *value = value.saturating_sub(skill.amount);
        }
    }
    adjusted
}
