// Composite builder: folds several team plans into a single plan, one slot
// per roster monster, with every team's speed tuning carried over.

use std::collections::HashMap;

use super::leader::{apply_leader_adjustment, DungeonCategory, Element, LeaderSkill};
use super::model::{SpeedTune, StatTargets, Team, TeamMonster, TuneKind};
use super::PlannerError;

/// A team slot together with the bestiary data the builder needs.
#[derive(Debug, Clone)]
pub struct SourceMonster {
    pub slot: TeamMonster,
    pub element: Element,
    /// Leader skill of the slot's bestiary monster, used when the slot leads.
    pub leader_skill: Option<LeaderSkill>,
}

#[derive(Debug, Clone)]
pub struct SourceTeam {
    pub team: Team,
    pub dungeon_category: Option<DungeonCategory>,
    pub monsters: Vec<SourceMonster>,
    /// Incoming speed tunes of every slot in the team.
    pub tunes: Vec<SpeedTune>,
}

impl SourceTeam {
    /// The leader skill that is in effect for this team, if any.
    pub fn active_leader_skill(&self) -> Option<&LeaderSkill> {
        let mut leaders = self.monsters.iter().filter(|m| m.slot.leader);
        let Some(leader) = leaders.next() else {
            tracing::debug!(team_id = self.team.id, "Team has no leader slot");
            return None;
        };
        if leaders.next().is_some() {
            tracing::warn!(
                team_id = self.team.id,
                leader_slot = leader.slot.id,
                "Team has more than one leader slot, using the first"
            );
        }
        leader
            .leader_skill
            .as_ref()
            .filter(|skill| skill.is_active_in(self.dungeon_category))
    }
}

/// Merged targets for one roster monster. Composite slots never lead.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeMonster {
    pub monster_id: i64,
    pub targets: StatTargets,
}

/// A speed tune re-pointed at roster monster ids.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeTune {
    pub slower_than: i64,
    pub faster_than: i64,
    pub kind: TuneKind,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositePlan {
    /// In order of first appearance.
    pub monsters: Vec<CompositeMonster>,
    /// Every source tune, duplicates included.
    pub tunes: Vec<CompositeTune>,
}

/// Merge `sources` into one plan.
///
/// Each slot's targets are first compensated for its own team's leader skill,
/// then folded per roster monster keeping the stricter bound. Sources are
/// processed in slice order; the order only decides which record seeds a
/// roster monster's entry.
pub fn make_composite(sources: &[SourceTeam]) -> Result<CompositePlan, PlannerError> {
    let mut plan = CompositePlan::default();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for source in sources {
        let leader_skill = source.active_leader_skill();
        if let Some(skill) = leader_skill {
            tracing::debug!(team_id = source.team.id, %skill, "Compensating for leader skill");
        }

        // slot id -> roster monster id, to re-point this team's tunes
        let roster: HashMap<i64, i64> = source
            .monsters
            .iter()
            .map(|m| (m.slot.id, m.slot.monster_id))
            .collect();

        for monster in &source.monsters {
            let targets =
                apply_leader_adjustment(&monster.slot.targets, leader_skill, monster.element);
            match index.get(&monster.slot.monster_id) {
                Some(&i) => plan.monsters[i].targets.reconcile(&targets),
                None => {
                    index.insert(monster.slot.monster_id, plan.monsters.len());
                    plan.monsters.push(CompositeMonster {
                        monster_id: monster.slot.monster_id,
                        targets,
                    });
                }
            }
        }

        for tune in &source.tunes {
            let lookup = |slot: i64| {
                roster.get(&slot).copied().ok_or(PlannerError::CrossTeamEdge {
                    edge: tune.id,
                    monster: slot,
                })
            };
            plan.tunes.push(CompositeTune {
                slower_than: lookup(tune.slower_than)?,
                faster_than: lookup(tune.faster_than)?,
                kind: tune.kind,
                amount: tune.amount,
            });
        }
    }

    Ok(plan)
}
