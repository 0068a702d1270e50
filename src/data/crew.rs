//! Crew collection: skills, rarity, and the single ship ability each crew
//! member brings to a battle station.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::action::{ShipAction, Skill};

pub const DEFAULT_CREW_PATH: &str = "data/crew.json";

/// Read-only crew template, referenced by symbol throughout. The simulator
/// never mutates these; charge-phase escalation happens on per-battle slot
/// copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewMember {
    pub symbol: String,
    pub name: String,
    pub max_rarity: u8,
    /// Skills in proficiency order; seat matching walks this list.
    pub skill_order: Vec<Skill>,
    pub action: ShipAction,
}

impl CrewMember {
    /// Crew whose ability repairs hull (or who only boost evasion) are scored
    /// in the defense role; everyone else is offense.
    pub fn is_defensive(&self) -> bool {
        use crate::data::action::{AbilityKind, BonusStat};
        match &self.action.ability {
            Some(ability) => ability.kind == AbilityKind::HullRepair,
            None => self.action.bonus_stat == BonusStat::Evasion,
        }
    }
}

/// Load the crew collection (one JSON array).
pub fn load_crew_collection(path: impl AsRef<Path>) -> Result<Vec<CrewMember>, std::io::Error> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::action::{
        ActionAbility, ActionSource, AbilityKind, BonusStat, ShipAction,
    };

    fn crew_with_ability(kind: Option<AbilityKind>, bonus_stat: BonusStat) -> CrewMember {
        CrewMember {
            symbol: "test_crew".into(),
            name: "Test Crew".into(),
            max_rarity: 4,
            skill_order: vec![Skill::Command],
            action: ShipAction {
                symbol: "test_crew_action".into(),
                name: "Test Action".into(),
                source: ActionSource::Crew {
                    symbol: "test_crew".into(),
                },
                bonus_stat,
                bonus_amount: 2,
                ability: kind.map(|kind| ActionAbility {
                    kind,
                    amount: 10.0,
                    condition: None,
                }),
                penalty: None,
                status: None,
                initial_cooldown: 0.0,
                cooldown: 10.0,
                duration: 5.0,
                limit: None,
                charge_phases: Vec::new(),
            },
        }
    }

    #[test]
    fn hull_repair_crew_are_defensive() {
        assert!(crew_with_ability(Some(AbilityKind::HullRepair), BonusStat::Attack).is_defensive());
        assert!(!crew_with_ability(Some(AbilityKind::Damage), BonusStat::Attack).is_defensive());
    }

    #[test]
    fn passive_evasion_crew_are_defensive() {
        assert!(crew_with_ability(None, BonusStat::Evasion).is_defensive());
        assert!(!crew_with_ability(None, BonusStat::Attack).is_defensive());
    }
}
