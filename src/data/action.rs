//! Ability definitions shared by ships and crew: stat bonuses, triggered
//! abilities, granted statuses, and charge-phase escalation.
//!
//! All codes are part of the on-disk format. Unknown codes are load errors,
//! never silent defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Battle station skill requirement codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Skill {
    Command,
    Diplomacy,
    Engineering,
    Security,
    Science,
    Medicine,
}

impl TryFrom<u8> for Skill {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Command),
            1 => Ok(Self::Diplomacy),
            2 => Ok(Self::Engineering),
            3 => Ok(Self::Security),
            4 => Ok(Self::Science),
            5 => Ok(Self::Medicine),
            other => Err(format!("unknown skill code {other}")),
        }
    }
}

impl From<Skill> for u8 {
    fn from(skill: Skill) -> u8 {
        match skill {
            Skill::Command => 0,
            Skill::Diplomacy => 1,
            Skill::Engineering => 2,
            Skill::Security => 3,
            Skill::Science => 4,
            Skill::Medicine => 5,
        }
    }
}

impl fmt::Display for Skill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Command => "command",
            Self::Diplomacy => "diplomacy",
            Self::Engineering => "engineering",
            Self::Security => "security",
            Self::Science => "science",
            Self::Medicine => "medicine",
        };
        write!(f, "{name}")
    }
}

/// Which condensed stat a bonus (or penalty) applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BonusStat {
    Attack,
    Evasion,
    Accuracy,
}

impl TryFrom<u8> for BonusStat {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Attack),
            1 => Ok(Self::Evasion),
            2 => Ok(Self::Accuracy),
            other => Err(format!("unknown bonus stat code {other}")),
        }
    }
}

impl From<BonusStat> for u8 {
    fn from(stat: BonusStat) -> u8 {
        match stat {
            BonusStat::Attack => 0,
            BonusStat::Evasion => 1,
            BonusStat::Accuracy => 2,
        }
    }
}

/// Triggered ability kinds. The numeric codes are fixed by the data format;
/// the gaps are codes retired upstream and intentionally rejected here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AbilityKind {
    /// Amplifies the owning action's own stat bonus while active.
    BonusBoost,
    /// Immediate burst damage as a percentage of the current attack value.
    Damage,
    /// Immediate hull repair as a percentage of max hull.
    HullRepair,
    /// Adds crit chance rating while active.
    CritChance,
    /// Adds crit bonus rating while active.
    CritBonus,
    /// Percentage boost to attacks per second while active.
    AttackSpeed,
    /// Percentage damage boost while active.
    ShieldPenetration,
    /// On activation, adds seconds to every other initialized, inactive slot's
    /// state time, pulling their next activation earlier.
    GrantExtraTime,
}

impl TryFrom<u8> for AbilityKind {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::BonusBoost),
            1 => Ok(Self::Damage),
            2 => Ok(Self::HullRepair),
            4 => Ok(Self::CritChance),
            5 => Ok(Self::CritBonus),
            7 => Ok(Self::AttackSpeed),
            9 => Ok(Self::ShieldPenetration),
            10 => Ok(Self::GrantExtraTime),
            other => Err(format!("unknown ability kind code {other}")),
        }
    }
}

impl From<AbilityKind> for u8 {
    fn from(kind: AbilityKind) -> u8 {
        match kind {
            AbilityKind::BonusBoost => 0,
            AbilityKind::Damage => 1,
            AbilityKind::HullRepair => 2,
            AbilityKind::CritChance => 4,
            AbilityKind::CritBonus => 5,
            AbilityKind::AttackSpeed => 7,
            AbilityKind::ShieldPenetration => 9,
            AbilityKind::GrantExtraTime => 10,
        }
    }
}

/// Statuses an action can grant while active, or require as its activation
/// condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ShipStatus {
    /// Advantageous position: crits are guaranteed while held.
    Position,
    /// Cloaked: in arena battles neither side deals damage.
    Cloaked,
    /// Boarding: +50% attack while held.
    Boarding,
}

impl TryFrom<u8> for ShipStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Position),
            2 => Ok(Self::Cloaked),
            4 => Ok(Self::Boarding),
            other => Err(format!("unknown ship status code {other}")),
        }
    }
}

impl From<ShipStatus> for u8 {
    fn from(status: ShipStatus) -> u8 {
        match status {
            ShipStatus::Position => 1,
            ShipStatus::Cloaked => 2,
            ShipStatus::Boarding => 4,
        }
    }
}

/// Exactly one of ship or crew owns an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    Ship { symbol: String },
    Crew { symbol: String },
}

impl ActionSource {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Ship { symbol } | Self::Crew { symbol } => symbol,
        }
    }

    pub fn is_crew(&self) -> bool {
        matches!(self, Self::Crew { .. })
    }
}

/// Triggered part of an action. `condition` gates activation on a status being
/// present on the own ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionAbility {
    #[serde(rename = "type")]
    pub kind: AbilityKind,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ShipStatus>,
}

/// Negative side effect applied while the action is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionPenalty {
    pub stat: BonusStat,
    pub amount: i32,
}

/// One escalation step of a charge-phase action. Absent fields keep the
/// previous phase's value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChargePhase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_amount: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability_amount: Option<f64>,
}

/// An ability instance owned by a ship or a seated crew member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipAction {
    pub symbol: String,
    pub name: String,
    pub source: ActionSource,
    pub bonus_stat: BonusStat,
    /// Bonus in condensed tier units, not a raw percentage.
    pub bonus_amount: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability: Option<ActionAbility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty: Option<ActionPenalty>,
    /// Status granted while this action is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ShipStatus>,
    #[serde(default)]
    pub initial_cooldown: f64,
    pub cooldown: f64,
    pub duration: f64,
    /// Max activations per battle. None = unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charge_phases: Vec<ChargePhase>,
}

impl ShipAction {
    /// Passive actions carry only a stat bonus and no triggered ability.
    pub fn is_passive(&self) -> bool {
        self.ability.is_none()
    }

    pub fn condition(&self) -> Option<ShipStatus> {
        self.ability.as_ref().and_then(|ability| ability.condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retired_ability_codes_are_rejected() {
        for code in [3u8, 6, 8, 11, 255] {
            assert!(AbilityKind::try_from(code).is_err(), "code {code} must not parse");
        }
        assert_eq!(AbilityKind::try_from(2).unwrap(), AbilityKind::HullRepair);
        assert_eq!(AbilityKind::try_from(10).unwrap(), AbilityKind::GrantExtraTime);
    }

    #[test]
    fn action_source_names_exactly_one_owner() {
        let raw = r#"{"crew":{"symbol":"torres"}}"#;
        let source: ActionSource = serde_json::from_str(raw).unwrap();
        assert!(source.is_crew());
        assert_eq!(source.symbol(), "torres");
    }

    #[test]
    fn charge_phase_fields_are_optional() {
        let raw = r#"{"cooldown": 4.0}"#;
        let phase: ChargePhase = serde_json::from_str(raw).unwrap();
        assert_eq!(phase.cooldown, Some(4.0));
        assert_eq!(phase.bonus_amount, None);
        assert_eq!(phase.ability_amount, None);
    }
}
