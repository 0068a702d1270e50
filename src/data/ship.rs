//! Ship schematics: base combat ratings, battle station layout, ship-level
//! actions, plus the fixed boss table and division mapping.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::action::{ShipAction, Skill};

pub const DEFAULT_SHIPS_PATH: &str = "data/ship_schematics.json";

/// A crew seat with a required skill. `crew` is only populated on staffed
/// working copies, never in the schematic file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleStation {
    pub skill: Skill,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crew: Option<String>,
}

/// Read-only ship template. Simulation never mutates these; per-battle state
/// (hull, slot timers, seated crew) lives in the simulator's working state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    pub symbol: String,
    pub name: String,
    pub rarity: u8,
    pub hull: f64,
    pub attack: f64,
    pub accuracy: f64,
    pub evasion: f64,
    pub crit_chance: f64,
    pub crit_bonus: f64,
    pub attacks_per_second: f64,
    #[serde(default)]
    pub battle_stations: Vec<BattleStation>,
    #[serde(default)]
    pub actions: Vec<ShipAction>,
}

impl Ship {
    /// Arena bracket: rarity 1-2 fight in division 1, 3-4 in 2, 5 in 3.
    pub fn division(&self) -> u32 {
        match self.rarity {
            0..=2 => 1,
            3 | 4 => 2,
            _ => 3,
        }
    }

    /// Desirability metric used to order the ship list when picking the
    /// "next opponent in division".
    pub fn desirability(&self) -> f64 {
        self.attack * self.attacks_per_second + self.hull / 10.0
    }

    /// True if any station accepts one of the crew member's skills.
    pub fn can_seat(&self, skills: &[Skill]) -> bool {
        self.battle_stations
            .iter()
            .any(|station| skills.contains(&station.skill))
    }
}

/// Fleet boss tiers, hardest last. Stats are flat (no ability slots).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boss {
    pub id: u8,
    pub name: &'static str,
    /// Inclusive ship-rarity range allowed to queue for this boss.
    pub min_rarity: u8,
    pub max_rarity: u8,
    pub hull: f64,
    pub attack: f64,
    pub accuracy: f64,
    pub evasion: f64,
    pub crit_chance: f64,
    pub crit_bonus: f64,
    pub attacks_per_second: f64,
}

/// Boss eligibility is keyed on ship rarity; ids 5 and 6 are reserved for
/// rarity-5 ships.
pub const BOSSES: [Boss; 6] = [
    Boss {
        id: 1,
        name: "Easy",
        min_rarity: 1,
        max_rarity: 3,
        hull: 2_000_000.0,
        attack: 18_000.0,
        accuracy: 12_000.0,
        evasion: 6_000.0,
        crit_chance: 1_000.0,
        crit_bonus: 1_000.0,
        attacks_per_second: 0.8,
    },
    Boss {
        id: 2,
        name: "Normal",
        min_rarity: 1,
        max_rarity: 4,
        hull: 5_000_000.0,
        attack: 30_000.0,
        accuracy: 18_000.0,
        evasion: 9_000.0,
        crit_chance: 1_500.0,
        crit_bonus: 1_500.0,
        attacks_per_second: 0.8,
    },
    Boss {
        id: 3,
        name: "Hard",
        min_rarity: 2,
        max_rarity: 5,
        hull: 12_000_000.0,
        attack: 45_000.0,
        accuracy: 27_000.0,
        evasion: 15_000.0,
        crit_chance: 2_000.0,
        crit_bonus: 2_000.0,
        attacks_per_second: 0.9,
    },
    Boss {
        id: 4,
        name: "Brutal",
        min_rarity: 3,
        max_rarity: 5,
        hull: 30_000_000.0,
        attack: 66_000.0,
        accuracy: 39_000.0,
        evasion: 24_000.0,
        crit_chance: 3_000.0,
        crit_bonus: 3_000.0,
        attacks_per_second: 0.9,
    },
    Boss {
        id: 5,
        name: "Nightmare",
        min_rarity: 5,
        max_rarity: 5,
        hull: 80_000_000.0,
        attack: 90_000.0,
        accuracy: 54_000.0,
        evasion: 36_000.0,
        crit_chance: 4_000.0,
        crit_bonus: 4_000.0,
        attacks_per_second: 1.0,
    },
    Boss {
        id: 6,
        name: "Ultra-Nightmare",
        min_rarity: 5,
        max_rarity: 5,
        hull: 200_000_000.0,
        attack: 120_000.0,
        accuracy: 72_000.0,
        evasion: 48_000.0,
        crit_chance: 5_000.0,
        crit_bonus: 5_000.0,
        attacks_per_second: 1.0,
    },
];

/// Bosses a ship of the given rarity may fight, in ascending tier order.
pub fn eligible_bosses(rarity: u8) -> Vec<&'static Boss> {
    BOSSES
        .iter()
        .filter(|boss| rarity >= boss.min_rarity && rarity <= boss.max_rarity)
        .collect()
}

pub fn boss_by_id(id: u8) -> Option<&'static Boss> {
    BOSSES.iter().find(|boss| boss.id == id)
}

/// Load the ship schematics collection (one JSON array).
pub fn load_ship_schematics(path: impl AsRef<Path>) -> Result<Vec<Ship>, std::io::Error> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(std::io::Error::other)
}
