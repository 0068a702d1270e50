//! Startup-loaded fleet data (GameData). Load once, pass via Arc to the
//! orchestrator and workers; an explicit context instead of process-wide
//! mutable state, so concurrent computations cannot corrupt each other.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::data::crew::{load_crew_collection, CrewMember};
use crate::data::ship::{load_ship_schematics, Ship};

/// Read-only registry of ships and crew with symbol indexes.
#[derive(Debug)]
pub struct GameData {
    ships: Vec<Ship>,
    crew: Vec<CrewMember>,
    ship_index: HashMap<String, usize>,
    crew_index: HashMap<String, usize>,
}

impl GameData {
    pub fn load(
        ships_path: impl AsRef<Path>,
        crew_path: impl AsRef<Path>,
    ) -> Result<Arc<GameData>, std::io::Error> {
        let ships = load_ship_schematics(ships_path)?;
        let crew = load_crew_collection(crew_path)?;
        Ok(Arc::new(Self::from_parts(ships, crew)))
    }

    /// Build a registry from in-memory collections (tests, synthetic fleets).
    pub fn from_parts(ships: Vec<Ship>, crew: Vec<CrewMember>) -> GameData {
        let ship_index = ships
            .iter()
            .enumerate()
            .map(|(index, ship)| (ship.symbol.clone(), index))
            .collect();
        let crew_index = crew
            .iter()
            .enumerate()
            .map(|(index, member)| (member.symbol.clone(), index))
            .collect();
        GameData {
            ships,
            crew,
            ship_index,
            crew_index,
        }
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn crew(&self) -> &[CrewMember] {
        &self.crew
    }

    pub fn ship(&self, symbol: &str) -> Option<&Ship> {
        self.ship_index.get(symbol).map(|&index| &self.ships[index])
    }

    pub fn crew_member(&self, symbol: &str) -> Option<&CrewMember> {
        self.crew_index.get(symbol).map(|&index| &self.crew[index])
    }

    /// Ships sorted by descending desirability; the opponent-scan order.
    pub fn ships_by_desirability(&self) -> Vec<&Ship> {
        let mut ordered: Vec<&Ship> = self.ships.iter().collect();
        ordered.sort_by(|left, right| {
            right
                .desirability()
                .total_cmp(&left.desirability())
                .then_with(|| left.symbol.cmp(&right.symbol))
        });
        ordered
    }

    /// The next same-division ship after `ship` in desirability order,
    /// wrapping around; None when the ship is alone in its division.
    pub fn next_opponent_in_division(&self, ship: &Ship) -> Option<&Ship> {
        let ordered = self.ships_by_desirability();
        let position = ordered
            .iter()
            .position(|candidate| candidate.symbol == ship.symbol)?;
        let division = ship.division();
        ordered
            .iter()
            .cycle()
            .skip(position + 1)
            .take(ordered.len().saturating_sub(1))
            .find(|candidate| candidate.division() == division)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ship::Ship;

    fn bare_ship(symbol: &str, rarity: u8, attack: f64) -> Ship {
        Ship {
            symbol: symbol.into(),
            name: symbol.to_uppercase(),
            rarity,
            hull: 100_000.0,
            attack,
            accuracy: 10_000.0,
            evasion: 10_000.0,
            crit_chance: 0.0,
            crit_bonus: 0.0,
            attacks_per_second: 1.0,
            battle_stations: Vec::new(),
            actions: Vec::new(),
        }
    }

    #[test]
    fn next_opponent_stays_in_division_and_wraps() {
        let data = GameData::from_parts(
            vec![
                bare_ship("alpha", 5, 90_000.0),
                bare_ship("beta", 5, 50_000.0),
                bare_ship("gamma", 2, 70_000.0),
            ],
            Vec::new(),
        );

        // Order by desirability: alpha, gamma, beta. Beta wraps back to alpha.
        let alpha = data.ship("alpha").unwrap();
        assert_eq!(data.next_opponent_in_division(alpha).unwrap().symbol, "beta");
        let beta = data.ship("beta").unwrap();
        assert_eq!(data.next_opponent_in_division(beta).unwrap().symbol, "alpha");
        let gamma = data.ship("gamma").unwrap();
        assert!(data.next_opponent_in_division(gamma).is_none());
    }
}
