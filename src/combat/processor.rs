//! Reduces a raw attack timeline into a single battle-run summary, and scores
//! crew-on-ship compatibility.

use serde::{Deserialize, Serialize};

use crate::combat::simulator::{seat_crew, AttackInstant, BattleMode};
use crate::data::crew::CrewMember;
use crate::data::ship::Ship;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrewRole {
    Offense,
    Defense,
}

/// Whether a crew member's ability can be seated and/or triggered on a ship.
/// `score` is additive: 0.75 for a seatable skill, 0.25 for a triggerable (or
/// absent) activation condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShipCompat {
    pub score: f64,
    pub seat: bool,
    pub trigger: bool,
}

/// Compatibility of one crew member on one ship. A condition is triggerable
/// when some ship action grants the required status.
pub fn ship_compat(member: &CrewMember, ship: &Ship) -> ShipCompat {
    let seat = ship.can_seat(&member.skill_order);
    let trigger = match member.action.condition() {
        Some(condition) => ship
            .actions
            .iter()
            .any(|action| action.status == Some(condition)),
        None => true,
    };
    let mut score = 0.0;
    if seat {
        score += 0.75;
    }
    if trigger {
        score += 0.25;
    }
    ShipCompat { score, seat, trigger }
}

/// Reduced summary of one simulated battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleRun {
    pub id: u64,
    pub ship: String,
    /// None for crewless reference battles.
    pub crew: Option<String>,
    pub boss: Option<u8>,
    pub opponent: Option<String>,
    pub division: u32,
    pub damage: f64,
    pub min_damage: f64,
    pub max_damage: f64,
    pub duration: f64,
    /// Front-loading metric: sum of per-second attack rate over seconds.
    pub arena_metric: f64,
    pub seated: Vec<String>,
    pub compat: ShipCompat,
    pub battle: BattleMode,
    pub role: CrewRole,
    pub win: bool,
    pub reference_battle: bool,
}

impl BattleRun {
    /// Bucket key: boss id for FBB runs, division otherwise.
    pub fn group(&self) -> u32 {
        match self.battle {
            BattleMode::Fbb => self.boss.unwrap_or(0) as u32,
            BattleMode::Arena => self.division,
        }
    }
}

/// Damage/duration/win reduction of one timeline. The orchestrator attaches
/// battle context to build the full [BattleRun].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSummary {
    pub damage: f64,
    pub min_damage: f64,
    pub max_damage: f64,
    pub duration: f64,
    pub arena_metric: f64,
    pub seated: Vec<String>,
    pub win: bool,
}

/// Reduce a timeline. Empty input means "no valid battle" and returns None;
/// callers must not treat that as an error.
pub fn process_battle_run(
    attacks: &[AttackInstant],
    ship: &Ship,
    crew: &[&CrewMember],
) -> Option<BattleSummary> {
    if attacks.is_empty() {
        return None;
    }

    let mut damage = 0.0;
    let mut min_damage = 0.0;
    let mut max_damage = 0.0;
    let mut duration: f64 = 0.0;
    let mut arena_metric = 0.0;
    let mut win = false;

    for instant in attacks {
        damage += instant.damage;
        min_damage += instant.min_damage;
        max_damage += instant.max_damage;
        duration = duration.max(instant.second);
        if instant.second > 0.0 {
            arena_metric += instant.attack / instant.second;
        }
        win |= instant.win;
    }

    let seated = seat_crew(ship, crew, false)
        .into_iter()
        .flatten()
        .map(|member| member.symbol.clone())
        .collect();

    Some(BattleSummary {
        damage,
        min_damage,
        max_damage,
        duration,
        arena_metric,
        seated,
        win,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::action::{
        ActionAbility, ActionSource, AbilityKind, BonusStat, ShipAction, ShipStatus, Skill,
    };
    use crate::data::ship::BattleStation;

    fn sample(second: f64, damage: f64, win: bool) -> AttackInstant {
        AttackInstant {
            second,
            damage,
            min_damage: damage * 0.5,
            max_damage: damage * 2.0,
            attack: damage * 10.0,
            win,
            actions: Vec::new(),
        }
    }

    fn bare_ship() -> Ship {
        Ship {
            symbol: "cutter".into(),
            name: "Cutter".into(),
            rarity: 2,
            hull: 10_000.0,
            attack: 5_000.0,
            accuracy: 5_000.0,
            evasion: 5_000.0,
            crit_chance: 0.0,
            crit_bonus: 0.0,
            attacks_per_second: 1.0,
            battle_stations: vec![BattleStation {
                skill: Skill::Science,
                crew: None,
            }],
            actions: Vec::new(),
        }
    }

    fn scientist(condition: Option<ShipStatus>) -> CrewMember {
        CrewMember {
            symbol: "scientist".into(),
            name: "Scientist".into(),
            max_rarity: 3,
            skill_order: vec![Skill::Science],
            action: ShipAction {
                symbol: "scan_pulse".into(),
                name: "Scan Pulse".into(),
                source: ActionSource::Crew {
                    symbol: "scientist".into(),
                },
                bonus_stat: BonusStat::Accuracy,
                bonus_amount: 2,
                ability: Some(ActionAbility {
                    kind: AbilityKind::Damage,
                    amount: 25.0,
                    condition,
                }),
                penalty: None,
                status: None,
                initial_cooldown: 0.0,
                cooldown: 6.0,
                duration: 3.0,
                limit: None,
                charge_phases: Vec::new(),
            },
        }
    }

    #[test]
    fn empty_timeline_reduces_to_none() {
        assert!(process_battle_run(&[], &bare_ship(), &[]).is_none());
    }

    #[test]
    fn battle_time_is_the_max_sample_second() {
        let attacks = vec![sample(0.1, 10.0, false), sample(0.2, 10.0, false), sample(0.3, 10.0, true)];
        let summary = process_battle_run(&attacks, &bare_ship(), &[]).unwrap();
        assert_eq!(summary.duration, 0.3);
        assert_eq!(summary.damage, 30.0);
        assert!(summary.win);
    }

    #[test]
    fn front_loaded_damage_scores_a_higher_metric() {
        let early = vec![sample(0.1, 20.0, false), sample(0.2, 0.0, false)];
        let late = vec![sample(0.1, 0.0, false), sample(0.2, 20.0, false)];
        let ship = bare_ship();
        let early_metric = process_battle_run(&early, &ship, &[]).unwrap().arena_metric;
        let late_metric = process_battle_run(&late, &ship, &[]).unwrap().arena_metric;
        assert!(early_metric > late_metric);
    }

    #[test]
    fn compat_combines_seat_and_trigger_flags() {
        let ship = bare_ship();

        let plain = scientist(None);
        let compat = ship_compat(&plain, &ship);
        assert_eq!(compat.score, 1.0);

        let conditional = scientist(Some(ShipStatus::Cloaked));
        let compat = ship_compat(&conditional, &ship);
        assert!(compat.seat && !compat.trigger);
        assert_eq!(compat.score, 0.75);

        let mut cloaking_ship = ship.clone();
        cloaking_ship.actions.push(ShipAction {
            symbol: "cloak".into(),
            name: "Cloak".into(),
            source: ActionSource::Ship {
                symbol: cloaking_ship.symbol.clone(),
            },
            bonus_stat: BonusStat::Evasion,
            bonus_amount: 1,
            ability: None,
            penalty: None,
            status: Some(ShipStatus::Cloaked),
            initial_cooldown: 0.0,
            cooldown: 10.0,
            duration: 5.0,
            limit: None,
            charge_phases: Vec::new(),
        });
        let compat = ship_compat(&conditional, &cloaking_ship);
        assert_eq!(compat.score, 1.0);

        let mut misseated = scientist(Some(ShipStatus::Cloaked));
        misseated.skill_order = vec![Skill::Medicine];
        let compat = ship_compat(&misseated, &ship);
        assert_eq!(compat.score, 0.0);
        let compat = ship_compat(&misseated, &cloaking_ship);
        assert_eq!(compat.score, 0.25);
    }
}
