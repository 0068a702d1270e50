//! Greedy multi-pass battle-station staffing: fill seats honoring skill
//! requirements and ability-kind quotas, then progressively relax the
//! constraints until every seat that can be filled is filled.

use crate::combat::simulator::BattleMode;
use crate::data::action::AbilityKind;
use crate::data::crew::CrewMember;
use crate::data::ship::Ship;

/// Informal ability buckets used by the quota heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityCategory {
    Boom,
    Crit,
    Heal,
    Other,
}

pub fn ability_category(member: &CrewMember) -> AbilityCategory {
    match member.action.ability.as_ref().map(|ability| ability.kind) {
        Some(AbilityKind::Damage) | Some(AbilityKind::ShieldPenetration) => AbilityCategory::Boom,
        Some(AbilityKind::CritChance) | Some(AbilityKind::CritBonus) => AbilityCategory::Crit,
        Some(AbilityKind::HullRepair) => AbilityCategory::Heal,
        _ => AbilityCategory::Other,
    }
}

/// Target mix of ability kinds for a lineup. Boss fights want sustain; arena
/// wants burst. A 4-station FBB ship resolves to 1 boom + 1 crit + 2 heal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityQuota {
    pub boom: usize,
    pub crit: usize,
    pub heal: usize,
}

pub fn quota_for(stations: usize, mode: BattleMode) -> AbilityQuota {
    let crit = usize::from(stations >= 2);
    let heal = match mode {
        BattleMode::Fbb => stations / 2,
        BattleMode::Arena => stations / 4,
    };
    AbilityQuota {
        boom: stations.saturating_sub(crit + heal),
        crit,
        heal,
    }
}

impl AbilityQuota {
    fn available(&self, category: AbilityCategory) -> bool {
        match category {
            AbilityCategory::Boom => self.boom > 0,
            AbilityCategory::Crit => self.crit > 0,
            AbilityCategory::Heal => self.heal > 0,
            AbilityCategory::Other => true,
        }
    }

    fn take(&mut self, category: AbilityCategory) {
        match category {
            AbilityCategory::Boom => self.boom = self.boom.saturating_sub(1),
            AbilityCategory::Crit => self.crit = self.crit.saturating_sub(1),
            AbilityCategory::Heal => self.heal = self.heal.saturating_sub(1),
            AbilityCategory::Other => {}
        }
    }
}

/// A scored member of the staffing pool. `vs_opponent` carries the
/// opponent-specific metric when staffing against a known opponent.
#[derive(Debug, Clone, Copy)]
pub struct StaffCandidate<'a> {
    pub crew: &'a CrewMember,
    pub score: f64,
    pub vs_opponent: Option<f64>,
}

fn category_rank(category: AbilityCategory) -> u8 {
    match category {
        AbilityCategory::Boom => 0,
        AbilityCategory::Crit => 1,
        AbilityCategory::Heal => 2,
        AbilityCategory::Other => 3,
    }
}

fn candidate_order(left: &StaffCandidate<'_>, right: &StaffCandidate<'_>) -> std::cmp::Ordering {
    let left_category = category_rank(ability_category(left.crew));
    let right_category = category_rank(ability_category(right.crew));
    left_category
        .cmp(&right_category)
        .then_with(|| match (left.vs_opponent, right.vs_opponent) {
            (Some(a), Some(b)) => b.total_cmp(&a),
            _ => std::cmp::Ordering::Equal,
        })
        .then_with(|| right.score.total_cmp(&left.score))
        .then_with(|| left.crew.symbol.cmp(&right.crew.symbol))
}

/// Seat-filling passes, most to least constrained.
const PASS_COUNT: u8 = 4;

fn pass_allows(pass: u8, candidate: &CrewMember, station_skill_match: bool, quota_ok: bool) -> bool {
    let unconditional = candidate.action.condition().is_none();
    match pass {
        0 => station_skill_match && quota_ok && unconditional,
        1 => station_skill_match && unconditional,
        2 => station_skill_match,
        _ => true,
    }
}

/// Assemble a lineup for the ship. Returns a staffed copy, or None when the
/// ship has no battle stations. The pinned member always seats first and does
/// not consume quota.
pub fn staff_ship(
    ship: &Ship,
    mode: BattleMode,
    pool: &[StaffCandidate<'_>],
    pinned: Option<&CrewMember>,
) -> Option<Ship> {
    if ship.battle_stations.is_empty() {
        return None;
    }

    let mut staffed = ship.clone();
    for station in &mut staffed.battle_stations {
        station.crew = None;
    }
    let mut quota = quota_for(staffed.battle_stations.len(), mode);

    if let Some(member) = pinned {
        let seat = staffed
            .battle_stations
            .iter()
            .position(|station| member.skill_order.contains(&station.skill))
            .unwrap_or(0);
        staffed.battle_stations[seat].crew = Some(member.symbol.clone());
    }

    let mut ordered: Vec<&StaffCandidate<'_>> = pool
        .iter()
        .filter(|candidate| {
            pinned
                .map(|member| member.symbol != candidate.crew.symbol)
                .unwrap_or(true)
        })
        .collect();
    ordered.sort_by(|left, right| candidate_order(left, right));

    let mut used: Vec<bool> = vec![false; ordered.len()];
    for pass in 0..PASS_COUNT {
        for station_index in 0..staffed.battle_stations.len() {
            if staffed.battle_stations[station_index].crew.is_some() {
                continue;
            }
            let skill = staffed.battle_stations[station_index].skill;
            let pick = ordered.iter().enumerate().find(|(index, candidate)| {
                if used[*index] {
                    return false;
                }
                let skill_match = candidate.crew.skill_order.contains(&skill);
                let quota_ok = quota.available(ability_category(candidate.crew));
                pass_allows(pass, candidate.crew, skill_match, quota_ok)
            });
            if let Some((index, candidate)) = pick {
                used[index] = true;
                quota.take(ability_category(candidate.crew));
                staffed.battle_stations[station_index].crew =
                    Some(candidate.crew.symbol.clone());
            }
        }
    }

    Some(staffed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::action::{
        ActionAbility, ActionSource, BonusStat, ShipAction, ShipStatus, Skill,
    };
    use crate::data::ship::BattleStation;

    fn pool_member(symbol: &str, skill: Skill, kind: Option<AbilityKind>) -> CrewMember {
        CrewMember {
            symbol: symbol.into(),
            name: symbol.to_uppercase(),
            max_rarity: 5,
            skill_order: vec![skill],
            action: ShipAction {
                symbol: format!("{symbol}_action"),
                name: format!("{symbol} action"),
                source: ActionSource::Crew {
                    symbol: symbol.into(),
                },
                bonus_stat: BonusStat::Attack,
                bonus_amount: 3,
                ability: kind.map(|kind| ActionAbility {
                    kind,
                    amount: 10.0,
                    condition: None,
                }),
                penalty: None,
                status: None,
                initial_cooldown: 0.0,
                cooldown: 8.0,
                duration: 4.0,
                limit: None,
                charge_phases: Vec::new(),
            },
        }
    }

    fn four_station_ship() -> Ship {
        Ship {
            symbol: "carrier".into(),
            name: "Carrier".into(),
            rarity: 4,
            hull: 300_000.0,
            attack: 40_000.0,
            accuracy: 12_000.0,
            evasion: 12_000.0,
            crit_chance: 1_000.0,
            crit_bonus: 1_000.0,
            attacks_per_second: 1.0,
            battle_stations: [Skill::Command, Skill::Security, Skill::Engineering, Skill::Medicine]
                .into_iter()
                .map(|skill| BattleStation { skill, crew: None })
                .collect(),
            actions: Vec::new(),
        }
    }

    #[test]
    fn four_station_fbb_quota_is_one_boom_one_crit_two_heal() {
        let quota = quota_for(4, BattleMode::Fbb);
        assert_eq!(
            quota,
            AbilityQuota {
                boom: 1,
                crit: 1,
                heal: 2
            }
        );
    }

    #[test]
    fn arena_quota_favors_boom() {
        let quota = quota_for(4, BattleMode::Arena);
        assert_eq!(
            quota,
            AbilityQuota {
                boom: 2,
                crit: 1,
                heal: 1
            }
        );
    }

    #[test]
    fn no_battle_stations_means_no_lineup() {
        let mut ship = four_station_ship();
        ship.battle_stations.clear();
        assert!(staff_ship(&ship, BattleMode::Fbb, &[], None).is_none());
    }

    #[test]
    fn quota_pass_limits_boom_crew_in_fbb() {
        let ship = four_station_ship();
        let boom_a = pool_member("boom_a", Skill::Command, Some(AbilityKind::Damage));
        let boom_b = pool_member("boom_b", Skill::Security, Some(AbilityKind::Damage));
        let crit = pool_member("crit_a", Skill::Engineering, Some(AbilityKind::CritChance));
        let heal_a = pool_member("heal_a", Skill::Medicine, Some(AbilityKind::HullRepair));
        let heal_b = pool_member("heal_b", Skill::Security, Some(AbilityKind::HullRepair));
        let pool: Vec<StaffCandidate<'_>> = [&boom_a, &boom_b, &crit, &heal_a, &heal_b]
            .into_iter()
            .enumerate()
            .map(|(index, crew)| StaffCandidate {
                crew,
                score: 10.0 - index as f64,
                vs_opponent: None,
            })
            .collect();

        let staffed = staff_ship(&ship, BattleMode::Fbb, &pool, None).unwrap();
        let seated: Vec<&str> = staffed
            .battle_stations
            .iter()
            .filter_map(|station| station.crew.as_deref())
            .collect();
        assert_eq!(seated.len(), 4);
        let booms = seated.iter().filter(|symbol| symbol.starts_with("boom")).count();
        let heals = seated.iter().filter(|symbol| symbol.starts_with("heal")).count();
        assert_eq!(booms, 1, "fbb quota allows a single boom: {seated:?}");
        assert_eq!(heals, 2);
        assert!(seated.contains(&"crit_a"));
    }

    #[test]
    fn later_passes_fill_seats_the_strict_pass_left_empty() {
        let ship = four_station_ship();
        // Nobody matches Medicine; pass 3 must seat the leftover anyway.
        let a = pool_member("alpha", Skill::Command, Some(AbilityKind::Damage));
        let b = pool_member("beta", Skill::Security, Some(AbilityKind::CritBonus));
        let c = pool_member("gamma", Skill::Engineering, Some(AbilityKind::HullRepair));
        let d = pool_member("delta", Skill::Command, None);
        let pool: Vec<StaffCandidate<'_>> = [&a, &b, &c, &d]
            .into_iter()
            .map(|crew| StaffCandidate {
                crew,
                score: 1.0,
                vs_opponent: None,
            })
            .collect();

        let staffed = staff_ship(&ship, BattleMode::Arena, &pool, None).unwrap();
        let filled = staffed
            .battle_stations
            .iter()
            .filter(|station| station.crew.is_some())
            .count();
        assert_eq!(filled, 4);
        assert_eq!(staffed.battle_stations[3].crew.as_deref(), Some("delta"));
    }

    #[test]
    fn conditional_abilities_wait_for_the_relaxed_pass() {
        let mut ship = four_station_ship();
        ship.battle_stations.truncate(1);
        let mut conditional = pool_member("cond", Skill::Command, Some(AbilityKind::Damage));
        conditional.action.ability.as_mut().unwrap().condition = Some(ShipStatus::Cloaked);
        let plain = pool_member("plain", Skill::Command, Some(AbilityKind::Damage));
        let pool = [
            StaffCandidate {
                crew: &conditional,
                score: 100.0,
                vs_opponent: None,
            },
            StaffCandidate {
                crew: &plain,
                score: 1.0,
                vs_opponent: None,
            },
        ];

        // The conditional candidate scores far higher but pass 0 skips it.
        let staffed = staff_ship(&ship, BattleMode::Arena, &pool, None).unwrap();
        assert_eq!(staffed.battle_stations[0].crew.as_deref(), Some("plain"));
    }

    #[test]
    fn pinned_crew_seats_first_and_keeps_quota_intact() {
        let ship = four_station_ship();
        let pinned = pool_member("pinned_boom", Skill::Command, Some(AbilityKind::Damage));
        let boom = pool_member("other_boom", Skill::Security, Some(AbilityKind::Damage));
        let heal = pool_member("heal", Skill::Medicine, Some(AbilityKind::HullRepair));
        let pool = [
            StaffCandidate {
                crew: &boom,
                score: 5.0,
                vs_opponent: None,
            },
            StaffCandidate {
                crew: &heal,
                score: 5.0,
                vs_opponent: None,
            },
        ];

        let staffed = staff_ship(&ship, BattleMode::Fbb, &pool, Some(&pinned)).unwrap();
        assert_eq!(staffed.battle_stations[0].crew.as_deref(), Some("pinned_boom"));
        // The pinned boom did not consume the single fbb boom slot.
        let seated: Vec<&str> = staffed
            .battle_stations
            .iter()
            .filter_map(|station| station.crew.as_deref())
            .collect();
        assert!(seated.contains(&"other_boom"));
    }
}
