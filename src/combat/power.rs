//! Power model: converts raw ship ratings and active abilities into effective
//! combat numbers. Pure and deterministic; the simulator calls this many times
//! per simulated second.
//!
//! Ratings are not linear. A raw rating condenses to a tier (0..=40) and the
//! tier table gives the effective power, so boosts add the *table delta* for
//! the tier step, reproducing in-game breakpoint behavior. Crit chance and
//! crit bonus interpolate linearly between breakpoints of their own tables.

use crate::data::action::{AbilityKind, ActionPenalty, BonusStat};
use crate::data::ship::{Boss, Ship};

pub const EPSILON: f64 = 1e-9;

/// Raw-rating width of one condensed tier.
pub const TIER_WIDTH: f64 = 3000.0;
pub const MAX_TIER: i32 = 40;

/// Effective power per condensed tier. Non-decreasing; deltas widen toward
/// the high tiers.
pub const POWER_TABLE: [f64; 41] = [
    0.0, 900.0, 1_850.0, 2_850.0, 3_900.0, 5_000.0, 6_150.0, 7_350.0, 8_600.0, 9_900.0,
    11_250.0, 12_650.0, 14_100.0, 15_600.0, 17_150.0, 18_750.0, 20_400.0, 22_100.0, 23_850.0,
    25_650.0, 27_500.0, 29_400.0, 31_350.0, 33_350.0, 35_400.0, 37_500.0, 39_650.0, 41_850.0,
    44_100.0, 46_400.0, 48_750.0, 51_150.0, 53_600.0, 56_100.0, 58_650.0, 61_250.0, 63_900.0,
    66_600.0, 69_350.0, 72_150.0, 75_000.0,
];

/// Crit chance percent by rating, interpolated between breakpoints.
const CRIT_CHANCE_TABLE: &[(f64, f64)] = &[
    (0.0, 0.0),
    (400.0, 4.0),
    (800.0, 8.0),
    (1_200.0, 12.0),
    (2_000.0, 17.0),
    (3_000.0, 22.0),
    (4_000.0, 27.0),
    (5_000.0, 32.0),
    (6_000.0, 36.0),
    (8_000.0, 44.0),
    (10_000.0, 50.0),
];

/// Crit damage bonus percent by rating.
const CRIT_BONUS_TABLE: &[(f64, f64)] = &[
    (0.0, 0.0),
    (500.0, 25.0),
    (1_000.0, 50.0),
    (2_000.0, 75.0),
    (4_000.0, 100.0),
    (6_000.0, 125.0),
    (8_000.0, 150.0),
    (10_000.0, 175.0),
];

/// Guaranteed-crit bump granted by the Position status, in percentage points.
const POSITION_CRIT_BUMP: f64 = 1_000.0;

/// Attack multiplier granted by the Boarding status.
const BOARDING_ATTACK_MULT: f64 = 1.5;

pub fn condense(rating: f64) -> i32 {
    ((rating / TIER_WIDTH).round() as i32).clamp(0, MAX_TIER)
}

pub fn tier_power(tier: i32) -> f64 {
    POWER_TABLE[tier.clamp(0, MAX_TIER) as usize]
}

fn interpolate(table: &[(f64, f64)], rating: f64) -> f64 {
    let (first_rating, first_value) = table[0];
    if rating <= first_rating {
        return first_value;
    }
    for pair in table.windows(2) {
        let (lo_rating, lo_value) = pair[0];
        let (hi_rating, hi_value) = pair[1];
        if rating <= hi_rating {
            let span = hi_rating - lo_rating;
            if span <= EPSILON {
                return hi_value;
            }
            let fraction = (rating - lo_rating) / span;
            return lo_value + fraction * (hi_value - lo_value);
        }
    }
    table[table.len() - 1].1
}

/// Crit chance percent for a rating; 0 at 0, 50 at 10000, clamped beyond.
pub fn crit_chance_percent(rating: f64) -> f64 {
    interpolate(CRIT_CHANCE_TABLE, rating)
}

/// Crit damage bonus percent for a rating.
pub fn crit_bonus_percent(rating: f64) -> f64 {
    interpolate(CRIT_BONUS_TABLE, rating)
}

/// Logistic hit chance from the accuracy/evasion power ratio. Always in (0, 1)
/// for finite positive inputs.
pub fn hit_chance(accuracy_power: f64, opponent_evasion_power: f64) -> f64 {
    let ratio = accuracy_power / opponent_evasion_power.max(EPSILON);
    1.0 / (1.0 + (-1.9 * (ratio - 0.55)).exp())
}

/// Condensed contributions for one stat, all in tier units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatCondensed {
    pub base: i32,
    pub ability: i32,
    pub active: i32,
    pub penalty: i32,
}

impl StatCondensed {
    pub fn total(&self) -> i32 {
        (self.base + self.ability + self.active - self.penalty).clamp(0, MAX_TIER)
    }

    pub fn power(&self) -> f64 {
        tier_power(self.total())
    }
}

/// Base ratings fed to the model; ships and bosses both condense to this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseStats {
    pub attack: f64,
    pub accuracy: f64,
    pub evasion: f64,
    pub crit_chance: f64,
    pub crit_bonus: f64,
    pub attacks_per_second: f64,
}

impl From<&Ship> for BaseStats {
    fn from(ship: &Ship) -> Self {
        Self {
            attack: ship.attack,
            accuracy: ship.accuracy,
            evasion: ship.evasion,
            crit_chance: ship.crit_chance,
            crit_bonus: ship.crit_bonus,
            attacks_per_second: ship.attacks_per_second,
        }
    }
}

impl From<&Boss> for BaseStats {
    fn from(boss: &Boss) -> Self {
        Self {
            attack: boss.attack,
            accuracy: boss.accuracy,
            evasion: boss.evasion,
            crit_chance: boss.crit_chance,
            crit_bonus: boss.crit_bonus,
            attacks_per_second: boss.attacks_per_second,
        }
    }
}

/// One currently-active action as the model sees it: the stat bonus, any
/// boost riding it, its penalty, and its triggered ability contribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveEffect {
    pub bonus_stat: BonusStat,
    pub bonus_amount: i32,
    pub penalty: Option<ActionPenalty>,
    pub ability: Option<(AbilityKind, f64)>,
}

/// Statuses currently held by the own ship.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusFlags {
    pub position: bool,
    pub cloaked: bool,
    pub boarding: bool,
}

/// Condensed output of one model evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipPower {
    pub attack: StatCondensed,
    pub evasion: StatCondensed,
    pub accuracy: StatCondensed,
    /// Percent, post status bumps, clamped to 100.
    pub crit_chance: f64,
    /// Percent extra damage on a crit.
    pub crit_bonus: f64,
    pub hit_chance: f64,
    pub attacks_per_second: f64,
    /// Expected damage per attack including hit chance, no crits.
    pub base: f64,
    /// Damage per attack assuming every hit crits.
    pub with_bonus: f64,
    /// Expected damage per attack including hit chance and crit probability.
    pub with_bonus_and_chance: f64,
}

impl ShipPower {
    pub fn evasion_power(&self) -> f64 {
        self.evasion.power()
    }
}

/// Evasion power of a combatant with no abilities active; used to bootstrap
/// the first tick before the opposing side has evaluated its own power.
pub fn resting_evasion_power(stats: &BaseStats) -> f64 {
    tier_power(condense(stats.evasion))
}

/// Evaluate the power model. `effects` holds one entry per currently-active
/// action; inactive slots are simply absent. `offense` scales outgoing attack.
pub fn ship_power(
    stats: &BaseStats,
    effects: &[ActiveEffect],
    statuses: StatusFlags,
    opponent_evasion_power: f64,
    offense: f64,
) -> ShipPower {
    let mut attack = StatCondensed {
        base: condense(stats.attack),
        ..StatCondensed::default()
    };
    let mut evasion = StatCondensed {
        base: condense(stats.evasion),
        ..StatCondensed::default()
    };
    let mut accuracy = StatCondensed {
        base: condense(stats.accuracy),
        ..StatCondensed::default()
    };

    let mut crit_chance_rating = stats.crit_chance;
    let mut crit_bonus_rating = stats.crit_bonus;
    let mut attack_speed_pct = 0.0;
    let mut penetration_pct = 0.0;

    for effect in effects {
        let slot = match effect.bonus_stat {
            BonusStat::Attack => &mut attack,
            BonusStat::Evasion => &mut evasion,
            BonusStat::Accuracy => &mut accuracy,
        };
        slot.active += effect.bonus_amount;
        if let Some((kind, amount)) = effect.ability {
            match kind {
                AbilityKind::BonusBoost => slot.ability += amount as i32,
                AbilityKind::CritChance => crit_chance_rating += amount,
                AbilityKind::CritBonus => crit_bonus_rating += amount,
                AbilityKind::AttackSpeed => attack_speed_pct += amount,
                AbilityKind::ShieldPenetration => penetration_pct += amount,
                // Burst/heal/time effects apply at activation, not here.
                AbilityKind::Damage | AbilityKind::HullRepair | AbilityKind::GrantExtraTime => {}
            }
        }
        if let Some(penalty) = effect.penalty {
            let slot = match penalty.stat {
                BonusStat::Attack => &mut attack,
                BonusStat::Evasion => &mut evasion,
                BonusStat::Accuracy => &mut accuracy,
            };
            slot.penalty += penalty.amount;
        }
    }

    let mut crit_chance = crit_chance_percent(crit_chance_rating);
    if statuses.position {
        crit_chance += POSITION_CRIT_BUMP;
    }
    let crit_chance = crit_chance.min(100.0);
    let crit_bonus = crit_bonus_percent(crit_bonus_rating);

    let hit = hit_chance(accuracy.power(), opponent_evasion_power);

    let boarding_mult = if statuses.boarding {
        BOARDING_ATTACK_MULT
    } else {
        1.0
    };
    let per_attack =
        attack.power() * offense * boarding_mult * (1.0 + penetration_pct / 100.0);
    let crit_chance_fraction = crit_chance / 100.0;
    let crit_bonus_fraction = crit_bonus / 100.0;

    ShipPower {
        attack,
        evasion,
        accuracy,
        crit_chance,
        crit_bonus,
        hit_chance: hit,
        attacks_per_second: stats.attacks_per_second * (1.0 + attack_speed_pct / 100.0),
        base: per_attack * hit,
        with_bonus: per_attack * (1.0 + crit_bonus_fraction),
        with_bonus_and_chance: per_attack
            * (1.0 + crit_chance_fraction * crit_bonus_fraction)
            * hit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(attack: f64) -> BaseStats {
        BaseStats {
            attack,
            accuracy: 9_000.0,
            evasion: 9_000.0,
            crit_chance: 2_000.0,
            crit_bonus: 2_000.0,
            attacks_per_second: 1.0,
        }
    }

    #[test]
    fn crit_chance_table_endpoints_and_monotonicity() {
        assert_eq!(crit_chance_percent(0.0), 0.0);
        assert_eq!(crit_chance_percent(10_000.0), 50.0);
        let mut previous = 0.0;
        let mut rating = 0.0;
        while rating <= 12_000.0 {
            let value = crit_chance_percent(rating);
            assert!(value >= previous, "crit chance decreased at rating {rating}");
            previous = value;
            rating += 50.0;
        }
    }

    #[test]
    fn hit_chance_stays_in_open_unit_interval() {
        for (acc, eva) in [(1.0, 1e6), (1e6, 1.0), (5_000.0, 5_000.0), (0.1, 0.1)] {
            let chance = hit_chance(acc, eva);
            assert!(chance > 0.0 && chance < 1.0, "hit {chance} for {acc}/{eva}");
        }
    }

    #[test]
    fn raising_attack_rating_never_lowers_expected_damage() {
        let opponent_evasion = tier_power(10);
        let mut previous = 0.0;
        let mut rating = 0.0;
        while rating <= TIER_WIDTH * MAX_TIER as f64 + 5_000.0 {
            let power = ship_power(
                &stats(rating),
                &[],
                StatusFlags::default(),
                opponent_evasion,
                1.0,
            );
            assert!(
                power.with_bonus_and_chance >= previous,
                "expected damage dropped at attack rating {rating}"
            );
            previous = power.with_bonus_and_chance;
            rating += 500.0;
        }
    }

    #[test]
    fn position_status_guarantees_crits() {
        let power = ship_power(
            &stats(30_000.0),
            &[],
            StatusFlags {
                position: true,
                ..StatusFlags::default()
            },
            tier_power(10),
            1.0,
        );
        assert_eq!(power.crit_chance, 100.0);
    }

    #[test]
    fn boarding_status_adds_half_again_attack() {
        let resting = ship_power(&stats(30_000.0), &[], StatusFlags::default(), tier_power(10), 1.0);
        let boarding = ship_power(
            &stats(30_000.0),
            &[],
            StatusFlags {
                boarding: true,
                ..StatusFlags::default()
            },
            tier_power(10),
            1.0,
        );
        let ratio = boarding.with_bonus_and_chance / resting.with_bonus_and_chance;
        assert!((ratio - 1.5).abs() < 1e-9);
    }

    #[test]
    fn bonus_applies_the_tier_table_delta() {
        let base_tier = condense(30_000.0);
        let boosted = ship_power(
            &stats(30_000.0),
            &[ActiveEffect {
                bonus_stat: BonusStat::Attack,
                bonus_amount: 3,
                penalty: None,
                ability: None,
            }],
            StatusFlags::default(),
            tier_power(10),
            1.0,
        );
        assert_eq!(boosted.attack.total(), base_tier + 3);
        assert_eq!(boosted.attack.power(), tier_power(base_tier + 3));
    }

    #[test]
    fn power_table_covers_every_tier_and_never_decreases() {
        assert_eq!(POWER_TABLE.len(), (MAX_TIER + 1) as usize);
        for pair in POWER_TABLE.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }
}
