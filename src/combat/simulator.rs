//! Fixed-timestep battle loop. Advances a ship, its seated crew's abilities,
//! and optionally an opponent through time, activating abilities per
//! cooldown/duration/limit rules with charge-phase escalation, and produces
//! one attack sample per tick survived.
//!
//! Determinism: with `simulate=false` activation delays are fixed, so two runs
//! with identical inputs produce identical timelines.

use serde::{Deserialize, Serialize};

use crate::combat::power::{
    resting_evasion_power, ship_power, ActiveEffect, BaseStats, ShipPower, StatusFlags,
};
use crate::combat::rng::Rng;
use crate::data::action::{AbilityKind, ShipAction, ShipStatus};
use crate::data::crew::CrewMember;
use crate::data::ship::{Boss, Ship};

pub const DEFAULT_BATTLE_SECONDS: u32 = 180;
pub const DEFAULT_RATE: u32 = 10;

/// Upper bound of the per-activation delay jitter, in seconds.
pub const ACTIVATION_DELAY: f64 = 0.4;

/// Hull-repair abilities hold fire until at least this fraction of hull is
/// missing, regardless of their own heal size.
const HULL_REPAIR_FLOOR: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleMode {
    Arena,
    Fbb,
}

#[derive(Debug, Clone)]
pub struct BattleConfig {
    pub mode: BattleMode,
    pub seconds: u32,
    pub rate: u32,
    /// Randomized activation delays when true; the fixed midpoint otherwise.
    pub simulate: bool,
    pub seed: u64,
    /// Outgoing damage multiplier for the own ship.
    pub offense: f64,
    /// Seat crew even when no station accepts their skills (what-if runs).
    pub ignore_skill: bool,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            mode: BattleMode::Arena,
            seconds: DEFAULT_BATTLE_SECONDS,
            rate: DEFAULT_RATE,
            simulate: false,
            seed: 0,
            offense: 1.0,
            ignore_skill: false,
        }
    }
}

/// The other side of the battle.
#[derive(Debug, Clone)]
pub enum Opponent<'a> {
    None,
    Ship {
        ship: &'a Ship,
        crew: Vec<&'a CrewMember>,
    },
    Boss(&'a Boss),
}

/// One simulated tick's sample.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackInstant {
    pub second: f64,
    /// Expected damage dealt this tick.
    pub damage: f64,
    /// No-crit floor for this tick.
    pub min_damage: f64,
    /// All-crit ceiling for this tick.
    pub max_damage: f64,
    /// Per-second damage rate this tick (feeds the front-loading metric).
    pub attack: f64,
    pub win: bool,
    /// Symbols of the own ship's currently active actions.
    pub actions: Vec<String>,
}

/// Seat crew onto battle stations: first not-yet-used member whose skill order
/// contains the station skill, in crew-array order. With `ignore_skill`,
/// leftover members fill leftover stations regardless of skills.
pub fn seat_crew<'a>(
    ship: &Ship,
    crew: &[&'a CrewMember],
    ignore_skill: bool,
) -> Vec<Option<&'a CrewMember>> {
    let mut used = vec![false; crew.len()];
    let mut seats: Vec<Option<&CrewMember>> = ship
        .battle_stations
        .iter()
        .map(|station| {
            let found = crew.iter().enumerate().find(|(index, member)| {
                !used[*index] && member.skill_order.contains(&station.skill)
            });
            match found {
                Some((index, member)) => {
                    used[index] = true;
                    Some(*member)
                }
                None => None,
            }
        })
        .collect();

    if ignore_skill {
        for seat in seats.iter_mut().filter(|seat| seat.is_none()) {
            let Some(index) = used.iter().position(|taken| !taken) else {
                break;
            };
            used[index] = true;
            *seat = Some(crew[index]);
        }
    }

    seats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Dormant,
    Charging,
    Active,
    Cooling,
}

/// Per-battle working copy of one action: the mutable subset (timers, phase
/// escalation, effective amounts) lives here; the template stays untouched.
#[derive(Debug, Clone)]
struct Slot {
    action: ShipAction,
    state: SlotState,
    state_time: f64,
    activations: u32,
    phase: usize,
    cooldown: f64,
    bonus_amount: i32,
    ability_amount: f64,
    delay: f64,
}

impl Slot {
    fn new(action: ShipAction, delay: f64) -> Self {
        let cooldown = action.cooldown;
        let bonus_amount = action.bonus_amount;
        let ability_amount = action
            .ability
            .as_ref()
            .map(|ability| ability.amount)
            .unwrap_or(0.0);
        Self {
            action,
            state: SlotState::Dormant,
            state_time: 0.0,
            activations: 0,
            phase: 0,
            cooldown,
            bonus_amount,
            ability_amount,
            delay,
        }
    }

    fn limit_reached(&self) -> bool {
        self.action
            .limit
            .map(|limit| self.activations >= limit)
            .unwrap_or(false)
    }

    /// Cooldown gate for the slot's current state; Active slots are not ready.
    fn ready(&self) -> bool {
        match self.state {
            SlotState::Dormant => self.state_time >= self.action.initial_cooldown + self.delay,
            SlotState::Charging | SlotState::Cooling => {
                !self.limit_reached() && self.state_time >= self.cooldown + self.delay
            }
            SlotState::Active => false,
        }
    }

    fn escalating(&self) -> bool {
        self.phase < self.action.charge_phases.len()
    }

    /// Bump to the next charge phase, keeping previous values where a phase
    /// leaves a field unset. The last phase locks the final cooldown in.
    fn advance_phase(&mut self) {
        if let Some(phase) = self.action.charge_phases.get(self.phase) {
            if let Some(cooldown) = phase.cooldown {
                self.cooldown = cooldown;
            }
            if let Some(bonus) = phase.bonus_amount {
                self.bonus_amount = bonus;
            }
            if let Some(amount) = phase.ability_amount {
                self.ability_amount = amount;
            }
            self.phase += 1;
        }
    }

    /// Re-arm after firing or after a gated non-fire: charge slots keep
    /// escalating, everything else cools down.
    fn rearm(&mut self, delay: f64) {
        self.state = if self.escalating() {
            SlotState::Charging
        } else {
            SlotState::Cooling
        };
        self.state_time = 0.0;
        self.delay = delay;
    }

    fn effect(&self) -> ActiveEffect {
        ActiveEffect {
            bonus_stat: self.action.bonus_stat,
            bonus_amount: self.bonus_amount,
            penalty: self.action.penalty,
            ability: self
                .action
                .ability
                .as_ref()
                .map(|ability| (ability.kind, self.ability_amount)),
        }
    }
}

/// Immediate contributions produced by activations within one tick.
#[derive(Debug, Clone, Copy, Default)]
struct BurstDamage {
    standard: f64,
    min: f64,
    max: f64,
}

struct SideState {
    stats: BaseStats,
    max_hull: f64,
    hull: f64,
    slots: Vec<Slot>,
    statuses: StatusFlags,
    power: ShipPower,
    /// Active-set changed; power needs recomputing this tick.
    dirty: bool,
}

impl SideState {
    fn new(stats: BaseStats, hull: f64, slots: Vec<Slot>, opponent_evasion: f64, offense: f64) -> Self {
        let power = ship_power(&stats, &[], StatusFlags::default(), opponent_evasion, offense);
        Self {
            stats,
            max_hull: hull,
            hull,
            slots,
            statuses: StatusFlags::default(),
            power,
            dirty: false,
        }
    }

    fn derive_statuses(&mut self) {
        let mut statuses = StatusFlags::default();
        for slot in self.slots.iter().filter(|slot| slot.state == SlotState::Active) {
            match slot.action.status {
                Some(ShipStatus::Position) => statuses.position = true,
                Some(ShipStatus::Cloaked) => statuses.cloaked = true,
                Some(ShipStatus::Boarding) => statuses.boarding = true,
                None => {}
            }
        }
        self.statuses = statuses;
    }

    fn status_held(&self, status: ShipStatus) -> bool {
        match status {
            ShipStatus::Position => self.statuses.position,
            ShipStatus::Cloaked => self.statuses.cloaked,
            ShipStatus::Boarding => self.statuses.boarding,
        }
    }

    fn active_effects(&self) -> Vec<ActiveEffect> {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::Active)
            .map(Slot::effect)
            .collect()
    }

    fn active_symbols(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::Active)
            .map(|slot| slot.action.symbol.clone())
            .collect()
    }

    /// Advance timers and expire active durations.
    fn advance(&mut self, dt: f64, rng: &mut Rng, simulate: bool) {
        for slot in &mut self.slots {
            slot.state_time += dt;
        }
        let mut expired = false;
        for index in 0..self.slots.len() {
            let slot = &self.slots[index];
            if slot.state == SlotState::Active && slot.state_time >= slot.action.duration {
                let delay = draw_delay(rng, simulate);
                self.slots[index].rearm(delay);
                expired = true;
            }
        }
        if expired {
            self.derive_statuses();
            self.dirty = true;
        }
    }

    /// Try to fire at most one ability this tick (hold-back rule). Returns the
    /// burst damage produced by the activation, if any.
    fn try_activate(&mut self, rng: &mut Rng, simulate: bool) -> BurstDamage {
        let mut burst = BurstDamage::default();
        for index in 0..self.slots.len() {
            let slot = &self.slots[index];
            if !slot.ready() {
                continue;
            }
            if let Some(condition) = slot.action.condition() {
                if !self.status_held(condition) {
                    continue;
                }
            }
            let kind = slot.action.ability.as_ref().map(|ability| ability.kind);
            if kind == Some(AbilityKind::HullRepair) {
                let missing = 1.0 - self.hull / self.max_hull;
                let heal_fraction = (self.slots[index].ability_amount / 100.0).max(0.0);
                if missing <= heal_fraction || missing <= HULL_REPAIR_FLOOR {
                    // Wasted-heal throttle: the phase advances without firing
                    // and the tick's activation slot stays open.
                    let delay = draw_delay(rng, simulate);
                    self.slots[index].advance_phase();
                    self.slots[index].rearm(delay);
                    continue;
                }
            }

            let amount = self.slots[index].ability_amount;
            self.slots[index].state = SlotState::Active;
            self.slots[index].state_time = 0.0;
            self.slots[index].activations += 1;
            self.slots[index].advance_phase();
            self.dirty = true;

            match kind {
                Some(AbilityKind::Damage) => {
                    let fraction = amount.max(0.0) / 100.0;
                    burst.standard = self.power.with_bonus_and_chance * fraction;
                    burst.min = self.power.base * fraction;
                    burst.max = self.power.with_bonus * fraction;
                }
                Some(AbilityKind::HullRepair) => {
                    let heal = self.max_hull * (amount.max(0.0) / 100.0);
                    self.hull = (self.hull + heal).min(self.max_hull);
                }
                Some(AbilityKind::GrantExtraTime) => {
                    let extra = amount.max(0.0);
                    for (other, slot) in self.slots.iter_mut().enumerate() {
                        if other != index
                            && slot.state != SlotState::Dormant
                            && slot.state != SlotState::Active
                        {
                            slot.state_time += extra;
                        }
                    }
                }
                _ => {}
            }

            self.derive_statuses();
            break;
        }
        burst
    }

    fn recompute_power(&mut self, opponent_evasion: f64, offense: f64) {
        let effects = self.active_effects();
        self.power = ship_power(&self.stats, &effects, self.statuses, opponent_evasion, offense);
        self.dirty = false;
    }
}

fn draw_delay(rng: &mut Rng, simulate: bool) -> f64 {
    if simulate {
        rng.bounded(ACTIVATION_DELAY)
    } else {
        ACTIVATION_DELAY / 2.0
    }
}

fn build_slots(
    ship: &Ship,
    crew: &[&CrewMember],
    ignore_skill: bool,
    rng: &mut Rng,
    simulate: bool,
) -> Vec<Slot> {
    let mut slots: Vec<Slot> = ship
        .actions
        .iter()
        .map(|action| Slot::new(action.clone(), draw_delay(rng, simulate)))
        .collect();
    for seat in seat_crew(ship, crew, ignore_skill).into_iter().flatten() {
        slots.push(Slot::new(seat.action.clone(), draw_delay(rng, simulate)));
    }
    slots
}

/// Run one battle and return the per-tick timeline. An empty result means the
/// setup was malformed (crew to seat but no battle stations); combat-logic
/// edge cases never panic.
pub fn simulate_battle(
    ship: &Ship,
    crew: &[&CrewMember],
    opponent: &Opponent<'_>,
    config: &BattleConfig,
) -> Vec<AttackInstant> {
    if !crew.is_empty() && ship.battle_stations.is_empty() {
        return Vec::new();
    }

    let mut rng = Rng::new(config.seed);
    let dt = 1.0 / config.rate.max(1) as f64;
    let ticks = (config.seconds * config.rate.max(1)) as usize;

    let own_stats = BaseStats::from(ship);
    let (opponent_stats, opponent_hull, opponent_slots) = match opponent {
        Opponent::None => (None, 0.0, Vec::new()),
        Opponent::Ship { ship: other, crew: other_crew } => (
            Some(BaseStats::from(*other)),
            other.hull,
            build_slots(other, other_crew, config.ignore_skill, &mut rng, config.simulate),
        ),
        Opponent::Boss(boss) => (Some(BaseStats::from(*boss)), boss.hull, Vec::new()),
    };

    let opponent_resting_evasion = opponent_stats
        .as_ref()
        .map(resting_evasion_power)
        .unwrap_or_else(|| resting_evasion_power(&own_stats));

    let own_slots = build_slots(ship, crew, config.ignore_skill, &mut rng, config.simulate);
    let mut own = SideState::new(
        own_stats,
        ship.hull,
        own_slots,
        opponent_resting_evasion,
        config.offense,
    );
    let mut other = opponent_stats.map(|stats| {
        SideState::new(
            stats,
            opponent_hull,
            opponent_slots,
            resting_evasion_power(&own_stats),
            1.0,
        )
    });

    let mut samples = Vec::with_capacity(ticks);
    let mut active_symbols = own.active_symbols();

    for tick in 1..=ticks {
        let second = tick as f64 * dt;

        own.advance(dt, &mut rng, config.simulate);
        if let Some(side) = other.as_mut() {
            side.advance(dt, &mut rng, config.simulate);
        }

        let own_burst = own.try_activate(&mut rng, config.simulate);
        let other_burst = other
            .as_mut()
            .map(|side| side.try_activate(&mut rng, config.simulate))
            .unwrap_or_default();

        let own_dirty = own.dirty;
        let other_dirty = other.as_ref().map(|side| side.dirty).unwrap_or(false);
        if own_dirty || other_dirty {
            let own_evasion = own.power.evasion_power();
            let other_evasion = other
                .as_ref()
                .map(|side| side.power.evasion_power())
                .unwrap_or(own_evasion);
            own.recompute_power(other_evasion, config.offense);
            if let Some(side) = other.as_mut() {
                side.recompute_power(own_evasion, 1.0);
            }
            active_symbols = own.active_symbols();
        }

        // Cloak: in arena battles a cloaked side suspends damage both ways.
        let cloak_hold = config.mode == BattleMode::Arena
            && (own.statuses.cloaked
                || other.as_ref().map(|side| side.statuses.cloaked).unwrap_or(false));

        let mut damage = 0.0;
        let mut min_damage = 0.0;
        let mut max_damage = 0.0;
        let mut win = false;

        if !cloak_hold {
            damage = own.power.with_bonus_and_chance * own.power.attacks_per_second * dt
                + own_burst.standard;
            min_damage = own.power.base * own.power.attacks_per_second * dt + own_burst.min;
            max_damage =
                own.power.with_bonus * own.power.attacks_per_second * dt + own_burst.max;

            if let Some(side) = other.as_mut() {
                side.hull -= damage;
                win = side.hull <= 0.0;

                let counter = side.power.with_bonus_and_chance
                    * side.power.attacks_per_second
                    * dt
                    + other_burst.standard;
                own.hull -= counter;
            }
        }

        samples.push(AttackInstant {
            second,
            damage,
            min_damage,
            max_damage,
            attack: damage / dt,
            win,
            actions: active_symbols.clone(),
        });

        if win || own.hull <= 0.0 {
            break;
        }
    }

    samples
}
