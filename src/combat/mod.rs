pub mod power;
pub mod processor;
pub mod rng;
pub mod simulator;

pub use power::{
    condense, crit_bonus_percent, crit_chance_percent, hit_chance, ship_power, tier_power,
    ActiveEffect, BaseStats, ShipPower, StatCondensed, StatusFlags, EPSILON, MAX_TIER,
    POWER_TABLE, TIER_WIDTH,
};
pub use processor::{
    process_battle_run, ship_compat, BattleRun, BattleSummary, CrewRole, ShipCompat,
};
pub use rng::Rng;
pub use simulator::{
    seat_crew, simulate_battle, AttackInstant, BattleConfig, BattleMode, Opponent,
    ACTIVATION_DELAY, DEFAULT_BATTLE_SECONDS, DEFAULT_RATE,
};
