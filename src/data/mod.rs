pub mod action;
pub mod crew;
pub mod registry;
pub mod ship;

pub use action::{
    ActionAbility, ActionPenalty, ActionSource, AbilityKind, BonusStat, ChargePhase, ShipAction,
    ShipStatus, Skill,
};
pub use crew::{load_crew_collection, CrewMember, DEFAULT_CREW_PATH};
pub use registry::GameData;
pub use ship::{
    boss_by_id, eligible_bosses, load_ship_schematics, BattleStation, Boss, Ship, BOSSES,
    DEFAULT_SHIPS_PATH,
};
