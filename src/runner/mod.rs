//! Run orchestrator: drives the simulator across the ship × crew ×
//! opponent/boss × battle-mode cross product, with resumable caching and a
//! second head-to-head pass over concrete lineups for ship scoring.

pub mod cache;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use tracing::{info, warn};

use crate::combat::processor::{
    process_battle_run, ship_compat, BattleRun, BattleSummary, CrewRole, ShipCompat,
};
use crate::combat::simulator::{
    simulate_battle, BattleConfig, BattleMode, Opponent, DEFAULT_BATTLE_SECONDS, DEFAULT_RATE,
};
use crate::data::action::{
    ActionAbility, ActionSource, AbilityKind, BonusStat, ShipAction, Skill,
};
use crate::data::crew::CrewMember;
use crate::data::registry::GameData;
use crate::data::ship::{eligible_bosses, Boss, Ship};
use crate::parallel::{map_isolated, WorkerPool};
use crate::scoring::staffing::{staff_ship, StaffCandidate};
use crate::scoring::{normalize_scores, score_battle_runs, Score, ScoreKind};

use self::cache::{read_cache, write_cache};

/// Defense-role solo crew get hull-repair helpers against bosses from this
/// tier up; below it a lone healer is expected to carry the fight.
const HELPER_BOSS_TIER: u8 = 5;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub seconds: u32,
    pub rate: u32,
    /// Randomized activation-delay jitter. Off by default so repeated passes
    /// are reproducible.
    pub simulate: bool,
    pub seed: u64,
    /// Subtract crewless reference damage from crewed runs before scoring.
    /// Kept as an explicit policy switch; see DESIGN.md.
    pub calibrate_against_reference: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            seconds: DEFAULT_BATTLE_SECONDS,
            rate: DEFAULT_RATE,
            simulate: false,
            seed: 0,
            calibrate_against_reference: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The ship cannot host crew at all.
    NoBattleStations { ship: String },
    /// Staffing passes left every seat empty.
    CannotSeat { ship: String },
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBattleStations { ship } => {
                write!(f, "ship '{ship}' has no battle stations")
            }
            Self::CannotSeat { ship } => {
                write!(f, "no compatible crew could be seated on ship '{ship}'")
            }
        }
    }
}

impl std::error::Error for OrchestratorError {}

/// Everything the scoring passes produce.
#[derive(Debug)]
pub struct ScoringOutcome {
    pub crew_scores: Vec<Score>,
    pub ship_scores: Vec<Score>,
    pub runs: Vec<BattleRun>,
}

fn mix_seed(seed: u64, parts: &[&str]) -> u64 {
    let mut acc = seed;
    for part in parts {
        for byte in part.bytes() {
            acc = acc.wrapping_mul(37).wrapping_add(u64::from(byte));
        }
    }
    acc
}

/// Synthetic hull-repair seatmates appended to solo defense crew against
/// high-tier bosses. Broad skill coverage so they always find a seat.
fn damage_control_helpers() -> Vec<CrewMember> {
    let make = |symbol: &str, skills: Vec<Skill>| CrewMember {
        symbol: symbol.to_string(),
        name: "Damage Control Team".to_string(),
        max_rarity: 1,
        skill_order: skills,
        action: ShipAction {
            symbol: format!("{symbol}_repair"),
            name: "Emergency Hull Patch".to_string(),
            source: ActionSource::Crew {
                symbol: symbol.to_string(),
            },
            bonus_stat: BonusStat::Evasion,
            bonus_amount: 1,
            ability: Some(ActionAbility {
                kind: AbilityKind::HullRepair,
                amount: 15.0,
                condition: None,
            }),
            penalty: None,
            status: None,
            initial_cooldown: 6.0,
            cooldown: 14.0,
            duration: 1.0,
            limit: None,
            charge_phases: Vec::new(),
        },
    };
    vec![
        make(
            "damage_control_alpha",
            vec![Skill::Engineering, Skill::Command, Skill::Science],
        ),
        make(
            "damage_control_beta",
            vec![Skill::Medicine, Skill::Security, Skill::Diplomacy],
        ),
    ]
}

struct RunContext<'a> {
    ship: &'a Ship,
    crew: Option<&'a CrewMember>,
    boss: Option<&'a Boss>,
    opponent: Option<&'a Ship>,
    battle: BattleMode,
    role: CrewRole,
    compat: ShipCompat,
    reference: bool,
}

fn build_run(summary: BattleSummary, context: RunContext<'_>) -> BattleRun {
    BattleRun {
        // Ids are assigned in one renumbering pass after the parallel join.
        id: 0,
        ship: context.ship.symbol.clone(),
        crew: context.crew.map(|member| member.symbol.clone()),
        boss: context.boss.map(|boss| boss.id),
        opponent: context.opponent.map(|ship| ship.symbol.clone()),
        division: context.ship.division(),
        damage: summary.damage,
        min_damage: summary.min_damage,
        max_damage: summary.max_damage,
        duration: summary.duration,
        arena_metric: summary.arena_metric,
        seated: summary.seated,
        compat: context.compat,
        battle: context.battle,
        role: context.role,
        win: summary.win,
        reference_battle: context.reference,
    }
}

pub struct Orchestrator<'a> {
    data: &'a GameData,
    options: OrchestratorOptions,
    helpers: Vec<CrewMember>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(data: &'a GameData, options: OrchestratorOptions) -> Self {
        Self {
            data,
            options,
            helpers: damage_control_helpers(),
        }
    }

    fn battle_config(&self, mode: BattleMode, ignore_skill: bool, seed_parts: &[&str]) -> BattleConfig {
        BattleConfig {
            mode,
            seconds: self.options.seconds,
            rate: self.options.rate,
            simulate: self.options.simulate,
            seed: mix_seed(self.options.seed, seed_parts),
            offense: 1.0,
            ignore_skill,
        }
    }

    /// All runs for one ship: reference battles, then per-crew FBB and arena
    /// configurations. `crew_filter` restricts to delta crew on cache resume
    /// (reference battles are already cached in that case).
    fn ship_runs(
        &self,
        ship: &Ship,
        crew_filter: Option<&HashSet<String>>,
    ) -> Result<Vec<BattleRun>, OrchestratorError> {
        if ship.battle_stations.is_empty() {
            return Err(OrchestratorError::NoBattleStations {
                ship: ship.symbol.clone(),
            });
        }

        let bosses = eligible_bosses(ship.rarity);
        let next_opponent = self.data.next_opponent_in_division(ship);
        let crew_pool: Vec<&CrewMember> = self
            .data
            .crew()
            .iter()
            .filter(|member| {
                crew_filter
                    .map(|filter| filter.contains(&member.symbol))
                    .unwrap_or(true)
            })
            .collect();

        let per_crew = bosses.len() + 3;
        let mut runs = Vec::with_capacity(crew_pool.len() * per_crew + bosses.len() + 1);

        if crew_filter.is_none() {
            self.reference_runs(ship, &bosses, &mut runs);
        }

        for member in crew_pool {
            let compat = ship_compat(member, ship);
            let role = if member.is_defensive() {
                CrewRole::Defense
            } else {
                CrewRole::Offense
            };

            for &boss in &bosses {
                let mut crew_list: Vec<&CrewMember> = vec![member];
                if role == CrewRole::Defense && boss.id >= HELPER_BOSS_TIER {
                    crew_list.extend(self.helpers.iter());
                }
                let config = self.battle_config(
                    BattleMode::Fbb,
                    true,
                    &[&ship.symbol, &member.symbol, boss.name],
                );
                let attacks = simulate_battle(ship, &crew_list, &Opponent::Boss(boss), &config);
                if let Some(summary) = process_battle_run(&attacks, ship, &crew_list) {
                    runs.push(build_run(
                        summary,
                        RunContext {
                            ship,
                            crew: Some(member),
                            boss: Some(boss),
                            opponent: None,
                            battle: BattleMode::Fbb,
                            role,
                            compat,
                            reference: false,
                        },
                    ));
                }
            }

            let crew_list = [member];
            let self_config =
                self.battle_config(BattleMode::Arena, true, &[&ship.symbol, &member.symbol]);
            let attacks = simulate_battle(
                ship,
                &crew_list,
                &Opponent::Ship {
                    ship,
                    crew: Vec::new(),
                },
                &self_config,
            );
            if let Some(summary) = process_battle_run(&attacks, ship, &crew_list) {
                runs.push(build_run(
                    summary,
                    RunContext {
                        ship,
                        crew: Some(member),
                        boss: None,
                        opponent: Some(ship),
                        battle: BattleMode::Arena,
                        role,
                        compat,
                        reference: false,
                    },
                ));
            }

            if let Some(opponent) = next_opponent {
                let config = self.battle_config(
                    BattleMode::Arena,
                    true,
                    &[&ship.symbol, &member.symbol, &opponent.symbol],
                );
                let attacks = simulate_battle(
                    ship,
                    &crew_list,
                    &Opponent::Ship {
                        ship: opponent,
                        crew: Vec::new(),
                    },
                    &config,
                );
                if let Some(summary) = process_battle_run(&attacks, ship, &crew_list) {
                    runs.push(build_run(
                        summary,
                        RunContext {
                            ship,
                            crew: Some(member),
                            boss: None,
                            opponent: Some(opponent),
                            battle: BattleMode::Arena,
                            role,
                            compat,
                            reference: false,
                        },
                    ));
                }

                // Symmetric matchup: the opponent fields the same candidate.
                let config = self.battle_config(
                    BattleMode::Arena,
                    true,
                    &[&ship.symbol, &member.symbol, &opponent.symbol, "mirror"],
                );
                let attacks = simulate_battle(
                    ship,
                    &crew_list,
                    &Opponent::Ship {
                        ship: opponent,
                        crew: vec![member],
                    },
                    &config,
                );
                if let Some(summary) = process_battle_run(&attacks, ship, &crew_list) {
                    runs.push(build_run(
                        summary,
                        RunContext {
                            ship,
                            crew: Some(member),
                            boss: None,
                            opponent: Some(opponent),
                            battle: BattleMode::Arena,
                            role,
                            compat,
                            reference: false,
                        },
                    ));
                }
            }
        }

        Ok(runs)
    }

    /// Crewless calibration baselines, one per boss plus arena self-play.
    fn reference_runs(&self, ship: &Ship, bosses: &[&'static Boss], runs: &mut Vec<BattleRun>) {
        let neutral_compat = ShipCompat {
            score: 0.0,
            seat: false,
            trigger: false,
        };
        for &boss in bosses {
            let config =
                self.battle_config(BattleMode::Fbb, false, &[&ship.symbol, boss.name, "reference"]);
            let attacks = simulate_battle(ship, &[], &Opponent::Boss(boss), &config);
            if let Some(summary) = process_battle_run(&attacks, ship, &[]) {
                runs.push(build_run(
                    summary,
                    RunContext {
                        ship,
                        crew: None,
                        boss: Some(boss),
                        opponent: None,
                        battle: BattleMode::Fbb,
                        role: CrewRole::Offense,
                        compat: neutral_compat,
                        reference: true,
                    },
                ));
            }
        }
        let config = self.battle_config(BattleMode::Arena, false, &[&ship.symbol, "reference"]);
        let attacks = simulate_battle(
            ship,
            &[],
            &Opponent::Ship {
                ship,
                crew: Vec::new(),
            },
            &config,
        );
        if let Some(summary) = process_battle_run(&attacks, ship, &[]) {
            runs.push(build_run(
                summary,
                RunContext {
                    ship,
                    crew: None,
                    boss: None,
                    opponent: Some(ship),
                    battle: BattleMode::Arena,
                    role: CrewRole::Offense,
                    compat: neutral_compat,
                    reference: true,
                },
            ));
        }
    }

    /// Generate the full cross product, fanning ships out across the pool.
    /// A failing ship is logged and skipped; the batch survives.
    pub fn generate_runs(&self, pool: &WorkerPool) -> Vec<BattleRun> {
        self.generate_filtered(pool, None)
    }

    fn generate_filtered(
        &self,
        pool: &WorkerPool,
        crew_filter: Option<&HashSet<String>>,
    ) -> Vec<BattleRun> {
        let ships = self.data.ships();
        let (batches, failures) =
            pool.install(|| map_isolated(ships, |ship| self.ship_runs(ship, crew_filter)));
        for failure in &failures {
            warn!(error = %failure, "skipping ship in battle-run generation");
        }
        let total: usize = batches.iter().map(Vec::len).sum();
        let mut all = Vec::with_capacity(total);
        for batch in batches {
            all.extend(batch);
        }
        renumber(&mut all);
        info!(runs = all.len(), ships = ships.len(), "generated battle runs");
        all
    }

    /// Load the cache if its version is current, simulate only crew added
    /// since it was written, and merge. Any cache problem falls back to a
    /// full regeneration.
    pub fn generate_or_resume(&self, pool: &WorkerPool, cache_path: &Path) -> Vec<BattleRun> {
        match read_cache(cache_path, self.data) {
            Ok(cached) => {
                let covered: HashSet<String> =
                    cached.iter().filter_map(|run| run.crew.clone()).collect();
                let delta: HashSet<String> = self
                    .data
                    .crew()
                    .iter()
                    .filter(|member| !covered.contains(&member.symbol))
                    .map(|member| member.symbol.clone())
                    .collect();
                if delta.is_empty() {
                    info!(runs = cached.len(), "battle-run cache is complete");
                    return cached;
                }
                info!(new_crew = delta.len(), "resuming battle-run cache with delta crew");
                let fresh = self.generate_filtered(pool, Some(&delta));
                let mut merged = cached;
                merged.extend(fresh);
                renumber(&mut merged);
                self.persist(cache_path, &merged);
                merged
            }
            Err(err) => {
                info!(error = %err, "battle-run cache unusable, regenerating");
                let runs = self.generate_runs(pool);
                self.persist(cache_path, &runs);
                runs
            }
        }
    }

    fn persist(&self, cache_path: &Path, runs: &[BattleRun]) {
        if let Err(err) = write_cache(cache_path, runs) {
            warn!(error = %err, "failed to write battle-run cache");
        }
    }

    /// Second-pass battles: staff concrete lineups from crew scores and fight
    /// them head-to-head (arena vs. the division neighbor's own best lineup,
    /// FBB per eligible boss).
    pub fn lineup_runs(&self, crew_scores: &[Score], pool: &WorkerPool) -> Vec<BattleRun> {
        let ships = self.data.ships();
        let (batches, failures) = pool.install(|| {
            map_isolated(ships, |ship| self.ship_lineup_runs(ship, crew_scores))
        });
        for failure in &failures {
            warn!(error = %failure, "skipping ship in lineup pass");
        }
        let mut all: Vec<BattleRun> = batches.into_iter().flatten().collect();
        renumber(&mut all);
        all
    }

    fn staffing_pool(&self, crew_scores: &[Score], mode: BattleMode) -> Vec<StaffCandidate<'a>> {
        crew_scores
            .iter()
            .filter_map(|score| {
                let crew = self.data.crew_member(&score.symbol)?;
                let value = match mode {
                    BattleMode::Arena => score.arena_final,
                    BattleMode::Fbb => score.fbb_final,
                };
                Some(StaffCandidate {
                    crew,
                    score: value,
                    vs_opponent: None,
                })
            })
            .collect()
    }

    fn resolve_lineup(&self, staffed: &Ship) -> Vec<&'a CrewMember> {
        staffed
            .battle_stations
            .iter()
            .filter_map(|station| station.crew.as_deref())
            .filter_map(|symbol| self.data.crew_member(symbol))
            .collect()
    }

    fn lineup_compat(&self, lineup: &[&CrewMember], ship: &Ship) -> ShipCompat {
        if lineup.is_empty() {
            return ShipCompat {
                score: 0.0,
                seat: false,
                trigger: false,
            };
        }
        let total: f64 = lineup
            .iter()
            .map(|member| ship_compat(member, ship).score)
            .sum();
        ShipCompat {
            score: total / lineup.len() as f64,
            seat: true,
            trigger: true,
        }
    }

    fn ship_lineup_runs(
        &self,
        ship: &Ship,
        crew_scores: &[Score],
    ) -> Result<Vec<BattleRun>, OrchestratorError> {
        let mut runs = Vec::new();

        let fbb_pool = self.staffing_pool(crew_scores, BattleMode::Fbb);
        let fbb_ship = staff_ship(ship, BattleMode::Fbb, &fbb_pool, None).ok_or(
            OrchestratorError::NoBattleStations {
                ship: ship.symbol.clone(),
            },
        )?;
        let fbb_lineup = self.resolve_lineup(&fbb_ship);
        if fbb_lineup.is_empty() {
            return Err(OrchestratorError::CannotSeat {
                ship: ship.symbol.clone(),
            });
        }
        let fbb_compat = self.lineup_compat(&fbb_lineup, ship);
        for boss in eligible_bosses(ship.rarity) {
            let config = self.battle_config(
                BattleMode::Fbb,
                false,
                &[&ship.symbol, boss.name, "lineup"],
            );
            let attacks = simulate_battle(ship, &fbb_lineup, &Opponent::Boss(boss), &config);
            if let Some(summary) = process_battle_run(&attacks, ship, &fbb_lineup) {
                runs.push(build_run(
                    summary,
                    RunContext {
                        ship,
                        crew: None,
                        boss: Some(boss),
                        opponent: None,
                        battle: BattleMode::Fbb,
                        role: CrewRole::Offense,
                        compat: fbb_compat,
                        reference: false,
                    },
                ));
            }
        }

        let arena_pool = self.staffing_pool(crew_scores, BattleMode::Arena);
        if let Some(opponent) = self.data.next_opponent_in_division(ship) {
            let own = staff_ship(ship, BattleMode::Arena, &arena_pool, None);
            let theirs = staff_ship(opponent, BattleMode::Arena, &arena_pool, None);
            if let (Some(own_ship), Some(their_ship)) = (own, theirs) {
                let own_lineup = self.resolve_lineup(&own_ship);
                let their_lineup = self.resolve_lineup(&their_ship);
                if !own_lineup.is_empty() {
                    let compat = self.lineup_compat(&own_lineup, ship);
                    let config = self.battle_config(
                        BattleMode::Arena,
                        false,
                        &[&ship.symbol, &opponent.symbol, "lineup"],
                    );
                    let attacks = simulate_battle(
                        ship,
                        &own_lineup,
                        &Opponent::Ship {
                            ship: opponent,
                            crew: their_lineup,
                        },
                        &config,
                    );
                    if let Some(summary) = process_battle_run(&attacks, ship, &own_lineup) {
                        runs.push(build_run(
                            summary,
                            RunContext {
                                ship,
                                crew: None,
                                boss: None,
                                opponent: Some(opponent),
                                battle: BattleMode::Arena,
                                role: CrewRole::Offense,
                                compat,
                                reference: false,
                            },
                        ));
                    }
                }
            }
        }

        Ok(runs)
    }
}

fn renumber(runs: &mut [BattleRun]) {
    for (index, run) in runs.iter_mut().enumerate() {
        run.id = index as u64;
    }
}

/// Subtract each ship's crewless reference damage from its crewed runs in the
/// same mode and group, clamped at zero. The reference runs themselves pass
/// through untouched.
pub fn apply_reference_calibration(runs: &[BattleRun]) -> Vec<BattleRun> {
    let mut baselines: HashMap<(String, BattleMode, u32), (f64, f64, f64)> = HashMap::new();
    for run in runs.iter().filter(|run| run.reference_battle) {
        baselines.insert(
            (run.ship.clone(), run.battle, run.group()),
            (run.damage, run.min_damage, run.max_damage),
        );
    }
    runs.iter()
        .map(|run| {
            if run.reference_battle {
                return run.clone();
            }
            let Some((damage, min_damage, max_damage)) =
                baselines.get(&(run.ship.clone(), run.battle, run.group()))
            else {
                return run.clone();
            };
            let mut adjusted = run.clone();
            adjusted.damage = (run.damage - damage).max(0.0);
            adjusted.min_damage = (run.min_damage - min_damage).max(0.0);
            adjusted.max_damage = (run.max_damage - max_damage).max(0.0);
            adjusted
        })
        .collect()
}

/// Full two-pass pipeline: orchestrate (or resume), score crew, staff and
/// re-simulate lineups, then recompute ship scores from the lineup battles.
pub fn run_full_scoring(
    data: &GameData,
    options: OrchestratorOptions,
    pool: &WorkerPool,
    cache_path: Option<&Path>,
) -> ScoringOutcome {
    let orchestrator = Orchestrator::new(data, options.clone());
    let runs = match cache_path {
        Some(path) => orchestrator.generate_or_resume(pool, path),
        None => orchestrator.generate_runs(pool),
    };

    let scored_runs = if options.calibrate_against_reference {
        apply_reference_calibration(&runs)
    } else {
        runs.clone()
    };

    let mut crew_scores = score_battle_runs(&scored_runs, ScoreKind::Crew, data);
    normalize_scores(&mut crew_scores);

    let lineup = orchestrator.lineup_runs(&crew_scores, pool);
    let mut ship_scores = if lineup.is_empty() {
        // No lineup could be staffed anywhere; fall back to the pass-1 runs.
        score_battle_runs(&scored_runs, ScoreKind::Ship, data)
    } else {
        score_battle_runs(&lineup, ScoreKind::Ship, data)
    };
    normalize_scores(&mut ship_scores);

    ScoringOutcome {
        crew_scores,
        ship_scores,
        runs,
    }
}
