//! Exhaustive best-lineup finder: enumerate crew-to-seat permutations for a
//! fixed ship and opponent (bounded by an iteration budget, since full
//! permutation counts explode combinatorially), simulate each seatable
//! permutation, and keep only strict improvements over the best so far.

use serde::Serialize;

use crate::combat::processor::{process_battle_run, BattleSummary};
use crate::combat::simulator::{simulate_battle, BattleConfig, BattleMode, Opponent};
use crate::data::crew::CrewMember;
use crate::data::ship::Ship;

/// Number of progress callbacks spread over the search.
const PROGRESS_REPORTS: usize = 40;

/// Which damage column ranks a lineup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMethod {
    Standard,
    Min,
    Max,
}

impl RankingMethod {
    fn metric(&self, summary: &BattleSummary) -> f64 {
        match self {
            Self::Standard => summary.damage,
            Self::Min => summary.min_damage,
            Self::Max => summary.max_damage,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FinderOptions {
    /// Upper bound on simulated seatings. None explores the whole space.
    pub max_iterations: Option<usize>,
    /// Length cap of the returned best-run list.
    pub max_results: usize,
    pub ranking: RankingMethod,
}

impl Default for FinderOptions {
    fn default() -> Self {
        Self {
            max_iterations: Some(50_000),
            max_results: 10,
            ranking: RankingMethod::Standard,
        }
    }
}

/// One accepted seating, best first in the finder's output.
#[derive(Debug, Clone, Serialize)]
pub struct LineupRun {
    /// Crew symbols in battle-station order.
    pub seating: Vec<String>,
    pub damage: f64,
    pub min_damage: f64,
    pub max_damage: f64,
    pub duration: f64,
    pub win: bool,
    pub metric: f64,
    /// Percent of the top result's metric.
    pub percentile: f64,
}

/// A challenger beats the incumbent only strictly: in arena a win dominates
/// everything, then the ranking metric decides; fbb is metric only.
fn improves(
    challenger: &BattleSummary,
    incumbent: &BattleSummary,
    mode: BattleMode,
    ranking: RankingMethod,
) -> bool {
    if mode == BattleMode::Arena && challenger.win != incumbent.win {
        return challenger.win;
    }
    ranking.metric(challenger) > ranking.metric(incumbent)
}

struct Search<'a, 'b, F> {
    ship: &'a Ship,
    pool: &'a [&'a CrewMember],
    eligible: Vec<Vec<usize>>,
    opponent: &'a Opponent<'b>,
    config: &'a BattleConfig,
    ranking: RankingMethod,
    budget: usize,
    simulated: usize,
    stride: usize,
    on_progress: F,
    assignment: Vec<usize>,
    used: Vec<bool>,
    best: Option<BattleSummary>,
    accepted: Vec<(BattleSummary, Vec<String>)>,
}

impl<F: FnMut(f64)> Search<'_, '_, F> {
    /// Depth-first seat assignment. Returns false once the budget is spent.
    fn descend(&mut self, station: usize) -> bool {
        if station == self.eligible.len() {
            return self.evaluate();
        }
        for position in 0..self.eligible[station].len() {
            let index = self.eligible[station][position];
            if self.used[index] {
                continue;
            }
            self.used[index] = true;
            self.assignment.push(index);
            let keep_going = self.descend(station + 1);
            self.assignment.pop();
            self.used[index] = false;
            if !keep_going {
                return false;
            }
        }
        true
    }

    fn evaluate(&mut self) -> bool {
        // Crew in station order: the seat matcher walks stations in order, so
        // this reproduces the assignment exactly.
        let crew: Vec<&CrewMember> = self.assignment.iter().map(|&index| self.pool[index]).collect();
        let attacks = simulate_battle(self.ship, &crew, self.opponent, self.config);
        self.simulated += 1;
        if self.simulated % self.stride == 0 {
            (self.on_progress)((self.simulated as f64 / self.budget as f64).min(1.0));
        }

        if let Some(summary) = process_battle_run(&attacks, self.ship, &crew) {
            let accept = match &self.best {
                Some(best) => improves(&summary, best, self.config.mode, self.ranking),
                None => true,
            };
            if accept {
                let seating = crew.iter().map(|member| member.symbol.clone()).collect();
                self.best = Some(summary.clone());
                self.accepted.push((summary, seating));
            }
        }

        self.simulated < self.budget
    }
}

/// Upper bound on seatable permutations, for the progress denominator.
fn permutation_bound(eligible: &[Vec<usize>]) -> usize {
    eligible
        .iter()
        .fold(1usize, |acc, seats| acc.saturating_mul(seats.len().max(1)))
}

/// Run the search. Output is the trajectory of strict improvements, best
/// first, capped at `max_results`, each with a percentile against the top.
pub fn find_best_lineups<F: FnMut(f64)>(
    ship: &Ship,
    pool: &[&CrewMember],
    opponent: &Opponent<'_>,
    config: &BattleConfig,
    options: &FinderOptions,
    on_progress: F,
) -> Vec<LineupRun> {
    if ship.battle_stations.is_empty() || pool.is_empty() {
        return Vec::new();
    }

    // Seatability pre-filter: a permutation that cannot man every station by
    // skill never reaches the simulator.
    let eligible: Vec<Vec<usize>> = ship
        .battle_stations
        .iter()
        .map(|station| {
            (0..pool.len())
                .filter(|&index| {
                    config.ignore_skill || pool[index].skill_order.contains(&station.skill)
                })
                .collect()
        })
        .collect();
    if eligible.iter().any(Vec::is_empty) {
        return Vec::new();
    }

    let budget = options
        .max_iterations
        .unwrap_or(usize::MAX)
        .min(permutation_bound(&eligible))
        .max(1);
    let stride = (budget / PROGRESS_REPORTS).max(1);

    let mut search = Search {
        ship,
        pool,
        eligible,
        opponent,
        config,
        ranking: options.ranking,
        budget,
        simulated: 0,
        stride,
        on_progress,
        assignment: Vec::with_capacity(ship.battle_stations.len()),
        used: vec![false; pool.len()],
        best: None,
        accepted: Vec::new(),
    };
    search.descend(0);

    let mut accepted = search.accepted;
    // The trajectory improves monotonically, so descending order is a reverse.
    accepted.reverse();
    accepted.truncate(options.max_results);

    let top_metric = accepted
        .first()
        .map(|(summary, _)| options.ranking.metric(summary))
        .unwrap_or(0.0);
    accepted
        .into_iter()
        .map(|(summary, seating)| {
            let metric = options.ranking.metric(&summary);
            LineupRun {
                seating,
                damage: summary.damage,
                min_damage: summary.min_damage,
                max_damage: summary.max_damage,
                duration: summary.duration,
                win: summary.win,
                metric,
                percentile: if top_metric > 0.0 {
                    metric / top_metric * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect()
}
