//! Scoring engine: buckets battle runs by division or boss tier, computes
//! per-bucket statistics and rank positions, derives per-bucket finals
//! relative to the best like bucket, and normalizes everything onto a 0-10
//! scale. Runs are never mutated; only derived score fields are written.

pub mod staffing;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::combat::processor::{BattleRun, CrewRole};
use crate::combat::simulator::BattleMode;
use crate::data::registry::GameData;

/// Divisions span 1..=3; the boost denominator needs one past the top group.
const ARENA_GROUP_SPAN: f64 = 4.0;
/// Boss tiers span 1..=6.
const FBB_GROUP_SPAN: f64 = 7.0;

/// Multiplier for symbols with no triggered ability at all.
const PASSIVE_ONLY_PENALTY: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreKind {
    Crew,
    Ship,
}

/// Per-bucket aggregate for one symbol in one division or boss tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSegment {
    pub group: u32,
    pub role: CrewRole,
    pub max_damage: f64,
    pub max_staff: Vec<String>,
    pub min_damage: f64,
    pub min_staff: Vec<String>,
    pub total_damage: f64,
    pub duration: f64,
    pub total_compat: f64,
    pub count: usize,
    pub win_count: usize,
    /// Total number of runs competing in this (mode, group, role) bucket.
    pub group_size: usize,
    /// Rank positions of this symbol's runs within the bucket ordering.
    pub indices: Vec<usize>,
    pub average_index: f64,
    pub median_index: f64,
    pub final_score: f64,
}

impl ScoreSegment {
    fn new(group: u32, role: CrewRole) -> Self {
        Self {
            group,
            role,
            max_damage: f64::MIN,
            max_staff: Vec::new(),
            min_damage: f64::MAX,
            min_staff: Vec::new(),
            total_damage: 0.0,
            duration: 0.0,
            total_compat: 0.0,
            count: 0,
            win_count: 0,
            group_size: 0,
            indices: Vec::new(),
            average_index: 0.0,
            median_index: 0.0,
            final_score: 0.0,
        }
    }

    fn absorb(&mut self, run: &BattleRun, rank_index: usize) {
        if run.damage > self.max_damage {
            self.max_damage = run.damage;
            self.max_staff = run.seated.clone();
        }
        if run.damage < self.min_damage {
            self.min_damage = run.damage;
            self.min_staff = run.seated.clone();
        }
        self.total_damage += run.damage;
        self.duration += run.duration;
        self.total_compat += run.compat.score;
        self.count += 1;
        if run.win {
            self.win_count += 1;
        }
        self.indices.push(rank_index);
    }

    fn average_compat(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_compat / self.count as f64
        }
    }

    fn settle_indices(&mut self) {
        if self.indices.is_empty() {
            return;
        }
        let sum: usize = self.indices.iter().sum();
        self.average_index = sum as f64 / self.indices.len() as f64;
        let mut sorted = self.indices.clone();
        sorted.sort_unstable();
        let middle = sorted.len() / 2;
        self.median_index = if sorted.len() % 2 == 1 {
            sorted[middle] as f64
        } else {
            (sorted[middle - 1] + sorted[middle]) as f64 / 2.0
        };
    }
}

/// Per-symbol score record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub kind: ScoreKind,
    pub symbol: String,
    pub name: String,
    pub arena_data: Vec<ScoreSegment>,
    pub fbb_data: Vec<ScoreSegment>,
    pub arena_final: f64,
    pub fbb_final: f64,
    pub overall_final: f64,
}

impl Score {
    fn new(kind: ScoreKind, symbol: String, name: String) -> Self {
        Self {
            kind,
            symbol,
            name,
            arena_data: Vec::new(),
            fbb_data: Vec::new(),
            arena_final: 0.0,
            fbb_final: 0.0,
            overall_final: 0.0,
        }
    }

    fn segment_for(&mut self, mode: BattleMode, group: u32, role: CrewRole) -> &mut ScoreSegment {
        let segments = match mode {
            BattleMode::Arena => &mut self.arena_data,
            BattleMode::Fbb => &mut self.fbb_data,
        };
        // Group ids never repeat within one list.
        if let Some(position) = segments.iter().position(|segment| segment.group == group) {
            return &mut segments[position];
        }
        segments.push(ScoreSegment::new(group, role));
        segments.last_mut().expect("just pushed")
    }
}

/// Bucket ordering: arena offense wants wins, then compatibility, then damage
/// throughput; fbb wants compatibility, then raw damage, then staying power.
fn compare_runs(left: &BattleRun, right: &BattleRun) -> std::cmp::Ordering {
    let throughput = |run: &BattleRun| {
        if run.duration > 0.0 {
            run.damage / run.duration
        } else {
            0.0
        }
    };
    match left.battle {
        BattleMode::Arena => match left.role {
            CrewRole::Offense => right
                .win
                .cmp(&left.win)
                .then_with(|| right.compat.score.total_cmp(&left.compat.score))
                .then_with(|| throughput(right).total_cmp(&throughput(left))),
            CrewRole::Defense => right
                .win
                .cmp(&left.win)
                .then_with(|| right.compat.score.total_cmp(&left.compat.score))
                .then_with(|| {
                    (right.duration * right.damage).total_cmp(&(left.duration * left.damage))
                }),
        },
        BattleMode::Fbb => right
            .compat
            .score
            .total_cmp(&left.compat.score)
            .then_with(|| right.damage.total_cmp(&left.damage))
            .then_with(|| right.duration.total_cmp(&left.duration)),
    }
}

type BucketKey = (BattleMode, u32, CrewRole);

/// Sort every (mode, group, role) bucket and hand out rank positions by run id.
fn rank_positions(runs: &[&BattleRun]) -> (HashMap<u64, usize>, HashMap<BucketKey, usize>) {
    let mut buckets: HashMap<BucketKey, Vec<&BattleRun>> = HashMap::new();
    for run in runs {
        buckets
            .entry((run.battle, run.group(), run.role))
            .or_default()
            .push(run);
    }

    let mut positions = HashMap::new();
    let mut sizes = HashMap::new();
    for (key, mut bucket) in buckets {
        bucket.sort_by(|left, right| compare_runs(left, right));
        sizes.insert(key, bucket.len());
        for (index, run) in bucket.iter().enumerate() {
            positions.insert(run.id, index);
        }
    }
    (positions, sizes)
}

/// The bucket metric the finals compare: fbb offense is raw total damage, fbb
/// defense is staying power times damage, arena is rank-position closeness.
fn bucket_metric(segment: &ScoreSegment, mode: BattleMode) -> f64 {
    match (mode, segment.role) {
        (BattleMode::Fbb, CrewRole::Offense) => segment.total_damage,
        (BattleMode::Fbb, CrewRole::Defense) => segment.duration * segment.total_damage,
        (BattleMode::Arena, _) => {
            if segment.group_size == 0 {
                0.0
            } else {
                (segment.group_size as f64 - segment.average_index) / segment.group_size as f64
            }
        }
    }
}

fn has_triggered_ability(kind: ScoreKind, symbol: &str, data: &GameData) -> bool {
    match kind {
        ScoreKind::Crew => data
            .crew_member(symbol)
            .map(|member| member.action.ability.is_some())
            .unwrap_or(false),
        ScoreKind::Ship => data
            .ship(symbol)
            .map(|ship| ship.actions.iter().any(|action| action.ability.is_some()))
            .unwrap_or(false),
    }
}

fn display_name(kind: ScoreKind, symbol: &str, data: &GameData) -> String {
    match kind {
        ScoreKind::Crew => data
            .crew_member(symbol)
            .map(|member| member.name.clone())
            .unwrap_or_else(|| symbol.to_string()),
        ScoreKind::Ship => data
            .ship(symbol)
            .map(|ship| ship.name.clone())
            .unwrap_or_else(|| symbol.to_string()),
    }
}

/// One scoring pass over a run set: bucket, rank, and compute raw (not yet
/// normalized) finals. Scores are rebuilt from scratch every pass.
pub fn score_battle_runs(runs: &[BattleRun], kind: ScoreKind, data: &GameData) -> Vec<Score> {
    let scored: Vec<&BattleRun> = runs.iter().filter(|run| !run.reference_battle).collect();
    let (positions, sizes) = rank_positions(&scored);

    let mut by_symbol: BTreeMap<String, Score> = BTreeMap::new();
    for run in &scored {
        let symbol = match kind {
            ScoreKind::Crew => match &run.crew {
                Some(symbol) => symbol.clone(),
                None => continue,
            },
            ScoreKind::Ship => run.ship.clone(),
        };
        let score = by_symbol.entry(symbol.clone()).or_insert_with(|| {
            Score::new(kind, symbol.clone(), display_name(kind, &symbol, data))
        });
        let rank_index = positions.get(&run.id).copied().unwrap_or(0);
        let segment = score.segment_for(run.battle, run.group(), run.role);
        segment.absorb(run, rank_index);
        segment.group_size = sizes
            .get(&(run.battle, run.group(), run.role))
            .copied()
            .unwrap_or(0);
    }

    let mut scores: Vec<Score> = by_symbol.into_values().collect();
    for score in &mut scores {
        for segment in score.arena_data.iter_mut().chain(score.fbb_data.iter_mut()) {
            segment.settle_indices();
        }
    }

    // Best metric among like buckets of this population.
    let mut tops: HashMap<BucketKey, f64> = HashMap::new();
    for score in &scores {
        for (mode, segments) in [
            (BattleMode::Arena, &score.arena_data),
            (BattleMode::Fbb, &score.fbb_data),
        ] {
            for segment in segments {
                let metric = bucket_metric(segment, mode);
                let top = tops.entry((mode, segment.group, segment.role)).or_insert(0.0);
                if metric > *top {
                    *top = metric;
                }
            }
        }
    }

    for score in &mut scores {
        let penalty = if has_triggered_ability(kind, &score.symbol, data) {
            1.0
        } else {
            PASSIVE_ONLY_PENALTY
        };
        for (mode, span, segments) in [
            (BattleMode::Arena, ARENA_GROUP_SPAN, &mut score.arena_data),
            (BattleMode::Fbb, FBB_GROUP_SPAN, &mut score.fbb_data),
        ] {
            let mut weighted = 0.0;
            for segment in segments.iter_mut() {
                let metric = bucket_metric(segment, mode);
                let top = tops
                    .get(&(mode, segment.group, segment.role))
                    .copied()
                    .unwrap_or(0.0);
                segment.final_score = if top > 0.0 {
                    (metric / top) * 100.0 * segment.average_compat() * penalty
                } else {
                    0.0
                };
                // Harder groups weigh heavier.
                weighted += segment.final_score
                    + segment.final_score / (span - segment.group as f64);
            }
            let value = if segments.is_empty() {
                0.0
            } else {
                weighted / segments.len() as f64
            };
            match mode {
                BattleMode::Arena => score.arena_final = value,
                BattleMode::Fbb => score.fbb_final = value,
            }
        }
        score.overall_final = score.arena_final + score.fbb_final;
    }

    scores
}

fn rescale(value: f64, max: f64) -> f64 {
    (value / max * 1000.0).round() / 100.0
}

/// Global normalization onto 0-10 with 0.01 granularity. Near-idempotent:
/// a second application moves nothing by more than the rounding step.
pub fn normalize_scores(scores: &mut [Score]) {
    let max_arena = scores.iter().map(|score| score.arena_final).fold(0.0, f64::max);
    if max_arena > 0.0 {
        for score in scores.iter_mut() {
            score.arena_final = rescale(score.arena_final, max_arena);
        }
    }
    let max_fbb = scores.iter().map(|score| score.fbb_final).fold(0.0, f64::max);
    if max_fbb > 0.0 {
        for score in scores.iter_mut() {
            score.fbb_final = rescale(score.fbb_final, max_fbb);
        }
    }
    for score in scores.iter_mut() {
        score.overall_final = score.arena_final + score.fbb_final;
    }
    let max_overall = scores.iter().map(|score| score.overall_final).fold(0.0, f64::max);
    if max_overall > 0.0 {
        for score in scores.iter_mut() {
            score.overall_final = rescale(score.overall_final, max_overall);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::processor::ShipCompat;

    fn run(
        id: u64,
        ship: &str,
        crew: Option<&str>,
        battle: BattleMode,
        group: u32,
        damage: f64,
        win: bool,
    ) -> BattleRun {
        BattleRun {
            id,
            ship: ship.into(),
            crew: crew.map(Into::into),
            boss: match battle {
                BattleMode::Fbb => Some(group as u8),
                BattleMode::Arena => None,
            },
            opponent: None,
            division: match battle {
                BattleMode::Arena => group,
                BattleMode::Fbb => 1,
            },
            damage,
            min_damage: damage * 0.5,
            max_damage: damage * 1.5,
            duration: 60.0,
            arena_metric: damage / 10.0,
            seated: crew.iter().map(|symbol| symbol.to_string()).collect(),
            compat: ShipCompat {
                score: 1.0,
                seat: true,
                trigger: true,
            },
            battle,
            role: CrewRole::Offense,
            win,
            reference_battle: false,
        }
    }

    fn empty_data() -> GameData {
        GameData::from_parts(Vec::new(), Vec::new())
    }

    #[test]
    fn buckets_never_duplicate_group_ids() {
        let runs = vec![
            run(1, "ship_a", Some("crew_a"), BattleMode::Fbb, 2, 100.0, false),
            run(2, "ship_a", Some("crew_a"), BattleMode::Fbb, 2, 150.0, false),
            run(3, "ship_a", Some("crew_a"), BattleMode::Fbb, 3, 80.0, false),
        ];
        let scores = score_battle_runs(&runs, ScoreKind::Crew, &empty_data());
        assert_eq!(scores.len(), 1);
        let groups: Vec<u32> = scores[0].fbb_data.iter().map(|segment| segment.group).collect();
        assert_eq!(groups, vec![2, 3]);
        assert_eq!(scores[0].fbb_data[0].count, 2);
        assert_eq!(scores[0].fbb_data[0].total_damage, 250.0);
    }

    #[test]
    fn reference_battles_are_excluded_from_scoring() {
        let mut reference = run(1, "ship_a", None, BattleMode::Arena, 1, 500.0, true);
        reference.reference_battle = true;
        let runs = vec![
            reference,
            run(2, "ship_a", Some("crew_a"), BattleMode::Arena, 1, 100.0, false),
        ];
        let scores = score_battle_runs(&runs, ScoreKind::Ship, &empty_data());
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].arena_data[0].count, 1);
    }

    #[test]
    fn higher_fbb_damage_wins_the_bucket() {
        let runs = vec![
            run(1, "ship_a", Some("strong"), BattleMode::Fbb, 1, 1_000.0, false),
            run(2, "ship_a", Some("weak"), BattleMode::Fbb, 1, 250.0, false),
        ];
        let mut scores = score_battle_runs(&runs, ScoreKind::Crew, &empty_data());
        normalize_scores(&mut scores);
        let strong = scores.iter().find(|score| score.symbol == "strong").unwrap();
        let weak = scores.iter().find(|score| score.symbol == "weak").unwrap();
        assert!(strong.fbb_final > weak.fbb_final);
        assert_eq!(strong.overall_final, 10.0);
    }

    #[test]
    fn normalization_is_a_near_fixed_point() {
        let runs = vec![
            run(1, "ship_a", Some("alpha"), BattleMode::Fbb, 1, 900.0, false),
            run(2, "ship_a", Some("beta"), BattleMode::Fbb, 1, 600.0, false),
            run(3, "ship_a", Some("gamma"), BattleMode::Fbb, 1, 120.0, false),
            run(4, "ship_a", Some("alpha"), BattleMode::Arena, 1, 700.0, true),
            run(5, "ship_a", Some("beta"), BattleMode::Arena, 1, 300.0, false),
        ];
        let mut scores = score_battle_runs(&runs, ScoreKind::Crew, &empty_data());
        normalize_scores(&mut scores);
        let snapshot: Vec<(f64, f64, f64)> = scores
            .iter()
            .map(|score| (score.arena_final, score.fbb_final, score.overall_final))
            .collect();
        normalize_scores(&mut scores);
        for (score, (arena, fbb, overall)) in scores.iter().zip(snapshot) {
            assert!((score.arena_final - arena).abs() <= 0.01);
            assert!((score.fbb_final - fbb).abs() <= 0.01);
            assert!((score.overall_final - overall).abs() <= 0.01);
        }
    }

    #[test]
    fn arena_rank_positions_follow_the_win_first_ordering() {
        let runs = vec![
            run(1, "ship_a", Some("winner"), BattleMode::Arena, 2, 100.0, true),
            run(2, "ship_a", Some("bigdamage"), BattleMode::Arena, 2, 900.0, false),
            run(3, "ship_a", Some("loser"), BattleMode::Arena, 2, 50.0, false),
        ];
        let scores = score_battle_runs(&runs, ScoreKind::Crew, &empty_data());
        let by_symbol = |symbol: &str| {
            scores
                .iter()
                .find(|score| score.symbol == symbol)
                .unwrap()
                .arena_data[0]
                .average_index
        };
        assert_eq!(by_symbol("winner"), 0.0, "a win outranks raw damage");
        assert_eq!(by_symbol("bigdamage"), 1.0);
        assert_eq!(by_symbol("loser"), 2.0);
    }
}
