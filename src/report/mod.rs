//! Report generation and rank write-back: a ranked human-readable text
//! listing, a machine-readable JSON score dump, a CSV export of battle runs,
//! and the merge of final ranks back into the source data files.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::combat::processor::{BattleRun, CrewRole};
use crate::combat::simulator::BattleMode;
use crate::scoring::{Score, ScoreSegment};

/// Scores sorted for presentation: best overall first, symbol as tiebreak.
fn presentation_order(scores: &[Score]) -> Vec<&Score> {
    let mut ordered: Vec<&Score> = scores.iter().collect();
    ordered.sort_by(|left, right| {
        right
            .overall_final
            .total_cmp(&left.overall_final)
            .then_with(|| left.symbol.cmp(&right.symbol))
    });
    ordered
}

/// The staffing that achieved the symbol's strongest segment.
fn best_staffing(score: &Score) -> Option<&[String]> {
    score
        .arena_data
        .iter()
        .chain(score.fbb_data.iter())
        .max_by(|left, right| left.final_score.total_cmp(&right.final_score))
        .map(|segment| segment.max_staff.as_slice())
        .filter(|staff| !staff.is_empty())
}

fn render_segment(out: &mut String, segment: &ScoreSegment, mode: BattleMode) {
    let bucket = match mode {
        BattleMode::Arena => format!("arena division {}", segment.group),
        BattleMode::Fbb => format!("fbb boss {}", segment.group),
    };
    let role = match segment.role {
        CrewRole::Offense => "offense",
        CrewRole::Defense => "defense",
    };
    let _ = writeln!(
        out,
        "     {bucket} ({role}): final {:.1}, runs {}, wins {}, max damage {:.0}",
        segment.final_score, segment.count, segment.win_count, segment.max_damage
    );
}

fn render_block(out: &mut String, rank: usize, score: &Score) {
    let _ = writeln!(
        out,
        "{rank:4}. {} ({})  overall {:.2}  arena {:.2}  fbb {:.2}",
        score.name, score.symbol, score.overall_final, score.arena_final, score.fbb_final
    );
    if let Some(staff) = best_staffing(score) {
        let _ = writeln!(out, "     best staffing: {}", staff.join(", "));
    }
    for segment in &score.arena_data {
        render_segment(out, segment, BattleMode::Arena);
    }
    for segment in &score.fbb_data {
        render_segment(out, segment, BattleMode::Fbb);
    }
}

/// Render the full ranked listing: crew first, then ships.
pub fn render_text_report(crew_scores: &[Score], ship_scores: &[Score]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "BROADSIDE FLEET RANKINGS");
    let _ = writeln!(out, "generated {}", chrono::Utc::now().to_rfc3339());
    let _ = writeln!(out);

    let _ = writeln!(out, "== CREW ==");
    for (position, score) in presentation_order(crew_scores).into_iter().enumerate() {
        render_block(&mut out, position + 1, score);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "== SHIPS ==");
    for (position, score) in presentation_order(ship_scores).into_iter().enumerate() {
        render_block(&mut out, position + 1, score);
    }
    out
}

pub fn write_text_report(
    path: impl AsRef<Path>,
    crew_scores: &[Score],
    ship_scores: &[Score],
) -> Result<(), String> {
    fs::write(path.as_ref(), render_text_report(crew_scores, ship_scores))
        .map_err(|err| err.to_string())
}

pub fn write_json_report(path: impl AsRef<Path>, scores: &[Score]) -> Result<(), String> {
    let json = serde_json::to_string_pretty(scores).map_err(|err| err.to_string())?;
    fs::write(path.as_ref(), json).map_err(|err| err.to_string())
}

/// Flat CSV of battle runs, one row per run.
pub fn export_runs_csv(path: impl AsRef<Path>, runs: &[BattleRun]) -> Result<(), String> {
    let mut writer = csv::Writer::from_path(path.as_ref()).map_err(|err| err.to_string())?;
    writer
        .write_record([
            "id",
            "ship",
            "crew",
            "boss",
            "opponent",
            "division",
            "battle",
            "role",
            "damage",
            "min_damage",
            "max_damage",
            "duration",
            "arena_metric",
            "compat",
            "win",
            "reference_battle",
            "seated",
        ])
        .map_err(|err| err.to_string())?;
    for run in runs {
        let battle = match run.battle {
            BattleMode::Arena => "arena",
            BattleMode::Fbb => "fbb",
        };
        let role = match run.role {
            CrewRole::Offense => "offense",
            CrewRole::Defense => "defense",
        };
        writer
            .write_record([
                run.id.to_string(),
                run.ship.clone(),
                run.crew.clone().unwrap_or_default(),
                run.boss.map(|id| id.to_string()).unwrap_or_default(),
                run.opponent.clone().unwrap_or_default(),
                run.division.to_string(),
                battle.to_string(),
                role.to_string(),
                format!("{:.2}", run.damage),
                format!("{:.2}", run.min_damage),
                format!("{:.2}", run.max_damage),
                format!("{:.2}", run.duration),
                format!("{:.2}", run.arena_metric),
                format!("{:.2}", run.compat.score),
                run.win.to_string(),
                run.reference_battle.to_string(),
                run.seated.join("|"),
            ])
            .map_err(|err| err.to_string())?;
    }
    writer.flush().map_err(|err| err.to_string())
}

/// 1-based rank positions by descending overall score.
fn rank_positions(scores: &[Score]) -> Vec<(String, usize)> {
    presentation_order(scores)
        .iter()
        .enumerate()
        .map(|(index, score)| (score.symbol.clone(), index + 1))
        .collect()
}

fn merge_ranks_into_file(
    path: &Path,
    update: impl Fn(&mut serde_json::Map<String, Value>, &str),
) -> Result<(), String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("unable to read '{}': {err}", path.display()))?;
    let mut payload: Value = serde_json::from_str(&raw)
        .map_err(|err| format!("unable to parse '{}': {err}", path.display()))?;
    let entries = payload
        .as_array_mut()
        .ok_or_else(|| format!("'{}' is not a JSON array", path.display()))?;
    for entry in entries {
        let Some(object) = entry.as_object_mut() else {
            continue;
        };
        let Some(symbol) = object.get("symbol").and_then(Value::as_str).map(String::from) else {
            continue;
        };
        update(object, &symbol);
    }
    let serialized = serde_json::to_string_pretty(&payload).map_err(|err| err.to_string())?;
    fs::write(path, serialized).map_err(|err| err.to_string())
}

/// Merge final ranks into the source files in place: each crew entry gains
/// `ranks.ship`, each ship entry gains a `ranks` object with per-mode
/// positions. Entries without a score are left untouched.
pub fn write_back_ranks(
    crew_path: impl AsRef<Path>,
    ships_path: impl AsRef<Path>,
    crew_scores: &[Score],
    ship_scores: &[Score],
) -> Result<(), String> {
    let lookup = |table: &[(String, usize)], symbol: &str| {
        table
            .iter()
            .find(|(candidate, _)| candidate == symbol)
            .map(|&(_, rank)| rank)
    };

    let crew_ranks = rank_positions(crew_scores);
    merge_ranks_into_file(crew_path.as_ref(), |object, symbol| {
        let Some(rank) = lookup(&crew_ranks, symbol) else {
            return;
        };
        let ranks = object.entry("ranks").or_insert_with(|| json!({}));
        if let Some(ranks) = ranks.as_object_mut() {
            ranks.insert("ship".to_string(), json!(rank));
        }
    })?;

    let overall = rank_positions(ship_scores);
    let arena_order = {
        let mut ordered: Vec<&Score> = ship_scores.iter().collect();
        ordered.sort_by(|left, right| {
            right
                .arena_final
                .total_cmp(&left.arena_final)
                .then_with(|| left.symbol.cmp(&right.symbol))
        });
        ordered
            .iter()
            .enumerate()
            .map(|(index, score)| (score.symbol.clone(), index + 1))
            .collect::<Vec<_>>()
    };
    let fbb_order = {
        let mut ordered: Vec<&Score> = ship_scores.iter().collect();
        ordered.sort_by(|left, right| {
            right
                .fbb_final
                .total_cmp(&left.fbb_final)
                .then_with(|| left.symbol.cmp(&right.symbol))
        });
        ordered
            .iter()
            .enumerate()
            .map(|(index, score)| (score.symbol.clone(), index + 1))
            .collect::<Vec<_>>()
    };
    merge_ranks_into_file(ships_path.as_ref(), |object, symbol| {
        let Some(rank) = lookup(&overall, symbol) else {
            return;
        };
        let arena = lookup(&arena_order, symbol).unwrap_or(rank);
        let fbb = lookup(&fbb_order, symbol).unwrap_or(rank);
        object.insert(
            "ranks".to_string(),
            json!({ "overall": rank, "arena": arena, "fbb": fbb }),
        );
    })
}
