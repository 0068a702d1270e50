//! Command-line dispatch. Hand-rolled parsing with positional arguments and a
//! few flags; every handler returns a process exit code (0 ok, 1 runtime
//! failure, 2 usage).

use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::combat::processor::process_battle_run;
use crate::combat::simulator::{simulate_battle, BattleConfig, BattleMode, Opponent};
use crate::config::{load_batch_config, BatchConfig, DEFAULT_CONFIG_PATH};
use crate::data::crew::{load_crew_collection, CrewMember};
use crate::data::registry::GameData;
use crate::data::ship::{boss_by_id, load_ship_schematics, Ship};
use crate::optimizer::{find_best_lineups, FinderOptions};
use crate::parallel::WorkerPool;
use crate::report::{export_runs_csv, write_back_ranks, write_json_report, write_text_report};
use crate::runner::cache::read_cache;
use crate::runner::run_full_scoring;
use crate::util::normalize_symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Score,
    Simulate,
    Optimize,
    Export,
    Validate,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("score") => Some(Command::Score),
        Some("simulate") => Some(Command::Simulate),
        Some("optimize") => Some(Command::Optimize),
        Some("export") => Some(Command::Export),
        Some("validate") => Some(Command::Validate),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Score) => handle_score(args),
        Some(Command::Simulate) => handle_simulate(args),
        Some(Command::Optimize) => handle_optimize(args),
        Some(Command::Export) => handle_export(args),
        Some(Command::Validate) => handle_validate(args),
        None => {
            eprintln!("usage: broadside <score|simulate|optimize|export|validate>");
            2
        }
    }
}

fn handle_score(args: &[String]) -> i32 {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let data = match GameData::load(&config.ships_path, &config.crew_path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("data load error: {err}");
            return 1;
        }
    };

    let pool = if config.workers == 0 {
        WorkerPool::default_workers()
    } else {
        WorkerPool::with_workers(config.workers)
    };
    let outcome = run_full_scoring(
        &data,
        config.orchestrator_options(),
        &pool,
        config.cache_path.as_deref(),
    );

    if let Err(err) = fs::create_dir_all(&config.report_dir) {
        eprintln!("unable to create report dir: {err}");
        return 1;
    }
    let steps = [
        write_text_report(
            config.report_dir.join("rankings.txt"),
            &outcome.crew_scores,
            &outcome.ship_scores,
        ),
        write_json_report(config.report_dir.join("crew_scores.json"), &outcome.crew_scores),
        write_json_report(config.report_dir.join("ship_scores.json"), &outcome.ship_scores),
        export_runs_csv(config.report_dir.join("battle_runs.csv"), &outcome.runs),
    ];
    for step in steps {
        if let Err(err) = step {
            eprintln!("report error: {err}");
            return 1;
        }
    }

    if config.write_back_ranks {
        if let Err(err) = write_back_ranks(
            &config.crew_path,
            &config.ships_path,
            &outcome.crew_scores,
            &outcome.ship_scores,
        ) {
            eprintln!("rank write-back error: {err}");
            return 1;
        }
    }

    println!(
        "scored {} crew and {} ships over {} battle runs -> {}",
        outcome.crew_scores.len(),
        outcome.ship_scores.len(),
        outcome.runs.len(),
        config.report_dir.display()
    );
    0
}

fn handle_simulate(args: &[String]) -> i32 {
    let Some(ship_symbol) = positional(args, 0) else {
        eprintln!(
            "usage: broadside simulate <ship> [opponent] [--boss <id>] [--seconds <n>] [--table]"
        );
        return 2;
    };
    let (data, _config) = match load_data(args) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let Some(ship) = data.ship(&normalize_symbol(&ship_symbol)) else {
        eprintln!("unknown ship '{ship_symbol}'");
        return 1;
    };

    let boss_id = flag_value(args, "--boss").and_then(|raw| raw.parse::<u8>().ok());
    let opponent = match (boss_id, positional(args, 1)) {
        (Some(id), _) => match boss_by_id(id) {
            Some(boss) => Opponent::Boss(boss),
            None => {
                eprintln!("unknown boss tier {id}");
                return 1;
            }
        },
        (None, Some(symbol)) => match data.ship(&normalize_symbol(&symbol)) {
            Some(other) => Opponent::Ship {
                ship: other,
                crew: Vec::new(),
            },
            None => {
                eprintln!("unknown opponent '{symbol}'");
                return 1;
            }
        },
        (None, None) => Opponent::Ship {
            ship,
            crew: Vec::new(),
        },
    };

    let config = BattleConfig {
        mode: if boss_id.is_some() {
            BattleMode::Fbb
        } else {
            BattleMode::Arena
        },
        seconds: parse_u32_arg(flag_value(args, "--seconds"), "seconds", 180),
        seed: parse_u64_arg(flag_value(args, "--seed"), "seed", 0),
        ..BattleConfig::default()
    };

    let attacks = simulate_battle(ship, &[], &opponent, &config);
    let Some(summary) = process_battle_run(&attacks, ship, &[]) else {
        eprintln!("no valid battle for '{ship_symbol}'");
        return 1;
    };

    if args.iter().any(|arg| arg == "--table") {
        println!("ship\tticks\tdamage\tduration\twin");
        println!(
            "{}\t{}\t{:.2}\t{:.1}\t{}",
            ship.symbol,
            attacks.len(),
            summary.damage,
            summary.duration,
            summary.win
        );
    } else {
        match serde_json::to_string_pretty(&summary) {
            Ok(payload) => println!("{payload}"),
            Err(err) => {
                eprintln!("failed to serialize battle summary: {err}");
                return 1;
            }
        }
    }
    0
}

fn handle_optimize(args: &[String]) -> i32 {
    let Some(ship_symbol) = positional(args, 0) else {
        eprintln!("usage: broadside optimize <ship> [opponent|boss:<id>] [max_iterations]");
        return 2;
    };
    let (data, _config) = match load_data(args) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let Some(ship) = data.ship(&normalize_symbol(&ship_symbol)) else {
        eprintln!("unknown ship '{ship_symbol}'");
        return 1;
    };

    let target = positional(args, 1).unwrap_or_else(|| "boss:1".to_string());
    let (opponent, mode) = if let Some(raw_id) = target.strip_prefix("boss:") {
        let Some(boss) = raw_id.parse::<u8>().ok().and_then(boss_by_id) else {
            eprintln!("unknown boss tier '{raw_id}'");
            return 1;
        };
        (Opponent::Boss(boss), BattleMode::Fbb)
    } else {
        let Some(other) = data.ship(&normalize_symbol(&target)) else {
            eprintln!("unknown opponent '{target}'");
            return 1;
        };
        (
            Opponent::Ship {
                ship: other,
                crew: Vec::new(),
            },
            BattleMode::Arena,
        )
    };

    let options = FinderOptions {
        max_iterations: Some(parse_usize_arg(
            positional(args, 2).as_ref(),
            "max_iterations",
            50_000,
        )),
        ..FinderOptions::default()
    };
    let battle_config = BattleConfig {
        mode,
        ..BattleConfig::default()
    };

    let pool: Vec<&CrewMember> = data.crew().iter().collect();
    let results = find_best_lineups(ship, &pool, &opponent, &battle_config, &options, |done| {
        eprintln!("search progress: {:.0}%", done * 100.0);
    });

    match serde_json::to_string_pretty(&results) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize lineup results: {err}");
            1
        }
    }
}

fn handle_export(args: &[String]) -> i32 {
    let (data, config) = match load_data(args) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let cache_path = positional(args, 0)
        .map(PathBuf::from)
        .or_else(|| config.cache_path.clone());
    let Some(cache_path) = cache_path else {
        eprintln!("usage: broadside export <cache.json> [out.csv]");
        return 2;
    };
    let out_path = positional(args, 1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.report_dir.join("battle_runs.csv"));

    let runs = match read_cache(&cache_path, &data) {
        Ok(runs) => runs,
        Err(err) => {
            eprintln!("cache error: {err}");
            return 1;
        }
    };
    if let Some(parent) = out_path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            eprintln!("unable to create output dir: {err}");
            return 1;
        }
    }
    match export_runs_csv(&out_path, &runs) {
        Ok(()) => {
            println!("exported {} runs to {}", runs.len(), out_path.display());
            0
        }
        Err(err) => {
            eprintln!("export failed: {err}");
            1
        }
    }
}

fn handle_validate(args: &[String]) -> i32 {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let ships_path = positional(args, 0)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.ships_path.clone());
    let crew_path = positional(args, 1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.crew_path.clone());

    let ships = match load_ship_schematics(&ships_path) {
        Ok(ships) => ships,
        Err(err) => {
            eprintln!("validation failed: {}: {err}", ships_path.display());
            return 1;
        }
    };
    let crew = match load_crew_collection(&crew_path) {
        Ok(crew) => crew,
        Err(err) => {
            eprintln!("validation failed: {}: {err}", crew_path.display());
            return 1;
        }
    };

    let diagnostics = validate_fleet(&ships, &crew);
    if diagnostics.is_empty() {
        println!(
            "validation passed: {} ships, {} crew",
            ships.len(),
            crew.len()
        );
        return 0;
    }
    let errors = diagnostics
        .iter()
        .filter(|diag| diag.severity == Severity::Error)
        .count();
    eprintln!("validation found {} issue(s):", diagnostics.len());
    for diag in &diagnostics {
        eprintln!("- {diag}");
    }
    i32::from(errors > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub context: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.context, self.message)
    }
}

/// Referential and range checks over a loaded fleet. Enum codes are already
/// enforced at parse time; this covers what serde cannot see.
pub fn validate_fleet(ships: &[Ship], crew: &[CrewMember]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut push = |severity, context: String, message: String| {
        diagnostics.push(Diagnostic {
            severity,
            context,
            message,
        });
    };

    let mut seen_ships = std::collections::HashSet::new();
    for ship in ships {
        let context = format!("ship '{}'", ship.symbol);
        if !seen_ships.insert(ship.symbol.as_str()) {
            push(Severity::Error, context.clone(), "duplicate symbol".into());
        }
        if !(1..=5).contains(&ship.rarity) {
            push(
                Severity::Error,
                context.clone(),
                format!("rarity {} outside 1..=5", ship.rarity),
            );
        }
        if ship.hull <= 0.0 || ship.attack < 0.0 {
            push(
                Severity::Error,
                context.clone(),
                "non-positive hull or negative attack".into(),
            );
        }
        if ship.battle_stations.is_empty() {
            push(
                Severity::Warning,
                context.clone(),
                "no battle stations; ship will be skipped by the orchestrator".into(),
            );
        }
        for action in &ship.actions {
            if action.source.is_crew() || action.source.symbol() != ship.symbol {
                push(
                    Severity::Error,
                    format!("{context} action '{}'", action.symbol),
                    "action source does not name the owning ship".into(),
                );
            }
        }
    }

    let mut seen_crew = std::collections::HashSet::new();
    for member in crew {
        let context = format!("crew '{}'", member.symbol);
        if !seen_crew.insert(member.symbol.as_str()) {
            push(Severity::Error, context.clone(), "duplicate symbol".into());
        }
        if member.skill_order.is_empty() {
            push(
                Severity::Error,
                context.clone(),
                "empty skill order; member can never be seated".into(),
            );
        }
        if !member.action.source.is_crew() || member.action.source.symbol() != member.symbol {
            push(
                Severity::Error,
                context.clone(),
                "action source does not name the owning crew member".into(),
            );
        }
        if member.action.cooldown <= 0.0 {
            push(
                Severity::Warning,
                context.clone(),
                "non-positive action cooldown".into(),
            );
        }
    }

    diagnostics
}

fn load_config(args: &[String]) -> Result<BatchConfig, i32> {
    let config_path = flag_value(args, "--config")
        .map(String::from)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    load_batch_config(&config_path).map_err(|err| {
        eprintln!("config error: {err}");
        1
    })
}

fn load_data(args: &[String]) -> Result<(std::sync::Arc<GameData>, BatchConfig), i32> {
    let config = load_config(args)?;
    match GameData::load(&config.ships_path, &config.crew_path) {
        Ok(data) => Ok((data, config)),
        Err(err) => {
            eprintln!("data load error: {err}");
            Err(1)
        }
    }
}

/// Positional arguments after the subcommand, skipping flags and their values.
fn positional(args: &[String], index: usize) -> Option<String> {
    let mut found = 0usize;
    let mut cursor = 2;
    while cursor < args.len() {
        let arg = &args[cursor];
        if arg.starts_with("--") {
            cursor += if flag_takes_value(arg) { 2 } else { 1 };
            continue;
        }
        if found == index {
            return Some(arg.clone());
        }
        found += 1;
        cursor += 1;
    }
    None
}

fn flag_takes_value(flag: &str) -> bool {
    matches!(flag, "--config" | "--boss" | "--seconds" | "--seed")
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|position| args.get(position + 1))
}

fn parse_u32_arg(raw: Option<&String>, name: &str, default: u32) -> u32 {
    raw.and_then(|value| value.parse::<u32>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

fn parse_u64_arg(raw: Option<&String>, name: &str, default: u64) -> u64 {
    raw.and_then(|value| value.parse::<u64>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

fn parse_usize_arg(raw: Option<&String>, name: &str, default: usize) -> usize {
    raw.and_then(|value| value.parse::<usize>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::action::{ActionSource, BonusStat, ShipAction, Skill};

    #[test]
    fn command_parsing_matches_the_fixed_set() {
        let args = |name: &str| vec!["broadside".to_string(), name.to_string()];
        assert_eq!(parse_command(&args("score")), Some(Command::Score));
        assert_eq!(parse_command(&args("simulate")), Some(Command::Simulate));
        assert_eq!(parse_command(&args("optimize")), Some(Command::Optimize));
        assert_eq!(parse_command(&args("export")), Some(Command::Export));
        assert_eq!(parse_command(&args("validate")), Some(Command::Validate));
        assert_eq!(parse_command(&args("serve")), None);
        assert_eq!(parse_command(&["broadside".to_string()]), None);
    }

    #[test]
    fn positional_skips_flags_and_their_values() {
        let args: Vec<String> = [
            "broadside",
            "simulate",
            "--config",
            "alt.yaml",
            "cutter",
            "--table",
            "gunboat",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(positional(&args, 0).as_deref(), Some("cutter"));
        assert_eq!(positional(&args, 1).as_deref(), Some("gunboat"));
        assert_eq!(positional(&args, 2), None);
        assert_eq!(
            flag_value(&args, "--config").map(String::as_str),
            Some("alt.yaml")
        );
    }

    fn minimal_crew(symbol: &str, source_symbol: &str, skills: Vec<Skill>) -> CrewMember {
        CrewMember {
            symbol: symbol.into(),
            name: symbol.to_uppercase(),
            max_rarity: 3,
            skill_order: skills,
            action: ShipAction {
                symbol: format!("{symbol}_action"),
                name: format!("{symbol} action"),
                source: ActionSource::Crew {
                    symbol: source_symbol.into(),
                },
                bonus_stat: BonusStat::Attack,
                bonus_amount: 1,
                ability: None,
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

    #[test]
    fn fleet_validation_flags_referential_breaks() {
        let good = minimal_crew("torres", "torres", vec![Skill::Engineering]);
        let mismatched = minimal_crew("paris", "torres", vec![Skill::Command]);
        let unseatable = minimal_crew("doctor", "doctor", Vec::new());

        let diagnostics = validate_fleet(&[], &[good, mismatched, unseatable]);
        assert_eq!(
            diagnostics
                .iter()
                .filter(|diag| diag.severity == Severity::Error)
                .count(),
            2
        );
        assert!(diagnostics
            .iter()
            .any(|diag| diag.context.contains("paris") && diag.message.contains("source")));
        assert!(diagnostics
            .iter()
            .any(|diag| diag.context.contains("doctor") && diag.message.contains("skill order")));
    }

    #[test]
    fn duplicate_symbols_are_errors() {
        let crew = vec![
            minimal_crew("twin", "twin", vec![Skill::Command]),
            minimal_crew("twin", "twin", vec![Skill::Command]),
        ];
        let diagnostics = validate_fleet(&[], &crew);
        assert!(diagnostics
            .iter()
            .any(|diag| diag.severity == Severity::Error && diag.message.contains("duplicate")));
    }
}
