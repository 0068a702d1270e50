//! End-to-end pipeline tests over a small synthetic fleet: orchestrate,
//! score, staff, report, and write ranks back, all inside a tempdir.

use std::fs;
use std::path::Path;

use broadside::config::load_batch_config;
use broadside::data::registry::GameData;
use broadside::parallel::WorkerPool;
use broadside::report::{write_json_report, write_text_report};
use broadside::runner::{run_full_scoring, OrchestratorOptions};
use broadside::scoring::Score;

const SHIPS_JSON: &str = r#"[
  {
    "symbol": "corvette", "name": "Corvette", "rarity": 2,
    "hull": 200000.0, "attack": 30000.0, "accuracy": 9000.0, "evasion": 9000.0,
    "crit_chance": 1000.0, "crit_bonus": 1000.0, "attacks_per_second": 1.0,
    "battle_stations": [{"skill": 0}, {"skill": 2}],
    "actions": []
  },
  {
    "symbol": "gunboat", "name": "Gunboat", "rarity": 2,
    "hull": 180000.0, "attack": 36000.0, "accuracy": 9000.0, "evasion": 9000.0,
    "crit_chance": 1000.0, "crit_bonus": 1000.0, "attacks_per_second": 1.0,
    "battle_stations": [{"skill": 0}, {"skill": 3}],
    "actions": []
  }
]"#;

const CREW_JSON: &str = r#"[
  {
    "symbol": "gunner", "name": "Gunner", "max_rarity": 4, "skill_order": [0],
    "action": {
      "symbol": "gunner_action", "name": "Volley",
      "source": {"crew": {"symbol": "gunner"}},
      "bonus_stat": 0, "bonus_amount": 3,
      "ability": {"type": 1, "amount": 20.0},
      "initial_cooldown": 2.0, "cooldown": 8.0, "duration": 4.0
    }
  },
  {
    "symbol": "engineer", "name": "Engineer", "max_rarity": 4, "skill_order": [2, 3],
    "action": {
      "symbol": "engineer_action", "name": "Patch Hull",
      "source": {"crew": {"symbol": "engineer"}},
      "bonus_stat": 1, "bonus_amount": 2,
      "ability": {"type": 2, "amount": 15.0},
      "initial_cooldown": 4.0, "cooldown": 12.0, "duration": 2.0
    }
  }
]"#;

fn write_fleet(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let ships_path = dir.join("ships.json");
    let crew_path = dir.join("crew.json");
    fs::write(&ships_path, SHIPS_JSON).unwrap();
    fs::write(&crew_path, CREW_JSON).unwrap();
    (ships_path, crew_path)
}

fn quick_options() -> OrchestratorOptions {
    OrchestratorOptions {
        seconds: 10,
        rate: 5,
        ..OrchestratorOptions::default()
    }
}

#[test]
fn library_pipeline_scores_and_reports_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (ships_path, crew_path) = write_fleet(dir.path());
    let data = GameData::load(&ships_path, &crew_path).unwrap();

    let cache_path = dir.path().join("battle_runs.json");
    let outcome = run_full_scoring(
        &data,
        quick_options(),
        &WorkerPool::default_workers(),
        Some(&cache_path),
    );
    assert_eq!(outcome.crew_scores.len(), 2);
    assert_eq!(outcome.ship_scores.len(), 2);
    assert!(!outcome.runs.is_empty());
    assert!(cache_path.exists(), "orchestrator persists the cache");
    for score in outcome.crew_scores.iter().chain(outcome.ship_scores.iter()) {
        assert!((0.0..=10.0 + f64::EPSILON).contains(&score.overall_final));
    }

    // The reports survive a serde round trip and mention every symbol.
    let text_path = dir.path().join("rankings.txt");
    let json_path = dir.path().join("crew_scores.json");
    write_text_report(&text_path, &outcome.crew_scores, &outcome.ship_scores).unwrap();
    write_json_report(&json_path, &outcome.crew_scores).unwrap();

    let report = fs::read_to_string(&text_path).unwrap();
    for symbol in ["gunner", "engineer", "corvette", "gunboat"] {
        assert!(report.contains(symbol), "report misses {symbol}");
    }
    let restored: Vec<Score> =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(restored, outcome.crew_scores);
}

#[test]
fn score_command_produces_reports_and_ranks() {
    let dir = tempfile::tempdir().unwrap();
    let (ships_path, crew_path) = write_fleet(dir.path());
    let report_dir = dir.path().join("reports");
    let config_path = dir.path().join("broadside.yaml");
    fs::write(
        &config_path,
        format!(
            "ships_path: {}\ncrew_path: {}\ncache_path: {}\nreport_dir: {}\nseconds: 10\nrate: 5\nwrite_back_ranks: true\n",
            ships_path.display(),
            crew_path.display(),
            dir.path().join("battle_runs.json").display(),
            report_dir.display(),
        ),
    )
    .unwrap();

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_broadside"))
        .args(["score", "--config", config_path.to_str().unwrap()])
        .status()
        .expect("run score");
    assert!(status.success(), "score should succeed");

    for artifact in [
        "rankings.txt",
        "crew_scores.json",
        "ship_scores.json",
        "battle_runs.csv",
    ] {
        assert!(
            report_dir.join(artifact).exists(),
            "{artifact} should exist"
        );
    }

    // Ranks were merged back into the source files.
    let crew_payload: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&crew_path).unwrap()).unwrap();
    assert!(crew_payload[0]["ranks"]["ship"].is_number());
    let ships_payload: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&ships_path).unwrap()).unwrap();
    assert!(ships_payload[0]["ranks"]["overall"].is_number());

    // A second invocation resumes from the cache and still succeeds.
    let status = std::process::Command::new(env!("CARGO_BIN_EXE_broadside"))
        .args(["score", "--config", config_path.to_str().unwrap()])
        .status()
        .expect("re-run score");
    assert!(status.success(), "cached score should succeed");
}

#[test]
fn validate_command_accepts_the_synthetic_fleet() {
    let dir = tempfile::tempdir().unwrap();
    let (ships_path, crew_path) = write_fleet(dir.path());

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_broadside"))
        .args([
            "validate",
            ships_path.to_str().unwrap(),
            crew_path.to_str().unwrap(),
        ])
        .output()
        .expect("run validate");
    assert!(
        output.status.success(),
        "validate should pass: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("validation passed"));
}

#[test]
fn malformed_config_is_a_runtime_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("broadside.yaml");
    fs::write(&config_path, "seconds: [broken\n").unwrap();
    assert!(load_batch_config(&config_path).is_err());

    let status = std::process::Command::new(env!("CARGO_BIN_EXE_broadside"))
        .args(["score", "--config", config_path.to_str().unwrap()])
        .status()
        .expect("run score");
    assert_eq!(status.code(), Some(1));
}
