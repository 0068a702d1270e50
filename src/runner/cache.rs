//! Battle-run cache: flattened run records tagged with a numeric format
//! version. A missing or older version invalidates the whole cache; there is
//! no partial migration. One reader at startup, one writer at the end.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::combat::processor::{BattleRun, CrewRole, ShipCompat};
use crate::combat::simulator::BattleMode;
use crate::data::registry::GameData;
use crate::data::ship::boss_by_id;

/// Bump to invalidate every existing cache file.
pub const CACHE_VERSION: u32 = 3;

#[derive(Debug)]
pub enum CacheError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// Version missing or older than [CACHE_VERSION].
    StaleVersion(Option<u32>),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cache io error: {err}"),
            Self::Parse(err) => write!(f, "cache parse error: {err}"),
            Self::StaleVersion(found) => match found {
                Some(version) => write!(
                    f,
                    "stale cache version {version}, current is {CACHE_VERSION}"
                ),
                None => write!(f, "cache has no version tag"),
            },
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}

/// Flattened run record: ship/crew/boss/opponent are symbol/id references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRun {
    pub id: u64,
    pub ship: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crew: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boss: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent: Option<String>,
    pub division: u32,
    pub damage: f64,
    pub min_damage: f64,
    pub max_damage: f64,
    pub duration: f64,
    pub arena_metric: f64,
    pub seated: Vec<String>,
    pub compat_score: f64,
    pub compat_seat: bool,
    pub compat_trigger: bool,
    pub battle: BattleMode,
    pub role: CrewRole,
    pub win: bool,
    pub reference_battle: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    created: Option<String>,
    runs: Vec<CachedRun>,
}

pub fn battle_runs_to_cache(runs: &[BattleRun]) -> Vec<CachedRun> {
    runs.iter()
        .map(|run| CachedRun {
            id: run.id,
            ship: run.ship.clone(),
            crew: run.crew.clone(),
            boss: run.boss,
            opponent: run.opponent.clone(),
            division: run.division,
            damage: run.damage,
            min_damage: run.min_damage,
            max_damage: run.max_damage,
            duration: run.duration,
            arena_metric: run.arena_metric,
            seated: run.seated.clone(),
            compat_score: run.compat.score,
            compat_seat: run.compat.seat,
            compat_trigger: run.compat.trigger,
            battle: run.battle,
            role: run.role,
            win: run.win,
            reference_battle: run.reference_battle,
        })
        .collect()
}

/// Rehydrate cached runs, resolving every referenced symbol against the
/// registry. Runs referencing unknown ships/crew/bosses are dropped with a
/// warning; they belong to entities removed since the cache was written.
pub fn cache_to_battle_runs(cached: &[CachedRun], data: &GameData) -> Vec<BattleRun> {
    let mut runs = Vec::with_capacity(cached.len());
    for record in cached {
        if data.ship(&record.ship).is_none() {
            warn!(ship = %record.ship, "dropping cached run for unknown ship");
            continue;
        }
        if let Some(crew) = &record.crew {
            if data.crew_member(crew).is_none() {
                warn!(crew = %crew, "dropping cached run for unknown crew");
                continue;
            }
        }
        if let Some(boss) = record.boss {
            if boss_by_id(boss).is_none() {
                warn!(boss, "dropping cached run for unknown boss tier");
                continue;
            }
        }
        if let Some(opponent) = &record.opponent {
            if data.ship(opponent).is_none() {
                warn!(opponent = %opponent, "dropping cached run for unknown opponent");
                continue;
            }
        }
        runs.push(BattleRun {
            id: record.id,
            ship: record.ship.clone(),
            crew: record.crew.clone(),
            boss: record.boss,
            opponent: record.opponent.clone(),
            division: record.division,
            damage: record.damage,
            min_damage: record.min_damage,
            max_damage: record.max_damage,
            duration: record.duration,
            arena_metric: record.arena_metric,
            seated: record.seated.clone(),
            compat: ShipCompat {
                score: record.compat_score,
                seat: record.compat_seat,
                trigger: record.compat_trigger,
            },
            battle: record.battle,
            role: record.role,
            win: record.win,
            reference_battle: record.reference_battle,
        });
    }
    runs
}

/// Read and rehydrate a cache file. Version skew is an error the caller
/// handles by regenerating everything.
pub fn read_cache(path: impl AsRef<Path>, data: &GameData) -> Result<Vec<BattleRun>, CacheError> {
    let raw = fs::read_to_string(path)?;
    let file: CacheFile = serde_json::from_str(&raw)?;
    match file.version {
        Some(version) if version >= CACHE_VERSION => {}
        other => return Err(CacheError::StaleVersion(other)),
    }
    Ok(cache_to_battle_runs(&file.runs, data))
}

pub fn write_cache(path: impl AsRef<Path>, runs: &[BattleRun]) -> Result<(), CacheError> {
    let file = CacheFile {
        version: Some(CACHE_VERSION),
        created: Some(chrono::Utc::now().to_rfc3339()),
        runs: battle_runs_to_cache(runs),
    };
    let payload = serde_json::to_string(&file)?;
    fs::write(path, payload)?;
    Ok(())
}
