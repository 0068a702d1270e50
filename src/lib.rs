//! Broadside: turn-by-turn starship combat simulation used as an oracle for
//! crew/ship staffing search and fleet-wide normalized rankings.
//!
//! The pipeline: load fleet data, simulate the ship x crew x opponent cross
//! product, reduce each timeline to a battle-run summary, score and normalize,
//! staff concrete lineups from the scores, re-simulate those lineups
//! head-to-head, and report.

pub mod cli;
pub mod combat;
pub mod config;
pub mod data;
pub mod optimizer;
pub mod parallel;
pub mod report;
pub mod runner;
pub mod scoring;
pub mod util;
