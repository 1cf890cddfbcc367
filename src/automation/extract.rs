//! End-of-match result extraction.
//!
//! The recognized victory type and winner come from the screen; the player
//! list comes from the game's own export file. The two are cross-checked so a
//! misread winner can never be recorded.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::MatchupError;

/// One completed match, as written to the results log.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    pub winner: String,
    pub victory: String,
    pub losers: Vec<String>,
    pub duration_secs: f64,
}

/// The subset of the game's match export we consume.
#[derive(Debug, Deserialize)]
pub struct MatchExport {
    #[serde(rename = "Players")]
    pub players: Vec<ExportedPlayer>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExportedPlayer {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "LeaderName")]
    pub leader_name: String,
    #[serde(rename = "CivilizationAdjective")]
    pub civilization_adjective: String,
}

/// Which export entries are real civilizations.
#[derive(Clone, Copy, Debug)]
pub struct PlayerFilter {
    /// Highest id a major civilization can have; city-states sit above it
    pub num_players: i64,
    /// Id of the observer slot
    pub spectator_id: i64,
}

impl PlayerFilter {
    pub fn is_civilization(&self, player: &ExportedPlayer) -> bool {
        player.id != self.spectator_id && player.id <= self.num_players
    }
}

/// A civilization reduced to what the result needs.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Contender {
    leader: String,
    adjective: String,
}

impl MatchExport {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse match export")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read match export {}", path.display()))?;
        Self::parse(&json)
    }
}

/// Builds the result from the export and the recognized winner.
///
/// Fails with `InconsistentState` unless the winner adjective identifies
/// exactly one civilization. Losers keep export order.
pub fn build_match_result(
    export: &MatchExport,
    filter: PlayerFilter,
    winner_adjective: &str,
    victory: &str,
    duration: Duration,
) -> Result<MatchResult, MatchupError> {
    let contenders: Vec<Contender> = export
        .players
        .iter()
        .filter(|p| filter.is_civilization(p))
        .map(|p| Contender {
            leader: p.leader_name.clone(),
            adjective: p.civilization_adjective.to_lowercase(),
        })
        .collect();

    let (winners, losers): (Vec<Contender>, Vec<Contender>) = contenders
        .into_iter()
        .partition(|c| c.adjective == winner_adjective);

    let [winner] = winners.as_slice() else {
        return Err(MatchupError::InconsistentState {
            adjective: winner_adjective.to_string(),
            matches: winners.len(),
        });
    };

    Ok(MatchResult {
        winner: winner.leader.clone(),
        victory: victory.to_string(),
        losers: losers.into_iter().map(|c| c.leader).collect(),
        duration_secs: duration.as_secs_f64(),
    })
}

/// Removes every file in the export directory, creating it if needed.
pub fn clear_export_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove old export {}", path.display()))?;
        }
    }
    Ok(())
}

fn list_export_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read export directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Waits for the game to finish writing its export and returns it parsed.
///
/// The game creates the file before it writes the JSON, so a single file
/// that does not parse yet is re-read on the next poll. Once `timeout`
/// elapses the directory must hold exactly one file and it must parse.
/// More than one file fails immediately.
pub fn wait_for_export(dir: &Path, timeout: Duration, poll: Duration) -> Result<MatchExport> {
    let start = Instant::now();

    loop {
        let files = list_export_files(dir)?;
        let timed_out = start.elapsed() >= timeout;

        match files.as_slice() {
            [path] => match MatchExport::from_file(path) {
                Ok(export) => {
                    tracing::debug!("Read match export {}", path.display());
                    return Ok(export);
                }
                Err(e) if timed_out => return Err(e),
                Err(e) => tracing::debug!("Export not complete yet: {:#}", e),
            },
            [] if !timed_out => {}
            _ => {
                return Err(MatchupError::ExportFileCount {
                    dir: dir.to_path_buf(),
                    count: files.len(),
                }
                .into());
            }
        }
        std::thread::sleep(poll);
    }
}
