//! Candidate roster loading.

use std::fs;
use std::path::Path;

use anyhow::Context;
use callbridge_core::{assistant::default_roster, Candidate};
use tracing::{info, warn};

/// Roster from `path` (a JSON array of candidates), or the built-in one.
///
/// An unreadable or empty file falls back to the built-in roster.
pub fn load_roster(path: Option<&Path>) -> Vec<Candidate> {
    let Some(path) = path else {
        return default_roster();
    };
    match read_roster(path) {
        Ok(roster) if !roster.is_empty() => {
            info!(path = ?path, candidates = roster.len(), "candidate roster loaded");
            roster
        }
        Ok(_) => {
            warn!(path = ?path, "candidate roster is empty, using built-in roster");
            default_roster()
        }
        Err(e) => {
            warn!(path = ?path, "failed to load candidate roster, using built-in roster: {e:#}");
            default_roster()
        }
    }
}

fn read_roster(path: &Path) -> anyhow::Result<Vec<Candidate>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).context("parsing candidate list")
}
