//! Replacement strategy selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which end of the used list the evictor scans from.
///
/// The used list runs from most-recently-touched (head) to
/// least-recently-touched (tail). LRU takes its victim from the tail end,
/// MRU from the head end; fixed frames are skipped in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementStrategy {
    /// Evict the frame touched longest ago
    #[default]
    Lru,
    /// Evict the frame touched most recently
    Mru,
}

impl fmt::Display for ReplacementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lru => write!(f, "LRU"),
            Self::Mru => write!(f, "MRU"),
        }
    }
}

impl FromStr for ReplacementStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LRU" => Ok(Self::Lru),
            "MRU" => Ok(Self::Mru),
            other => Err(format!("unknown replacement strategy: {other}")),
        }
    }
}
