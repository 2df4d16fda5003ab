//! Session tuning knobs.

use serde::{Deserialize, Serialize};

/// How far an inbound sequence number may stray from the last accepted one.
pub const DEFAULT_SEQ_MAX_DIFF: u32 = 8;

/// How far an inbound timestamp may stray from local time (one day).
pub const DEFAULT_TS_MAX_DIFF_SECS: u64 = 86_400;

/// Replay-window configuration for a session.
///
/// Process-local: never part of saved session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub seq_max_diff: u32,
    pub ts_max_diff_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seq_max_diff: DEFAULT_SEQ_MAX_DIFF,
            ts_max_diff_secs: DEFAULT_TS_MAX_DIFF_SECS,
        }
    }
}
