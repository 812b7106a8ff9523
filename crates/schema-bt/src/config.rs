#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What happens after the root reports a terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunMode {
    /// Restart at the root on the following tick.
    #[default]
    Looped,
    /// Stay finished; further ticks report the final status until the agent
    /// is restarted.
    SingleRun,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RuntimeConfig {
    pub run_mode: RunMode,

    /// Release an agent's memory records every time the root completes, so the
    /// next pass starts from freshly defaulted records. Off by default: records
    /// persist until the agent is unbound.
    pub reset_memory_on_restart: bool,
}
