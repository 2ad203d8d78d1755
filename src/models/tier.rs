use serde::{Deserialize, Serialize};
use std::fmt;

/// Downstream processing channel, selected by accumulated batch size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessTier {
    Small,
    Medium,
    Large,
}

impl ProcessTier {
    /// Tier for a batch that is not big enough for the raw-landing path
    pub fn for_size(size: u64, size_small: u64) -> Self {
        if size < size_small {
            ProcessTier::Small
        } else {
            ProcessTier::Medium
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessTier::Small => "SMALL",
            ProcessTier::Medium => "MEDIUM",
            ProcessTier::Large => "LARGE",
        }
    }
}

impl fmt::Display for ProcessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
