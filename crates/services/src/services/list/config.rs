use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ListError;

/// Where optimistic creates (and late-confirmed creates) enter the order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InsertPosition {
    #[default]
    Front,
    Back,
}

/// Who wins when a fetched page carries a row that has a pending local mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    ClientWins,
    ServerWins,
}

/// Tuning for one list instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListConfig {
    pub page_size: usize,
    pub overscan: usize,
    pub mutation_timeout_ms: u64,
    pub insert_position: InsertPosition,
    pub conflict_policy: ConflictPolicy,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: 25,
            overscan: 5,
            mutation_timeout_ms: 30_000,
            insert_position: InsertPosition::Front,
            conflict_policy: ConflictPolicy::ClientWins,
        }
    }
}

impl ListConfig {
    pub fn mutation_timeout(&self) -> Duration {
        Duration::from_millis(self.mutation_timeout_ms)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<(), ListError> {
        if self.page_size == 0 {
            return Err(ListError::InvalidArgument(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.mutation_timeout_ms == 0 {
            return Err(ListError::InvalidArgument(
                "mutation_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
