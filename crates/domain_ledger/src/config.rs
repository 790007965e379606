//! Engine settings

use serde::{Deserialize, Serialize};

use core_kernel::Timezone;

/// Settings the engine needs at runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Business timezone for calendar-day queries and document numbers
    pub timezone: Timezone,
    /// Prefix of customer receipt numbers
    pub receipt_prefix: String,
    /// Prefix of supplier payment numbers
    pub payment_out_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Timezone::default(),
            receipt_prefix: "RCP".to_string(),
            payment_out_prefix: "PAYOUT".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }
}
