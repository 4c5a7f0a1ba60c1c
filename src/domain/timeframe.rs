//! History timeframes
//!
//! Query filter selecting ledger entries within the last 30/60 days or
//! unbounded. The string forms are part of the external interface.

use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Days30,
    Days60,
    AllTime,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Days30 => "30_days",
            Timeframe::Days60 => "60_days",
            Timeframe::AllTime => "all_time",
        }
    }

    /// Lower bound of the window, or `None` for an unbounded query.
    pub fn lower_bound(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timeframe::Days30 => Some(now - Duration::days(30)),
            Timeframe::Days60 => Some(now - Duration::days(60)),
            Timeframe::AllTime => None,
        }
    }
}

impl FromStr for Timeframe {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "30_days" => Ok(Timeframe::Days30),
            "60_days" => Ok(Timeframe::Days60),
            "all_time" => Ok(Timeframe::AllTime),
            other => Err(EngineError::UnknownTimeframe(other.to_string())),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
