//! Recurring check definitions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::providers::{filter_known, Provider};
use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
}

impl Frequency {
    /// Exact interval between runs. No calendar alignment is applied.
    #[must_use]
    pub fn duration(self) -> TimeDelta {
        match self {
            Frequency::Hourly => TimeDelta::hours(1),
            Frequency::Daily => TimeDelta::hours(24),
            Frequency::Weekly => TimeDelta::days(7),
        }
    }

    #[must_use]
    pub fn next_run_after(self, from: DateTime<Utc>) -> DateTime<Utc> {
        from + self.duration()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Frequency::Hourly),
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            _ => Err(CoreError::UnknownFrequency(s.to_string())),
        }
    }
}

/// Lifecycle state of a schedule that still exists. Deletion is a hard
/// removal, so there is no `Deleted` variant on a live record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleState {
    Active,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledQuery {
    pub id: String,
    pub project_id: String,
    pub query: String,
    /// Unknown ids in stored data are dropped on decode.
    #[serde(deserialize_with = "known_providers")]
    pub providers: Vec<Provider>,
    pub frequency: Frequency,
    pub enabled: bool,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledQuery {
    #[must_use]
    pub fn state(&self) -> ScheduleState {
        if self.enabled {
            ScheduleState::Active
        } else {
            ScheduleState::Paused
        }
    }

    /// True when the schedule should be executed at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && now >= self.next_run_at
    }

    /// The run time implied by the cadence: one interval after the last run,
    /// or after creation if the schedule has never run.
    #[must_use]
    pub fn expected_next_run(&self) -> DateTime<Utc> {
        self.frequency
            .next_run_after(self.last_run_at.unwrap_or(self.created_at))
    }
}

fn known_providers<'de, D>(deserializer: D) -> Result<Vec<Provider>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(filter_known(raw))
}
