use serde::{Deserialize, Serialize};

/// Verdict of the availability gate for a requested date/time/party size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    SameDay,
    Invalid(String),
    Unavailable(String),
}
