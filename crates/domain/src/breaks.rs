//! Break lifecycle status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a break.
///
/// Spots may only be purchased while the break is still open for sale:
/// once a break goes live, completes, or sells out, its remaining items are
/// no longer purchasable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakStatus {
    Draft,
    Upcoming,
    Live,
    Completed,
    Soldout,
}

impl BreakStatus {
    /// Returns true if spots in a break with this status may be purchased.
    pub fn is_sellable(&self) -> bool {
        matches!(self, BreakStatus::Draft | BreakStatus::Upcoming)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakStatus::Draft => "DRAFT",
            BreakStatus::Upcoming => "UPCOMING",
            BreakStatus::Live => "LIVE",
            BreakStatus::Completed => "COMPLETED",
            BreakStatus::Soldout => "SOLDOUT",
        }
    }
}

impl std::fmt::Display for BreakStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a stored status string is not a known [`BreakStatus`].
#[derive(Debug, Error)]
#[error("unknown break status: {0}")]
pub struct ParseBreakStatusError(pub String);

impl std::str::FromStr for BreakStatus {
    type Err = ParseBreakStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(BreakStatus::Draft),
            "UPCOMING" => Ok(BreakStatus::Upcoming),
            "LIVE" => Ok(BreakStatus::Live),
            "COMPLETED" => Ok(BreakStatus::Completed),
            "SOLDOUT" => Ok(BreakStatus::Soldout),
            other => Err(ParseBreakStatusError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sellability_follows_lifecycle() {
        assert!(BreakStatus::Draft.is_sellable());
        assert!(BreakStatus::Upcoming.is_sellable());
        assert!(!BreakStatus::Live.is_sellable());
        assert!(!BreakStatus::Completed.is_sellable());
        assert!(!BreakStatus::Soldout.is_sellable());
    }

    #[test]
    fn round_trips_through_str() {
        for status in [
            BreakStatus::Draft,
            BreakStatus::Upcoming,
            BreakStatus::Live,
            BreakStatus::Completed,
            BreakStatus::Soldout,
        ] {
            let parsed: BreakStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_status_is_an_error() {
        let err = "ARCHIVED".parse::<BreakStatus>().unwrap_err();
        assert!(err.to_string().contains("ARCHIVED"));
    }

    #[test]
    fn serializes_screaming_snake_case() {
        let json = serde_json::to_string(&BreakStatus::Upcoming).unwrap();
        assert_eq!(json, "\"UPCOMING\"");
    }
}
