//! Outcome of fetching one frontier URL

use std::fmt;

/// How a frontier URL ended
///
/// Every URL taken from the frontier ends in exactly one of these states;
/// they are recorded per run in the `fetches` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    /// HTML page fetched and its links classified
    Fetched,

    /// The response was itself a report document
    Document,

    /// Page fetched but its content could not be parsed
    ParseFailed,

    /// Fetch failed after all retries
    Failed,

    /// Disallowed by robots.txt
    RobotsDenied,

    /// Not fetched because the page or time budget ran out
    Cancelled,
}

impl FetchState {
    pub const ALL: [FetchState; 6] = [
        Self::Fetched,
        Self::Document,
        Self::ParseFailed,
        Self::Failed,
        Self::RobotsDenied,
        Self::Cancelled,
    ];

    /// Returns true if the URL produced usable content
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched | Self::Document)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ParseFailed | Self::Failed | Self::RobotsDenied)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Document => "document",
            Self::ParseFailed => "parse_failed",
            Self::Failed => "failed",
            Self::RobotsDenied => "robots_denied",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a state from its database string
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.to_db_string() == s)
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
