use chrono::NaiveDate;
use thiserror::Error;

/// Unified error type for the tasso workspace.
///
/// Covers missing daily files, transport failures, per-row parse problems,
/// range probing exhaustion, and failures of the preload pass as a whole.
/// The type is `Clone` so a terminal preload failure can be handed to every
/// reader waiting on the readiness gate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TassoError {
    /// A daily file does not exist at the source.
    ///
    /// Expected while probing for the latest available date.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. "daily report 04-12-2020".
        what: String,
    },

    /// Transport or decode failure while fetching a resource that should exist.
    #[error("{origin} fetch failed: {msg}")]
    Fetch {
        /// Name of the source that failed.
        origin: String,
        /// Human-readable error message.
        msg: String,
    },

    /// A single row of a daily file could not be interpreted.
    ///
    /// Never fatal: the parser records it and moves on.
    #[error("parse error on line {line}: {msg}")]
    Parse {
        /// 1-based line number within the daily file.
        line: usize,
        /// What was wrong with the row.
        msg: String,
    },

    /// No daily file was found for any of the probed dates.
    #[error("no daily data for the {attempts} days up to {latest_probed}")]
    UnavailableRange {
        /// Number of dates probed.
        attempts: u32,
        /// The most recent date that was probed.
        latest_probed: NaiveDate,
    },

    /// A day inside the resolved range could not be loaded; the preload pass is abandoned.
    #[error("preload failed on {date}: {reason}")]
    PreloadFailure {
        /// The day whose fetch failed.
        date: NaiveDate,
        /// Rendered underlying error.
        reason: String,
    },

    /// An operation exceeded its configured deadline.
    #[error("timed out: {what}")]
    Timeout {
        /// Label of the operation that timed out.
        what: String,
    },

    /// Invalid input argument or configuration value.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),
}

impl TassoError {
    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `Fetch` error tagged with the source name.
    pub fn fetch(origin: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            origin: origin.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a per-row `Parse` error.
    pub fn parse(line: usize, msg: impl Into<String>) -> Self {
        Self::Parse {
            line,
            msg: msg.into(),
        }
    }

    /// Helper: build a `Timeout` error.
    pub fn timeout(what: impl Into<String>) -> Self {
        Self::Timeout { what: what.into() }
    }

    /// Helper: wrap the failure of one day into a `PreloadFailure`.
    ///
    /// An existing `PreloadFailure` is passed through unchanged.
    #[must_use]
    pub fn preload_failure(date: NaiveDate, cause: &Self) -> Self {
        match cause {
            Self::PreloadFailure { .. } => cause.clone(),
            other => Self::PreloadFailure {
                date,
                reason: other.to_string(),
            },
        }
    }

    /// Returns true for the `NotFound` variant.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this error ends the preload pass for good.
    ///
    /// Range exhaustion and in-range fetch failures are fatal; everything else
    /// is either per-row or per-request.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnavailableRange { .. } | Self::PreloadFailure { .. }
        )
    }
}
