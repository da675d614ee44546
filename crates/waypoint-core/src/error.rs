use std::fmt;

use thiserror::Error;

use crate::model::{InitiativeId, ValidationError};

/// Machine-readable error codes for scripts and agents driving `wp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    RemoteNotConfigured,
    InitiativeNotFound,
    InvalidInitiative,
    InvalidEnumValue,
    RemoteUnavailable,
    WriteFailed,
    FeedDisconnected,
    MalformedRow,
    CacheReadFailed,
    CacheWriteFailed,
    LockContention,
    SessionClosed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::RemoteNotConfigured => "E1002",
            Self::InitiativeNotFound => "E2001",
            Self::InvalidInitiative => "E2002",
            Self::InvalidEnumValue => "E2003",
            Self::RemoteUnavailable => "E3001",
            Self::WriteFailed => "E3002",
            Self::FeedDisconnected => "E3003",
            Self::MalformedRow => "E3004",
            Self::CacheReadFailed => "E4001",
            Self::CacheWriteFailed => "E4002",
            Self::LockContention => "E4003",
            Self::SessionClosed => "E9002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::RemoteNotConfigured => "Remote store not configured",
            Self::InitiativeNotFound => "Initiative not found",
            Self::InvalidInitiative => "Initiative failed validation",
            Self::InvalidEnumValue => "Invalid team/priority/status value",
            Self::RemoteUnavailable => "Remote store unavailable",
            Self::WriteFailed => "Remote write failed",
            Self::FeedDisconnected => "Change feed disconnected",
            Self::MalformedRow => "Malformed row from remote store",
            Self::CacheReadFailed => "Snapshot cache read failed",
            Self::CacheWriteFailed => "Snapshot cache write failed",
            Self::LockContention => "Lock contention",
            Self::SessionClosed => "Session closed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .waypoint/config.toml and retry."),
            Self::RemoteNotConfigured => {
                Some("Set remote.url and remote.anon_key, or WAYPOINT_URL and WAYPOINT_ANON_KEY.")
            }
            Self::InitiativeNotFound => Some("Run `wp list` to see current initiative ids."),
            Self::InvalidInitiative => {
                Some("Months must be 1-3 with end >= start, progress 0-100, and a title.")
            }
            Self::InvalidEnumValue => Some("Use one of the documented team/priority/status values."),
            Self::RemoteUnavailable => Some("Check network access to the remote store and retry."),
            Self::WriteFailed => Some("Nothing was changed locally. Retry the same command."),
            Self::FeedDisconnected => Some("Live updates stopped. Run `wp list` to resync."),
            Self::MalformedRow => Some("Check the remote table schema matches the initiative columns."),
            Self::CacheReadFailed => Some("Delete the snapshot file; it is rebuilt on the next load."),
            Self::CacheWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `wp` process releases its lock."),
            Self::SessionClosed | Self::InternalUnexpected => {
                Some("Retry once. If persistent, report a bug with logs.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Conditions a sync gateway operation reports to its caller.
///
/// None of these leave the local store partially modified: a failed call
/// applies nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Transport or network failure while reading.
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// Transport or network failure while writing.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// The target id does not exist on the remote store.
    #[error("initiative not found: {0}")]
    NotFound(InitiativeId),

    /// The submitted fields were rejected before any mutation.
    #[error("invalid initiative: {0}")]
    Invalid(#[from] ValidationError),

    /// The session event loop is no longer running.
    #[error("session closed")]
    SessionClosed,
}

impl SyncError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::RemoteUnavailable(_) => ErrorCode::RemoteUnavailable,
            Self::WriteFailed(_) => ErrorCode::WriteFailed,
            Self::NotFound(_) => ErrorCode::InitiativeNotFound,
            Self::Invalid(_) => ErrorCode::InvalidInitiative,
            Self::SessionClosed => ErrorCode::SessionClosed,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, SyncError};
    use crate::model::{InitiativeId, ValidationError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::RemoteNotConfigured,
            ErrorCode::InitiativeNotFound,
            ErrorCode::InvalidInitiative,
            ErrorCode::InvalidEnumValue,
            ErrorCode::RemoteUnavailable,
            ErrorCode::WriteFailed,
            ErrorCode::FeedDisconnected,
            ErrorCode::MalformedRow,
            ErrorCode::CacheReadFailed,
            ErrorCode::CacheWriteFailed,
            ErrorCode::LockContention,
            ErrorCode::SessionClosed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::WriteFailed.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn sync_errors_map_to_codes() {
        assert_eq!(
            SyncError::NotFound(InitiativeId::from("abc")).code(),
            ErrorCode::InitiativeNotFound
        );
        assert_eq!(
            SyncError::from(ValidationError::EmptyTitle).code(),
            ErrorCode::InvalidInitiative
        );
        assert!(SyncError::WriteFailed("boom".into()).hint().is_some());
    }
}
