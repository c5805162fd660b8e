use std::fmt;

/// Machine-readable error codes shared by every notemirror error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    PathNotFound,
    ParentNotFound,
    PathOccupied,
    DuplicateId,
    IdentityChanged,
    InvalidMutation,
    ListenerFailed,
    MergeConflict,
    JournalCorrupt,
    JournalStoreFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::PathNotFound => "E2001",
            Self::ParentNotFound => "E2002",
            Self::PathOccupied => "E2003",
            Self::DuplicateId => "E2004",
            Self::IdentityChanged => "E2005",
            Self::InvalidMutation => "E2006",
            Self::ListenerFailed => "E2007",
            Self::MergeConflict => "E3001",
            Self::JournalCorrupt => "E4001",
            Self::JournalStoreFailed => "E4002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Mirror not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::PathNotFound => "Path not found in tree",
            Self::ParentNotFound => "Parent path not found in tree",
            Self::PathOccupied => "Path already occupied",
            Self::DuplicateId => "Item identifier already present",
            Self::IdentityChanged => "Update would change item identity",
            Self::InvalidMutation => "Invalid tree mutation",
            Self::ListenerFailed => "Mirror action failed",
            Self::MergeConflict => "Merge conflict",
            Self::JournalCorrupt => "Journal data is malformed",
            Self::JournalStoreFailed => "Journal store failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => {
                Some("Create .notemirror/config.toml with a mirror_id before syncing.")
            }
            Self::ConfigParseError => Some("Fix syntax in .notemirror/config.toml and retry."),
            Self::PathNotFound | Self::ParentNotFound | Self::PathOccupied => {
                Some("The other side changed this path; retry with fresh snapshots.")
            }
            Self::DuplicateId | Self::IdentityChanged => None,
            Self::InvalidMutation => Some("The root cannot change and a folder cannot move into itself."),
            Self::ListenerFailed => Some("Check permissions and free space on the mirror medium."),
            Self::MergeConflict => {
                Some("Resolve the conflicting items on one side, then run the sync pass again.")
            }
            Self::JournalCorrupt => {
                Some("Delete the journal for this mirror to force a full re-sync.")
            }
            Self::JournalStoreFailed => Some("Check that the journal database is writable."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 13] = [
        ErrorCode::NotInitialized,
        ErrorCode::ConfigParseError,
        ErrorCode::PathNotFound,
        ErrorCode::ParentNotFound,
        ErrorCode::PathOccupied,
        ErrorCode::DuplicateId,
        ErrorCode::IdentityChanged,
        ErrorCode::InvalidMutation,
        ErrorCode::ListenerFailed,
        ErrorCode::MergeConflict,
        ErrorCode::JournalCorrupt,
        ErrorCode::JournalStoreFailed,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let raw = code.code();
            assert_eq!(raw.len(), 5);
            assert!(raw.starts_with('E'));
            assert!(raw.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn display_matches_code() {
        assert_eq!(ErrorCode::MergeConflict.to_string(), "E3001");
    }
}
