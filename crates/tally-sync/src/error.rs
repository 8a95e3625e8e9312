//! Error types for manifest export.

use std::path::PathBuf;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Broad classification of an export failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Writing, zipping or signing failed.
    ArchiveCreation,
    /// The consumer's state must not be exported as-is.
    PolicyViolation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Errors that abort an export.
///
/// Every variant is fatal to the export in progress. No partial archive is
/// returned, and the work area is left for the caller to remove.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Filesystem failure on a specific path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be serialized to JSON.
    #[error("could not serialize export record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Zip container failure.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Two files would land on the same archive entry name.
    #[error("duplicate archive entry: {name}")]
    DuplicateEntry { name: String },

    /// A record attribute cannot be used as a file name in the export tree.
    #[error("invalid export file name {name:?}")]
    InvalidFileName { name: String },

    /// The signer refused or failed to sign the archive.
    #[error("signing failed: {reason}")]
    Signing { reason: String },

    /// The legacy rules file could not be read.
    #[error("failed to copy legacy rules from {}: {source}", path.display())]
    LegacyRules {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A collaborator lookup (persistence, certificate service) failed.
    #[error("{context}: {source}")]
    Source {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// An entitlement with unreconciled pending changes was found.
    #[error("attempted to export dirty entitlement {id}")]
    DirtyEntitlement { id: String },
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn lookup(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Source {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DirtyEntitlement { .. } => ErrorKind::PolicyViolation,
            _ => ErrorKind::ArchiveCreation,
        }
    }

    /// Returns true if the export was refused because of the data, not the machinery.
    pub fn is_policy_violation(&self) -> bool {
        self.kind() == ErrorKind::PolicyViolation
    }

    /// Suggested exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DirtyEntitlement { .. } => 3,
            Self::Source { .. } => 4,
            Self::Signing { .. } => 5,
            _ => 1,
        }
    }
}
