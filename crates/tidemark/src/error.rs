//! Error types for the planning system.

use std::path::PathBuf;

/// Errors that can occur while building snapshots or planning a changeset.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// A column or table could not be confidently matched across snapshots.
    ///
    /// Raised when a rename resolution names columns that are not actually
    /// in doubt, or maps two sources to the same target. Never guessed.
    #[error("Ambiguous rename in table '{table}': {message}")]
    AmbiguousRename {
        /// Table the ambiguity was found in.
        table: String,
        /// What made the resolution invalid.
        message: String,
    },

    /// An enum member was removed or reordered.
    ///
    /// Member removal and reordering cannot be expressed as a reversible
    /// in-place operation, so the plan refuses rather than dropping and
    /// recreating the type destructively.
    #[error("Unsupported change to enum type '{type_name}': {message}")]
    UnsupportedEnumChange {
        /// Enum type name.
        type_name: String,
        /// Description of the rejected member change.
        message: String,
    },

    /// A snapshot could not be constructed.
    #[error("Snapshot build failed: {0}")]
    SnapshotBuild(String),

    /// A named definition refers to a table that is not in the snapshot.
    #[error("Definition '{name}' refers to unknown table '{table}'")]
    OrphanedDefinition {
        /// The definition's name.
        name: String,
        /// The missing table key.
        table: String,
    },

    /// Two distinct definitions resolved to the same generated name.
    ///
    /// Fatal: silently overwriting one of them would lose data.
    #[error("Generated name collision on table '{table}': '{name}'")]
    NamingCollision {
        /// Owning table.
        table: String,
        /// The colliding generated name.
        name: String,
    },

    /// The rename journal could not be read or parsed.
    #[error("Failed to read rename journal '{path}': {message}")]
    JournalRead {
        /// Path to the journal file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Database error during introspection or application.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing the rename journal).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;
