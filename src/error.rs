//! Error types for docforge
//!
//! All modules use `DocforgeResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for docforge operations
pub type DocforgeResult<T> = Result<T, DocforgeError>;

/// All errors that can occur in docforge
#[derive(Error, Debug)]
pub enum DocforgeError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Revision errors
    #[error("Cannot determine revision: {0}. Pass --revision or set DOCFORGE_REVISION.")]
    RevisionUnavailable(String),

    // Stage graph errors
    #[error("Stage graph contains a cycle involving stage '{stage}'")]
    StageCycle { stage: String },

    #[error("Stage '{stage}' declares input '{reference}' that no stage produces")]
    UnknownInput { stage: String, reference: String },

    #[error("Artifact '{reference}' is produced by both '{first}' and '{second}'")]
    DuplicateProducer {
        reference: String,
        first: String,
        second: String,
    },

    #[error("Artifact '{reference}' was already published")]
    ArtifactAlreadyPublished { reference: String },

    #[error("Stage '{stage}' finished without publishing declared output '{reference}'")]
    MissingOutput { stage: String, reference: String },

    // Pipeline execution errors
    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },

    #[error("Pipeline exceeded its {timeout_secs}s deadline")]
    PipelineTimeout { timeout_secs: u64 },

    // Network errors (absorbed by the fetch layer, never fatal to a run)
    #[error("Fetch from {url} failed: {reason}")]
    TransientNetwork { url: String, reason: String },

    // Archive errors
    #[error("Archive entry path '{path}' is invalid: {reason}")]
    ArchivePathInvalid { path: String, reason: String },

    #[error("Archive entry path collision: '{path}' appears more than once")]
    ArchivePathCollision { path: String },

    #[error("Archive verification failed: {detail}")]
    VerifyFailed { detail: String },

    // Cache store errors
    #[error("Notes cache store error: {context}")]
    CacheStore {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocforgeError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a cache store error with context
    pub fn cache_store(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::CacheStore {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Stage failures exit 1, a blown run deadline exits 2, and cache
    /// store I/O exits 3 so callers can tell the three apart. Everything
    /// else is a generic failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::PipelineTimeout { .. } => 2,
            Self::CacheStore { .. } => 3,
            _ => 1,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RevisionUnavailable(_) => {
                Some("Run inside a git checkout, or pass --revision <commit>")
            }
            Self::ConfigNotFound(_) => Some("Run: docforge init"),
            Self::VerifyFailed { .. } => {
                Some("Re-run with -vv to see per-entry hashes for both archives")
            }
            _ => None,
        }
    }
}
