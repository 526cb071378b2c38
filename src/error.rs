//! Error types for Kiln
//!
//! All modules use `KilnResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Kiln operations
pub type KilnResult<T> = Result<T, KilnError>;

/// All errors that can occur in Kiln
#[derive(Error, Debug)]
pub enum KilnError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("No kiln.toml found in {0} or any parent directory")]
    ProjectConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid python_version '{0}': expected MAJOR.MINOR or MAJOR.MINOR.PATCH")]
    InvalidPythonVersion(String),

    #[error("Unsupported CUDA version '{version}'. Supported: {supported}")]
    UnsupportedCuda { version: String, supported: String },

    // Dockerfile generation errors
    #[error(
        "One of the commands in 'run' contains a new line, which won't work. \
         Split it into separate list items, one per command.\n\n\
         This is the offending line: {command}"
    )]
    MultilineRunCommand { command: String },

    #[error("Python requirements file not found: {0}")]
    RequirementsNotFound(PathBuf),

    #[error("python_requirements must be a path inside the project directory: {0}")]
    RequirementsOutsideProject(PathBuf),

    #[error("Failed to write {file}: {source}")]
    Staging {
        file: String,
        #[source]
        source: std::io::Error,
    },

    // Build errors
    #[error("Required CLI not found: {name}. {hint}")]
    CliNotFound { name: String, hint: String },

    #[error("{tool} exited with code {code}\n{output}")]
    BuildFailed {
        tool: String,
        code: i32,
        output: String,
    },

    #[error("Failed to {step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<KilnError>,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process terminated by signal")]
    ProcessSignaled,

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl KilnError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
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

    /// Create a staging error for a generated build file
    pub fn staging(file: impl Into<String>, source: std::io::Error) -> Self {
        Self::Staging {
            file: file.into(),
            source,
        }
    }

    /// Wrap an error with the orchestration step that produced it
    pub fn during(step: &'static str) -> impl FnOnce(KilnError) -> KilnError {
        move |source| Self::Step {
            step,
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping `Step` wrappers
    pub fn root(&self) -> &KilnError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::ProjectConfigNotFound(_) => Some("Run: kiln init"),
            Self::MultilineRunCommand { .. } => {
                Some("Give each shell command its own entry in build.run")
            }
            Self::RequirementsOutsideProject(_) => {
                Some("Copy the requirements file into the project and use a relative path")
            }
            Self::UnsupportedCuda { .. } => Some("Set build.cuda to one of the supported versions"),
            Self::CliNotFound { .. } => Some("Run: kiln status"),
            Self::BuildFailed { .. } => Some("Re-run with --progress plain to see the full output"),
            _ => None,
        }
    }
}
