//! Error taxonomy for a build run.
//!
//! Every fatal condition ends up as a [`BuildError`]. Configuration errors are
//! raised before the first external invocation; tool-resolution errors at the
//! point a tool is first needed; stage failures when an invocation exits
//! nonzero. Best-effort failures never become a `BuildError`.

use std::path::PathBuf;

use thiserror::Error;

use crate::stage::Stage;

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Cannot build with both debug and release mode enabled.")]
    ConflictingModes,

    #[error("OPENSSL points to '{}' but {} does not exist there", path.display(), marker)]
    OpensslOverrideMissing { path: PathBuf, marker: String },

    #[error("Could not find OpenSSL (searched: {})", searched.join(", "))]
    OpensslNotFound { searched: Vec<String> },

    #[error("invalid option table: {0}")]
    InvalidProfile(#[from] toml::de::Error),

    #[error("Could not find {tool} executable: {}", location.display())]
    ToolNotFound { tool: String, location: PathBuf },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage}: {message} (exit code {code})")]
    StageFailed {
        stage: Stage,
        message: String,
        code: i32,
    },

    /// Any other error raised while `stage` was running.
    #[error("{stage}: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<BuildError>,
    },

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// True for contradictory or unsatisfiable options, which are detected
    /// before anything is executed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BuildError::ConflictingModes
                | BuildError::OpensslOverrideMissing { .. }
                | BuildError::OpensslNotFound { .. }
                | BuildError::InvalidProfile(_)
                | BuildError::Pattern(_)
        )
    }

    /// The stage this error belongs to, if it was raised by one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            BuildError::StageFailed { stage, .. } | BuildError::Stage { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }

    /// Attach `stage` unless the error already names one.
    pub(crate) fn in_stage(self, stage: Stage) -> Self {
        if self.stage().is_some() {
            return self;
        }
        BuildError::Stage {
            stage,
            source: Box::new(self),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BuildError::Io {
            context: context.into(),
            source,
        }
    }
}
