//! Error types for the graspdb core library.
//!
//! Two families live here.  `GraspDbError` covers infrastructure failures
//! (SQLite, JSON, filesystem, configuration files).  `ResolveError` and
//! `ShapeMismatch` are the two tiers of the grasp resolution pipeline: the
//! former aborts a whole request, the latter only drops one grasp record.

use crate::models::ResolveStatus;

/// Top-level error enum for storage, configuration and I/O.
#[derive(Debug, thiserror::Error)]
pub enum GraspDbError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type GraspDbResult<T> = Result<T, GraspDbError>;

/// Failures reported by a transform provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("unknown frame '{0}'")]
    UnknownFrame(String),

    #[error("no transform path from '{source_frame}' to '{target_frame}'")]
    Unavailable {
        target_frame: String,
        source_frame: String,
    },

    #[error("adding '{child}' under '{parent}' would create a cycle")]
    Cycle { parent: String, child: String },
}

/// Request-fatal failures of the grasp resolution pipeline.
///
/// Messages carry identifiers and counts only; raw catalog error text stays
/// in the logs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid grasp planning request: {reason}")]
    InvalidRequest { reason: String },

    #[error("hand description parameter '{parameter}' missing for arm '{arm_name}'")]
    ConfigurationMissing { arm_name: String, parameter: String },

    #[error("catalog query failed for model {model_id} and hand '{hand_id}'")]
    CatalogUnavailable { model_id: i64, hand_id: String },

    #[error("no transform from '{source_frame}' to '{target_frame}'")]
    TransformUnavailable {
        target_frame: String,
        source_frame: String,
    },
}

impl ResolveError {
    /// Status code reported to the caller for this failure.
    pub fn status(&self) -> ResolveStatus {
        match self {
            ResolveError::InvalidRequest { .. } => ResolveStatus::InvalidRequest,
            ResolveError::ConfigurationMissing { .. } => ResolveStatus::ConfigurationMissing,
            ResolveError::CatalogUnavailable { .. } => ResolveStatus::CatalogUnavailable,
            ResolveError::TransformUnavailable { .. } => ResolveStatus::TransformUnavailable,
        }
    }
}

/// A stored grasp whose joint vectors do not fit the hand it is mapped onto.
///
/// Skips the record; never aborts the request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{strategy} layout expects {expected}, found {found}")]
pub struct ShapeMismatch {
    pub strategy: &'static str,
    pub expected: String,
    pub found: String,
}

#[cfg(feature = "python")]
mod py_conversions {
    use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
    use pyo3::PyErr;

    use super::GraspDbError;

    impl From<GraspDbError> for PyErr {
        fn from(err: GraspDbError) -> PyErr {
            match &err {
                GraspDbError::Database(_) | GraspDbError::Sqlite(_) => {
                    PyRuntimeError::new_err(err.to_string())
                }
                GraspDbError::Frame(_) => PyRuntimeError::new_err(err.to_string()),
                GraspDbError::Config(_) => PyValueError::new_err(err.to_string()),
                GraspDbError::Io(_) => PyIOError::new_err(err.to_string()),
                GraspDbError::Json(_) => PyValueError::new_err(err.to_string()),
            }
        }
    }
}
