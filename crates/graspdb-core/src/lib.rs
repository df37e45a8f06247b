//! graspdb core library: the household objects database and its grasp
//! resolution pipeline.
//!
//! Stored grasps are looked up for a recognised object, pruned, mapped onto
//! the physical hand of the requesting arm and expressed in the caller's
//! reference frame.  With the `python` feature the crate also builds the
//! `_graspdb_core` extension module.

pub mod config;
pub mod errors;
pub mod frames;
pub mod grasp;
pub mod hand;
pub mod models;
pub mod service;
pub mod store;

#[cfg(feature = "python")]
pub mod python;

pub use errors::{GraspDbError, GraspDbResult, ResolveError};
pub use grasp::planner::{GraspCatalog, GraspPlanner};
pub use service::GraspDatabaseService;

// ---------------------------------------------------------------------------
// Top-level Python module: _graspdb_core
// ---------------------------------------------------------------------------

#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _graspdb_core(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    python::register(m)
}
