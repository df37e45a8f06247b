//! Python bindings.  Requests and responses cross the boundary as plain
//! dicts, converted through JSON.

use std::path::PathBuf;
use std::sync::Arc;

use pyo3::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ServiceConfig;
use crate::errors::GraspDbError;
use crate::frames::pose::Pose;
use crate::frames::tree::{FrameTree, LookupTime, TransformProvider};
use crate::grasp::guards;
use crate::grasp::layout::HandLayout;
use crate::hand::description::HandDescriptions;
use crate::models::{GraspPlanningRequest, ModelScan};
use crate::service::GraspDatabaseService;

// ---------------------------------------------------------------------------
// dict <-> serde helpers
// ---------------------------------------------------------------------------

fn to_py<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let text = serde_json::to_string(value).map_err(GraspDbError::from)?;
    let obj = py.import("json")?.call_method1("loads", (text,))?;
    Ok(obj.unbind())
}

fn from_py<T: DeserializeOwned>(py: Python<'_>, value: &Bound<'_, PyAny>) -> PyResult<T> {
    let text: String = py
        .import("json")?
        .call_method1("dumps", (value,))?
        .extract()?;
    Ok(serde_json::from_str(&text).map_err(GraspDbError::from)?)
}

// ---------------------------------------------------------------------------
// FrameTree
// ---------------------------------------------------------------------------

#[pyclass(name = "FrameTree")]
pub struct PyFrameTree {
    inner: Arc<FrameTree>,
}

#[pymethods]
impl PyFrameTree {
    #[new]
    fn new() -> Self {
        Self {
            inner: Arc::new(FrameTree::new()),
        }
    }

    /// Place `child` in `parent` at `position` / `orientation` (x, y, z, w).
    #[pyo3(signature = (parent, child, position, orientation=[0.0, 0.0, 0.0, 1.0]))]
    fn set_transform(
        &self,
        parent: &str,
        child: &str,
        position: [f64; 3],
        orientation: [f64; 4],
    ) -> PyResult<()> {
        self.inner
            .set_transform(parent, child, Pose::new(position, orientation))
            .map_err(GraspDbError::from)?;
        Ok(())
    }

    fn remove_frame(&self, child: &str) -> bool {
        self.inner.remove_frame(child)
    }

    fn has_frame(&self, frame: &str) -> bool {
        self.inner.has_frame(frame)
    }

    fn frame_count(&self) -> usize {
        self.inner.frame_count()
    }

    /// Pose of `source_frame` expressed in `target_frame`.
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
    ) -> PyResult<([f64; 3], [f64; 4])> {
        let pose = self
            .inner
            .lookup_transform(target_frame, source_frame, LookupTime::Latest)
            .map_err(GraspDbError::from)?;
        Ok((pose.position, pose.orientation))
    }
}

// ---------------------------------------------------------------------------
// GraspDatabaseServer
// ---------------------------------------------------------------------------

#[pyclass]
pub struct GraspDatabaseServer {
    service: GraspDatabaseService,
}

#[pymethods]
impl GraspDatabaseServer {
    /// Build from an optional JSON config file (overridden by `GRASPDB_*`
    /// environment variables) and an optional frame tree.
    #[new]
    #[pyo3(signature = (config_path=None, frames=None))]
    fn new(config_path: Option<PathBuf>, frames: Option<PyRef<'_, PyFrameTree>>) -> PyResult<Self> {
        let config = ServiceConfig::load(config_path.as_deref())?;
        let transforms: Arc<dyn TransformProvider> = match frames {
            Some(frames) => frames.inner.clone(),
            None => Arc::new(FrameTree::new()),
        };
        let service = GraspDatabaseService::from_config(&config, transforms)?;
        Ok(Self { service })
    }

    #[getter]
    fn is_connected(&self) -> bool {
        self.service.is_connected()
    }

    /// Replace the hand descriptions with those in `path`.
    fn reload_hand_descriptions(&self, path: PathBuf) -> PyResult<()> {
        let hands = HandDescriptions::from_file(&path)?;
        self.service.reload_hand_descriptions(Arc::new(hands));
        Ok(())
    }

    #[pyo3(signature = (model_set=""))]
    fn get_model_list(&self, py: Python<'_>, model_set: &str) -> PyResult<PyObject> {
        to_py(py, &self.service.get_model_list(model_set))
    }

    fn get_model_mesh(&self, py: Python<'_>, model_id: i64) -> PyResult<PyObject> {
        to_py(py, &self.service.get_model_mesh(model_id))
    }

    fn get_model_description(&self, py: Python<'_>, model_id: i64) -> PyResult<PyObject> {
        to_py(py, &self.service.get_model_description(model_id))
    }

    #[pyo3(signature = (model_id, scan_source=""))]
    fn get_model_scans(
        &self,
        py: Python<'_>,
        model_id: i64,
        scan_source: &str,
    ) -> PyResult<PyObject> {
        to_py(py, &self.service.get_model_scans(model_id, scan_source))
    }

    fn save_model_scan(&self, py: Python<'_>, scan: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        let scan: ModelScan = from_py(py, scan)?;
        to_py(py, &self.service.save_model_scan(&scan))
    }

    fn database_grasp_planning(
        &self,
        py: Python<'_>,
        request: &Bound<'_, PyAny>,
    ) -> PyResult<PyObject> {
        let request: GraspPlanningRequest = from_py(py, request)?;
        let response = py.allow_threads(|| self.service.database_grasp_planning(&request));
        to_py(py, &response)
    }
}

/// Layout name used for a catalog hand identifier.
#[pyfunction]
fn hand_layout_name(hand_id: &str) -> &'static str {
    HandLayout::for_hand(hand_id).name()
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<GraspDatabaseServer>()?;
    m.add_class::<PyFrameTree>()?;

    m.add("SCHUNK_HAND_ID", guards::SCHUNK_HAND_ID)?;
    m.add("WILLOW_GRIPPER_2010_HAND_ID", guards::WILLOW_GRIPPER_2010_HAND_ID)?;
    m.add("PRE_GRASP_EFFORT", guards::PRE_GRASP_EFFORT)?;
    m.add("GRASP_EFFORT", guards::GRASP_EFFORT)?;
    m.add("DESIRED_APPROACH_DISTANCE", guards::DESIRED_APPROACH_DISTANCE)?;
    m.add("MIN_APPROACH_DISTANCE", guards::MIN_APPROACH_DISTANCE)?;
    m.add(
        "DEFAULT_QUALITY_EXCLUSION_THRESHOLD",
        guards::DEFAULT_QUALITY_EXCLUSION_THRESHOLD,
    )?;

    m.add_function(wrap_pyfunction!(hand_layout_name, m)?)?;
    Ok(())
}
