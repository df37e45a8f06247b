//! The objects database service: catalog pass-through queries plus database
//! grasp planning, behind one entry point.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::errors::GraspDbResult;
use crate::frames::tree::TransformProvider;
use crate::grasp::filter::FilterPolicy;
use crate::grasp::planner::GraspPlanner;
use crate::hand::description::{HandDescriptionSource, HandDescriptions};
use crate::hand::profile::HandProfileResolver;
use crate::models::{
    GraspPlanningRequest, GraspPlanningResponse, ModelId, ModelMesh, ModelScan, ResolveStatus,
};
use crate::store::database::ObjectsDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseReturnCode {
    Success,
    DatabaseNotConnected,
    DatabaseQueryError,
}

impl DatabaseReturnCode {
    /// Numeric code as carried on the wire.
    pub fn code(self) -> i32 {
        match self {
            DatabaseReturnCode::Success => -1,
            DatabaseReturnCode::DatabaseNotConnected => 2,
            DatabaseReturnCode::DatabaseQueryError => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetModelListResponse {
    pub return_code: DatabaseReturnCode,
    pub model_ids: Vec<ModelId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetModelMeshResponse {
    pub return_code: DatabaseReturnCode,
    pub mesh: ModelMesh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetModelDescriptionResponse {
    pub return_code: DatabaseReturnCode,
    pub name: String,
    pub maker: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetModelScansResponse {
    pub return_code: DatabaseReturnCode,
    pub matching_scans: Vec<ModelScan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveModelScanResponse {
    pub return_code: DatabaseReturnCode,
    pub scan_id: Option<i64>,
}

pub struct GraspDatabaseService {
    database: Option<Arc<ObjectsDatabase>>,
    planner: Option<GraspPlanner>,
    transforms: Arc<dyn TransformProvider>,
}

impl GraspDatabaseService {
    /// `database` is `None` when the catalog could not be opened; every
    /// query then reports the catalog as unavailable.
    pub fn new(
        database: Option<Arc<ObjectsDatabase>>,
        hands: Arc<dyn HandDescriptionSource>,
        transforms: Arc<dyn TransformProvider>,
        policy: FilterPolicy,
        profile_cache_entries: usize,
    ) -> Self {
        let planner = database.as_ref().map(|db| {
            GraspPlanner::new(
                db.clone(),
                HandProfileResolver::new(hands, profile_cache_entries),
                transforms.clone(),
                policy,
            )
        });
        Self {
            database,
            planner,
            transforms,
        }
    }

    /// Build the service from configuration.  A catalog that fails to open
    /// is logged and left disconnected; an unreadable hand description file
    /// is an error.
    pub fn from_config(
        config: &ServiceConfig,
        transforms: Arc<dyn TransformProvider>,
    ) -> GraspDbResult<Self> {
        let hands: Arc<dyn HandDescriptionSource> = match &config.hand_description_path {
            Some(path) => Arc::new(HandDescriptions::from_file(path)?),
            None => {
                warn!("objects database: no hand description configured");
                Arc::new(HandDescriptions::new())
            }
        };
        let database = match &config.database_path {
            Some(path) => match ObjectsDatabase::open(path, config.busy_timeout()) {
                Ok(db) => {
                    info!(path = %db.db_path().display(), "objects database: connected");
                    Some(Arc::new(db))
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "objects database: failed to open catalog");
                    None
                }
            },
            None => {
                warn!("objects database: no catalog path configured");
                None
            }
        };
        Ok(Self::new(
            database,
            hands,
            transforms,
            config.filter_policy(),
            config.profile_cache_entries,
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.database.is_some()
    }

    pub fn database(&self) -> Option<&Arc<ObjectsDatabase>> {
        self.database.as_ref()
    }

    pub fn transforms(&self) -> &Arc<dyn TransformProvider> {
        &self.transforms
    }

    /// Drop cached hand profiles after the hand description changed.
    pub fn reload_hand_descriptions(&self, hands: Arc<dyn HandDescriptionSource>) {
        if let Some(planner) = &self.planner {
            planner.profiles().reconfigure(hands);
        }
    }

    pub fn get_model_list(&self, model_set: &str) -> GetModelListResponse {
        let Some(db) = &self.database else {
            return GetModelListResponse {
                return_code: DatabaseReturnCode::DatabaseNotConnected,
                model_ids: Vec::new(),
            };
        };
        match db.scaled_models_by_set(model_set) {
            Ok(models) => GetModelListResponse {
                return_code: DatabaseReturnCode::Success,
                model_ids: models.iter().map(|m| m.scaled_model_id).collect(),
            },
            Err(e) => {
                error!(model_set, error = %e, "get model list: query failed");
                GetModelListResponse {
                    return_code: DatabaseReturnCode::DatabaseQueryError,
                    model_ids: Vec::new(),
                }
            }
        }
    }

    pub fn get_model_mesh(&self, model_id: ModelId) -> GetModelMeshResponse {
        let Some(db) = &self.database else {
            return GetModelMeshResponse {
                return_code: DatabaseReturnCode::DatabaseNotConnected,
                mesh: ModelMesh::default(),
            };
        };
        match db.scaled_model_mesh(model_id) {
            Ok(mesh) => GetModelMeshResponse {
                return_code: DatabaseReturnCode::Success,
                mesh,
            },
            Err(e) => {
                error!(model_id, error = %e, "get model mesh: query failed");
                GetModelMeshResponse {
                    return_code: DatabaseReturnCode::DatabaseQueryError,
                    mesh: ModelMesh::default(),
                }
            }
        }
    }

    pub fn get_model_description(&self, model_id: ModelId) -> GetModelDescriptionResponse {
        let empty = |return_code| GetModelDescriptionResponse {
            return_code,
            name: String::new(),
            maker: String::new(),
            tags: Vec::new(),
        };
        let Some(db) = &self.database else {
            return empty(DatabaseReturnCode::DatabaseNotConnected);
        };
        match db.scaled_model_description(model_id) {
            Ok(description) => GetModelDescriptionResponse {
                return_code: DatabaseReturnCode::Success,
                name: description.name,
                maker: description.maker,
                tags: description.tags,
            },
            Err(e) => {
                error!(model_id, error = %e, "get model description: query failed");
                empty(DatabaseReturnCode::DatabaseQueryError)
            }
        }
    }

    pub fn get_model_scans(&self, model_id: ModelId, scan_source: &str) -> GetModelScansResponse {
        let Some(db) = &self.database else {
            error!("get model scans: database not connected");
            return GetModelScansResponse {
                return_code: DatabaseReturnCode::DatabaseNotConnected,
                matching_scans: Vec::new(),
            };
        };
        match db.model_scans(model_id, scan_source) {
            Ok(matching_scans) => GetModelScansResponse {
                return_code: DatabaseReturnCode::Success,
                matching_scans,
            },
            Err(e) => {
                error!(model_id, scan_source, error = %e, "get model scans: query failed");
                GetModelScansResponse {
                    return_code: DatabaseReturnCode::DatabaseQueryError,
                    matching_scans: Vec::new(),
                }
            }
        }
    }

    pub fn save_model_scan(&self, scan: &ModelScan) -> SaveModelScanResponse {
        let Some(db) = &self.database else {
            error!("save model scan: database not connected");
            return SaveModelScanResponse {
                return_code: DatabaseReturnCode::DatabaseNotConnected,
                scan_id: None,
            };
        };
        match db.insert_scan(scan) {
            Ok(scan_id) => SaveModelScanResponse {
                return_code: DatabaseReturnCode::Success,
                scan_id: Some(scan_id),
            },
            Err(e) => {
                error!(
                    scaled_model_id = scan.scaled_model_id,
                    error = %e,
                    "save model scan: insert failed"
                );
                SaveModelScanResponse {
                    return_code: DatabaseReturnCode::DatabaseQueryError,
                    scan_id: None,
                }
            }
        }
    }

    pub fn database_grasp_planning(&self, request: &GraspPlanningRequest) -> GraspPlanningResponse {
        match &self.planner {
            Some(planner) => planner.plan(request),
            None => {
                error!(
                    arm_name = %request.arm_name,
                    "database grasp planning: database not connected"
                );
                GraspPlanningResponse::failure(ResolveStatus::CatalogUnavailable)
            }
        }
    }
}
