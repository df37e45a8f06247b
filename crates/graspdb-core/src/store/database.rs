//! SQLite storage layer for the household objects catalog.
//!
//! Each public method opens its own connection, so an `ObjectsDatabase` can
//! be shared between threads without a pool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::expand_tilde;
use crate::errors::{GraspDbError, GraspDbResult};
use crate::frames::pose::{Pose, StampedPose};
use crate::grasp::planner::GraspCatalog;
use crate::models::{ModelDescription, ModelId, ModelMesh, ModelScan, RawGraspRecord, ScaledModel};
use crate::store::schema;

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

/// Decode a JSON column, naming the row and column on failure.
fn decode_column<T: DeserializeOwned>(
    table: &str,
    row_id: i64,
    column: &str,
    text: &str,
) -> GraspDbResult<T> {
    serde_json::from_str(text).map_err(|e| {
        GraspDbError::Database(format!(
            "{table} row {row_id}: malformed {column}: {e}"
        ))
    })
}

/// Grasp row as stored, JSON columns still encoded.
struct GraspRow {
    grasp_id: i64,
    scaled_model_id: i64,
    quality: f64,
    scaled_quality: f64,
    table_clearance: f64,
    pre_grasp_json: String,
    final_grasp_json: String,
    pose_json: String,
}

impl GraspRow {
    fn decode(self) -> GraspDbResult<RawGraspRecord> {
        Ok(RawGraspRecord {
            grasp_id: self.grasp_id,
            scaled_model_id: self.scaled_model_id,
            quality: self.quality,
            scaled_quality: self.scaled_quality,
            table_clearance: self.table_clearance,
            pre_grasp_joints: decode_column(
                "grasp",
                self.grasp_id,
                "pre_grasp_posture_json",
                &self.pre_grasp_json,
            )?,
            final_grasp_joints: decode_column(
                "grasp",
                self.grasp_id,
                "final_grasp_posture_json",
                &self.final_grasp_json,
            )?,
            final_grasp_pose: decode_column(
                "grasp",
                self.grasp_id,
                "final_grasp_pose_json",
                &self.pose_json,
            )?,
        })
    }
}

// ---------------------------------------------------------------------------
// ObjectsDatabase
// ---------------------------------------------------------------------------

pub struct ObjectsDatabase {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl ObjectsDatabase {
    /// Open (creating if needed) the catalog at `db_path`.  The path is
    /// tilde-expanded and its parent directory created; the schema is
    /// initialised and migrated.
    pub fn open(db_path: &Path, busy_timeout: Duration) -> GraspDbResult<Self> {
        let expanded = expand_tilde(&db_path.to_string_lossy());
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            std::env::current_dir()?.join(&expanded)
        };
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Self {
            db_path: resolved,
            busy_timeout,
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> GraspDbResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Set WAL mode, create all tables and indexes, then run pending
    /// migrations.
    pub fn init_schema(&self) -> GraspDbResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(&conn)?;
        Ok(())
    }

    pub fn schema_version(&self) -> GraspDbResult<i32> {
        let conn = self.connect()?;
        Ok(schema::get_schema_version(&conn))
    }

    pub fn get_meta(&self, key: &str) -> GraspDbResult<Option<String>> {
        let conn = self.connect()?;
        let result: Result<String, _> = conn.query_row(
            "SELECT value FROM catalog_meta WHERE key = ?1 LIMIT 1;",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_meta(&self, key: &str, value: &str) -> GraspDbResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO catalog_meta(key, value) VALUES(?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![key, value],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Grasps
    // -----------------------------------------------------------------------

    /// Cluster-representative grasps of `scaled_model_id` for `hand_name`,
    /// ordered by grasp id.
    pub fn cluster_rep_grasps(
        &self,
        scaled_model_id: ModelId,
        hand_name: &str,
    ) -> GraspDbResult<Vec<RawGraspRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT grasp_id, scaled_model_id, quality, scaled_quality, table_clearance, \
                    pre_grasp_posture_json, final_grasp_posture_json, final_grasp_pose_json \
             FROM grasp \
             WHERE scaled_model_id = ?1 AND hand_name = ?2 AND cluster_rep = 1 \
             ORDER BY grasp_id ASC;",
        )?;
        let rows: Vec<GraspRow> = stmt
            .query_map(params![scaled_model_id, hand_name], |row| {
                Ok(GraspRow {
                    grasp_id: row.get(0)?,
                    scaled_model_id: row.get(1)?,
                    quality: row.get(2)?,
                    scaled_quality: row.get(3)?,
                    table_clearance: row.get(4)?,
                    pre_grasp_json: row.get(5)?,
                    final_grasp_json: row.get(6)?,
                    pose_json: row.get(7)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        debug!(
            scaled_model_id,
            hand_name,
            rows = rows.len(),
            "objects database: loaded cluster rep grasps"
        );
        rows.into_iter().map(GraspRow::decode).collect()
    }

    /// Store a grasp for `hand_name`.  A non-positive `grasp_id` lets the
    /// database assign one.  Returns the stored id.
    pub fn insert_grasp(
        &self,
        hand_name: &str,
        record: &RawGraspRecord,
        cluster_rep: bool,
    ) -> GraspDbResult<i64> {
        let conn = self.connect()?;
        let grasp_id = (record.grasp_id > 0).then_some(record.grasp_id);
        conn.execute(
            "INSERT INTO grasp ( \
                 grasp_id, scaled_model_id, hand_name, pre_grasp_posture_json, \
                 final_grasp_posture_json, final_grasp_pose_json, quality, \
                 scaled_quality, table_clearance, cluster_rep \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                grasp_id,
                record.scaled_model_id,
                hand_name,
                serde_json::to_string(&record.pre_grasp_joints)?,
                serde_json::to_string(&record.final_grasp_joints)?,
                serde_json::to_string(&record.final_grasp_pose)?,
                record.quality,
                record.scaled_quality,
                record.table_clearance,
                cluster_rep as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // -----------------------------------------------------------------------
    // Models
    // -----------------------------------------------------------------------

    pub fn insert_original_model(
        &self,
        original_model_id: i64,
        name: &str,
        maker: &str,
        tags: &[String],
    ) -> GraspDbResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO original_model (original_model_id, name, maker, tags_json) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(original_model_id) DO UPDATE SET \
                 name = excluded.name, \
                 maker = excluded.maker, \
                 tags_json = excluded.tags_json;",
            params![original_model_id, name, maker, serde_json::to_string(tags)?],
        )?;
        Ok(())
    }

    pub fn insert_scaled_model(
        &self,
        scaled_model_id: ModelId,
        original_model_id: i64,
        scale: f64,
    ) -> GraspDbResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO scaled_model (scaled_model_id, original_model_id, scale) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(scaled_model_id) DO UPDATE SET \
                 original_model_id = excluded.original_model_id, \
                 scale = excluded.scale;",
            params![scaled_model_id, original_model_id, scale],
        )?;
        Ok(())
    }

    pub fn add_to_model_set(&self, model_set: &str, original_model_id: i64) -> GraspDbResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO model_set (model_set_name, original_model_id) VALUES (?1, ?2);",
            params![model_set, original_model_id],
        )?;
        Ok(())
    }

    /// Scaled models whose original model belongs to `model_set`.  An empty
    /// set name lists every scaled model.
    pub fn scaled_models_by_set(&self, model_set: &str) -> GraspDbResult<Vec<ScaledModel>> {
        let conn = self.connect()?;
        let base = "SELECT s.scaled_model_id, s.original_model_id, s.scale, \
                           o.name, o.maker, o.tags_json \
                    FROM scaled_model s \
                    JOIN original_model o ON o.original_model_id = s.original_model_id";
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(ScaledModel, String)> {
            Ok((
                ScaledModel {
                    scaled_model_id: row.get(0)?,
                    original_model_id: row.get(1)?,
                    scale: row.get(2)?,
                    name: row.get(3)?,
                    maker: row.get(4)?,
                    tags: Vec::new(),
                },
                row.get(5)?,
            ))
        };
        let rows: Vec<(ScaledModel, String)> = if model_set.is_empty() {
            let mut stmt = conn.prepare(&format!("{base} ORDER BY s.scaled_model_id;"))?;
            let rows = stmt.query_map([], map_row)?.collect::<Result<_, _>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(&format!(
                "{base} JOIN model_set m ON m.original_model_id = s.original_model_id \
                 WHERE m.model_set_name = ?1 ORDER BY s.scaled_model_id;"
            ))?;
            let rows = stmt
                .query_map(params![model_set], map_row)?
                .collect::<Result<_, _>>()?;
            rows
        };
        rows.into_iter()
            .map(|(mut model, tags_json)| {
                model.tags = decode_column(
                    "original_model",
                    model.original_model_id,
                    "tags_json",
                    &tags_json,
                )?;
                Ok(model)
            })
            .collect()
    }

    /// Name, maker and tags of a scaled model.  Exactly one model must match.
    pub fn scaled_model_description(
        &self,
        scaled_model_id: ModelId,
    ) -> GraspDbResult<ModelDescription> {
        let conn = self.connect()?;
        let row: Option<(i64, String, String, String)> = conn
            .query_row(
                "SELECT o.original_model_id, o.name, o.maker, o.tags_json \
                 FROM scaled_model s \
                 JOIN original_model o ON o.original_model_id = s.original_model_id \
                 WHERE s.scaled_model_id = ?1;",
                params![scaled_model_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let (original_model_id, name, maker, tags_json) = row.ok_or_else(|| {
            GraspDbError::Database(format!("no model description for scaled model {scaled_model_id}"))
        })?;
        Ok(ModelDescription {
            name,
            maker,
            tags: decode_column("original_model", original_model_id, "tags_json", &tags_json)?,
        })
    }

    // -----------------------------------------------------------------------
    // Meshes
    // -----------------------------------------------------------------------

    /// Store the unscaled mesh of an original model.
    pub fn insert_mesh(&self, original_model_id: i64, mesh: &ModelMesh) -> GraspDbResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO mesh (original_model_id, vertices_json, triangles_json) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(original_model_id) DO UPDATE SET \
                 vertices_json = excluded.vertices_json, \
                 triangles_json = excluded.triangles_json;",
            params![
                original_model_id,
                serde_json::to_string(&mesh.vertices)?,
                serde_json::to_string(&mesh.triangles)?,
            ],
        )?;
        Ok(())
    }

    /// Mesh of a scaled model: the original model's mesh with every vertex
    /// multiplied by the scale.
    pub fn scaled_model_mesh(&self, scaled_model_id: ModelId) -> GraspDbResult<ModelMesh> {
        let conn = self.connect()?;
        let row: Option<(i64, f64, String, String)> = conn
            .query_row(
                "SELECT s.original_model_id, s.scale, m.vertices_json, m.triangles_json \
                 FROM scaled_model s \
                 JOIN mesh m ON m.original_model_id = s.original_model_id \
                 WHERE s.scaled_model_id = ?1;",
                params![scaled_model_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let (original_model_id, scale, vertices_json, triangles_json) = row.ok_or_else(|| {
            GraspDbError::Database(format!("no mesh for scaled model {scaled_model_id}"))
        })?;
        let vertices: Vec<[f64; 3]> =
            decode_column("mesh", original_model_id, "vertices_json", &vertices_json)?;
        let triangles: Vec<[u32; 3]> =
            decode_column("mesh", original_model_id, "triangles_json", &triangles_json)?;
        Ok(ModelMesh {
            vertices: vertices
                .into_iter()
                .map(|[x, y, z]| [x * scale, y * scale, z * scale])
                .collect(),
            triangles,
        })
    }

    // -----------------------------------------------------------------------
    // Scans
    // -----------------------------------------------------------------------

    /// Scans of `scaled_model_id` recorded by `scan_source`, oldest first.
    /// An empty source matches every scan of the model.
    pub fn model_scans(
        &self,
        scaled_model_id: ModelId,
        scan_source: &str,
    ) -> GraspDbResult<Vec<ModelScan>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT scan_id, scaled_model_id, scan_source, cloud_topic, frame_id, stamp, \
                    object_pose_json, bagfile_location \
             FROM scan \
             WHERE scaled_model_id = ?1 AND (?2 = '' OR scan_source = ?2) \
             ORDER BY scan_id ASC;",
        )?;
        let rows: Vec<(ModelScan, String)> = stmt
            .query_map(params![scaled_model_id, scan_source], |row| {
                Ok((
                    ModelScan {
                        scan_id: Some(row.get(0)?),
                        scaled_model_id: row.get(1)?,
                        scan_source: row.get(2)?,
                        cloud_topic: row.get(3)?,
                        ground_truth_pose: StampedPose {
                            frame_id: row.get(4)?,
                            stamp: row.get(5)?,
                            pose: Pose::identity(),
                        },
                        bagfile_location: row.get(7)?,
                    },
                    row.get(6)?,
                ))
            })?
            .collect::<Result<_, _>>()?;
        rows.into_iter()
            .map(|(mut scan, pose_json)| {
                let scan_id = scan.scan_id.unwrap_or_default();
                scan.ground_truth_pose.pose =
                    decode_column("scan", scan_id, "object_pose_json", &pose_json)?;
                Ok(scan)
            })
            .collect()
    }

    /// Record a new scan.  Any `scan_id` on the input is ignored; the
    /// assigned id is returned.
    pub fn insert_scan(&self, scan: &ModelScan) -> GraspDbResult<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO scan ( \
                 scaled_model_id, scan_source, cloud_topic, frame_id, stamp, \
                 object_pose_json, bagfile_location \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                scan.scaled_model_id,
                scan.scan_source,
                scan.cloud_topic,
                scan.ground_truth_pose.frame_id,
                scan.ground_truth_pose.stamp,
                serde_json::to_string(&scan.ground_truth_pose.pose)?,
                scan.bagfile_location,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }
}

impl GraspCatalog for ObjectsDatabase {
    fn cluster_rep_grasps(
        &self,
        model_id: ModelId,
        hand_id: &str,
    ) -> GraspDbResult<Vec<RawGraspRecord>> {
        ObjectsDatabase::cluster_rep_grasps(self, model_id, hand_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, ObjectsDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let db = ObjectsDatabase::open(
            &dir.path().join("nested").join("objects.db"),
            Duration::from_millis(500),
        )
        .unwrap();
        (dir, db)
    }

    fn seed_models(db: &ObjectsDatabase) {
        db.insert_original_model(1, "coke can", "Coca-Cola", &["can".into(), "soda".into()])
            .unwrap();
        db.insert_original_model(2, "mug", "IKEA", &[]).unwrap();
        db.insert_scaled_model(101, 1, 1.0).unwrap();
        db.insert_scaled_model(102, 1, 2.0).unwrap();
        db.insert_scaled_model(201, 2, 1.0).unwrap();
        db.add_to_model_set("REDUCED_MODEL_SET", 1).unwrap();
    }

    fn grasp(grasp_id: i64, scaled_model_id: ModelId, quality: f64) -> RawGraspRecord {
        RawGraspRecord {
            grasp_id,
            scaled_model_id,
            quality,
            scaled_quality: 0.8,
            table_clearance: 35.0,
            pre_grasp_joints: vec![0.5],
            final_grasp_joints: vec![0.25],
            final_grasp_pose: Pose::from_translation(0.0, -0.03125, 0.125),
        }
    }

    #[test]
    fn test_open_creates_parent_and_schema() {
        let (_dir, db) = open_temp();
        assert!(db.db_path().exists());
        assert_eq!(db.schema_version().unwrap(), schema::SCHEMA_VERSION);
        // Re-opening an initialised catalog is fine.
        let again = ObjectsDatabase::open(db.db_path(), Duration::from_millis(500)).unwrap();
        assert_eq!(again.schema_version().unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_meta_roundtrip() {
        let (_dir, db) = open_temp();
        assert_eq!(db.get_meta("catalog_name").unwrap(), None);
        db.set_meta("catalog_name", "household").unwrap();
        assert_eq!(db.get_meta("catalog_name").unwrap().as_deref(), Some("household"));
    }

    #[test]
    fn test_cluster_rep_grasps_filters_and_orders() {
        let (_dir, db) = open_temp();
        seed_models(&db);
        db.insert_grasp("WILLOW_GRIPPER_2010", &grasp(30, 101, -50.0), true).unwrap();
        db.insert_grasp("WILLOW_GRIPPER_2010", &grasp(10, 101, -45.0), true).unwrap();
        db.insert_grasp("WILLOW_GRIPPER_2010", &grasp(20, 101, -60.0), false).unwrap();
        db.insert_grasp("Schunk", &grasp(40, 101, -70.0), true).unwrap();
        db.insert_grasp("WILLOW_GRIPPER_2010", &grasp(50, 201, -70.0), true).unwrap();

        let grasps = db.cluster_rep_grasps(101, "WILLOW_GRIPPER_2010").unwrap();
        let ids: Vec<i64> = grasps.iter().map(|g| g.grasp_id).collect();
        assert_eq!(ids, vec![10, 30]);
        assert_eq!(grasps[0], grasp(10, 101, -45.0));

        assert!(db.cluster_rep_grasps(999, "Schunk").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_grasp_row_is_database_error() {
        let (_dir, db) = open_temp();
        seed_models(&db);
        let conn = db.connect().unwrap();
        conn.execute(
            "INSERT INTO grasp (scaled_model_id, hand_name, pre_grasp_posture_json, \
                 final_grasp_posture_json, final_grasp_pose_json, quality, cluster_rep) \
             VALUES (101, 'Schunk', '[0.1', '[]', '{}', -50.0, 1);",
            [],
        )
        .unwrap();
        let err = db.cluster_rep_grasps(101, "Schunk").unwrap_err();
        assert!(matches!(err, GraspDbError::Database(_)));
    }

    #[test]
    fn test_scaled_models_by_set() {
        let (_dir, db) = open_temp();
        seed_models(&db);
        let reduced = db.scaled_models_by_set("REDUCED_MODEL_SET").unwrap();
        let ids: Vec<ModelId> = reduced.iter().map(|m| m.scaled_model_id).collect();
        assert_eq!(ids, vec![101, 102]);
        assert_eq!(reduced[0].tags, vec!["can".to_string(), "soda".to_string()]);

        assert_eq!(db.scaled_models_by_set("").unwrap().len(), 3);
        assert!(db.scaled_models_by_set("NO_SUCH_SET").unwrap().is_empty());
    }

    #[test]
    fn test_model_description() {
        let (_dir, db) = open_temp();
        seed_models(&db);
        let description = db.scaled_model_description(201).unwrap();
        assert_eq!(description.name, "mug");
        assert_eq!(description.maker, "IKEA");
        assert!(description.tags.is_empty());
        assert!(matches!(
            db.scaled_model_description(404),
            Err(GraspDbError::Database(_))
        ));
    }

    #[test]
    fn test_scaled_model_mesh_applies_scale() {
        let (_dir, db) = open_temp();
        seed_models(&db);
        let mesh = ModelMesh {
            vertices: vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [0.0, 0.25, 0.0]],
            triangles: vec![[0, 1, 2]],
        };
        db.insert_mesh(1, &mesh).unwrap();
        assert_eq!(db.scaled_model_mesh(101).unwrap(), mesh);
        let doubled = db.scaled_model_mesh(102).unwrap();
        assert_eq!(doubled.vertices[1], [1.0, 0.0, 0.0]);
        assert_eq!(doubled.triangles, mesh.triangles);
        assert!(db.scaled_model_mesh(201).is_err());
    }

    #[test]
    fn test_scans_roundtrip_and_source_filter() {
        let (_dir, db) = open_temp();
        seed_models(&db);
        let mut scan = ModelScan {
            scan_id: None,
            scaled_model_id: 101,
            scan_source: "kinect".into(),
            cloud_topic: "/camera/points".into(),
            bagfile_location: "/bags/can_01.bag".into(),
            ground_truth_pose: StampedPose {
                frame_id: "head_camera".into(),
                stamp: 12.5,
                pose: Pose::from_translation(0.7, 0.0, 0.1),
            },
        };
        let first = db.insert_scan(&scan).unwrap();
        scan.scan_source = "stereo".into();
        db.insert_scan(&scan).unwrap();

        let kinect = db.model_scans(101, "kinect").unwrap();
        assert_eq!(kinect.len(), 1);
        assert_eq!(kinect[0].scan_id, Some(first));
        assert_eq!(kinect[0].ground_truth_pose.frame_id, "head_camera");
        assert_eq!(kinect[0].ground_truth_pose.stamp, 12.5);
        assert!(kinect[0]
            .ground_truth_pose
            .pose
            .approx_eq(&Pose::from_translation(0.7, 0.0, 0.1), 1e-12));
        assert_eq!(db.model_scans(101, "").unwrap().len(), 2);
        assert!(db.model_scans(201, "kinect").unwrap().is_empty());
    }

    #[test]
    fn test_grasp_for_unknown_model_rejected() {
        let (_dir, db) = open_temp();
        assert!(db.insert_grasp("Schunk", &grasp(1, 777, -50.0), true).is_err());
    }
}
