//! Criterion benchmarks for graspdb-core.
//!
//! Everything here is plain Rust; no Python runtime is needed.
//!
//! ## Benchmark groups
//!
//! 1. **filter**: pruning policies over synthetic grasp lists.
//! 2. **adapt**: joint layout mapping per hand.
//! 3. **compose**: pose composition with and without a frame change.
//! 4. **planning**: full requests against an in-memory catalog and an
//!    on-disk SQLite catalog.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/graspdb-core/Cargo.toml
//! # Only the planning group:
//! cargo bench --manifest-path crates/graspdb-core/Cargo.toml -- planning
//! ```

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use _graspdb_core::errors::GraspDbResult;
use _graspdb_core::frames::pose::{Pose, StampedPose};
use _graspdb_core::frames::tree::FrameTree;
use _graspdb_core::grasp::compose::PoseCompositor;
use _graspdb_core::grasp::filter::{filter_grasps, FilterPolicy};
use _graspdb_core::grasp::layout::adapt;
use _graspdb_core::grasp::planner::{GraspCatalog, GraspPlanner};
use _graspdb_core::hand::description::HandDescriptions;
use _graspdb_core::hand::profile::HandProfileResolver;
use _graspdb_core::models::{
    GraspPlanningRequest, GraspTarget, HandProfile, ModelId, PotentialModel, RawGraspRecord,
};
use _graspdb_core::store::database::ObjectsDatabase;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SCHUNK_JOINTS: [&str; 7] = ["knuckle", "f1", "f2", "f3", "f4", "f5", "f6"];
const GRIPPER_JOINTS: [&str; 4] = ["l_finger", "r_finger", "r_tip", "l_tip"];

/// `n` grasps, roughly two thirds of which survive the default cutoff.
fn synthetic_grasps(n: usize, raw_values: usize) -> Vec<RawGraspRecord> {
    (0..n)
        .map(|i| RawGraspRecord {
            grasp_id: i as i64 + 1,
            scaled_model_id: 18744,
            quality: if i % 3 == 0 { -20.0 } else { -45.0 - (i % 17) as f64 },
            scaled_quality: (i % 100) as f64 / 100.0,
            table_clearance: (i % 50) as f64,
            pre_grasp_joints: (0..raw_values).map(|j| 0.05 * j as f64).collect(),
            final_grasp_joints: (0..raw_values).map(|j| 0.1 * j as f64).collect(),
            final_grasp_pose: Pose::new(
                [0.01 * (i % 10) as f64, -0.02, 0.12],
                [0.0, 0.0, 0.382_683_432_365_089_8, 0.923_879_532_511_286_7],
            ),
        })
        .collect()
}

fn profile(hand_id: &str, joints: &[&str]) -> HandProfile {
    HandProfile {
        catalog_hand_id: hand_id.to_string(),
        joint_names: joints.iter().map(|j| j.to_string()).collect(),
    }
}

fn frames() -> Arc<FrameTree> {
    let tree = FrameTree::new();
    tree.set_transform("base_link", "torso", Pose::from_translation(0.0, 0.0, 0.8))
        .unwrap();
    tree.set_transform("torso", "head_camera", Pose::from_translation(0.1, 0.0, 0.5))
        .unwrap();
    Arc::new(tree)
}

fn hands() -> Arc<HandDescriptions> {
    Arc::new(
        HandDescriptions::new()
            .with_arm("left_arm", "Schunk", &SCHUNK_JOINTS)
            .with_arm("right_arm", "WILLOW_GRIPPER_2010", &GRIPPER_JOINTS),
    )
}

fn request(arm: &str, frame: &str) -> GraspPlanningRequest {
    GraspPlanningRequest {
        arm_name: arm.to_string(),
        target: GraspTarget {
            potential_models: vec![PotentialModel {
                model_id: 18744,
                pose: StampedPose::new(frame, Pose::from_translation(0.6, 0.0, -0.4)),
                confidence: 1.0,
            }],
            reference_frame_id: "base_link".to_string(),
        },
    }
}

struct InMemoryCatalog {
    records: Vec<RawGraspRecord>,
}

impl GraspCatalog for InMemoryCatalog {
    fn cluster_rep_grasps(
        &self,
        _model_id: ModelId,
        _hand_id: &str,
    ) -> GraspDbResult<Vec<RawGraspRecord>> {
        Ok(self.records.clone())
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let policies = [
        ("quality_cutoff", FilterPolicy::default()),
        ("gripper_and_clearance", FilterPolicy::gripper_and_clearance_defaults()),
    ];
    for &n in &[100usize, 1_000, 10_000] {
        let records = synthetic_grasps(n, 1);
        for (name, policy) in &policies {
            group.bench_with_input(BenchmarkId::new(*name, n), &records, |b, records| {
                b.iter_with_setup(
                    || records.clone(),
                    |records| black_box(filter_grasps(records, policy)),
                );
            });
        }
    }
    group.finish();
}

fn bench_adapt(c: &mut Criterion) {
    let mut group = c.benchmark_group("adapt");
    let schunk = profile("Schunk", &SCHUNK_JOINTS);
    let gripper = profile("WILLOW_GRIPPER_2010", &GRIPPER_JOINTS);
    let direct = profile("GENERIC_HAND", &["a", "b", "c"]);
    let schunk_record = synthetic_grasps(1, 8).remove(0);
    let gripper_record = synthetic_grasps(1, 1).remove(0);
    let direct_record = synthetic_grasps(1, 3).remove(0);

    group.bench_function("underactuated_7dof", |b| {
        b.iter(|| adapt(black_box(&schunk_record), &schunk).unwrap())
    });
    group.bench_function("parallel_jaw", |b| {
        b.iter(|| adapt(black_box(&gripper_record), &gripper).unwrap())
    });
    group.bench_function("direct_mapped", |b| {
        b.iter(|| adapt(black_box(&direct_record), &direct).unwrap())
    });
    group.finish();
}

fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");
    let tree = frames();
    let local = Pose::new([0.0, -0.02, 0.12], [0.0, 0.0, 0.0, 1.0]);

    let same = StampedPose::new("base_link", Pose::from_translation(0.6, 0.0, 0.8));
    group.bench_function("same_frame", |b| {
        b.iter(|| {
            let mut compositor = PoseCompositor::new(&same, "base_link", tree.as_ref());
            compositor.compose(black_box(&local)).unwrap()
        })
    });

    let camera = StampedPose::new("head_camera", Pose::from_translation(0.6, 0.0, -0.4));
    group.bench_function("frame_change_100_poses", |b| {
        b.iter(|| {
            let mut compositor = PoseCompositor::new(&camera, "base_link", tree.as_ref());
            for _ in 0..100 {
                black_box(compositor.compose(&local).unwrap());
            }
        })
    });
    group.finish();
}

fn bench_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("planning");
    group.measurement_time(Duration::from_secs(10));

    for &n in &[50usize, 500] {
        let planner = GraspPlanner::new(
            Arc::new(InMemoryCatalog {
                records: synthetic_grasps(n, 8),
            }),
            HandProfileResolver::new(hands(), 8),
            frames(),
            FilterPolicy::default(),
        );
        let req = request("left_arm", "head_camera");
        group.bench_with_input(BenchmarkId::new("in_memory", n), &req, |b, req| {
            b.iter(|| black_box(planner.plan(req)))
        });
    }

    let dir = tempfile::tempdir().unwrap();
    let db = ObjectsDatabase::open(&dir.path().join("bench.db"), Duration::from_secs(5)).unwrap();
    db.insert_original_model(1, "bench object", "", &[]).unwrap();
    db.insert_scaled_model(18744, 1, 1.0).unwrap();
    for record in synthetic_grasps(200, 1) {
        db.insert_grasp("WILLOW_GRIPPER_2010", &record, true).unwrap();
    }
    let planner = GraspPlanner::new(
        Arc::new(db),
        HandProfileResolver::new(hands(), 8),
        frames(),
        FilterPolicy::default(),
    );
    let req = request("right_arm", "head_camera");
    group.bench_function("sqlite_200", |b| b.iter(|| black_box(planner.plan(&req))));

    group.finish();
}

// ---------------------------------------------------------------------------
// Register all benchmark groups
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_filter, bench_adapt, bench_compose, bench_planning);
criterion_main!(benches);
