//! Transform lookup between named coordinate frames.
//!
//! `TransformProvider` is the seam the grasp pipeline consumes.  `FrameTree`
//! is a static in-memory implementation: every frame has at most one parent
//! and stores its pose relative to that parent.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::FrameError;
use crate::frames::pose::Pose;

/// Point in time a transform is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum LookupTime {
    /// Most recent transform available.
    #[default]
    Latest,
    /// Seconds since the epoch of the producing clock.
    At(f64),
}

/// Capability to look up the transform between two named frames.
///
/// The returned pose maps coordinates expressed in `source_frame` into
/// `target_frame`, i.e. it is the pose of `source_frame` seen from
/// `target_frame`.  Implementations own any waiting/timeout behaviour.
pub trait TransformProvider: Send + Sync {
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        at: LookupTime,
    ) -> Result<Pose, FrameError>;
}

/// One parent link of the tree, as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameLink {
    pub parent: String,
    pub child: String,
    pub pose: Pose,
}

/// Static transform tree.  Transforms never expire, so every `LookupTime`
/// resolves to the same answer.
#[derive(Debug, Default)]
pub struct FrameTree {
    /// child -> (parent, pose of child in parent)
    links: RwLock<HashMap<String, (String, Pose)>>,
}

impl FrameTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a list of links, rejecting cycles.
    pub fn from_links(links: &[FrameLink]) -> Result<Self, FrameError> {
        let tree = Self::new();
        for link in links {
            tree.set_transform(&link.parent, &link.child, link.pose)?;
        }
        Ok(tree)
    }

    /// Insert or re-parent `child` under `parent`.
    pub fn set_transform(&self, parent: &str, child: &str, pose: Pose) -> Result<(), FrameError> {
        let mut links = self.links.write();
        if parent == child {
            return Err(FrameError::Cycle {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        // Walking up from the new parent must not reach the child.
        {
            let mut cursor = parent;
            let mut seen: HashSet<&str> = HashSet::new();
            while let Some((next, _)) = links.get(cursor) {
                if next == child || !seen.insert(cursor) {
                    return Err(FrameError::Cycle {
                        parent: parent.to_string(),
                        child: child.to_string(),
                    });
                }
                cursor = next.as_str();
            }
        }
        links.insert(child.to_string(), (parent.to_string(), pose));
        Ok(())
    }

    pub fn remove_frame(&self, child: &str) -> bool {
        self.links.write().remove(child).is_some()
    }

    pub fn has_frame(&self, frame: &str) -> bool {
        let links = self.links.read();
        links.contains_key(frame) || links.values().any(|(parent, _)| parent == frame)
    }

    pub fn frame_count(&self) -> usize {
        let links = self.links.read();
        let mut frames: HashSet<&str> = links.keys().map(String::as_str).collect();
        frames.extend(links.values().map(|(parent, _)| parent.as_str()));
        frames.len()
    }

    /// Returns the root of `frame` and the pose of `frame` in that root.
    fn chain_to_root(
        links: &HashMap<String, (String, Pose)>,
        frame: &str,
    ) -> (String, Pose) {
        let mut accumulated = Pose::identity();
        let mut cursor = frame.to_string();
        while let Some((parent, pose)) = links.get(&cursor) {
            accumulated = pose.multiply(&accumulated);
            cursor = parent.clone();
        }
        (cursor, accumulated)
    }
}

impl TransformProvider for FrameTree {
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        _at: LookupTime,
    ) -> Result<Pose, FrameError> {
        if target_frame == source_frame {
            return Ok(Pose::identity());
        }
        for frame in [target_frame, source_frame] {
            if !self.has_frame(frame) {
                return Err(FrameError::UnknownFrame(frame.to_string()));
            }
        }

        let links = self.links.read();
        let (target_root, root_from_target) = Self::chain_to_root(&links, target_frame);
        let (source_root, root_from_source) = Self::chain_to_root(&links, source_frame);
        if target_root != source_root {
            return Err(FrameError::Unavailable {
                target_frame: target_frame.to_string(),
                source_frame: source_frame.to_string(),
            });
        }
        Ok(root_from_target.inverse().multiply(&root_from_source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> FrameTree {
        FrameTree::from_links(&[
            FrameLink {
                parent: "base_link".into(),
                child: "torso".into(),
                pose: Pose::from_translation(0.0, 0.0, 1.0),
            },
            FrameLink {
                parent: "torso".into(),
                child: "head_camera".into(),
                pose: Pose::from_translation(0.1, 0.0, 0.5),
            },
            FrameLink {
                parent: "base_link".into(),
                child: "table".into(),
                pose: Pose::from_translation(1.0, 0.0, 0.7),
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_same_frame_is_identity() {
        let tree = FrameTree::new();
        let t = tree
            .lookup_transform("anything", "anything", LookupTime::Latest)
            .unwrap();
        assert_eq!(t, Pose::identity());
    }

    #[test]
    fn test_lookup_along_chain() {
        let tree = sample_tree();
        let t = tree
            .lookup_transform("base_link", "head_camera", LookupTime::Latest)
            .unwrap();
        assert!(t.approx_eq(&Pose::from_translation(0.1, 0.0, 1.5), 1e-9));
    }

    #[test]
    fn test_lookup_across_branches() {
        let tree = sample_tree();
        let t = tree
            .lookup_transform("table", "head_camera", LookupTime::At(12.0))
            .unwrap();
        assert!(t.approx_eq(&Pose::from_translation(-0.9, 0.0, 0.8), 1e-9));
        let back = tree
            .lookup_transform("head_camera", "table", LookupTime::Latest)
            .unwrap();
        assert!(t.multiply(&back).approx_eq(&Pose::identity(), 1e-9));
    }

    #[test]
    fn test_unknown_frame() {
        let tree = sample_tree();
        let err = tree
            .lookup_transform("base_link", "gripper", LookupTime::Latest)
            .unwrap_err();
        assert_eq!(err, FrameError::UnknownFrame("gripper".into()));
    }

    #[test]
    fn test_disconnected_trees_are_unavailable() {
        let tree = sample_tree();
        tree.set_transform("map", "odom", Pose::identity()).unwrap();
        let err = tree
            .lookup_transform("map", "torso", LookupTime::Latest)
            .unwrap_err();
        assert!(matches!(err, FrameError::Unavailable { .. }));
    }

    #[test]
    fn test_cycle_rejected() {
        let tree = sample_tree();
        let err = tree
            .set_transform("head_camera", "base_link", Pose::identity())
            .unwrap_err();
        assert!(matches!(err, FrameError::Cycle { .. }));
        assert!(tree
            .set_transform("torso", "torso", Pose::identity())
            .is_err());
    }

    #[test]
    fn test_frame_bookkeeping() {
        let tree = sample_tree();
        assert_eq!(tree.frame_count(), 4);
        assert!(tree.has_frame("base_link"));
        assert!(tree.remove_frame("table"));
        assert!(!tree.has_frame("table"));
    }
}
