//! Hand profile resolution with a bounded in-memory cache.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::errors::ResolveError;
use crate::hand::description::{hand_database_name_param, hand_joints_param, HandDescriptionSource};
use crate::models::HandProfile;

struct ProfileCache {
    /// Bumped on every reconfiguration so that lookups racing with it do not
    /// repopulate the cache with profiles from the old source.
    generation: u64,
    entries: IndexMap<String, HandProfile>,
}

/// Maps an arm name to its hand profile.
///
/// Profiles are memoised per arm until `invalidate` or `reconfigure` is
/// called.  Reads take a shared lock only.
pub struct HandProfileResolver {
    source: RwLock<Arc<dyn HandDescriptionSource>>,
    max_entries: usize,
    cache: RwLock<ProfileCache>,
}

impl HandProfileResolver {
    pub fn new(source: Arc<dyn HandDescriptionSource>, max_entries: usize) -> Self {
        Self {
            source: RwLock::new(source),
            max_entries: max_entries.max(1),
            cache: RwLock::new(ProfileCache {
                generation: 0,
                entries: IndexMap::new(),
            }),
        }
    }

    /// Resolve the hand profile of `arm_name`.
    ///
    /// Both parameters must be present and the joint list non-empty;
    /// otherwise `ConfigurationMissing` names the offending parameter.
    pub fn resolve(&self, arm_name: &str) -> Result<HandProfile, ResolveError> {
        let generation = {
            let cache = self.cache.read();
            if let Some(profile) = cache.entries.get(arm_name) {
                return Ok(profile.clone());
            }
            cache.generation
        };

        let source = self.source.read().clone();
        let catalog_hand_id = source
            .hand_database_name(arm_name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Self::missing(arm_name, hand_database_name_param(arm_name)))?;
        let joint_names = source
            .hand_joint_names(arm_name)
            .filter(|names| !names.is_empty())
            .ok_or_else(|| Self::missing(arm_name, hand_joints_param(arm_name)))?;

        let profile = HandProfile {
            catalog_hand_id,
            joint_names,
        };
        debug!(
            arm_name,
            hand_id = %profile.catalog_hand_id,
            joints = profile.joint_names.len(),
            "resolved hand profile"
        );

        let mut cache = self.cache.write();
        if cache.generation == generation {
            cache.entries.insert(arm_name.to_string(), profile.clone());
            while cache.entries.len() > self.max_entries {
                cache.entries.shift_remove_index(0);
            }
        }
        Ok(profile)
    }

    /// Drop every cached profile.  The next lookup re-reads the source.
    pub fn invalidate(&self) {
        let mut cache = self.cache.write();
        cache.generation += 1;
        cache.entries.clear();
    }

    /// Swap the configuration source and drop every cached profile.
    pub fn reconfigure(&self, source: Arc<dyn HandDescriptionSource>) {
        let mut cache = self.cache.write();
        *self.source.write() = source;
        cache.generation += 1;
        cache.entries.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.read().entries.len()
    }

    fn missing(arm_name: &str, parameter: String) -> ResolveError {
        error!(arm_name, %parameter, "hand description: could not find parameter");
        ResolveError::ConfigurationMissing {
            arm_name: arm_name.to_string(),
            parameter,
        }
    }
}
