use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::validation::validate_target;
use super::{Target, TargetId};
use crate::error::ConfigError;

/// Immutable, validated snapshot of the monitored targets
#[derive(Debug, Clone, Default)]
pub struct Registry {
    targets: BTreeMap<TargetId, Arc<Target>>,
}

/// Difference between two registry snapshots
#[derive(Debug, Default)]
pub struct RegistryDiff {
    pub added: Vec<Arc<Target>>,
    pub removed: Vec<TargetId>,
    /// Targets whose descriptor changed; these carry the new descriptor
    pub changed: Vec<Arc<Target>>,
    pub unchanged: usize,
}

impl RegistryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

impl Registry {
    /// Validate targets and build a registry. Names must be unique.
    pub fn new(targets: impl IntoIterator<Item = Target>) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for target in targets {
            validate_target(&target)?;
            let id = target.id.clone();
            if map.insert(id.clone(), Arc::new(target)).is_some() {
                return Err(ConfigError::DuplicateTarget(id.to_string()));
            }
        }
        Ok(Self { targets: map })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Reject targets that route to channels outside `known`
    pub fn check_routes<'a>(&self, known: impl IntoIterator<Item = &'a str>) -> Result<(), ConfigError> {
        let known: HashSet<&str> = known.into_iter().collect();
        for target in self.targets.values() {
            for channel in target.channels.iter().flatten() {
                if !known.contains(channel.as_str()) {
                    return Err(ConfigError::UnknownChannel {
                        target: target.id.to_string(),
                        channel: channel.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &TargetId) -> Option<&Arc<Target>> {
        self.targets.get(id)
    }

    pub fn contains(&self, id: &TargetId) -> bool {
        self.targets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Target>> {
        self.targets.values()
    }

    /// Compute what has to change to go from `self` to `next`
    pub fn diff(&self, next: &Registry) -> RegistryDiff {
        let mut diff = RegistryDiff::default();

        for (id, target) in &next.targets {
            match self.targets.get(id) {
                None => diff.added.push(Arc::clone(target)),
                Some(current) if current.as_ref() != target.as_ref() => {
                    diff.changed.push(Arc::clone(target))
                }
                Some(_) => diff.unchanged += 1,
            }
        }

        diff.removed = self
            .targets
            .keys()
            .filter(|id| !next.targets.contains_key(*id))
            .cloned()
            .collect();

        diff
    }
}
