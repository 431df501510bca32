use crate::error::{Result, VerdictError};
use crate::evaluator::ModelParser;
use crate::regression::RegressionParser;
use crate::threshold;
use crate::types::{ModelRecord, RegistryStats, Version, VersionedSummary};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// Versions deployed under one model name.
#[derive(Default)]
struct VersionSlot {
    versions: BTreeMap<Version, Arc<ModelRecord>>,
    /// Highest version ever stored under this name. Automatic allocation
    /// never goes back below it, even after undeploys.
    high_water: Version,
}

impl VersionSlot {
    /// `None` once `Version::MAX` has been handed out.
    fn next_version(&self) -> Option<Version> {
        let live_max = self.versions.keys().next_back().copied().unwrap_or(0);
        live_max.max(self.high_water).checked_add(1)
    }

    /// Store `record` under `version`. A live version is never replaced:
    /// returns `false` and leaves the slot untouched instead.
    fn insert(&mut self, version: Version, record: Arc<ModelRecord>) -> bool {
        match self.versions.entry(version) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(record);
                self.high_water = self.high_water.max(version);
                true
            }
        }
    }
}

type Slot = Arc<RwLock<VersionSlot>>;

/// Name → version → model table.
///
/// Each model name owns an independently locked slot, so deploys and
/// undeploys of different names never contend. The outer map lock is only
/// write-locked to create a slot for a name seen for the first time. Slots
/// are never removed: an empty slot keeps its allocation high-water mark and
/// is simply hidden from listings.
pub struct ModelRegistry {
    parser: Arc<dyn ModelParser>,
    slots: RwLock<HashMap<String, Slot>>,
}

impl ModelRegistry {
    pub fn new(parser: Arc<dyn ModelParser>) -> Self {
        Self {
            parser,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Parse `definition` and store it under the next free version of `name`.
    pub fn deploy_next(&self, name: &str, definition: &[u8]) -> Result<Version> {
        let record = self.build_record(name, definition)?;
        let slot = self.slot_or_insert(name)?;
        let mut slot = slot.write().map_err(|_| VerdictError::LockPoisoned)?;

        let version = slot
            .next_version()
            .ok_or_else(|| VerdictError::VersionsExhausted {
                name: name.to_string(),
            })?;
        if !slot.insert(version, record) {
            return Err(VerdictError::Conflict {
                name: name.to_string(),
                version,
            });
        }
        log::info!("Deployed model {}@{}", name, version);
        Ok(version)
    }

    /// Parse `definition` and store it under an explicit version.
    ///
    /// Live versions are immutable: redeploying one fails with
    /// [`VerdictError::Conflict`] and leaves the stored model untouched.
    pub fn deploy_at(&self, name: &str, version: Version, definition: &[u8]) -> Result<()> {
        if version == 0 {
            return Err(VerdictError::validation("version", "must be a positive integer"));
        }
        // Cheap pre-check so a conflicting upload is not parsed at all.
        if self.contains(name, version)? {
            return Err(VerdictError::Conflict {
                name: name.to_string(),
                version,
            });
        }

        let record = self.build_record(name, definition)?;
        let slot = self.slot_or_insert(name)?;
        let mut slot = slot.write().map_err(|_| VerdictError::LockPoisoned)?;

        if !slot.insert(version, record) {
            return Err(VerdictError::Conflict {
                name: name.to_string(),
                version,
            });
        }
        log::info!("Deployed model {}@{}", name, version);
        Ok(())
    }

    /// Names with at least one live version.
    pub fn list_names(&self) -> Result<BTreeSet<String>> {
        let slots = self.slots.read().map_err(|_| VerdictError::LockPoisoned)?;
        let mut names = BTreeSet::new();
        for (name, slot) in slots.iter() {
            let slot = slot.read().map_err(|_| VerdictError::LockPoisoned)?;
            if !slot.versions.is_empty() {
                names.insert(name.clone());
            }
        }
        Ok(names)
    }

    /// Live versions of `name`, ascending. Empty for unknown names.
    pub fn list_versions(&self, name: &str) -> Result<Vec<Version>> {
        self.read_slot(name, |slot| slot.versions.keys().copied().collect())
            .map(Option::unwrap_or_default)
    }

    pub fn get(&self, name: &str, version: Version) -> Result<Arc<ModelRecord>> {
        self.read_slot(name, |slot| slot.versions.get(&version).cloned())?
            .flatten()
            .ok_or_else(|| VerdictError::VersionNotFound {
                name: name.to_string(),
                version,
            })
    }

    /// Every live version of `name`, ascending. Empty for unknown names.
    pub fn get_all(&self, name: &str) -> Result<Vec<(Version, Arc<ModelRecord>)>> {
        self.read_slot(name, |slot| {
            slot.versions
                .iter()
                .map(|(v, record)| (*v, record.clone()))
                .collect()
        })
        .map(Option::unwrap_or_default)
    }

    pub fn contains(&self, name: &str, version: Version) -> Result<bool> {
        self.read_slot(name, |slot| slot.versions.contains_key(&version))
            .map(|found| found.unwrap_or(false))
    }

    /// Undeploy a single version. Other versions of the name are untouched.
    pub fn remove(&self, name: &str, version: Version) -> Result<()> {
        let slot = self.slot(name)?.ok_or_else(|| VerdictError::VersionNotFound {
            name: name.to_string(),
            version,
        })?;
        let mut slot = slot.write().map_err(|_| VerdictError::LockPoisoned)?;

        match slot.versions.remove(&version) {
            Some(_) => {
                log::info!("Undeployed model {}@{}", name, version);
                Ok(())
            }
            None => Err(VerdictError::VersionNotFound {
                name: name.to_string(),
                version,
            }),
        }
    }

    /// Field listing and threshold of every live version of `name`.
    pub fn summary(&self, name: &str) -> Result<VersionedSummary> {
        let versions: BTreeMap<_, _> = self
            .get_all(name)?
            .into_iter()
            .map(|(v, record)| (v, record.summary()))
            .collect();

        if versions.is_empty() {
            return Err(VerdictError::ModelNotFound {
                name: name.to_string(),
            });
        }
        Ok(VersionedSummary {
            model_name: name.to_string(),
            versions,
        })
    }

    pub fn stats(&self) -> Result<RegistryStats> {
        let slots = self.slots.read().map_err(|_| VerdictError::LockPoisoned)?;
        let mut stats = RegistryStats::default();
        for slot in slots.values() {
            let count = slot.read().map_err(|_| VerdictError::LockPoisoned)?.versions.len();
            if count > 0 {
                stats.model_count += 1;
                stats.version_count += count;
            }
        }
        Ok(stats)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.stats()?.version_count == 0)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn build_record(&self, name: &str, definition: &[u8]) -> Result<Arc<ModelRecord>> {
        if name.trim().is_empty() {
            return Err(VerdictError::validation("name", "model name must not be empty"));
        }
        let parsed = self.parser.parse(definition).map_err(|e| {
            log::warn!("Rejected model definition for {}: {}", name, e);
            if matches!(e, VerdictError::Parse(_)) {
                e
            } else {
                VerdictError::Parse(e.to_string())
            }
        })?;
        let threshold = threshold::extract(&parsed.extensions);
        Ok(Arc::new(ModelRecord::new(parsed.evaluator, threshold)))
    }

    fn slot(&self, name: &str) -> Result<Option<Slot>> {
        let slots = self.slots.read().map_err(|_| VerdictError::LockPoisoned)?;
        Ok(slots.get(name).cloned())
    }

    fn slot_or_insert(&self, name: &str) -> Result<Slot> {
        if let Some(slot) = self.slot(name)? {
            return Ok(slot);
        }
        let mut slots = self.slots.write().map_err(|_| VerdictError::LockPoisoned)?;
        Ok(slots.entry(name.to_string()).or_default().clone())
    }

    /// Run `f` under the read lock of `name`'s slot. `None` for unknown names.
    fn read_slot<T>(&self, name: &str, f: impl FnOnce(&VersionSlot) -> T) -> Result<Option<T>> {
        match self.slot(name)? {
            None => Ok(None),
            Some(slot) => {
                let slot = slot.read().map_err(|_| VerdictError::LockPoisoned)?;
                Ok(Some(f(&slot)))
            }
        }
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(Arc::new(RegressionParser))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{stub_registry, stub_definition};
    use proptest::prelude::*;
    use std::thread;

    #[test]
    fn test_deploy_next_starts_at_one_and_increments() {
        let registry = stub_registry();
        assert_eq!(registry.deploy_next("credit", b"ok").unwrap(), 1);
        assert_eq!(registry.deploy_next("credit", b"ok").unwrap(), 2);
        assert_eq!(registry.deploy_next("fraud", b"ok").unwrap(), 1);
        assert_eq!(registry.list_versions("credit").unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_deploy_next_follows_explicit_versions() {
        let registry = stub_registry();
        registry.deploy_at("credit", 7, b"ok").unwrap();
        assert_eq!(registry.deploy_next("credit", b"ok").unwrap(), 8);
    }

    #[test]
    fn test_deploy_next_never_reuses_removed_version() {
        let registry = stub_registry();
        registry.deploy_next("credit", b"ok").unwrap();
        registry.deploy_next("credit", b"ok").unwrap();
        registry.remove("credit", 2).unwrap();
        assert_eq!(registry.deploy_next("credit", b"ok").unwrap(), 3);
        assert_eq!(registry.list_versions("credit").unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_deploy_at_conflict_keeps_first_definition() {
        let registry = stub_registry();
        registry
            .deploy_at("credit", 1, &stub_definition("first", 0.1))
            .unwrap();
        let err = registry
            .deploy_at("credit", 1, &stub_definition("second", 0.9))
            .unwrap_err();
        assert!(matches!(err, VerdictError::Conflict { version: 1, .. }));

        let record = registry.get("credit", 1).unwrap();
        assert_eq!(record.evaluator.predicted_fields(), vec!["first"]);
    }

    #[test]
    fn test_deploy_next_after_max_version_is_exhausted() {
        let registry = stub_registry();
        registry
            .deploy_at("credit", Version::MAX, &stub_definition("top", 0.9))
            .unwrap();

        for _ in 0..2 {
            let err = registry.deploy_next("credit", b"ok").unwrap_err();
            assert!(matches!(err, VerdictError::VersionsExhausted { .. }));
        }

        // The slot lock is still usable and nothing was wrapped or replaced.
        assert_eq!(registry.list_versions("credit").unwrap(), vec![Version::MAX]);
        let record = registry.get("credit", Version::MAX).unwrap();
        assert_eq!(record.evaluator.predicted_fields(), vec!["top"]);

        // Lower explicit versions stay available.
        registry.deploy_at("credit", 1, b"ok").unwrap();
        assert_eq!(registry.list_versions("credit").unwrap(), vec![1, Version::MAX]);
    }

    #[test]
    fn test_slot_insert_never_replaces_live_version() {
        let registry = stub_registry();
        registry.deploy_next("credit", &stub_definition("first", 0.1)).unwrap();
        let record = registry.get("credit", 1).unwrap();

        let mut slot = VersionSlot::default();
        assert!(slot.insert(1, record.clone()));
        assert!(!slot.insert(1, record));
        assert_eq!(slot.versions.len(), 1);
        assert_eq!(slot.next_version(), Some(2));
    }

    #[test]
    fn test_deploy_at_rejects_version_zero() {
        let registry = stub_registry();
        assert!(matches!(
            registry.deploy_at("credit", 0, b"ok"),
            Err(VerdictError::Validation { .. })
        ));
    }

    #[test]
    fn test_parse_error_stores_nothing() {
        let registry = stub_registry();
        let err = registry.deploy_next("credit", b"garbage").unwrap_err();
        assert!(matches!(err, VerdictError::Parse(_)));
        assert!(registry.list_names().unwrap().is_empty());
        assert!(registry.list_versions("credit").unwrap().is_empty());
        // A failed parse must not burn a version number.
        assert_eq!(registry.deploy_next("credit", b"ok").unwrap(), 1);
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = stub_registry();
        assert!(matches!(
            registry.deploy_next("  ", b"ok"),
            Err(VerdictError::Validation { .. })
        ));
    }

    #[test]
    fn test_remove_hides_only_that_version() {
        let registry = stub_registry();
        registry.deploy_next("credit", b"ok").unwrap();
        registry.deploy_next("credit", b"ok").unwrap();
        registry.deploy_next("credit", b"ok").unwrap();

        registry.remove("credit", 2).unwrap();

        assert!(registry.get("credit", 2).unwrap_err().is_not_found());
        assert_eq!(registry.list_versions("credit").unwrap(), vec![1, 3]);
        assert!(registry.get("credit", 1).is_ok());
        assert!(registry.get("credit", 3).is_ok());
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let registry = stub_registry();
        assert!(registry.remove("credit", 1).unwrap_err().is_not_found());
        registry.deploy_next("credit", b"ok").unwrap();
        assert!(registry.remove("credit", 2).unwrap_err().is_not_found());
    }

    #[test]
    fn test_emptied_name_disappears_from_listing() {
        let registry = stub_registry();
        registry.deploy_next("credit", b"ok").unwrap();
        registry.deploy_next("fraud", b"ok").unwrap();
        registry.remove("credit", 1).unwrap();

        let names: Vec<_> = registry.list_names().unwrap().into_iter().collect();
        assert_eq!(names, vec!["fraud"]);
        assert!(registry.get_all("credit").unwrap().is_empty());
        assert!(registry.summary("credit").unwrap_err().is_not_found());
        assert_eq!(
            registry.stats().unwrap(),
            RegistryStats {
                model_count: 1,
                version_count: 1
            }
        );
    }

    #[test]
    fn test_get_all_is_ascending() {
        let registry = stub_registry();
        registry.deploy_at("credit", 5, b"ok").unwrap();
        registry.deploy_at("credit", 2, b"ok").unwrap();
        registry.deploy_at("credit", 9, b"ok").unwrap();

        let versions: Vec<_> = registry
            .get_all("credit")
            .unwrap()
            .into_iter()
            .map(|(v, _)| v)
            .collect();
        assert_eq!(versions, vec![2, 5, 9]);
    }

    #[test]
    fn test_threshold_attached_on_deploy() {
        let registry = stub_registry();
        registry.deploy_next("credit", &stub_definition("p1", 0.87)).unwrap();
        let record = registry.get("credit", 1).unwrap();
        let threshold = record.threshold.as_ref().unwrap();
        assert_eq!(threshold.score_field.as_deref(), Some("p1"));
    }

    #[test]
    fn test_summary_lists_fields_per_version() {
        let registry = stub_registry();
        registry.deploy_next("credit", &stub_definition("p1", 0.5)).unwrap();
        registry.deploy_next("credit", b"ok").unwrap();

        let summary = registry.summary("credit").unwrap();
        assert_eq!(summary.model_name, "credit");
        assert_eq!(summary.versions.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(summary.versions[&1].predicted_fields, vec!["p1"]);
        assert!(summary.versions[&1].threshold.is_some());
        assert!(summary.versions[&2].threshold.is_none());
    }

    #[test]
    fn test_concurrent_deploy_next_assigns_unique_versions() {
        let registry = Arc::new(stub_registry());
        let mut versions: Vec<Version> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let registry = registry.clone();
                    s.spawn(move || {
                        (0..25)
                            .map(|_| registry.deploy_next("credit", b"ok").unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        versions.sort_unstable();
        let expected: Vec<Version> = (1..=200).collect();
        assert_eq!(versions, expected);
        assert_eq!(registry.list_versions("credit").unwrap(), expected);
    }

    #[test]
    fn test_concurrent_deploy_at_same_version_has_one_winner() {
        let registry = Arc::new(stub_registry());
        let wins: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let registry = registry.clone();
                    s.spawn(move || registry.deploy_at("credit", 3, b"ok").is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count()
        });
        assert_eq!(wins, 1);
        assert_eq!(registry.list_versions("credit").unwrap(), vec![3]);
    }

    proptest! {
        #[test]
        fn prop_deploy_next_strictly_increasing(ops in proptest::collection::vec(any::<bool>(), 1..40)) {
            // true = deploy_next, false = remove the highest live version
            let registry = stub_registry();
            let mut last = 0;
            for deploy in ops {
                if deploy {
                    let v = registry.deploy_next("m", b"ok").unwrap();
                    prop_assert!(v > last);
                    last = v;
                } else if let Some(v) = registry.list_versions("m").unwrap().last().copied() {
                    registry.remove("m", v).unwrap();
                }
                let listed = registry.list_versions("m").unwrap();
                prop_assert!(listed.windows(2).all(|w| w[0] < w[1]));
                prop_assert_eq!(&listed, &registry.list_versions("m").unwrap());
            }
        }
    }
}
