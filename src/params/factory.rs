//! Per-kind memoized entity sets.

use super::entity::{Channel, Layer, ParamEntity, ParamId, Pm, Scin, Setup, Slot};
use super::getter::ParamDescription;
use super::kind::ParamKind;
use crate::data::RunId;
use crate::error::ResolutionError;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Entities of one kind for one run, keyed by id.
pub type EntitySet<T> = Arc<BTreeMap<ParamId, T>>;

/// Lazily built entity sets of one kind, one per run id.
///
/// A set is built at most once per run: concurrent callers for the same run
/// wait on the first builder. Successful sets are never invalidated.
pub struct KindFactory<T> {
    runs: Mutex<HashMap<RunId, Arc<OnceCell<EntitySet<T>>>>>,
}

impl<T: ParamEntity> KindFactory<T> {
    fn new() -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Return the set for `run_id`, calling `build` only if it is not cached.
    pub fn get_or_build<F>(&self, run_id: RunId, build: F) -> Result<EntitySet<T>, ResolutionError>
    where
        F: FnOnce() -> Result<BTreeMap<ParamId, T>, ResolutionError>,
    {
        // The map lock is released before building so other runs proceed.
        let cell = self.runs.lock().entry(run_id).or_default().clone();
        cell.get_or_try_init(|| build().map(Arc::new)).cloned()
    }

    pub fn is_cached(&self, run_id: RunId) -> bool {
        self.runs
            .lock()
            .get(&run_id)
            .map_or(false, |cell| cell.get().is_some())
    }
}

/// One [`KindFactory`] per entity kind.
pub struct FactoryCache {
    pub(super) setups: KindFactory<Setup>,
    pub(super) layers: KindFactory<Layer>,
    pub(super) slots: KindFactory<Slot>,
    pub(super) scins: KindFactory<Scin>,
    pub(super) pms: KindFactory<Pm>,
    pub(super) channels: KindFactory<Channel>,
}

impl FactoryCache {
    pub fn new() -> Self {
        Self {
            setups: KindFactory::new(),
            layers: KindFactory::new(),
            slots: KindFactory::new(),
            scins: KindFactory::new(),
            pms: KindFactory::new(),
            channels: KindFactory::new(),
        }
    }

    pub fn factory<T: ParamEntity>(&self) -> &KindFactory<T> {
        T::factory(self)
    }

    pub fn is_cached(&self, kind: ParamKind, run_id: RunId) -> bool {
        match kind {
            ParamKind::Setup => self.setups.is_cached(run_id),
            ParamKind::Layer => self.layers.is_cached(run_id),
            ParamKind::Slot => self.slots.is_cached(run_id),
            ParamKind::Scin => self.scins.is_cached(run_id),
            ParamKind::Pm => self.pms.is_cached(run_id),
            ParamKind::Channel => self.channels.is_cached(run_id),
        }
    }
}

impl Default for FactoryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode raw store descriptions into typed entities.
pub fn build_set<T: ParamEntity>(
    run_id: RunId,
    descriptions: Vec<ParamDescription>,
) -> Result<BTreeMap<ParamId, T>, ResolutionError> {
    let mut set = BTreeMap::new();
    for description in descriptions {
        let entity: T = serde_json::from_value(Value::Object(description)).map_err(|source| {
            ResolutionError::Malformed {
                run_id,
                kind: T::KIND,
                source,
            }
        })?;

        let id = entity.id();
        if set.insert(id, entity).is_some() {
            return Err(ResolutionError::Duplicate {
                run_id,
                kind: T::KIND,
                id,
            });
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn description(value: Value) -> ParamDescription {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_build_set() {
        let set: BTreeMap<ParamId, Layer> = build_set(
            1,
            vec![
                description(json!({"id": 2, "radius": 50.0, "setup_id": 1})),
                description(json!({"id": 1, "radius": 42.5, "setup_id": 1})),
            ],
        )
        .unwrap();

        assert_eq!(set.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_build_set_errors() {
        let dup = build_set::<Setup>(
            1,
            vec![description(json!({"id": 1})), description(json!({"id": 1}))],
        );
        assert!(matches!(dup, Err(ResolutionError::Duplicate { id: 1, .. })));

        let bad = build_set::<Scin>(1, vec![description(json!({"id": 1, "length": "long"}))]);
        assert!(matches!(
            bad,
            Err(ResolutionError::Malformed {
                kind: ParamKind::Scin,
                ..
            })
        ));
    }

    #[test]
    fn test_built_once_per_run() {
        let cache = FactoryCache::new();
        let calls = AtomicUsize::new(0);
        let build = || {
            calls.fetch_add(1, Ordering::SeqCst);
            build_set::<Setup>(17, vec![description(json!({"id": 1}))])
        };

        let first = cache.factory::<Setup>().get_or_build(17, build).unwrap();
        let second = cache.factory::<Setup>().get_or_build(17, build).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.is_cached(ParamKind::Setup, 17));
        assert!(!cache.is_cached(ParamKind::Setup, 18));
        assert!(!cache.is_cached(ParamKind::Layer, 17));
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let cache = FactoryCache::new();
        let failed = cache.factory::<Setup>().get_or_build(4, || {
            build_set::<Setup>(4, vec![description(json!({"id": "x"}))])
        });
        assert!(failed.is_err());
        assert!(!cache.is_cached(ParamKind::Setup, 4));
    }
}
