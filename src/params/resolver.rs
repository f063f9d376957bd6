//! Lazy, memoized construction of parameter banks.

use super::bank::ParamBank;
use super::entity::{Channel, Layer, ParamEntity, Pm, Scin, Setup, Slot};
use super::factory::{build_set, EntitySet, FactoryCache};
use super::getter::ParamGetter;
use super::kind::{KindSet, ParamKind};
use crate::data::RunId;
use crate::error::ResolutionError;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type BankCell = Arc<OnceCell<Arc<ParamBank>>>;

/// Builds and caches parameter banks per run id.
///
/// One resolver is shared by every executor of a processing run. Entity sets
/// are fetched from the getter once per (run, kind) and banks once per
/// (run, expected-missing set). Nothing is evicted: the store is immutable
/// per run and the number of distinct runs in one process is small.
pub struct ParamResolver {
    getter: Arc<dyn ParamGetter>,
    factories: FactoryCache,
    banks: Mutex<HashMap<(RunId, KindSet), BankCell>>,
}

impl ParamResolver {
    pub fn new(getter: Arc<dyn ParamGetter>) -> Self {
        Self {
            getter,
            factories: FactoryCache::new(),
            banks: Mutex::new(HashMap::new()),
        }
    }

    /// Bank for `run_id`, skipping the kinds in `expected_missing`.
    ///
    /// Repeated calls return the same instance.
    pub fn bank(
        &self,
        run_id: RunId,
        expected_missing: KindSet,
    ) -> Result<Arc<ParamBank>, ResolutionError> {
        let cell = self
            .banks
            .lock()
            .entry((run_id, expected_missing))
            .or_default()
            .clone();

        cell.get_or_try_init(|| self.fill_bank(run_id, expected_missing).map(Arc::new))
            .cloned()
    }

    /// Entities of kind `T` for `run_id`. Ancestor kinds not in
    /// `expected_missing` are resolved first, root down.
    pub fn entities<T: ParamEntity>(
        &self,
        run_id: RunId,
        expected_missing: KindSet,
    ) -> Result<EntitySet<T>, ResolutionError> {
        for ancestor in T::KIND.ancestors() {
            if !expected_missing.contains(ancestor) {
                self.load_kind(ancestor, run_id)?;
            }
        }
        self.load::<T>(run_id)
    }

    /// Run ids with a bank in the cache.
    pub fn cached_runs(&self) -> Vec<RunId> {
        let mut runs: Vec<RunId> = self
            .banks
            .lock()
            .iter()
            .filter(|(_, cell)| cell.get().is_some())
            .map(|((run_id, _), _)| *run_id)
            .collect();
        runs.sort_unstable();
        runs.dedup();
        runs
    }

    pub fn factories(&self) -> &FactoryCache {
        &self.factories
    }

    fn fill_bank(&self, run_id: RunId, expected_missing: KindSet) -> Result<ParamBank, ResolutionError> {
        let mut bank = ParamBank::new(run_id);

        for kind in ParamKind::ORDER {
            if expected_missing.contains(kind) {
                tracing::debug!(run_id, %kind, "skipping kind expected to be missing");
                continue;
            }
            match kind {
                ParamKind::Setup => self.fill::<Setup>(&mut bank, expected_missing)?,
                ParamKind::Layer => self.fill::<Layer>(&mut bank, expected_missing)?,
                ParamKind::Slot => self.fill::<Slot>(&mut bank, expected_missing)?,
                ParamKind::Scin => self.fill::<Scin>(&mut bank, expected_missing)?,
                ParamKind::Pm => self.fill::<Pm>(&mut bank, expected_missing)?,
                ParamKind::Channel => self.fill::<Channel>(&mut bank, expected_missing)?,
            }
        }

        tracing::info!(
            run_id,
            setups = bank.setups().len(),
            layers = bank.layers().len(),
            slots = bank.slots().len(),
            scins = bank.scins().len(),
            pms = bank.pms().len(),
            channels = bank.channels().len(),
            "parameter bank filled"
        );
        Ok(bank)
    }

    fn fill<T: ParamEntity>(
        &self,
        bank: &mut ParamBank,
        expected_missing: KindSet,
    ) -> Result<(), ResolutionError> {
        let set = self.entities::<T>(bank.run_id(), expected_missing)?;
        for entity in set.values() {
            bank.insert(entity.clone(), expected_missing)?;
        }
        Ok(())
    }

    fn load_kind(&self, kind: ParamKind, run_id: RunId) -> Result<(), ResolutionError> {
        match kind {
            ParamKind::Setup => self.load::<Setup>(run_id).map(drop),
            ParamKind::Layer => self.load::<Layer>(run_id).map(drop),
            ParamKind::Slot => self.load::<Slot>(run_id).map(drop),
            ParamKind::Scin => self.load::<Scin>(run_id).map(drop),
            ParamKind::Pm => self.load::<Pm>(run_id).map(drop),
            ParamKind::Channel => self.load::<Channel>(run_id).map(drop),
        }
    }

    fn load<T: ParamEntity>(&self, run_id: RunId) -> Result<EntitySet<T>, ResolutionError> {
        self.factories.factory::<T>().get_or_build(run_id, || {
            tracing::debug!(run_id, kind = %T::KIND, "fetching parameters");
            let descriptions = self
                .getter
                .descriptions(run_id, T::KIND)
                .map_err(|source| ResolutionError::Store {
                    run_id,
                    kind: T::KIND,
                    source,
                })?;
            build_set(run_id, descriptions)
        })
    }
}
