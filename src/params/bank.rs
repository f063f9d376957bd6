//! Parameter bank: the resolved detector hierarchy of one run.

use super::entity::{Channel, Layer, ParamEntity, ParamId, Pm, Scin, Setup, Slot};
use super::kind::{KindSet, ParamKind};
use crate::data::RunId;
use crate::error::ResolutionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Six entity maps keyed by id, forming a rooted tree through parent ids.
///
/// A bank is filled once, parents before children, and is read-only after
/// that. Tasks share it by reference.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamBank {
    run_id: RunId,
    pub(super) setups: BTreeMap<ParamId, Setup>,
    pub(super) layers: BTreeMap<ParamId, Layer>,
    pub(super) slots: BTreeMap<ParamId, Slot>,
    pub(super) scins: BTreeMap<ParamId, Scin>,
    pub(super) pms: BTreeMap<ParamId, Pm>,
    pub(super) channels: BTreeMap<ParamId, Channel>,
}

impl ParamBank {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            ..Default::default()
        }
    }

    #[inline]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn get<T: ParamEntity>(&self, id: ParamId) -> Option<&T> {
        T::entries(self).get(&id)
    }

    pub fn entities<T: ParamEntity>(&self) -> &BTreeMap<ParamId, T> {
        T::entries(self)
    }

    pub fn setups(&self) -> &BTreeMap<ParamId, Setup> {
        &self.setups
    }

    pub fn layers(&self) -> &BTreeMap<ParamId, Layer> {
        &self.layers
    }

    pub fn slots(&self) -> &BTreeMap<ParamId, Slot> {
        &self.slots
    }

    pub fn scins(&self) -> &BTreeMap<ParamId, Scin> {
        &self.scins
    }

    pub fn pms(&self) -> &BTreeMap<ParamId, Pm> {
        &self.pms
    }

    pub fn channels(&self) -> &BTreeMap<ParamId, Channel> {
        &self.channels
    }

    pub fn layer_setup(&self, layer: &Layer) -> Option<&Setup> {
        layer.setup_id.and_then(|id| self.setups.get(&id))
    }

    pub fn slot_layer(&self, slot: &Slot) -> Option<&Layer> {
        slot.layer_id.and_then(|id| self.layers.get(&id))
    }

    pub fn scin_slot(&self, scin: &Scin) -> Option<&Slot> {
        scin.slot_id.and_then(|id| self.slots.get(&id))
    }

    pub fn pm_scin(&self, pm: &Pm) -> Option<&Scin> {
        pm.scin_id.and_then(|id| self.scins.get(&id))
    }

    pub fn channel_pm(&self, channel: &Channel) -> Option<&Pm> {
        channel.pm_id.and_then(|id| self.pms.get(&id))
    }

    pub fn contains(&self, kind: ParamKind, id: ParamId) -> bool {
        match kind {
            ParamKind::Setup => self.setups.contains_key(&id),
            ParamKind::Layer => self.layers.contains_key(&id),
            ParamKind::Slot => self.slots.contains_key(&id),
            ParamKind::Scin => self.scins.contains_key(&id),
            ParamKind::Pm => self.pms.contains_key(&id),
            ParamKind::Channel => self.channels.contains_key(&id),
        }
    }

    pub fn len(&self, kind: ParamKind) -> usize {
        match kind {
            ParamKind::Setup => self.setups.len(),
            ParamKind::Layer => self.layers.len(),
            ParamKind::Slot => self.slots.len(),
            ParamKind::Scin => self.scins.len(),
            ParamKind::Pm => self.pms.len(),
            ParamKind::Channel => self.channels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ParamKind::ORDER.iter().all(|kind| self.len(*kind) == 0)
    }

    /// Add `entity`, wiring its parent link against entities already present.
    ///
    /// When the parent kind is expected to be missing the link is cleared.
    /// Otherwise the declared parent must already be in the bank.
    pub(crate) fn insert<T: ParamEntity>(
        &mut self,
        mut entity: T,
        expected_missing: KindSet,
    ) -> Result<(), ResolutionError> {
        if let Some(parent_kind) = T::KIND.parent() {
            if expected_missing.contains(parent_kind) {
                entity.set_parent_id(None);
            } else {
                match entity.parent_id() {
                    Some(parent_id) if self.contains(parent_kind, parent_id) => {}
                    Some(parent_id) => {
                        return Err(ResolutionError::DanglingParent {
                            run_id: self.run_id,
                            kind: T::KIND,
                            id: entity.id(),
                            parent_kind,
                            parent_id,
                        })
                    }
                    None => {
                        return Err(ResolutionError::MissingParentRef {
                            run_id: self.run_id,
                            kind: T::KIND,
                            id: entity.id(),
                            parent_kind,
                        })
                    }
                }
            }
        }

        let id = entity.id();
        if T::entries_mut(self).insert(id, entity).is_some() {
            return Err(ResolutionError::Duplicate {
                run_id: self.run_id,
                kind: T::KIND,
                id,
            });
        }
        Ok(())
    }

    /// Check that every parent link points at an entity in the bank.
    ///
    /// Unlinked entities are accepted, a bank built with expected-missing
    /// kinds has them.
    pub fn validate(&self) -> Result<(), ResolutionError> {
        self.validate_kind::<Layer>()?;
        self.validate_kind::<Slot>()?;
        self.validate_kind::<Scin>()?;
        self.validate_kind::<Pm>()?;
        self.validate_kind::<Channel>()
    }

    fn validate_kind<T: ParamEntity>(&self) -> Result<(), ResolutionError> {
        let Some(parent_kind) = T::KIND.parent() else {
            return Ok(());
        };
        for entity in T::entries(self).values() {
            if let Some(parent_id) = entity.parent_id() {
                if !self.contains(parent_kind, parent_id) {
                    return Err(ResolutionError::DanglingParent {
                        run_id: self.run_id,
                        kind: T::KIND,
                        id: entity.id(),
                        parent_kind,
                        parent_id,
                    });
                }
            }
        }
        Ok(())
    }
}
