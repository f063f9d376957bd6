//! Detector parameter entities.

use super::bank::ParamBank;
use super::factory::{FactoryCache, KindFactory};
use super::kind::ParamKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of an entity within its kind.
pub type ParamId = i32;

/// Common view over the six entity types.
///
/// The parent id is the entity's back-reference to its immediate parent.
/// Inside a [`ParamBank`] it is either `None` or the id of an entity present
/// in the bank.
pub trait ParamEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: ParamKind;

    fn id(&self) -> ParamId;

    fn parent_id(&self) -> Option<ParamId>;

    fn set_parent_id(&mut self, parent: Option<ParamId>);

    #[doc(hidden)]
    fn factory(cache: &FactoryCache) -> &KindFactory<Self>;

    #[doc(hidden)]
    fn entries(bank: &ParamBank) -> &BTreeMap<ParamId, Self>;

    #[doc(hidden)]
    fn entries_mut(bank: &mut ParamBank) -> &mut BTreeMap<ParamId, Self>;
}

/// A detector setup, root of the hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub id: ParamId,
    #[serde(default)]
    pub description: String,
}

/// A cylindrical layer of scintillator slots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: ParamId,
    #[serde(default)]
    pub name: String,
    /// Radius in cm.
    pub radius: f64,
    #[serde(default)]
    pub setup_id: Option<ParamId>,
}

/// Angular slot within a layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: ParamId,
    /// Azimuthal angle in degrees.
    pub theta: f64,
    #[serde(default)]
    pub layer_id: Option<ParamId>,
}

/// Scintillator strip, dimensions in cm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scin {
    pub id: ParamId,
    pub length: f64,
    pub height: f64,
    pub width: f64,
    #[serde(default)]
    pub slot_id: Option<ParamId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PmSide {
    Left,
    Right,
}

/// Photomultiplier reading one side of a scintillator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pm {
    pub id: ParamId,
    pub side: PmSide,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scin_id: Option<ParamId>,
}

/// Readout channel of a photomultiplier at one threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ParamId,
    pub threshold_number: u32,
    /// Threshold in mV.
    pub threshold_value: f64,
    #[serde(default)]
    pub pm_id: Option<ParamId>,
}

impl ParamEntity for Setup {
    const KIND: ParamKind = ParamKind::Setup;

    fn id(&self) -> ParamId {
        self.id
    }

    fn parent_id(&self) -> Option<ParamId> {
        None
    }

    fn set_parent_id(&mut self, _parent: Option<ParamId>) {}

    fn factory(cache: &FactoryCache) -> &KindFactory<Self> {
        &cache.setups
    }

    fn entries(bank: &ParamBank) -> &BTreeMap<ParamId, Self> {
        &bank.setups
    }

    fn entries_mut(bank: &mut ParamBank) -> &mut BTreeMap<ParamId, Self> {
        &mut bank.setups
    }
}

macro_rules! child_entity {
    ($ty:ty, $kind:expr, $parent:ident, $collection:ident) => {
        impl ParamEntity for $ty {
            const KIND: ParamKind = $kind;

            fn id(&self) -> ParamId {
                self.id
            }

            fn parent_id(&self) -> Option<ParamId> {
                self.$parent
            }

            fn set_parent_id(&mut self, parent: Option<ParamId>) {
                self.$parent = parent;
            }

            fn factory(cache: &FactoryCache) -> &KindFactory<Self> {
                &cache.$collection
            }

            fn entries(bank: &ParamBank) -> &BTreeMap<ParamId, Self> {
                &bank.$collection
            }

            fn entries_mut(bank: &mut ParamBank) -> &mut BTreeMap<ParamId, Self> {
                &mut bank.$collection
            }
        }
    };
}

child_entity!(Layer, ParamKind::Layer, setup_id, layers);
child_entity!(Slot, ParamKind::Slot, layer_id, slots);
child_entity!(Scin, ParamKind::Scin, slot_id, scins);
child_entity!(Pm, ParamKind::Pm, scin_id, pms);
child_entity!(Channel, ParamKind::Channel, pm_id, channels);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_decoding() {
        let pm: Pm = serde_json::from_value(json!({
            "id": 4,
            "side": "right",
            "description": "Hamamatsu",
            "scin_id": 2
        }))
        .unwrap();

        assert_eq!(pm.id(), 4);
        assert_eq!(pm.side, PmSide::Right);
        assert_eq!(pm.parent_id(), Some(2));
        assert_eq!(<Pm as ParamEntity>::KIND, ParamKind::Pm);
    }

    #[test]
    fn test_missing_parent_reference_defaults_to_none() {
        let slot: Slot = serde_json::from_value(json!({ "id": 1, "theta": 7.5 })).unwrap();
        assert_eq!(slot.parent_id(), None);
    }

    #[test]
    fn test_setup_has_no_parent() {
        let mut setup = Setup {
            id: 1,
            description: String::new(),
        };
        setup.set_parent_id(Some(3));
        assert_eq!(setup.parent_id(), None);
    }
}
