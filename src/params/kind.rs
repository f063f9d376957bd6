//! Entity kinds of the detector parameter hierarchy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One level of the Setup → Layer → Slot → Scin → PM → Channel hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Setup,
    Layer,
    Slot,
    Scin,
    Pm,
    Channel,
}

impl ParamKind {
    /// Construction order. Every kind follows its parent.
    pub const ORDER: [ParamKind; 6] = [
        ParamKind::Setup,
        ParamKind::Layer,
        ParamKind::Slot,
        ParamKind::Scin,
        ParamKind::Pm,
        ParamKind::Channel,
    ];

    /// Name used as key in parameter stores.
    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Setup => "setup",
            ParamKind::Layer => "layer",
            ParamKind::Slot => "slot",
            ParamKind::Scin => "scin",
            ParamKind::Pm => "pm",
            ParamKind::Channel => "channel",
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }

    pub fn parent(&self) -> Option<ParamKind> {
        match self.index() {
            0 => None,
            i => Some(Self::ORDER[i - 1]),
        }
    }

    /// All ancestor kinds, root first.
    pub fn ancestors(&self) -> impl Iterator<Item = ParamKind> {
        Self::ORDER[..self.index()].iter().copied()
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Small set of kinds, used for the kinds a store is expected to lack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KindSet(u8);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);

    pub fn from_kinds(kinds: impl IntoIterator<Item = ParamKind>) -> Self {
        kinds.into_iter().collect()
    }

    /// `kind` together with every kind below it.
    pub fn from_kind_down(kind: ParamKind) -> Self {
        ParamKind::ORDER
            .iter()
            .copied()
            .filter(|k| *k >= kind)
            .collect()
    }

    #[inline]
    pub fn insert(&mut self, kind: ParamKind) {
        self.0 |= 1 << kind.index();
    }

    #[inline]
    pub fn contains(&self, kind: ParamKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = ParamKind> + '_ {
        ParamKind::ORDER.iter().copied().filter(|k| self.contains(*k))
    }
}

impl FromIterator<ParamKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = ParamKind>>(iter: I) -> Self {
        let mut set = KindSet::EMPTY;
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parents_follow_order() {
        assert_eq!(ParamKind::Setup.parent(), None);
        for pair in ParamKind::ORDER.windows(2) {
            assert_eq!(pair[1].parent(), Some(pair[0]));
        }
    }

    #[test]
    fn test_ancestors_top_down() {
        let ancestors: Vec<_> = ParamKind::Scin.ancestors().collect();
        assert_eq!(
            ancestors,
            vec![ParamKind::Setup, ParamKind::Layer, ParamKind::Slot]
        );
        assert_eq!(ParamKind::Setup.ancestors().count(), 0);
    }

    #[test]
    fn test_kind_set() {
        let mut set = KindSet::from_kinds([ParamKind::Layer, ParamKind::Channel]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(ParamKind::Layer));
        assert!(!set.contains(ParamKind::Pm));

        set.insert(ParamKind::Layer);
        assert_eq!(set.len(), 2);

        let down = KindSet::from_kind_down(ParamKind::Pm);
        assert_eq!(
            down.iter().collect::<Vec<_>>(),
            vec![ParamKind::Pm, ParamKind::Channel]
        );
        assert!(KindSet::EMPTY.is_empty());
    }
}
