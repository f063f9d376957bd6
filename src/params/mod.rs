//! Detector parameter hierarchy and its lazy resolution.

pub mod bank;
pub mod entity;
pub mod factory;
pub mod getter;
pub mod kind;
pub mod persist;
pub mod resolver;

pub use bank::ParamBank;
pub use entity::{Channel, Layer, ParamEntity, ParamId, Pm, PmSide, Scin, Setup, Slot};
pub use factory::{EntitySet, FactoryCache, KindFactory};
pub use getter::{JsonParamGetter, ParamDescription, ParamGetter};
pub use kind::{KindSet, ParamKind};
pub use resolver::ParamResolver;
