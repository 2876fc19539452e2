//! Core types: depth units, layer geometry and property identities

pub mod geometry;
pub mod property;
pub mod units;

pub use geometry::{GeometryError, LayerGeometry, DEPTH_TOLERANCE};
pub use property::{
    FillKey, FillPolicy, FillPolicyTable, Property, Semantics, COMPATIBILITY_TABLE,
    SOLUTE_DEFAULTS,
};
pub use units::Millimeters;
