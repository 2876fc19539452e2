//! Soil data model: authored sub-profiles and the standardised result

pub mod profile;
pub mod standardised;

pub use profile::{
    Chemical, Column, LayerStructure, Organic, Physical, SoilCrop, SoilProfile, Solute,
    SoluteUnits, SubProfile, SubProfileKind, UnitTag, Water, WaterInitial,
};
pub use standardised::{InitialConditions, Outcome, StandardisedSoil, StandardisedSolute};
