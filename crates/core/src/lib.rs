//! Soil Standardisation Core Library
//!
//! Reconciles the layered sub-profiles of a soil (physical, organic, chemical,
//! water and solutes), each authored on its own layering, onto a single
//! canonical layer geometry before a simulation run.
//!
//! ## Overview
//!
//! - Intensive properties (densities, concentrations, pH) are depth-weighted
//!   averages when layers change; extensive ones (area masses) are split so
//!   their totals are conserved
//! - Depths beyond a sub-profile's measurements are filled per property,
//!   either by carrying the deepest reading down or with a reference constant
//! - Solutes are converted to kg/ha at their own resolution before remapping

// Core types and utilities
pub mod core_types;

// Authored and standardised soil data
pub mod soil;

// Standardisation pipeline
pub mod standardise;

// Re-export core types
pub use core_types::{FillKey, FillPolicy, FillPolicyTable, LayerGeometry, Millimeters};
pub use core_types::{GeometryError, Property, Semantics};

// Re-export soil types
pub use soil::{Chemical, Organic, Physical, SoilCrop, SoilProfile, Solute, Water};
pub use soil::{InitialConditions, Outcome, StandardisedSoil, StandardisedSolute};

// Re-export the pipeline
pub use standardise::{standardise, SoilStandardiser, StandardiserConfig};
pub use standardise::{SoilError, StandardiseError, Stage, StructureError, UnitError};
