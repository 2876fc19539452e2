//! Standardisation failures.
//!
//! Two families: [`StructureError`] for geometry and array-shape problems and
//! [`UnitError`] for solutes that cannot be put on an area-mass basis. Both
//! are final for the affected soil. [`StandardiseError`] wraps them with the
//! soil name and pipeline [`Stage`] for the run orchestrator.

use thiserror::Error;

use crate::core_types::Property;
use crate::soil::SubProfileKind;

/// Pipeline stages of one standardisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Array lengths against their own geometry
    Validate,
    /// Canonical geometry selection
    ResolveTarget,
    /// Physical, organic, chemical and water remapping
    RemapAll,
    /// Solute conversion to area mass and remapping
    ConvertUnits,
    /// Single-instance merge and initial conditions
    Consolidate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validate => "Validate",
            Stage::ResolveTarget => "ResolveTarget",
            Stage::RemapAll => "RemapAll",
            Stage::ConvertUnits => "ConvertUnits",
            Stage::Consolidate => "Consolidate",
        };
        f.write_str(name)
    }
}

/// Geometry or array-shape inconsistency.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructureError {
    /// An array does not have one value per layer of its own geometry
    #[error("{sub_profile}: {property} has {actual} values but its thickness defines {expected} layers")]
    LengthMismatch {
        /// Offending sub-profile
        sub_profile: String,
        /// Offending array
        property: String,
        /// Layer count of the sub-profile geometry
        expected: usize,
        /// Array length
        actual: usize,
    },
    /// Neither a layer structure nor a physical sub-profile
    #[error("soil '{soil}' has no layer structure or physical sub-profile to take its layering from")]
    MissingReferenceGeometry {
        /// Soil name
        soil: String,
    },
    /// A required sub-profile kind is absent
    #[error("soil '{soil}' has no {kind} sub-profile")]
    MissingSubProfile {
        /// Soil name
        soil: String,
        /// Missing kind
        kind: SubProfileKind,
    },
    /// A carry-last property has no valid value to carry
    #[error("{sub_profile}: {property} has no valid values")]
    NoData {
        /// Offending sub-profile
        sub_profile: String,
        /// Offending property
        property: Property,
    },
    /// Plant-available water fraction outside `[0, 1]`
    #[error("{sub_profile}: fraction of available water {value} is outside [0, 1]")]
    InvalidFraction {
        /// Offending sub-profile
        sub_profile: String,
        /// Authored fraction
        value: f64,
    },
}

/// A solute that cannot be converted between concentration and area mass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    /// Unit tag outside the recognised set
    #[error("solute '{solute}' has unrecognised units '{tag}' (expected ppm, mg/kg, kgha or kg/ha)")]
    UnrecognisedUnit {
        /// Solute name
        solute: String,
        /// Authored tag
        tag: String,
    },
    /// No usable bulk density at a layer that needs converting
    #[error("solute '{solute}': no usable bulk density for layer {layer}")]
    BulkDensityUnavailable {
        /// Solute name
        solute: String,
        /// Zero-based layer on the solute's own geometry
        layer: usize,
    },
}

/// Either family of failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoilError {
    /// Structural problem
    #[error(transparent)]
    Structure(#[from] StructureError),
    /// Unit problem
    #[error(transparent)]
    Unit(#[from] UnitError),
}

/// Run-level error: which soil failed, where, and why.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to standardise soil '{soil}' at {stage}: {error}")]
pub struct StandardiseError {
    /// Soil name
    pub soil: String,
    /// Stage that failed
    pub stage: Stage,
    /// Underlying failure
    #[source]
    pub error: SoilError,
}

impl StandardiseError {
    /// The structural failure, if that is what this is
    #[must_use]
    pub fn structure(&self) -> Option<&StructureError> {
        match &self.error {
            SoilError::Structure(e) => Some(e),
            SoilError::Unit(_) => None,
        }
    }

    /// The unit failure, if that is what this is
    #[must_use]
    pub fn unit(&self) -> Option<&UnitError> {
        match &self.error {
            SoilError::Unit(e) => Some(e),
            SoilError::Structure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_sub_profile() {
        let err = StructureError::LengthMismatch {
            sub_profile: "Physical".to_string(),
            property: "bd".to_string(),
            expected: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Physical: bd has 1 values but its thickness defines 2 layers"
        );

        let err = UnitError::UnrecognisedUnit {
            solute: "CL".to_string(),
            tag: "g/m2".to_string(),
        };
        assert!(err.to_string().contains("'g/m2'"));
    }

    #[test]
    fn test_run_level_error_wraps_stage() {
        let err = StandardiseError {
            soil: "Clay".to_string(),
            stage: Stage::Validate,
            error: StructureError::MissingReferenceGeometry {
                soil: "Clay".to_string(),
            }
            .into(),
        };
        assert!(err.to_string().starts_with("failed to standardise soil 'Clay' at Validate"));
        assert!(err.structure().is_some());
        assert!(err.unit().is_none());
        assert!(std::error::Error::source(&err).is_some());
    }
}
