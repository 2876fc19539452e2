//! Canonical geometry selection.

use super::error::StructureError;
use crate::core_types::LayerGeometry;
use crate::soil::SoilProfile;

/// The layering every sub-profile is mapped onto.
///
/// An explicit layer structure wins, otherwise the physical sub-profile
/// defines it.
///
/// # Errors
///
/// [`StructureError::MissingReferenceGeometry`] when the soil has neither.
pub fn resolve(soil: &SoilProfile) -> Result<LayerGeometry, StructureError> {
    soil.layer_structure
        .as_ref()
        .map(|ls| &ls.thickness)
        .or_else(|| soil.physical.as_ref().map(|p| &p.thickness))
        .cloned()
        .ok_or_else(|| StructureError::MissingReferenceGeometry {
            soil: soil.name.clone(),
        })
}
