//! Shape checks run before any remapping.

use super::error::StructureError;
use crate::soil::{SoilProfile, SubProfile, WaterInitial};

/// Check every layered array against its own sub-profile geometry and the
/// authored water fraction against `[0, 1]`.
///
/// # Errors
///
/// The first [`StructureError::LengthMismatch`] or
/// [`StructureError::InvalidFraction`] found, in sub-profile order.
pub fn validate(soil: &SoilProfile) -> Result<(), StructureError> {
    for sub_profile in soil.sub_profiles() {
        check_lengths(sub_profile)?;
    }
    for water in &soil.water {
        if let WaterInitial::FractionFull(value) = water.initial {
            if !(0.0..=1.0).contains(&value) {
                return Err(StructureError::InvalidFraction {
                    sub_profile: water.name.clone(),
                    value,
                });
            }
        }
    }
    Ok(())
}

fn check_lengths(sub_profile: &dyn SubProfile) -> Result<(), StructureError> {
    let expected = sub_profile.thickness().layer_count();
    match sub_profile
        .columns()
        .into_iter()
        .find(|c| c.values.len() != expected)
    {
        Some(column) => Err(StructureError::LengthMismatch {
            sub_profile: sub_profile.name().to_string(),
            property: column.to_string(),
            expected,
            actual: column.values.len(),
        }),
        None => Ok(()),
    }
}
