//! Layer remapping.
//!
//! Moves one property array from a source geometry onto a target geometry.
//!
//! # Semantics
//!
//! With `O` the target×source overlap matrix (mm) and `t_j` the source
//! thicknesses:
//!
//! - **Intensive**: `out_i = Σ_j O_ij v_j / Σ_j O_ij`, the depth-weighted mean
//!   over the part of target layer `i` the source covers. A target layer with
//!   no overlap at all takes the fill value.
//! - **Extensive**: `out_i = Σ_j O_ij (v_j / t_j)`, each source quantity split
//!   in proportion to the fraction of its layer inside the target layer, so
//!   `Σ out = Σ v` whenever both geometries reach the same depth. Any part of a
//!   target layer below the source receives the fill as a per-millimetre
//!   density times the uncovered depth.
//!
//! Missing values (NaN) inside the source are filled with the same policy
//! before any weighting, so NaN never reaches the output.

use nalgebra::DVector;
use thiserror::Error;

use crate::core_types::{
    FillKey, FillPolicy, FillPolicyTable, LayerGeometry, Property, Semantics, DEPTH_TOLERANCE,
};

/// Why an array could not be remapped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemapError {
    /// Array length does not match the source geometry
    #[error("{property}: {actual} values for {expected} source layers")]
    LengthMismatch {
        /// Property being remapped
        property: Property,
        /// Source layer count
        expected: usize,
        /// Array length
        actual: usize,
    },
    /// Carry-last with nothing to carry
    #[error("{property}: no valid values to carry forward")]
    NoData {
        /// Property being remapped
        property: Property,
    },
}

/// Replace missing values according to `fill`.
///
/// Carry-last repeats the nearest valid value above a gap; a gap at the top
/// of the profile takes the first valid value below it. Returns `None` when
/// carry-last has no valid value anywhere.
#[must_use]
pub fn fill_gaps(values: &[f64], fill: FillPolicy) -> Option<Vec<f64>> {
    match fill {
        FillPolicy::FixedDefault(default) => Some(
            values
                .iter()
                .map(|&v| if v.is_nan() { default } else { v })
                .collect(),
        ),
        FillPolicy::CarryLast => {
            let first_valid = values.iter().copied().find(|v| !v.is_nan())?;
            let mut last = first_valid;
            Some(
                values
                    .iter()
                    .map(|&v| {
                        if v.is_nan() {
                            last
                        } else {
                            last = v;
                            v
                        }
                    })
                    .collect(),
            )
        }
    }
}

/// Remap `values` from `source` onto `target`.
///
/// A target layer only partly below the source depth is treated differently
/// per semantics: intensive values average the covered span alone and take
/// `fill` only where a layer has no coverage at all, while extensive values
/// add `fill` for the uncovered depth.
///
/// # Errors
///
/// [`RemapError::LengthMismatch`] if `values` does not have one entry per
/// source layer, [`RemapError::NoData`] if `fill` is carry-last and every
/// value is missing.
pub fn remap(
    values: &[f64],
    source: &LayerGeometry,
    target: &LayerGeometry,
    semantics: Semantics,
    fill: FillPolicy,
) -> Result<Vec<f64>, RemapError> {
    let property = semantics.property();
    if values.len() != source.layer_count() {
        return Err(RemapError::LengthMismatch {
            property,
            expected: source.layer_count(),
            actual: values.len(),
        });
    }

    match semantics {
        Semantics::Intensive(_) => {
            let filled = fill_gaps(values, fill).ok_or(RemapError::NoData { property })?;
            if source.same_layers(target) {
                return Ok(filled);
            }
            Ok(remap_intensive(&filled, source, target, fill))
        }
        Semantics::Extensive(_) => {
            // Gaps in a conserved quantity are filled as densities so a thin
            // and a thick layer next to each other do not trade mass.
            let densities: Vec<f64> = values
                .iter()
                .zip(source.thickness())
                .map(|(v, t)| v / t)
                .collect();
            let densities =
                fill_gaps(&densities, fill).ok_or(RemapError::NoData { property })?;
            if source.same_layers(target) {
                return Ok(densities
                    .iter()
                    .zip(source.thickness())
                    .map(|(d, t)| d * t)
                    .collect());
            }
            Ok(remap_extensive(&densities, source, target, fill))
        }
    }
}

fn remap_intensive(
    filled: &[f64],
    source: &LayerGeometry,
    target: &LayerGeometry,
    fill: FillPolicy,
) -> Vec<f64> {
    let overlap = target.overlap_with(source);
    let covered = overlap.column_sum();
    let weighted = &overlap * DVector::from_column_slice(filled);
    let below = match fill {
        FillPolicy::CarryLast => filled[filled.len() - 1],
        FillPolicy::FixedDefault(default) => default,
    };

    weighted
        .iter()
        .zip(covered.iter())
        .map(|(&w, &c)| if c > DEPTH_TOLERANCE { w / c } else { below })
        .collect()
}

fn remap_extensive(
    densities: &[f64],
    source: &LayerGeometry,
    target: &LayerGeometry,
    fill: FillPolicy,
) -> Vec<f64> {
    let overlap = target.overlap_with(source);
    let covered = overlap.column_sum();
    let conserved = &overlap * DVector::from_column_slice(densities);
    let below_density = match fill {
        FillPolicy::CarryLast => densities[densities.len() - 1],
        FillPolicy::FixedDefault(default) => default,
    };

    conserved
        .iter()
        .zip(covered.iter())
        .zip(target.thickness())
        .map(|((&mass, &c), &t)| {
            let uncovered = t - c;
            if uncovered > DEPTH_TOLERANCE {
                mass + below_density * uncovered
            } else {
                mass
            }
        })
        .collect()
}

/// Remaps properties with the fill policies of a [`FillPolicyTable`].
#[derive(Debug, Clone, Copy)]
pub struct LayerRemapper<'a> {
    table: &'a FillPolicyTable,
}

impl<'a> LayerRemapper<'a> {
    /// Create a remapper over a fill-policy table
    #[must_use]
    pub fn new(table: &'a FillPolicyTable) -> Self {
        Self { table }
    }

    /// The policy table in use
    #[must_use]
    pub fn table(&self) -> &'a FillPolicyTable {
        self.table
    }

    /// Remap a property with its declared semantics and fill policy.
    ///
    /// # Errors
    ///
    /// See [`remap`].
    pub fn remap_property(
        &self,
        values: &[f64],
        source: &LayerGeometry,
        target: &LayerGeometry,
        property: Property,
    ) -> Result<Vec<f64>, RemapError> {
        let fill = self.table.policy(FillKey::Property(property));
        remap(values, source, target, property.semantics(), fill)
    }

    /// Remap an optional property; absent stays absent.
    ///
    /// # Errors
    ///
    /// See [`remap`].
    pub fn remap_optional(
        &self,
        values: Option<&Vec<f64>>,
        source: &LayerGeometry,
        target: &LayerGeometry,
        property: Property,
    ) -> Result<Option<Vec<f64>>, RemapError> {
        values
            .map(|v| self.remap_property(v, source, target, property))
            .transpose()
    }
}
