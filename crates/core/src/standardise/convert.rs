//! Solute unit conversion between mass fraction and area mass.
//!
//! `kg/ha = ppm × bd (g/cm³) × thickness (mm) × 0.01`
//!
//! A layer 1 mm thick over one hectare holds 10 m³ of soil, which at 1 g/cm³
//! is 10 000 kg, so 1 mg/kg of it is 0.01 kg.

use thiserror::Error;

use crate::core_types::LayerGeometry;

/// kg/ha per (ppm · g/cm³ · mm)
pub const AREA_MASS_FACTOR: f64 = 0.01;

/// Why an array could not be converted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Bulk density missing, zero, negative or not finite
    #[error("no usable bulk density for layer {layer}")]
    BulkDensityUnavailable {
        /// Zero-based layer
        layer: usize,
    },
    /// Values, bulk density and geometry disagree on layer count
    #[error("{actual} values for {expected} layers")]
    LengthMismatch {
        /// Layer count of the geometry
        expected: usize,
        /// Offending array length
        actual: usize,
    },
}

/// Converts solute arrays on a given geometry and bulk density.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitConverter {
    factor: f64,
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self {
            factor: AREA_MASS_FACTOR,
        }
    }
}

impl UnitConverter {
    /// Converter with a non-standard mass factor
    #[must_use]
    pub fn with_factor(factor: f64) -> Self {
        Self { factor }
    }

    /// Factor in use
    #[must_use]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// ppm to kg/ha per layer.
    ///
    /// Missing values stay missing.
    ///
    /// # Errors
    ///
    /// [`ConversionError::LengthMismatch`] if the arrays do not match the
    /// geometry, [`ConversionError::BulkDensityUnavailable`] at the first layer
    /// whose bulk density is not finite and positive.
    pub fn to_area_mass(
        &self,
        ppm: &[f64],
        geometry: &LayerGeometry,
        bd: &[f64],
    ) -> Result<Vec<f64>, ConversionError> {
        let per_ppm = self.mass_per_ppm(geometry, bd, ppm.len())?;
        Ok(ppm.iter().zip(per_ppm).map(|(c, m)| c * m).collect())
    }

    /// kg/ha per layer to ppm.
    ///
    /// # Errors
    ///
    /// As for [`UnitConverter::to_area_mass`].
    pub fn to_concentration(
        &self,
        area_mass: &[f64],
        geometry: &LayerGeometry,
        bd: &[f64],
    ) -> Result<Vec<f64>, ConversionError> {
        let per_ppm = self.mass_per_ppm(geometry, bd, area_mass.len())?;
        Ok(area_mass.iter().zip(per_ppm).map(|(m, k)| m / k).collect())
    }

    fn mass_per_ppm(
        &self,
        geometry: &LayerGeometry,
        bd: &[f64],
        values: usize,
    ) -> Result<Vec<f64>, ConversionError> {
        let expected = geometry.layer_count();
        for actual in [values, bd.len()] {
            if actual != expected {
                return Err(ConversionError::LengthMismatch { expected, actual });
            }
        }
        bd.iter()
            .zip(geometry.thickness())
            .enumerate()
            .map(|(layer, (&bd, &t))| {
                if bd.is_finite() && bd > 0.0 {
                    Ok(bd * t * self.factor)
                } else {
                    Err(ConversionError::BulkDensityUnavailable { layer })
                }
            })
            .collect()
    }
}
