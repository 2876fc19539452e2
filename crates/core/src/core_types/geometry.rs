//! Vertical layer geometry.
//!
//! A [`LayerGeometry`] is the ordered list of layer thicknesses a sub-profile
//! is authored on. Only thicknesses are stored; cumulative top and bottom
//! boundaries are derived on demand so the two can never disagree.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::units::Millimeters;

/// Depth differences below this are treated as the same boundary.
pub const DEPTH_TOLERANCE: f64 = 1e-9;

/// Rejected thickness sequences.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// No layers at all
    #[error("layer geometry must contain at least one layer")]
    Empty,
    /// A layer that is zero, negative, NaN or infinite
    #[error("layer {index} has invalid thickness {value} (must be finite and positive)")]
    NonPositive {
        /// Zero-based layer index
        index: usize,
        /// Offending thickness
        value: f64,
    },
}

/// Immutable sequence of strictly positive layer thicknesses (mm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct LayerGeometry {
    thickness: Vec<f64>,
}

impl LayerGeometry {
    /// Create a geometry from layer thicknesses in millimetres.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Empty`] for an empty sequence and
    /// [`GeometryError::NonPositive`] for any thickness that is not a finite
    /// positive number.
    pub fn new(thickness: impl Into<Vec<f64>>) -> Result<Self, GeometryError> {
        let thickness = thickness.into();
        if thickness.is_empty() {
            return Err(GeometryError::Empty);
        }
        if let Some((index, &value)) = thickness
            .iter()
            .enumerate()
            .find(|(_, t)| !t.is_finite() || **t <= 0.0)
        {
            return Err(GeometryError::NonPositive { index, value });
        }
        Ok(Self { thickness })
    }

    /// Number of layers
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.thickness.len()
    }

    /// Raw thicknesses in millimetres
    #[must_use]
    pub fn thickness(&self) -> &[f64] {
        &self.thickness
    }

    /// Depth of the bottom of the deepest layer
    #[must_use]
    pub fn total_depth(&self) -> Millimeters {
        self.thickness.iter().copied().map(Millimeters::from).sum()
    }

    /// `(top, bottom)` of every layer, surface first.
    pub fn boundaries(&self) -> impl Iterator<Item = (Millimeters, Millimeters)> + '_ {
        self.thickness.iter().scan(Millimeters::SURFACE, |depth, &t| {
            let top = *depth;
            *depth += Millimeters::from(t);
            Some((top, *depth))
        })
    }

    /// Depth-weighted midpoint of each layer.
    #[must_use]
    pub fn midpoints(&self) -> Vec<Millimeters> {
        self.boundaries()
            .map(|(top, bottom)| top + (bottom - top) / 2.0)
            .collect()
    }

    /// True when both geometries have the same layers, boundary for boundary.
    #[must_use]
    pub fn same_layers(&self, other: &LayerGeometry) -> bool {
        self.thickness.len() == other.thickness.len()
            && self
                .thickness
                .iter()
                .zip(&other.thickness)
                .all(|(a, b)| (a - b).abs() <= DEPTH_TOLERANCE)
    }

    /// Overlap depth between every layer of `self` (rows) and every layer of
    /// `source` (columns).
    ///
    /// Entry `(i, j)` is `max(0, min(bottom_i, bottom_j) - max(top_i, top_j))`
    /// in millimetres. Row sums give how much of each layer of `self` is
    /// covered by `source`.
    #[must_use]
    pub fn overlap_with(&self, source: &LayerGeometry) -> DMatrix<f64> {
        let target_bounds: Vec<_> = self.boundaries().collect();
        let source_bounds: Vec<_> = source.boundaries().collect();

        DMatrix::from_fn(target_bounds.len(), source_bounds.len(), |i, j| {
            let (t_top, t_bottom) = target_bounds[i];
            let (s_top, s_bottom) = source_bounds[j];
            let overlap = *t_bottom.min(s_bottom) - *t_top.max(s_top);
            if overlap > DEPTH_TOLERANCE {
                overlap
            } else {
                0.0
            }
        })
    }

    /// Append one layer so the profile reaches `depth`.
    ///
    /// Returns `None` when the geometry is already at least that deep.
    #[must_use]
    pub fn extended_to(&self, depth: Millimeters) -> Option<LayerGeometry> {
        let gap = *depth - *self.total_depth();
        if gap <= DEPTH_TOLERANCE {
            return None;
        }
        let mut thickness = self.thickness.clone();
        thickness.push(gap);
        Some(Self { thickness })
    }
}

impl TryFrom<Vec<f64>> for LayerGeometry {
    type Error = GeometryError;

    fn try_from(thickness: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(thickness)
    }
}

impl From<LayerGeometry> for Vec<f64> {
    fn from(geometry: LayerGeometry) -> Vec<f64> {
        geometry.thickness
    }
}

impl std::fmt::Display for LayerGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} mm", self.thickness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(t: &[f64]) -> LayerGeometry {
        LayerGeometry::new(t.to_vec()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_thickness() {
        assert_eq!(LayerGeometry::new(Vec::<f64>::new()), Err(GeometryError::Empty));
        assert_eq!(
            LayerGeometry::new(vec![100.0, 0.0]),
            Err(GeometryError::NonPositive {
                index: 1,
                value: 0.0
            })
        );
        assert!(LayerGeometry::new(vec![f64::NAN]).is_err());
        assert!(LayerGeometry::new(vec![-5.0, 10.0]).is_err());
    }

    #[test]
    fn test_boundaries_are_derived() {
        let g = geom(&[100.0, 300.0, 300.0]);
        let bounds: Vec<_> = g.boundaries().map(|(t, b)| (*t, *b)).collect();
        assert_eq!(bounds, vec![(0.0, 100.0), (100.0, 400.0), (400.0, 700.0)]);
        assert_eq!(*g.total_depth(), 700.0);
        assert_eq!(g.layer_count(), 3);
        let mids: Vec<f64> = g.midpoints().into_iter().map(f64::from).collect();
        assert_eq!(mids, vec![50.0, 250.0, 550.0]);
    }

    #[test]
    fn test_overlap_matrix() {
        let target = geom(&[100.0, 200.0]);
        let source = geom(&[50.0, 50.0]);
        let o = target.overlap_with(&source);
        assert_eq!(o.nrows(), 2);
        assert_eq!(o.ncols(), 2);
        assert_eq!(o[(0, 0)], 50.0);
        assert_eq!(o[(0, 1)], 50.0);
        assert_eq!(o[(1, 0)], 0.0);
        assert_eq!(o[(1, 1)], 0.0);
    }

    #[test]
    fn test_overlap_irregular() {
        let target = geom(&[150.0, 150.0]);
        let source = geom(&[100.0, 100.0, 100.0]);
        let o = target.overlap_with(&source);
        assert_eq!(o[(0, 0)], 100.0);
        assert_eq!(o[(0, 1)], 50.0);
        assert_eq!(o[(1, 1)], 50.0);
        assert_eq!(o[(1, 2)], 100.0);
        // Every target layer is fully covered
        for i in 0..2 {
            assert_eq!(o.row(i).sum(), 150.0);
        }
    }

    #[test]
    fn test_extended_to() {
        let g = geom(&[50.0, 50.0]);
        let padded = g.extended_to(Millimeters::new(300.0)).unwrap();
        assert_eq!(padded.thickness(), &[50.0, 50.0, 200.0]);
        assert!(g.extended_to(Millimeters::new(100.0)).is_none());
        assert!(g.extended_to(Millimeters::new(80.0)).is_none());
    }

    #[test]
    fn test_same_layers() {
        assert!(geom(&[100.0, 200.0]).same_layers(&geom(&[100.0, 200.0])));
        assert!(!geom(&[100.0, 200.0]).same_layers(&geom(&[100.0, 300.0])));
        assert!(!geom(&[100.0]).same_layers(&geom(&[100.0, 200.0])));
    }
}
