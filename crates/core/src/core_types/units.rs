//! Semantic unit types for soil depth handling
//!
//! Depths and thicknesses are carried as [`Millimeters`] so a layer boundary
//! can never be confused with a property value living on that layer.
//!
//! # Design Philosophy
//! - f64 throughout: soil arrays are accumulated over many layers and the
//!   conservation checks compare sums
//! - Total ordering via `Ord` (NaN handled as greater than all values)
//! - Serde support for serialization
//!
//! # Usage
//! ```
//! use soil_std_core::core_types::units::Millimeters;
//!
//! let top = Millimeters::new(100.0);
//! let bottom = top + Millimeters::new(300.0);
//! assert_eq!(*bottom, 400.0);
//! assert_eq!(top.min(bottom), top);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Deref, Div, Mul, Sub};

/// Depth or thickness in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Millimeters(f64);

impl Eq for Millimeters {}

impl PartialOrd for Millimeters {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Millimeters {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Deref for Millimeters {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Millimeters {
    /// Zero depth (the soil surface)
    pub const SURFACE: Millimeters = Millimeters(0.0);

    /// Create a new depth in millimetres
    #[inline]
    #[must_use]
    #[track_caller]
    pub const fn new(value: f64) -> Self {
        assert!(value >= 0.0, "Millimeters::new: negative depth is invalid");
        Millimeters(value)
    }
}

impl From<f64> for Millimeters {
    fn from(v: f64) -> Self {
        Millimeters(v)
    }
}

impl From<Millimeters> for f64 {
    fn from(m: Millimeters) -> f64 {
        m.0
    }
}

impl Add for Millimeters {
    type Output = Millimeters;
    fn add(self, rhs: Millimeters) -> Millimeters {
        Millimeters(self.0 + rhs.0)
    }
}

impl AddAssign for Millimeters {
    fn add_assign(&mut self, rhs: Millimeters) {
        self.0 += rhs.0;
    }
}

impl Sub for Millimeters {
    type Output = Millimeters;
    fn sub(self, rhs: Millimeters) -> Millimeters {
        Millimeters(self.0 - rhs.0)
    }
}

impl Mul<f64> for Millimeters {
    type Output = Millimeters;
    fn mul(self, rhs: f64) -> Millimeters {
        Millimeters(self.0 * rhs)
    }
}

impl Div<f64> for Millimeters {
    type Output = Millimeters;
    fn div(self, rhs: f64) -> Millimeters {
        Millimeters(self.0 / rhs)
    }
}

// Depth over depth is a dimensionless fraction
impl Div for Millimeters {
    type Output = f64;
    fn div(self, rhs: Millimeters) -> f64 {
        self.0 / rhs.0
    }
}

impl Sum for Millimeters {
    fn sum<I: Iterator<Item = Millimeters>>(iter: I) -> Millimeters {
        Millimeters(iter.map(|m| m.0).sum())
    }
}

impl fmt::Display for Millimeters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} mm", self.0)
    }
}
