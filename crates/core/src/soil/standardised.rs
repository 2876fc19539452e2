//! Output of standardisation: one geometry shared by everything.

use serde::{Deserialize, Serialize};

use super::profile::{Chemical, Organic, Physical, Water};
use crate::core_types::LayerGeometry;

/// A solute on the canonical geometry, in both bases.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardisedSolute {
    /// Solute name
    pub name: String,
    /// kg/ha per canonical layer
    pub area_mass: Vec<f64>,
    /// ppm per canonical layer
    pub concentration: Vec<f64>,
}

impl StandardisedSolute {
    /// Total mass over the profile (kg/ha)
    #[must_use]
    pub fn total_area_mass(&self) -> f64 {
        self.area_mass.iter().sum()
    }
}

/// Starting state handed to the simulation: water, solutes and chemistry
/// paired on the canonical geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InitialConditions {
    /// Canonical layering
    pub thickness: LayerGeometry,
    /// Volumetric water (mm/mm)
    pub water: Vec<f64>,
    /// Solute area masses (kg/ha)
    pub solutes: Vec<StandardisedSolute>,
    /// Chemistry at the start of the run
    pub chemical: Chemical,
}

impl InitialConditions {
    /// Water per layer in millimetres
    #[must_use]
    pub fn water_mm(&self) -> Vec<f64> {
        self.water
            .iter()
            .zip(self.thickness.thickness())
            .map(|(sw, t)| sw * t)
            .collect()
    }

    /// Area mass of one solute
    #[must_use]
    pub fn solute(&self, name: &str) -> Option<&[f64]> {
        self.solutes
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.area_mass.as_slice())
    }
}

/// A soil with every sub-profile on one canonical geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardisedSoil {
    /// Soil name
    pub name: String,
    /// Canonical layering
    pub geometry: LayerGeometry,
    /// Physical properties
    pub physical: Physical,
    /// Organic matter
    pub organic: Organic,
    /// Chemistry
    pub chemical: Chemical,
    /// Initial water, always volumetric
    pub water: Water,
    /// One entry per distinct solute name, in order of first appearance
    pub solutes: Vec<StandardisedSolute>,
    /// Combined starting state
    pub initial_conditions: InitialConditions,
}

impl StandardisedSoil {
    /// Number of canonical layers
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.geometry.layer_count()
    }

    /// Look up a solute by name
    #[must_use]
    pub fn solute(&self, name: &str) -> Option<&StandardisedSolute> {
        self.solutes.iter().find(|s| s.name == name)
    }
}

/// Result of asking for a soil to be standardised.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The soil was enabled and is now standardised
    Standardised(Box<StandardisedSoil>),
    /// The soil is disabled; nothing was evaluated
    Skipped,
}

impl Outcome {
    /// The standardised soil, if any
    #[must_use]
    pub fn soil(&self) -> Option<&StandardisedSoil> {
        match self {
            Outcome::Standardised(soil) => Some(soil.as_ref()),
            Outcome::Skipped => None,
        }
    }

    /// Take the standardised soil, if any
    #[must_use]
    pub fn into_soil(self) -> Option<StandardisedSoil> {
        match self {
            Outcome::Standardised(soil) => Some(*soil),
            Outcome::Skipped => None,
        }
    }

    /// True when the soil was skipped
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }
}
