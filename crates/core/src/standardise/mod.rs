//! Soil standardisation pipeline
//!
//! Reconciles every sub-profile of a [`SoilProfile`] onto one canonical layer
//! geometry before a simulation run starts.
//!
//! # Stages
//!
//! 1. `Validate`: every array matches its own sub-profile geometry
//! 2. `ResolveTarget`: layer structure override, else the Physical layering
//! 3. `RemapAll`: Physical, Organic, Chemical and Water onto the canonical layers
//! 4. `ConvertUnits`: solutes moved to kg/ha at native resolution, then remapped
//! 5. `Consolidate`: one instance per kind plus the initial conditions
//!
//! A disabled soil is skipped before `Validate`, so defects in it never
//! surface. Any failure is final for that soil and is reported as a
//! [`StandardiseError`] naming the soil and stage.
//!
//! # Example
//!
//! ```rust,ignore
//! use soil_std_core::standardise::SoilStandardiser;
//!
//! let standardiser = SoilStandardiser::default();
//! let outcome = standardiser.standardise(&soil)?;
//! if let Some(soil) = outcome.soil() {
//!     println!("{} layers", soil.layer_count());
//! }
//! ```

pub mod consolidate;
pub mod convert;
pub mod error;
pub mod remap;
mod target;
mod validate;

pub use consolidate::{Consolidator, RemappedProfiles};
pub use convert::{ConversionError, UnitConverter, AREA_MASS_FACTOR};
pub use error::{SoilError, StandardiseError, Stage, StructureError, UnitError};
pub use remap::{fill_gaps, remap, LayerRemapper, RemapError};
pub use target::resolve;
pub use validate::validate;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::core_types::{FillKey, FillPolicy, FillPolicyTable, LayerGeometry, Property};
use crate::soil::{
    Chemical, Organic, Outcome, Physical, SoilCrop, SoilProfile, Solute, SoluteUnits,
    StandardisedSolute, SubProfileKind, Water, WaterInitial,
};

/// Relative mass difference below which nothing is reported as dropped.
const MASS_TOLERANCE: f64 = 1e-9;

/// Standardiser settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StandardiserConfig {
    /// Gap-fill policy per property and solute
    pub fill_policies: FillPolicyTable,
    /// kg/ha per (ppm · g/cm³ · mm)
    pub area_mass_factor: f64,
}

impl Default for StandardiserConfig {
    fn default() -> Self {
        Self {
            fill_policies: FillPolicyTable::default(),
            area_mass_factor: AREA_MASS_FACTOR,
        }
    }
}

impl StandardiserConfig {
    /// Override one fill-policy entry
    pub fn with_fill_policy(mut self, key: FillKey<'_>, policy: FillPolicy) -> Self {
        self.fill_policies.set(key, policy);
        self
    }

    /// Override the concentration to area-mass factor
    pub fn with_area_mass_factor(mut self, factor: f64) -> Self {
        self.area_mass_factor = factor;
        self
    }
}

/// Runs the standardisation pipeline.
///
/// Holds no per-soil state: one instance can standardise any number of soils,
/// from any number of threads.
#[derive(Clone, Debug, Default)]
pub struct SoilStandardiser {
    config: StandardiserConfig,
    converter: UnitConverter,
}

/// Attach soil and stage to a failure.
fn at<E: Into<SoilError>>(soil: &SoilProfile, stage: Stage) -> impl FnOnce(E) -> StandardiseError + '_ {
    move |error| StandardiseError {
        soil: soil.name.clone(),
        stage,
        error: error.into(),
    }
}

fn structure_error(sub_profile: &str, error: RemapError) -> StructureError {
    match error {
        RemapError::LengthMismatch {
            property,
            expected,
            actual,
        } => StructureError::LengthMismatch {
            sub_profile: sub_profile.to_string(),
            property: property.to_string(),
            expected,
            actual,
        },
        RemapError::NoData { property } => StructureError::NoData {
            sub_profile: sub_profile.to_string(),
            property,
        },
    }
}

fn conversion_error(solute: &str, error: ConversionError) -> SoilError {
    match error {
        ConversionError::BulkDensityUnavailable { layer } => UnitError::BulkDensityUnavailable {
            solute: solute.to_string(),
            layer,
        }
        .into(),
        ConversionError::LengthMismatch { expected, actual } => StructureError::LengthMismatch {
            sub_profile: solute.to_string(),
            property: Property::SoluteConcentration.to_string(),
            expected,
            actual,
        }
        .into(),
    }
}

/// Remaps the arrays of one sub-profile onto the canonical geometry.
struct SubProfileRemap<'a> {
    remapper: LayerRemapper<'a>,
    sub_profile: &'a str,
    source: &'a LayerGeometry,
    target: &'a LayerGeometry,
}

impl SubProfileRemap<'_> {
    fn values(&self, values: &[f64], property: Property) -> Result<Vec<f64>, StructureError> {
        debug!("Remapping {}.{}", self.sub_profile, property);
        self.remapper
            .remap_property(values, self.source, self.target, property)
            .map_err(|e| structure_error(self.sub_profile, e))
    }

    fn optional(
        &self,
        values: Option<&Vec<f64>>,
        property: Property,
    ) -> Result<Option<Vec<f64>>, StructureError> {
        if values.is_some() {
            debug!("Remapping {}.{}", self.sub_profile, property);
        }
        self.remapper
            .remap_optional(values, self.source, self.target, property)
            .map_err(|e| structure_error(self.sub_profile, e))
    }

    fn crop(&self, crop: &SoilCrop) -> Result<SoilCrop, StructureError> {
        Ok(SoilCrop {
            name: crop.name.clone(),
            ll: self.values(&crop.ll, Property::CropLl)?,
            kl: self.values(&crop.kl, Property::CropKl)?,
            xf: self.values(&crop.xf, Property::CropXf)?,
        })
    }
}

impl SoilStandardiser {
    /// Create a standardiser
    #[must_use]
    pub fn new(config: StandardiserConfig) -> Self {
        let converter = UnitConverter::with_factor(config.area_mass_factor);
        Self { config, converter }
    }

    /// Settings in use
    #[must_use]
    pub fn config(&self) -> &StandardiserConfig {
        &self.config
    }

    /// Standardise one soil.
    ///
    /// # Arguments
    ///
    /// * `soil` - Authored soil, never modified
    ///
    /// # Returns
    ///
    /// [`Outcome::Skipped`] for a disabled soil, otherwise the standardised soil.
    ///
    /// # Errors
    ///
    /// A [`StandardiseError`] carrying the soil name, the failing [`Stage`] and
    /// the underlying [`StructureError`] or [`UnitError`].
    pub fn standardise(&self, soil: &SoilProfile) -> Result<Outcome, StandardiseError> {
        let _span = info_span!("standardise", soil = %soil.name).entered();

        if !soil.enabled {
            info!("Soil '{}' is disabled, skipping standardisation", soil.name);
            return Ok(Outcome::Skipped);
        }
        info!("Standardising soil '{}'", soil.name);

        validate(soil).map_err(at(soil, Stage::Validate))?;

        let geometry = resolve(soil).map_err(at(soil, Stage::ResolveTarget))?;
        debug!("Canonical geometry for '{}': {}", soil.name, geometry);

        let physical = soil
            .physical
            .as_ref()
            .ok_or_else(|| StructureError::MissingSubProfile {
                soil: soil.name.clone(),
                kind: SubProfileKind::Physical,
            })
            .map_err(at(soil, Stage::RemapAll))?;
        let remapped = self
            .remap_all(soil, physical, &geometry)
            .map_err(at(soil, Stage::RemapAll))?;

        let solutes = soil
            .solutes
            .iter()
            .map(|solute| self.convert_solute(solute, physical, &remapped.physical, &geometry))
            .collect::<Result<Vec<_>, _>>()
            .map_err(at(soil, Stage::ConvertUnits))?;

        let standardised = Consolidator::new(&self.config.fill_policies)
            .consolidate(&soil.name, &geometry, remapped, solutes)
            .map_err(at(soil, Stage::Consolidate))?;

        info!(
            "Standardised soil '{}': {} layers, {} solutes",
            soil.name,
            standardised.layer_count(),
            standardised.solutes.len()
        );
        Ok(Outcome::Standardised(Box::new(standardised)))
    }

    /// Standardise several soils in parallel.
    ///
    /// One result per soil, in input order. Soils share nothing, so one
    /// failure never affects another.
    pub fn standardise_all(&self, soils: &[SoilProfile]) -> Vec<Result<Outcome, StandardiseError>> {
        soils.par_iter().map(|soil| self.standardise(soil)).collect()
    }

    fn remapper(&self) -> LayerRemapper<'_> {
        LayerRemapper::new(&self.config.fill_policies)
    }

    fn remap_all(
        &self,
        soil: &SoilProfile,
        physical: &Physical,
        target: &LayerGeometry,
    ) -> Result<RemappedProfiles, StructureError> {
        let physical = self.remap_physical(physical, target)?;
        let organic = soil
            .organic
            .iter()
            .map(|o| self.remap_organic(o, target))
            .collect::<Result<Vec<_>, _>>()?;
        let chemical = soil
            .chemical
            .iter()
            .map(|c| self.remap_chemical(c, target))
            .collect::<Result<Vec<_>, _>>()?;
        let water = soil
            .water
            .iter()
            .map(|w| self.remap_water(w, &physical, target))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RemappedProfiles {
            physical,
            organic,
            chemical,
            water,
        })
    }

    fn remap_physical(
        &self,
        physical: &Physical,
        target: &LayerGeometry,
    ) -> Result<Physical, StructureError> {
        let r = SubProfileRemap {
            remapper: self.remapper(),
            sub_profile: &physical.name,
            source: &physical.thickness,
            target,
        };
        Ok(Physical {
            name: physical.name.clone(),
            thickness: target.clone(),
            bd: r.values(&physical.bd, Property::BulkDensity)?,
            air_dry: r.values(&physical.air_dry, Property::AirDry)?,
            ll15: r.values(&physical.ll15, Property::Ll15)?,
            dul: r.values(&physical.dul, Property::Dul)?,
            sat: r.values(&physical.sat, Property::Sat)?,
            ks: r.optional(physical.ks.as_ref(), Property::Ks)?,
            crops: physical
                .crops
                .iter()
                .map(|crop| r.crop(crop))
                .collect::<Result<_, _>>()?,
        })
    }

    fn remap_organic(
        &self,
        organic: &Organic,
        target: &LayerGeometry,
    ) -> Result<Organic, StructureError> {
        let r = SubProfileRemap {
            remapper: self.remapper(),
            sub_profile: &organic.name,
            source: &organic.thickness,
            target,
        };
        Ok(Organic {
            name: organic.name.clone(),
            thickness: target.clone(),
            carbon: r.optional(organic.carbon.as_ref(), Property::Carbon)?,
            carbon_n_ratio: r.optional(organic.carbon_n_ratio.as_ref(), Property::CarbonNRatio)?,
            fbiom: r.optional(organic.fbiom.as_ref(), Property::FBiom)?,
            finert: r.optional(organic.finert.as_ref(), Property::FInert)?,
            fom: r.optional(organic.fom.as_ref(), Property::Fom)?,
        })
    }

    fn remap_chemical(
        &self,
        chemical: &Chemical,
        target: &LayerGeometry,
    ) -> Result<Chemical, StructureError> {
        let r = SubProfileRemap {
            remapper: self.remapper(),
            sub_profile: &chemical.name,
            source: &chemical.thickness,
            target,
        };
        Ok(Chemical {
            name: chemical.name.clone(),
            thickness: target.clone(),
            ph: r.optional(chemical.ph.as_ref(), Property::Ph)?,
            ec: r.optional(chemical.ec.as_ref(), Property::Ec)?,
            esp: r.optional(chemical.esp.as_ref(), Property::Esp)?,
            cec: r.optional(chemical.cec.as_ref(), Property::Cec)?,
        })
    }

    /// Water comes out volumetric on the canonical layers. A fraction of
    /// plant-available water is resolved against the canonical LL15 and DUL.
    fn remap_water(
        &self,
        water: &Water,
        physical: &Physical,
        target: &LayerGeometry,
    ) -> Result<Water, StructureError> {
        let volumetric = match &water.initial {
            WaterInitial::Volumetric(values) => SubProfileRemap {
                remapper: self.remapper(),
                sub_profile: &water.name,
                source: &water.thickness,
                target,
            }
            .values(values, Property::Volumetric)?,
            WaterInitial::FractionFull(fraction) => physical
                .ll15
                .iter()
                .zip(&physical.dul)
                .map(|(ll15, dul)| ll15 + fraction * (dul - ll15))
                .collect(),
        };
        Ok(Water {
            name: water.name.clone(),
            thickness: target.clone(),
            initial: WaterInitial::Volumetric(volumetric),
        })
    }

    /// Move one solute onto the canonical layers through the area-mass basis.
    fn convert_solute(
        &self,
        solute: &Solute,
        physical: &Physical,
        canonical: &Physical,
        target: &LayerGeometry,
    ) -> Result<StandardisedSolute, SoilError> {
        let name = solute.name.as_str();
        let units = solute
            .units
            .parse()
            .ok_or_else(|| UnitError::UnrecognisedUnit {
                solute: name.to_string(),
                tag: solute.units.as_str().to_string(),
            })?;

        // A shallow solute gets one unmeasured layer down to the canonical
        // depth so its fill policy applies there in ppm, like any other gap.
        let (native, values) = match solute.thickness.extended_to(target.total_depth()) {
            Some(padded) => {
                let mut values = solute.initial_values.clone();
                values.push(f64::NAN);
                (padded, values)
            }
            None => (solute.thickness.clone(), solute.initial_values.clone()),
        };

        let remapper = self.remapper();
        let bd = remapper
            .remap_property(&physical.bd, &physical.thickness, &native, Property::BulkDensity)
            .map_err(|e| structure_error(&physical.name, e))?;

        let concentration = match units {
            SoluteUnits::MassFraction => values,
            SoluteUnits::AreaMass => self
                .converter
                .to_concentration(&values, &native, &bd)
                .map_err(|e| conversion_error(name, e))?,
        };
        let fill = self.config.fill_policies.policy(FillKey::Solute(name));
        let concentration =
            fill_gaps(&concentration, fill).ok_or_else(|| StructureError::NoData {
                sub_profile: name.to_string(),
                property: Property::SoluteConcentration,
            })?;
        let native_mass = self
            .converter
            .to_area_mass(&concentration, &native, &bd)
            .map_err(|e| conversion_error(name, e))?;

        debug!("Remapping {}.{}", name, Property::SoluteAreaMass);
        let area_mass = remapper
            .remap_property(&native_mass, &native, target, Property::SoluteAreaMass)
            .map_err(|e| structure_error(name, e))?;

        let native_total: f64 = native_mass.iter().sum();
        let dropped = native_total - area_mass.iter().sum::<f64>();
        if dropped > MASS_TOLERANCE * native_total.abs().max(1.0) {
            warn!(
                "Solute '{}' extends below the canonical profile ({} > {}), dropping {:.4} kg/ha",
                name,
                native.total_depth(),
                target.total_depth(),
                dropped
            );
        }

        let concentration = self
            .converter
            .to_concentration(&area_mass, target, &canonical.bd)
            .map_err(|e| conversion_error(name, e))?;

        Ok(StandardisedSolute {
            name: name.to_string(),
            area_mass,
            concentration,
        })
    }
}

/// Standardise one soil with the default configuration.
///
/// # Errors
///
/// See [`SoilStandardiser::standardise`].
pub fn standardise(soil: &SoilProfile) -> Result<Outcome, StandardiseError> {
    SoilStandardiser::default().standardise(soil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn geom(t: &[f64]) -> LayerGeometry {
        LayerGeometry::new(t.to_vec()).unwrap()
    }

    fn physical() -> Physical {
        Physical::new(
            geom(&[100.0, 200.0]),
            vec![1.36, 1.216],
            vec![0.135, 0.214],
            vec![0.27, 0.267],
            vec![0.365, 0.461],
            vec![0.4, 0.481],
        )
    }

    fn soil() -> SoilProfile {
        SoilProfile::new("Simple")
            .with_physical(physical())
            .with_organic(Organic::new(geom(&[100.0, 200.0])).with_carbon(vec![2.0, 0.9]))
            .with_water(Water::volumetric(geom(&[100.0, 200.0]), vec![0.1, 0.2]))
    }

    #[test]
    fn test_default_config() {
        let config = StandardiserConfig::default();
        assert_eq!(config.area_mass_factor, AREA_MASS_FACTOR);
        let config = config.with_fill_policy(FillKey::Property(Property::Ph), FillPolicy::CarryLast);
        assert_eq!(
            config.fill_policies.policy(FillKey::Property(Property::Ph)),
            FillPolicy::CarryLast
        );
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: StandardiserConfig =
            serde_json::from_str(r#"{"fill_policies": {"properties": {"Ph": "CarryLast"}}}"#)
                .unwrap();
        assert_eq!(config.area_mass_factor, AREA_MASS_FACTOR);
        let table = &config.fill_policies;
        assert_eq!(table.policy(FillKey::Property(Property::Ph)), FillPolicy::CarryLast);
        assert_eq!(table.policy(FillKey::Solute("NO3")), FillPolicy::FixedDefault(1.0));
        assert_eq!(table.policy(FillKey::Solute("NH4")), FillPolicy::FixedDefault(0.2));

        let config: StandardiserConfig = serde_json::from_str(
            r#"{"fill_policies": {"solutes": {"NO3": {"FixedDefault": 2.0}}}}"#,
        )
        .unwrap();
        let table = &config.fill_policies;
        assert_eq!(table.policy(FillKey::Solute("NO3")), FillPolicy::FixedDefault(2.0));
        assert_eq!(
            table.policy(FillKey::Property(Property::Ph)),
            FillPolicy::FixedDefault(7.0)
        );
    }

    #[test]
    fn test_fraction_full_water() {
        let soil = SoilProfile::new("Half")
            .with_physical(physical())
            .with_organic(Organic::new(geom(&[300.0])))
            .with_water(Water::fraction_full(geom(&[300.0]), 0.5));
        let out = standardise(&soil).unwrap().into_soil().unwrap();
        let sw = out.water.volumetric_values().unwrap();
        assert_relative_eq!(sw[0], 0.3175, epsilon = 1e-12);
        assert_relative_eq!(sw[1], 0.364, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_physical_fails_at_remap() {
        let soil = SoilProfile::new("NoPhysical")
            .with_layer_structure(geom(&[100.0]))
            .with_organic(Organic::new(geom(&[100.0])))
            .with_water(Water::volumetric(geom(&[100.0]), vec![0.2]));
        let err = standardise(&soil).unwrap_err();
        assert_eq!(err.stage, Stage::RemapAll);
        assert_eq!(
            err.structure(),
            Some(&StructureError::MissingSubProfile {
                soil: "NoPhysical".to_string(),
                kind: SubProfileKind::Physical
            })
        );
    }

    #[test]
    fn test_unrecognised_unit_fails_at_convert() {
        let soil = soil().with_solute(Solute::new("CL", geom(&[100.0]), vec![3.0], "g/m2"));
        let err = standardise(&soil).unwrap_err();
        assert_eq!(err.stage, Stage::ConvertUnits);
        assert_eq!(
            err.unit(),
            Some(&UnitError::UnrecognisedUnit {
                solute: "CL".to_string(),
                tag: "g/m2".to_string()
            })
        );
    }

    #[test]
    fn test_zero_bulk_density_fails_at_convert() {
        let mut p = physical();
        p.bd = vec![1.36, 0.0];
        let soil = SoilProfile::new("Void")
            .with_physical(p)
            .with_organic(Organic::new(geom(&[300.0])))
            .with_water(Water::fraction_full(geom(&[300.0]), 1.0))
            .with_solute(Solute::new("NO3", geom(&[100.0, 200.0]), vec![1.0, 1.0], "ppm"));
        let err = standardise(&soil).unwrap_err();
        assert_eq!(err.stage, Stage::ConvertUnits);
        assert_eq!(
            err.unit(),
            Some(&UnitError::BulkDensityUnavailable {
                solute: "NO3".to_string(),
                layer: 1
            })
        );
    }

    #[test]
    fn test_deep_solute_mass_is_dropped() {
        let soil = soil().with_solute(Solute::new(
            "NO3",
            geom(&[300.0, 300.0]),
            vec![10.0, 10.0],
            "kgha",
        ));
        let out = standardise(&soil).unwrap().into_soil().unwrap();
        let no3 = out.solute("NO3").unwrap();
        // Canonical profile is 300 mm: only the first native layer remains
        assert_relative_eq!(no3.total_area_mass(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_custom_area_mass_factor() {
        let config = StandardiserConfig::default().with_area_mass_factor(1.0);
        let standardiser = SoilStandardiser::new(config);
        let soil = soil().with_solute(Solute::new(
            "Br",
            geom(&[100.0, 200.0]),
            vec![1.0, 1.0],
            "ppm",
        ));
        let out = standardiser.standardise(&soil).unwrap().into_soil().unwrap();
        assert_relative_eq!(out.solute("Br").unwrap().area_mass[0], 136.0, epsilon = 1e-9);
    }
}
