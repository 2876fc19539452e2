//! Authored soil sub-profiles.
//!
//! Each sub-profile is defined on its own [`LayerGeometry`]. Nothing here
//! checks that arrays match their geometry; that is the standardiser's
//! `Validate` stage, so a disabled soil can carry inconsistent data without
//! failing a run.

use serde::{Deserialize, Serialize};

use crate::core_types::{LayerGeometry, Property};

/// JSON has no NaN; `null` marks a missing layer value and reads back as NaN.
mod missing {
    use serde::{Deserialize, Deserializer};

    fn restore(raw: Vec<Option<f64>>) -> Vec<f64> {
        raw.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }

    pub(super) fn values<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<f64>, D::Error> {
        Vec::<Option<f64>>::deserialize(deserializer).map(restore)
    }

    pub(super) fn optional_values<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<f64>>, D::Error> {
        Option::<Vec<Option<f64>>>::deserialize(deserializer).map(|raw| raw.map(restore))
    }
}

/// Kinds of sub-profile a soil can own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubProfileKind {
    /// Reference layering plus density and water retention
    Physical,
    /// Organic matter
    Organic,
    /// Chemistry (pH, salinity, sodicity)
    Chemical,
    /// Initial water
    Water,
    /// A named solute
    Solute,
    /// Explicit override of the canonical layering
    LayerStructure,
}

impl std::fmt::Display for SubProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SubProfileKind::Physical => "Physical",
            SubProfileKind::Organic => "Organic",
            SubProfileKind::Chemical => "Chemical",
            SubProfileKind::Water => "Water",
            SubProfileKind::Solute => "Solute",
            SubProfileKind::LayerStructure => "LayerStructure",
        };
        f.write_str(name)
    }
}

/// One layered array of a sub-profile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Column<'a> {
    /// Property the values belong to
    pub property: Property,
    /// Crop name for per-crop columns
    pub crop: Option<&'a str>,
    /// One value per layer
    pub values: &'a [f64],
}

impl std::fmt::Display for Column<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.crop {
            Some(crop) => write!(f, "{}.{}", crop, self.property),
            None => write!(f, "{}", self.property),
        }
    }
}

/// Common view over every layered sub-profile.
pub trait SubProfile {
    /// What kind of sub-profile this is
    fn kind(&self) -> SubProfileKind;

    /// Authored name
    fn name(&self) -> &str;

    /// Geometry the arrays are declared on
    fn thickness(&self) -> &LayerGeometry;

    /// Every present layered array
    fn columns(&self) -> Vec<Column<'_>>;
}

fn column(property: Property, values: &[f64]) -> Column<'_> {
    Column {
        property,
        crop: None,
        values,
    }
}

fn optional_column(property: Property, values: Option<&Vec<f64>>) -> Option<Column<'_>> {
    values.map(|v| column(property, v))
}

/// Per-crop water extraction parameters, on the Physical geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoilCrop {
    /// Crop name
    pub name: String,
    /// Crop lower limit (mm/mm)
    #[serde(deserialize_with = "missing::values")]
    pub ll: Vec<f64>,
    /// Extraction coefficient (/day)
    #[serde(deserialize_with = "missing::values")]
    pub kl: Vec<f64>,
    /// Root exploration factor (0-1)
    #[serde(deserialize_with = "missing::values")]
    pub xf: Vec<f64>,
}

impl SoilCrop {
    /// Create crop parameters
    #[must_use]
    pub fn new(name: impl Into<String>, ll: Vec<f64>, kl: Vec<f64>, xf: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            ll,
            kl,
            xf,
        }
    }
}

/// Physical properties. Its geometry is the reference layering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Physical {
    /// Authored name
    pub name: String,
    /// Layer thicknesses (mm)
    pub thickness: LayerGeometry,
    /// Bulk density (g/cm³)
    #[serde(deserialize_with = "missing::values")]
    pub bd: Vec<f64>,
    /// Air-dry water content (mm/mm)
    #[serde(deserialize_with = "missing::values")]
    pub air_dry: Vec<f64>,
    /// Lower limit at 15 bar (mm/mm)
    #[serde(deserialize_with = "missing::values")]
    pub ll15: Vec<f64>,
    /// Drained upper limit (mm/mm)
    #[serde(deserialize_with = "missing::values")]
    pub dul: Vec<f64>,
    /// Saturation (mm/mm)
    #[serde(deserialize_with = "missing::values")]
    pub sat: Vec<f64>,
    /// Saturated conductivity (mm/day)
    #[serde(default, deserialize_with = "missing::optional_values")]
    pub ks: Option<Vec<f64>>,
    /// Per-crop parameters
    #[serde(default)]
    pub crops: Vec<SoilCrop>,
}

impl Physical {
    /// Create physical properties with the mandatory arrays.
    #[must_use]
    pub fn new(
        thickness: LayerGeometry,
        bd: Vec<f64>,
        air_dry: Vec<f64>,
        ll15: Vec<f64>,
        dul: Vec<f64>,
        sat: Vec<f64>,
    ) -> Self {
        Self {
            name: "Physical".to_string(),
            thickness,
            bd,
            air_dry,
            ll15,
            dul,
            sat,
            ks: None,
            crops: Vec::new(),
        }
    }

    /// Set saturated conductivity
    pub fn with_ks(mut self, ks: Vec<f64>) -> Self {
        self.ks = Some(ks);
        self
    }

    /// Add crop parameters
    pub fn with_crop(mut self, crop: SoilCrop) -> Self {
        self.crops.push(crop);
        self
    }

    /// Look up a crop by name
    #[must_use]
    pub fn crop(&self, name: &str) -> Option<&SoilCrop> {
        self.crops.iter().find(|c| c.name == name)
    }
}

impl SubProfile for Physical {
    fn kind(&self) -> SubProfileKind {
        SubProfileKind::Physical
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn thickness(&self) -> &LayerGeometry {
        &self.thickness
    }

    fn columns(&self) -> Vec<Column<'_>> {
        let mut columns = vec![
            column(Property::BulkDensity, &self.bd),
            column(Property::AirDry, &self.air_dry),
            column(Property::Ll15, &self.ll15),
            column(Property::Dul, &self.dul),
            column(Property::Sat, &self.sat),
        ];
        columns.extend(optional_column(Property::Ks, self.ks.as_ref()));
        for crop in &self.crops {
            for (property, values) in [
                (Property::CropLl, &crop.ll),
                (Property::CropKl, &crop.kl),
                (Property::CropXf, &crop.xf),
            ] {
                columns.push(Column {
                    property,
                    crop: Some(crop.name.as_str()),
                    values,
                });
            }
        }
        columns
    }
}

/// Organic matter. Every array is optional so later definitions can
/// override only what they measured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Organic {
    /// Authored name
    pub name: String,
    /// Layer thicknesses (mm)
    pub thickness: LayerGeometry,
    /// Organic carbon (%)
    #[serde(default, deserialize_with = "missing::optional_values")]
    pub carbon: Option<Vec<f64>>,
    /// Carbon to nitrogen ratio
    #[serde(default, deserialize_with = "missing::optional_values")]
    pub carbon_n_ratio: Option<Vec<f64>>,
    /// Microbial biomass fraction (0-1)
    #[serde(default, deserialize_with = "missing::optional_values")]
    pub fbiom: Option<Vec<f64>>,
    /// Inert fraction (0-1)
    #[serde(default, deserialize_with = "missing::optional_values")]
    pub finert: Option<Vec<f64>>,
    /// Fresh organic matter (kg/ha per layer)
    #[serde(default, deserialize_with = "missing::optional_values")]
    pub fom: Option<Vec<f64>>,
}

impl Organic {
    /// Empty organic sub-profile on a geometry
    #[must_use]
    pub fn new(thickness: LayerGeometry) -> Self {
        Self {
            name: "Organic".to_string(),
            thickness,
            carbon: None,
            carbon_n_ratio: None,
            fbiom: None,
            finert: None,
            fom: None,
        }
    }

    /// Set organic carbon
    pub fn with_carbon(mut self, values: Vec<f64>) -> Self {
        self.carbon = Some(values);
        self
    }

    /// Set carbon to nitrogen ratio
    pub fn with_carbon_n_ratio(mut self, values: Vec<f64>) -> Self {
        self.carbon_n_ratio = Some(values);
        self
    }

    /// Set microbial biomass fraction
    pub fn with_fbiom(mut self, values: Vec<f64>) -> Self {
        self.fbiom = Some(values);
        self
    }

    /// Set inert fraction
    pub fn with_finert(mut self, values: Vec<f64>) -> Self {
        self.finert = Some(values);
        self
    }

    /// Set fresh organic matter
    pub fn with_fom(mut self, values: Vec<f64>) -> Self {
        self.fom = Some(values);
        self
    }
}

impl SubProfile for Organic {
    fn kind(&self) -> SubProfileKind {
        SubProfileKind::Organic
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn thickness(&self) -> &LayerGeometry {
        &self.thickness
    }

    fn columns(&self) -> Vec<Column<'_>> {
        [
            optional_column(Property::Carbon, self.carbon.as_ref()),
            optional_column(Property::CarbonNRatio, self.carbon_n_ratio.as_ref()),
            optional_column(Property::FBiom, self.fbiom.as_ref()),
            optional_column(Property::FInert, self.finert.as_ref()),
            optional_column(Property::Fom, self.fom.as_ref()),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Soil chemistry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chemical {
    /// Authored name
    pub name: String,
    /// Layer thicknesses (mm)
    pub thickness: LayerGeometry,
    /// pH (1:5 water)
    #[serde(default, deserialize_with = "missing::optional_values")]
    pub ph: Option<Vec<f64>>,
    /// Electrical conductivity (uS/cm)
    #[serde(default, deserialize_with = "missing::optional_values")]
    pub ec: Option<Vec<f64>>,
    /// Exchangeable sodium percentage (%)
    #[serde(default, deserialize_with = "missing::optional_values")]
    pub esp: Option<Vec<f64>>,
    /// Cation exchange capacity (cmol+/kg)
    #[serde(default, deserialize_with = "missing::optional_values")]
    pub cec: Option<Vec<f64>>,
}

impl Chemical {
    /// Empty chemical sub-profile on a geometry
    #[must_use]
    pub fn new(thickness: LayerGeometry) -> Self {
        Self {
            name: "Chemical".to_string(),
            thickness,
            ph: None,
            ec: None,
            esp: None,
            cec: None,
        }
    }

    /// Set pH
    pub fn with_ph(mut self, values: Vec<f64>) -> Self {
        self.ph = Some(values);
        self
    }

    /// Set electrical conductivity
    pub fn with_ec(mut self, values: Vec<f64>) -> Self {
        self.ec = Some(values);
        self
    }

    /// Set exchangeable sodium percentage
    pub fn with_esp(mut self, values: Vec<f64>) -> Self {
        self.esp = Some(values);
        self
    }

    /// Set cation exchange capacity
    pub fn with_cec(mut self, values: Vec<f64>) -> Self {
        self.cec = Some(values);
        self
    }
}

impl SubProfile for Chemical {
    fn kind(&self) -> SubProfileKind {
        SubProfileKind::Chemical
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn thickness(&self) -> &LayerGeometry {
        &self.thickness
    }

    fn columns(&self) -> Vec<Column<'_>> {
        [
            optional_column(Property::Ph, self.ph.as_ref()),
            optional_column(Property::Ec, self.ec.as_ref()),
            optional_column(Property::Esp, self.esp.as_ref()),
            optional_column(Property::Cec, self.cec.as_ref()),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// How the initial water content was authored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WaterInitial {
    /// Volumetric content per layer (mm/mm)
    Volumetric(#[serde(deserialize_with = "missing::values")] Vec<f64>),
    /// Fraction of plant-available water (0-1), applied to every layer
    FractionFull(f64),
}

/// Initial water.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Water {
    /// Authored name
    pub name: String,
    /// Layer thicknesses (mm)
    pub thickness: LayerGeometry,
    /// Initial content
    pub initial: WaterInitial,
}

impl Water {
    /// Water given as volumetric content per layer
    #[must_use]
    pub fn volumetric(thickness: LayerGeometry, values: Vec<f64>) -> Self {
        Self {
            name: "Water".to_string(),
            thickness,
            initial: WaterInitial::Volumetric(values),
        }
    }

    /// Water given as a fraction of plant-available water
    #[must_use]
    pub fn fraction_full(thickness: LayerGeometry, fraction: f64) -> Self {
        Self {
            name: "Water".to_string(),
            thickness,
            initial: WaterInitial::FractionFull(fraction),
        }
    }

    /// Volumetric values when authored that way
    #[must_use]
    pub fn volumetric_values(&self) -> Option<&[f64]> {
        match &self.initial {
            WaterInitial::Volumetric(values) => Some(values.as_slice()),
            WaterInitial::FractionFull(_) => None,
        }
    }
}

impl SubProfile for Water {
    fn kind(&self) -> SubProfileKind {
        SubProfileKind::Water
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn thickness(&self) -> &LayerGeometry {
        &self.thickness
    }

    fn columns(&self) -> Vec<Column<'_>> {
        self.volumetric_values()
            .map(|values| column(Property::Volumetric, values))
            .into_iter()
            .collect()
    }
}

/// Recognised solute units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoluteUnits {
    /// Mass fraction, ppm (mg/kg)
    MassFraction,
    /// Area mass, kg/ha per layer
    AreaMass,
}

/// Unit tag exactly as authored. Parsed during standardisation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitTag(String);

impl UnitTag {
    /// Tag for mass fraction
    #[must_use]
    pub fn ppm() -> Self {
        Self("ppm".to_string())
    }

    /// Tag for area mass
    #[must_use]
    pub fn kgha() -> Self {
        Self("kgha".to_string())
    }

    /// The authored text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the tag, `None` when it is not a recognised unit.
    #[must_use]
    pub fn parse(&self) -> Option<SoluteUnits> {
        match self.0.trim().to_ascii_lowercase().as_str() {
            "ppm" | "mg/kg" => Some(SoluteUnits::MassFraction),
            "kgha" | "kg/ha" => Some(SoluteUnits::AreaMass),
            _ => None,
        }
    }
}

impl From<&str> for UnitTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<SoluteUnits> for UnitTag {
    fn from(units: SoluteUnits) -> Self {
        match units {
            SoluteUnits::MassFraction => Self::ppm(),
            SoluteUnits::AreaMass => Self::kgha(),
        }
    }
}

/// A named solute with its initial values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Solute {
    /// Solute name (e.g. `NO3`)
    pub name: String,
    /// Layer thicknesses (mm)
    pub thickness: LayerGeometry,
    /// Initial value per layer, NaN where not measured
    #[serde(deserialize_with = "missing::values")]
    pub initial_values: Vec<f64>,
    /// Units of `initial_values`
    pub units: UnitTag,
}

impl Solute {
    /// Create a solute
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        thickness: LayerGeometry,
        initial_values: Vec<f64>,
        units: impl Into<UnitTag>,
    ) -> Self {
        Self {
            name: name.into(),
            thickness,
            initial_values,
            units: units.into(),
        }
    }
}

impl SubProfile for Solute {
    fn kind(&self) -> SubProfileKind {
        SubProfileKind::Solute
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn thickness(&self) -> &LayerGeometry {
        &self.thickness
    }

    fn columns(&self) -> Vec<Column<'_>> {
        vec![column(Property::SoluteConcentration, &self.initial_values)]
    }
}

/// Explicit canonical layering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerStructure {
    /// Layer thicknesses (mm)
    pub thickness: LayerGeometry,
}

/// A soil as authored: flat typed slots, resolved once at standardisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoilProfile {
    /// Soil name
    pub name: String,
    /// Disabled soils are never standardised
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Reference physical properties
    #[serde(default)]
    pub physical: Option<Physical>,
    /// Organic definitions in authoring order
    #[serde(default)]
    pub organic: Vec<Organic>,
    /// Chemical definitions in authoring order
    #[serde(default)]
    pub chemical: Vec<Chemical>,
    /// Water definitions in authoring order
    #[serde(default)]
    pub water: Vec<Water>,
    /// Solutes in authoring order
    #[serde(default)]
    pub solutes: Vec<Solute>,
    /// Canonical layering override
    #[serde(default)]
    pub layer_structure: Option<LayerStructure>,
}

fn enabled_by_default() -> bool {
    true
}

impl SoilProfile {
    /// Empty, enabled soil
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            physical: None,
            organic: Vec::new(),
            chemical: Vec::new(),
            water: Vec::new(),
            solutes: Vec::new(),
            layer_structure: None,
        }
    }

    /// Set the physical sub-profile
    pub fn with_physical(mut self, physical: Physical) -> Self {
        self.physical = Some(physical);
        self
    }

    /// Add an organic definition
    pub fn with_organic(mut self, organic: Organic) -> Self {
        self.organic.push(organic);
        self
    }

    /// Add a chemical definition
    pub fn with_chemical(mut self, chemical: Chemical) -> Self {
        self.chemical.push(chemical);
        self
    }

    /// Add a water definition
    pub fn with_water(mut self, water: Water) -> Self {
        self.water.push(water);
        self
    }

    /// Add a solute
    pub fn with_solute(mut self, solute: Solute) -> Self {
        self.solutes.push(solute);
        self
    }

    /// Override the canonical layering
    pub fn with_layer_structure(mut self, thickness: LayerGeometry) -> Self {
        self.layer_structure = Some(LayerStructure { thickness });
        self
    }

    /// Enable or disable the soil
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Every layered sub-profile present, physical first.
    #[must_use]
    pub fn sub_profiles(&self) -> Vec<&dyn SubProfile> {
        let mut all: Vec<&dyn SubProfile> = Vec::new();
        if let Some(physical) = &self.physical {
            all.push(physical);
        }
        all.extend(self.organic.iter().map(|o| o as &dyn SubProfile));
        all.extend(self.chemical.iter().map(|c| c as &dyn SubProfile));
        all.extend(self.water.iter().map(|w| w as &dyn SubProfile));
        all.extend(self.solutes.iter().map(|s| s as &dyn SubProfile));
        all
    }
}
