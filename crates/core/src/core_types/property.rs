//! Layered property identities, remap semantics and gap-fill policies.
//!
//! Whether a property is averaged or conserved when layers change is decided
//! here, once, by [`Property::semantics`]. Call sites never choose.
//!
//! The fill-policy table is domain-curated compatibility data: which
//! properties repeat their deepest reading below the measured profile and
//! which fall back to a reference constant. It is kept as data
//! ([`COMPATIBILITY_TABLE`], [`SOLUTE_DEFAULTS`]) so it can be audited and
//! overridden through [`FillPolicyTable`].

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Every layered property the standardiser knows how to remap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Property {
    /// Bulk density (g/cm³)
    BulkDensity,
    /// Air-dry water content (mm/mm)
    AirDry,
    /// Lower limit at 15 bar (mm/mm)
    Ll15,
    /// Drained upper limit (mm/mm)
    Dul,
    /// Saturated water content (mm/mm)
    Sat,
    /// Saturated hydraulic conductivity (mm/day)
    Ks,
    /// Crop lower limit (mm/mm)
    CropLl,
    /// Crop water extraction coefficient (/day)
    CropKl,
    /// Crop root exploration factor (0-1)
    CropXf,
    /// Organic carbon (%)
    Carbon,
    /// Soil carbon to nitrogen ratio
    CarbonNRatio,
    /// Fraction of humic carbon that is microbial biomass (0-1)
    FBiom,
    /// Fraction of humic carbon that is inert (0-1)
    FInert,
    /// Fresh organic matter (kg/ha per layer)
    Fom,
    /// Acidity (pH units)
    Ph,
    /// Electrical conductivity (uS/cm)
    Ec,
    /// Exchangeable sodium percentage (%)
    Esp,
    /// Cation exchange capacity (cmol+/kg)
    Cec,
    /// Initial volumetric water content (mm/mm)
    Volumetric,
    /// Solute concentration (ppm, mg/kg)
    SoluteConcentration,
    /// Solute area mass (kg/ha per layer)
    SoluteAreaMass,
}

impl Property {
    /// Remap semantics, fixed per property.
    #[must_use]
    pub const fn semantics(self) -> Semantics {
        match self {
            Property::Fom | Property::SoluteAreaMass => Semantics::Extensive(self),
            _ => Semantics::Intensive(self),
        }
    }

    /// Field name used in diagnostics
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Property::BulkDensity => "bd",
            Property::AirDry => "air_dry",
            Property::Ll15 => "ll15",
            Property::Dul => "dul",
            Property::Sat => "sat",
            Property::Ks => "ks",
            Property::CropLl => "ll",
            Property::CropKl => "kl",
            Property::CropXf => "xf",
            Property::Carbon => "carbon",
            Property::CarbonNRatio => "carbon_n_ratio",
            Property::FBiom => "fbiom",
            Property::FInert => "finert",
            Property::Fom => "fom",
            Property::Ph => "ph",
            Property::Ec => "ec",
            Property::Esp => "esp",
            Property::Cec => "cec",
            Property::Volumetric => "volumetric",
            Property::SoluteConcentration => "concentration",
            Property::SoluteAreaMass => "area_mass",
        }
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a property behaves when layers are split or merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Semantics {
    /// Per-unit-depth quantity: depth-weighted average
    Intensive(Property),
    /// Depth-integrated quantity: split proportionally, sum conserved
    Extensive(Property),
}

impl Semantics {
    /// The property this semantics belongs to
    #[must_use]
    pub const fn property(self) -> Property {
        match self {
            Semantics::Intensive(p) | Semantics::Extensive(p) => p,
        }
    }
}

/// Value assigned to a layer that has no corresponding source data.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FillPolicy {
    /// Repeat the deepest available reading
    CarryLast,
    /// Use a declared reference constant
    FixedDefault(f64),
}

/// Identity a fill policy is looked up by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillKey<'a> {
    /// A named property
    Property(Property),
    /// Concentration of the named solute
    Solute(&'a str),
}

/// Compatibility fill policies per property.
pub const COMPATIBILITY_TABLE: [(Property, FillPolicy); 21] = [
    (Property::BulkDensity, FillPolicy::CarryLast),
    (Property::AirDry, FillPolicy::CarryLast),
    (Property::Ll15, FillPolicy::CarryLast),
    (Property::Dul, FillPolicy::CarryLast),
    (Property::Sat, FillPolicy::CarryLast),
    (Property::Ks, FillPolicy::CarryLast),
    (Property::CropLl, FillPolicy::CarryLast),
    (Property::CropKl, FillPolicy::FixedDefault(0.0)),
    (Property::CropXf, FillPolicy::FixedDefault(0.0)),
    (Property::Carbon, FillPolicy::CarryLast),
    (Property::CarbonNRatio, FillPolicy::CarryLast),
    (Property::FBiom, FillPolicy::CarryLast),
    (Property::FInert, FillPolicy::CarryLast),
    (Property::Fom, FillPolicy::FixedDefault(0.0)),
    (Property::Ph, FillPolicy::FixedDefault(7.0)),
    (Property::Ec, FillPolicy::CarryLast),
    (Property::Esp, FillPolicy::CarryLast),
    (Property::Cec, FillPolicy::CarryLast),
    (Property::Volumetric, FillPolicy::CarryLast),
    (Property::SoluteConcentration, FillPolicy::FixedDefault(0.0)),
    (Property::SoluteAreaMass, FillPolicy::FixedDefault(0.0)),
];

/// Background concentrations (ppm) for named solutes below their measured depth.
pub const SOLUTE_DEFAULTS: [(&str, FillPolicy); 3] = [
    ("NO3", FillPolicy::FixedDefault(1.0)),
    ("NH4", FillPolicy::FixedDefault(0.2)),
    ("Urea", FillPolicy::FixedDefault(0.0)),
];

fn compatibility_policy(property: Property) -> FillPolicy {
    COMPATIBILITY_TABLE
        .iter()
        .find(|(p, _)| *p == property)
        .map_or(FillPolicy::CarryLast, |(_, policy)| *policy)
}

/// Fill policies keyed by property identity.
///
/// Solutes without an entry of their own use the
/// [`Property::SoluteConcentration`] entry. A deserialised table is the
/// compatibility defaults with the listed entries replaced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "FillPolicyOverrides")]
pub struct FillPolicyTable {
    properties: FxHashMap<Property, FillPolicy>,
    solutes: FxHashMap<String, FillPolicy>,
}

/// Entries read from configuration, applied over the defaults.
#[derive(Deserialize)]
struct FillPolicyOverrides {
    #[serde(default)]
    properties: FxHashMap<Property, FillPolicy>,
    #[serde(default)]
    solutes: FxHashMap<String, FillPolicy>,
}

impl From<FillPolicyOverrides> for FillPolicyTable {
    fn from(overrides: FillPolicyOverrides) -> Self {
        let mut table = Self::default();
        table.properties.extend(overrides.properties);
        table.solutes.extend(overrides.solutes);
        table
    }
}

impl Default for FillPolicyTable {
    fn default() -> Self {
        Self {
            properties: COMPATIBILITY_TABLE.into_iter().collect(),
            solutes: SOLUTE_DEFAULTS
                .into_iter()
                .map(|(name, policy)| (name.to_string(), policy))
                .collect(),
        }
    }
}

impl FillPolicyTable {
    /// Policy for a property or solute.
    #[must_use]
    pub fn policy(&self, key: FillKey<'_>) -> FillPolicy {
        match key {
            FillKey::Property(property) => self
                .properties
                .get(&property)
                .copied()
                .unwrap_or_else(|| compatibility_policy(property)),
            FillKey::Solute(name) => self.solutes.get(name).copied().unwrap_or_else(|| {
                self.policy(FillKey::Property(Property::SoluteConcentration))
            }),
        }
    }

    /// Replace one entry.
    pub fn set(&mut self, key: FillKey<'_>, policy: FillPolicy) {
        match key {
            FillKey::Property(property) => {
                self.properties.insert(property, policy);
            }
            FillKey::Solute(name) => {
                self.solutes.insert(name.to_string(), policy);
            }
        }
    }

    /// Property entries sorted by property, for auditing.
    #[must_use]
    pub fn property_entries(&self) -> Vec<(Property, FillPolicy)> {
        let mut entries: Vec<_> = self.properties.iter().map(|(p, f)| (*p, *f)).collect();
        entries.sort_by_key(|(p, _)| *p);
        entries
    }

    /// Solute entries sorted by name, for auditing.
    #[must_use]
    pub fn solute_entries(&self) -> Vec<(&str, FillPolicy)> {
        let mut entries: Vec<_> = self
            .solutes
            .iter()
            .map(|(name, f)| (name.as_str(), *f))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }
}
