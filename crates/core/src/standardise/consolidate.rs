//! Reduce remapped sub-profiles to one instance per kind.
//!
//! Everything arriving here is already on the canonical geometry. Several
//! Organic or Chemical definitions are overlaid in authoring order, so a
//! property measured by a later definition replaces the earlier one and
//! properties it leaves out are kept. Water is volumetric by now and the last
//! definition wins outright.

use rustc_hash::FxHashMap;
use tracing::warn;

use super::error::StructureError;
use crate::core_types::{FillKey, FillPolicy, FillPolicyTable, LayerGeometry, Property};
use crate::soil::{
    Chemical, InitialConditions, Organic, Physical, StandardisedSoil, StandardisedSolute,
    SubProfileKind, Water,
};

/// Sub-profiles after `RemapAll`, all on the canonical geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct RemappedProfiles {
    /// Physical properties
    pub physical: Physical,
    /// Organic definitions, authoring order
    pub organic: Vec<Organic>,
    /// Chemical definitions, authoring order
    pub chemical: Vec<Chemical>,
    /// Water definitions as volumetric content, authoring order
    pub water: Vec<Water>,
}

/// Builds the [`StandardisedSoil`] and its initial conditions.
#[derive(Debug, Clone, Copy)]
pub struct Consolidator<'a> {
    table: &'a FillPolicyTable,
}

fn overlay(slot: &mut Option<Vec<f64>>, later: Option<Vec<f64>>) {
    if later.is_some() {
        *slot = later;
    }
}

impl<'a> Consolidator<'a> {
    /// Create a consolidator completing absent properties from `table`
    #[must_use]
    pub fn new(table: &'a FillPolicyTable) -> Self {
        Self { table }
    }

    /// Merge everything into one standardised soil.
    ///
    /// # Errors
    ///
    /// [`StructureError::MissingSubProfile`] when no Organic or no Water
    /// definition was authored.
    pub fn consolidate(
        &self,
        soil: &str,
        geometry: &LayerGeometry,
        remapped: RemappedProfiles,
        solutes: Vec<StandardisedSolute>,
    ) -> Result<StandardisedSoil, StructureError> {
        let RemappedProfiles {
            physical,
            organic,
            chemical,
            mut water,
        } = remapped;

        let missing = |kind| StructureError::MissingSubProfile {
            soil: soil.to_string(),
            kind,
        };

        let organic = self
            .merge_organic(geometry, organic)
            .ok_or_else(|| missing(SubProfileKind::Organic))?;
        let water = water
            .pop()
            .ok_or_else(|| missing(SubProfileKind::Water))?;
        let chemical = self.merge_chemical(soil, geometry, chemical);
        let solutes = merge_solutes(solutes);

        let initial_conditions = InitialConditions {
            thickness: geometry.clone(),
            water: water.volumetric_values().map(<[f64]>::to_vec).unwrap_or_default(),
            solutes: solutes.clone(),
            chemical: chemical.clone(),
        };

        Ok(StandardisedSoil {
            name: soil.to_string(),
            geometry: geometry.clone(),
            physical,
            organic,
            chemical,
            water,
            solutes,
            initial_conditions,
        })
    }

    fn merge_organic(&self, geometry: &LayerGeometry, all: Vec<Organic>) -> Option<Organic> {
        let mut all = all.into_iter();
        let mut merged = all.next()?;
        for later in all {
            merged.name = later.name;
            overlay(&mut merged.carbon, later.carbon);
            overlay(&mut merged.carbon_n_ratio, later.carbon_n_ratio);
            overlay(&mut merged.fbiom, later.fbiom);
            overlay(&mut merged.finert, later.finert);
            overlay(&mut merged.fom, later.fom);
        }

        let n = geometry.layer_count();
        self.complete(&mut merged.carbon, Property::Carbon, n);
        self.complete(&mut merged.carbon_n_ratio, Property::CarbonNRatio, n);
        self.complete(&mut merged.fbiom, Property::FBiom, n);
        self.complete(&mut merged.finert, Property::FInert, n);
        self.complete(&mut merged.fom, Property::Fom, n);
        Some(merged)
    }

    fn merge_chemical(&self, soil: &str, geometry: &LayerGeometry, all: Vec<Chemical>) -> Chemical {
        let mut all = all.into_iter();
        let mut merged = if let Some(first) = all.next() {
            first
        } else {
            warn!(
                "Soil '{}' has no Chemical sub-profile, synthesising one from fill defaults",
                soil
            );
            Chemical::new(geometry.clone())
        };
        for later in all {
            merged.name = later.name;
            overlay(&mut merged.ph, later.ph);
            overlay(&mut merged.ec, later.ec);
            overlay(&mut merged.esp, later.esp);
            overlay(&mut merged.cec, later.cec);
        }

        let n = geometry.layer_count();
        self.complete(&mut merged.ph, Property::Ph, n);
        self.complete(&mut merged.ec, Property::Ec, n);
        self.complete(&mut merged.esp, Property::Esp, n);
        self.complete(&mut merged.cec, Property::Cec, n);
        merged
    }

    /// An absent property with a reference constant becomes that constant
    /// everywhere; carry-last has nothing to carry and stays absent.
    fn complete(&self, slot: &mut Option<Vec<f64>>, property: Property, layers: usize) {
        if slot.is_some() {
            return;
        }
        if let FillPolicy::FixedDefault(value) = self.table.policy(FillKey::Property(property)) {
            *slot = Some(vec![value; layers]);
        }
    }
}

/// One solute per name, in order of first appearance, later definitions win.
fn merge_solutes(solutes: Vec<StandardisedSolute>) -> Vec<StandardisedSolute> {
    let mut index: FxHashMap<String, usize> = FxHashMap::default();
    let mut merged: Vec<StandardisedSolute> = Vec::with_capacity(solutes.len());
    for solute in solutes {
        if let Some(&i) = index.get(&solute.name) {
            merged[i] = solute;
        } else {
            index.insert(solute.name.clone(), merged.len());
            merged.push(solute);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(t: &[f64]) -> LayerGeometry {
        LayerGeometry::new(t.to_vec()).unwrap()
    }

    fn remapped(g: &LayerGeometry) -> RemappedProfiles {
        RemappedProfiles {
            physical: Physical::new(
                g.clone(),
                vec![1.3, 1.4],
                vec![0.1, 0.1],
                vec![0.2, 0.2],
                vec![0.3, 0.3],
                vec![0.4, 0.4],
            ),
            organic: vec![Organic::new(g.clone()).with_carbon(vec![2.0, 0.9])],
            chemical: Vec::new(),
            water: vec![Water::volumetric(g.clone(), vec![0.1, 0.2])],
        }
    }

    fn solute(name: &str, kgha: f64) -> StandardisedSolute {
        StandardisedSolute {
            name: name.to_string(),
            area_mass: vec![kgha, kgha],
            concentration: vec![kgha, kgha],
        }
    }

    #[test]
    fn test_missing_chemical_is_synthesised() {
        let g = geom(&[100.0, 200.0]);
        let table = FillPolicyTable::default();
        let soil = Consolidator::new(&table)
            .consolidate("S", &g, remapped(&g), Vec::new())
            .unwrap();
        assert_eq!(soil.chemical.ph, Some(vec![7.0, 7.0]));
        assert_eq!(soil.chemical.ec, None);
        assert_eq!(soil.organic.fom, Some(vec![0.0, 0.0]));
        assert_eq!(soil.organic.fbiom, None);
        assert_eq!(soil.initial_conditions.chemical, soil.chemical);
    }

    #[test]
    fn test_later_definitions_overlay_earlier() {
        let g = geom(&[100.0, 200.0]);
        let mut profiles = remapped(&g);
        profiles.organic.push(Organic::new(g.clone()).with_fbiom(vec![0.04, 0.02]));
        profiles.organic.push(Organic::new(g.clone()).with_carbon(vec![1.5, 0.5]));
        profiles.chemical = vec![
            Chemical::new(g.clone()).with_ph(vec![6.0, 6.5]).with_ec(vec![100.0, 200.0]),
            Chemical::new(g.clone()).with_ph(vec![8.0, 8.0]),
        ];
        profiles
            .water
            .push(Water::volumetric(g.clone(), vec![0.3, 0.3]));

        let table = FillPolicyTable::default();
        let soil = Consolidator::new(&table)
            .consolidate("S", &g, profiles, Vec::new())
            .unwrap();
        assert_eq!(soil.organic.carbon, Some(vec![1.5, 0.5]));
        assert_eq!(soil.organic.fbiom, Some(vec![0.04, 0.02]));
        assert_eq!(soil.chemical.ph, Some(vec![8.0, 8.0]));
        assert_eq!(soil.chemical.ec, Some(vec![100.0, 200.0]));
        assert_eq!(soil.water.volumetric_values(), Some(&[0.3, 0.3][..]));
        assert_eq!(soil.initial_conditions.water, vec![0.3, 0.3]);
    }

    #[test]
    fn test_solutes_deduplicated_in_first_appearance_order() {
        let g = geom(&[100.0, 200.0]);
        let table = FillPolicyTable::default();
        let soil = Consolidator::new(&table)
            .consolidate(
                "S",
                &g,
                remapped(&g),
                vec![solute("NO3", 1.0), solute("NH4", 2.0), solute("NO3", 3.0)],
            )
            .unwrap();
        let names: Vec<_> = soil.solutes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["NO3", "NH4"]);
        assert_eq!(soil.solute("NO3").unwrap().area_mass, vec![3.0, 3.0]);
        assert_eq!(soil.initial_conditions.solute("NH4"), Some(&[2.0, 2.0][..]));
    }

    #[test]
    fn test_missing_organic_or_water() {
        let g = geom(&[100.0, 200.0]);
        let table = FillPolicyTable::default();
        let consolidator = Consolidator::new(&table);

        let mut profiles = remapped(&g);
        profiles.organic.clear();
        assert_eq!(
            consolidator.consolidate("S", &g, profiles, Vec::new()),
            Err(StructureError::MissingSubProfile {
                soil: "S".to_string(),
                kind: SubProfileKind::Organic
            })
        );

        let mut profiles = remapped(&g);
        profiles.water.clear();
        assert_eq!(
            consolidator.consolidate("S", &g, profiles, Vec::new()),
            Err(StructureError::MissingSubProfile {
                soil: "S".to_string(),
                kind: SubProfileKind::Water
            })
        );
    }
}
