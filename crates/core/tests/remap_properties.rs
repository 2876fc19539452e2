//! Conservation, idempotence and round-trip checks over randomised layerings
use approx::assert_relative_eq;
use ctor::ctor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use soil_std_core::standardise::{remap, UnitConverter};
use soil_std_core::{
    standardise, Chemical, FillPolicy, LayerGeometry, Organic, Physical, Property, SoilProfile,
    Solute, Water,
};
use tracing_subscriber::EnvFilter;

#[ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const CASES: usize = 200;

/// Random layering of `layers` layers summing to `depth`.
fn random_geometry(rng: &mut StdRng, layers: usize, depth: f64) -> LayerGeometry {
    let weights: Vec<f64> = (0..layers).map(|_| rng.random_range(0.1..1.0)).collect();
    let total: f64 = weights.iter().sum();
    LayerGeometry::new(weights.iter().map(|w| w / total * depth).collect::<Vec<_>>()).unwrap()
}

fn random_values(rng: &mut StdRng, n: usize, lo: f64, hi: f64) -> Vec<f64> {
    (0..n).map(|_| rng.random_range(lo..hi)).collect()
}

#[test]
fn test_extensive_remap_conserves_sum() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..CASES {
        let depth = rng.random_range(100.0..2000.0);
        let (source_layers, target_layers) = (rng.random_range(1..8), rng.random_range(1..12));
        let source = random_geometry(&mut rng, source_layers, depth);
        let target = random_geometry(&mut rng, target_layers, depth);
        let values = random_values(&mut rng, source.layer_count(), 0.0, 100.0);

        let out = remap(
            &values,
            &source,
            &target,
            Property::Fom.semantics(),
            FillPolicy::FixedDefault(0.0),
        )
        .unwrap();

        assert_eq!(out.len(), target.layer_count());
        let before: f64 = values.iter().sum();
        let after: f64 = out.iter().sum();
        assert_relative_eq!(before, after, max_relative = 1e-9);
    }
}

#[test]
fn test_intensive_remap_stays_within_source_range() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..CASES {
        let depth = rng.random_range(100.0..2000.0);
        let (source_layers, target_layers) = (rng.random_range(1..8), rng.random_range(1..12));
        let source = random_geometry(&mut rng, source_layers, depth);
        let target = random_geometry(&mut rng, target_layers, depth);
        let values = random_values(&mut rng, source.layer_count(), 0.9, 1.8);

        let out = remap(
            &values,
            &source,
            &target,
            Property::BulkDensity.semantics(),
            FillPolicy::CarryLast,
        )
        .unwrap();

        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for v in out {
            assert!(v >= lo - 1e-9 && v <= hi + 1e-9, "{v} outside [{lo}, {hi}]");
        }
    }
}

#[test]
fn test_unit_round_trip() {
    let mut rng = StdRng::seed_from_u64(3);
    let converter = UnitConverter::default();
    for _ in 0..CASES {
        let n = rng.random_range(1..10);
        let depth = rng.random_range(100.0..2000.0);
        let geometry = random_geometry(&mut rng, n, depth);
        let bd = random_values(&mut rng, n, 0.8, 1.9);
        let ppm = random_values(&mut rng, n, 0.0, 50.0);

        let kgha = converter.to_area_mass(&ppm, &geometry, &bd).unwrap();
        let back = converter.to_concentration(&kgha, &geometry, &bd).unwrap();
        for (a, b) in back.iter().zip(&ppm) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9, max_relative = 1e-12);
        }
    }
}

/// A soil with every sub-profile already on `geometry`.
fn canonical_soil(rng: &mut StdRng, geometry: &LayerGeometry) -> SoilProfile {
    let n = geometry.layer_count();
    let ll15 = random_values(rng, n, 0.05, 0.2);
    let dul: Vec<f64> = ll15.iter().map(|ll| ll + 0.15).collect();
    let sat: Vec<f64> = dul.iter().map(|d| d + 0.05).collect();
    SoilProfile::new("Canonical")
        .with_physical(Physical::new(
            geometry.clone(),
            random_values(rng, n, 0.9, 1.7),
            random_values(rng, n, 0.01, 0.05),
            ll15,
            dul,
            sat,
        ))
        .with_organic(
            Organic::new(geometry.clone())
                .with_carbon(random_values(rng, n, 0.1, 3.0))
                .with_fom(random_values(rng, n, 0.0, 500.0)),
        )
        .with_chemical(Chemical::new(geometry.clone()).with_ph(random_values(rng, n, 5.0, 8.5)))
        .with_water(Water::volumetric(geometry.clone(), random_values(rng, n, 0.1, 0.3)))
        .with_solute(Solute::new(
            "NO3",
            geometry.clone(),
            random_values(rng, n, 0.0, 40.0),
            "kgha",
        ))
}

#[test]
fn test_canonical_soil_is_unchanged() {
    let mut rng = StdRng::seed_from_u64(19);
    for _ in 0..50 {
        let n = rng.random_range(1..8);
        let depth = rng.random_range(300.0..1500.0);
        let geometry = random_geometry(&mut rng, n, depth);
        let authored = canonical_soil(&mut rng, &geometry);
        let out = standardise(&authored).unwrap().into_soil().unwrap();

        let physical = authored.physical.as_ref().unwrap();
        assert_eq!(out.geometry, geometry);
        assert_eq!(out.physical.bd, physical.bd);
        assert_eq!(out.physical.dul, physical.dul);
        assert_eq!(out.organic.carbon, authored.organic[0].carbon);
        assert_eq!(out.chemical.ph, authored.chemical[0].ph);
        assert_eq!(
            out.water.volumetric_values(),
            authored.water[0].volumetric_values()
        );

        let fom_before: f64 = authored.organic[0].fom.iter().flatten().sum();
        let fom_after: f64 = out.organic.fom.iter().flatten().sum();
        assert_relative_eq!(fom_before, fom_after, max_relative = 1e-12);

        let no3 = out.solute("NO3").unwrap();
        for (a, b) in no3.area_mass.iter().zip(&authored.solutes[0].initial_values) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9, max_relative = 1e-9);
        }
    }
}

#[test]
fn test_solute_mass_conserved_across_layerings() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..50 {
        let depth = rng.random_range(300.0..1500.0);
        let (layers, solute_layers) = (rng.random_range(1..8), rng.random_range(1..8));
        let geometry = random_geometry(&mut rng, layers, depth);
        let solute_geometry = random_geometry(&mut rng, solute_layers, depth);
        let kgha = random_values(&mut rng, solute_geometry.layer_count(), 0.0, 40.0);

        let mut soil = canonical_soil(&mut rng, &geometry);
        soil.solutes = vec![Solute::new("Br", solute_geometry, kgha.clone(), "kg/ha")];
        let out = standardise(&soil).unwrap().into_soil().unwrap();

        let br = out.solute("Br").unwrap();
        assert_eq!(br.area_mass.len(), geometry.layer_count());
        assert_relative_eq!(
            br.total_area_mass(),
            kgha.iter().sum::<f64>(),
            max_relative = 1e-9
        );
    }
}

#[test]
fn test_single_instance_per_kind() {
    let mut rng = StdRng::seed_from_u64(29);
    let geometry = random_geometry(&mut rng, 4, 800.0);
    let other = random_geometry(&mut rng, 3, 500.0);

    let soil = canonical_soil(&mut rng, &geometry)
        .with_organic(Organic::new(other.clone()).with_fbiom(vec![0.04, 0.02, 0.01]))
        .with_chemical(Chemical::new(other.clone()).with_ec(vec![100.0, 150.0, 200.0]))
        .with_water(Water::fraction_full(other.clone(), 0.5))
        .with_solute(Solute::new("NH4", other.clone(), vec![1.0, 0.5, 0.1], "ppm"))
        .with_solute(Solute::new("NO3", other, vec![9.0, 4.0, 1.0], "ppm"));

    let out = standardise(&soil).unwrap().into_soil().unwrap();
    assert_eq!(out.organic.thickness, geometry);
    assert_eq!(out.chemical.thickness, geometry);
    assert_eq!(out.water.thickness, geometry);
    assert!(out.organic.carbon.is_some());
    assert!(out.organic.fbiom.is_some());
    assert!(out.chemical.ph.is_some());
    assert!(out.chemical.ec.is_some());

    let names: Vec<_> = out.solutes.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["NO3", "NH4"]);
    for solute in &out.solutes {
        assert_eq!(solute.area_mass.len(), geometry.layer_count());
        assert_eq!(solute.concentration.len(), geometry.layer_count());
    }
}
