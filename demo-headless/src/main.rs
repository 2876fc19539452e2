use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use soil_std_core::{
    Chemical, LayerGeometry, Organic, Outcome, Physical, SoilCrop, SoilProfile, SoilStandardiser,
    Solute, StandardisedSoil, StandardiserConfig, Water,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Built-in soils for trying the standardiser without input files
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Preset {
    /// Two layers; chemistry and solutes authored on thinner layers
    Simple,
    /// Three physical layers; organic, water and solutes on other layerings
    Deep,
    /// As `deep`, with an explicit two-layer structure
    Override,
}

/// Standardise soils onto their canonical layering and print the result
#[derive(Parser, Debug)]
#[command(name = "soil-std-demo")]
#[command(about = "Soil layer standardisation demo", long_about = None)]
struct Args {
    /// Soil profile JSON file (repeatable)
    #[arg(short, long)]
    soil: Vec<PathBuf>,

    /// Built-in soil, used when no --soil is given
    #[arg(short, long, value_enum, default_value_t = Preset::Simple)]
    preset: Preset,

    /// Mark the built-in soil as disabled
    #[arg(short, long)]
    disable: bool,

    /// Standardiser configuration JSON (fill policies, area-mass factor)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print standardised soils as JSON instead of tables
    #[arg(long)]
    json: bool,
}

fn geom(thickness: &[f64]) -> Result<LayerGeometry, String> {
    LayerGeometry::new(thickness.to_vec()).map_err(|e| e.to_string())
}

fn simple_soil() -> Result<SoilProfile, String> {
    Ok(SoilProfile::new("Simple")
        .with_physical(Physical::new(
            geom(&[100.0, 200.0])?,
            vec![1.36, 1.216],
            vec![0.135, 0.214],
            vec![0.27, 0.267],
            vec![0.365, 0.461],
            vec![0.400, 0.481],
        ))
        .with_organic(
            Organic::new(geom(&[100.0, 200.0])?)
                .with_carbon(vec![2.0, 0.9])
                .with_fbiom(vec![0.04, 0.02]),
        )
        .with_chemical(
            Chemical::new(geom(&[50.0, 50.0])?)
                .with_ph(vec![6.4, 6.9])
                .with_ec(vec![100.0, 200.0]),
        )
        .with_solute(Solute::new("NO3", geom(&[50.0, 50.0])?, vec![27.0, 16.0], "ppm"))
        .with_solute(Solute::new(
            "NH4",
            geom(&[50.0, 50.0])?,
            vec![2.0, f64::NAN],
            "ppm",
        ))
        .with_water(Water::volumetric(geom(&[100.0, 200.0])?, vec![0.1, 0.2])))
}

fn deep_soil() -> Result<SoilProfile, String> {
    Ok(SoilProfile::new("Deep")
        .with_physical(
            Physical::new(
                geom(&[100.0, 300.0, 300.0])?,
                vec![1.36, 1.216, 1.24],
                vec![0.135, 0.214, 0.261],
                vec![0.27, 0.267, 0.261],
                vec![0.365, 0.461, 0.43],
                vec![0.400, 0.481, 0.45],
            )
            .with_crop(SoilCrop::new(
                "Wheat",
                vec![0.27, 0.267, 0.261],
                vec![0.06, 0.06, 0.06],
                vec![1.0, 1.0, 1.0],
            )),
        )
        .with_organic(Organic::new(geom(&[100.0, 300.0])?).with_carbon(vec![2.0, 1.0]))
        .with_solute(Solute::new("NO3", geom(&[100.0, 200.0])?, vec![27.0, 10.0], "kgha"))
        .with_solute(Solute::new(
            "CL",
            geom(&[100.0, 200.0])?,
            vec![38.0, f64::NAN],
            "ppm",
        ))
        .with_water(Water::volumetric(geom(&[500.0])?, vec![0.103])))
}

fn preset_soil(preset: Preset) -> Result<SoilProfile, String> {
    match preset {
        Preset::Simple => simple_soil(),
        Preset::Deep => deep_soil(),
        Preset::Override => {
            let mut soil = deep_soil()?.with_layer_structure(geom(&[100.0, 300.0])?);
            soil.name = "Override".to_string();
            Ok(soil)
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("cannot parse {}: {}", path.display(), e))
}

fn format_values(values: Option<&[f64]>, layer: usize) -> String {
    values
        .and_then(|v| v.get(layer))
        .map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

fn print_soil(soil: &StandardisedSoil) {
    println!("\n=== Soil '{}' ===", soil.name);
    println!(
        "Canonical layers: {} (total {})",
        soil.layer_count(),
        soil.geometry.total_depth()
    );

    println!("\nDepth(mm)   |   BD   |  LL15  |  DUL   |  SAT   |   SW   | Carbon |   pH   |   EC");
    println!("------------|--------|--------|--------|--------|--------|--------|--------|--------");
    let water = soil.water.volumetric_values();
    for (i, (top, bottom)) in soil.geometry.boundaries().enumerate() {
        println!(
            "{:>5.0}-{:<5.0} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6} | {:>6}",
            *top,
            *bottom,
            format_values(Some(&soil.physical.bd), i),
            format_values(Some(&soil.physical.ll15), i),
            format_values(Some(&soil.physical.dul), i),
            format_values(Some(&soil.physical.sat), i),
            format_values(water, i),
            format_values(soil.organic.carbon.as_deref(), i),
            format_values(soil.chemical.ph.as_deref(), i),
            format_values(soil.chemical.ec.as_deref(), i),
        );
    }

    if !soil.solutes.is_empty() {
        println!("\nSolute | Layer | kg/ha    | ppm");
        println!("-------|-------|----------|---------");
        for solute in &soil.solutes {
            for (i, (kgha, ppm)) in solute
                .area_mass
                .iter()
                .zip(&solute.concentration)
                .enumerate()
            {
                println!("{:<6} | {:>5} | {:>8.3} | {:>8.3}", solute.name, i + 1, kgha, ppm);
            }
        }
    }

    let water_mm: f64 = soil.initial_conditions.water_mm().iter().sum();
    println!("\nInitial water: {water_mm:.1} mm");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match args.config.as_deref().map(read_json::<StandardiserConfig>) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
        None => StandardiserConfig::default(),
    };

    let soils: Result<Vec<SoilProfile>, String> = if args.soil.is_empty() {
        preset_soil(args.preset).map(|soil| vec![soil.with_enabled(!args.disable)])
    } else {
        args.soil.iter().map(|path| read_json(path)).collect()
    };
    let soils = match soils {
        Ok(soils) => soils,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Standardising {} soil(s)", soils.len());
    let standardiser = SoilStandardiser::new(config);
    let mut failed = false;

    for result in standardiser.standardise_all(&soils) {
        match result {
            Ok(Outcome::Standardised(soil)) if args.json => {
                match serde_json::to_string_pretty(&soil) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        error!("cannot serialise soil '{}': {}", soil.name, e);
                        failed = true;
                    }
                }
            }
            Ok(Outcome::Standardised(soil)) => print_soil(&soil),
            Ok(Outcome::Skipped) => {}
            Err(e) => {
                error!("{}", e);
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
