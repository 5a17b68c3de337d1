use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use rand::Rng;
use rayon::prelude::*;

use mapforge::ascii;
use mapforge::cells::CellGenerator;
use mapforge::config::PhaseDocument;
use mapforge::export;
use mapforge::generation::{GenerationReport, TerrainMap};
use mapforge::terrain::TerrainSet;
use mapforge::tiles::{TileGenerator, DEFAULT_TILE_SIZE};

/// Seeds used when neither `--seed` nor `--batch` is given.
const DEFAULT_BATCH_SEEDS: [u64; 3] = [42, 123, 456];

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Place pre-authored templates edge to edge
    Tile,
    /// Grow regions cell by cell
    Cell,
}

impl Strategy {
    fn generation_type(self) -> &'static str {
        match self {
            Strategy::Tile => "tile_based",
            Strategy::Cell => "cell_based",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "mapforge")]
#[command(about = "Generate terrain grids under adjacency and placement rules")]
struct Args {
    /// Width of the map (slots for tile, cells for cell)
    #[arg(short = 'W', long, default_value = "12")]
    width: usize,

    /// Height of the map (slots for tile, cells for cell)
    #[arg(short = 'H', long, default_value = "10")]
    height: usize,

    /// Generation strategy
    #[arg(long, value_enum, default_value = "cell")]
    strategy: Strategy,

    /// Cells per tile side (tile strategy)
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    tile_size: usize,

    /// Random seed for a single map
    #[arg(short, long, conflicts_with = "batch")]
    seed: Option<u64>,

    /// Generate N maps with random seeds
    #[arg(long, value_name = "N")]
    batch: Option<usize>,

    /// Terrain phase (defaults to the document's current phase)
    #[arg(short, long)]
    phase: Option<String>,

    /// Terrain config JSON (uses the built-in phases if not specified)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Pixels per cell in PNG export
    #[arg(long, default_value = "4")]
    png_scale: u32,

    /// Skip PNG export
    #[arg(long)]
    no_png: bool,

    /// Skip writing any files
    #[arg(long)]
    no_export: bool,

    /// Write a text report next to the JSON snapshot
    #[arg(long)]
    report: bool,

    /// Print the map as ASCII
    #[arg(long)]
    ascii: bool,

    /// Print the map with ANSI colors (implies --ascii)
    #[arg(long)]
    color: bool,

    /// List phases and templates, then exit
    #[arg(long)]
    list_phases: bool,

    /// Verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

enum GeneratedMap {
    Tile(TileGenerator),
    Cell(CellGenerator),
}

impl GeneratedMap {
    fn map(&self) -> &dyn TerrainMap {
        match self {
            GeneratedMap::Tile(g) => g as &dyn TerrainMap,
            GeneratedMap::Cell(g) => g as &dyn TerrainMap,
        }
    }

    fn report(&self) -> Option<&GenerationReport> {
        match self {
            GeneratedMap::Tile(g) => g.last_report(),
            GeneratedMap::Cell(g) => g.last_report(),
        }
    }
}

fn init_logging(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn load_document(args: &Args) -> Result<PhaseDocument, mapforge::error::ConfigError> {
    match &args.config {
        Some(path) => PhaseDocument::load(path),
        None => PhaseDocument::embedded_default(),
    }
}

fn list_phases(doc: &PhaseDocument) -> Result<(), mapforge::error::ConfigError> {
    let current = doc.current_phase();
    for key in doc.available_phases() {
        let set = TerrainSet::from_document(doc, Some(&key))?;
        let marker = if current.as_deref() == Some(key.as_str()) { " (current)" } else { "" };
        println!("Phase {}: {}{}", set.phase.phase, set.phase.name, marker);
        if !set.phase.description.is_empty() {
            println!("  {}", set.phase.description);
        }
        println!("  Terrain: {}", set.registry.all_types().join(", "));
        for t in set.templates.iter() {
            let info = mapforge::tiles::TemplateInfo::new(t, &set.registry);
            println!(
                "  Template {:<20} weight {:.2}  terrain {:<8} N/S/E/W {}",
                info.name,
                info.weight,
                info.terrain,
                info.edges.join("/")
            );
        }
    }
    Ok(())
}

fn generate(args: &Args, set: &TerrainSet, seed: u64) -> Result<GeneratedMap, mapforge::error::ConfigError> {
    match args.strategy {
        Strategy::Tile => {
            let mut gen = TileGenerator::new(args.width, args.height, set.clone(), Some(seed))?
                .with_tile_size(args.tile_size);
            gen.generate(None);
            Ok(GeneratedMap::Tile(gen))
        }
        Strategy::Cell => {
            let mut gen = CellGenerator::new(args.width, args.height, set.clone(), Some(seed));
            gen.generate(None);
            Ok(GeneratedMap::Cell(gen))
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    let doc = match load_document(&args) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if args.list_phases {
        if let Err(e) = list_phases(&doc) {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
        return;
    }

    let set = match TerrainSet::from_document(&doc, args.phase.as_deref()) {
        Ok(set) => set,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let seeds: Vec<u64> = match (args.seed, args.batch) {
        (Some(seed), _) => vec![seed],
        (None, Some(n)) => {
            let mut rng = rand::thread_rng();
            (0..n).map(|_| rng.gen_range(1..=999_999)).collect()
        }
        (None, None) => DEFAULT_BATCH_SEEDS.to_vec(),
    };

    println!(
        "Generating {} {} map(s) of {}x{} with phase {} ({})",
        seeds.len(),
        args.strategy.generation_type(),
        args.width,
        args.height,
        set.phase.phase,
        set.phase.name
    );

    // Each map owns its generator and random stream
    let results: Vec<(u64, Result<GeneratedMap, _>)> = seeds
        .par_iter()
        .map(|&seed| (seed, generate(&args, &set, seed)))
        .collect();

    let mut failures = 0;
    for (seed, result) in results {
        let generated = match result {
            Ok(g) => g,
            Err(e) => {
                eprintln!("Seed {}: {}", seed, e);
                failures += 1;
                continue;
            }
        };
        let map = generated.map();

        println!();
        println!("=== Seed {} ===", seed);
        if let Some(report) = generated.report() {
            println!(
                "{} attempt(s){}",
                report.attempts,
                if report.degraded { ", structural rules not fully satisfied" } else { "" }
            );
        }

        if args.color {
            print!("{}", ascii::render_colored_ascii_map(map));
        } else if args.ascii {
            print!("{}", ascii::render_ascii_map(map));
        }
        print!("{}", ascii::region_report(map));

        if args.no_export {
            continue;
        }
        let png_scale = if args.no_png { None } else { Some(args.png_scale) };
        match export::export_map_files(map, &args.output, args.strategy.generation_type(), png_scale) {
            Ok(files) => {
                println!("Saved {}", files.json.display());
                if let Some(png) = files.png {
                    println!("Saved {}", png.display());
                }
                if args.report {
                    let path = files.json.with_extension("txt");
                    let path = path.to_string_lossy();
                    match ascii::export_map_file(map, args.strategy.generation_type(), generated.report(), &path) {
                        Ok(()) => println!("Saved {}", path),
                        Err(e) => {
                            eprintln!("Failed to write {}: {}", path, e);
                            failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("Seed {}: export failed: {}", seed, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        process::exit(1);
    }
}
