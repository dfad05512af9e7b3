use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use clap::Parser;
use log::info;

use mactierra::ancestor::ancestor_genome;
use mactierra::world::{ArchiveError, ArchiveFormat, World};

#[derive(Parser)]
#[command(name = "mactierra", about = "Tierra-style artificial life simulator")]
struct Cli {
    /// Random seed for reproducibility.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Soup size in instructions.
    #[arg(long, default_value_t = 1 << 18)]
    soup_size: u32,

    /// Number of CPU cycles to run.
    #[arg(long, default_value_t = 10_000_000)]
    cycles: u64,

    /// Mean instructions between flaws (0 to disable).
    #[arg(long, default_value_t = 0.0)]
    mean_flaw_interval: f64,

    /// Mean mov_iab count between copy errors (0 to disable).
    #[arg(long, default_value_t = 0.0)]
    mean_copy_error_interval: f64,

    /// Mean instructions between cosmic rays (0 to disable).
    #[arg(long, default_value_t = 0.0)]
    mean_cosmic_interval: f64,

    /// Resume from a saved world instead of seeding a new one.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Save the world here when the run finishes.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Archive format for --load/--save (binary or text).
    #[arg(long, default_value = "binary")]
    format: String,

    /// Genotypes to list in the final report.
    #[arg(long, default_value_t = 10)]
    report_genotypes: usize,
}

fn archive_format(name: &str) -> ArchiveFormat {
    match name {
        "text" => ArchiveFormat::Text,
        _ => ArchiveFormat::Binary,
    }
}

fn main() -> Result<(), ArchiveError> {
    env_logger::init();
    let cli = Cli::parse();
    let format = archive_format(&cli.format);

    let mut world = match &cli.load {
        Some(path) => {
            let reader = BufReader::new(File::open(path)?);
            let world = World::from_stream(format, reader)?;
            info!("loaded world from {}", path.display());
            world
        }
        None => {
            let mut world = World::new(cli.seed);
            world.initialize_soup(cli.soup_size);

            let mut settings = world.settings().clone();
            settings.set_mean_flaw_interval(cli.mean_flaw_interval);
            settings.set_mean_copy_error_interval(cli.mean_copy_error_interval);
            settings.set_mean_cosmic_time_interval(cli.mean_cosmic_interval);
            world.set_settings(settings);

            world
                .insert_creature(0, &ancestor_genome())
                .expect("empty soup has space for the ancestor");
            world
        }
    };

    let mut remaining = cli.cycles;
    while remaining > 0 {
        let chunk = remaining.min(1 << 20) as u32;
        world.iterate(chunk);
        remaining -= u64::from(chunk);
    }

    println!(
        "{} instructions, {} creatures (mean size {:.1}), fullness {:.3}",
        world.time_slicer().instructions_executed(),
        world.num_creatures(),
        world.mean_creature_size(),
        world.cell_map().fullness(),
    );
    println!(
        "{} genotypes ever, {} current, {} speciations, {} extinctions",
        world.inventory().num_species_ever(),
        world.inventory().num_species_current(),
        world.inventory().speciation_count(),
        world.inventory().extinction_count(),
    );

    let mut genotypes: Vec<_> = world
        .inventory()
        .genotypes()
        .filter(|(_, genotype)| genotype.num_alive() > 0)
        .collect();
    genotypes.sort_by(|a, b| b.1.num_alive().cmp(&a.1.num_alive()));
    for (_, genotype) in genotypes.iter().take(cli.report_genotypes) {
        println!(
            "  {:<12} alive {:<6} ever {:<6} origin {}",
            genotype.name(),
            genotype.num_alive(),
            genotype.num_ever_lived(),
            genotype.origin_instructions(),
        );
    }

    if let Some(path) = &cli.save {
        let writer = BufWriter::new(File::create(path)?);
        world.to_stream(format, writer)?;
        info!("saved world to {}", path.display());
    }

    Ok(())
}
