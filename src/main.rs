use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shardjoin::config::EngineConfig;
use shardjoin::fixture::{IteratorFixture, PlanFixture};
use shardjoin::index::{IndexEntry, IndexInfo, IndexStream, InfiniteIntersectionStrategy, collect_entries};
use shardjoin::output;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "shardjoin")]
#[command(about = "Merge-join sorted shard and document streams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine config (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Infinite intersection strategy: conservative or bypass
    #[arg(long, global = true)]
    strategy: Option<InfiniteIntersectionStrategy>,

    /// Threads for lazy union children (0 = CPU count)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Union every stream of a plan fixture
    Union {
        fixture: PathBuf,
    },
    /// Intersect every stream of a plan fixture
    Intersect {
        fixture: PathBuf,
    },
    /// Evaluate an iterator fixture
    And {
        fixture: PathBuf,
    },
    /// Union a plan fixture and print the binary form of every entry
    Encode {
        fixture: PathBuf,

        /// Intersect instead of union
        #[arg(long)]
        intersect: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    shardjoin::logging::init(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.infinite_intersection = strategy;
    }
    if let Some(threads) = cli.threads {
        config.initializer_threads = threads;
    }
    let color = !cli.no_color;

    match cli.command {
        Commands::Union { fixture } => {
            let entries = run_plan(&fixture, false, &config)?;
            output::print_entries(&entries, color)?;
        }
        Commands::Intersect { fixture } => {
            let entries = run_plan(&fixture, true, &config)?;
            output::print_entries(&entries, color)?;
        }
        Commands::And { fixture } => {
            let fixture = IteratorFixture::load(&fixture)?;
            let mut iter = fixture.build();
            iter.initialize()?;

            let mut results = Vec::new();
            while let Some(key) = iter.next().context("Iterator fixture cannot be walked on its own")? {
                results.push((key, iter.document()));
            }
            output::print_keys(&results, color)?;
        }
        Commands::Encode { fixture, intersect } => {
            let entries = run_plan(&fixture, intersect, &config)?;
            let mut mismatches = 0;
            for (key, info) in &entries {
                let bytes = info.to_bytes();
                let round_trip = IndexInfo::from_bytes(&bytes).is_ok_and(|back| &back == info);
                if !round_trip {
                    mismatches += 1;
                }
                output::print_encoded(key, &bytes, round_trip, color)?;
            }
            if mismatches > 0 {
                anyhow::bail!("{} of {} entries did not round-trip", mismatches, entries.len());
            }
        }
    }

    Ok(())
}

fn run_plan(path: &Path, intersect: bool, config: &EngineConfig) -> Result<Vec<IndexEntry>> {
    let fixture = PlanFixture::load(path)?;
    let mut stream: Box<dyn IndexStream> = if intersect {
        Box::new(fixture.intersection(config.infinite_intersection)?)
    } else {
        let pool = config.thread_pool()?;
        Box::new(fixture.union(Some(&pool))?)
    };
    log::info!("{}", stream.context_debug());
    Ok(collect_entries(&mut stream))
}
