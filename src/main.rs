//! Tessel CLI - query generators and inspect tension curves from the shell

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessel::config::Config;
use tessel::fractal::Generator;
use tessel::morph::TensionCurve;
use tessel::pattern::Pattern;
use tessel::pattern_display::{pattern_to_ascii, HapRecord};
use tessel::value::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "tessel")]
#[command(about = "Tessel pattern algebra", long_about = None)]
struct Cli {
    /// TOML configuration file (seed, tempo, generator limits)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query a generator such as `euclid:3,8`, `cantor:3` or `ca:30,16`
    Query {
        /// Generator spec `name:args`
        generator: String,

        /// Number of cycles to query (default: 1)
        #[arg(short = 'n', long, default_value = "1")]
        cycles: usize,

        /// Value placed on every onset (default: x)
        #[arg(short, long, default_value = "x")]
        value: String,

        /// Drop events with this probability, seeded from the config
        #[arg(short, long)]
        degrade: Option<f64>,

        /// Print one JSON object per event instead of a grid
        #[arg(long)]
        json: bool,

        /// Grid cells per cycle (default: 16)
        #[arg(short, long, default_value = "16")]
        resolution: usize,
    },

    /// Sample a tension curve over [0, 1]
    Curve {
        /// Curve name (linear, arc, cliff, wave, golden, pulse, lorenz)
        name: String,

        /// Number of samples (default: 11)
        #[arg(short, long, default_value = "11")]
        samples: usize,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            Config::load(path)?
        }
        None => Config::default(),
    };

    match cli.command {
        Commands::Query {
            generator,
            cycles,
            value,
            degrade,
            json,
            resolution,
        } => {
            let generator: Generator = generator.parse()?;
            let structure = generator.build(&config.limits)?;
            let mut pattern = Pattern::pure(Value::from(value)).struct_pattern(structure);
            if let Some(amount) = degrade {
                pattern = pattern.degrade_by_with_seed(amount, config.seed)?;
            }

            if json {
                let begin = tessel::Fraction::ZERO;
                let end = tessel::Fraction::from_integer(cycles as i64);
                for hap in pattern.query_span(begin, end)? {
                    let record = HapRecord::from_hap(hap, &config);
                    println!("{}", serde_json::to_string(&record)?);
                }
            } else {
                println!("{}", generator);
                print!("{}", pattern_to_ascii(&pattern, cycles, resolution)?);
            }
        }

        Commands::Curve { name, samples } => {
            let curve = TensionCurve::from_name(&name);
            let last = samples.saturating_sub(1).max(1) as f64;
            for i in 0..samples {
                let t = i as f64 / last;
                println!("{:.3}\t{:.6}", t, curve.apply(t)?);
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
