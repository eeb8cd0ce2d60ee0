use anyhow::Result;
/// FAIRQ CLI - risk quantification reports
///
/// Loads a dataset file and prints exposure, curves, cost impact, control
/// suggestions or the portfolio summary as text or JSON.
use clap::{Parser, Subcommand};
use fairq_cli::{execute, parse_triangle, Command, Session};
use fairq_core::types::TriangularEstimate;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fairq-cli")]
#[command(about = "FAIR risk quantification engine", long_about = None)]
struct Cli {
    /// Dataset file (YAML, or JSON with a .json extension)
    #[arg(short, long, global = true, default_value = "dataset.yaml")]
    data: PathBuf,
    /// Engine configuration YAML
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inherent and residual exposure of one risk
    Exposure {
        #[arg(short, long)]
        risk: String,
    },
    /// Loss exceedance curve of one risk
    Curve {
        #[arg(short, long)]
        risk: String,
        /// Number of curve points (clamped to the configured range)
        #[arg(short, long)]
        points: Option<usize>,
    },
    /// Compare a risk's curve with a previous residual and dataset benchmarks
    Compare {
        #[arg(short, long)]
        risk: String,
        /// Previous residual as MIN,AVG,MAX
        #[arg(long, value_parser = parse_triangle)]
        previous: Option<TriangularEstimate>,
        #[arg(short, long)]
        points: Option<usize>,
    },
    /// Cost-impact breakdown of one risk
    Costs {
        #[arg(short, long)]
        risk: String,
    },
    /// Ranked control suggestions for one risk
    Suggest {
        #[arg(short, long)]
        risk: String,
    },
    /// Portfolio summary over every risk in the dataset
    Portfolio,
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Exposure { risk } => Command::Exposure { risk },
            Commands::Curve { risk, points } => Command::Curve { risk, points },
            Commands::Compare {
                risk,
                previous,
                points,
            } => Command::Compare {
                risk,
                previous,
                points,
            },
            Commands::Costs { risk } => Command::Costs { risk },
            Commands::Suggest { risk } => Command::Suggest { risk },
            Commands::Portfolio => Command::Portfolio,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));
    let cli = Cli::parse();

    let session = Session::load(&cli.data, cli.config.as_deref())?;
    let output = execute(&session, &cli.command.into(), cli.json)?;
    println!("{}", output);

    Ok(())
}
