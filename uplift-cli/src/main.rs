use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uplift::experiments::report::{mean_comparison, render_table, slot_counts};
use uplift::{analyze, AnalysisConfig, InMemoryTelemetry, ResultTree};

#[derive(Parser)]
#[command(name = "uplift", about = "Compare telemetry distributions across experiment branches")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Inputs {
    /// Analysis configuration (JSON).
    #[arg(long, env = "UPLIFT_CONFIG")]
    config: PathBuf,
    /// Aggregated telemetry keyed branch → segment (JSON).
    #[arg(long, env = "UPLIFT_DATA")]
    data: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Run the analysis and write the result tree as JSON
    Analyze {
        #[command(flatten)]
        inputs: Inputs,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Print the per-branch mean comparison for one metric
    Summary {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, default_value = "All")]
        segment: String,
        #[arg(long)]
        metric: String,
    },
}

fn run(inputs: &Inputs) -> Result<ResultTree, Box<dyn std::error::Error>> {
    let config = AnalysisConfig::from_file(&inputs.config)?;
    let data = InMemoryTelemetry::from_file(&inputs.data)?;
    let tree = analyze(&config, &data)?;

    let (done, failed) = slot_counts(&tree);
    tracing::info!(slug = %tree.slug, done, failed, "result tree ready");
    Ok(tree)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze {
            inputs,
            output,
            pretty,
        } => {
            let tree = run(&inputs)?;
            let json = if pretty {
                serde_json::to_string_pretty(&tree)?
            } else {
                serde_json::to_string(&tree)?
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("Wrote {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Command::Summary {
            inputs,
            segment,
            metric,
        } => {
            let tree = run(&inputs)?;
            let rows = mean_comparison(&tree, &segment, &metric)?;
            println!("{}", render_table(&rows));
        }
    }
    Ok(())
}
