use clap::{Parser, Subcommand, builder::styling};
use etlkit::cli::{RunOptions, SourceSpec, inspect, run_pipeline};
use eyre::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// etlkit: run templated extract → transform → load pipelines over NDJSON datasets
#[derive(Parser)]
#[command(name = "etlkit", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source ENVIRONMENT and LOCATION from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract NDJSON sources, concatenate them, and load the result
    Run {
        /// Source dataset as NAME=PATH, repeatable
        #[arg(short, long = "source", required = true)]
        sources: Vec<SourceSpec>,

        /// Directory the result is loaded into
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// YAML file with run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Target table name
        #[arg(short, long)]
        table: Option<String>,

        /// Target dataset name
        #[arg(short, long)]
        dataset: Option<String>,

        /// Append to the target instead of rewriting it
        #[arg(short, long)]
        update: bool,

        /// Extract sources one at a time
        #[arg(long)]
        sequential: bool,

        /// Print the result instead of loading it
        #[arg(long)]
        dry_run: bool,
    },

    /// Print an NDJSON file as a table
    Inspect {
        /// NDJSON file to display
        path: PathBuf,

        /// Number of rows to show
        #[arg(short, long, default_value_t = 5)]
        rows: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(e) = dotenvy::from_filename(&cli.env) {
        if !e.not_found() {
            return Err(e.into());
        }
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    match cli.command {
        Commands::Run {
            sources,
            output,
            config,
            table,
            dataset,
            update,
            sequential,
            dry_run,
        } => {
            log::info!(
                "Running pipeline over {} source(s) into {}",
                sources.len().cyan(),
                output.display().bright_black()
            );
            let count = run_pipeline(RunOptions {
                sources,
                output_dir: output,
                config_file: config,
                table_name: table,
                dataset_name: dataset,
                update_mode: update,
                sequential,
                dry_run,
            })
            .await?;
            log::info!("Pipeline finished with {} row(s)", count.green());
        }
        Commands::Inspect { path, rows } => {
            println!("{}", inspect(path, rows)?);
        }
    }

    Ok(())
}
