use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod aggregate;
mod config;
mod dedup;
mod error;
mod export;
mod models;
mod names;
mod normalize;
mod pipeline;
mod ranking;
mod reconcile;
mod report;
mod source;
mod validate;

use config::Config;
use source::SourcePaths;

#[derive(Parser)]
#[command(name = "readathon-standings")]
#[command(about = "Reading-log and pledge standings for the school readathon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Directory holding the dated YYYY-MM-DDThhmm.csv exports
    #[arg(long, default_value = "data")]
    dir: PathBuf,
    /// Roster CSV mapping student names to class names
    #[arg(long)]
    roster: Option<PathBuf>,
    /// Offline pledge ledger CSV
    #[arg(long)]
    offline: Option<PathBuf>,
    /// TOML file with campuses, teachers, name exceptions and prize counts
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a campus's top readers and pledgers
    Leaders {
        #[command(flatten)]
        sources: SourceArgs,
        #[arg(long)]
        campus: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown standings report
    Report {
        #[command(flatten)]
        sources: SourceArgs,
        #[arg(long)]
        campus: Option<String>,
        #[arg(long, default_value = "standings.md")]
        out: PathBuf,
    },
    /// Write the prize winners CSV
    Export {
        #[command(flatten)]
        sources: SourceArgs,
        #[arg(long)]
        campus: Option<String>,
        /// Defaults to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check an export before accepting it
    Validate {
        #[arg(long, default_value = "data")]
        dir: PathBuf,
        /// Validate this file instead of the latest export in --dir
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long, default_value = "validation-problems.json")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("READATHON_LOG")
        .unwrap_or_else(|_| EnvFilter::new("readathon_standings=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn load(sources: SourceArgs) -> anyhow::Result<(pipeline::Load, Config)> {
    let config = match &sources.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    let paths = SourcePaths::in_dir(&sources.dir, sources.roster, sources.offline)?;
    let load = pipeline::load(&paths, &config)
        .await
        .with_context(|| format!("failed to load {}", paths.export.display()))?;
    Ok((load, config))
}

fn campus_code(config: &Config, campus: Option<String>) -> anyhow::Result<Option<String>> {
    let Some(campus) = campus else {
        return Ok(None);
    };
    let code = campus.to_uppercase();
    if !config.is_known_campus(&code) {
        bail!("unknown campus {campus}");
    }
    Ok(Some(code))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Leaders {
            sources,
            campus,
            limit,
        } => {
            let (load, config) = load(sources).await?;
            let code = campus_code(&config, Some(campus))?.unwrap_or_default();
            let Some(results) = load.results.campuses.get(&code) else {
                println!("No students recorded for {}.", config.campus_name(&code));
                return Ok(ExitCode::SUCCESS);
            };

            for (title, ranking, unit) in [
                ("Top readers", &results.top_readers, "minutes"),
                ("Top pledgers", &results.top_pledgers, "pledges"),
            ] {
                println!("{} {}:", results.name, title.to_lowercase());
                for entry in ranking.iter().take(limit) {
                    println!(
                        "{:>3}{} {} ({}) {} {}",
                        entry.rank,
                        if entry.prize { "*" } else { " " },
                        entry.item.display_name,
                        entry.item.class,
                        entry.score,
                        unit
                    );
                }
            }
        }
        Commands::Report {
            sources,
            campus,
            out,
        } => {
            let (load, config) = load(sources).await?;
            let code = campus_code(&config, campus)?;
            let report = report::build_report(&load, code.as_deref());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            sources,
            campus,
            out,
        } => {
            let (load, config) = load(sources).await?;
            let code = campus_code(&config, campus)?;
            let campuses = load
                .results
                .campuses
                .values()
                .filter(|c| code.as_deref().map_or(true, |code| c.campus == code));

            match out {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    export::write_prizes(campuses, file)?;
                    eprintln!("Prizes written to {}.", path.display());
                }
                None => export::write_prizes(campuses, std::io::stdout().lock())?,
            }
        }
        Commands::Validate { dir, csv, out } => {
            let path = match csv {
                Some(path) => path,
                None => source::latest_export(&dir)?,
            };
            println!("Validating {}", path.display());
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let rows = source::read_rows(&text)?;
            let report = validate::validate_rows(&rows);

            println!("Rows parsed: {}", report.rows_parsed);
            println!(
                "Rows with issues: {} ({} errors, {} warnings)",
                report.problems.len(),
                report.error_count(),
                report.warning_count()
            );
            if report.problems.is_empty() {
                println!("No problems found.");
                return Ok(ExitCode::SUCCESS);
            }

            for problem in report.problems.iter().take(20) {
                let codes: Vec<String> = problem
                    .errors
                    .iter()
                    .map(|i| format!("E:{}", i.code()))
                    .chain(problem.warnings.iter().map(|i| format!("W:{}", i.code())))
                    .collect();
                println!("Line {}: {}", problem.line, codes.join(", "));
            }
            std::fs::write(&out, serde_json::to_string_pretty(&report)?)?;
            println!("Wrote detailed report to {}", out.display());

            if !report.ok {
                println!("Errors present.");
                return Ok(ExitCode::FAILURE);
            }
            println!("Only warnings present.");
        }
    }

    Ok(ExitCode::SUCCESS)
}
