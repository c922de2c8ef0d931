use clap::{Parser, Subcommand};
use copperzync::config::{self, ClientConfig};
use copperzync::engine::{AnalysisEngine, EngineEvent, EngineSettings};
use copperzync::error::AnalysisError;
use copperzync::imaging::{PrepareSettings, plan_upload, prepare};
use copperzync::model::AnalysisResult;
use copperzync::output;
use copperzync::service::HttpAnalysisService;
use copperzync::transport::{ReqwestTransport, TcpProbe};
use std::path::PathBuf;
use std::sync::mpsc::{Sender, channel};
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that print an analysis.
#[derive(clap::Args, Clone)]
struct ReportArgs {
    /// Print the analysis as JSON instead of a report
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
#[command(name = "copperzync")]
#[command(about = "Identify coins from photos with the CopperZync backend")]
#[command(long_about = "\
Identify coins from photos with the CopperZync backend

Photos are shrunk to at most 800px on the longer edge, JPEG-encoded and
uploaded. Network failures and unidentified results are retried once by
default; a cold backend may take up to 30 seconds to answer.

Run 'copperzync gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Log engine internals (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a single photo of a coin
    Analyze {
        image: PathBuf,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Analyze photos of both faces of a coin
    AnalyzeBoth {
        front: PathBuf,
        back: PathBuf,
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Write the upload-ready JPEG without contacting the backend
    Prepare {
        image: PathBuf,
        /// Where to write the JPEG
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Check the backend's health endpoint
    Health,
    /// Check whether the backend answers at all
    Ping,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Prepare {
            image: path,
            output: destination,
        } => {
            let config = config::load_config(&cli.config_dir)?;
            let settings = PrepareSettings::from_config(&config);
            let source = image::open(&path)?;
            let plan = plan_upload((source.width(), source.height()), &settings);
            let encoded = prepare(&source, &settings)?;
            std::fs::write(&destination, &encoded.bytes)?;
            output::print_prepared(
                &plan,
                encoded.bytes.len(),
                &destination.display().to_string(),
            );
        }
        Command::Analyze {
            image: path,
            report,
        } => {
            let config = config::load_config(&cli.config_dir)?;
            let photo = image::open(&path)?;
            let (tx, printer) = spawn_printer(report.json);
            let result = {
                let service = HttpAnalysisService::from_config(&config)?.with_events(tx);
                service.analyze_single(photo).await
            };
            join_printer(printer);
            finish(result, report.json)?;
        }
        Command::AnalyzeBoth {
            front,
            back,
            report,
        } => {
            let config = config::load_config(&cli.config_dir)?;
            let front = image::open(&front)?;
            let back = image::open(&back)?;
            let (tx, printer) = spawn_printer(report.json);
            let result = {
                let service = HttpAnalysisService::from_config(&config)?.with_events(tx);
                service.analyze_both_sides(front, back).await
            };
            join_printer(printer);
            finish(result, report.json)?;
        }
        Command::Health => {
            let config = config::load_config(&cli.config_dir)?;
            let engine = http_engine(&config)?;
            match engine.check_health().await {
                Ok(()) => println!("{} healthy", engine.settings().base_url),
                Err(err) => fail(&err),
            }
        }
        Command::Ping => {
            let config = config::load_config(&cli.config_dir)?;
            let engine = http_engine(&config)?;
            match engine.test_connection().await {
                Ok(reachability) => {
                    output::print_reachability(&engine.settings().base_url, &reachability);
                    if !reachability.is_reachable() {
                        std::process::exit(1);
                    }
                }
                Err(err) => fail(&err),
            }
        }
    }

    Ok(())
}

/// Install the fmt subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "copperzync=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn http_engine(
    config: &ClientConfig,
) -> Result<AnalysisEngine<ReqwestTransport, TcpProbe>, AnalysisError> {
    Ok(AnalysisEngine::new(
        ReqwestTransport::from_config(config)?,
        TcpProbe::for_base_url(&config.backend.base_url)?,
        EngineSettings::from_config(config),
    ))
}

/// Print engine events on a separate thread. JSON mode keeps stdout clean,
/// so events are drained silently.
fn spawn_printer(quiet: bool) -> (Sender<EngineEvent>, JoinHandle<()>) {
    let (tx, rx) = channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            if !quiet {
                output::print_event(&event);
            }
        }
    });
    (tx, printer)
}

fn join_printer(printer: JoinHandle<()>) {
    if printer.join().is_err() {
        eprintln!("event printer thread panicked");
    }
}

fn finish(
    result: Result<AnalysisResult, AnalysisError>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(analysis) if json => {
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Ok(analysis) => {
            println!();
            output::print_result(&analysis);
        }
        Err(err) => fail(&err),
    }
    Ok(())
}

fn fail(err: &AnalysisError) -> ! {
    output::print_error(err);
    std::process::exit(1)
}
