//! qpush: compile a Bell circuit for an IBM Quantum device and submit it.
//!
//! ```text
//!   .env ──→ credential ──→ connect ──→ bell circuit ──→ transpile ──→ session + sampler ──→ Job ID
//! ```
//!
//! stdout carries exactly one line: `Job ID: <id>` on success, or a French
//! diagnostic starting with `Erreur` on failure. Logs go to stderr.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::info;
use tracing_subscriber::EnvFilter;

use qpush_hal::Backend;

mod config;
mod pipeline;

use config::{EnvFile, RunArgs, Settings};
use pipeline::StageError;

/// Exit status for configuration errors outside the pipeline stages.
const CONFIG_ERROR: u8 = 2;

/// Submit a Bell-state circuit to IBM Quantum and print the job id
#[derive(Parser)]
#[command(name = "qpush")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    run: RunArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match execute(&cli.run).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<StageError>() {
            Some(stage) => {
                println!("{stage}");
                ExitCode::FAILURE
            }
            None => {
                eprintln!("{} {e:#}", style("error:").red().bold());
                ExitCode::from(CONFIG_ERROR)
            }
        },
    }
}

async fn execute(args: &RunArgs) -> Result<()> {
    let env_file = EnvFile::load(&args.env_file)?;
    let token = config::credential(&env_file)?;
    let settings = Settings::resolve(args, &env_file, token)?;
    info!(
        "Targeting {} on {} (level {}, {} shots)",
        settings.ibm.backend, settings.ibm.channel, settings.optimization_level, settings.shots
    );

    let backend = pipeline::connect(&settings.ibm).await?;
    let circuit = pipeline::bell_circuit()?;
    let compiled =
        pipeline::transpile_for(&circuit, backend.capabilities(), settings.optimization_level)?;

    if settings.dry_run {
        print!("{}", pipeline::render_qasm(&compiled)?);
        return Ok(());
    }

    let job_id = pipeline::submit(Arc::new(backend), &compiled, settings.shots).await?;
    println!("Job ID: {job_id}");
    Ok(())
}
