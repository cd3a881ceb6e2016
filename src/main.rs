use std::error::Error;
use std::process::ExitCode;
use std::time::Instant;

use chrono::Utc;
use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use flowtag::config::Args;
use flowtag::report::write_report;
use flowtag::{classify_file, LookupTable};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let started = Instant::now();

    let table = LookupTable::load(&args.lookup)?;
    let counts = classify_file(&args.flow_log, &table, args.workers)?;
    write_report(&args.output, &counts, args.report_options())?;

    info!(
        "Done at {}: {} tags, {} port/protocol pairs, {} records in {:?}",
        Utc::now().to_rfc3339(),
        counts.tags.len(),
        counts.port_protocols.len(),
        counts.classified(),
        started.elapsed()
    );
    Ok(())
}

fn main() -> ExitCode {
    dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
