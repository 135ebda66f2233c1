use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dt_audit::cache::StatusCache;
use dt_audit::check::orchestrator::check_all;
use dt_audit::config;
use dt_audit::dt::enumerate::enumerate_checkout;
use dt_audit::registry::files::FileLister;
use dt_audit::registry::limiter::PoliteClient;
use dt_audit::registry::npm::NpmClient;
use dt_audit::report::generate_report;

#[derive(Parser)]
#[command(name = "dt-audit")]
#[command(version, about = "Audits DefinitelyTyped packages against npm")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check every typings package in a DefinitelyTyped checkout.
    Check {
        /// Path to the DefinitelyTyped checkout.
        checkout: PathBuf,
        /// Cache directory from a previous run, read for short-circuiting.
        #[arg(long, default_value = "cache")]
        input_cache: PathBuf,
        /// Cache directory this run writes its records to.
        #[arg(long, default_value = "cache")]
        output_cache: PathBuf,
        /// Log per-package detail.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Render a markdown report from a populated cache.
    Generate {
        /// Cache directory to report on.
        #[arg(long, default_value = "cache")]
        input_cache: PathBuf,
        /// Directory the report is written into.
        #[arg(long, default_value = "output")]
        out: PathBuf,
        /// Log per-package detail.
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "dt_audit=debug"
    } else {
        "dt_audit=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check {
            checkout,
            input_cache,
            output_cache,
            verbose,
        } => {
            init_logging(verbose);
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(async move {
                    let descriptors = enumerate_checkout(&checkout)?;
                    info!("found {} typings packages", descriptors.len());

                    let http = Arc::new(PoliteClient::new());
                    let npm = NpmClient::new(http.clone(), config::NPM_REGISTRY_URL);
                    let files = FileLister::with_default_providers(http);
                    let input = StatusCache::new(input_cache);
                    let output = StatusCache::new(output_cache);

                    let checked = check_all(descriptors, &npm, &files, &input, &output).await?;
                    info!("done, {checked} packages checked");
                    anyhow::Ok(())
                })
        }
        Command::Generate {
            input_cache,
            out,
            verbose,
        } => {
            init_logging(verbose);
            generate_report(&StatusCache::new(input_cache), &out)
        }
    }
}
