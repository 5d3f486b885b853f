use std::{thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use prphase::{HttpPageFetcher, Monitor, NullPageFetcher, PageFetcher, fetch_open_pull_requests};

#[derive(Parser)]
#[command(name = "prphase", version)]
#[command(
    about = "Polls a repository's open pull requests and classifies each into a workflow phase"
)]
struct Cli {
    /// GitHub repository in format 'owner/repo'
    #[arg(short = 'r', long = "repo")]
    repo: String,

    /// Seconds between polling iterations
    #[arg(long, default_value_t = 60)]
    interval: u64,

    /// Directory for PR snapshots
    #[arg(long, default_value = "pr_phase_snapshots")]
    snapshot_dir: String,

    /// Limit the number of PRs fetched per iteration
    #[arg(short = 'L', long, default_value_t = 30)]
    limit: usize,

    /// Timeout for rendered-page fetches, in seconds
    #[arg(long, default_value_t = 20)]
    page_timeout: u64,

    /// Disable rendered-page fetching (no finished-reaction confirmation)
    #[arg(long)]
    no_page_fetch: bool,

    /// Run a single polling iteration and exit
    #[arg(long)]
    once: bool,
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let fetcher: Box<dyn PageFetcher> = if cli.no_page_fetch {
        Box::new(NullPageFetcher)
    } else {
        Box::new(HttpPageFetcher::new(Duration::from_secs(cli.page_timeout))?)
    };
    let mut monitor = Monitor::new(cli.snapshot_dir.as_str(), fetcher);

    loop {
        match fetch_open_pull_requests(&cli.repo, cli.limit) {
            Ok(prs) => {
                info!(count = prs.len(), repo = %cli.repo, "fetched open pull requests");
                for (key, phase) in monitor.poll_once(&prs) {
                    println!("{phase}\t{key}");
                }
            }
            // A failed fetch skips the iteration; the monitor must outlive
            // transient network or gh outages.
            Err(err) => error!(error = %err, "failed to fetch pull requests"),
        }

        if cli.once {
            break;
        }
        thread::sleep(Duration::from_secs(cli.interval));
    }

    Ok(())
}
