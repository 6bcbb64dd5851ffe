use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use linksamr_core::{
    AMR_ENDPOINT, Credentials, DEFAULT_BATCH_SIZE, DEFAULT_THROTTLE_CAP, HttpTransport,
    LookupKind, LookupProgress, Pipeline, RequestBuilder, Throttle,
};

mod input;
mod output;

/// Batch lookup client for the Web of Science Links AMR service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up local IDs, UTs, PMIDs, DOIs, or author/title metadata
    Ids(RunArgs),

    /// Look up journal ISSNs for JCR impact data
    Journals(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Input CSV file; the header row defines the lookup fields
    input: PathBuf,

    /// Output CSV file
    output: PathBuf,

    /// Records per request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Records-per-minute cap enforced between requests
    #[arg(long, default_value_t = DEFAULT_THROTTLE_CAP)]
    cap: u32,

    /// Override the AMR service endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Suppress progress output
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ids(args) => run(LookupKind::Ids, args).await,
        Command::Journals(args) => run(LookupKind::Journals, args).await,
    }
}

/// Load service credentials from the environment. Checked before any
/// input is read or network activity occurs.
fn credentials_from_env() -> anyhow::Result<Credentials> {
    match (std::env::var("WOS_USER"), std::env::var("WOS_PASSWORD")) {
        (Ok(username), Ok(password)) => Ok(Credentials { username, password }),
        _ => anyhow::bail!("Unable to read WOS_USER and WOS_PASSWORD environment variables."),
    }
}

async fn run(kind: LookupKind, args: RunArgs) -> anyhow::Result<()> {
    let credentials = credentials_from_env()?;

    let records = match kind {
        LookupKind::Ids => input::read_lookup_csv(&args.input)?,
        LookupKind::Journals => input::read_journal_csv(&args.input)?,
    };
    let total_batches = records.len().div_ceil(args.batch_size.max(1));

    let endpoint = args
        .endpoint
        .unwrap_or_else(|| AMR_ENDPOINT.to_string());
    let mut pipeline = Pipeline::new(
        RequestBuilder::new(kind, credentials),
        HttpTransport::new(endpoint),
        Throttle::new(args.cap),
    );

    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(total_batches as u64);
        bar.set_style(
            ProgressStyle::with_template("[{bar:40}] batch {pos}/{len} {msg}")
                .expect("static template")
                .progress_chars("=> "),
        );
        bar
    };

    let results = pipeline
        .run(records, "id", args.batch_size, |event| match event {
            LookupProgress::Throttled { wait } => {
                let msg = format!(
                    "Rate throttling in effect, waiting {} seconds...",
                    wait.as_secs()
                );
                bar.println(msg.yellow().to_string());
            }
            LookupProgress::BatchStarted { index, total } => {
                bar.set_message(format!("({index}/{total})"));
            }
            LookupProgress::BatchComplete { index: _, records } => {
                bar.set_message(format!("{records} records"));
                bar.inc(1);
            }
        })
        .await?;
    bar.finish_and_clear();

    match kind {
        LookupKind::Ids => output::write_id_results(&args.output, &results)?,
        LookupKind::Journals => output::write_journal_results(&args.output, &results)?,
    }

    if !args.quiet {
        println!(
            "{}",
            format!(
                "Wrote {} results to {}",
                results.len(),
                args.output.display()
            )
            .green()
        );
    }
    Ok(())
}
