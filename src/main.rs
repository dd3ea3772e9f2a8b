//! Bitcoin Block RNG command line.
//!
//! Publishes a commitment, waits for the committed blocks, and prints the
//! proofs. Also verifies proofs and replays saved transcripts offline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bbrng::proof::{LongProofOptions, PROOF_TAG};
use bbrng::provider::{self, ProviderKind};
use bbrng::session::{refresh_tip, Clock, Eta, SessionOutcome, TipMonitor, TipTracker, TokioClock, WaitConfig};
use bbrng::{
    verify_transcript, Commitment, CommitmentBuilder, Config, SessionController, ShortProof, Transcript, VERSION,
};

#[derive(Parser, Debug)]
#[command(name = "bbrng", version, about = "Auditable random numbers from future Bitcoin block hashes")]
struct Cli {
    /// Block explorer backend (mp | bs); overrides BBRNG_PROVIDER
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,

    /// Use only the chosen backend, never the other one
    #[arg(long, global = true)]
    no_failover: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a commitment for the next blocks without waiting
    Commit(DrawArgs),
    /// Commit, wait for the blocks, and print the proofs
    Run(RunArgs),
    /// Check a short proof or a commitment
    Verify {
        /// Proof or commitment text (may be embedded in a larger blob)
        text: String,
    },
    /// Replay a saved transcript
    Replay {
        /// Transcript JSON written by `run --save`
        path: PathBuf,
    },
    /// Show the current tip and time since it was mined
    Tip,
}

#[derive(Args, Debug, Clone)]
struct DrawArgs {
    /// Smallest possible result
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    min: i64,

    /// Largest possible result
    #[arg(long, default_value_t = 100, allow_negative_numbers = true)]
    max: i64,

    /// Number of results (1-10)
    #[arg(short = 'n', long, default_value_t = 1)]
    draws: u8,

    /// Number of future blocks to combine (1-5)
    #[arg(short = 'k', long, default_value_t = 1)]
    blocks: u8,
}

impl DrawArgs {
    fn builder(&self) -> CommitmentBuilder {
        CommitmentBuilder::new()
            .range(self.min, self.max)
            .draws(self.draws)
            .blocks(self.blocks)
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    draw: DrawArgs,

    /// Free-form reference appended to the proofs
    #[arg(long = "ref")]
    reference: Option<String>,

    /// Include decimal hash values in the long proof (K >= 2)
    #[arg(long)]
    decimal: bool,

    /// Write the transcript as JSON for later replay
    #[arg(long)]
    save: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env().context("invalid BBRNG_* environment")?;
    if let Some(kind) = cli.provider {
        config.provider = kind;
    }
    if cli.no_failover {
        config.failover = false;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    info!("bbrng v{}", VERSION);

    match &cli.command {
        Command::Commit(args) => commit(&load_config(&cli)?, args).await,
        Command::Run(args) => run(&load_config(&cli)?, args).await,
        Command::Verify { text } => verify(text),
        Command::Replay { path } => replay(path),
        Command::Tip => tip(&load_config(&cli)?).await,
    }
}

async fn commit(config: &Config, args: &DrawArgs) -> Result<()> {
    // Reject bad parameters before touching the network.
    args.builder().params()?;
    let source = provider::from_config(config)?;
    let commitment = args.builder().build(&*source).await?;
    println!("{}", commitment.to_text());
    Ok(())
}

async fn run(config: &Config, args: &RunArgs) -> Result<()> {
    let builder = args.draw.builder();
    builder.params()?;

    let source = provider::from_config(config)?;
    let clock = Arc::new(TokioClock);
    let tracker = Arc::new(TipTracker::new());
    let monitor = TipMonitor::spawn(source.clone(), clock.clone(), tracker.clone(), config.meta_refresh);

    let mut controller = SessionController::new(source, clock, WaitConfig::from(config))
        .with_tracker(tracker)
        .with_monitor(monitor)
        .with_proof_options(LongProofOptions {
            include_decimal: args.decimal,
            reference: args.reference.clone(),
        });

    let commitment = controller.prepare_commitment(&builder).await?;
    println!("{}", commitment.to_text());
    info!(
        start = commitment.start_height(),
        end = commitment.end_height(),
        "waiting for committed blocks, Ctrl-C to stop"
    );

    let stop = controller.stop_handle().await;
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("stop requested");
            stop.stop();
        }
    });

    let outcome = controller.begin(&builder).await;
    ctrl_c.abort();
    if let Some(monitor) = controller.take_monitor() {
        monitor.shutdown().await;
    }

    match outcome? {
        SessionOutcome::Drawn(ready) => {
            println!();
            println!("{}", ready.short_proof);
            println!();
            println!("{}", ready.long_proof);

            if let Some(path) = &args.save {
                let session = controller.session().await.context("session vanished after draw")?;
                let transcript = session.transcript.context("drawn session has no transcript")?;
                std::fs::write(path, transcript.to_json()?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "transcript saved");
            }
            Ok(())
        }
        SessionOutcome::Cancelled { session_id, filled } => {
            warn!(session = %session_id, filled, "stopped before all blocks were mined, no draws made");
            Ok(())
        }
    }
}

fn verify(text: &str) -> Result<()> {
    if text.contains(&format!("{PROOF_TAG}|")) {
        let proof = ShortProof::parse(text).context("proof rejected")?;
        println!("OK: proof {} results={:?}", proof.checksum(), proof.results());
    } else {
        let commitment = Commitment::parse(text).context("commitment rejected")?;
        println!(
            "OK: commitment {} blocks {}..={}",
            commitment.checksum(),
            commitment.start_height(),
            commitment.end_height()
        );
    }
    Ok(())
}

fn replay(path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let transcript = Transcript::from_json(&json)?;
    let result = verify_transcript(&transcript);
    if !result.valid {
        match result.error {
            Some(error) => bail!("transcript invalid: {error}"),
            None => bail!("transcript invalid"),
        }
    }
    let results: Vec<i64> = result.recomputed.iter().map(|d| d.mapped_result).collect();
    println!("OK: replayed {} draws {:?}", results.len(), results);
    println!("{}", transcript.short_proof().to_text());
    Ok(())
}

async fn tip(config: &Config) -> Result<()> {
    let source = provider::from_config(config)?;
    let tracker = TipTracker::new();
    let snapshot = refresh_tip(&*source, &TokioClock, &tracker).await?;
    let now = TokioClock.now_unix();
    let since = tracker.since_last_block(now).await.unwrap_or_default();
    println!(
        "{} tip {} (mined {}s ago)",
        source.kind(),
        snapshot.height,
        since.as_secs()
    );
    match tracker.eta(snapshot.height.saturating_add(1), now).await {
        Some(Eta::Remaining(left)) => println!("next block expected in ~{}s", left.as_secs()),
        Some(Eta::Overdue(late)) => println!("next block overdue by {}s", late.as_secs()),
        None => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_run_flags() {
        let cli = Cli::parse_from([
            "bbrng", "--provider", "bs", "run", "--min", "-50", "--max", "50", "-n", "3", "-k", "2", "--ref",
            "raffle-7", "--decimal",
        ]);
        assert_eq!(cli.provider, Some(ProviderKind::Blockstream));
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!((args.draw.min, args.draw.max, args.draw.draws, args.draw.blocks), (-50, 50, 3, 2));
        assert_eq!(args.reference.as_deref(), Some("raffle-7"));
        assert!(args.decimal);
        assert!(args.draw.builder().params().is_ok());
    }

    #[test]
    fn test_commit_defaults() {
        let cli = Cli::parse_from(["bbrng", "commit"]);
        let Command::Commit(args) = cli.command else {
            panic!("expected commit");
        };
        assert_eq!((args.min, args.max, args.draws, args.blocks), (1, 100, 1, 1));
        assert!(!cli.no_failover);
    }

    #[test]
    fn test_verify_accepts_proof_and_commitment() {
        assert!(verify("BBRNG v1|p=mp|t=800000|s=800001|k=1|r=1-6|n=3|x=[6,4,3]|crc=6D54").is_ok());
        assert!(verify("BBRNG v1|p=mp|t=800000|s=800001|k=1|r=1-6|n=3|x=[6,4,4]|crc=6D54").is_err());
        assert!(verify("garbage").is_err());
    }
}
