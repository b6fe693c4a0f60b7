mod lotus;
mod miner;
mod pipeline;
mod publish;

use std::{env, future::Future, io, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use swan_common::{
    config::{
        DEFAULT_BUCKET, DEFAULT_DURATION_DAYS, DEFAULT_ONLINE_DURATION_EPOCHS, DEFAULT_PRICE,
        DEFAULT_START_DAYS,
    },
    read_manifest, validate_import, validate_online, validate_send, DealRecord, DealSource,
    LedgerWriter, OnlineArgs, SendArgs,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lotus::{
    import_args, online_deal_args, parse_import_output, DealExecutor, LotusCli, DEFAULT_LOTUS_BIN,
};
use miner::{fetch_miners, render_table, Region};
use pipeline::{schedule_for, DealPipeline};
use publish::publish_ledger;

#[derive(Parser, Debug)]
#[command(
    name = "swan-client",
    author,
    version,
    about = "Propose Filecoin storage deals in batches and publish their ledgers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Path to the lotus binary
    #[arg(long, env = "LOTUS_BIN", default_value = DEFAULT_LOTUS_BIN, global = true)]
    lotus_bin: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send offline deals for a manifest or a single piece
    Send(SendCmd),
    /// Send one online deal for data already imported into lotus
    SendOnline(SendOnlineCmd),
    /// Import an FS3 object into the local lotus client
    Import(ImportCmd),
    /// List information from the Swan directory
    List {
        #[command(subcommand)]
        target: ListTarget,
    },
}

#[derive(Subcommand, Debug)]
enum ListTarget {
    /// List active miners, optionally filtered by region
    Miner {
        #[arg(long, value_enum)]
        region: Option<Region>,
    },
}

#[derive(Args, Debug)]
struct SendCmd {
    /// Target miner id
    #[arg(value_name = "MINER")]
    args: Vec<String>,

    /// Wallet to send deals from
    #[arg(long, env = "FIL_WALLET")]
    from: Option<String>,

    /// Days from now until the miner must start the deal
    #[arg(long, default_value_t = DEFAULT_START_DAYS)]
    start: u64,

    /// Days to store the data
    #[arg(long, default_value_t = DEFAULT_DURATION_DAYS)]
    duration: u64,

    /// Deal price per GiB
    #[arg(long, default_value = DEFAULT_PRICE)]
    price: String,

    /// Manifest CSV produced by CAR generation
    #[arg(long)]
    input: Option<String>,

    #[arg(long)]
    piece_cid: Option<String>,

    #[arg(long)]
    piece_size: Option<String>,

    #[arg(long)]
    data_cid: Option<String>,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    fast_retrieval: bool,

    /// Ledger path (defaults to dealMetadata-<id>.csv beside the manifest)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Upload the ledger to object storage (needs ACCESS_KEY, SECRET_KEY and ENDPOINT)
    #[arg(long, default_value_t = false)]
    upload: bool,

    /// Bucket receiving the uploaded ledger
    #[arg(long, default_value = DEFAULT_BUCKET)]
    minio_bucket: String,
}

impl SendCmd {
    fn into_args(self) -> SendArgs {
        SendArgs {
            positional: self.args,
            wallet: self.from,
            start_days: self.start,
            duration_days: self.duration,
            price: self.price,
            input: self.input,
            piece_cid: self.piece_cid,
            piece_size: self.piece_size,
            data_cid: self.data_cid,
            fast_retrieval: self.fast_retrieval,
            output: self.output,
            upload: self.upload,
            bucket: self.minio_bucket,
        }
    }
}

#[derive(Args, Debug)]
struct SendOnlineCmd {
    #[arg(long, env = "FIL_WALLET")]
    from: Option<String>,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    verified_deal: bool,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    fast_retrieval: bool,

    #[arg(long)]
    data_cid: Option<String>,

    #[arg(long)]
    miner_id: Option<String>,

    /// Deal price per epoch
    #[arg(long, default_value = DEFAULT_PRICE)]
    price: String,

    /// Deal duration in epochs
    #[arg(long, default_value = DEFAULT_ONLINE_DURATION_EPOCHS)]
    duration: String,
}

#[derive(Args, Debug)]
struct ImportCmd {
    #[arg(long)]
    bucket: String,

    #[arg(long)]
    object: String,

    /// Root directory of the FS3 volume
    #[arg(long, env = "FS3_VOLUME_ADDRESS")]
    volume_address: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Send(cmd) => run_send(cmd, cli.lotus_bin).await,
        Commands::SendOnline(cmd) => run_send_online(cmd, cli.lotus_bin).await,
        Commands::Import(cmd) => run_import(cmd, cli.lotus_bin).await,
        Commands::List {
            target: ListTarget::Miner { region },
        } => {
            let miners = fetch_miners(region).await?;
            print!("{}", render_table(&miners));
            Ok(())
        }
    }
}

fn init_logging(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if relay_interrupts(&cancel, tokio::signal::ctrl_c).await {
            warn!("received second Ctrl+C, exiting");
            std::process::exit(130);
        }
    });
}

/// First interrupt cancels `cancel`; returns true once a second one arrives.
async fn relay_interrupts<S, Fut>(cancel: &CancellationToken, mut next_interrupt: S) -> bool
where
    S: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return false;
    }
    warn!("received Ctrl+C, stopping after the in-flight deal is terminated");
    cancel.cancel();
    next_interrupt().await.is_ok()
}

/// Token for commands that drive `lotus`; installed once arguments are valid.
fn interruptible() -> CancellationToken {
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());
    cancel
}

async fn run_send(cmd: SendCmd, lotus_bin: PathBuf) -> Result<()> {
    let config = validate_send(&cmd.into_args(), |key| env::var(key).ok())?;

    let records = match &config.source {
        DealSource::Manifest(path) => read_manifest(path)?,
        DealSource::Inline {
            piece_cid,
            piece_size,
            data_cid,
        } => vec![DealRecord::new(
            data_cid.as_str(),
            "",
            piece_cid.as_str(),
            piece_size.as_str(),
        )],
    };

    let ledger = match (&config.output, &config.source) {
        (Some(output), _) => Some(LedgerWriter::new(output)),
        (None, DealSource::Manifest(path)) => Some(LedgerWriter::beside_manifest(path)?),
        (None, DealSource::Inline { .. }) => None,
    };

    let schedule = schedule_for(&config, Utc::now())?;
    let cancel = interruptible();
    info!(
        miner = %schedule.miner_id,
        start_epoch = schedule.start_epoch,
        duration = schedule.duration,
        price_per_gib = %config.price,
        rows = records.len(),
        ledger = ?ledger.as_ref().map(|l| l.path().display().to_string()),
        "sending deals"
    );

    let pipeline = DealPipeline::new(
        LotusCli::new(lotus_bin, cancel.clone()),
        schedule,
        config.price.clone(),
        ledger.clone(),
        cancel.clone(),
    );
    let summary = pipeline.run(records).await?;
    info!(
        proposed = summary.proposed,
        failed = summary.failed,
        unrecorded = summary.unrecorded,
        "deal batch finished"
    );
    if summary.cancelled {
        return Err(anyhow!(
            "run interrupted after {} recorded row(s)",
            summary.records.len()
        ));
    }
    if summary.unrecorded > 0 {
        return Err(anyhow!(
            "{} deal(s) could not be written to the ledger; upload skipped",
            summary.unrecorded
        ));
    }

    if let (Some(target), Some(ledger)) = (&config.upload, &ledger) {
        tokio::select! {
            _ = cancel.cancelled() => return Err(anyhow!("publish interrupted")),
            result = publish_ledger(ledger.path(), target) => {
                if let Err(err) = result {
                    error!(ledger = %ledger.path().display(), error = %err, "ledger kept locally");
                    return Err(err).context("failed to publish ledger");
                }
            }
        }
    }
    Ok(())
}

async fn run_send_online(cmd: SendOnlineCmd, lotus_bin: PathBuf) -> Result<()> {
    let deal = validate_online(&OnlineArgs {
        wallet: cmd.from,
        verified_deal: cmd.verified_deal,
        fast_retrieval: cmd.fast_retrieval,
        data_cid: cmd.data_cid,
        miner_id: cmd.miner_id,
        price: cmd.price,
        duration: cmd.duration,
    })?;

    let lotus = LotusCli::new(lotus_bin, interruptible());
    match lotus.execute(&online_deal_args(&deal)).await {
        Ok(deal_id) => {
            info!(data_id = %deal.data_cid, deal_id = %deal_id, "online deal proposed");
            Ok(())
        }
        Err(err) => {
            error!(data_id = %deal.data_cid, deal_id = "", error = %err, "online deal failed");
            Err(err.into())
        }
    }
}

async fn run_import(cmd: ImportCmd, lotus_bin: PathBuf) -> Result<()> {
    let (bucket, object) = validate_import(&cmd.bucket, &cmd.object)?;
    let object_path = cmd.volume_address.join(&bucket).join(&object);

    let lotus = LotusCli::new(lotus_bin, interruptible());
    let stdout = lotus
        .execute(&import_args(&object_path))
        .await
        .with_context(|| format!("failed to import {}", object_path.display()))?;
    let data_cid = parse_import_output(&stdout)
        .ok_or_else(|| anyhow!("lotus import printed no data cid"))?;
    info!(bucket = %bucket, object = %object, data_cid = %data_cid, "object imported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn first_interrupt_cancels_and_second_requests_exit() {
        let cancel = CancellationToken::new();
        let seen = AtomicUsize::new(0);
        let exit = relay_interrupts(&cancel, || {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), io::Error>(()) }
        })
        .await;
        assert!(cancel.is_cancelled());
        assert!(exit);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unavailable_signal_leaves_token_untouched() {
        let cancel = CancellationToken::new();
        let exit = relay_interrupts(&cancel, || async {
            Err::<(), io::Error>(io::Error::other("no signal handler"))
        })
        .await;
        assert!(!exit);
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn cli_defaults_match_deal_defaults() {
        let cli = Cli::try_parse_from(["swan-client", "send", "f01234", "--input", "car.csv"])
            .unwrap();
        let Commands::Send(cmd) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(cmd.start, 7);
        assert_eq!(cmd.duration, 365);
        assert_eq!(cmd.price, "0");
        assert_eq!(cmd.minio_bucket, "swan");
        assert!(cmd.fast_retrieval);
        assert!(!cmd.upload);
        assert_eq!(cmd.args, vec!["f01234".to_string()]);
    }

    #[test]
    fn fast_retrieval_can_be_disabled() {
        let cli = Cli::try_parse_from([
            "swan-client",
            "send",
            "f01234",
            "--fast-retrieval",
            "false",
            "--piece-cid",
            "baga",
            "--piece-size",
            "1024",
            "--data-cid",
            "bafy",
        ])
        .unwrap();
        let Commands::Send(cmd) = cli.command else {
            panic!("expected send");
        };
        let args = cmd.into_args();
        assert!(!args.fast_retrieval);
        assert_eq!(args.piece_size.as_deref(), Some("1024"));
    }

    #[test]
    fn list_miner_accepts_region() {
        let cli = Cli::try_parse_from(["swan-client", "list", "miner", "--region", "Europe"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::List {
                target: ListTarget::Miner {
                    region: Some(Region::Europe)
                }
            }
        ));
        assert!(
            Cli::try_parse_from(["swan-client", "list", "miner", "--region", "Mars"]).is_err()
        );
    }

    #[test]
    fn online_duration_defaults_to_epochs() {
        let cli = Cli::try_parse_from(["swan-client", "send-online", "--data-cid", "bafy"])
            .unwrap();
        let Commands::SendOnline(cmd) = cli.command else {
            panic!("expected send-online");
        };
        assert_eq!(cmd.duration, "1036800");
        assert!(!cmd.verified_deal);
    }
}
