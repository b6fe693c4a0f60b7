mod args;

use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use swan_common::{DealError, DealRecord};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use args::{import_args, offline_deal_args, online_deal_args, parse_import_output};

pub const DEFAULT_LOTUS_BIN: &str = "lotus";

/// Runs one external deal-making command and returns its trimmed stdout.
#[async_trait]
pub trait DealExecutor: Send + Sync {
    async fn execute(&self, args: &[String]) -> Result<String, DealError>;
}

/// Executes the `lotus` binary directly, never through a shell.
pub struct LotusCli {
    binary: PathBuf,
    cancel: CancellationToken,
}

impl LotusCli {
    pub fn new(binary: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        Self {
            binary: binary.into(),
            cancel,
        }
    }
}

#[async_trait]
impl DealExecutor for LotusCli {
    async fn execute(&self, args: &[String]) -> Result<String, DealError> {
        debug!(binary = %self.binary.display(), ?args, "invoking lotus");
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                DealError::ExternalInvocation(format!(
                    "failed to start {}: {err}",
                    self.binary.display()
                ))
            })?;

        // Dropping the wait future on cancellation drops the child, which kills it.
        let output = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(DealError::ExternalInvocation("cancelled".to_string()));
            }
            output = child.wait_with_output() => output.map_err(|err| {
                DealError::ExternalInvocation(format!(
                    "failed waiting for {}: {err}",
                    self.binary.display()
                ))
            })?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DealError::ExternalInvocation(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

/// Proposes an offline deal for `record`, returning the deal id.
pub async fn propose<E>(executor: &E, record: &DealRecord) -> Result<String, DealError>
where
    E: DealExecutor + ?Sized,
{
    let deal_id = executor.execute(&offline_deal_args(record)).await?;
    if deal_id.is_empty() {
        return Err(DealError::ExternalInvocation(
            "deal command succeeded but printed no deal id".to_string(),
        ));
    }
    Ok(deal_id)
}
