use chrono::{DateTime, Utc};

use crate::error::{DealError, Result};

/// Unix timestamp of the mainnet genesis block.
pub const GENESIS_UNIX_SECONDS: i64 = 1_598_306_471;
pub const SECONDS_PER_EPOCH: u64 = 30;
pub const EPOCHS_PER_HOUR: u64 = 120;
pub const HOURS_PER_DAY: u64 = 24;
const SECONDS_PER_DAY: u64 = 86_400;
/// Chain epochs are signed 64-bit on the lotus side.
const MAX_EPOCH: u64 = i64::MAX as u64;

/// Returns the chain epoch for the given instant, or 0 before genesis.
pub fn current_epoch_at(now: DateTime<Utc>) -> u64 {
    let elapsed = now.timestamp() - GENESIS_UNIX_SECONDS;
    if elapsed <= 0 {
        return 0;
    }
    elapsed as u64 / SECONDS_PER_EPOCH
}

pub fn current_epoch() -> u64 {
    current_epoch_at(Utc::now())
}

/// Number of epochs in `start_days` whole days.
pub fn start_offset_epochs(start_days: u64) -> Result<u64> {
    start_days
        .checked_mul(HOURS_PER_DAY * EPOCHS_PER_HOUR)
        .filter(|epochs| *epochs <= MAX_EPOCH)
        .ok_or_else(|| out_of_range("start", start_days))
}

/// Absolute epoch at which a deal should start, `start_days` from `now`.
pub fn start_epoch_at(now: DateTime<Utc>, start_days: u64) -> Result<u64> {
    current_epoch_at(now)
        .checked_add(start_offset_epochs(start_days)?)
        .filter(|epoch| *epoch <= MAX_EPOCH)
        .ok_or_else(|| out_of_range("start", start_days))
}

pub fn start_epoch(start_days: u64) -> Result<u64> {
    start_epoch_at(Utc::now(), start_days)
}

/// Deal length in epochs; truncated toward zero.
pub fn duration_epochs(duration_days: u64) -> Result<u64> {
    duration_days
        .checked_mul(SECONDS_PER_DAY)
        .map(|seconds| seconds / SECONDS_PER_EPOCH)
        .ok_or_else(|| out_of_range("duration", duration_days))
}

fn out_of_range(what: &str, days: u64) -> DealError {
    DealError::invalid(format!("{what} of {days} days is out of range"))
}
