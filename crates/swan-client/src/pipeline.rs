use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use swan_common::{
    deal_cost, duration_epochs, format_cost, start_epoch_at, DealError, DealRecord, DealSchedule,
    LedgerWriter, SendConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::lotus::{propose, DealExecutor};

/// Scheduling fields shared by every row of one `send` run.
pub fn schedule_for(config: &SendConfig, now: DateTime<Utc>) -> Result<DealSchedule, DealError> {
    Ok(DealSchedule {
        miner_id: config.miner_id.clone(),
        sender_wallet: config.wallet.clone(),
        start_epoch: start_epoch_at(now, config.start_days)?,
        duration: duration_epochs(config.duration_days)?,
        fast_retrieval: config.fast_retrieval,
    })
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub records: Vec<DealRecord>,
    pub proposed: usize,
    pub failed: usize,
    /// Rows whose outcome could not be written to the ledger.
    pub unrecorded: usize,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.unrecorded == 0
    }
}

/// Sequential deal submission: price, propose, then persist each row in order.
pub struct DealPipeline<E> {
    executor: E,
    schedule: DealSchedule,
    price_per_gib: BigDecimal,
    ledger: Option<LedgerWriter>,
    cancel: CancellationToken,
}

impl<E: DealExecutor> DealPipeline<E> {
    pub fn new(
        executor: E,
        schedule: DealSchedule,
        price_per_gib: BigDecimal,
        ledger: Option<LedgerWriter>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            executor,
            schedule,
            price_per_gib,
            ledger,
            cancel,
        }
    }

    /// A failed proposal is recorded with an empty deal id and the batch moves
    /// on. A ledger write failure is logged with the deal id and counted in
    /// `unrecorded`; later rows are still proposed.
    pub async fn run(&self, records: Vec<DealRecord>) -> Result<BatchSummary, DealError> {
        let mut summary = BatchSummary::default();
        let total = records.len();

        for (idx, mut record) in records.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            self.schedule.apply(&mut record);
            let cost = deal_cost(&self.price_per_gib, &record.piece_size)?;
            record.cost = format_cost(&cost);

            match propose(&self.executor, &record).await {
                Ok(deal_id) => {
                    record.deal_id = deal_id;
                    summary.proposed += 1;
                    info!(
                        row = idx + 1,
                        total,
                        data_id = %record.data_id,
                        deal_id = %record.deal_id,
                        cost = %record.cost,
                        "deal proposed"
                    );
                }
                Err(_) if self.cancel.is_cancelled() => {
                    warn!(
                        row = idx + 1,
                        data_id = %record.data_id,
                        "run cancelled during proposal; row not recorded"
                    );
                    summary.cancelled = true;
                    break;
                }
                Err(err) => {
                    summary.failed += 1;
                    warn!(
                        row = idx + 1,
                        total,
                        data_id = %record.data_id,
                        deal_id = "",
                        error = %err,
                        "deal proposal failed"
                    );
                }
            }

            if let Some(ledger) = &self.ledger {
                if let Err(err) = ledger.append(&record) {
                    summary.unrecorded += 1;
                    error!(
                        row = idx + 1,
                        data_id = %record.data_id,
                        deal_id = %record.deal_id,
                        error = %err,
                        "failed to record deal in ledger"
                    );
                }
            }
            summary.records.push(record);
        }

        Ok(summary)
    }
}
