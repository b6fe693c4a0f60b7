use serde::{Deserialize, Serialize};

/// One deal to propose, and afterwards its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRecord {
    pub data_id: String,
    pub piece_id: String,
    pub piece_size: String,
    pub filename: String,
    pub miner_id: String,
    pub sender_wallet: String,
    pub start_epoch: u64,
    pub duration: u64,
    pub cost: String,
    pub fast_retrieval: bool,
    /// Empty until a proposal succeeds.
    pub deal_id: String,
}

impl DealRecord {
    pub fn new(
        data_id: impl Into<String>,
        filename: impl Into<String>,
        piece_id: impl Into<String>,
        piece_size: impl Into<String>,
    ) -> Self {
        Self {
            data_id: data_id.into(),
            piece_id: piece_id.into(),
            piece_size: piece_size.into(),
            filename: filename.into(),
            miner_id: String::new(),
            sender_wallet: String::new(),
            start_epoch: 0,
            duration: 0,
            cost: String::new(),
            fast_retrieval: true,
            deal_id: String::new(),
        }
    }

    pub fn is_proposed(&self) -> bool {
        !self.deal_id.is_empty()
    }
}

/// Per-run scheduling shared by every record of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealSchedule {
    pub miner_id: String,
    pub sender_wallet: String,
    pub start_epoch: u64,
    pub duration: u64,
    pub fast_retrieval: bool,
}

impl DealSchedule {
    pub fn apply(&self, record: &mut DealRecord) {
        record.miner_id = self.miner_id.clone();
        record.sender_wallet = self.sender_wallet.clone();
        record.start_epoch = self.start_epoch;
        record.duration = self.duration;
        record.fast_retrieval = self.fast_retrieval;
    }
}
