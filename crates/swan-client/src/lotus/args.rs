use std::path::Path;

use swan_common::{DealRecord, OnlineDeal};

/// argv for `lotus client deal` with a manually supplied piece (offline deal).
pub fn offline_deal_args(record: &DealRecord) -> Vec<String> {
    vec![
        "client".to_string(),
        "deal".to_string(),
        "--from".to_string(),
        record.sender_wallet.clone(),
        "--start-epoch".to_string(),
        record.start_epoch.to_string(),
        format!("--fast-retrieval={}", record.fast_retrieval),
        "--manual-piece-cid".to_string(),
        record.piece_id.clone(),
        "--manual-piece-size".to_string(),
        record.piece_size.clone(),
        record.data_id.clone(),
        record.miner_id.clone(),
        record.cost.clone(),
        record.duration.to_string(),
    ]
}

pub fn online_deal_args(deal: &OnlineDeal) -> Vec<String> {
    vec![
        "client".to_string(),
        "deal".to_string(),
        "--from".to_string(),
        deal.wallet.clone(),
        format!("--verified-deal={}", deal.verified_deal),
        format!("--fast-retrieval={}", deal.fast_retrieval),
        deal.data_cid.clone(),
        deal.miner_id.clone(),
        deal.price.clone(),
        deal.duration.clone(),
    ]
}

pub fn import_args(object_path: &Path) -> Vec<String> {
    vec![
        "client".to_string(),
        "import".to_string(),
        object_path.display().to_string(),
    ]
}

/// `lotus client import` prints `Import <n>, Root <cid>`; the CID is the last token.
pub fn parse_import_output(stdout: &str) -> Option<String> {
    stdout.split_whitespace().last().map(str::to_string)
}
