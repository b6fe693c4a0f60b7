pub mod config;
pub mod deal;
pub mod epoch;
pub mod error;
pub mod ledger;
pub mod manifest;
pub mod pricing;

pub use config::{
    validate_import, validate_online, validate_send, DealSource, OnlineArgs, OnlineDeal,
    PublishCredentials, SendArgs, SendConfig, UploadTarget,
};
pub use deal::{DealRecord, DealSchedule};
pub use epoch::{
    current_epoch, current_epoch_at, duration_epochs, start_epoch, start_epoch_at,
    start_offset_epochs,
};
pub use error::DealError;
pub use ledger::{read_ledger, LedgerRow, LedgerWriter};
pub use manifest::{read_manifest, read_manifest_from};
pub use pricing::{deal_cost, format_cost, parse_price};
