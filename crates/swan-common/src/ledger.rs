use std::{
    fs::{File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    deal::DealRecord,
    error::{DealError, Result},
};

pub const LEDGER_HEADER: [&str; 6] = [
    "data_id",
    "filename",
    "piece_id",
    "piece_size",
    "deal_id",
    "miner_id",
];

/// One persisted ledger line. `deal_id` is empty for failed proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub data_id: String,
    pub filename: String,
    pub piece_id: String,
    pub piece_size: String,
    pub deal_id: String,
    pub miner_id: String,
}

impl From<&DealRecord> for LedgerRow {
    fn from(record: &DealRecord) -> Self {
        Self {
            data_id: record.data_id.clone(),
            filename: record.filename.clone(),
            piece_id: record.piece_id.clone(),
            piece_size: record.piece_size.clone(),
            deal_id: record.deal_id.clone(),
            miner_id: record.miner_id.clone(),
        }
    }
}

/// Append-only CSV ledger of deal attempts.
///
/// Each `append` opens the file, writes one row and flushes, so a crash loses
/// at most the row being written. There is no locking: one writer per path.
#[derive(Debug, Clone)]
pub struct LedgerWriter {
    path: PathBuf,
}

impl LedgerWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Ledger named `dealMetadata-<id>.csv` beside the manifest.
    pub fn beside_manifest<P: AsRef<Path>>(manifest: P) -> Result<Self> {
        let manifest = manifest.as_ref();
        let absolute = std::path::absolute(manifest).map_err(|err| {
            DealError::invalid(format!(
                "failed to resolve manifest path {}: {err}",
                manifest.display()
            ))
        })?;
        let parent = absolute
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::new(parent.join(ledger_file_name(Uuid::new_v4()))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &DealRecord) -> Result<()> {
        let (file, fresh) = self.open()?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer
                .write_record(LEDGER_HEADER)
                .map_err(|err| self.csv_failure(err))?;
        }
        writer
            .serialize(LedgerRow::from(record))
            .map_err(|err| self.csv_failure(err))?;
        writer
            .flush()
            .map_err(|err| DealError::persistence(&self.path, err))?;
        Ok(())
    }

    /// Opens for appending; the flag is true when the file holds no header yet.
    fn open(&self) -> Result<(File, bool)> {
        let created = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path);
        match created {
            Ok(file) => Ok((file, true)),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let file = OpenOptions::new()
                    .append(true)
                    .open(&self.path)
                    .map_err(|err| DealError::persistence(&self.path, err))?;
                let empty = file
                    .metadata()
                    .map_err(|err| DealError::persistence(&self.path, err))?
                    .len()
                    == 0;
                Ok((file, empty))
            }
            Err(err) => Err(DealError::persistence(&self.path, err)),
        }
    }

    fn csv_failure(&self, err: csv::Error) -> DealError {
        DealError::persistence(&self.path, std::io::Error::other(err))
    }
}

pub fn ledger_file_name(id: Uuid) -> String {
    let short = id.simple().to_string();
    format!("dealMetadata-{}.csv", &short[..8])
}

/// Re-reads a ledger written by [`LedgerWriter`].
pub fn read_ledger<P: AsRef<Path>>(path: P) -> Result<Vec<LedgerRow>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| DealError::persistence(path, std::io::Error::other(err)))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<LedgerRow>, _>>()
        .map_err(|err| DealError::persistence(path, std::io::Error::other(err)))
}
