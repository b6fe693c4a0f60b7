use std::{fs::File, io::Read, path::Path};

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::{
    deal::DealRecord,
    error::{DealError, Result},
    pricing::is_unsigned_integer,
};

const MANIFEST_COLUMNS: usize = 4;

/// Loads every pending deal from a manifest CSV
/// (`data_id, filename, piece_id, piece_size`), header skipped.
///
/// The whole file is validated up front so a bad row is reported before any
/// deal goes out.
pub fn read_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<DealRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| {
        DealError::invalid(format!("failed to open manifest {}: {err}", path.display()))
    })?;
    read_manifest_from(file)
}

pub fn read_manifest_from<R: Read>(reader: R) -> Result<Vec<DealRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(|err| {
            let line = err.position().map(|pos| pos.line()).unwrap_or_default();
            DealError::MalformedManifest {
                line,
                reason: err.to_string(),
            }
        })?;
        records.push(parse_row(&row)?);
    }
    Ok(records)
}

fn parse_row(row: &StringRecord) -> Result<DealRecord> {
    let line = row.position().map(|pos| pos.line()).unwrap_or_default();
    let malformed = |reason: String| DealError::MalformedManifest { line, reason };

    if row.len() < MANIFEST_COLUMNS {
        return Err(malformed(format!(
            "expected {MANIFEST_COLUMNS} columns, found {}",
            row.len()
        )));
    }

    let (data_id, filename, piece_id, piece_size) = (&row[0], &row[1], &row[2], &row[3]);
    for (name, value) in [
        ("data_id", data_id),
        ("piece_id", piece_id),
        ("piece_size", piece_size),
    ] {
        if value.is_empty() {
            return Err(malformed(format!("{name} is empty")));
        }
    }
    if !is_unsigned_integer(piece_size) {
        return Err(malformed(format!(
            "piece_size '{piece_size}' is not an unsigned integer"
        )));
    }

    Ok(DealRecord::new(data_id, filename, piece_id, piece_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Vec<DealRecord>> {
        read_manifest_from(raw.as_bytes())
    }

    #[test]
    fn reads_rows_in_order_and_skips_header() {
        let raw = "data_cid,filename,piece_cid,piece_size\n\
                   bafy1,a.car,baga1,34359738368\n\
                   bafy2,b.car,baga2,17179869184\n\
                   bafy3,c.car,baga3,1024\n";
        let records = parse(raw).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.data_id.as_str()).collect();
        assert_eq!(ids, vec!["bafy1", "bafy2", "bafy3"]);
        assert_eq!(records[1].filename, "b.car");
        assert_eq!(records[1].piece_id, "baga2");
        assert_eq!(records[1].piece_size, "17179869184");
        assert!(records.iter().all(|r| r.deal_id.is_empty() && r.fast_retrieval));
    }

    #[test]
    fn header_only_manifest_is_empty() {
        assert!(parse("data_cid,filename,piece_cid,piece_size\n")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn extra_columns_are_ignored() {
        let raw = "h1,h2,h3,h4,h5\nbafy1,a.car,baga1,1024,extra\n";
        let records = parse(raw).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].piece_size, "1024");
    }

    #[test]
    fn short_row_is_malformed() {
        let raw = "h1,h2,h3,h4\nbafy1,a.car,baga1,1024\nbafy2,b.car\n";
        let err = parse(raw).unwrap_err();
        match err {
            DealError::MalformedManifest { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("expected 4 columns"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn empty_or_non_numeric_fields_are_malformed() {
        assert!(matches!(
            parse("h1,h2,h3,h4\n,a.car,baga1,1024\n"),
            Err(DealError::MalformedManifest { .. })
        ));
        assert!(matches!(
            parse("h1,h2,h3,h4\nbafy1,a.car,baga1,16GiB\n"),
            Err(DealError::MalformedManifest { .. })
        ));
    }

    #[test]
    fn missing_file_is_invalid_argument() {
        let err = read_manifest("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, DealError::InvalidArgument(_)));
    }
}
