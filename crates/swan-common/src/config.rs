use std::path::PathBuf;

use bigdecimal::BigDecimal;

use crate::{
    epoch::{duration_epochs, start_offset_epochs},
    error::{DealError, Result},
    pricing::{is_unsigned_integer, parse_price},
};

pub const DEFAULT_START_DAYS: u64 = 7;
pub const DEFAULT_DURATION_DAYS: u64 = 365;
pub const DEFAULT_PRICE: &str = "0";
pub const DEFAULT_BUCKET: &str = "swan";
pub const DEFAULT_ONLINE_DURATION_EPOCHS: &str = "1036800";

pub const ACCESS_KEY_ENV: &str = "ACCESS_KEY";
pub const SECRET_KEY_ENV: &str = "SECRET_KEY";
pub const ENDPOINT_ENV: &str = "ENDPOINT";

/// Raw `send` parameters as collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct SendArgs {
    pub positional: Vec<String>,
    pub wallet: Option<String>,
    pub start_days: u64,
    pub duration_days: u64,
    pub price: String,
    pub input: Option<String>,
    pub piece_cid: Option<String>,
    pub piece_size: Option<String>,
    pub data_cid: Option<String>,
    pub fast_retrieval: bool,
    pub output: Option<PathBuf>,
    pub upload: bool,
    pub bucket: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealSource {
    Manifest(PathBuf),
    Inline {
        piece_cid: String,
        piece_size: String,
        data_cid: String,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct PublishCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
}

impl std::fmt::Debug for PublishCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl PublishCredentials {
    /// Reads credentials through `lookup` and checks them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let credentials = Self {
            access_key: read(ACCESS_KEY_ENV),
            secret_key: read(SECRET_KEY_ENV),
            endpoint: read(ENDPOINT_ENV),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    pub fn validate(&self) -> Result<()> {
        if !has_http_scheme(&self.endpoint) {
            return Err(DealError::invalid(format!(
                "endpoint '{}' should start with 'http://' or 'https://'",
                self.endpoint
            )));
        }
        if self.access_key.is_empty() {
            return Err(DealError::invalid(format!("${ACCESS_KEY_ENV} not provided")));
        }
        if self.secret_key.is_empty() {
            return Err(DealError::invalid(format!("${SECRET_KEY_ENV} not provided")));
        }
        Ok(())
    }
}

pub fn has_http_scheme(endpoint: &str) -> bool {
    endpoint.starts_with("http://") || endpoint.starts_with("https://")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub bucket: String,
    pub credentials: PublishCredentials,
}

/// Validated `send` configuration handed to the pipeline.
#[derive(Debug, Clone)]
pub struct SendConfig {
    pub miner_id: String,
    pub wallet: String,
    pub start_days: u64,
    pub duration_days: u64,
    pub price: BigDecimal,
    pub source: DealSource,
    pub fast_retrieval: bool,
    pub output: Option<PathBuf>,
    pub upload: Option<UploadTarget>,
}

/// Checks `send` arguments. `lookup_env` is only consulted when an upload is
/// requested.
pub fn validate_send<F>(args: &SendArgs, lookup_env: F) -> Result<SendConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if args.positional.iter().any(|arg| arg.trim().is_empty()) {
        return Err(DealError::invalid("unable to validate empty argument"));
    }
    let miner_id = args
        .positional
        .first()
        .map(|arg| arg.trim().to_string())
        .ok_or_else(|| DealError::invalid("a target miner id is required"))?;

    let source = match args.input.as_deref() {
        Some(input) => {
            let input = input.trim();
            if input.is_empty() {
                return Err(DealError::invalid("please provide an input path"));
            }
            let path = PathBuf::from(input);
            if !path.exists() {
                return Err(DealError::invalid(format!(
                    "input path {} does not exist",
                    path.display()
                )));
            }
            DealSource::Manifest(path)
        }
        None => {
            let piece_cid = trimmed(&args.piece_cid);
            let piece_size = trimmed(&args.piece_size);
            let data_cid = trimmed(&args.data_cid);
            if piece_cid.is_empty() || piece_size.is_empty() || data_cid.is_empty() {
                return Err(DealError::invalid(
                    "please provide valid piece-cid, piece-size and data-cid",
                ));
            }
            if !is_unsigned_integer(&piece_size) {
                return Err(DealError::invalid(format!(
                    "piece-size '{piece_size}' is not an unsigned integer"
                )));
            }
            DealSource::Inline {
                piece_cid,
                piece_size,
                data_cid,
            }
        }
    };

    let wallet = trimmed(&args.wallet);
    if wallet.is_empty() {
        return Err(DealError::invalid("please provide a valid wallet"));
    }
    if args.start_days == 0 {
        return Err(DealError::invalid(
            "please provide a valid length of start time in days",
        ));
    }
    if args.duration_days == 0 {
        return Err(DealError::invalid(
            "please provide a valid length of duration in days",
        ));
    }
    start_offset_epochs(args.start_days)?;
    duration_epochs(args.duration_days)?;
    let price = parse_price(&args.price)?;

    let writes_ledger = matches!(source, DealSource::Manifest(_)) || args.output.is_some();
    let upload = if args.upload {
        if !writes_ledger {
            return Err(DealError::invalid(
                "--upload needs a ledger: pass --input or --output",
            ));
        }
        let bucket = args.bucket.trim().to_string();
        if bucket.is_empty() {
            return Err(DealError::invalid("please provide a bucket name"));
        }
        Some(UploadTarget {
            bucket,
            credentials: PublishCredentials::from_lookup(lookup_env)?,
        })
    } else {
        None
    };

    Ok(SendConfig {
        miner_id,
        wallet,
        start_days: args.start_days,
        duration_days: args.duration_days,
        price,
        source,
        fast_retrieval: args.fast_retrieval,
        output: args.output.clone(),
        upload,
    })
}

/// Raw `send-online` parameters.
#[derive(Debug, Clone, Default)]
pub struct OnlineArgs {
    pub wallet: Option<String>,
    pub verified_deal: bool,
    pub fast_retrieval: bool,
    pub data_cid: Option<String>,
    pub miner_id: Option<String>,
    pub price: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineDeal {
    pub wallet: String,
    pub verified_deal: bool,
    pub fast_retrieval: bool,
    pub data_cid: String,
    pub miner_id: String,
    pub price: String,
    pub duration: String,
}

pub fn validate_online(args: &OnlineArgs) -> Result<OnlineDeal> {
    let wallet = trimmed(&args.wallet);
    if wallet.is_empty() {
        return Err(DealError::invalid("please provide a valid wallet"));
    }
    let data_cid = trimmed(&args.data_cid);
    if data_cid.is_empty() {
        return Err(DealError::invalid("please provide a valid data-cid"));
    }
    let miner_id = trimmed(&args.miner_id);
    if miner_id.is_empty() {
        return Err(DealError::invalid("please provide a valid miner-id"));
    }
    let duration = args.duration.trim().to_string();
    if !is_unsigned_integer(&duration) {
        return Err(DealError::invalid(
            "please provide a valid duration in epochs",
        ));
    }
    let price = args.price.trim().to_string();
    if price.is_empty() {
        return Err(DealError::invalid("please provide a valid price"));
    }
    parse_price(&price)?;

    Ok(OnlineDeal {
        wallet,
        verified_deal: args.verified_deal,
        fast_retrieval: args.fast_retrieval,
        data_cid,
        miner_id,
        price,
        duration,
    })
}

/// Checks `import` arguments, returning the trimmed bucket and object names.
pub fn validate_import(bucket: &str, object: &str) -> Result<(String, String)> {
    let bucket = bucket.trim();
    let object = object.trim();
    if bucket.is_empty() {
        return Err(DealError::invalid("please provide a valid bucket name"));
    }
    if object.is_empty() {
        return Err(DealError::invalid("please provide a valid object name"));
    }
    Ok((bucket.to_string(), object.to_string()))
}

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}
