use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use swan_common::{config::has_http_scheme, DealError, PublishCredentials, UploadTarget};
use tracing::info;

const DEFAULT_REGION: &str = "us-east-1";
const CREDENTIALS_PROVIDER: &str = "swan-client";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketError {
    AlreadyExists,
    AlreadyOwnedByYou,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    Created,
    Existing,
}

/// The two object-store calls a publish needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create_bucket(&self, bucket: &str) -> Result<(), BucketError>;
    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), DealError>;
}

/// Creates `bucket` unless it is already there.
pub async fn ensure_bucket<S>(store: &S, bucket: &str) -> Result<BucketState, DealError>
where
    S: ObjectStore + ?Sized,
{
    match store.create_bucket(bucket).await {
        Ok(()) => Ok(BucketState::Created),
        Err(BucketError::AlreadyExists | BucketError::AlreadyOwnedByYou) => {
            Ok(BucketState::Existing)
        }
        Err(BucketError::Other(reason)) => Err(DealError::Publish(format!(
            "unable to make bucket '{bucket}': {reason}"
        ))),
    }
}

pub async fn publish_with<S>(store: &S, bucket: &str, ledger: &Path) -> Result<String, DealError>
where
    S: ObjectStore + ?Sized,
{
    let key = ledger
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DealError::Publish(format!("ledger path {} has no file name", ledger.display()))
        })?;
    let state = ensure_bucket(store, bucket).await?;
    info!(bucket, ?state, "bucket ready");
    store.upload_file(bucket, &key, ledger).await?;
    Ok(key)
}

/// Uploads the ledger with a client session that lives only for this call.
pub async fn publish_ledger(ledger: &Path, target: &UploadTarget) -> Result<(), DealError> {
    let session = S3Session::open(&target.credentials)?;
    let result = publish_with(&session, &target.bucket, ledger).await;
    drop(session);

    let key = result?;
    info!(
        bucket = %target.bucket,
        key = %key,
        endpoint = %target.credentials.endpoint,
        "ledger published"
    );
    Ok(())
}

pub struct S3Session {
    client: Client,
}

impl S3Session {
    pub fn open(credentials: &PublishCredentials) -> Result<Self, DealError> {
        if !has_http_scheme(&credentials.endpoint) {
            return Err(DealError::Publish(format!(
                "endpoint '{}' should start with 'http://' or 'https://'",
                credentials.endpoint
            )));
        }
        let static_credentials = Credentials::new(
            credentials.access_key.clone(),
            credentials.secret_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(credentials.endpoint.clone())
            .region(Region::new(DEFAULT_REGION))
            .credentials_provider(static_credentials)
            .force_path_style(true)
            .build();
        Ok(Self {
            client: Client::from_conf(config),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Session {
    async fn create_bucket(&self, bucket: &str) -> Result<(), BucketError> {
        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                if let Some(service) = err.as_service_error() {
                    if service.is_bucket_already_owned_by_you() {
                        return Err(BucketError::AlreadyOwnedByYou);
                    }
                    if service.is_bucket_already_exists() {
                        return Err(BucketError::AlreadyExists);
                    }
                }
                Err(BucketError::Other(DisplayErrorContext(&err).to_string()))
            }
        }
    }

    async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), DealError> {
        let body = ByteStream::from_path(path).await.map_err(|err| {
            DealError::Publish(format!("failed to read {}: {err}", path.display()))
        })?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("text/csv")
            .body(body)
            .send()
            .await
            .map_err(|err| {
                DealError::Publish(format!(
                    "failed to copy {} to {bucket}/{key}: {}",
                    path.display(),
                    DisplayErrorContext(&err)
                ))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        sync::Mutex,
    };

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        buckets: Mutex<HashSet<String>>,
        objects: Mutex<HashMap<(String, String), Vec<u8>>>,
        refuse_buckets: bool,
        refuse_uploads: bool,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn create_bucket(&self, bucket: &str) -> Result<(), BucketError> {
            if self.refuse_buckets {
                return Err(BucketError::Other("access denied".to_string()));
            }
            if self.buckets.lock().unwrap().insert(bucket.to_string()) {
                Ok(())
            } else {
                Err(BucketError::AlreadyOwnedByYou)
            }
        }

        async fn upload_file(&self, bucket: &str, key: &str, path: &Path) -> Result<(), DealError> {
            if self.refuse_uploads {
                return Err(DealError::Publish(format!(
                    "unable to upload '{key}': connection reset"
                )));
            }
            if !self.buckets.lock().unwrap().contains(bucket) {
                return Err(DealError::Publish("no such bucket".to_string()));
            }
            let bytes = std::fs::read(path).map_err(|err| DealError::Publish(err.to_string()))?;
            self.objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), bytes);
            Ok(())
        }
    }

    #[tokio::test]
    async fn ensuring_a_bucket_twice_succeeds() {
        let store = MemoryStore::default();
        assert_eq!(
            ensure_bucket(&store, "swan").await.unwrap(),
            BucketState::Created
        );
        assert_eq!(
            ensure_bucket(&store, "swan").await.unwrap(),
            BucketState::Existing
        );
        assert_eq!(
            ensure_bucket(&store, "swan").await.unwrap(),
            BucketState::Existing
        );
    }

    #[tokio::test]
    async fn foreign_bucket_counts_as_existing() {
        struct Taken;

        #[async_trait]
        impl ObjectStore for Taken {
            async fn create_bucket(&self, _: &str) -> Result<(), BucketError> {
                Err(BucketError::AlreadyExists)
            }

            async fn upload_file(&self, _: &str, _: &str, _: &Path) -> Result<(), DealError> {
                Ok(())
            }
        }

        assert_eq!(
            ensure_bucket(&Taken, "swan").await.unwrap(),
            BucketState::Existing
        );
    }

    #[tokio::test]
    async fn publish_copies_ledger_under_its_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("dealMetadata-1a2b3c4d.csv");
        std::fs::write(&ledger, "data_id,filename\nbafy,a.car\n").unwrap();

        let store = MemoryStore::default();
        let key = publish_with(&store, "swan", &ledger).await.unwrap();
        assert_eq!(key, "dealMetadata-1a2b3c4d.csv");
        let objects = store.objects.lock().unwrap();
        let stored = objects
            .get(&("swan".to_string(), key.clone()))
            .expect("ledger uploaded");
        assert_eq!(stored, &std::fs::read(&ledger).unwrap());
    }

    #[tokio::test]
    async fn bucket_failure_leaves_ledger_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("ledger.csv");
        std::fs::write(&ledger, "data_id\nbafy\n").unwrap();

        let store = MemoryStore {
            refuse_buckets: true,
            ..MemoryStore::default()
        };
        let err = publish_with(&store, "swan", &ledger).await.unwrap_err();
        assert!(matches!(err, DealError::Publish(_)));
        assert_eq!(std::fs::read_to_string(&ledger).unwrap(), "data_id\nbafy\n");
        assert!(store.objects.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_is_a_publish_error_and_keeps_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("dealMetadata-5e6f7a8b.csv");
        let contents = b"data_id,deal_id,miner_id\nbafy,,f01234\n";
        std::fs::write(&ledger, contents).unwrap();

        let store = MemoryStore {
            refuse_uploads: true,
            ..MemoryStore::default()
        };
        let err = publish_with(&store, "swan", &ledger).await.unwrap_err();
        assert!(matches!(err, DealError::Publish(_)));
        assert_eq!(std::fs::read(&ledger).unwrap(), contents.to_vec());
        // The bucket step succeeded before the copy failed.
        assert!(store.buckets.lock().unwrap().contains("swan"));
        assert!(store.objects.lock().unwrap().is_empty());
    }

    #[test]
    fn session_rejects_endpoint_without_scheme() {
        let credentials = PublishCredentials {
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            endpoint: "minio.local:9000".to_string(),
        };
        assert!(matches!(
            S3Session::open(&credentials),
            Err(DealError::Publish(_))
        ));
    }
}
