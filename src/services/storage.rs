use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use s3::creds::Credentials;
use s3::{Bucket, Region};

use crate::config::R2Settings;
use crate::models::job::OwnerRef;

/// Archive folder an image is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum StorageKind {
    /// The submitted photo.
    Normal,
    /// The confirmed result.
    Xray,
}

/// Archive target for confirmed jobs.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Mint a fresh destination that a submission can later reference.
    async fn create_address(&self) -> Result<String, StorageError>;

    /// Store `data` under the owner's folder for `kind`.
    async fn upload(
        &self,
        owner: &OwnerRef,
        kind: StorageKind,
        data: &[u8],
        filename: &str,
    ) -> Result<(), StorageError>;

    /// Backend name for health reporting.
    fn name(&self) -> &'static str;
}

/// Cloudflare R2 (S3-compatible) archive.
///
/// Each owner gets a numeric slot; objects live at `{slot}/{kind}/{filename}`.
/// Owners referenced by an upload link are archived by posting to the link.
pub struct R2Storage {
    bucket: Box<Bucket>,
    http: reqwest::Client,
    next_slot: AtomicU64,
}

impl R2Storage {
    pub async fn connect(settings: &R2Settings) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: settings.endpoint.clone(),
        };

        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(&settings.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let highest = highest_slot(&bucket).await?;
        tracing::info!(bucket = %settings.bucket, highest_slot = highest, "R2 archive ready");

        Ok(Self {
            bucket,
            http: reqwest::Client::new(),
            next_slot: AtomicU64::new(highest + 1),
        })
    }

    async fn upload_via_link(
        &self,
        link: &str,
        kind: StorageKind,
        data: &[u8],
        filename: &str,
    ) -> Result<(), StorageError> {
        let file = Part::bytes(data.to_vec())
            .file_name(filename.to_string())
            .mime_str("image/png")?;
        let form = Form::new()
            .text("parent_dir", format!("/{kind}"))
            .part("file", file);

        self.http
            .post(link)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl StorageSink for R2Storage {
    async fn create_address(&self) -> Result<String, StorageError> {
        let slot = self.next_slot.fetch_add(1, Ordering::SeqCst);
        // The marker keeps the slot claimed across restarts before any upload.
        self.bucket
            .put_object(slot_marker_key(slot), &[])
            .await
            .map_err(StorageError::S3)?;
        tracing::info!(slot, "Storage slot created");
        Ok(slot.to_string())
    }

    async fn upload(
        &self,
        owner: &OwnerRef,
        kind: StorageKind,
        data: &[u8],
        filename: &str,
    ) -> Result<(), StorageError> {
        match owner {
            OwnerRef::Slot(slot) => {
                let key = object_key(*slot, kind, filename);
                self.bucket
                    .put_object_with_content_type(&key, data, "image/png")
                    .await
                    .map_err(StorageError::S3)?;
            }
            OwnerRef::Link(link) => self.upload_via_link(link, kind, data, filename).await?,
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "R2"
    }
}

/// Object key of an archived image in a storage slot.
pub fn object_key(slot: u64, kind: StorageKind, filename: &str) -> String {
    format!("{slot}/{kind}/{filename}")
}

/// Placeholder object that claims a freshly minted slot.
pub fn slot_marker_key(slot: u64) -> String {
    format!("{slot}/.keep")
}

/// Highest numeric top-level prefix already present in the bucket.
async fn highest_slot(bucket: &Bucket) -> Result<u64, StorageError> {
    let pages = bucket
        .list(String::new(), Some("/".to_string()))
        .await
        .map_err(StorageError::S3)?;

    Ok(highest_numeric_prefix(
        pages
            .iter()
            .flat_map(|page| page.common_prefixes.iter().flatten())
            .map(|prefix| prefix.prefix.as_str()),
    ))
}

/// Largest slot id among top-level prefixes such as `"12/"`; 0 when none.
fn highest_numeric_prefix<'a>(prefixes: impl Iterator<Item = &'a str>) -> u64 {
    prefixes
        .filter_map(|prefix| prefix.trim_end_matches('/').parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

/// Record of an upload made to [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub owner: OwnerRef,
    pub kind: StorageKind,
    pub filename: String,
    pub data: Vec<u8>,
}

/// In-process archive, used when no object store is configured.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<Vec<StoredObject>>,
    addresses: AtomicU64,
    fail_uploads: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads made so far, in order.
    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make subsequent uploads fail with [`StorageError::Rejected`].
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageSink for MemoryStorage {
    async fn create_address(&self) -> Result<String, StorageError> {
        let n = self.addresses.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mem://upload/{n}"))
    }

    async fn upload(
        &self,
        owner: &OwnerRef,
        kind: StorageKind,
        data: &[u8],
        filename: &str,
    ) -> Result<(), StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected(filename.to_string()));
        }
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredObject {
                owner: owner.clone(),
                kind,
                filename: filename.to_string(),
                data: data.to_vec(),
            });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Upload link request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Upload rejected: {0}")]
    Rejected(String),
}
