//! Trigger notifications and the objects they name

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{EventError, FetchError};

/// One object to ingest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobLocation {
    pub bucket: String,
    pub key: String,
}

impl BlobLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Reads the full payload of an object
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError>;
}

/// S3 event notification document
///
/// Only the fields the pipeline reads are modelled; the rest is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3EventRecord {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    #[serde(default)]
    pub bucket: S3Bucket,
    #[serde(default)]
    pub object: S3Object,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Bucket {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Object {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
}

impl S3Event {
    pub fn from_json(data: &[u8]) -> Result<Self, EventError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Objects named by the notification, in delivery order
    ///
    /// Keys arrive form-encoded (`+` for space, `%XX` escapes) and are decoded.
    pub fn locations(&self) -> Result<Vec<BlobLocation>, EventError> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let bucket = record
                    .s3
                    .bucket
                    .name
                    .as_deref()
                    .filter(|name| !name.is_empty())
                    .ok_or(EventError::MissingBucket { index })?;
                let raw_key = record
                    .s3
                    .object
                    .key
                    .as_deref()
                    .filter(|key| !key.is_empty())
                    .ok_or(EventError::MissingKey { index })?;

                Ok(BlobLocation::new(bucket, decode_object_key(index, raw_key)?))
            })
            .collect()
    }
}

fn decode_object_key(index: usize, raw: &str) -> Result<String, EventError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|key| key.into_owned())
        .map_err(|e| EventError::InvalidKey {
            index,
            key: raw.to_string(),
            message: e.to_string(),
        })
}
