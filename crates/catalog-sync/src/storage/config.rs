use catalog_common::CatalogError;
use serde::{Deserialize, Serialize};
use std::env;

use crate::config::parse_env;

/// Region used when neither `S3_REGION` nor `AWS_REGION` is set
pub const DEFAULT_S3_REGION: &str = "us-west-2";

/// S3 client settings
///
/// Without an access key pair the AWS default credential chain is used
/// (environment, profile, or the execution role of the runtime).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_S3_REGION.to_string(),
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, CatalogError> {
        Ok(Self {
            endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),
            region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| DEFAULT_S3_REGION.to_string()),
            access_key: env::var("S3_ACCESS_KEY").ok().filter(|v| !v.is_empty()),
            secret_key: env::var("S3_SECRET_KEY").ok().filter(|v| !v.is_empty()),
            path_style: parse_env("S3_PATH_STYLE", "true|false")?.unwrap_or(false),
        })
    }

    /// Local MinIO with its stock credentials
    pub fn for_minio(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: "us-east-1".to_string(),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
        }
    }

    /// Explicit key pair, if both halves are configured
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access.as_str(), secret.as_str())),
            _ => None,
        }
    }
}
