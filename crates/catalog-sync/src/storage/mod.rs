//! S3 object access

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use tracing::{debug, info, instrument};

use crate::error::FetchError;
use crate::sync::event::{BlobLocation, ObjectFetcher};

pub mod config;

#[derive(Clone)]
pub struct Storage {
    client: Client,
}

impl Storage {
    pub async fn new(config: config::StorageConfig) -> Self {
        debug!(endpoint = ?config.endpoint, path_style = config.path_style, "Initializing storage");

        let region = Region::new(config.region.clone());

        let mut builder = match config.static_credentials() {
            Some((access_key, secret_key)) => aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "catalog-sync",
                ))
                .region(region),
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        builder = builder.force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(region = %config.region, "Storage client initialized");

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl ObjectFetcher for Storage {
    #[instrument(skip_all, fields(location = %location))]
    async fn fetch(&self, location: &BlobLocation) -> Result<Vec<u8>, FetchError> {
        debug!("Downloading {}", location);

        let response = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| FetchError::Object {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                message: aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| FetchError::Body {
                bucket: location.bucket.clone(),
                key: location.key.clone(),
                message: e.to_string(),
            })?
            .into_bytes()
            .to_vec();

        debug!(bytes = data.len(), "Downloaded {}", location);

        Ok(data)
    }
}
