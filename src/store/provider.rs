//! Content store providers
//!
//! Defines the store trait and the Pinata and offline implementations.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::StoreConfig;

use super::types::{ContentAddress, StoreError, UploadMetadata, SYNTHETIC_PREFIX};

/// Content-addressed storage for asset bytes
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload bytes and return their content address
    async fn put(&self, data: &[u8], metadata: &UploadMetadata) -> Result<ContentAddress, StoreError>;

    /// Map an address to a fetchable URL
    fn resolve(&self, address: &ContentAddress) -> String;
}

/// Deterministic address → URL mapping shared by all stores
///
/// Synthetic addresses map to a placeholder image instead of a gateway fetch.
pub fn gateway_url(gateway: &str, address: &ContentAddress) -> String {
    if address.is_synthetic() {
        return format!(
            "https://picsum.photos/seed/{}/400/300",
            urlencoding::encode(address.as_str())
        );
    }
    format!("{}/ipfs/{}", gateway.trim_end_matches('/'), address)
}

/// Pinata pinning service
pub struct PinataStore {
    client: reqwest::Client,
    api_url: String,
    gateway_url: String,
    api_key: Option<String>,
    secret_key: Option<String>,
}

#[derive(Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

impl PinataStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            gateway_url: config.gateway_url.clone(),
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), StoreError> {
        match (self.api_key.as_deref(), self.secret_key.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => Ok((key, secret)),
            _ => Err(StoreError::MissingCredentials),
        }
    }
}

#[async_trait]
impl ContentStore for PinataStore {
    async fn put(&self, data: &[u8], metadata: &UploadMetadata) -> Result<ContentAddress, StoreError> {
        let (api_key, secret_key) = self.credentials()?;

        let pinata_metadata = serde_json::json!({
            "name": metadata.file_name,
            "keyvalues": {
                "description": metadata.description,
                "app": "asset-vault",
                "timestamp": Utc::now().timestamp_millis().to_string(),
            }
        });

        let file = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(metadata.file_name.clone())
            .mime_str(&metadata.content_type)?;

        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("pinataMetadata", pinata_metadata.to_string())
            .text("pinataOptions", serde_json::json!({ "cidVersion": 0 }).to_string());

        let url = format!("{}/pinning/pinFileToIPFS", self.api_url);
        tracing::debug!(url = %url, size = data.len(), "Pinning file");

        let response = self
            .client
            .post(&url)
            .header("pinata_api_key", api_key)
            .header("pinata_secret_api_key", secret_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(StoreError::Api { status, message });
        }

        let pin: PinResponse = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

        if pin.ipfs_hash.is_empty() {
            return Err(StoreError::InvalidResponse("empty IpfsHash".to_string()));
        }

        Ok(ContentAddress::new(pin.ipfs_hash))
    }

    fn resolve(&self, address: &ContentAddress) -> String {
        gateway_url(&self.gateway_url, address)
    }
}

/// Offline store that never touches the network
///
/// Every address it returns carries the synthetic prefix.
pub struct MockStore {
    gateway_url: String,
}

impl MockStore {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
        }
    }

    /// Build a synthetic address from a file name and the current time
    ///
    /// A random suffix keeps same-millisecond uploads distinct.
    pub fn synthetic_address(file_name: &str) -> ContentAddress {
        let stem: String = file_name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        let nonce = Uuid::new_v4().simple().to_string();
        ContentAddress::new(format!(
            "{}{}-{}-{}",
            SYNTHETIC_PREFIX,
            stem,
            Utc::now().timestamp_millis(),
            &nonce[..8]
        ))
    }
}

#[async_trait]
impl ContentStore for MockStore {
    async fn put(&self, _data: &[u8], metadata: &UploadMetadata) -> Result<ContentAddress, StoreError> {
        Ok(Self::synthetic_address(&metadata.file_name))
    }

    fn resolve(&self, address: &ContentAddress) -> String {
        gateway_url(&self.gateway_url, address)
    }
}

/// Store that always fails, for exercising the store stage
#[cfg(test)]
pub struct FailingStore;

#[cfg(test)]
#[async_trait]
impl ContentStore for FailingStore {
    async fn put(&self, _data: &[u8], _metadata: &UploadMetadata) -> Result<ContentAddress, StoreError> {
        Err(StoreError::Request("connection refused".to_string()))
    }

    fn resolve(&self, address: &ContentAddress) -> String {
        gateway_url("https://gateway.pinata.cloud", address)
    }
}
