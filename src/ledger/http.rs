//! Ledger gateway client
//!
//! Talks JSON over HTTP to a gateway that fronts the asset contract. The
//! gateway owns contract encoding and signing; this client only maps its
//! responses onto `Ledger` results.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;
use crate::store::ContentAddress;

use super::provider::Ledger;
use super::types::{
    AccountAddress, Asset, AssetId, Capabilities, LedgerError, Receipt, RegisterRequest,
};

/// HTTP ledger gateway client
pub struct HttpLedger {
    client: reqwest::Client,
    base_url: String,
    contract_address: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody<'a> {
    contract: &'a str,
    caller: &'a AccountAddress,
    #[serde(flatten)]
    request: &'a RegisterRequest,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferBody<'a> {
    contract: &'a str,
    caller: &'a AccountAddress,
    new_owner: &'a AccountAddress,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataBody<'a> {
    contract: &'a str,
    caller: &'a AccountAddress,
    name: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct BoolResponse {
    result: bool,
}

#[derive(Deserialize)]
struct CountResponse {
    total: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetIdsResponse {
    asset_ids: Vec<AssetId>,
}

impl HttpLedger {
    pub fn new(base_url: &str, contract_address: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            contract_address: contract_address.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/contracts/{}{}", self.base_url, self.contract_address, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, asset_id: Option<AssetId>) -> Result<T, LedgerError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| LedgerError::Unreachable(e.to_string()))?;
        decode(response, asset_id).await
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
        asset_id: Option<AssetId>,
    ) -> Result<T, LedgerError> {
        let response = self
            .client
            .request(method, self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| LedgerError::Unreachable(e.to_string()))?;
        decode(response, asset_id).await
    }
}

/// Map a gateway response onto a ledger result
async fn decode<T: DeserializeOwned>(response: Response, asset_id: Option<AssetId>) -> Result<T, LedgerError> {
    let status = response.status();

    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["message"].as_str().or(v["error"].as_str()).map(str::to_string))
        .unwrap_or(body);

    Err(match (status, asset_id) {
        (StatusCode::NOT_FOUND, Some(id)) => LedgerError::AssetNotFound(id),
        (StatusCode::UNAUTHORIZED, _) => LedgerError::NotConnected,
        (StatusCode::FORBIDDEN, Some(id)) => LedgerError::NotOwner(id),
        (StatusCode::CONFLICT, _) => LedgerError::AlreadyRegistered(message),
        (s, _) if s.is_server_error() => LedgerError::Unreachable(format!("{}: {}", s, message)),
        _ => LedgerError::Rejected(message),
    })
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn capabilities(&self) -> Result<Capabilities, LedgerError> {
        self.get("/capabilities", None).await
    }

    async fn register(
        &self,
        caller: &AccountAddress,
        request: &RegisterRequest,
    ) -> Result<Receipt, LedgerError> {
        let body = RegisterBody {
            contract: &self.contract_address,
            caller,
            request,
        };
        self.send(reqwest::Method::POST, "/assets", &body, None).await
    }

    async fn transfer(
        &self,
        caller: &AccountAddress,
        asset_id: AssetId,
        new_owner: &AccountAddress,
    ) -> Result<Receipt, LedgerError> {
        let body = TransferBody {
            contract: &self.contract_address,
            caller,
            new_owner,
        };
        let path = format!("/assets/{}/transfer", asset_id);
        self.send(reqwest::Method::POST, &path, &body, Some(asset_id)).await
    }

    async fn update_metadata(
        &self,
        caller: &AccountAddress,
        asset_id: AssetId,
        name: &str,
        description: &str,
    ) -> Result<Receipt, LedgerError> {
        let body = MetadataBody {
            contract: &self.contract_address,
            caller,
            name,
            description,
        };
        let path = format!("/assets/{}/metadata", asset_id);
        self.send(reqwest::Method::PUT, &path, &body, Some(asset_id)).await
    }

    async fn get_details(&self, asset_id: AssetId) -> Result<Asset, LedgerError> {
        self.get(&format!("/assets/{}", asset_id), Some(asset_id)).await
    }

    async fn assets_by_owner(&self, owner: &AccountAddress) -> Result<Vec<AssetId>, LedgerError> {
        let response: AssetIdsResponse = self.get(&format!("/owners/{}/assets", owner), None).await?;
        Ok(response.asset_ids)
    }

    async fn verify_integrity(
        &self,
        asset_id: AssetId,
        fingerprint: &Fingerprint,
    ) -> Result<bool, LedgerError> {
        let path = format!("/assets/{}/verify?fingerprint={}", asset_id, fingerprint);
        let response: BoolResponse = self.get(&path, Some(asset_id)).await?;
        Ok(response.result)
    }

    async fn total_assets(&self) -> Result<u64, LedgerError> {
        let response: CountResponse = self.get("/stats", None).await?;
        Ok(response.total)
    }

    async fn is_address_registered(&self, address: &ContentAddress) -> Result<bool, LedgerError> {
        let path = format!("/content/{}/registered", urlencoding::encode(address.as_str()));
        let response: BoolResponse = self.get(&path, None).await?;
        Ok(response.result)
    }

    async fn is_fingerprint_registered(&self, fingerprint: &Fingerprint) -> Result<bool, LedgerError> {
        let response: BoolResponse = self
            .get(&format!("/fingerprints/{}/registered", fingerprint), None)
            .await?;
        Ok(response.result)
    }
}
