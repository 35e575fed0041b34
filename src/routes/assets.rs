//! Asset routes
//!
//! Registration and verification accept multipart uploads; everything
//! else is JSON. Ledger reads for the connected account go through the
//! owner asset cache.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ledger::Asset;
use crate::pipeline::{
    parse_asset_id, AssetContent, AssetSubmission, RegistrationOutcome, TransferOutcome,
    ValidationError, VerificationOutcome,
};
use crate::state::AppState;

/// An asset with its resolved gateway URL
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetView {
    #[serde(flatten)]
    pub asset: Asset,
    pub gateway_url: String,
    pub synthetic: bool,
}

impl AssetView {
    fn new(state: &AppState, asset: Asset) -> Self {
        let gateway_url = state.pipeline().resolve(&asset.content_address);
        let synthetic = asset.content_address.is_synthetic();
        Self {
            asset,
            gateway_url,
            synthetic,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStats {
    pub total_assets: u64,
    pub owned_assets: Option<usize>,
}

#[derive(Deserialize)]
pub struct UpdateMetadataRequest {
    pub name: String,
    pub description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub new_owner: String,
}

/// Create the assets router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_assets).post(register_asset))
        .route("/stats", get(asset_stats))
        .route("/:id", get(get_asset).patch(update_asset))
        .route("/:id/transfer", post(transfer_asset))
        .route("/:id/verify", post(verify_asset))
}

// ============================================================================
// Multipart Handling
// ============================================================================

/// File part of a multipart form
struct UploadedFile {
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

#[derive(Default)]
struct AssetForm {
    name: Option<String>,
    description: Option<String>,
    file: Option<UploadedFile>,
}

async fn read_form(multipart: &mut Multipart) -> Result<AssetForm> {
    let mut form = AssetForm::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => form.name = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        mime_guess::from_path(&file_name)
                            .first_or_octet_stream()
                            .to_string()
                    });
                let data = field.bytes().await?.to_vec();
                form.file = Some(UploadedFile {
                    file_name,
                    content_type,
                    data,
                });
            }
            other => tracing::debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/assets
async fn register_asset(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<RegistrationOutcome>)> {
    let form = read_form(&mut multipart).await?;
    let file = form.file.ok_or(ValidationError::MissingField("file"))?;

    let submission = AssetSubmission {
        name: form.name.unwrap_or_default(),
        description: form.description.unwrap_or_default(),
        file_name: file.file_name,
        content_type: file.content_type,
        content: AssetContent::Bytes(file.data),
    };

    let outcome = state.pipeline().register(submission).await?;
    state.asset_cache().invalidate().await;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/v1/assets
///
/// Assets owned by the connected account.
async fn list_assets(State(state): State<AppState>) -> Result<Json<Vec<AssetView>>> {
    let owner = state.session().require_account()?;
    let assets = state.asset_cache().get_or_load(state.ledger(), &owner).await?;

    Ok(Json(
        assets
            .into_iter()
            .map(|asset| AssetView::new(&state, asset))
            .collect(),
    ))
}

/// GET /api/v1/assets/stats
async fn asset_stats(State(state): State<AppState>) -> Result<Json<AssetStats>> {
    let total_assets = state.pipeline().total_assets().await?;
    let owned_assets = state.asset_cache().cached_len().await;

    Ok(Json(AssetStats {
        total_assets,
        owned_assets,
    }))
}

/// GET /api/v1/assets/:id
async fn get_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AssetView>> {
    let asset_id = parse_asset_id(&id)?;
    let asset = state.pipeline().details(asset_id).await?;
    Ok(Json(AssetView::new(&state, asset)))
}

/// PATCH /api/v1/assets/:id
async fn update_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateMetadataRequest>,
) -> Result<Json<AssetView>> {
    let asset_id = parse_asset_id(&id)?;
    let asset = state
        .pipeline()
        .update_metadata(asset_id, &request.name, &request.description)
        .await?;
    state.asset_cache().invalidate().await;

    Ok(Json(AssetView::new(&state, asset)))
}

/// POST /api/v1/assets/:id/transfer
async fn transfer_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferOutcome>> {
    let asset_id = parse_asset_id(&id)?;
    let outcome = state.pipeline().transfer(asset_id, &request.new_owner).await?;
    state.asset_cache().invalidate().await;

    Ok(Json(outcome))
}

/// POST /api/v1/assets/:id/verify
///
/// A mismatch is a 200 with `success: false`; only an inconclusive check
/// is reported as an error.
async fn verify_asset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<VerificationOutcome>> {
    let asset_id = parse_asset_id(&id)?;
    let form = read_form(&mut multipart).await?;
    let file = form.file.ok_or(ValidationError::MissingField("file"))?;

    let outcome = state
        .pipeline()
        .verify(asset_id, AssetContent::Bytes(file.data))
        .await?;

    Ok(Json(outcome))
}
