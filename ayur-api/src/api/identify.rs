//! Plant identification endpoint

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{IdentifyOutcome, PipelineError, DEFAULT_ORGAN};
use crate::AppState;

/// Multipart field carrying the image
pub const FILE_FIELD: &str = "file";

/// Optional multipart field carrying the organ hint
pub const ORGAN_FIELD: &str = "organ";

/// POST /api/identify
///
/// Multipart upload: `file` (image, required) and `organ` (default "leaf").
pub async fn identify(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<IdentifyOutcome>> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut image: Option<Vec<u8>> = None;
    let mut organ = DEFAULT_ORGAN.to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                image = Some(bytes.to_vec());
            }
            Some(ORGAN_FIELD) => {
                organ = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            }
            other => debug!(field = ?other, "Ignoring unexpected multipart field"),
        }
    }

    let image = image.ok_or_else(|| {
        PipelineError::InvalidImage(format!("missing '{}' field", FILE_FIELD))
    })?;

    let outcome = state.pipeline.handle_identify(image, &organ).await?;
    Ok(Json(outcome))
}

/// Build identification routes
pub fn identify_routes() -> Router<AppState> {
    Router::new().route("/api/identify", post(identify))
}
