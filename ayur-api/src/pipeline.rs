//! Identification + enrichment pipeline
//!
//! image → decode check → provider → top candidate → knowledge store merge
//! → skeleton upsert → combined response.
//!
//! Every successful identification is recorded in the store, even when the
//! merge learns nothing new, so the store grows with usage.

use crate::plantnet::{IdentificationCandidate, IdentificationProvider, ProviderError, ProviderKind};
use crate::store::{AnnotationRecord, KnowledgeStore, PartialRecord};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Organ hint used when the client sends none
pub const DEFAULT_ORGAN: &str = "leaf";

/// Provenance tag for records first seen through identification
pub const COMBINED_SOURCE: &str = "plantnet+local";

pub const NO_MATCH_MESSAGE: &str = "No match found";

/// Pipeline failures; each one ends the request
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upload is not a decodable raster image (reason kept for logs)
    #[error("Invalid image")]
    InvalidImage(String),

    #[error("Identify failed: {0}")]
    IdentifyFailed(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(#[from] ayur_common::Error),
}

/// Local annotations attached to an identification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedBlock {
    pub common_name: String,
    pub medicinal_uses: Vec<String>,
    pub contraindications: Vec<String>,
    pub notes: String,
    pub source: String,
}

/// Successful identification response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifyResponse {
    pub scientific_name: String,
    pub common_names: Vec<String>,
    pub family: String,
    pub genus: String,
    /// Provider score rounded to 4 decimal places
    pub confidence: f64,
    pub enriched: EnrichedBlock,
    pub raw_provider: ProviderKind,
}

/// "No match" response: provider returned zero candidates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoMatchResponse {
    pub predictions: Vec<IdentifyResponse>,
    pub message: &'static str,
}

impl Default for NoMatchResponse {
    fn default() -> Self {
        Self {
            predictions: Vec::new(),
            message: NO_MATCH_MESSAGE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IdentifyOutcome {
    Identified(IdentifyResponse),
    NoMatch(NoMatchResponse),
}

/// Check that `bytes` decode as a raster image convertible to RGB
///
/// Returns the pixel dimensions on success.
pub fn validate_image(bytes: &[u8]) -> Result<(u32, u32), PipelineError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| PipelineError::InvalidImage(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    Ok(rgb.dimensions())
}

/// Compose the enriched block: stored values first, provider data as fallback
pub fn compose_enrichment(
    stored: &AnnotationRecord,
    candidate: &IdentificationCandidate,
) -> EnrichedBlock {
    let common_name = if stored.common_name.is_empty() {
        candidate.common_names.first().cloned().unwrap_or_default()
    } else {
        stored.common_name.clone()
    };
    let source = if stored.source.is_empty() {
        COMBINED_SOURCE.to_string()
    } else {
        stored.source.clone()
    };

    EnrichedBlock {
        common_name,
        medicinal_uses: stored.uses.clone(),
        contraindications: stored.contraindications.clone(),
        notes: stored.notes.clone(),
        source,
    }
}

/// Skeleton record written back after every identification
///
/// Notes are left untouched so manual curation survives.
pub fn skeleton_record(enriched: &EnrichedBlock, candidate: &IdentificationCandidate) -> PartialRecord {
    PartialRecord {
        common_name: Some(enriched.common_name.clone()),
        uses: Some(enriched.medicinal_uses.clone()),
        contraindications: Some(enriched.contraindications.clone()),
        family: Some(candidate.family.clone()),
        genus: Some(candidate.genus.clone()),
        notes: None,
        source: Some(enriched.source.clone()),
    }
}

pub fn round_confidence(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

/// Identification pipeline over an injectable provider and store
pub struct EnrichmentPipeline {
    provider: Arc<dyn IdentificationProvider>,
    store: Arc<dyn KnowledgeStore>,
}

impl EnrichmentPipeline {
    pub fn new(provider: Arc<dyn IdentificationProvider>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self { provider, store }
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// Run the full identify → enrich → upsert cycle for one upload
    pub async fn handle_identify(
        &self,
        image_bytes: Vec<u8>,
        organ: &str,
    ) -> Result<IdentifyOutcome, PipelineError> {
        let organ = match organ.trim() {
            "" => DEFAULT_ORGAN,
            organ => organ,
        };

        // Decoding is CPU-bound
        let (image_bytes, dimensions) = tokio::task::spawn_blocking(move || {
            let dimensions = validate_image(&image_bytes);
            (image_bytes, dimensions)
        })
        .await
        .map_err(|e| PipelineError::InvalidImage(format!("decoder task failed: {}", e)))?;
        let (width, height) = dimensions?;
        debug!(width, height, organ = %organ, "Upload decoded");

        let result = self.provider.identify(&image_bytes, organ).await.map_err(|e| {
            warn!(error = %e, "Identification provider failed");
            PipelineError::IdentifyFailed(e)
        })?;

        let provider = result.provider;
        let Some(top) = result.candidates.into_iter().next() else {
            info!(provider = provider.as_str(), "Identification returned no candidates");
            return Ok(IdentifyOutcome::NoMatch(NoMatchResponse::default()));
        };

        let stored = self.store.lookup(&top.scientific_name).await;
        let enriched = compose_enrichment(&stored, &top);

        self.store
            .upsert(&top.scientific_name, skeleton_record(&enriched, &top))
            .await?;

        info!(
            scientific_name = %top.scientific_name,
            confidence = top.confidence,
            provider = provider.as_str(),
            "Plant identified"
        );

        Ok(IdentifyOutcome::Identified(IdentifyResponse {
            scientific_name: top.scientific_name,
            common_names: top.common_names,
            family: top.family,
            genus: top.genus,
            confidence: round_confidence(top.confidence),
            enriched,
            raw_provider: provider,
        }))
    }
}
