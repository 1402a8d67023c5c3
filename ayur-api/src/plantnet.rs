//! Pl@ntNet identification client
//!
//! Sends an uploaded image to the Pl@ntNet v2 identify endpoint and returns
//! the ranked species candidates. When no credential is configured (or mock
//! mode is forced) a deterministic offline provider answers instead.
//!
//! # API Reference
//! - Endpoint: `POST https://my-api.plantnet.org/v2/identify/{project}?api-key=...`
//! - Body: multipart, `images` file part plus `organs` text part

use async_trait::async_trait;
use ayur_common::config::ServiceConfig;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Default upper bound on the whole upstream call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upstream error bodies are cut to this many characters
const ERROR_BODY_LIMIT: usize = 200;

/// Identification provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Upstream answered with a non-success status
    #[error("PlantNet API error {status_code}: {message}")]
    Status { status_code: u16, message: String },

    /// Network failure or timeout
    #[error("PlantNet request failed: {0}")]
    Transport(String),

    /// Success status but the body did not parse
    #[error("Failed to parse PlantNet response: {0}")]
    Decode(String),
}

/// Which provider produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    PlantNet,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::PlantNet => "plantnet",
            ProviderKind::Mock => "mock",
        }
    }
}

/// One ranked species guess
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentificationCandidate {
    pub scientific_name: String,
    pub common_names: Vec<String>,
    pub family: String,
    pub genus: String,
    /// Provider score in [0, 1]
    pub confidence: f64,
}

/// Ranked candidates plus provider metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderResult {
    /// Provider-reported status string, when present
    pub status: Option<String>,
    /// Candidates in provider rank order (best first)
    pub candidates: Vec<IdentificationCandidate>,
    pub provider: ProviderKind,
}

/// Image classification backend
#[async_trait]
pub trait IdentificationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Identify the plant in `image` using `organ` ("leaf", "flower", ...) as hint
    async fn identify(&self, image: &[u8], organ: &str) -> Result<ProviderResult, ProviderError>;
}

// ============================================================================
// Provider wire format
//
// Only partially trusted: every field is optional and defaults to empty.
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct PlantNetResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    results: Option<Vec<PlantNetResult>>,
}

#[derive(Debug, Default, Deserialize)]
struct PlantNetResult {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    species: Option<PlantNetSpecies>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlantNetSpecies {
    #[serde(default)]
    scientific_name_without_author: Option<String>,
    #[serde(default)]
    scientific_name: Option<String>,
    #[serde(default)]
    genus: Option<PlantNetTaxon>,
    #[serde(default)]
    family: Option<PlantNetTaxon>,
    #[serde(default)]
    common_names: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlantNetTaxon {
    #[serde(default)]
    scientific_name_without_author: Option<String>,
}

impl PlantNetTaxon {
    fn name(taxon: Option<PlantNetTaxon>) -> String {
        taxon
            .and_then(|t| t.scientific_name_without_author)
            .unwrap_or_default()
    }
}

impl From<PlantNetResult> for IdentificationCandidate {
    fn from(result: PlantNetResult) -> Self {
        let species = result.species.unwrap_or_default();
        let scientific_name = species
            .scientific_name_without_author
            .filter(|name| !name.is_empty())
            .or(species.scientific_name)
            .unwrap_or_default();

        Self {
            scientific_name,
            common_names: species.common_names.unwrap_or_default(),
            family: PlantNetTaxon::name(species.family),
            genus: PlantNetTaxon::name(species.genus),
            confidence: result.score.unwrap_or(0.0),
        }
    }
}

impl PlantNetResponse {
    fn into_result(self, provider: ProviderKind) -> ProviderResult {
        ProviderResult {
            status: self.status,
            candidates: self
                .results
                .unwrap_or_default()
                .into_iter()
                .map(IdentificationCandidate::from)
                .collect(),
            provider,
        }
    }
}

/// Parse a raw identify response body
pub fn parse_response(body: &[u8]) -> Result<ProviderResult, ProviderError> {
    let response: PlantNetResponse =
        serde_json::from_slice(body).map_err(|e| ProviderError::Decode(e.to_string()))?;
    Ok(response.into_result(ProviderKind::PlantNet))
}

/// Live Pl@ntNet client
pub struct PlantNetClient {
    http_client: Client,
    api_key: String,
    project: String,
    base_url: String,
    timeout: Duration,
}

impl PlantNetClient {
    pub fn new(
        api_key: impl Into<String>,
        project: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::with_timeout(api_key, project, base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        project: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            project: project.into(),
            base_url: base_url.into(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.project)
    }
}

#[async_trait]
impl IdentificationProvider for PlantNetClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::PlantNet
    }

    async fn identify(&self, image: &[u8], organ: &str) -> Result<ProviderResult, ProviderError> {
        let url = self.endpoint();
        debug!(url = %url, organ = %organ, image_bytes = image.len(), "Querying PlantNet API");

        let image_part = Part::bytes(image.to_vec())
            .file_name("upload.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let form = Form::new()
            .part("images", image_part)
            .text("organs", organ.to_string());

        let response = self
            .http_client
            .post(&url)
            .query(&[("api-key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Transport(format!(
                        "timed out after {} ms",
                        self.timeout.as_millis()
                    ))
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status_code: status.as_u16(),
                message: truncate_chars(&body, ERROR_BODY_LIMIT),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let result = parse_response(&body)?;

        info!(
            candidates = result.candidates.len(),
            top = %result.candidates.first().map(|c| c.scientific_name.as_str()).unwrap_or("-"),
            "PlantNet identification complete"
        );
        Ok(result)
    }
}

/// Deterministic offline provider
///
/// Ignores the image and always answers Tulsi, so the full pipeline can run
/// without network access or a credential.
#[derive(Debug, Default, Clone)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn fixed_result() -> ProviderResult {
        ProviderResult {
            status: Some("mock".to_string()),
            candidates: vec![IdentificationCandidate {
                scientific_name: "ocimum tenuiflorum".to_string(),
                common_names: vec!["Tulsi".to_string(), "Holy Basil".to_string()],
                family: "Lamiaceae".to_string(),
                genus: "Ocimum".to_string(),
                confidence: 0.91,
            }],
            provider: ProviderKind::Mock,
        }
    }
}

#[async_trait]
impl IdentificationProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn identify(&self, _image: &[u8], organ: &str) -> Result<ProviderResult, ProviderError> {
        debug!(organ = %organ, "Mock identification");
        Ok(Self::fixed_result())
    }
}

/// Pick the provider for a resolved configuration
///
/// A missing credential silently selects the mock provider.
pub fn provider_from_config(
    config: &ServiceConfig,
) -> Result<Arc<dyn IdentificationProvider>, ProviderError> {
    match (&config.plantnet_api_key, config.mock_mode) {
        (Some(api_key), false) => Ok(Arc::new(PlantNetClient::new(
            api_key.clone(),
            config.plantnet_project.clone(),
            config.plantnet_base_url.clone(),
        )?)),
        _ => Ok(Arc::new(MockProvider::new())),
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"{
        "query": {"project": "all", "organs": ["leaf"]},
        "language": "en",
        "preferedReferential": "k-world-flora",
        "bestMatch": "Azadirachta indica A.Juss.",
        "results": [
            {
                "score": 0.83712,
                "species": {
                    "scientificNameWithoutAuthor": "Azadirachta indica",
                    "scientificNameAuthorship": "A.Juss.",
                    "genus": {"scientificNameWithoutAuthor": "Azadirachta"},
                    "family": {"scientificNameWithoutAuthor": "Meliaceae"},
                    "commonNames": ["Neem", "Margosa"],
                    "scientificName": "Azadirachta indica A.Juss."
                }
            },
            {
                "score": 0.02,
                "species": {"scientificName": "Melia azedarach L."}
            }
        ],
        "version": "2024-01-01",
        "remainingIdentificationRequests": 498
    }"#;

    #[test]
    fn test_parse_full_response() {
        let result = parse_response(SAMPLE_RESPONSE.as_bytes()).unwrap();
        assert_eq!(result.provider, ProviderKind::PlantNet);
        assert_eq!(result.candidates.len(), 2);

        let top = &result.candidates[0];
        assert_eq!(top.scientific_name, "Azadirachta indica");
        assert_eq!(top.family, "Meliaceae");
        assert_eq!(top.genus, "Azadirachta");
        assert_eq!(top.common_names, vec!["Neem", "Margosa"]);
        assert!((top.confidence - 0.83712).abs() < 1e-9);
    }

    #[test]
    fn test_parse_falls_back_to_scientific_name_with_author() {
        let result = parse_response(SAMPLE_RESPONSE.as_bytes()).unwrap();
        let second = &result.candidates[1];
        assert_eq!(second.scientific_name, "Melia azedarach L.");
        assert!(second.family.is_empty());
        assert!(second.genus.is_empty());
        assert!(second.common_names.is_empty());
    }

    #[test]
    fn test_parse_tolerates_missing_and_null_fields() {
        let body = r#"{"results": [{"species": null}, {}]}"#;
        let result = parse_response(body.as_bytes()).unwrap();
        assert_eq!(result.candidates.len(), 2);
        assert_eq!(result.candidates[0].scientific_name, "");
        assert_eq!(result.candidates[1].confidence, 0.0);

        let result = parse_response(br#"{"results": null}"#).unwrap();
        assert!(result.candidates.is_empty());

        let result = parse_response(b"{}").unwrap();
        assert!(result.candidates.is_empty());
        assert!(result.status.is_none());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let result = parse_response(b"<html>bad gateway</html>");
        assert!(matches!(result, Err(ProviderError::Decode(_))));
    }

    #[tokio::test]
    async fn test_mock_provider_is_deterministic() {
        let provider = MockProvider::new();
        let first = provider.identify(b"first image", "leaf").await.unwrap();
        let second = provider.identify(&[0u8; 64], "flower").await.unwrap();

        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(first.provider, ProviderKind::Mock);
        assert_eq!(first.candidates[0].scientific_name, "ocimum tenuiflorum");
        assert_eq!(first.candidates[0].confidence, 0.91);
    }

    #[test]
    fn test_endpoint_joins_project() {
        let client = PlantNetClient::new("key", "weurope", "https://example.test/v2/identify/").unwrap();
        assert_eq!(client.endpoint(), "https://example.test/v2/identify/weurope");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("abc", 200), "abc");
        assert_eq!(truncate_chars("तुलसी", 2).chars().count(), 2);
        assert_eq!(truncate_chars(&"x".repeat(500), 200).len(), 200);
    }

    #[test]
    fn test_provider_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ProviderKind::PlantNet).unwrap(), "\"plantnet\"");
        assert_eq!(serde_json::to_string(&ProviderKind::Mock).unwrap(), "\"mock\"");
        assert_eq!(ProviderKind::PlantNet.as_str(), "plantnet");
    }

    #[test]
    fn test_provider_from_config_selects_mock_without_key() {
        let mut config = ServiceConfig {
            plantnet_api_key: None,
            plantnet_project: "all".to_string(),
            plantnet_base_url: "http://127.0.0.1:1/v2/identify".to_string(),
            mock_mode: false,
            data_dir: std::env::temp_dir(),
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        assert_eq!(provider_from_config(&config).unwrap().kind(), ProviderKind::Mock);

        config.plantnet_api_key = Some("key".to_string());
        assert_eq!(provider_from_config(&config).unwrap().kind(), ProviderKind::PlantNet);

        config.mock_mode = true;
        assert_eq!(provider_from_config(&config).unwrap().kind(), ProviderKind::Mock);
    }
}
