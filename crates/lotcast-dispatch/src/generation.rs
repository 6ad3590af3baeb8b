//! Client for the hosted text-generation service.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use lotcast_core::PostCategory;

use crate::error::DispatchError;

/// Structured prompt parameters for one post.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub group_name: String,
    /// Display name of the group's territory, if it has one.
    pub territory: Option<String>,
    pub category: PostCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testimonial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    text: String,
}

/// Client for the content-generation collaborator.
pub struct GenerationClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GenerationClient {
    /// Create a new client for the given service URL.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Generate post copy from structured parameters.
    ///
    /// Blocking I/O with its own timeout; the caller decides whether and
    /// when to retry. Failures carry the service's human-readable reason.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, DispatchError> {
        if self.api_key.is_empty() {
            return Err(DispatchError::MissingConfig("generation API key"));
        }

        let url = format!("{}/v1/generate", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(DispatchError::Api {
                service: "generation",
                status,
                message,
            });
        }

        let body: GenerationResponse = response.json().await?;
        debug!(group = %request.group_name, chars = body.text.len(), "generated post copy");
        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            group_name: "North Deals".to_string(),
            territory: Some("North".to_string()),
            category: PostCategory::Offer,
            offer_details: Some("0% APR through Sunday".to_string()),
            vehicle_details: None,
            testimonial: None,
            context: None,
        }
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "group_name": "North Deals",
                "category": "offer"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "Stop by this weekend for 0% APR!"
            })))
            .mount(&mock_server)
            .await;

        let client = GenerationClient::new(mock_server.uri(), "test-key");
        let text = client.generate(&request()).await.unwrap();
        assert_eq!(text, "Stop by this weekend for 0% APR!");
    }

    #[tokio::test]
    async fn test_generate_service_error_carries_reason() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(502).set_body_string("model overloaded"))
            .mount(&mock_server)
            .await;

        let client = GenerationClient::new(mock_server.uri(), "test-key");
        let err = client.generate(&request()).await.unwrap_err();
        match err {
            DispatchError::Api {
                service,
                status,
                message,
            } => {
                assert_eq!(service, "generation");
                assert_eq!(status, 502);
                assert_eq!(message, "model overloaded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_without_key_is_config_error() {
        let client = GenerationClient::new("http://localhost:1", "");
        let err = client.generate(&request()).await.unwrap_err();
        assert!(matches!(err, DispatchError::MissingConfig(_)));
    }
}
