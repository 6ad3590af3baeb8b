//! Client for the email-transport collaborator.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DispatchError;

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// Client for the notification email transport.
pub struct MailClient {
    http: Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl MailClient {
    /// Create a new client for the given transport URL.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }

    /// Send one email. Returns the transport's delivery id.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, DispatchError> {
        if self.api_key.is_empty() {
            return Err(DispatchError::MissingConfig("mail API key"));
        }

        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SendRequest {
                from: &self.from,
                to,
                subject,
                body,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(DispatchError::Api {
                service: "mail",
                status,
                message,
            });
        }

        let body: SendResponse = response.json().await?;
        debug!(to = %to, delivery_id = %body.id, "sent reminder email");
        Ok(body.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_success_returns_delivery_id() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(serde_json::json!({
                "from": "reminders@lotcast.example",
                "to": "sam@example.com"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id": "msg-123" })),
            )
            .mount(&mock_server)
            .await;

        let client = MailClient::new(mock_server.uri(), "test-key", "reminders@lotcast.example");
        let id = client
            .send("sam@example.com", "Time to post", "Your copy is ready")
            .await
            .unwrap();
        assert_eq!(id, "msg-123");
    }

    #[tokio::test]
    async fn test_send_failure_maps_to_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid recipient"))
            .mount(&mock_server)
            .await;

        let client = MailClient::new(mock_server.uri(), "test-key", "reminders@lotcast.example");
        let err = client
            .send("not-an-address", "subject", "body")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Api {
                service: "mail",
                status: 422,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_send_without_key_is_config_error() {
        let client = MailClient::new("http://localhost:1", "", "reminders@lotcast.example");
        let err = client.send("a@b.c", "s", "b").await.unwrap_err();
        assert!(matches!(err, DispatchError::MissingConfig("mail API key")));
    }
}
