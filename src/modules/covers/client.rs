//! Outbound call to the image generation endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::ImageRef;

/// Used when the endpoint failed without saying why.
pub const GENERIC_FAILURE: &str = "Failed to generate image";
/// Used when no response arrived at all.
pub const TRANSPORT_FAILURE: &str = "Failed to generate book cover. Please try again.";

/// The endpoint reported failure or could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GenerationError {
    pub message: String,
    /// HTTP status when the endpoint answered.
    pub status: Option<u16>,
}

impl GenerationError {
    pub fn new(message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

/// Anything that turns a prompt into an image locator.
#[async_trait]
pub trait CoverGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<ImageRef, GenerationError>;
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
}

#[derive(Deserialize, Default)]
struct GenerateReply {
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
    error: Option<String>,
}

/// Posts `{"prompt": ...}` to one configured endpoint, once per call.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpGenerationClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, reqwest::Client::new())
    }

    pub fn with_client(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CoverGenerator for HttpGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<ImageRef, GenerationError> {
        tracing::info!(
            endpoint = %self.endpoint,
            prompt_chars = prompt.chars().count(),
            "requesting cover generation"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateBody { prompt })
            .send()
            .await
            .map_err(|err| {
                tracing::error!(endpoint = %self.endpoint, error = %err, "generation endpoint unreachable");
                GenerationError::new(TRANSPORT_FAILURE, None)
            })?;

        let status = response.status();
        // A body that is not the expected JSON counts as "no details".
        let reply = response.json::<GenerateReply>().await.unwrap_or_default();

        if !status.is_success() {
            let message = reply
                .error
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            tracing::warn!(status = status.as_u16(), %message, "generation endpoint returned failure");
            return Err(GenerationError::new(message, Some(status.as_u16())));
        }

        match reply.image_url.filter(|url| !url.is_empty()) {
            Some(url) => {
                tracing::info!(status = status.as_u16(), "cover generated");
                Ok(ImageRef::new(url))
            }
            None => {
                tracing::warn!(status = status.as_u16(), "generation reply carried no imageUrl");
                Err(GenerationError::new(GENERIC_FAILURE, Some(status.as_u16())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    /// Local stand-in for the image endpoint that records request bodies.
    async fn spawn_endpoint(status: StatusCode, reply: &'static str) -> (String, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().route(
            "/api/generate-cover",
            post(move |Json(body): Json<Value>| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push(body);
                    (status, [("content-type", "application/json")], reply)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/api/generate-cover", address), seen)
    }

    #[tokio::test]
    async fn success_returns_image_url_unchanged() {
        let (endpoint, seen) = spawn_endpoint(StatusCode::OK, r#"{"imageUrl": "https://x/y.png"}"#).await;
        let client = HttpGenerationClient::new(endpoint);

        let image = client.generate("draw a cover").await.unwrap();
        assert_eq!(image.as_str(), "https://x/y.png");

        let bodies = seen.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0], json!({"prompt": "draw a cover"}));
    }

    #[tokio::test]
    async fn failure_status_uses_endpoint_error_message() {
        let (endpoint, _) = spawn_endpoint(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "rate limited"}"#,
        )
        .await;

        let err = HttpGenerationClient::new(endpoint)
            .generate("p")
            .await
            .unwrap_err();
        assert_eq!(err.message, "rate limited");
        assert_eq!(err.status, Some(500));
    }

    #[tokio::test]
    async fn failure_without_error_field_is_generic() {
        let (endpoint, _) = spawn_endpoint(StatusCode::BAD_GATEWAY, "upstream exploded").await;

        let err = HttpGenerationClient::new(endpoint)
            .generate("p")
            .await
            .unwrap_err();
        assert_eq!(err.message, GENERIC_FAILURE);
        assert_eq!(err.status, Some(502));
    }

    #[tokio::test]
    async fn success_without_image_url_is_an_error() {
        let (endpoint, _) = spawn_endpoint(StatusCode::OK, r#"{"status": "queued"}"#).await;

        let err = HttpGenerationClient::new(endpoint)
            .generate("p")
            .await
            .unwrap_err();
        assert_eq!(err.message, GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpGenerationClient::new(format!("http://{}/api/generate-cover", address))
            .generate("p")
            .await
            .unwrap_err();
        assert_eq!(err.message, TRANSPORT_FAILURE);
        assert_eq!(err.status, None);
    }

    #[tokio::test]
    async fn each_call_is_a_single_request() {
        let (endpoint, seen) = spawn_endpoint(StatusCode::OK, r#"{"imageUrl": "https://x/1.png"}"#).await;
        let client = HttpGenerationClient::new(endpoint);

        client.generate("first").await.unwrap();
        client.generate("second").await.unwrap();

        let bodies = seen.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[1]["prompt"], "second");
    }
}
