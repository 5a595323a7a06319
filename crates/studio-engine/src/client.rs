use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use studio_contracts::generation::{ErrorBody, GenerationRequest, GenerationResult};
use tracing::debug;

use crate::service::{GenerationService, ServiceError};

/// Calls a remote generation endpoint with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    http: HttpClient,
    endpoint: String,
}

impl HttpGenerationClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationService for HttpGenerationClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ServiceError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|err| ServiceError::Network(transport_message(&err)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ServiceError::Network(transport_message(&err)))?;
        debug!(endpoint = %self.endpoint, status = status.as_u16(), bytes = body.len(), "generation response");

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .map(|payload| payload.message)
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| format!("Request failed ({})", status.as_u16()));
            return Err(ServiceError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str::<GenerationResult>(&body)
            .map_err(|err| ServiceError::Network(format!("invalid generation response: {err}")))
    }
}

fn transport_message(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(String::as_str) != Some(trimmed) {
            parts.push(trimmed.to_string());
        }
        source = cause.source();
    }
    parts.join(" | caused by: ")
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use studio_contracts::generation::{GenerationRequest, Style};
    use tokio::net::TcpListener;

    use super::HttpGenerationClient;
    use crate::service::{GenerationService, ServiceError};

    fn request() -> GenerationRequest {
        GenerationRequest {
            encoded_image: "data:image/jpeg;base64,AAAA".to_string(),
            prompt: "red sneakers".to_string(),
            style: Style::Vintage,
        }
    }

    async fn serve(app: Router) -> anyhow::Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}/api/generate", listener.local_addr()?);
        tokio::spawn(async move { axum::serve(listener, app).await });
        Ok(url)
    }

    #[tokio::test]
    async fn status_without_message_uses_fallback_text() -> anyhow::Result<()> {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream gone") }),
        );
        let client = HttpGenerationClient::new(serve(app).await?)?;
        assert_eq!(
            client.generate(&request()).await,
            Err(ServiceError::Http {
                status: 502,
                message: "Request failed (502)".to_string()
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_success_body_is_a_network_error() -> anyhow::Result<()> {
        let app = Router::new().route("/api/generate", post(|| async { "not json" }));
        let client = HttpGenerationClient::new(serve(app).await?)?;
        assert!(matches!(
            client.generate(&request()).await,
            Err(ServiceError::Network(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() -> anyhow::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("http://{}/api/generate", listener.local_addr()?);
        drop(listener);

        let client = HttpGenerationClient::new(url)?;
        assert!(client.endpoint().ends_with("/api/generate"));
        let err = client.generate(&request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Network(ref message) if !message.is_empty()));
        Ok(())
    }
}
