//! reqwest implementation of the research API

use super::error::ApiError;
use super::sse::decode_event_stream;
use crate::config::ClientConfig;
use crate::runtime::{EventStream, ResearchApi, StartResponse};
use crate::state_machine::state::SessionId;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;

const START_PATH: &str = "api/research/start";
const CLARIFICATION_PATH: &str = "api/research/clarification";
const STREAM_PATH: &str = "api/research/stream";

/// HTTP client for the research server
#[derive(Clone)]
pub struct HttpResearchApi {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpResearchApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        // Trailing slash so Url::join keeps any path prefix on the base
        let base = format!("{}/", config.api_url.trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|e| {
            ApiError::invalid_request(format!("Invalid API URL '{}': {e}", config.api_url))
        })?;

        // No client-wide timeout: it would also cut the long-lived event stream
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ApiError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            request_timeout: config.request_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::invalid_request(format!("Invalid endpoint {path}: {e}")))
    }

    fn stream_url(&self, session_id: &SessionId) -> Result<Url, ApiError> {
        let mut url = self.endpoint(STREAM_PATH)?;
        url.query_pairs_mut()
            .append_pair("session_id", session_id.as_str());
        Ok(url)
    }

    /// POST a JSON body and return the response text
    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<String, ApiError> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::from_status(status, &text));
        }
        Ok(text)
    }
}

#[derive(Serialize)]
struct StartRequest<'a> {
    query: &'a str,
}

#[derive(Serialize)]
struct ClarificationRequest<'a> {
    session_id: &'a str,
    answer: &'a str,
}

#[async_trait]
impl ResearchApi for HttpResearchApi {
    async fn start(&self, query: &str) -> Result<StartResponse, ApiError> {
        let body = self.post_json(START_PATH, &StartRequest { query }).await?;
        let response: StartResponse = serde_json::from_str(&body).map_err(|e| {
            ApiError::protocol(format!("Start response has no usable session id: {e} - body: {body}"))
        })?;

        tracing::info!(
            session_id = %response.session_id,
            status = response.status.as_deref().unwrap_or("unknown"),
            "Research session started"
        );
        Ok(response)
    }

    async fn answer_clarification(
        &self,
        session_id: &SessionId,
        answer: &str,
    ) -> Result<(), ApiError> {
        self.post_json(
            CLARIFICATION_PATH,
            &ClarificationRequest {
                session_id: session_id.as_str(),
                answer,
            },
        )
        .await?;
        Ok(())
    }

    async fn subscribe(&self, session_id: &SessionId) -> Result<EventStream, ApiError> {
        let url = self.stream_url(session_id)?;
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }

        tracing::debug!(session_id = %session_id, "Event stream connected");
        Ok(Box::pin(decode_event_stream(response.bytes_stream())))
    }
}
