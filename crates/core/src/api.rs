//! Remote tutor service client.
//!
//! The AI service that generates scenarios, in-character replies, tutor
//! feedback, and arc/resolution verdicts is reached exclusively through the
//! [`TutorApi`] trait, so the whole client core can be driven by a
//! deterministic fake in tests. [`HttpTutorClient`] is the production
//! implementation over the service's REST endpoints.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::conversation::{ArcProgress, Message, ResolutionStatus, TutorTips};
use crate::locale::Language;
use crate::scenario::ScenarioProposal;

/// Transport-level errors from the tutor service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Request body for scenario generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRequest {
    pub locale: String,
    pub difficulty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<String>,
    /// Hint to the oracle to avoid repeating a rejected scenario.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub veto_reason: Option<String>,
}

/// Request body for scenario modification. The oracle echoes unaffected
/// fields back; the caller adopts the result wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyScenarioRequest {
    pub original_scenario: ScenarioProposal,
    pub modification_request: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResponse {
    pub scenario: ScenarioProposal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalesResponse {
    pub languages: Vec<Language>,
}

/// Request body for one conversation turn. `conversation_history` holds the
/// messages exchanged *before* this turn; the new utterance travels in
/// `message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<Message>,
    pub scenario: ScenarioProposal,
    pub exchange_count: u32,
}

/// The oracle's verdict for one conversation turn.
///
/// `resolution_status` must be present whenever `conversation_complete` is
/// true; the conversation engine rejects replies that violate this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub character_response: String,
    #[serde(default)]
    pub tutor_tips: TutorTips,
    #[serde(default)]
    pub conversation_complete: bool,
    pub arc_progress: ArcProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_status: Option<ResolutionStatus>,
}

/// A client for the remote tutor service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TutorApi: Send + Sync {
    /// Fetches the catalog of learnable languages and dialects.
    async fn fetch_locales(&self) -> Result<Vec<Language>, ApiError>;

    /// Requests a new scenario proposal.
    async fn generate_scenario(
        &self,
        request: ScenarioRequest,
    ) -> Result<ScenarioProposal, ApiError>;

    /// Requests a full replacement for an existing proposal.
    async fn modify_scenario(
        &self,
        request: ModifyScenarioRequest,
    ) -> Result<ScenarioProposal, ApiError>;

    /// Sends one conversation turn and returns the oracle's verdict.
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ApiError>;
}

/// `TutorApi` implementation over the tutor service's REST API.
///
/// An optional bearer credential is forwarded unchanged on every request;
/// its absence never blocks a call, so the client works against an
/// unauthenticated local service as well.
pub struct HttpTutorClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

/// Error body shape used by the tutor service for non-2xx responses.
#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

impl HttpTutorClient {
    pub fn new(base_url: &str, access_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, ApiError> {
        let status = response.status();
        if !status.is_success() {
            // The service reports failures as `{"detail": "..."}`; fall back
            // to the status line when the body is not in that shape.
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.detail,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            return Err(ApiError::Status { status, message });
        }
        response
            .json::<R>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TutorApi for HttpTutorClient {
    async fn fetch_locales(&self) -> Result<Vec<Language>, ApiError> {
        debug!("GET /api/locales");
        let response = self.request(Method::GET, "/api/locales").send().await?;
        let locales: LocalesResponse = Self::decode(response).await?;
        Ok(locales.languages)
    }

    async fn generate_scenario(
        &self,
        request: ScenarioRequest,
    ) -> Result<ScenarioProposal, ApiError> {
        debug!(
            locale = %request.locale,
            difficulty = %request.difficulty,
            "POST /api/scenario/generate"
        );
        let response = self
            .request(Method::POST, "/api/scenario/generate")
            .json(&request)
            .send()
            .await?;
        let scenario: ScenarioResponse = Self::decode(response).await?;
        Ok(scenario.scenario)
    }

    async fn modify_scenario(
        &self,
        request: ModifyScenarioRequest,
    ) -> Result<ScenarioProposal, ApiError> {
        debug!("POST /api/scenario/modify");
        let response = self
            .request(Method::POST, "/api/scenario/modify")
            .json(&request)
            .send()
            .await?;
        let scenario: ScenarioResponse = Self::decode(response).await?;
        Ok(scenario.scenario)
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ApiError> {
        debug!(exchange_count = request.exchange_count, "POST /api/chat");
        let response = self
            .request(Method::POST, "/api/chat")
            .json(&request)
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_request_omits_absent_optional_fields() {
        let request = ScenarioRequest {
            locale: "fr-FR".to_string(),
            difficulty: "B1".to_string(),
            preferences: None,
            veto_reason: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"locale":"fr-FR","difficulty":"B1"}"#);

        let request = ScenarioRequest {
            veto_reason: Some("too touristy".to_string()),
            ..request
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("veto_reason"));
    }

    #[test]
    fn chat_reply_deserializes_without_resolution() {
        let json = r#"{
            "character_response": "Salut",
            "tutor_tips": {"corrections": [], "vocabulary": ["le pain"], "cultural": []},
            "conversation_complete": false,
            "arc_progress": "rising"
        }"#;
        let reply: ChatReply = serde_json::from_str(json).unwrap();
        assert_eq!(reply.character_response, "Salut");
        assert_eq!(reply.arc_progress, ArcProgress::Rising);
        assert!(reply.resolution_status.is_none());
        assert!(!reply.conversation_complete);
    }

    #[test]
    fn chat_reply_deserializes_with_resolution() {
        let json = r#"{
            "character_response": "Au revoir!",
            "conversation_complete": true,
            "arc_progress": "resolution",
            "resolution_status": "graceful_fail"
        }"#;
        let reply: ChatReply = serde_json::from_str(json).unwrap();
        assert!(reply.conversation_complete);
        assert_eq!(reply.resolution_status, Some(ResolutionStatus::GracefulFail));
        assert!(reply.tutor_tips.corrections.is_empty());
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = HttpTutorClient::new("http://localhost:8000/", None);
        assert_eq!(client.base_url, "http://localhost:8000");
    }
}
