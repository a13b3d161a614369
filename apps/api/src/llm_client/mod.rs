//! LLM Client: the single point of entry for all generative-language API calls in Coach.
//!
//! ARCHITECTURAL RULE: No other module may call the generative-language API directly.
//! Interview workflows depend on the `TextGenerator` trait; `GeminiClient` is the
//! production implementation.
//!
//! Retry policy: up to 4 attempts. Overload (503), rate limiting (429) and transport
//! failures are retried after `base * 2^attempt + jitter`. Anything else is terminal.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

const MAX_ATTEMPTS: u32 = 4;
const BASE_DELAY_MS: u64 = 1000;
const MAX_JITTER_MS: u64 = 1000;

// ────────────────────────────────────────────────────────────────────────────
// Prompt
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("prompt user text must not be empty")]
pub struct EmptyPrompt;

/// A user-role text block plus an optional system instruction.
/// The user text is guaranteed non-empty by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    user: String,
    system: Option<String>,
}

impl Prompt {
    pub fn new(user: impl Into<String>) -> Result<Self, EmptyPrompt> {
        let user = user.into();
        if user.trim().is_empty() {
            return Err(EmptyPrompt);
        }
        Ok(Self { user, system: None })
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Rate limited, overloaded, or the request never got a response.
    /// `status` is `None` for transport failures.
    Transient { status: Option<u16> },
    /// 2xx response without `candidates[0].content.parts[0].text`.
    InvalidResponse,
    /// Any other non-success status.
    ApiRejected { status: u16 },
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Transient { status: Some(status) } => write!(f, "transient ({status})"),
            ApiErrorKind::Transient { status: None } => write!(f, "transient (transport)"),
            ApiErrorKind::InvalidResponse => write!(f, "invalid response"),
            ApiErrorKind::ApiRejected { status } => write!(f, "rejected ({status})"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("API error, {kind}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Transient { .. })
    }

    /// True when the service answered that it is overloaded or rate limiting us.
    pub fn is_capacity(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Transient { status: Some(_) })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Retry policy
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_jitter: Duration::from_millis(MAX_JITTER_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows zero-indexed attempt `prior_attempt`:
    /// `base * 2^prior_attempt + uniform[0, max_jitter)`.
    pub fn backoff_delay<R: Rng + ?Sized>(&self, prior_attempt: u32, rng: &mut R) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(1u32.checked_shl(prior_attempt).unwrap_or(u32::MAX));
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng.gen_range(0..jitter_ms))
        };
        exponential.saturating_add(jitter)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wire format
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<WireContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent<'a>>,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

impl<'a> From<&'a Prompt> for GenerateContentRequest<'a> {
    fn from(prompt: &'a Prompt) -> Self {
        Self {
            contents: vec![WireContent {
                parts: vec![WirePart {
                    text: prompt.user(),
                }],
            }],
            system_instruction: prompt.system().map(|text| WireContent {
                parts: vec![WirePart { text }],
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, if present and non-empty.
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|t| !t.is_empty())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Anything that can turn a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn send(&self, prompt: &Prompt) -> Result<String, ApiError>;
}

/// Wraps the generateContent endpoint with retry/backoff.
/// Holds no mutable state between calls.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    policy: RetryPolicy,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: String) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!(
                "{}/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            api_key,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One network call, classified.
    async fn attempt(&self, body: &GenerateContentRequest<'_>) -> Result<String, ApiError> {
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| {
                ApiError::new(
                    ApiErrorKind::Transient { status: None },
                    format!("request failed: {}", e.without_url()),
                )
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ApiError::new(
                ApiErrorKind::Transient {
                    status: Some(status.as_u16()),
                },
                format!(
                    "API Error ({}): Model is overloaded or rate limited.",
                    status.as_u16()
                ),
            ));
        }

        let body = response.text().await.map_err(|e| {
            ApiError::new(
                ApiErrorKind::Transient { status: None },
                format!("failed to read response body: {}", e.without_url()),
            )
        })?;

        if !status.is_success() {
            return Err(ApiError::new(
                ApiErrorKind::ApiRejected {
                    status: status.as_u16(),
                },
                format!("API Error ({}): {}", status.as_u16(), body),
            ));
        }

        serde_json::from_str::<GenerateContentResponse>(&body)
            .ok()
            .and_then(GenerateContentResponse::into_text)
            .ok_or_else(|| {
                ApiError::new(
                    ApiErrorKind::InvalidResponse,
                    "Invalid response structure from API.",
                )
            })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn send(&self, prompt: &Prompt) -> Result<String, ApiError> {
        let body = GenerateContentRequest::from(prompt);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error: Option<ApiError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.policy.backoff_delay(attempt - 1, &mut rand::thread_rng());
                warn!(
                    "Generation attempt {} failed, retrying in {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&body).await {
                Ok(text) => {
                    debug!(
                        "Generation succeeded on attempt {}: {} chars",
                        attempt + 1,
                        text.len()
                    );
                    return Ok(text);
                }
                Err(err) if err.is_transient() => {
                    warn!("Generation attempt {} failed: {}", attempt + 1, err);
                    last_error = Some(err);
                }
                Err(err) => {
                    warn!("Generation failed without retry: {}", err);
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ApiError::new(
                ApiErrorKind::Transient { status: None },
                "no attempts were made",
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode as AxumStatus, Json, Router};
    use rand::rngs::mock::StepRng;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct MockUpstream {
        replies: Arc<Vec<(u16, String)>>,
        hits: Arc<AtomicUsize>,
        bodies: Arc<Mutex<Vec<Value>>>,
        queries: Arc<Mutex<Vec<Option<String>>>>,
    }

    async fn mock_handler(
        State(mock): State<MockUpstream>,
        uri: axum::http::Uri,
        Json(body): Json<Value>,
    ) -> (AxumStatus, String) {
        let n = mock.hits.fetch_add(1, Ordering::SeqCst);
        mock.bodies.lock().unwrap().push(body);
        mock.queries
            .lock()
            .unwrap()
            .push(uri.query().map(str::to_string));
        let (status, body) = mock.replies[n.min(mock.replies.len() - 1)].clone();
        (AxumStatus::from_u16(status).unwrap(), body)
    }

    /// Serves the given replies in order (the last one repeats) on an ephemeral port.
    async fn spawn_upstream(replies: Vec<(u16, String)>) -> (String, MockUpstream) {
        let mock = MockUpstream {
            replies: Arc::new(replies),
            hits: Arc::new(AtomicUsize::new(0)),
            bodies: Arc::new(Mutex::new(Vec::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .fallback(mock_handler)
            .with_state(mock.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1beta"), mock)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            max_jitter: Duration::ZERO,
        }
    }

    fn client_for(base_url: &str) -> GeminiClient {
        GeminiClient::new(base_url, "test-model", "secret-key".to_string()).with_policy(fast_policy())
    }

    fn ok_body(text: &str) -> String {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }).to_string()
    }

    #[test]
    fn test_prompt_rejects_blank_user_text() {
        assert!(Prompt::new("").is_err());
        assert!(Prompt::new("   \n").is_err());
        assert!(Prompt::new("hello").is_ok());
    }

    #[test]
    fn test_request_shape_without_system_instruction() {
        let prompt = Prompt::new("ask me something").unwrap();
        let value = serde_json::to_value(GenerateContentRequest::from(&prompt)).unwrap();
        assert_eq!(
            value,
            json!({ "contents": [{ "parts": [{ "text": "ask me something" }] }] })
        );
    }

    #[test]
    fn test_request_shape_with_system_instruction() {
        let prompt = Prompt::new("my answer").unwrap().with_system("be brief");
        let value = serde_json::to_value(GenerateContentRequest::from(&prompt)).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "my answer");
    }

    #[test]
    fn test_backoff_delay_bounds_for_default_policy() {
        let policy = RetryPolicy::default();
        let mut rng = rand::thread_rng();
        for k in 1..MAX_ATTEMPTS {
            let floor = Duration::from_millis(1000 * (1 << (k - 1)));
            let ceiling = floor + Duration::from_millis(1000);
            for _ in 0..200 {
                let delay = policy.backoff_delay(k - 1, &mut rng);
                assert!(delay >= floor, "attempt {k}: {delay:?} below {floor:?}");
                assert!(delay < ceiling, "attempt {k}: {delay:?} not below {ceiling:?}");
            }
        }
    }

    #[test]
    fn test_backoff_delay_without_jitter_is_exact() {
        let policy = RetryPolicy {
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let mut rng = StepRng::new(0, 1);
        assert_eq!(policy.backoff_delay(0, &mut rng), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(2, &mut rng), Duration::from_millis(4000));
    }

    #[test]
    fn test_capacity_only_for_transient_with_status() {
        let busy = ApiError::new(ApiErrorKind::Transient { status: Some(503) }, "x");
        let offline = ApiError::new(ApiErrorKind::Transient { status: None }, "x");
        let rejected = ApiError::new(ApiErrorKind::ApiRejected { status: 400 }, "x");
        assert!(busy.is_capacity());
        assert!(!offline.is_capacity());
        assert!(offline.is_transient());
        assert!(!rejected.is_transient());
    }

    #[tokio::test]
    async fn test_send_returns_text_on_first_success() {
        let (url, mock) = spawn_upstream(vec![(200, ok_body("Tell me about a conflict."))]).await;
        let client = client_for(&url);
        let prompt = Prompt::new("question please").unwrap().with_system("coach");

        let text = client.send(&prompt).await.unwrap();

        assert_eq!(text, "Tell me about a conflict.");
        assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
        let bodies = mock.bodies.lock().unwrap();
        assert_eq!(bodies[0]["contents"][0]["parts"][0]["text"], "question please");
        assert_eq!(bodies[0]["systemInstruction"]["parts"][0]["text"], "coach");
        let queries = mock.queries.lock().unwrap();
        assert_eq!(queries[0].as_deref(), Some("key=secret-key"));
    }

    #[tokio::test]
    async fn test_missing_text_field_is_invalid_response_without_retry() {
        let (url, mock) =
            spawn_upstream(vec![(200, json!({ "candidates": [] }).to_string())]).await;
        let client = client_for(&url);

        let err = client.send(&Prompt::new("q").unwrap()).await.unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::InvalidResponse);
        assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_invalid_response() {
        let (url, mock) = spawn_upstream(vec![(200, "not json".to_string())]).await;
        let err = client_for(&url)
            .send(&Prompt::new("q").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::InvalidResponse);
        assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_every_attempt_exhausts_retries() {
        let (url, mock) = spawn_upstream(vec![
            (429, String::new()),
            (503, String::new()),
            (429, String::new()),
            (503, String::new()),
        ])
        .await;
        let client = client_for(&url);

        let err = client.send(&Prompt::new("q").unwrap()).await.unwrap_err();

        assert_eq!(mock.hits.load(Ordering::SeqCst), 4);
        assert_eq!(err.kind, ApiErrorKind::Transient { status: Some(503) });
        assert!(err.is_capacity());
    }

    #[tokio::test]
    async fn test_transient_then_success_recovers() {
        let (url, mock) =
            spawn_upstream(vec![(503, String::new()), (200, ok_body("recovered"))]).await;

        let text = client_for(&url)
            .send(&Prompt::new("q").unwrap())
            .await
            .unwrap();

        assert_eq!(text, "recovered");
        assert_eq!(mock.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_status_is_rejected_without_retry() {
        let (url, mock) = spawn_upstream(vec![(400, "bad key".to_string())]).await;

        let err = client_for(&url)
            .send(&Prompt::new("q").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::ApiRejected { status: 400 });
        assert!(err.message.contains("bad key"));
        assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_is_transient_and_retried() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client_for(&format!("http://{addr}/v1beta"))
            .send(&Prompt::new("q").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ApiErrorKind::Transient { status: None });
        assert!(!err.is_capacity());
    }

    #[test]
    fn test_endpoint_includes_model_and_action() {
        let client = GeminiClient::new("https://example.test/v1beta/", "m-1", "k".into());
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/m-1:generateContent"
        );
    }
}
