//! Client for the generative-language completion endpoint.
//!
//! One call sends a prompt, a system instruction and an optional request for
//! JSON output. Transient failures are retried with exponential backoff; the
//! caller gets either the model's raw text or a terminal error. Decoding the
//! text into structured data is the caller's job, see [`decode_json`].

use crate::config::CompletionConfig;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// A single completion request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub system_instruction: String,
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn text(prompt: impl Into<String>, system_instruction: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: system_instruction.into(),
            json_mode: false,
        }
    }

    pub fn json(prompt: impl Into<String>, system_instruction: impl Into<String>) -> Self {
        Self {
            json_mode: true,
            ..Self::text(prompt, system_instruction)
        }
    }
}

/// One attempt against the completion endpoint
pub trait CompletionTransport: Send + Sync {
    fn send(&self, request: &CompletionRequest) -> Result<String>;
}

/// Blocking wait between attempts
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How many attempts to make and how long to wait before the second one
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// Gemini transport
// ============================================================================

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// `generateContent` over HTTPS
pub struct GeminiTransport {
    http: reqwest::blocking::Client,
    url: String,
}

impl GeminiTransport {
    pub fn new(config: &CompletionConfig, api_key: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            config.endpoint.trim_end_matches('/'),
            config.model,
            api_key
        );
        Ok(Self { http, url })
    }

    fn payload(request: &CompletionRequest) -> serde_json::Value {
        let mut payload = json!({
            "contents": [{ "parts": [{ "text": request.prompt }] }],
            "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
        });
        if request.json_mode {
            payload["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }
        payload
    }
}

impl CompletionTransport for GeminiTransport {
    fn send(&self, request: &CompletionRequest) -> Result<String> {
        let response = self.http.post(&self.url).json(&Self::payload(request)).send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response.json()?;
        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| Error::Decode("completion response contained no text".into()))
    }
}

// ============================================================================
// Client
// ============================================================================

/// Retrying completion client
pub struct CompletionClient {
    transport: Box<dyn CompletionTransport>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
}

impl CompletionClient {
    pub fn new(transport: Box<dyn CompletionTransport>) -> Self {
        Self {
            transport,
            sleeper: Box::new(ThreadSleeper),
            policy: RetryPolicy::default(),
        }
    }

    /// Build a client for the configured endpoint.
    ///
    /// Returns `None` when no API key is configured; AI features then
    /// degrade to their defaults.
    pub fn from_config(config: &CompletionConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            tracing::info!("No completion API key configured, AI features disabled");
            return Ok(None);
        };
        let transport = GeminiTransport::new(config, api_key)?;
        Ok(Some(Self::new(Box::new(transport)).with_policy(RetryPolicy {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        })))
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Send the request, retrying transient failures.
    pub fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut delay = self.policy.initial_backoff;
        let mut attempt = 1;
        loop {
            match self.transport.send(request) {
                Ok(text) => {
                    tracing::debug!("Completion succeeded on attempt {}", attempt);
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    tracing::warn!(
                        "Completion attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt,
                        self.policy.max_attempts,
                        e,
                        delay
                    );
                    self.sleeper.sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    tracing::error!("Completion failed after {} attempts: {}", attempt, e);
                    return Err(Error::CompletionFailed {
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send the request in JSON mode and decode the answer
    pub fn complete_json<T: DeserializeOwned>(&self, request: &CompletionRequest) -> Result<T> {
        let raw = self.complete(request)?;
        decode_json(&raw)
    }
}

/// Remove markdown code fences the model sometimes wraps around JSON
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

/// Decode model output into `T`, tolerating code fences
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(&strip_code_fences(raw)).map_err(|e| Error::Decode(e.to_string()))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays scripted outcomes and records every request it sees
    #[derive(Clone, Default)]
    pub struct ScriptedTransport {
        outcomes: Arc<Mutex<VecDeque<Result<String>>>>,
        pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl ScriptedTransport {
        pub fn new(outcomes: Vec<Result<String>>) -> Self {
            Self {
                outcomes: Arc::new(Mutex::new(outcomes.into())),
                requests: Arc::default(),
            }
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl CompletionTransport for ScriptedTransport {
        fn send(&self, request: &CompletionRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Transport("script exhausted".into())))
        }
    }

    #[derive(Clone, Default)]
    pub struct RecordingSleeper {
        pub slept: Arc<Mutex<Vec<Duration>>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    /// Client over a scripted transport that never really sleeps
    pub fn scripted_client(outcomes: Vec<Result<String>>) -> (CompletionClient, ScriptedTransport) {
        let transport = ScriptedTransport::new(outcomes);
        let client = CompletionClient::new(Box::new(transport.clone()))
            .with_sleeper(Box::new(RecordingSleeper::default()));
        (client, transport)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::collections::HashMap;

    fn unavailable() -> Result<String> {
        Err(Error::Http {
            status: 503,
            body: "overloaded".into(),
        })
    }

    #[test]
    fn test_succeeds_on_fifth_attempt() {
        let transport = ScriptedTransport::new(vec![
            unavailable(),
            Err(Error::Transport("connection reset".into())),
            unavailable(),
            unavailable(),
            Ok("hello".into()),
        ]);
        let sleeper = RecordingSleeper::default();
        let client = CompletionClient::new(Box::new(transport.clone()))
            .with_sleeper(Box::new(sleeper.clone()));

        let text = client
            .complete(&CompletionRequest::text("hi", "be brief"))
            .unwrap();

        assert_eq!(text, "hello");
        assert_eq!(transport.request_count(), 5);
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn test_five_failures_is_terminal() {
        let (client, transport) = scripted_client(vec![
            unavailable(),
            unavailable(),
            unavailable(),
            unavailable(),
            unavailable(),
            Ok("never reached".into()),
        ]);

        let err = client
            .complete(&CompletionRequest::text("hi", "be brief"))
            .unwrap_err();

        assert!(matches!(err, Error::CompletionFailed { attempts: 5, .. }));
        assert_eq!(transport.request_count(), 5);
    }

    #[test]
    fn test_decode_failures_are_not_retried() {
        let (client, transport) =
            scripted_client(vec![Err(Error::Decode("no text".into())), Ok("late".into())]);

        let err = client
            .complete(&CompletionRequest::text("hi", "be brief"))
            .unwrap_err();

        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_complete_json_strips_fences() {
        let (client, _) = scripted_client(vec![Ok(
            "```json\n{\"Squat\": 150, \"Curl\": 60}\n```".into()
        )]);

        let map: HashMap<String, u32> = client
            .complete_json(&CompletionRequest::json("rest times", "json only"))
            .unwrap();

        assert_eq!(map["Squat"], 150);
        assert_eq!(map["Curl"], 60);
    }

    #[test]
    fn test_decode_json_reports_decode_error() {
        let result: Result<HashMap<String, u32>> = decode_json("Sure! Here you go.");
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_payload_shape() {
        let payload = GeminiTransport::payload(&CompletionRequest::json("p", "s"));
        assert_eq!(payload["contents"][0]["parts"][0]["text"], "p");
        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "s");
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            "application/json"
        );

        let plain = GeminiTransport::payload(&CompletionRequest::text("p", "s"));
        assert!(plain.get("generationConfig").is_none());
    }

    #[test]
    fn test_from_config_without_key_is_disabled() {
        let config = CompletionConfig::default();
        assert!(CompletionClient::from_config(&config).unwrap().is_none());
    }
}
