//! Optional generative responder for unrecognized commands.
//!
//! When the local dispatch table does not recognize a command, the
//! pipeline can ask a remote generative-text backend to improvise the
//! output, keeping the deception going for commands nobody canned.
//! The backend sits behind the [`GenerativeBackend`] trait so the
//! retry logic is testable without a network; the production
//! implementation is [`HttpBackend`], a bearer-authenticated
//! chat-completion call over reqwest.
//!
//! [`RemoteResponder`] wraps a backend with the bounded-retry policy:
//! up to `max_attempts` calls, exponential backoff between attempts
//! (never after the last), and any transport error, malformed body, or
//! blank extracted text counts as a failed attempt. Failure never
//! escapes this module — the caller gets `None` and falls through to
//! the deterministic "command not found" tier. The whole component is
//! optional: running without it is the normal local-only mode.

use std::time::Duration;

use async_trait::async_trait;
use mirage_core::host;
use mirage_core::retry::RetryPolicy;
use mirage_core::session::Session;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outbound request timeout for a single backend call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from a single backend attempt.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure (connect, timeout, non-2xx status).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Response parsed but the extracted text was blank.
    #[error("backend returned blank output")]
    BlankOutput,
}

/// A generative-text backend: given the persona, the conversation so
/// far, and the new command, produce the command's output.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Perform one completion attempt.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an unusable response;
    /// the caller decides whether to retry.
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[String],
        command: &str,
    ) -> Result<String, BackendError>;
}

/// Chat-completion backend over HTTP with bearer-token auth.
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
}

impl HttpBackend {
    /// Build a backend for the given endpoint and model.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        })
    }

    /// Chat-style request body: the persona as the system message, the
    /// session's prior commands as user turns for continuity, then the
    /// new command.
    fn request_body(
        model: &str,
        system_prompt: &str,
        history: &[String],
        command: &str,
    ) -> serde_json::Value {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(serde_json::json!({
            "role": "system",
            "content": system_prompt,
        }));
        for prior in history {
            messages.push(serde_json::json!({
                "role": "user",
                "content": prior,
            }));
        }
        messages.push(serde_json::json!({
            "role": "user",
            "content": command,
        }));

        serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": 0.2,
            "max_tokens": 300,
        })
    }

    /// Extract the completion text from a chat-style response body.
    fn extract_text(body: &serde_json::Value) -> Option<&str> {
        body.get("choices")?
            .get(0)?
            .get("message")?
            .get("content")?
            .as_str()
    }
}

#[async_trait]
impl GenerativeBackend for HttpBackend {
    async fn complete(
        &self,
        system_prompt: &str,
        history: &[String],
        command: &str,
    ) -> Result<String, BackendError> {
        let body = Self::request_body(&self.model, system_prompt, history, command);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("response is not JSON: {e}")))?;

        let text = Self::extract_text(&body)
            .ok_or_else(|| BackendError::Malformed("no completion text in response".to_string()))?;

        if text.trim().is_empty() {
            return Err(BackendError::BlankOutput);
        }
        Ok(text.to_string())
    }
}

/// A [`GenerativeBackend`] wrapped with the bounded-retry policy.
pub struct RemoteResponder {
    backend: Box<dyn GenerativeBackend>,
    retry: RetryPolicy,
}

impl RemoteResponder {
    /// Wrap a backend with a retry policy.
    #[must_use]
    pub fn new(backend: Box<dyn GenerativeBackend>, retry: RetryPolicy) -> Self {
        Self { backend, retry }
    }

    /// Ask the backend for the output of `command`.
    ///
    /// Performs up to `max_attempts` calls with exponential backoff
    /// between attempts. Returns `None` once the attempts are
    /// exhausted or the session's cancellation fires during a backoff
    /// wait — never an error.
    pub async fn respond(
        &self,
        command: &str,
        session: &Session,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let system_prompt = host::system_prompt(session.working_directory());

        for attempt in 1..=self.retry.max_attempts {
            match self
                .backend
                .complete(&system_prompt, session.command_history(), command)
                .await
            {
                Ok(text) => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        return Some(format!("{trimmed}\n"));
                    }
                    // Blank text is a failed attempt, same as an error.
                    warn!(
                        session = %session.id(),
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "Backend returned blank output"
                    );
                },
                Err(error) => {
                    warn!(
                        session = %session.id(),
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        %error,
                        "Generative backend call failed"
                    );
                },
            }

            if self.retry.is_final_attempt(attempt) {
                break;
            }

            let delay = self.retry.delay_for_attempt(attempt);
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(session = %session.id(), "Backoff interrupted by session termination");
                    return None;
                }
                () = tokio::time::sleep(delay) => {},
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;

    /// Backend that fails a fixed number of times before succeeding.
    struct FlakyBackend {
        failures_before_success: u32,
        attempts: AtomicU32,
        success_text: &'static str,
    }

    impl FlakyBackend {
        fn new(failures_before_success: u32, success_text: &'static str) -> Self {
            Self {
                failures_before_success,
                attempts: AtomicU32::new(0),
                success_text,
            }
        }
    }

    #[async_trait]
    impl GenerativeBackend for FlakyBackend {
        async fn complete(
            &self,
            _system_prompt: &str,
            _history: &[String],
            _command: &str,
        ) -> Result<String, BackendError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures_before_success {
                Err(BackendError::Malformed("simulated failure".to_string()))
            } else {
                Ok(self.success_text.to_string())
            }
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success_returns_third_text() {
        let responder = RemoteResponder::new(
            Box::new(FlakyBackend::new(2, "total 0")),
            policy(),
        );
        let session = Session::new("peer");
        let cancel = CancellationToken::new();

        let started = Instant::now();
        let out = responder.respond("ls -la /opt", &session, &cancel).await;

        assert_eq!(out.as_deref(), Some("total 0\n"));
        // Exactly two backoff delays: 500ms then 1000ms, the second
        // double the first, and none after the successful attempt.
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_yield_none_without_trailing_delay() {
        let backend = FlakyBackend::new(u32::MAX, "");
        let responder = RemoteResponder::new(Box::new(backend), policy());
        let session = Session::new("peer");
        let cancel = CancellationToken::new();

        let started = Instant::now();
        let out = responder.respond("zzz", &session, &cancel).await;

        assert_eq!(out, None);
        // Delays only between attempts: 500ms + 1000ms, nothing after
        // the third failure.
        assert_eq!(started.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_success_counts_as_failed_attempt() {
        // Succeeds immediately but with whitespace-only text.
        let responder = RemoteResponder::new(
            Box::new(FlakyBackend::new(0, "   \n")),
            policy(),
        );
        let session = Session::new("peer");

        let out = responder
            .respond("id", &session, &CancellationToken::new())
            .await;
        assert_eq!(out, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let backend = FlakyBackend::new(u32::MAX, "");
        let responder = RemoteResponder::new(Box::new(backend), policy());
        let session = Session::new("peer");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let started = Instant::now();
        let out = responder.respond("zzz", &session, &cancel).await;

        assert_eq!(out, None);
        // First attempt runs, then the backoff wait is interrupted
        // immediately instead of sleeping 500ms.
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_output_is_newline_terminated() {
        let responder = RemoteResponder::new(
            Box::new(FlakyBackend::new(0, "  inet 10.0.0.5/24  ")),
            RetryPolicy::default(),
        );
        let session = Session::new("peer");

        let out = responder
            .respond("ip addr", &session, &CancellationToken::new())
            .await;
        assert_eq!(out.as_deref(), Some("inet 10.0.0.5/24\n"));
    }

    #[test]
    fn test_request_body_carries_persona_and_history() {
        let history = vec!["cd /home".to_string(), "pwd".to_string()];
        let body = HttpBackend::request_body("decoy-v1", "persona", &history, "ls");

        assert_eq!(body["model"], "decoy-v1");
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "persona");
        assert_eq!(messages[1]["content"], "cd /home");
        assert_eq!(messages[2]["content"], "pwd");
        assert_eq!(messages[3]["content"], "ls");
    }

    #[test]
    fn test_extract_text_from_chat_response() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "file.txt\n"}}]
        });
        assert_eq!(HttpBackend::extract_text(&body), Some("file.txt\n"));

        let malformed = serde_json::json!({"error": "overloaded"});
        assert_eq!(HttpBackend::extract_text(&malformed), None);
    }
}
