//! Answer generation over retrieved facts.
//!
//! The remote language model is an optional collaborator. [`TieredGenerator`]
//! calls it when there is context to ground on and falls back to a
//! deterministic restatement when the call cannot be made or fails, so a
//! question always gets an answer.

use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::error::AnswerError;
use crate::retrieval::SearchHit;

/// Answer given when no context was found.
pub const NO_CONTEXT_ANSWER: &str =
    "Sorry, I could not find any relevant information to answer your question.";

/// Which strategy produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerProvider {
    /// The remote language model.
    Remote,
    /// Deterministic restatement of the context.
    Fallback,
    /// Nothing to ground on.
    NoContext,
}

/// A generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text.
    pub text: String,
    /// Strategy that produced `text`.
    pub provider: AnswerProvider,
    /// True if a remote call was wanted but did not succeed.
    pub degraded: bool,
}

/// Produces an answer for a question given retrieved context.
pub trait AnswerGenerator: Send + Sync {
    /// Never fails; degraded paths are reported on the [`Answer`].
    fn generate(&self, question: &str, context: &[SearchHit]) -> Answer;
}

/// A text completion backend.
pub trait CompletionBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Completes `prompt`.
    ///
    /// # Errors
    /// Returns [`AnswerError`] on any transport, status or shape problem.
    fn complete(&self, prompt: &str) -> Result<String, AnswerError>;
}

fn context_block(context: &[SearchHit]) -> String {
    context
        .iter()
        .map(|h| h.fact.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the grounded prompt sent to the completion backend.
#[must_use]
pub fn build_prompt(question: &str, context: &[SearchHit]) -> String {
    format!(
        "Using the following facts about Vietnamese provinces, answer the question.\n\n\
         Facts (format: new_province: IRI of the province after the merger, \
         new_label: its name, old_province: IRI of a province before the merger, \
         old_label: its name):\n{}\n\n\
         Question: {question}\n\n\
         Answer precisely from the facts and cite the relevant IRIs where possible:",
        context_block(context)
    )
}

/// Restates the question and the raw context.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

impl FallbackGenerator {
    fn render(question: &str, context: &[SearchHit]) -> String {
        format!(
            "Based on the information found, this is what relates to the question \"{question}\":\n\n\
             {}\n\n\
             This is raw data from the knowledge graph and may need further interpretation.",
            context_block(context)
        )
    }
}

impl AnswerGenerator for FallbackGenerator {
    fn generate(&self, question: &str, context: &[SearchHit]) -> Answer {
        if context.is_empty() {
            return Answer {
                text: NO_CONTEXT_ANSWER.to_string(),
                provider: AnswerProvider::NoContext,
                degraded: false,
            };
        }
        Answer {
            text: Self::render(question, context),
            provider: AnswerProvider::Fallback,
            degraded: false,
        }
    }
}

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: HttpClient,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiGenerator {
    /// Creates a client. A `None` key makes every call fail with
    /// [`AnswerError::MissingCredential`].
    ///
    /// # Errors
    /// Returns [`AnswerError::Request`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AnswerError> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnswerError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Returns true if an API key is configured.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

/// Pulls `candidates[0].content.parts[0].text` out of a response body.
fn extract_text(body: &str) -> Result<String, AnswerError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AnswerError::UnexpectedShape(e.to_string()))?;
    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| AnswerError::UnexpectedShape("no candidate text".to_string()))
}

impl CompletionBackend for GeminiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: &str) -> Result<String, AnswerError> {
        let key = self.api_key.as_deref().ok_or(AnswerError::MissingCredential)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(key).map_err(|e| AnswerError::Request(e.to_string()))?,
        );
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.url())
            .headers(headers)
            .json(&request)
            .send()
            .map_err(|e| AnswerError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AnswerError::Status(status.as_u16()));
        }
        let body = response
            .text()
            .map_err(|e| AnswerError::Request(e.to_string()))?;
        extract_text(&body)
    }
}

/// Remote first, deterministic fallback second.
pub struct TieredGenerator {
    remote: Option<Box<dyn CompletionBackend>>,
    fallback: FallbackGenerator,
}

impl std::fmt::Debug for TieredGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredGenerator")
            .field("remote", &self.remote.as_ref().map(|r| r.name().to_string()))
            .finish()
    }
}

impl TieredGenerator {
    /// Uses `remote` when there is context.
    #[must_use]
    pub fn new(remote: Box<dyn CompletionBackend>) -> Self {
        Self {
            remote: Some(remote),
            fallback: FallbackGenerator,
        }
    }

    /// Never calls out; every answer comes from the fallback.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            remote: None,
            fallback: FallbackGenerator,
        }
    }
}

impl AnswerGenerator for TieredGenerator {
    fn generate(&self, question: &str, context: &[SearchHit]) -> Answer {
        if context.is_empty() {
            return self.fallback.generate(question, context);
        }
        let Some(remote) = self.remote.as_ref() else {
            return self.fallback.generate(question, context);
        };

        match remote.complete(&build_prompt(question, context)) {
            Ok(text) => Answer {
                text,
                provider: AnswerProvider::Remote,
                degraded: false,
            },
            Err(err) => {
                tracing::warn!(backend = remote.name(), error = %err, "answer generation degraded");
                Answer {
                    degraded: true,
                    ..self.fallback.generate(question, context)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        reply: Result<String, u16>,
        calls: Arc<AtomicUsize>,
    }

    impl CompletionBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn complete(&self, prompt: &str) -> Result<String, AnswerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("Question:"));
            self.reply.clone().map_err(AnswerError::Status)
        }
    }

    fn hit(fact: &str) -> SearchHit {
        SearchHit {
            rank: 0,
            index: 0,
            fact: fact.to_string(),
            score: 1.0,
            record: None,
        }
    }

    fn tiered(reply: Result<String, u16>) -> (TieredGenerator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let remote = Scripted {
            reply,
            calls: Arc::clone(&calls),
        };
        (TieredGenerator::new(Box::new(remote)), calls)
    }

    #[test]
    fn test_empty_context_skips_remote() {
        let (g, calls) = tiered(Ok("remote".into()));
        let answer = g.generate("where?", &[]);
        assert_eq!(answer.text, NO_CONTEXT_ANSWER);
        assert_eq!(answer.provider, AnswerProvider::NoContext);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remote_success() {
        let (g, calls) = tiered(Ok("Da Nang".into()));
        let answer = g.generate("where?", &[hit("fact one")]);
        assert_eq!(answer.text, "Da Nang");
        assert_eq!(answer.provider, AnswerProvider::Remote);
        assert!(!answer.degraded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remote_failure_falls_back() {
        let (g, _) = tiered(Err(503));
        let answer = g.generate("where?", &[hit("fact one"), hit("fact two")]);
        assert_eq!(answer.provider, AnswerProvider::Fallback);
        assert!(answer.degraded);
        assert!(answer.text.contains("\"where?\""));
        assert!(answer.text.contains("fact one\nfact two"));
    }

    #[test]
    fn test_offline_is_not_degraded() {
        let answer = TieredGenerator::offline().generate("q", &[hit("f")]);
        assert_eq!(answer.provider, AnswerProvider::Fallback);
        assert!(!answer.degraded);
    }

    #[test]
    fn test_prompt_contains_question_and_facts() {
        let prompt = build_prompt("Which?", &[hit("a | b"), hit("c | d")]);
        assert!(prompt.contains("Question: Which?"));
        assert!(prompt.contains("a | b\nc | d"));
    }

    #[test]
    fn test_extract_text_shapes() {
        let ok = r#"{"candidates":[{"content":{"parts":[{"text":"hi"}]}}]}"#;
        assert_eq!(extract_text(ok).unwrap(), "hi");
        let none = r#"{"candidates":[]}"#;
        assert!(matches!(extract_text(none), Err(AnswerError::UnexpectedShape(_))));
        let no_content = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        assert!(extract_text(no_content).is_err());
        assert!(extract_text("not json").is_err());
    }

    #[test]
    fn test_gemini_without_key() {
        let g = GeminiGenerator::new(
            DEFAULT_GEMINI_ENDPOINT,
            DEFAULT_GEMINI_MODEL,
            Some("   ".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(!g.has_credential());
        assert!(matches!(g.complete("x"), Err(AnswerError::MissingCredential)));
        assert_eq!(
            g.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
