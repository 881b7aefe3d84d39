//! Prompt enhancement through a text-completion service.
//!
//! The completion service is unreliable by nature. [`PromptEnhancer`] never
//! fails: a broken, empty or over-long reply falls back to the input.

use async_trait::async_trait;
use promptwave_core::MAX_PROMPT_CHARS;
use serde::Deserialize;

use crate::{Result, SessionError};

/// Default text model for enhancement.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.0-flash";

const GENERATE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// A one-shot text completion service.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    /// Complete `prompt`, returning the reply text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Turns short prompts into richer musical descriptions.
#[derive(Debug, Clone)]
pub struct PromptEnhancer<C> {
    completer: C,
}

impl<C: TextCompleter> PromptEnhancer<C> {
    /// Wrap a completer.
    pub fn new(completer: C) -> Self {
        Self { completer }
    }

    /// Ask for a more evocative version of `text`.
    ///
    /// Returns `text` unchanged when the completer fails or answers with
    /// something that would not be a valid prompt.
    pub async fn enhance(&self, text: &str) -> String {
        let request = format!(
            "Rewrite this music prompt as a richer description of genre, instruments \
             and mood for a generative music model. Reply with the prompt only, under \
             {MAX_PROMPT_CHARS} characters.\n\nPrompt: {text}"
        );
        match self.completer.complete(&request).await {
            Ok(reply) => match clean_line(&reply) {
                Some(enhanced) => enhanced,
                None => {
                    tracing::warn!(original = text, "unusable enhancement, keeping original");
                    text.to_string()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, original = text, "prompt enhancement failed");
                text.to_string()
            }
        }
    }

    /// Ask for `count` short prompt ideas. Empty on failure.
    pub async fn suggest(&self, count: usize) -> Vec<String> {
        if count == 0 {
            return Vec::new();
        }
        let request = format!(
            "Suggest {count} short, distinct music prompts (genre, instrument or mood), \
             one per line, with no numbering or commentary."
        );
        match self.completer.complete(&request).await {
            Ok(reply) => reply.lines().filter_map(clean_line).take(count).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "prompt suggestion failed");
                Vec::new()
            }
        }
    }
}

/// Strip list markers and quotes; reject empty or over-long lines.
fn clean_line(line: &str) -> Option<String> {
    let line = line.trim();
    let line = match line.find(['.', ')']) {
        Some(i) if i > 0 && line[..i].chars().all(|c| c.is_ascii_digit()) => &line[i + 1..],
        _ => line,
    };
    let cleaned = line
        .trim_start_matches(['-', '*', '•'])
        .trim()
        .trim_matches(['"', '\'', '`'])
        .trim();
    let len = cleaned.chars().count();
    (len > 0 && len <= MAX_PROMPT_CHARS).then(|| cleaned.to_string())
}

/// [`TextCompleter`] backed by the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiTextCompleter {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GeminiTextCompleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiTextCompleter")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiTextCompleter {
    /// Create a completer using [`DEFAULT_TEXT_MODEL`].
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_TEXT_MODEL.to_string(),
        }
    }

    /// Use a different model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

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
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait]
impl TextCompleter for GeminiTextCompleter {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{GENERATE_URL}/{}:generateContent", self.model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: GenerateResponse = response.json().await?;
        parsed
            .text()
            .ok_or_else(|| SessionError::Completion("response carried no text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Option<&'static str>);

    #[async_trait]
    impl TextCompleter for Canned {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| SessionError::Completion("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn enhance_uses_cleaned_reply() {
        let enhancer = PromptEnhancer::new(Canned(Some(
            "\"Warm lo-fi hip hop with dusty Rhodes chords\"\n",
        )));
        assert_eq!(
            enhancer.enhance("lofi").await,
            "Warm lo-fi hip hop with dusty Rhodes chords"
        );
    }

    #[tokio::test]
    async fn enhance_keeps_original_on_failure() {
        let enhancer = PromptEnhancer::new(Canned(None));
        assert_eq!(enhancer.enhance("Minimal techno").await, "Minimal techno");
    }

    #[tokio::test]
    async fn enhance_rejects_empty_and_overlong_replies() {
        let enhancer = PromptEnhancer::new(Canned(Some("   ")));
        assert_eq!(enhancer.enhance("Funk").await, "Funk");

        let long: &'static str = Box::leak("x".repeat(MAX_PROMPT_CHARS + 1).into_boxed_str());
        let enhancer = PromptEnhancer::new(Canned(Some(long)));
        assert_eq!(enhancer.enhance("Funk").await, "Funk");
    }

    #[tokio::test]
    async fn suggest_strips_list_markers() {
        let enhancer = PromptEnhancer::new(Canned(Some(
            "1. Shoegaze\n- Dubstep\n\n* \"Sitar drone\"\n808 bass",
        )));
        assert_eq!(
            enhancer.suggest(4).await,
            vec!["Shoegaze", "Dubstep", "Sitar drone", "808 bass"]
        );
    }

    #[tokio::test]
    async fn suggest_is_empty_on_failure() {
        let enhancer = PromptEnhancer::new(Canned(None));
        assert!(enhancer.suggest(4).await.is_empty());
        let enhancer = PromptEnhancer::new(Canned(Some("Jazz")));
        assert!(enhancer.suggest(0).await.is_empty());
    }

    #[test]
    fn response_text_joins_parts() {
        let parsed: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Deep "},{"text":"house"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Deep house"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.text().is_none());
    }
}
