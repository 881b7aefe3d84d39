//! Weighted prompts and the content-policy registry.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{PromptError, Result};

/// Maximum prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 200;

/// A weighted text prompt guiding the generated audio.
///
/// Immutable once built: text is trimmed, non-empty and at most
/// [`MAX_PROMPT_CHARS`] characters; weight is finite and non-negative.
///
/// # Example
///
/// ```rust
/// use promptwave_core::Prompt;
///
/// let prompt = Prompt::new("  Shoegaze  ", 0.8).unwrap();
/// assert_eq!(prompt.text(), "Shoegaze");
/// assert!(Prompt::new("", 1.0).is_err());
/// assert!(Prompt::new("Drum and bass", -1.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPrompt")]
pub struct Prompt {
    text: String,
    weight: f32,
}

#[derive(Deserialize)]
struct RawPrompt {
    text: String,
    weight: f32,
}

impl TryFrom<RawPrompt> for Prompt {
    type Error = PromptError;

    fn try_from(raw: RawPrompt) -> Result<Self> {
        Prompt::new(raw.text, raw.weight)
    }
}

impl Prompt {
    /// Build a validated prompt.
    pub fn new(text: impl AsRef<str>, weight: f32) -> Result<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(PromptError::EmptyText);
        }
        let len = text.chars().count();
        if len > MAX_PROMPT_CHARS {
            return Err(PromptError::TextTooLong {
                len,
                max: MAX_PROMPT_CHARS,
            });
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(PromptError::InvalidWeight(weight));
        }
        Ok(Self {
            text: text.to_string(),
            weight,
        })
    }

    /// Prompt text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Relative influence weight.
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Whether this prompt contributes to generation given the registry.
    pub fn is_active(&self, filtered: &FilteredPromptRegistry) -> bool {
        self.weight > 0.0 && !filtered.contains(&self.text)
    }
}

/// Ordered collection of prompts, replaced wholesale on every update.
///
/// Order is kept for display only; it has no effect on playback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptSet {
    prompts: Vec<Prompt>,
}

impl PromptSet {
    /// Create a prompt set from already-validated prompts.
    pub fn new(prompts: Vec<Prompt>) -> Self {
        Self { prompts }
    }

    /// Build a set from `(text, weight)` pairs, validating each.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f32)>,
        S: AsRef<str>,
    {
        let prompts = pairs
            .into_iter()
            .map(|(text, weight)| Prompt::new(text, weight))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { prompts })
    }

    /// All prompts in insertion order.
    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    /// Iterate over prompts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Prompt> {
        self.prompts.iter()
    }

    /// Number of prompts.
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Prompts with positive weight whose text has not been filtered.
    pub fn active(&self, filtered: &FilteredPromptRegistry) -> Vec<Prompt> {
        self.prompts
            .iter()
            .filter(|p| p.is_active(filtered))
            .cloned()
            .collect()
    }

    /// Whether at least one prompt is active.
    pub fn has_active(&self, filtered: &FilteredPromptRegistry) -> bool {
        self.prompts.iter().any(|p| p.is_active(filtered))
    }

    /// The prompt with the highest weight, first one wins on ties.
    pub fn heaviest(&self) -> Option<&Prompt> {
        self.prompts.iter().fold(None, |best: Option<&Prompt>, p| match best {
            Some(b) if b.weight >= p.weight => Some(b),
            _ => Some(p),
        })
    }
}

impl<'a> IntoIterator for &'a PromptSet {
    type Item = &'a Prompt;
    type IntoIter = std::slice::Iter<'a, Prompt>;

    fn into_iter(self) -> Self::IntoIter {
        self.prompts.iter()
    }
}

/// Prompt texts rejected by the remote service's content policy.
///
/// Grows monotonically while a session lives and survives prompt
/// replacement. Only a full reconnect clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredPromptRegistry {
    texts: HashSet<String>,
}

impl FilteredPromptRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a filtered text. Returns `true` if it was not known yet.
    pub fn insert(&mut self, text: impl Into<String>) -> bool {
        self.texts.insert(text.into())
    }

    /// Whether `text` has been filtered.
    pub fn contains(&self, text: &str) -> bool {
        self.texts.contains(text)
    }

    /// Number of filtered texts.
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// Whether nothing has been filtered.
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Filtered texts, sorted for stable display.
    pub fn texts(&self) -> Vec<String> {
        let mut texts: Vec<String> = self.texts.iter().cloned().collect();
        texts.sort();
        texts
    }

    /// Forget every filtered text (full reconnect only).
    pub fn clear(&mut self) {
        self.texts.clear();
    }
}
