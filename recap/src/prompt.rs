// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

// Prompt construction
//
// Builds the system and user messages for a document, optionally framed
// around a reader's question, and cuts the user message down to the token
// budget of the model.

use std::sync::Arc;

use crate::config::{PromptConfig, PromptTemplates};
use crate::source::{Document, DocumentKind};

/// The two messages sent to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to load tokenizer: {0}")]
    Tokenizer(String),
}

// ---------------------------------------------------------------------------
// Trait: TokenCounter
// ---------------------------------------------------------------------------

/// Counts and truncates text in model tokens.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Longest prefix of `text` that fits in `max_tokens`. Always ends on a
    /// char boundary.
    fn truncate<'a>(&self, text: &'a str, max_tokens: usize) -> &'a str;
}

/// Heuristic counter: one token per four chars.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenCounter;

const CHARS_PER_TOKEN: usize = 4;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }

    fn truncate<'a>(&self, text: &'a str, max_tokens: usize) -> &'a str {
        let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
        match text.char_indices().nth(max_chars) {
            Some((cut, _)) => &text[..cut],
            None => text,
        }
    }
}

// ---------------------------------------------------------------------------
// Feature-gated: HfTokenCounter
// ---------------------------------------------------------------------------

#[cfg(feature = "hf-tokenizer")]
mod hf_impl {
    use std::path::Path;

    use tokenizers::Tokenizer;

    use super::{ApproxTokenCounter, PromptError, TokenCounter};

    /// Exact counts from a HuggingFace `tokenizer.json`.
    ///
    /// Falls back to the heuristic when encoding fails, which only happens
    /// for inputs the tokenizer's normalizer rejects.
    pub struct HfTokenCounter {
        tokenizer: Tokenizer,
    }

    impl HfTokenCounter {
        pub fn from_file(path: &Path) -> Result<Self, PromptError> {
            let tokenizer = Tokenizer::from_file(path)
                .map_err(|e| PromptError::Tokenizer(format!("{}: {e}", path.display())))?;
            Ok(Self { tokenizer })
        }
    }

    impl TokenCounter for HfTokenCounter {
        fn count(&self, text: &str) -> usize {
            match self.tokenizer.encode(text, false) {
                Ok(encoding) => encoding.get_ids().len(),
                Err(e) => {
                    tracing::warn!("tokenizer failed, using approximate count: {e}");
                    ApproxTokenCounter.count(text)
                }
            }
        }

        fn truncate<'a>(&self, text: &'a str, max_tokens: usize) -> &'a str {
            let encoding = match self.tokenizer.encode(text, false) {
                Ok(encoding) => encoding,
                Err(e) => {
                    tracing::warn!("tokenizer failed, using approximate truncation: {e}");
                    return ApproxTokenCounter.truncate(text, max_tokens);
                }
            };
            if encoding.get_ids().len() <= max_tokens {
                return text;
            }
            if max_tokens == 0 {
                return "";
            }
            // Offsets are byte offsets into `text`.
            let mut cut = encoding.get_offsets()[max_tokens - 1].1.min(text.len());
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            &text[..cut]
        }
    }
}

#[cfg(feature = "hf-tokenizer")]
pub use hf_impl::HfTokenCounter;

/// Pick the token counter for a prompt config.
pub fn build_token_counter(config: &PromptConfig) -> Result<Arc<dyn TokenCounter>, PromptError> {
    match &config.tokenizer_path {
        None => Ok(Arc::new(ApproxTokenCounter)),
        #[cfg(feature = "hf-tokenizer")]
        Some(path) => Ok(Arc::new(HfTokenCounter::from_file(path)?)),
        #[cfg(not(feature = "hf-tokenizer"))]
        Some(path) => Err(PromptError::Tokenizer(format!(
            "tokenizer_path {} is set but recap was built without the hf-tokenizer feature",
            path.display()
        ))),
    }
}

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

pub struct PromptBuilder {
    templates: PromptTemplates,
    max_tokens: usize,
    counter: Arc<dyn TokenCounter>,
}

impl PromptBuilder {
    pub fn new(templates: PromptTemplates, max_tokens: usize, counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            templates,
            max_tokens,
            counter,
        }
    }

    pub fn from_config(config: &PromptConfig) -> Result<Self, PromptError> {
        Ok(Self::new(
            config.templates.clone(),
            config.max_tokens,
            build_token_counter(config)?,
        ))
    }

    /// Build the prompt for `document`. A non-blank `question` asks for an
    /// answer instead of a summary.
    pub fn build(&self, document: &Document, question: Option<&str>) -> Prompt {
        let instructions = match question.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => self.templates.question_instructions.replace("{question}", q),
            None => match document.kind {
                DocumentKind::Reddit => self.templates.reddit_instructions.clone(),
                DocumentKind::WebPage => self.templates.page_instructions.clone(),
            },
        };

        let mut user = instructions;
        user.push_str("\n\n");
        if let Some(title) = document.title.as_deref().filter(|t| !t.is_empty()) {
            if document.kind == DocumentKind::WebPage {
                user.push_str(&format!("Title: {title}\n\n"));
            }
        }
        user.push_str(&document.text);

        let kept = self.counter.truncate(&user, self.max_tokens).len();
        if kept < user.len() {
            tracing::info!(
                url = %document.url,
                max_tokens = self.max_tokens,
                dropped_bytes = user.len() - kept,
                "prompt truncated to token budget"
            );
            user.truncate(kept);
        }

        Prompt {
            system: self.templates.system.clone(),
            user,
        }
    }
}
