// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

// Source extraction
//
// Responsibilities:
// - Decide which extractor handles a submitted URL
// - Turn a page into plain text the prompt builder can embed
// - Wrap text the browser already extracted as a document

mod reddit;

pub use reddit::{render_thread, RedditExtractor};

use std::sync::Arc;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// What kind of page a document came from. Selects the prompt instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Reddit,
    WebPage,
}

/// Extracted page content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub url: String,
    pub kind: DocumentKind,
    pub title: Option<String>,
    pub text: String,
}

impl Document {
    /// A document for page text extracted by the client.
    pub fn from_page_text(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: DocumentKind::WebPage,
            title: None,
            text: text.into(),
        }
    }

    /// Attach a page title. Blank titles are dropped.
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
}

// ---------------------------------------------------------------------------
// Trait: SourceExtractor
// ---------------------------------------------------------------------------

/// Fetches and renders pages from one kind of site.
#[async_trait::async_trait]
pub trait SourceExtractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether this extractor understands `url`.
    fn accepts(&self, url: &reqwest::Url) -> bool;

    async fn extract(&self, url: &reqwest::Url) -> Result<Document, SourceError>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Ordered list of extractors; the first one accepting a URL wins.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    extractors: Vec<Arc<dyn SourceExtractor>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, extractor: Arc<dyn SourceExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// Extract the page at `url` with the first extractor that accepts it.
    pub async fn extract(&self, url: &str) -> Result<Document, SourceError> {
        let parsed = reqwest::Url::parse(url.trim())
            .map_err(|e| SourceError::UnsupportedSource(format!("invalid url \"{url}\": {e}")))?;

        let extractor = self
            .extractors
            .iter()
            .find(|x| x.accepts(&parsed))
            .ok_or_else(|| SourceError::UnsupportedSource(format!("no extractor for {parsed}")))?;

        tracing::debug!(extractor = extractor.name(), url = %parsed, "extracting source");
        extractor.extract(&parsed).await
    }
}
