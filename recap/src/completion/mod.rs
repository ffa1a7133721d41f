// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

// Completion sources
//
// Responsibilities:
// - Start a streaming completion for a prompt
// - Yield text fragments in delivery order until end of stream or error

mod openai;

pub use openai::{decode_sse_line, OpenAiCompletionSource, SseLine};

use std::pin::Pin;

use futures_util::Stream;

use crate::prompt::Prompt;

/// Text fragments of one completion. Ends after the last fragment or on the
/// first error.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Transport(String),

    #[error("completion request timed out: {0}")]
    Timeout(String),

    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion stream reported an error: {0}")]
    Upstream(String),
}

/// Abstraction over the language model endpoint.
///
/// `start` resolves once the upstream has accepted the request; fragments
/// arrive through the returned stream.
#[async_trait::async_trait]
pub trait CompletionSource: Send + Sync {
    async fn start(&self, prompt: &Prompt) -> Result<FragmentStream, CompletionError>;

    /// Attribution written in the stream footer.
    fn footer_label(&self) -> &str;
}
