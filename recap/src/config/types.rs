use std::net::IpAddr;
use std::path::PathBuf;

use crate::segment::Markers;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level parsed and validated recap config.
#[derive(Debug, Clone)]
pub struct Config {
    /// Config format version. Always "v1".
    pub version: String,
    pub server: ServerConfig,
    pub completion: CompletionConfig,
    /// Reasoning region delimiters in model output.
    pub markers: Markers,
    pub prompt: PromptConfig,
    pub sources: SourcesConfig,
    /// SHA256 hash of the raw YAML: "sha256:{hex}". Logged at startup.
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Where the HTTP server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

/// Upstream OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    /// Base URL including the API version path, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer token. Local servers (Ollama) usually need none.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    /// Limit on connecting and receiving response headers.
    pub timeout_ms: u64,
    /// Longest allowed silence between fragments once streaming.
    pub fragment_timeout_secs: Option<u64>,
    /// How long a started job waits for a consumer before it is discarded.
    pub attach_timeout_secs: Option<u64>,
    /// Attribution shown in the stream footer.
    pub footer_label: String,
}

/// Prompt construction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptConfig {
    /// Token budget for the user message (instructions + page text).
    pub max_tokens: usize,
    /// HuggingFace `tokenizer.json` used for exact token counts.
    pub tokenizer_path: Option<PathBuf>,
    pub templates: PromptTemplates,
}

/// Prompt text. `question_instructions` contains a `{question}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct PromptTemplates {
    pub system: String,
    pub reddit_instructions: String,
    pub page_instructions: String,
    pub question_instructions: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcesConfig {
    pub reddit: RedditConfig,
}

/// Reddit thread extraction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RedditConfig {
    /// Origin the `.json` listing is fetched from.
    pub api_base: String,
    pub user_agent: String,
    /// Deepest reply level included in the rendered thread (0 = top level only).
    pub max_comment_depth: usize,
    /// `limit` query parameter passed to the listing endpoint.
    pub comment_limit: usize,
}
