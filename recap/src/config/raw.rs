// Raw YAML deserialization types (internal)
// Kept separate from the public Config structs so that variable
// interpolation, defaulting and validation happen in one place (loader.rs)
// and the public types never hold unresolved `${VAR}` references.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub recap: String,
    pub server: Option<RawServerConfig>,
    pub completion: Option<RawCompletionConfig>,
    pub markers: Option<RawMarkers>,
    pub prompt: Option<RawPromptConfig>,
    pub sources: Option<RawSourcesConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCompletionConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_ms: Option<u64>,
    pub fragment_timeout_secs: Option<u64>,
    pub attach_timeout_secs: Option<u64>,
    pub footer_label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMarkers {
    pub open: Option<String>,
    pub close: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPromptConfig {
    pub max_tokens: Option<usize>,
    pub tokenizer_path: Option<String>,
    pub system: Option<String>,
    pub reddit_instructions: Option<String>,
    pub page_instructions: Option<String>,
    pub question_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSourcesConfig {
    pub reddit: Option<RawRedditConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRedditConfig {
    pub api_base: Option<String>,
    pub user_agent: Option<String>,
    pub max_comment_depth: Option<usize>,
    pub comment_limit: Option<usize>,
}
