use std::net::{IpAddr, Ipv4Addr};

use super::error::ConfigError;
use super::types::PromptTemplates;

/// The default prompt text, embedded at compile time.
const DEFAULT_PROMPTS_YAML: &str = include_str!("../../prompts/default_prompts.yaml");

pub const DEFAULT_BIND: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_PORT: u16 = 5000;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_FRAGMENT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_ATTACH_TIMEOUT_SECS: u64 = 60;

/// Fits the 30k-token context of the smaller hosted models with room for the answer.
pub const DEFAULT_MAX_PROMPT_TOKENS: usize = 29_000;

pub const DEFAULT_REDDIT_API_BASE: &str = "https://www.reddit.com";
pub const DEFAULT_USER_AGENT: &str = concat!("recap/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_COMMENT_DEPTH: usize = 6;
pub const DEFAULT_COMMENT_LIMIT: usize = 500;

/// Parse the embedded default prompt text.
pub fn default_prompt_templates() -> Result<PromptTemplates, ConfigError> {
    Ok(serde_yaml::from_str(DEFAULT_PROMPTS_YAML)?)
}
