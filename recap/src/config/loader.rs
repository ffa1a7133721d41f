// Config loader and validator
//
// Loads recap.yaml, validates structure, resolves variable interpolation,
// fills defaults and computes a deterministic hash of the raw YAML.

use std::net::IpAddr;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::segment::{Markers, DEFAULT_CLOSE_MARKER, DEFAULT_OPEN_MARKER};

use super::defaults::*;
use super::error::ConfigError;
use super::interpolation::{resolve_optional, resolve_variables};
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a recap config from the given source.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Compute SHA256 config hash
/// 3. Parse YAML into raw deserialization types
/// 4. Validate version and values
/// 5. Resolve variable interpolation in URL and credential fields
/// 6. Fill defaults and build the typed Config struct
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    tracing::debug!(source = %source.describe(), bytes = raw_yaml.len(), "config read");
    let config_hash = compute_hash(&raw_yaml);

    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.recap != "v1" {
        return Err(ConfigError::UnsupportedVersion(raw.recap));
    }

    Ok(Config {
        version: raw.recap,
        server: build_server_config(raw.server)?,
        completion: build_completion_config(raw.completion)?,
        markers: build_markers(raw.markers)?,
        prompt: build_prompt_config(raw.prompt)?,
        sources: build_sources_config(raw.sources)?,
        config_hash,
    })
}

pub fn compute_hash(raw_yaml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_yaml.as_bytes());
    let hash = hasher.finalize();
    format!("sha256:{:x}", hash)
}

fn build_server_config(raw: Option<raw::RawServerConfig>) -> Result<ServerConfig, ConfigError> {
    let Some(raw) = raw else {
        return Ok(ServerConfig {
            bind: DEFAULT_BIND,
            port: DEFAULT_PORT,
        });
    };

    let bind = match raw.bind {
        Some(addr) => addr.parse::<IpAddr>().map_err(|e| {
            ConfigError::Validation(format!("invalid server bind address \"{addr}\": {e}"))
        })?,
        None => DEFAULT_BIND,
    };

    Ok(ServerConfig {
        bind,
        port: raw.port.unwrap_or(DEFAULT_PORT),
    })
}

fn build_completion_config(
    raw: Option<raw::RawCompletionConfig>,
) -> Result<CompletionConfig, ConfigError> {
    let raw = raw.unwrap_or_default();

    let base_url = match raw.base_url {
        Some(url) => resolve_variables(&url)?,
        None => DEFAULT_BASE_URL.to_string(),
    };
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "completion base_url \"{base_url}\" must start with http:// or https://"
        )));
    }

    let api_key = resolve_optional(raw.api_key)?.filter(|k| !k.trim().is_empty());

    let model = raw.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
    if model.trim().is_empty() {
        return Err(ConfigError::Validation("completion model must not be empty".into()));
    }

    let temperature = raw.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::Validation(format!(
            "completion temperature {temperature} out of range 0.0..=2.0"
        )));
    }

    let timeout_ms = raw.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(ConfigError::Validation("completion timeout_ms must be > 0".into()));
    }

    // 0 disables either timeout.
    let fragment_timeout_secs = raw
        .fragment_timeout_secs
        .or(Some(DEFAULT_FRAGMENT_TIMEOUT_SECS))
        .filter(|&secs| secs > 0);
    let attach_timeout_secs = raw
        .attach_timeout_secs
        .or(Some(DEFAULT_ATTACH_TIMEOUT_SECS))
        .filter(|&secs| secs > 0);

    let footer_label = raw
        .footer_label
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| model.clone());

    Ok(CompletionConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        api_key,
        model,
        temperature,
        timeout_ms,
        fragment_timeout_secs,
        attach_timeout_secs,
        footer_label,
    })
}

fn build_markers(raw: Option<raw::RawMarkers>) -> Result<Markers, ConfigError> {
    let (open, close) = match raw {
        Some(m) => (
            m.open.unwrap_or_else(|| DEFAULT_OPEN_MARKER.to_string()),
            m.close.unwrap_or_else(|| DEFAULT_CLOSE_MARKER.to_string()),
        ),
        None => (DEFAULT_OPEN_MARKER.to_string(), DEFAULT_CLOSE_MARKER.to_string()),
    };

    if open.is_empty() || close.is_empty() {
        return Err(ConfigError::Validation("markers must not be empty".into()));
    }
    if open == close {
        return Err(ConfigError::Validation(format!(
            "open and close markers must differ, both are \"{open}\""
        )));
    }

    Ok(Markers::new(open, close))
}

fn build_prompt_config(raw: Option<raw::RawPromptConfig>) -> Result<PromptConfig, ConfigError> {
    let mut templates = default_prompt_templates()?;
    let Some(raw) = raw else {
        return Ok(PromptConfig {
            max_tokens: DEFAULT_MAX_PROMPT_TOKENS,
            tokenizer_path: None,
            templates,
        });
    };

    let max_tokens = raw.max_tokens.unwrap_or(DEFAULT_MAX_PROMPT_TOKENS);
    if max_tokens == 0 {
        return Err(ConfigError::Validation("prompt max_tokens must be > 0".into()));
    }

    if let Some(system) = raw.system {
        templates.system = system;
    }
    if let Some(text) = raw.reddit_instructions {
        templates.reddit_instructions = text;
    }
    if let Some(text) = raw.page_instructions {
        templates.page_instructions = text;
    }
    if let Some(text) = raw.question_instructions {
        if !text.contains("{question}") {
            return Err(ConfigError::Validation(
                "prompt question_instructions must contain a {question} placeholder".into(),
            ));
        }
        templates.question_instructions = text;
    }

    let tokenizer_path = resolve_optional(raw.tokenizer_path)?.map(PathBuf::from);

    Ok(PromptConfig {
        max_tokens,
        tokenizer_path,
        templates,
    })
}

fn build_sources_config(raw: Option<raw::RawSourcesConfig>) -> Result<SourcesConfig, ConfigError> {
    let reddit = raw.and_then(|s| s.reddit);

    let (api_base, user_agent, max_comment_depth, comment_limit) = match reddit {
        Some(r) => (
            resolve_optional(r.api_base)?,
            r.user_agent,
            r.max_comment_depth,
            r.comment_limit,
        ),
        None => (None, None, None, None),
    };

    let comment_limit = comment_limit.unwrap_or(DEFAULT_COMMENT_LIMIT);
    if comment_limit == 0 {
        return Err(ConfigError::Validation("reddit comment_limit must be > 0".into()));
    }

    Ok(SourcesConfig {
        reddit: RedditConfig {
            api_base: api_base
                .unwrap_or_else(|| DEFAULT_REDDIT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            user_agent: user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_comment_depth: max_comment_depth.unwrap_or(DEFAULT_MAX_COMMENT_DEPTH),
            comment_limit,
        },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
