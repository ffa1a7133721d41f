// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

// Config loading
//
// Responsibilities:
// - Read recap.yaml from a pluggable source
// - Resolve ${VAR} references from the environment
// - Validate values and fill defaults
// - Hash the raw YAML for startup logging

mod defaults;
mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use defaults::default_prompt_templates;
pub use error::ConfigError;
pub use loader::{compute_hash, load_config};
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{
    CompletionConfig, Config, PromptConfig, PromptTemplates, RedditConfig, ServerConfig,
    SourcesConfig,
};
