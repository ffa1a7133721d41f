// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

/// Everything that can go wrong between reading recap.yaml and holding a
/// validated [`Config`](super::Config).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("unsupported config version \"{0}\", expected \"v1\"")]
    UnsupportedVersion(String),

    #[error("invalid config: {0}")]
    Validation(String),

    #[error("undefined variable ${{{name}}} in config (not set in environment)")]
    UndefinedVariable { name: String },
}
