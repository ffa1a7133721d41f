// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// Where the raw recap.yaml text comes from.
pub trait ConfigSource {
    fn load(&self) -> Result<String, ConfigError>;

    /// Human-readable origin for log lines.
    fn describe(&self) -> String;
}

/// A YAML file on disk.
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<String, ConfigError> {
        Ok(std::fs::read_to_string(&self.path)?)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// YAML held in memory. Tests build configs this way.
pub struct StringSource {
    pub content: String,
}

impl ConfigSource for StringSource {
    fn load(&self) -> Result<String, ConfigError> {
        Ok(self.content.clone())
    }

    fn describe(&self) -> String {
        "<inline>".to_string()
    }
}
