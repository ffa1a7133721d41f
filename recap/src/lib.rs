// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

pub mod completion;
pub mod config;
pub mod coordinator;
pub mod prompt;
pub mod segment;
pub mod server;
pub mod source;
pub mod wire;
