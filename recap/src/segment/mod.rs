// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

// Reasoning-marker segmentation of a completion stream.
//
// Responsibilities:
// - Split model output into visible and reasoning channels
// - Detect open/close markers even when split across fragments
// - Hold back at most one marker's worth of unresolved text
// - One transition into reasoning and one back out, per job
// - Always end with a balanced region and a footer

mod segmenter;
mod types;

pub use segmenter::MarkerSegmenter;
pub use types::{Channel, Markers, OutputEvent, DEFAULT_CLOSE_MARKER, DEFAULT_OPEN_MARKER};
