// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

// Segmenter types: channels, markers and output events.

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// Which part of the answer a run of text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Final answer text shown to the reader.
    Visible,
    /// Model deliberation between the open and close markers.
    Reasoning,
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

pub const DEFAULT_OPEN_MARKER: &str = "<think>";
pub const DEFAULT_CLOSE_MARKER: &str = "</think>";

/// The literal strings that open and close the reasoning region.
///
/// Both must be non-empty and distinct; the config loader enforces this
/// before a `Markers` value is built from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub open: String,
    pub close: String,
}

impl Markers {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new(DEFAULT_OPEN_MARKER, DEFAULT_CLOSE_MARKER)
    }
}

// ---------------------------------------------------------------------------
// Output events
// ---------------------------------------------------------------------------

/// One unit of segmented output, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The reasoning region has begun.
    RegionStart,
    /// A non-empty run of text attributed to one channel.
    Text { channel: Channel, content: String },
    /// The reasoning region has ended (or was force-closed at end of stream).
    RegionEnd,
    /// Terminal event naming the engine that produced the answer.
    Footer { label: String },
}

impl OutputEvent {
    pub fn visible(content: impl Into<String>) -> Self {
        OutputEvent::Text {
            channel: Channel::Visible,
            content: content.into(),
        }
    }

    pub fn reasoning(content: impl Into<String>) -> Self {
        OutputEvent::Text {
            channel: Channel::Reasoning,
            content: content.into(),
        }
    }

    pub fn is_footer(&self) -> bool {
        matches!(self, OutputEvent::Footer { .. })
    }
}
