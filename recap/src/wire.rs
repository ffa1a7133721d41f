// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

// SSE wire encoding for segmented output.
//
// Every output event becomes exactly one SSE event (`data:` lines followed by
// a blank line). Model text is escaped so it never contains a raw line break;
// the footer is server-authored and written as literal `data:` lines.

use bytes::Bytes;

use crate::segment::{Channel, OutputEvent};

/// Payload announcing the start of the reasoning region.
pub const THINKING_START: &str = "__THINKING_START__";
/// Prefix on every reasoning text payload.
pub const THINKING_CONTENT: &str = "__THINKING_CONTENT__";
/// Payload announcing the end of the reasoning region.
pub const THINKING_END: &str = "__THINKING_END__";

/// Separator line in the footer block.
pub const FOOTER_SEPARATOR: &str = "---";

/// Content type of the rendered stream.
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Render one event as a complete SSE event.
pub fn render(event: &OutputEvent) -> Bytes {
    match event {
        OutputEvent::RegionStart => frame(THINKING_START),
        OutputEvent::RegionEnd => frame(THINKING_END),
        OutputEvent::Text {
            channel: Channel::Visible,
            content,
        } => frame(&escape(content)),
        OutputEvent::Text {
            channel: Channel::Reasoning,
            content,
        } => frame(&format!("{THINKING_CONTENT}{}", escape(content))),
        OutputEvent::Footer { label } => {
            let label = label.replace(['\r', '\n'], " ");
            Bytes::from(format!(
                "data: \ndata: {FOOTER_SEPARATOR}\ndata: # Powered by {label}\n\n"
            ))
        }
    }
}

fn frame(payload: &str) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}

/// Escape text so it fits on a single SSE `data:` line.
///
/// `\` becomes `\\`, LF becomes `\n` and CR becomes `\r`, which keeps the
/// mapping reversible by [`unescape`].
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape`]. Unknown escapes are kept verbatim.
pub fn unescape(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len());
    let mut chars = payload.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
