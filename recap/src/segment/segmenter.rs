// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

// Marker segmenter
//
// Consumes completion fragments one at a time and produces typed output
// events. A fragment boundary may land anywhere, including inside a marker,
// so the tail of each fragment that could still grow into the next expected
// marker is carried over to the next call instead of being emitted.

use super::types::{Channel, Markers, OutputEvent};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the job is in its single pass through the reasoning region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No open marker seen yet.
    Visible,
    /// Open marker seen, close marker not yet.
    Reasoning,
    /// Region closed. Markers are plain text from here on.
    Answered,
}

impl Phase {
    fn channel(self) -> Channel {
        match self {
            Phase::Reasoning => Channel::Reasoning,
            Phase::Visible | Phase::Answered => Channel::Visible,
        }
    }
}

/// The marker that would move the job to its next phase, if any.
fn pending_marker(markers: &Markers, phase: Phase) -> Option<&str> {
    match phase {
        Phase::Visible => Some(markers.open.as_str()),
        Phase::Reasoning => Some(markers.close.as_str()),
        Phase::Answered => None,
    }
}

// ---------------------------------------------------------------------------
// MarkerSegmenter
// ---------------------------------------------------------------------------

/// Incremental splitter of a completion stream into visible and reasoning
/// text.
///
/// Call [`advance`](Self::advance) for every fragment in delivery order, then
/// [`finalize`](Self::finalize) once. `finalize` takes the segmenter by value,
/// so a job cannot be finalized twice or advanced after its footer.
#[derive(Debug)]
pub struct MarkerSegmenter {
    markers: Markers,
    phase: Phase,
    /// Unresolved tail that may be the start of a marker.
    carry: String,
    footer_label: String,
}

impl MarkerSegmenter {
    pub fn new(markers: Markers, footer_label: impl Into<String>) -> Self {
        Self {
            markers,
            phase: Phase::Visible,
            carry: String::new(),
            footer_label: footer_label.into(),
        }
    }

    /// Channel that text arriving now would be attributed to.
    pub fn channel(&self) -> Channel {
        self.phase.channel()
    }

    /// Bytes currently held back as a possible partial marker.
    pub fn carried_len(&self) -> usize {
        self.carry.len()
    }

    /// Feed one fragment, returning the events it resolves.
    pub fn advance(&mut self, fragment: &str) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        if fragment.is_empty() {
            return events;
        }
        self.carry.push_str(fragment);

        loop {
            let Some(marker) = pending_marker(&self.markers, self.phase) else {
                break;
            };
            let Some(pos) = self.carry.find(marker) else {
                break;
            };
            let end = pos + marker.len();

            let rest = self.carry.split_off(end);
            self.carry.truncate(pos);
            let before = std::mem::replace(&mut self.carry, rest);
            push_text(&mut events, self.phase.channel(), before);
            self.transition(&mut events);
        }

        let keep = pending_marker(&self.markers, self.phase)
            .map(|marker| partial_marker_len(&self.carry, marker))
            .unwrap_or(0);
        let tail = self.carry.split_off(self.carry.len() - keep);
        let resolved = std::mem::replace(&mut self.carry, tail);
        push_text(&mut events, self.phase.channel(), resolved);

        events
    }

    /// Flush the carry-over, close an unterminated region and emit the footer.
    pub fn finalize(mut self) -> Vec<OutputEvent> {
        let mut events = Vec::with_capacity(3);
        let rest = std::mem::take(&mut self.carry);
        push_text(&mut events, self.phase.channel(), rest);

        if self.phase == Phase::Reasoning {
            tracing::debug!("reasoning region never closed; closing at end of stream");
            events.push(OutputEvent::RegionEnd);
        }

        events.push(OutputEvent::Footer {
            label: self.footer_label,
        });
        events
    }

    fn transition(&mut self, events: &mut Vec<OutputEvent>) {
        match self.phase {
            Phase::Visible => {
                events.push(OutputEvent::RegionStart);
                self.phase = Phase::Reasoning;
            }
            Phase::Reasoning => {
                events.push(OutputEvent::RegionEnd);
                self.phase = Phase::Answered;
            }
            Phase::Answered => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn push_text(events: &mut Vec<OutputEvent>, channel: Channel, content: String) {
    if !content.is_empty() {
        events.push(OutputEvent::Text { channel, content });
    }
}

/// Length of the longest suffix of `buf` that is a proper prefix of `marker`.
///
/// Only prefixes ending on a char boundary of `marker` are considered, so the
/// split point in `buf` is always a char boundary too.
fn partial_marker_len(buf: &str, marker: &str) -> usize {
    let longest = marker.len().saturating_sub(1).min(buf.len());
    (1..=longest)
        .rev()
        .find(|&k| marker.is_char_boundary(k) && buf.ends_with(&marker[..k]))
        .unwrap_or(0)
}

#[cfg(test)]
mod helper_tests {
    use super::partial_marker_len;

    #[test]
    fn partial_marker_len_finds_longest_prefix() {
        assert_eq!(partial_marker_len("hello <th", "<think>"), 3);
        assert_eq!(partial_marker_len("hello <", "<think>"), 1);
        assert_eq!(partial_marker_len("hello", "<think>"), 0);
        assert_eq!(partial_marker_len("", "<think>"), 0);
    }

    #[test]
    fn partial_marker_len_never_holds_full_marker() {
        assert_eq!(partial_marker_len("<think>", "<think>"), 0);
        assert_eq!(partial_marker_len("x<think", "<think>"), 6);
    }

    #[test]
    fn partial_marker_len_respects_char_boundaries() {
        // "«" is two bytes; a buffer ending in its first byte cannot exist,
        // but a buffer ending in the whole char must match.
        assert_eq!(partial_marker_len("abc«", "«x»"), "«".len());
        assert_eq!(partial_marker_len("abc", "«x»"), 0);
    }
}
