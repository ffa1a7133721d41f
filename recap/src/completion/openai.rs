// OpenAI-compatible streaming client
//
// POSTs to `{base_url}/chat/completions` with `stream: true` and decodes
// the SSE response into content fragments. Works against OpenAI and any
// server speaking the same API (Ollama, vLLM, llama.cpp).

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};

use crate::config::CompletionConfig;
use crate::prompt::Prompt;

use super::{CompletionError, CompletionSource, FragmentStream};

/// Bytes of an error response body kept for the error message.
const ERROR_BODY_LIMIT: usize = 512;

pub struct OpenAiCompletionSource {
    client: reqwest::Client,
    config: CompletionConfig,
}

impl OpenAiCompletionSource {
    pub fn new(client: reqwest::Client, config: CompletionConfig) -> Self {
        Self { client, config }
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": self.config.temperature,
            "stream": true,
        })
    }
}

#[async_trait::async_trait]
impl CompletionSource for OpenAiCompletionSource {
    async fn start(&self, prompt: &Prompt) -> Result<FragmentStream, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let mut req = self.client.post(&url).json(&self.request_body(prompt));
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        // Bounds connect + response headers only; the body streams for as
        // long as the model keeps producing.
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let resp = tokio::time::timeout(timeout, req.send())
            .await
            .map_err(|_| {
                CompletionError::Timeout(format!("no response from {url} within {timeout:?}"))
            })?
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(e.to_string())
                } else {
                    CompletionError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(model = %self.config.model, "completion stream opened");
        Ok(decode_stream(resp.bytes_stream()))
    }

    fn footer_label(&self) -> &str {
        &self.config.footer_label
    }
}

// ---------------------------------------------------------------------------
// SSE decoding
// ---------------------------------------------------------------------------

/// Meaning of one line of the completion SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// `choices[0].delta.content` of a chunk.
    Fragment(String),
    /// `data: [DONE]`.
    Done,
    /// A chunk carrying an `error` object.
    Error(String),
    /// Anything else: blank lines, comments, role-only deltas, finish chunks.
    Skip,
}

/// Decode one SSE line (without its line terminator).
pub fn decode_sse_line(line: &str) -> SseLine {
    let Some(rest) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = rest.strip_prefix(' ').unwrap_or(rest).trim_end();

    if data == "[DONE]" {
        return SseLine::Done;
    }

    let json: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("skipping undecodable completion line: {e}");
            return SseLine::Skip;
        }
    };

    if let Some(err) = json.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return SseLine::Error(message);
    }

    match json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
    {
        Some(content) if !content.is_empty() => SseLine::Fragment(content.to_string()),
        _ => SseLine::Skip,
    }
}

/// Longest SSE line accepted from the upstream before the stream is failed.
pub(crate) const MAX_LINE_BYTES: usize = 1 << 20;

struct DecodeState {
    input: Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>,
    /// Bytes of the current, not yet terminated line. Kept as bytes so a
    /// multi-byte char split across chunks is reassembled before decoding.
    line: Vec<u8>,
    /// Prefix of `line` already searched for a terminator.
    scanned: usize,
    eof: bool,
    done: bool,
}

/// Turn an SSE byte stream into content fragments.
pub(crate) fn decode_stream<E>(
    input: impl Stream<Item = Result<Bytes, E>> + Send + 'static,
) -> FragmentStream
where
    E: std::fmt::Display,
{
    let state = DecodeState {
        input: Box::pin(input.map(|r| r.map_err(|e| e.to_string()))),
        line: Vec::new(),
        scanned: 0,
        eof: false,
        done: false,
    };

    let stream = futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            if let Some(rel) = state.line[state.scanned..].iter().position(|&b| b == b'\n') {
                let pos = state.scanned + rel;
                let raw: Vec<u8> = state.line.drain(..=pos).collect();
                state.scanned = 0;
                let text = String::from_utf8_lossy(&raw);
                match decode_sse_line(text.trim_end_matches(['\n', '\r'])) {
                    SseLine::Fragment(fragment) => return Some((Ok(fragment), state)),
                    SseLine::Done => return None,
                    SseLine::Error(message) => {
                        state.done = true;
                        return Some((Err(CompletionError::Upstream(message)), state));
                    }
                    SseLine::Skip => continue,
                }
            }

            state.scanned = state.line.len();

            if state.eof {
                return None;
            }

            if state.line.len() > MAX_LINE_BYTES {
                state.done = true;
                let message = format!("sse line exceeds {MAX_LINE_BYTES} bytes");
                return Some((Err(CompletionError::Upstream(message)), state));
            }

            match state.input.next().await {
                Some(Ok(chunk)) => state.line.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(CompletionError::Transport(e)), state));
                }
                None => {
                    state.eof = true;
                    // Final line without a terminator.
                    if !state.line.is_empty() {
                        state.line.push(b'\n');
                    }
                }
            }
        }
    });

    Box::pin(stream)
}
