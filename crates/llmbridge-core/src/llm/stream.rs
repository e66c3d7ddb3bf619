//! Server-sent event decoding for streaming completions

use crate::error::{BridgeError, Result};
use futures::stream::{self, BoxStream, Stream, StreamExt};

/// Text deltas from a streaming completion, in arrival order
pub type TextStream = BoxStream<'static, Result<String>>;

/// Splits a byte stream into lines and keeps the `data:` payloads.
///
/// Lines may be cut anywhere between chunks, including inside a UTF-8
/// sequence, so bytes are buffered until a newline arrives.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }
        payloads
    }
}

/// Decode an SSE body into text deltas.
///
/// `extract` maps one `data:` payload to a delta; `Ok(None)` skips
/// payloads that carry no text (keep-alives, role headers, `[DONE]`).
pub(crate) fn sse_text_stream<S, B, E, F>(body: S, mut extract: F) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Into<BridgeError>,
    F: FnMut(&str) -> Result<Option<String>> + Send + 'static,
{
    let mut decoder = SseDecoder::default();

    body.flat_map(move |chunk| {
        let items: Vec<Result<String>> = match chunk {
            Ok(bytes) => decoder
                .push(bytes.as_ref())
                .iter()
                .filter_map(|data| extract(data).transpose())
                .collect(),
            Err(e) => vec![Err(e.into())],
        };
        stream::iter(items)
    })
    .boxed()
}
