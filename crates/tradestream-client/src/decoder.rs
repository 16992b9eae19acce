use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;

use crate::error::StreamError;

/// Longest prefix of a malformed record echoed back in diagnostics.
const PREVIEW_CHARS: usize = 80;

/// Splits a chunked byte stream into newline-delimited records.
///
/// The trailing partial line of every chunk is held back until the next chunk
/// (or `finish`) completes it, so records and multi-byte characters may straddle
/// chunk boundaries. Blank lines are dropped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every record it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let Some(last_newline) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(|b| *b == b'\n')
            .filter_map(non_blank)
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// Flush whatever is left once the transport has ended.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let rest = std::mem::take(&mut self.pending);
        non_blank(&rest).map(<[u8]>::to_vec)
    }

    /// Bytes buffered while waiting for the rest of a record.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Trim surrounding ASCII whitespace (including `\r`); `None` when nothing remains.
fn non_blank(segment: &[u8]) -> Option<&[u8]> {
    let start = segment.iter().position(|b| !b.is_ascii_whitespace())?;
    let end = segment.iter().rposition(|b| !b.is_ascii_whitespace())?;
    Some(&segment[start..=end])
}

/// Parse one framed record as JSON.
pub fn parse_frame(frame: &[u8]) -> Result<Value, StreamError> {
    serde_json::from_slice(frame).map_err(|e| StreamError::Decode {
        preview: preview(frame),
        reason: e.to_string(),
    })
}

fn preview(frame: &[u8]) -> String {
    let text = String::from_utf8_lossy(frame);
    if text.chars().count() <= PREVIEW_CHARS {
        return text.into_owned();
    }
    let mut cut: String = text.chars().take(PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

struct DecodeState<S> {
    chunks: S,
    decoder: FrameDecoder,
    ready: VecDeque<Vec<u8>>,
    finished: bool,
}

/// Lazily turn a stream of byte chunks into a stream of parsed JSON records.
///
/// A record that fails to parse yields a recoverable `StreamError::Decode` and
/// decoding carries on with the next record. A transport error is yielded once
/// and ends the stream.
pub fn decode_stream<S, B, E>(chunks: S) -> impl Stream<Item = Result<Value, StreamError>>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<StreamError>,
{
    let state = DecodeState {
        chunks,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.ready.pop_front() {
                let parsed = parse_frame(&frame);
                return Some((parsed, st));
            }
            if st.finished {
                return None;
            }
            match st.chunks.next().await {
                Some(Ok(chunk)) => {
                    let frames = st.decoder.push(chunk.as_ref());
                    st.ready.extend(frames);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.finished = true;
                    st.ready.extend(st.decoder.finish());
                }
            }
        }
    })
}
