//! Test support module providing a scripted transport and realistic sessions.
//!
//! `ScriptedTransport` replays fixed byte chunks instead of talking to a
//! backend, so the run controller can be exercised end to end, including
//! mid-record chunk splits, broken connections and stalled streams.

use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tradestream_models::trade_request::TradeRequest;

use crate::error::StreamError;
use crate::transport::{ChunkStream, Transport};

/// A transport that replays a canned response body.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    chunks: Vec<Vec<u8>>,
    trailing_error: Option<String>,
    refuse_status: Option<u16>,
    hang: bool,
    requests: Mutex<Vec<TradeRequest>>,
}

impl ScriptedTransport {
    pub fn from_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            ..Self::default()
        }
    }

    /// One chunk holding every record as NDJSON.
    pub fn from_records(records: &[Value]) -> Self {
        Self::from_chunks(vec![ndjson(records).into_bytes()])
    }

    /// NDJSON body cut into chunks of `size` bytes, ignoring record boundaries.
    pub fn from_records_chunked(records: &[Value], size: usize) -> Self {
        Self::from_chunks(split_every(ndjson(records).as_bytes(), size))
    }

    /// Fail with a transport error after the scripted chunks.
    pub fn then_error(mut self, message: &str) -> Self {
        self.trailing_error = Some(message.to_string());
        self
    }

    /// Keep the connection open forever after the scripted chunks.
    pub fn then_hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Refuse to open, as a backend answering with a non-success status.
    pub fn refusing(status: u16) -> Self {
        Self {
            refuse_status: Some(status),
            ..Self::default()
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<TradeRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, request: &TradeRequest) -> Result<ChunkStream, StreamError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(status) = self.refuse_status {
            return Err(StreamError::Status(status));
        }

        let body = stream::iter(self.chunks.clone().into_iter().map(Ok));
        let error = stream::iter(
            self.trailing_error
                .clone()
                .map(|message| Err(StreamError::Transport(message))),
        );
        let scripted = body.chain(error);

        if self.hang {
            Ok(scripted.chain(stream::pending()).boxed())
        } else {
            Ok(scripted.boxed())
        }
    }
}

/// Serialize records as newline-terminated JSON lines.
pub fn ndjson(records: &[Value]) -> String {
    records.iter().map(|r| format!("{r}\n")).collect()
}

/// Cut bytes into fixed-size pieces; the last piece may be shorter.
pub fn split_every(bytes: &[u8], size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(size.max(1)).map(<[u8]>::to_vec).collect()
}

/// Cut bytes at the given offsets (sorted, deduplicated, clamped to the length).
pub fn split_at_offsets(bytes: &[u8], offsets: &[usize]) -> Vec<Vec<u8>> {
    let mut cuts: Vec<usize> = offsets
        .iter()
        .map(|o| (*o).min(bytes.len()))
        .collect();
    cuts.sort_unstable();
    cuts.dedup();

    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut start = 0;
    for cut in cuts {
        pieces.push(bytes[start..cut].to_vec());
        start = cut;
    }
    pieces.push(bytes[start..].to_vec());
    pieces
}

/// A full backend session for `ticker`, shaped like the real pipeline's output.
pub fn sample_session(ticker: &str) -> Vec<Value> {
    vec![
        json!({"type": "update", "node": "Market Analyst", "data": {
            "messages": [{"content": "calling tools", "type": "ai"}],
            "market_report": format!("## {ticker} technicals\nRSI 48, above the 50-day SMA.")
        }}),
        json!({"type": "update", "node": "market_tools", "data": {"messages": []}}),
        json!({"type": "rate_limit",
            "message": "⏱️ Rate limiting: Waiting 4.0s (Request #5)",
            "sleep_time": 4.0, "request_number": 5}),
        json!({"type": "update", "node": "Social Analyst", "data": {
            "sentiment_report": {"content": "Retail sentiment mildly bullish.", "type": "ai"}
        }}),
        json!({"type": "update", "node": "News Analyst", "data": {"news_report": "No material news."}}),
        json!({"type": "update", "node": "Fundamentals Analyst", "data": {
            "fundamentals_report": "P/E 28, margins expanding."
        }}),
        json!({"type": "update", "node": "Bull Researcher", "data": {"investment_debate_state": {
            "bull_history": "Bull: momentum", "bear_history": "",
            "history": "Bull: momentum", "current_response": "Bull: momentum",
            "judge_decision": "", "count": 1
        }}}),
        json!({"type": "update", "node": "Bear Researcher", "data": {"investment_debate_state": {
            "bull_history": "Bull: momentum", "bear_history": "Bear: valuation",
            "history": "Bull: momentum\nBear: valuation", "current_response": "Bear: valuation",
            "judge_decision": "", "count": 2
        }}}),
        json!({"type": "update", "node": "Research Manager", "data": {
            "investment_plan": "Accumulate on dips."
        }}),
        json!({"type": "update", "node": "Trader", "data": {
            "trader_investment_plan": "BUY 50 shares, stop at -6%."
        }}),
        json!({"type": "update", "node": "Risky Analyst", "data": {"risk_debate_state": {
            "history": "Risky: size up", "latest_speaker": "Risky", "count": 1
        }}}),
        json!({"type": "update", "node": "Risk Judge", "data": {
            "final_trade_decision": "FINAL TRANSACTION PROPOSAL: **BUY**",
            "risk_debate_state": {
                "history": "Risky: size up\nSafe: trim\nNeutral: hold size",
                "judge_decision": "BUY", "count": 3
            }
        }}),
        json!({"type": "complete"}),
    ]
}
