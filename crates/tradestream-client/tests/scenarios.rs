//! End-to-end runs of the controller over scripted transports.
//!
//! Each test scripts the body a backend would stream, runs it through
//! `RunController::run`, and checks the final result, log lines and state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tradestream_client::test_support::{
    ndjson, sample_session, split_at_offsets, ScriptedTransport,
};
use tradestream_client::{ChunkStream, RunController, StreamError, Transport};
use tradestream_models::config::StreamSettings;
use tradestream_models::run::{LogLevel, RunState};
use tradestream_models::trade_request::{ApiKeys, TradeRequest};
use tradestream_models::RunSnapshot;

fn request(ticker: &str) -> TradeRequest {
    let mut keys = ApiKeys::new();
    keys.insert(ApiKeys::OPENAI, "sk-test");
    keys.insert(ApiKeys::TAVILY, "tvly-test");
    keys.insert(ApiKeys::FINNHUB, "fh-test");
    TradeRequest::new(ticker, keys)
}

fn controller(transport: impl Transport + 'static) -> RunController {
    RunController::new(Arc::new(transport), StreamSettings::default())
}

/// Hands out scripted transports in order, one per opened run.
struct Sequenced {
    scripts: Mutex<VecDeque<ScriptedTransport>>,
}

impl Sequenced {
    fn new(scripts: Vec<ScriptedTransport>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
        }
    }
}

#[async_trait]
impl Transport for Sequenced {
    async fn open(&self, request: &TradeRequest) -> Result<ChunkStream, StreamError> {
        let next = self.scripts.lock().unwrap().pop_front();
        match next {
            Some(script) => script.open(request).await,
            None => Err(StreamError::Transport("no script left".to_string())),
        }
    }
}

async fn wait_for(
    rx: &mut tokio::sync::watch::Receiver<Arc<RunSnapshot>>,
    pred: impl Fn(&RunSnapshot) -> bool,
) -> Arc<RunSnapshot> {
    loop {
        {
            let current = rx.borrow_and_update();
            if pred(&current) {
                return Arc::clone(&current);
            }
        }
        rx.changed().await.unwrap();
    }
}

// ============================================================
// Reference scenario: update, rate limit, debate, complete
// ============================================================

#[tokio::test]
async fn reference_scenario() {
    let body = concat!(
        r#"{"type":"update","node":"market","data":{"market_report":"Buy AAPL"}}"#,
        "\n",
        r#"{"type":"rate_limit","sleep_time":5}"#,
        "\n",
        r#"{"type":"update","node":"risk","data":{"risk_debate_state":{"history":"A vs B"}}}"#,
        "\n",
        r#"{"type":"complete"}"#,
        "\n",
    );
    let controller = controller(ScriptedTransport::from_chunks(vec![body.as_bytes().to_vec()]));

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Completed);
    assert_eq!(
        serde_json::to_value(&snapshot.result).unwrap(),
        json!({"market_report": "Buy AAPL", "risk_debate": "A vs B"})
    );
    assert_eq!(
        snapshot.log_texts(),
        vec![
            "Agent finished: market",
            "Waiting 5s",
            "Agent finished: risk",
            "Analysis complete."
        ]
    );
    assert_eq!(snapshot.logs[1].level, LogLevel::RateLimit);
    assert_eq!(snapshot.logs[3].level, LogLevel::Success);

    // readers see the same final snapshot
    assert_eq!(controller.state(), RunState::Completed);
    assert_eq!(controller.result(), snapshot.result);
    assert_eq!(controller.logs().len(), 4);
}

#[tokio::test]
async fn reference_scenario_split_mid_record() {
    let records = vec![
        json!({"type":"update","node":"market","data":{"market_report":"Buy AAPL"}}),
        json!({"type":"rate_limit","sleep_time":5}),
        json!({"type":"update","node":"risk","data":{"risk_debate_state":{"history":"A vs B"}}}),
        json!({"type":"complete"}),
    ];
    let body = ndjson(&records);
    let chunks = split_at_offsets(body.as_bytes(), &[3, 40, 41, 90, 91, 92, 130]);
    let controller = controller(ScriptedTransport::from_chunks(chunks));

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Completed);
    assert_eq!(snapshot.result.market_report.as_deref(), Some("Buy AAPL"));
    assert_eq!(snapshot.logs.len(), 4);
}

// ============================================================
// Full pipeline session, tiny chunks
// ============================================================

#[tokio::test]
async fn full_session_in_seven_byte_chunks() {
    let transport = Arc::new(ScriptedTransport::from_records_chunked(
        &sample_session("NVDA"),
        7,
    ));
    let controller = RunController::new(transport.clone(), StreamSettings::default());

    let snapshot = controller.run(request("nvda")).await;

    assert_eq!(snapshot.state, RunState::Completed);
    assert_eq!(snapshot.ticker, "NVDA");
    assert_eq!(snapshot.result.filled(), 9);
    assert_eq!(
        snapshot.result.sentiment_report.as_deref(),
        Some("Retail sentiment mildly bullish.")
    );
    assert_eq!(
        snapshot.result.final_decision.as_deref(),
        Some("FINAL TRANSACTION PROPOSAL: **BUY**")
    );
    assert_eq!(
        snapshot.result.investment_debate.as_ref().unwrap().turns(),
        vec!["Bull: momentum", "Bear: valuation"]
    );
    assert_eq!(
        snapshot.result.risk_debate.as_ref().unwrap().turns(),
        vec!["Risky: size up", "Safe: trim", "Neutral: hold size"]
    );

    let texts = snapshot.log_texts();
    assert_eq!(texts.len(), 13);
    assert_eq!(texts[2], "⏱️ Rate limiting: Waiting 4.0s (Request #5)");
    assert_eq!(texts[11], "Agent finished: Risk Judge");
    assert_eq!(snapshot.logs[11].level, LogLevel::Success);
    assert_eq!(texts[12], "Analysis complete.");

    let sent = transport.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ticker, "NVDA");
}

// ============================================================
// Error paths
// ============================================================

#[tokio::test]
async fn malformed_line_is_logged_in_order() {
    let body = concat!(
        r#"{"type":"update","node":"News Analyst","data":{"news_report":"n"}}"#,
        "\n",
        r#"{"type":"update","node":"#,
        "\n",
        r#"{"type":"update","node":"Trader","data":{"trader_investment_plan":"t"}}"#,
        "\n",
        r#"{"type":"complete"}"#,
        "\n",
    );
    let controller = controller(ScriptedTransport::from_chunks(vec![body.as_bytes().to_vec()]));

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Completed);
    let texts = snapshot.log_texts();
    assert_eq!(texts.len(), 4);
    assert_eq!(texts[0], "Agent finished: News Analyst");
    assert!(texts[1].starts_with("Skipped malformed record"));
    assert_eq!(snapshot.logs[1].level, LogLevel::Error);
    assert_eq!(texts[2], "Agent finished: Trader");
    assert_eq!(texts[3], "Analysis complete.");
    assert_eq!(snapshot.result.news_report.as_deref(), Some("n"));
    assert_eq!(snapshot.result.trader_plan.as_deref(), Some("t"));
}

#[tokio::test]
async fn server_error_fails_run_with_message() {
    let controller = controller(ScriptedTransport::from_records(&[
        json!({"type": "update", "node": "Market Analyst", "data": {"market_report": "r"}}),
        json!({"type": "error", "error": "TAVILY_API_KEY is required"}),
    ]));

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Failed);
    assert_eq!(
        snapshot.log_texts(),
        vec![
            "Agent finished: Market Analyst",
            "Error: TAVILY_API_KEY is required"
        ]
    );
    assert_eq!(snapshot.result.market_report.as_deref(), Some("r"));
}

#[tokio::test]
async fn structured_server_error_fails_run() {
    let controller = controller(ScriptedTransport::from_records(&[
        json!({"type": "update", "node": "market", "data": {"market_report": "Buy"}}),
        json!({"type": "error", "error": {"detail": "quota exceeded"}}),
    ]));

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Failed);
    assert_eq!(
        snapshot.log_texts(),
        vec![
            "Agent finished: market",
            r#"Error: {"detail":"quota exceeded"}"#
        ]
    );
    assert_eq!(snapshot.logs[1].level, LogLevel::Error);
}

#[tokio::test]
async fn badly_typed_fields_keep_their_records() {
    let controller = controller(ScriptedTransport::from_records(&[
        json!({"type": "update", "node": 7, "data": {"market_report": "Buy"}}),
        json!({"type": "rate_limit", "sleep_time": "5"}),
        json!({"type": "complete"}),
    ]));

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Completed);
    assert_eq!(snapshot.result.market_report.as_deref(), Some("Buy"));
    assert_eq!(
        snapshot.log_texts(),
        vec![
            "Agent finished: unknown",
            "Rate limited by backend",
            "Analysis complete."
        ]
    );
    assert_eq!(snapshot.logs[1].level, LogLevel::RateLimit);
}

#[tokio::test]
async fn refused_request_fails_immediately() {
    let controller = controller(ScriptedTransport::refusing(400));

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Failed);
    assert_eq!(snapshot.log_texts(), vec!["Failed to start trade analysis."]);
    assert!(snapshot.result.is_empty());
}

#[tokio::test]
async fn connection_drop_mid_stream_keeps_partial_result() {
    let body = ndjson(&[json!({"type": "update", "node": "Market Analyst", "data": {"market_report": "r"}})]);
    let controller = controller(
        ScriptedTransport::from_chunks(vec![body.into_bytes(), b"{\"type\":\"upd".to_vec()])
            .then_error("connection reset by peer"),
    );

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Failed);
    assert_eq!(snapshot.result.market_report.as_deref(), Some("r"));
    let last = snapshot.logs.last().unwrap();
    assert_eq!(
        last.text,
        "Stream interrupted: Transport error: connection reset by peer"
    );
}

// ============================================================
// Lifecycle
// ============================================================

#[tokio::test]
async fn records_after_complete_are_ignored() {
    let controller = controller(ScriptedTransport::from_records(&[
        json!({"type": "update", "node": "Trader", "data": {"trader_investment_plan": "first"}}),
        json!({"type": "complete"}),
        json!({"type": "update", "node": "Trader", "data": {"trader_investment_plan": "late"}}),
        json!({"type": "error", "error": "late"}),
    ]));

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Completed);
    assert_eq!(snapshot.result.trader_plan.as_deref(), Some("first"));
    assert_eq!(snapshot.logs.len(), 2);
}

#[tokio::test]
async fn transport_end_without_terminal_completes_by_default() {
    let controller = controller(ScriptedTransport::from_records(&[
        json!({"type": "update", "node": "Trader", "data": {"trader_investment_plan": "t"}}),
    ]));

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Completed);
    assert_eq!(
        snapshot.log_texts(),
        vec!["Agent finished: Trader", "Analysis complete."]
    );
}

#[tokio::test]
async fn transport_end_without_terminal_can_fail() {
    let settings = StreamSettings {
        implicit_completion: false,
        idle_timeout_seconds: None,
    };
    let controller = RunController::new(
        Arc::new(ScriptedTransport::from_records(&[json!({"type": "rate_limit", "sleep_time": 1})])),
        settings,
    );

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Failed);
    assert_eq!(snapshot.logs.last().unwrap().level, LogLevel::Error);
}

#[tokio::test(start_paused = true)]
async fn stalled_stream_fails_after_idle_timeout() {
    let settings = StreamSettings {
        implicit_completion: true,
        idle_timeout_seconds: Some(30),
    };
    let controller = RunController::new(
        Arc::new(
            ScriptedTransport::from_records(&[
                json!({"type": "update", "node": "Market Analyst", "data": {"market_report": "r"}}),
            ])
            .then_hang(),
        ),
        settings,
    );

    let snapshot = controller.run(request("AAPL")).await;

    assert_eq!(snapshot.state, RunState::Failed);
    assert_eq!(
        snapshot.logs.last().unwrap().text,
        "Stream interrupted: No record received for 30 seconds"
    );
    assert_eq!(snapshot.result.market_report.as_deref(), Some("r"));
}

#[tokio::test]
async fn cancel_ends_hanging_run() {
    let controller = Arc::new(controller(
        ScriptedTransport::from_records(&[
            json!({"type": "update", "node": "Market Analyst", "data": {"market_report": "r"}}),
        ])
        .then_hang(),
    ));
    let mut rx = controller.subscribe();

    let runner = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run(request("AAPL")).await })
    };

    wait_for(&mut rx, |s| s.logs.len() == 1).await;
    assert_eq!(controller.state(), RunState::Streaming);
    assert!(controller.cancel());

    let snapshot = runner.await.unwrap();
    assert_eq!(snapshot.state, RunState::Failed);
    assert_eq!(
        snapshot.log_texts(),
        vec!["Agent finished: Market Analyst", "Run cancelled."]
    );
    assert_eq!(controller.state(), RunState::Failed);
    assert!(!controller.cancel());
}

#[tokio::test]
async fn new_run_supersedes_the_one_in_flight() {
    let first = ScriptedTransport::from_records(&[
        json!({"type": "update", "node": "Market Analyst", "data": {"market_report": "stale"}}),
    ])
    .then_hang();
    let second = ScriptedTransport::from_records(&[
        json!({"type": "update", "node": "News Analyst", "data": {"news_report": "fresh"}}),
        json!({"type": "complete"}),
    ]);
    let controller = Arc::new(controller(Sequenced::new(vec![first, second])));
    let mut rx = controller.subscribe();

    let first_run = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run(request("AAPL")).await })
    };
    wait_for(&mut rx, |s| s.logs.len() == 1).await;

    let second_snapshot = controller.run(request("MSFT")).await;
    let first_snapshot = first_run.await.unwrap();

    assert_eq!(first_snapshot.state, RunState::Failed);
    assert_eq!(first_snapshot.logs.last().unwrap().text, "Run cancelled.");

    assert_eq!(second_snapshot.state, RunState::Completed);
    assert!(second_snapshot.result.market_report.is_none());
    assert_eq!(second_snapshot.result.news_report.as_deref(), Some("fresh"));

    // the published snapshot belongs to the latest run only
    let published = controller.snapshot();
    assert_eq!(published.run_id, second_snapshot.run_id);
    assert_eq!(published.ticker, "MSFT");
    assert_eq!(published.state, RunState::Completed);
}

#[tokio::test]
async fn published_logs_only_grow() {
    let controller = Arc::new(controller(ScriptedTransport::from_records_chunked(
        &sample_session("AAPL"),
        64,
    )));
    let mut rx = controller.subscribe();

    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let snapshot = Arc::clone(&rx.borrow_and_update());
            seen.push(snapshot.logs.len());
            if snapshot.state.is_terminal() {
                break;
            }
        }
        seen
    });

    let final_snapshot = controller.run(request("AAPL")).await;
    let seen = tokio::time::timeout(Duration::from_secs(5), observer)
        .await
        .unwrap()
        .unwrap();

    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last().copied(), Some(final_snapshot.logs.len()));
}
