use serde_json::Value;
use tracing::debug;
use tradestream_models::aggregate::{AggregateResult, DebateField, DebateHistory, ReportField};
use tradestream_models::event::UpdateEvent;

use crate::normalize::normalize_content;

/// Stream state key → report field. Values are normalized to text.
pub const REPORT_KEYS: [(&str, ReportField); 7] = [
    ("market_report", ReportField::MarketReport),
    ("sentiment_report", ReportField::SentimentReport),
    ("news_report", ReportField::NewsReport),
    ("fundamentals_report", ReportField::FundamentalsReport),
    ("investment_plan", ReportField::InvestmentPlan),
    ("trader_investment_plan", ReportField::TraderPlan),
    ("final_trade_decision", ReportField::FinalDecision),
];

/// Stream state key → debate field. Only the nested `history` is kept, verbatim.
pub const DEBATE_KEYS: [(&str, DebateField); 2] = [
    ("investment_debate_state", DebateField::InvestmentDebate),
    ("risk_debate_state", DebateField::RiskDebate),
];

/// Fold one update into the running result, returning the new result.
///
/// Every recognised key present in `update.data` overwrites its field; absent
/// keys (and explicit `null`s) leave the previous value in place.
pub fn apply_update(current: &AggregateResult, update: &UpdateEvent) -> AggregateResult {
    let mut next = current.clone();

    for (key, field) in REPORT_KEYS {
        match update.data.get(key) {
            None | Some(Value::Null) => {}
            Some(value) => next.set_report(field, normalize_content(Some(value))),
        }
    }

    for (key, field) in DEBATE_KEYS {
        let history = update
            .data
            .get(key)
            .and_then(|state| state.get("history"))
            .filter(|h| !h.is_null());
        if let Some(history) = history {
            next.set_debate(field, DebateHistory::new(history.clone()));
        }
    }

    debug!(
        node = %update.node,
        filled = next.filled(),
        "Applied update"
    );
    next
}
