use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text report fields of an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportField {
    MarketReport,
    SentimentReport,
    NewsReport,
    FundamentalsReport,
    InvestmentPlan,
    TraderPlan,
    FinalDecision,
}

impl ReportField {
    pub const ALL: [ReportField; 7] = [
        ReportField::MarketReport,
        ReportField::SentimentReport,
        ReportField::NewsReport,
        ReportField::FundamentalsReport,
        ReportField::InvestmentPlan,
        ReportField::TraderPlan,
        ReportField::FinalDecision,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportField::MarketReport => "market_report",
            ReportField::SentimentReport => "sentiment_report",
            ReportField::NewsReport => "news_report",
            ReportField::FundamentalsReport => "fundamentals_report",
            ReportField::InvestmentPlan => "investment_plan",
            ReportField::TraderPlan => "trader_plan",
            ReportField::FinalDecision => "final_decision",
        }
    }
}

/// Debate transcripts, stored structurally rather than as normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebateField {
    InvestmentDebate,
    RiskDebate,
}

impl DebateField {
    pub const ALL: [DebateField; 2] = [DebateField::InvestmentDebate, DebateField::RiskDebate];

    pub fn as_str(self) -> &'static str {
        match self {
            DebateField::InvestmentDebate => "investment_debate",
            DebateField::RiskDebate => "risk_debate",
        }
    }
}

/// The `history` of a debate stage, relocated verbatim from the stream.
///
/// The backend currently sends a newline-joined transcript, but the value is
/// kept opaque so list-shaped histories pass through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct DebateHistory(Value);

impl DebateHistory {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn as_text(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Individual turns in the order they were received.
    pub fn turns(&self) -> Vec<String> {
        match &self.0 {
            Value::String(s) => s
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Value::Null => Vec::new(),
            other => vec![other.to_string()],
        }
    }
}

/// Cumulative result of one analysis run.
///
/// Fields only ever go from unset to set or get overwritten by a later update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregateResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamentals_report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trader_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_decision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_debate: Option<DebateHistory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_debate: Option<DebateHistory>,
}

impl AggregateResult {
    pub fn report(&self, field: ReportField) -> Option<&str> {
        match field {
            ReportField::MarketReport => self.market_report.as_deref(),
            ReportField::SentimentReport => self.sentiment_report.as_deref(),
            ReportField::NewsReport => self.news_report.as_deref(),
            ReportField::FundamentalsReport => self.fundamentals_report.as_deref(),
            ReportField::InvestmentPlan => self.investment_plan.as_deref(),
            ReportField::TraderPlan => self.trader_plan.as_deref(),
            ReportField::FinalDecision => self.final_decision.as_deref(),
        }
    }

    pub fn set_report(&mut self, field: ReportField, text: String) {
        let slot = match field {
            ReportField::MarketReport => &mut self.market_report,
            ReportField::SentimentReport => &mut self.sentiment_report,
            ReportField::NewsReport => &mut self.news_report,
            ReportField::FundamentalsReport => &mut self.fundamentals_report,
            ReportField::InvestmentPlan => &mut self.investment_plan,
            ReportField::TraderPlan => &mut self.trader_plan,
            ReportField::FinalDecision => &mut self.final_decision,
        };
        *slot = Some(text);
    }

    pub fn debate(&self, field: DebateField) -> Option<&DebateHistory> {
        match field {
            DebateField::InvestmentDebate => self.investment_debate.as_ref(),
            DebateField::RiskDebate => self.risk_debate.as_ref(),
        }
    }

    pub fn set_debate(&mut self, field: DebateField, history: DebateHistory) {
        match field {
            DebateField::InvestmentDebate => self.investment_debate = Some(history),
            DebateField::RiskDebate => self.risk_debate = Some(history),
        }
    }

    /// Number of fields that have been set so far.
    pub fn filled(&self) -> usize {
        let reports = ReportField::ALL
            .iter()
            .filter(|f| self.report(**f).is_some())
            .count();
        let debates = DebateField::ALL
            .iter()
            .filter(|f| self.debate(**f).is_some())
            .count();
        reports + debates
    }

    pub fn is_empty(&self) -> bool {
        self.filled() == 0
    }
}
