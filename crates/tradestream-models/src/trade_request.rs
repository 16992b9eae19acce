use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Credentials forwarded to the analysis backend, keyed by environment-variable name.
///
/// Empty values are kept out of the serialized form so a half-filled set of keys
/// never overrides what the backend already has.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ApiKeys(BTreeMap<String, String>);

impl ApiKeys {
    pub const OPENAI: &'static str = "OPENAI_API_KEY";
    pub const GEMINI: &'static str = "GEMINI_API_KEY";
    pub const OPENROUTER: &'static str = "OPENROUTER_API_KEY";
    pub const TAVILY: &'static str = "TAVILY_API_KEY";
    pub const FINNHUB: &'static str = "FINNHUB_API_KEY";
    pub const LANGSMITH: &'static str = "LANGSMITH_API_KEY";

    /// Every credential name the backend recognises.
    pub const RECOGNISED: [&'static str; 6] = [
        Self::OPENAI,
        Self::GEMINI,
        Self::OPENROUTER,
        Self::TAVILY,
        Self::FINNHUB,
        Self::LANGSMITH,
    ];

    /// Keys the submission form refuses to go without.
    pub const REQUIRED: [&'static str; 2] = [Self::TAVILY, Self::FINNHUB];

    /// At least one of these selects the backend's LLM provider.
    pub const LLM_PROVIDERS: [&'static str; 3] = [Self::OPENAI, Self::GEMINI, Self::OPENROUTER];

    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every recognised key that is set in the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Collect recognised keys through an arbitrary lookup (environment, prompt, test table).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut keys = Self::new();
        for name in Self::RECOGNISED {
            if let Some(value) = lookup(name) {
                keys.insert(name, value);
            }
        }
        keys
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into().trim().to_string());
    }

    /// Non-empty value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Required keys that are absent or empty.
    pub fn missing_required(&self) -> Vec<&'static str> {
        Self::REQUIRED
            .into_iter()
            .filter(|name| !self.is_set(name))
            .collect()
    }

    pub fn has_llm_provider(&self) -> bool {
        Self::LLM_PROVIDERS.iter().any(|name| self.is_set(name))
    }

    /// Overlay non-empty values from `other` on top of these keys.
    pub fn merge(&mut self, other: &ApiKeys) {
        for (name, value) in &other.0 {
            if !value.is_empty() {
                self.0.insert(name.clone(), value.clone());
            }
        }
    }

    /// Names of the keys that carry a value, for logging without leaking secrets.
    pub fn names(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(String::is_empty)
    }
}

impl Serialize for ApiKeys {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_map(self.0.iter().filter(|(_, v)| !v.is_empty()))
    }
}

/// Body of `POST /trade`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeRequest {
    pub ticker: String,
    pub api_keys: ApiKeys,
}

impl TradeRequest {
    /// Tickers are trimmed and upper-cased, matching what the backend expects.
    pub fn new(ticker: &str, api_keys: ApiKeys) -> Self {
        Self {
            ticker: ticker.trim().to_uppercase(),
            api_keys,
        }
    }
}
