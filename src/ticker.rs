use crate::error::TickerError;
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_TICKER_LEN: usize = 5;

pub const EMPTY_TICKERS_MESSAGE: &str = "No stocks added yet";

/// Trim surrounding whitespace and uppercase ASCII letters.
///
/// Non-ASCII characters are left as they are so that validation still sees
/// them; `normalize(normalize(s)) == normalize(s)` for every `s`.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Keystroke filter for the ticker input: uppercase and drop anything that
/// is not `A`-`Z`.
pub fn sanitize_ticker_input(raw: &str) -> String {
    raw.chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| c.is_ascii_uppercase())
        .collect()
}

/// A validated ticker symbol: 1-5 uppercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TickerSymbol(String);

impl TickerSymbol {
    pub fn parse(raw: &str) -> Result<Self, TickerError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(TickerError::EmptyInput);
        }

        let len = normalized.chars().count();
        if !(1..=MAX_TICKER_LEN).contains(&len) {
            return Err(TickerError::InvalidLength);
        }

        if !normalized.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(TickerError::InvalidCharacters);
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TickerSymbol {
    type Error = TickerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TickerSymbol> for String {
    fn from(value: TickerSymbol) -> Self {
        value.0
    }
}

/// Ordered, duplicate-free collection of ticker symbols.
///
/// Insertion order is preserved; the only mutations are `add` and `remove`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerSet {
    symbols: Vec<TickerSymbol>,
}

impl TickerSet {
    pub fn new() -> TickerSet {
        TickerSet {
            symbols: Vec::new(),
        }
    }

    /// Validate `raw` and append it to the end of the set.
    pub fn add(&mut self, raw: &str) -> Result<TickerSymbol, TickerError> {
        let symbol = TickerSymbol::parse(raw)?;
        if self.contains(symbol.as_str()) {
            return Err(TickerError::Duplicate);
        }
        self.symbols.push(symbol.clone());
        Ok(symbol)
    }

    /// Remove `symbol` if present. Returns whether anything was removed.
    pub fn remove(&mut self, symbol: &str) -> bool {
        let normalized = normalize(symbol);
        match self.symbols.iter().position(|s| s.as_str() == normalized) {
            Some(index) => {
                self.symbols.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        let normalized = normalize(symbol);
        self.symbols.iter().any(|s| s.as_str() == normalized)
    }

    pub fn list(&self) -> &[TickerSymbol] {
        &self.symbols
    }

    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.symbols.iter().map(|s| s.as_str().to_string()).collect()
    }

    pub fn view(&self) -> TickerListView {
        if self.is_empty() {
            TickerListView::Empty
        } else {
            TickerListView::Tags(
                self.symbols
                    .iter()
                    .map(|symbol| TickerTag {
                        symbol: symbol.clone(),
                        remove_hint: format!("Remove {symbol}"),
                    })
                    .collect(),
            )
        }
    }
}

/// What the ticker area shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerListView {
    Empty,
    Tags(Vec<TickerTag>),
}

impl TickerListView {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            TickerListView::Empty => Some(EMPTY_TICKERS_MESSAGE),
            TickerListView::Tags(_) => None,
        }
    }
}

/// One rendered ticker; its remove action is bound to `symbol`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerTag {
    pub symbol: TickerSymbol,
    pub remove_hint: String,
}
