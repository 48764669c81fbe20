//! Turns an optimizer response of unknown shape into titled display blocks.
//!
//! Dispatch is two levels deep: the top-level value picks the blocks, and
//! each block's data picks its lines. Anything nested deeper is printed as
//! compact JSON.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Top-level shape of an optimizer result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultShape<'a> {
    Sequence(&'a [Value]),
    Mapping(&'a Map<String, Value>),
    Scalar(&'a Value),
}

impl<'a> From<&'a Value> for ResultShape<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Array(items) => ResultShape::Sequence(items),
            Value::Object(map) => ResultShape::Mapping(map),
            scalar => ResultShape::Scalar(scalar),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayBlock {
    pub title: String,
    pub lines: Vec<DisplayLine>,
}

/// Digit grouping and decimal mark used for numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberLocale {
    #[default]
    EnUs,
    DeDe,
    FrFr,
}

impl NumberLocale {
    fn group_separator(self) -> &'static str {
        match self {
            NumberLocale::EnUs => ",",
            NumberLocale::DeDe => ".",
            NumberLocale::FrFr => "\u{202f}",
        }
    }

    fn decimal_separator(self) -> &'static str {
        match self {
            NumberLocale::EnUs => ".",
            NumberLocale::DeDe | NumberLocale::FrFr => ",",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NumberLocale::EnUs => "en-US",
            NumberLocale::DeDe => "de-DE",
            NumberLocale::FrFr => "fr-FR",
        }
    }
}

impl FromStr for NumberLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "en-us" | "en" => Ok(NumberLocale::EnUs),
            "de-de" | "de" => Ok(NumberLocale::DeDe),
            "fr-fr" | "fr" => Ok(NumberLocale::FrFr),
            _ => Err(format!("Unknown locale: '{s}'")),
        }
    }
}

impl fmt::Display for NumberLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `snake_case` keys to `Title Case`: underscores become spaces and the
/// first letter of every word is uppercased. Other letters are kept.
pub fn format_title(key: &str) -> String {
    let mut title = String::with_capacity(key.len());
    let mut at_word_start = true;
    for c in key.chars().map(|c| if c == '_' { ' ' } else { c }) {
        let is_word_char = c.is_ascii_alphanumeric();
        if is_word_char && at_word_start {
            title.push(c.to_ascii_uppercase());
        } else {
            title.push(c);
        }
        at_word_start = !is_word_char;
    }
    title
}

#[cfg(test)]
pub fn format_value(value: &Value) -> String {
    Renderer::default().format_value(value)
}

#[cfg(test)]
pub fn render(value: &Value) -> Vec<DisplayBlock> {
    Renderer::default().render(value)
}

fn group_digits(digits: &str, separator: &str) -> String {
    digits
        .chars()
        .rev()
        .collect::<Vec<_>>()
        .chunks(3)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(&separator.chars().rev().collect::<String>())
        .chars()
        .rev()
        .collect::<String>()
}

/// Pure formatter for optimizer results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Renderer {
    locale: NumberLocale,
}

impl Renderer {
    pub fn new(locale: NumberLocale) -> Renderer {
        Renderer { locale }
    }

    pub fn render(&self, value: &Value) -> Vec<DisplayBlock> {
        match ResultShape::from(value) {
            ResultShape::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(index, data)| self.block(format!("Asset {}", index + 1), data))
                .collect(),
            ResultShape::Mapping(map) => map
                .iter()
                .map(|(key, data)| self.block(format_title(key), data))
                .collect(),
            ResultShape::Scalar(scalar) => vec![DisplayBlock {
                title: "Result".to_string(),
                lines: vec![DisplayLine {
                    label: String::new(),
                    value: self.format_value(scalar),
                }],
            }],
        }
    }

    fn block(&self, title: String, data: &Value) -> DisplayBlock {
        let lines = match data {
            Value::Object(map) => map
                .iter()
                .map(|(key, value)| DisplayLine {
                    label: format_title(key),
                    value: self.format_value(value),
                })
                .collect(),
            other => vec![DisplayLine {
                label: String::new(),
                value: self.format_value(other),
            }],
        };
        DisplayBlock { title, lines }
    }

    /// Numbers in (-1, 1) other than 0 become percentages, every other
    /// number becomes currency. Strings are shown as they are; other
    /// values are shown as compact JSON.
    pub fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Number(number) => match number.as_f64() {
                Some(v) => self.format_number(v),
                None => number.to_string(),
            },
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }

    pub fn format_number(&self, v: f64) -> String {
        if v > -1.0 && v < 1.0 && v != 0.0 {
            self.format_percent(v)
        } else {
            self.format_currency(v)
        }
    }

    fn format_percent(&self, fraction: f64) -> String {
        let percent = fraction * 100.0;
        let sign = if percent < 0.0 { "-" } else { "" };
        let fixed = fixed_2(percent);
        format!("{sign}{}%", fixed.replace('.', self.locale.decimal_separator()))
    }

    fn format_currency(&self, v: f64) -> String {
        let fixed = fixed_2(v);
        let (integer_part, decimal_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
        let sign = if v < 0.0 { "-" } else { "" };
        format!(
            "{sign}${}{}{decimal_part}",
            group_digits(integer_part, self.locale.group_separator()),
            self.locale.decimal_separator()
        )
    }
}

/// Magnitude of `v` with two decimals, ties rounded away from zero.
fn fixed_2(v: f64) -> String {
    format!("{:.2}", (v.abs() * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line(label: &str, value: &str) -> DisplayLine {
        DisplayLine {
            label: label.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_format_value_percentages() {
        assert_eq!(format_value(&json!(0.05)), "5.00%");
        assert_eq!(format_value(&json!(-0.2)), "-20.00%");
        assert_eq!(format_value(&json!(0.4)), "40.00%");
        assert_eq!(format_value(&json!(0.99999)), "100.00%");
    }

    #[test]
    fn test_format_value_currency() {
        assert_eq!(format_value(&json!(1500)), "$1,500.00");
        assert_eq!(format_value(&json!(-1500)), "-$1,500.00");
        assert_eq!(format_value(&json!(0)), "$0.00");
        assert_eq!(format_value(&json!(1)), "$1.00");
        assert_eq!(format_value(&json!(-1)), "-$1.00");
        assert_eq!(format_value(&json!(1234567.891)), "$1,234,567.89");
        assert_eq!(format_value(&json!(999.5)), "$999.50");
    }

    #[test]
    fn test_format_value_rounds_ties_away_from_zero() {
        assert_eq!(format_value(&json!(1.125)), "$1.13");
        assert_eq!(format_value(&json!(-1.125)), "-$1.13");
        assert_eq!(format_value(&json!(1000.125)), "$1,000.13");
        assert_eq!(format_value(&json!(0.00625)), "0.63%");
        assert_eq!(format_value(&json!(-0.00625)), "-0.63%");
    }

    #[test]
    fn test_format_value_non_numeric() {
        assert_eq!(format_value(&json!("n/a")), "n/a");
        assert_eq!(format_value(&json!(true)), "true");
        assert_eq!(format_value(&json!(null)), "null");
        assert_eq!(format_value(&json!({"a": {"b": 1}})), r#"{"a":{"b":1}}"#);
        assert_eq!(format_value(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_format_title() {
        assert_eq!(format_title("expected_return"), "Expected Return");
        assert_eq!(format_title("AAPL"), "AAPL");
        assert_eq!(format_title("Risk-free asset"), "Risk-Free Asset");
        assert_eq!(format_title("sharpe_ratio_1y"), "Sharpe Ratio 1y");
        assert_eq!(format_title(""), "");
    }

    #[test]
    fn test_locales() {
        let de = Renderer::new(NumberLocale::DeDe);
        assert_eq!(de.format_number(1500.0), "$1.500,00");
        assert_eq!(de.format_number(-0.125), "-12,50%");

        let fr = Renderer::new(NumberLocale::FrFr);
        assert_eq!(fr.format_number(-1234567.0), "-$1\u{202f}234\u{202f}567,00");

        assert_eq!("de_DE".parse::<NumberLocale>(), Ok(NumberLocale::DeDe));
        assert!("xx".parse::<NumberLocale>().is_err());
    }

    #[test]
    fn test_render_mapping_of_mappings() {
        let value = json!({
            "AAPL": {"weight": 0.4, "value": 4000},
            "MSFT": {"weight": 0.6, "value": 6000},
        });
        let blocks = render(&value);
        assert_eq!(
            blocks,
            vec![
                DisplayBlock {
                    title: "AAPL".to_string(),
                    lines: vec![line("Weight", "40.00%"), line("Value", "$4,000.00")],
                },
                DisplayBlock {
                    title: "MSFT".to_string(),
                    lines: vec![line("Weight", "60.00%"), line("Value", "$6,000.00")],
                },
            ]
        );
    }

    #[test]
    fn test_render_flat_allocation_keeps_key_order() {
        let value: Value =
            serde_json::from_str(r#"{"MSFT": 6120.5, "AAPL": 3879.5, "Risk-free asset": -0.5}"#)
                .unwrap();
        let blocks = render(&value);
        let titles: Vec<&str> = blocks.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["MSFT", "AAPL", "Risk-Free Asset"]);
        assert_eq!(blocks[0].lines, vec![line("", "$6,120.50")]);
        assert_eq!(blocks[2].lines, vec![line("", "-50.00%")]);
    }

    #[test]
    fn test_render_sequence() {
        let value = json!([
            {"ticker": "AAPL", "dollar_amount": 2500},
            0.25,
        ]);
        let blocks = render(&value);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].title, "Asset 1");
        assert_eq!(
            blocks[0].lines,
            vec![line("Ticker", "AAPL"), line("Dollar Amount", "$2,500.00")]
        );
        assert_eq!(blocks[1].title, "Asset 2");
        assert_eq!(blocks[1].lines, vec![line("", "25.00%")]);
    }

    #[test]
    fn test_render_scalar() {
        assert_eq!(
            render(&json!(12000)),
            vec![DisplayBlock {
                title: "Result".to_string(),
                lines: vec![line("", "$12,000.00")],
            }]
        );
        assert_eq!(render(&json!("done"))[0].lines, vec![line("", "done")]);
    }

    #[test]
    fn test_render_third_level_falls_back_to_json() {
        let value = json!({"summary": {"by_sector": {"tech": 0.7}}});
        let blocks = render(&value);
        assert_eq!(blocks[0].lines, vec![line("By Sector", r#"{"tech":0.7}"#)]);
    }

    #[test]
    fn test_render_is_deterministic() {
        let value = json!({"a": [1, {"b": 2}], "c_d": {"e": -0.01}});
        assert_eq!(render(&value), render(&value));
    }

    #[test]
    fn test_shape_dispatch() {
        assert!(matches!(ResultShape::from(&json!([])), ResultShape::Sequence(_)));
        assert!(matches!(ResultShape::from(&json!({})), ResultShape::Mapping(_)));
        assert!(matches!(ResultShape::from(&json!(null)), ResultShape::Scalar(_)));
    }
}
