use crate::error::{ValidationError, ValidationErrors};
use crate::ticker::TickerSet;
use serde::Serialize;

const MIN_SUGGESTED_CAPITAL: f64 = 1000.0;
const MAX_SUGGESTED_RETURN_PERCENT: f64 = 100.0;

/// Parse a numeric text field. Empty or unparsable text counts as missing.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Desired return as typed (percent) converted to a fraction.
pub fn percent_to_fraction(text: &str) -> Option<f64> {
    parse_number(text).map(|percent| percent / 100.0)
}

fn is_positive_finite(value: Option<f64>) -> bool {
    matches!(value, Some(v) if v.is_finite() && v > 0.0)
}

/// Check every rule and collect all violations in rule order.
pub fn validate(
    capital: Option<f64>,
    desired_return_fraction: Option<f64>,
    horizon: Option<&str>,
    tickers: &TickerSet,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !is_positive_finite(capital) {
        errors.push(ValidationError::NonPositiveCapital);
    }
    if !is_positive_finite(desired_return_fraction) {
        errors.push(ValidationError::NonPositiveReturn);
    }
    if horizon.map(str::trim).unwrap_or_default().is_empty() {
        errors.push(ValidationError::MissingHorizon);
    }
    if tickers.size() < 2 {
        errors.push(ValidationError::InsufficientTickers);
    }

    errors
}

/// Body sent to the optimizer. Built only from a validated input bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationRequest {
    capital: f64,
    desired_return: f64,
    horizon: String,
    tickers: Vec<String>,
}

impl OptimizationRequest {
    pub fn build(
        capital: Option<f64>,
        desired_return_fraction: Option<f64>,
        horizon: Option<&str>,
        tickers: &TickerSet,
    ) -> Result<Self, ValidationErrors> {
        let errors = validate(capital, desired_return_fraction, horizon, tickers);
        match (capital, desired_return_fraction, horizon) {
            (Some(capital), Some(desired_return), Some(horizon)) if errors.is_empty() => {
                Ok(OptimizationRequest {
                    capital,
                    desired_return,
                    horizon: horizon.trim().to_string(),
                    tickers: tickers.to_strings(),
                })
            }
            _ => Err(ValidationErrors(errors)),
        }
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn desired_return(&self) -> f64 {
        self.desired_return
    }

    pub fn horizon(&self) -> &str {
        &self.horizon
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }
}

/// Non-blocking hint for the capital field.
pub fn capital_advisory(text: &str) -> Option<&'static str> {
    match parse_number(text) {
        Some(value) if value < MIN_SUGGESTED_CAPITAL => Some("Minimum capital should be $1,000"),
        _ => None,
    }
}

/// Non-blocking hint for the desired return field, which holds a percent.
pub fn return_advisory(text: &str) -> Option<&'static str> {
    match parse_number(text) {
        Some(value) if value > MAX_SUGGESTED_RETURN_PERCENT => {
            Some("Desired return seems too high (over 100%)")
        }
        Some(value) if value < 0.0 => Some("Desired return cannot be negative"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(symbols: &[&str]) -> TickerSet {
        let mut set = TickerSet::new();
        for s in symbols {
            set.add(s).unwrap();
        }
        set
    }

    #[test]
    fn test_valid_bundle_has_no_errors() {
        let errors = validate(Some(1000.0), Some(0.05), Some("1y"), &tickers(&["AAPL", "MSFT"]));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_all_rules_reported_in_order() {
        let errors = validate(Some(0.0), Some(0.0), Some(""), &tickers(&["AAPL"]));
        assert_eq!(
            errors,
            vec![
                ValidationError::NonPositiveCapital,
                ValidationError::NonPositiveReturn,
                ValidationError::MissingHorizon,
                ValidationError::InsufficientTickers,
            ]
        );
    }

    #[test]
    fn test_missing_and_non_finite_values_fail() {
        let set = tickers(&["AAPL", "MSFT"]);
        assert_eq!(
            validate(None, Some(f64::NAN), None, &set),
            vec![
                ValidationError::NonPositiveCapital,
                ValidationError::NonPositiveReturn,
                ValidationError::MissingHorizon,
            ]
        );
        assert_eq!(
            validate(Some(f64::INFINITY), Some(-0.1), Some("  "), &set),
            vec![
                ValidationError::NonPositiveCapital,
                ValidationError::NonPositiveReturn,
                ValidationError::MissingHorizon,
            ]
        );
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 2500.5 "), Some(2500.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("10000usd"), None);
        assert_eq!(percent_to_fraction("5"), Some(0.05));
    }

    #[test]
    fn test_build_request_serializes_wire_shape() {
        let request = OptimizationRequest::build(
            Some(10_000.0),
            Some(0.08),
            Some("medium"),
            &tickers(&["aapl", "msft", "goog"]),
        )
        .unwrap();

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "capital": 10000.0,
                "desired_return": 0.08,
                "horizon": "medium",
                "tickers": ["AAPL", "MSFT", "GOOG"],
            })
        );
    }

    #[test]
    fn test_build_request_rejects_invalid_bundle() {
        let err = OptimizationRequest::build(Some(-5.0), Some(0.1), Some("long"), &tickers(&[]))
            .unwrap_err();
        assert_eq!(
            err.kinds(),
            &[
                ValidationError::NonPositiveCapital,
                ValidationError::InsufficientTickers
            ]
        );
    }

    #[test]
    fn test_advisories() {
        assert_eq!(capital_advisory("999"), Some("Minimum capital should be $1,000"));
        assert_eq!(capital_advisory("1000"), None);
        assert_eq!(capital_advisory(""), None);
        assert_eq!(
            return_advisory("150"),
            Some("Desired return seems too high (over 100%)")
        );
        assert_eq!(return_advisory("-2"), Some("Desired return cannot be negative"));
        assert_eq!(return_advisory("7.5"), None);
    }
}
