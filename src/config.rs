//! Engine configuration, deserialized from the dashboard's settings JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(String),
    #[error("max_nesting_depth must be at least 1")]
    ZeroNestingDepth,
}

/// Which definition wins when two formulas share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateNamePolicy {
    #[default]
    FirstWins,
    LastWins,
}

/// How detail raw values are turned into numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailParsing {
    /// Decimal literal with optional exponent, surrounding whitespace ignored.
    #[default]
    Strict,
    /// Also accepts a currency sign and thousands separators ("$1,250.00").
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub duplicate_names: DuplicateNamePolicy,
    pub detail_parsing: DetailParsing,
    /// Bound on nested parentheses and unary signs accepted by the parser.
    pub max_nesting_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duplicate_names: DuplicateNamePolicy::FirstWins,
            detail_parsing: DetailParsing::Strict,
            max_nesting_depth: 64,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_nesting_depth == 0 {
            return Err(ConfigError::ZeroNestingDepth);
        }
        Ok(())
    }

    /// Parses a detail value according to `detail_parsing`. Non-finite
    /// results ("NaN", "inf") count as unparsable.
    pub fn parse_detail(&self, raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        let parsed = match self.detail_parsing {
            DetailParsing::Strict => parse_plain(trimmed),
            DetailParsing::Lenient => {
                let (negative, rest) = match trimmed.strip_prefix('-') {
                    Some(rest) => (true, rest.trim_start()),
                    None => (false, trimmed),
                };
                let cleaned: String = rest
                    .strip_prefix('$')
                    .unwrap_or(rest)
                    .chars()
                    .filter(|&c| c != ',')
                    .collect();
                parse_plain(cleaned.trim()).map(|v| if negative { -v } else { v })
            }
        }?;
        parsed.is_finite().then_some(parsed)
    }
}

// Decimal literals with an optional exponent ("1.5", "-.5", "1e5"). The
// spelled-out forms `f64::from_str` also takes ("inf", "NaN") are not numbers
// here.
fn parse_plain(s: &str) -> Option<f64> {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (unsigned, None),
    };
    let mantissa_ok = mantissa.chars().any(|c| c.is_ascii_digit())
        && mantissa.chars().all(|c| c.is_ascii_digit() || c == '.')
        && mantissa.matches('.').count() <= 1;
    let exponent_ok = exponent.map_or(true, |e| {
        let digits = e.strip_prefix(['+', '-']).unwrap_or(e);
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    });
    if !(mantissa_ok && exponent_ok) {
        return None;
    }
    s.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("200000", Some(200000.0))]
    #[case("  12.5 ", Some(12.5))]
    #[case("-3", Some(-3.0))]
    #[case(".5", Some(0.5))]
    #[case("abc", None)]
    #[case("", None)]
    #[case("$1,000", None)]
    #[case("NaN", None)]
    #[case("inf", None)]
    #[case("1e5", Some(100000.0))]
    #[case("2.5E-3", Some(0.0025))]
    #[case("-1e+2", Some(-100.0))]
    #[case("1e400", None)]
    #[case("1e", None)]
    #[case("e5", None)]
    #[case("1.2.3", None)]
    fn test_strict_detail_parsing(#[case] raw: &str, #[case] expected: Option<f64>) {
        assert_eq!(EngineConfig::default().parse_detail(raw), expected);
    }

    #[rstest]
    #[case("$1,250.50", Some(1250.5))]
    #[case("-$2,000", Some(-2000.0))]
    #[case("1,000,000", Some(1_000_000.0))]
    #[case("$", None)]
    #[case("12 units", None)]
    fn test_lenient_detail_parsing(#[case] raw: &str, #[case] expected: Option<f64>) {
        let config = EngineConfig { detail_parsing: DetailParsing::Lenient, ..Default::default() };
        assert_eq!(config.parse_detail(raw), expected);
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = EngineConfig::from_json(r#"{"duplicate_names": "last_wins"}"#).unwrap();
        assert_eq!(config.duplicate_names, DuplicateNamePolicy::LastWins);
        assert_eq!(config.detail_parsing, DetailParsing::Strict);
        assert_eq!(config.max_nesting_depth, 64);
    }

    #[test]
    fn test_from_json_rejects_zero_depth() {
        let err = EngineConfig::from_json(r#"{"max_nesting_depth": 0}"#).unwrap_err();
        assert_eq!(err, ConfigError::ZeroNestingDepth);
    }

    #[test]
    fn test_from_json_reports_malformed_input() {
        assert!(matches!(EngineConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }
}
