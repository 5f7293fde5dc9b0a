//! Currency registry
//!
//! An explicit, constructed mapping from currency code to minor-unit precision.
//! Built once from configuration and shared behind an `Arc`; there is no
//! process-wide table.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::CurrencyConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("currency is mandatory")]
    Empty,

    #[error("unsupported currency: {0}")]
    Unsupported(String),

    #[error("duplicated currency: {0}")]
    Duplicate(String),

    #[error("precision {precision} too large for {code}")]
    PrecisionTooLarge { code: String, precision: u32 },
}

/// A supported currency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    pub code: String,
    pub precision: u32,
}

/// Largest precision `Decimal` can scale an `i64` by without overflow
const MAX_PRECISION: u32 = 18;

#[derive(Debug, Clone, Default)]
pub struct CurrencyRegistry {
    currencies: BTreeMap<String, Currency>,
}

impl CurrencyRegistry {
    /// Build the registry. Codes are stored uppercase; a code registered twice
    /// (case-insensitively) is rejected.
    pub fn new<I>(entries: I) -> Result<Self, CurrencyError>
    where
        I: IntoIterator<Item = (String, u32)>,
    {
        let mut currencies = BTreeMap::new();
        for (code, precision) in entries {
            let code = code.trim().to_uppercase();
            if code.is_empty() {
                return Err(CurrencyError::Empty);
            }
            if precision > MAX_PRECISION {
                return Err(CurrencyError::PrecisionTooLarge { code, precision });
            }
            if currencies.contains_key(&code) {
                return Err(CurrencyError::Duplicate(code));
            }
            currencies.insert(code.clone(), Currency { code, precision });
        }
        Ok(Self { currencies })
    }

    pub fn from_config(config: &[CurrencyConfig]) -> Result<Self, CurrencyError> {
        Self::new(config.iter().map(|c| (c.code.clone(), c.precision)))
    }

    /// Resolve a client-supplied code (case-insensitive, surrounding whitespace ignored).
    pub fn resolve(&self, code: &str) -> Result<&Currency, CurrencyError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CurrencyError::Empty);
        }
        self.currencies
            .get(&code.to_uppercase())
            .ok_or_else(|| CurrencyError::Unsupported(code.to_string()))
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.currencies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }

    /// Render a minor-unit amount with the currency's precision, e.g. 15000 SGD -> "150.00".
    pub fn format(&self, code: &str, minor_units: i64) -> Result<String, CurrencyError> {
        let currency = self.resolve(code)?;
        Ok(format_minor_units(minor_units, currency.precision))
    }
}

pub fn format_minor_units(minor_units: i64, precision: u32) -> String {
    let value = Decimal::new(minor_units, precision);
    format!("{:.prec$}", value, prec = precision as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CurrencyRegistry {
        CurrencyRegistry::new([("SGD".to_string(), 2), ("jpy".to_string(), 0)]).unwrap()
    }

    #[test]
    fn test_resolve() {
        let reg = registry();
        assert_eq!(reg.resolve("SGD").unwrap().precision, 2);
        assert_eq!(reg.resolve(" sgd ").unwrap().code, "SGD");
        assert_eq!(reg.resolve("JPY").unwrap().precision, 0);
    }

    #[test]
    fn test_resolve_errors() {
        let reg = registry();
        assert_eq!(reg.resolve("  "), Err(CurrencyError::Empty));
        assert_eq!(
            reg.resolve("THB"),
            Err(CurrencyError::Unsupported("THB".to_string()))
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = CurrencyRegistry::new([("SGD".to_string(), 2), ("sgd".to_string(), 2)])
            .unwrap_err();
        assert_eq!(err, CurrencyError::Duplicate("SGD".to_string()));
    }

    #[test]
    fn test_precision_bound() {
        assert!(CurrencyRegistry::new([("XXX".to_string(), 19)]).is_err());
    }

    #[test]
    fn test_codes_sorted() {
        let reg = registry();
        let codes: Vec<&str> = reg.codes().collect();
        assert_eq!(codes, vec!["JPY", "SGD"]);
    }

    #[test]
    fn test_format() {
        let reg = registry();
        assert_eq!(reg.format("SGD", 15000).unwrap(), "150.00");
        assert_eq!(reg.format("SGD", 1).unwrap(), "0.01");
        assert_eq!(reg.format("SGD", 0).unwrap(), "0.00");
        assert_eq!(reg.format("JPY", 1500).unwrap(), "1500");
        assert_eq!(format_minor_units(-250, 2), "-2.50");
    }
}
