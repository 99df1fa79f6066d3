// src/error.rs
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProviderErrorKind {
    #[error("dependency not installed")]
    NotInstalled,
    #[error("timed out")]
    Timeout,
    #[error("bad output")]
    BadOutput,
    #[error("process failure")]
    ProcessFailure,
}

/// Failure of a single provider call.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        ProviderError {
            kind,
            message: message.into(),
        }
    }

    pub fn not_installed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotInstalled, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    pub fn bad_output(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::BadOutput, message)
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ProcessFailure, message)
    }
}

/// The three sub-fetches that make up a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundlePart {
    Overview,
    Sectors,
    EquityBondSpread,
}

impl fmt::Display for BundlePart {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            BundlePart::Overview => "overview",
            BundlePart::Sectors => "sectors",
            BundlePart::EquityBondSpread => "equityBondSpread",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("missing required parameter: date")]
    MissingParameter,

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("data provider is not configured ({part}): {source}")]
    ProviderNotConfigured { part: BundlePart, source: ProviderError },

    #[error("data provider timed out ({part}): {source}")]
    ProviderTimeout { part: BundlePart, source: ProviderError },

    #[error("data provider returned unreadable output ({part}): {source}")]
    ProviderBadOutput { part: BundlePart, source: ProviderError },

    #[error("failed to fetch {part}: {source}")]
    AggregateFailure { part: BundlePart, source: ProviderError },
}

impl MarketDataError {
    /// Classifies a failed sub-fetch by what went wrong underneath.
    pub fn from_part(part: BundlePart, source: ProviderError) -> Self {
        match source.kind {
            ProviderErrorKind::NotInstalled => {
                MarketDataError::ProviderNotConfigured { part, source }
            }
            ProviderErrorKind::Timeout => MarketDataError::ProviderTimeout { part, source },
            ProviderErrorKind::BadOutput => MarketDataError::ProviderBadOutput { part, source },
            ProviderErrorKind::ProcessFailure => MarketDataError::AggregateFailure { part, source },
        }
    }

    pub fn is_not_configured(&self) -> bool {
        matches!(self, MarketDataError::ProviderNotConfigured { .. })
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, MarketDataError::MissingParameter | MarketDataError::InvalidDate(_))
    }

    pub fn part(&self) -> Option<BundlePart> {
        match self {
            MarketDataError::ProviderNotConfigured { part, .. }
            | MarketDataError::ProviderTimeout { part, .. }
            | MarketDataError::ProviderBadOutput { part, .. }
            | MarketDataError::AggregateFailure { part, .. } => Some(*part),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_fetch_failures_keep_their_kind() {
        let missing = ProviderError::not_installed("akshare");
        let err = MarketDataError::from_part(BundlePart::Sectors, missing);
        assert!(err.is_not_configured());
        assert_eq!(err.part(), Some(BundlePart::Sectors));

        let err =
            MarketDataError::from_part(BundlePart::Overview, ProviderError::process("exit 1"));
        assert!(matches!(err, MarketDataError::AggregateFailure { .. }));
        assert_eq!(err.to_string(), "failed to fetch overview: process failure: exit 1");
    }

    #[test]
    fn parameter_errors_are_bad_requests() {
        assert!(MarketDataError::MissingParameter.is_bad_request());
        assert!(MarketDataError::InvalidDate("x".into()).is_bad_request());
        let err = MarketDataError::from_part(
            BundlePart::EquityBondSpread,
            ProviderError::timeout("10s"),
        );
        assert!(!err.is_bad_request());
    }
}
