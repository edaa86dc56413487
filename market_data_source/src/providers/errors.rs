use thiserror::Error;

/// Errors that can occur within a [`MarketDataSource`](super::MarketDataSource) implementation.
///
/// The three variants are kept apart so callers can choose a retry policy per kind:
/// unavailability is transient, an empty result may be transient, and a malformed
/// response will not improve on retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Network failure, timeout, throttling or a server-side error.
    #[error("source unavailable for {symbol}: {message}")]
    Unavailable { symbol: String, message: String },

    /// The source answered but had no bars for the symbol in the window.
    #[error("source returned no bars for {symbol}")]
    EmptyResult { symbol: String },

    /// The response could not be understood.
    #[error("malformed response for {symbol}: {message}")]
    Malformed { symbol: String, message: String },
}

/// Discriminant of [`SourceError`] without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    Empty,
    Malformed,
}

impl SourceError {
    pub fn unavailable(symbol: &str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            symbol: symbol.to_string(),
            message: message.into(),
        }
    }

    pub fn empty(symbol: &str) -> Self {
        Self::EmptyResult {
            symbol: symbol.to_string(),
        }
    }

    pub fn malformed(symbol: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            symbol: symbol.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> SourceErrorKind {
        match self {
            Self::Unavailable { .. } => SourceErrorKind::Unavailable,
            Self::EmptyResult { .. } => SourceErrorKind::Empty,
            Self::Malformed { .. } => SourceErrorKind::Malformed,
        }
    }

    /// Unavailable and empty results may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), SourceErrorKind::Malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_malformed_is_final() {
        assert!(SourceError::unavailable("GC=F", "timeout").is_retryable());
        assert!(SourceError::empty("GC=F").is_retryable());
        assert!(!SourceError::malformed("GC=F", "bad json").is_retryable());
    }

    #[test]
    fn display_names_the_symbol() {
        let err = SourceError::unavailable("^TNX", "HTTP 503");
        assert_eq!(err.to_string(), "source unavailable for ^TNX: HTTP 503");
        assert_eq!(err.kind(), SourceErrorKind::Unavailable);
    }
}
