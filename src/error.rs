//! Error types for pattern construction and querying

use thiserror::Error;

/// Errors raised while building or querying patterns
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    /// Illegal rational-time operation (zero denominator, overflow)
    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    /// Invalid combinator parameter
    #[error("invalid argument to {combinator}: {reason}")]
    PatternArgument {
        combinator: &'static str,
        reason: String,
    },

    /// A symbol with no mapping and no fallback
    #[error("undefined symbol '{symbol}' in {context}")]
    UndefinedSymbol { symbol: String, context: String },

    /// Configuration could not be parsed or failed validation
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error while reading configuration
    #[error("IO error: {0}")]
    Io(String),
}

impl PatternError {
    /// Shorthand for a `PatternArgument` error
    pub fn argument(combinator: &'static str, reason: impl Into<String>) -> Self {
        PatternError::PatternArgument {
            combinator,
            reason: reason.into(),
        }
    }

    /// Shorthand for an `UndefinedSymbol` error
    pub fn undefined_symbol(symbol: impl ToString, context: impl Into<String>) -> Self {
        PatternError::UndefinedSymbol {
            symbol: symbol.to_string(),
            context: context.into(),
        }
    }
}

/// Result type for pattern operations
pub type PatternResult<T> = Result<T, PatternError>;

impl From<std::io::Error> for PatternError {
    fn from(err: std::io::Error) -> Self {
        PatternError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for PatternError {
    fn from(err: toml::de::Error) -> Self {
        PatternError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PatternError {
    fn from(err: serde_json::Error) -> Self {
        PatternError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_message() {
        let err = PatternError::argument("fast", "factor must be positive, got 0");
        assert_eq!(
            err.to_string(),
            "invalid argument to fast: factor must be positive, got 0"
        );
    }

    #[test]
    fn test_undefined_symbol_message() {
        let err = PatternError::undefined_symbol('X', "symbols_to_pattern");
        assert_eq!(err.to_string(), "undefined symbol 'X' in symbols_to_pattern");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PatternError = io.into();
        assert!(matches!(err, PatternError::Io(msg) if msg.contains("missing")));
    }
}
