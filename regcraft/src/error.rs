//! Error types for pattern construction, optimization, compilation and synthesis
//!
//! This module provides comprehensive error handling using the `thiserror` crate.
//! Errors are categorized by their source: tree construction, rewriting,
//! compilation for a dialect, the language-model boundary, or proposal
//! interpretation. Every variant carries enough context (pattern, dialect,
//! feature, case index) to explain the failure without reading logs.

use std::time::Duration;

use thiserror::Error;

use crate::captures::CaptureMapError;
use crate::dialect::Dialect;

/// The main error type for the crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A tree constructor rejected its arguments
    #[error("invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    /// A rewrite pass met a malformed tree
    #[error("optimization error: {0}")]
    Optimize(#[from] OptimizeError),

    /// A pattern string did not compile for its dialect
    #[error("{0}")]
    Compile(#[from] CompileError),

    /// Group names or backreferences of a tree do not line up
    #[error("invalid captures: {0}")]
    Captures(#[from] CaptureMapError),

    /// A dialect-incompatible feature was requested without downgrade permission
    #[error("{feature} is not supported when converting from {from} to {to}")]
    Validation {
        /// The offending feature
        feature: String,
        /// Source dialect
        from: Dialect,
        /// Target dialect
        to: Dialect,
    },

    /// A proposer failed to produce a pattern
    #[error("proposal error: {0}")]
    Propose(#[from] ProposeError),

    /// A caller-supplied parameter was outside its accepted range
    #[error("invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the parameter
        parameter: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Errors raised while constructing pattern tree nodes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// An alternation was built with no alternatives
    #[error("alternation requires at least one alternative")]
    EmptyAlternation,

    /// A bounded quantifier whose maximum is below its minimum
    #[error("quantifier maximum {max} is less than minimum {min}")]
    InvalidQuantifier {
        /// Lower bound
        min: u32,
        /// Upper bound
        max: u32,
    },

    /// A group or backreference name that is not an identifier
    #[error("invalid group name '{0}'")]
    InvalidGroupName(String),

    /// Backreference indices are 1-based
    #[error("backreference index must be at least 1")]
    ZeroBackreference,

    /// A character range whose end precedes its start
    #[error("invalid character range '{start}-{end}'")]
    InvalidRange {
        /// Range start
        start: char,
        /// Range end
        end: char,
    },

    /// A shorthand class letter outside `dDwWsS`
    #[error("unknown class shorthand '\\{0}'")]
    UnknownShorthand(char),

    /// A class item that is not a character, a range or a shorthand
    #[error("invalid class item '{0}'")]
    InvalidClassItem(String),
}

/// Errors raised by optimizer passes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptimizeError {
    /// A pass produced or encountered a node that violates tree invariants
    #[error("pass '{pass}' met a malformed tree: {source}")]
    MalformedTree {
        /// The pass that was running
        pass: &'static str,
        /// The invariant that failed
        source: PatternError,
    },
}

/// A pattern string that the engine for a dialect refused to compile
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("pattern '{pattern}' does not compile for {dialect}: {message}")]
pub struct CompileError {
    /// The pattern as given
    pub pattern: String,
    /// The dialect it was compiled for
    pub dialect: Dialect,
    /// The engine's message
    pub message: String,
}

/// Failures of the external text-completion boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Missing credential or unknown provider; never retried
    #[error("language model configuration error: {0}")]
    Config(String),

    /// The provider asked us to slow down
    #[error("language model rate limited{}", retry_after_suffix(.retry_after))]
    RateLimited {
        /// Provider-supplied wait hint
        retry_after: Option<Duration>,
    },

    /// Any other call failure; retried with backoff
    #[error("language model call failed: {0}")]
    Call(String),
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}

impl LlmError {
    /// Whether the retry loop may try again after this error
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LlmError::Config(_))
    }
}

/// Errors raised by a proposer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProposeError {
    /// The completion call failed after retries
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The model's response could not be turned into a proposal
    #[error("could not interpret model response: {reason}")]
    Interpretation {
        /// What was wrong with the response
        reason: String,
        /// The raw response text
        response: String,
    },
}

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display() {
        let err = CompileError {
            pattern: "(a".to_string(),
            dialect: Dialect::Js,
            message: "unclosed group".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "pattern '(a' does not compile for js: unclosed group"
        );
    }

    #[test]
    fn test_pattern_error_display() {
        let err = PatternError::InvalidQuantifier { min: 3, max: 1 };
        assert_eq!(err.to_string(), "quantifier maximum 1 is less than minimum 3");
    }

    #[test]
    fn test_error_from_pattern_error() {
        let err: Error = PatternError::EmptyAlternation.into();
        assert_eq!(
            err.to_string(),
            "invalid pattern: alternation requires at least one alternative"
        );
    }

    #[test]
    fn test_rate_limit_display() {
        let err = LlmError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(err.to_string(), "language model rate limited (retry after 7s)");
        let err = LlmError::RateLimited { retry_after: None };
        assert_eq!(err.to_string(), "language model rate limited");
    }

    #[test]
    fn test_config_errors_are_not_retryable() {
        assert!(!LlmError::Config("missing key".to_string()).is_retryable());
        assert!(LlmError::Call("503".to_string()).is_retryable());
        assert!(LlmError::RateLimited { retry_after: None }.is_retryable());
    }

    #[test]
    fn test_validation_error_display() {
        let err = Error::Validation {
            feature: "lookbehind".to_string(),
            from: Dialect::Js,
            to: Dialect::Re2,
        };
        assert_eq!(
            err.to_string(),
            "lookbehind is not supported when converting from js to re2"
        );
    }
}
