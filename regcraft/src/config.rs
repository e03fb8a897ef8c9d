//! Configuration for the tester, the synthesis loop and the tool surface
//!
//! All configuration is plain data with `Default` impls and serde support.
//! Nothing here reads the environment; callers build these structs (or
//! deserialize them) and pass them in explicitly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::engine::DEFAULT_BACKTRACK_LIMIT;
use crate::error::{Error, Result};

/// Smallest accepted per-case timeout
pub const MIN_TIMEOUT_MS: u64 = 10;
/// Largest accepted per-case timeout
pub const MAX_TIMEOUT_MS: u64 = 5_000;
/// Per-case timeout used when none is given
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Settings for a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesterConfig {
    /// Wall-clock budget for each case, clamped to `MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS`
    pub timeout_ms: u64,
    /// Step limit for the backtracking engine
    pub backtrack_limit: usize,
}

impl Default for TesterConfig {
    fn default() -> Self {
        TesterConfig {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            backtrack_limit: DEFAULT_BACKTRACK_LIMIT,
        }
    }
}

impl TesterConfig {
    /// A config with the given timeout and default backtrack limit
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        TesterConfig {
            timeout_ms,
            ..TesterConfig::default()
        }
    }

    /// The effective per-case timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
    }

    /// Reject timeouts outside the accepted range
    pub fn validate(&self) -> Result<()> {
        check_timeout(self.timeout_ms)?;
        if self.backtrack_limit == 0 {
            return Err(invalid("backtrack_limit", "must be positive"));
        }
        Ok(())
    }
}

/// Settings for the propose-test-refine loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Maximum proposal rounds
    pub max_iterations: usize,
    /// Dialect the proposals are emitted and tested in
    pub dialect: Dialect,
    /// Whether proposals are anchored at both ends when emitted
    pub anchored: bool,
    /// Settings for each round's test run
    pub tester: TesterConfig,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        SynthesisConfig {
            max_iterations: 3,
            dialect: Dialect::Js,
            anchored: true,
            tester: TesterConfig::default(),
        }
    }
}

impl SynthesisConfig {
    /// Reject a zero iteration budget or an invalid tester config
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1"));
        }
        self.tester.validate()
    }
}

/// Input size limits enforced by the tool surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Longest accepted pattern string, in bytes
    pub max_pattern_length: usize,
    /// Most test cases per test call
    pub max_test_cases: usize,
    /// Most positive or negative examples per proposal call
    pub max_examples: usize,
    /// Most synthesis rounds a caller may request
    pub max_iterations: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_pattern_length: 10_000,
            max_test_cases: 100,
            max_examples: 50,
            max_iterations: 10,
        }
    }
}

impl Limits {
    /// Check a pattern string's length
    pub fn check_pattern(&self, pattern: &str) -> Result<()> {
        if pattern.is_empty() {
            return Err(invalid("pattern", "must not be empty"));
        }
        if pattern.len() > self.max_pattern_length {
            return Err(invalid(
                "pattern",
                &format!("length {} exceeds {}", pattern.len(), self.max_pattern_length),
            ));
        }
        Ok(())
    }

    /// Check a test-case count
    pub fn check_test_cases(&self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(invalid("cases", "at least one test case is required"));
        }
        if count > self.max_test_cases {
            return Err(invalid(
                "cases",
                &format!("{} test cases exceeds {}", count, self.max_test_cases),
            ));
        }
        Ok(())
    }

    /// Check example counts for a proposal
    pub fn check_examples(&self, positives: usize, negatives: usize) -> Result<()> {
        if positives == 0 {
            return Err(invalid("positive", "at least one positive example is required"));
        }
        if positives > self.max_examples {
            return Err(invalid(
                "positive",
                &format!("{} examples exceeds {}", positives, self.max_examples),
            ));
        }
        if negatives > self.max_examples {
            return Err(invalid(
                "negative",
                &format!("{} examples exceeds {}", negatives, self.max_examples),
            ));
        }
        Ok(())
    }

    /// Check a requested iteration budget
    pub fn check_iterations(&self, iterations: usize) -> Result<()> {
        if iterations == 0 || iterations > self.max_iterations {
            return Err(invalid(
                "max_iterations",
                &format!("must be between 1 and {}", self.max_iterations),
            ));
        }
        Ok(())
    }
}

/// Check a timeout against the accepted range
pub fn check_timeout(timeout_ms: u64) -> Result<()> {
    if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&timeout_ms) {
        return Err(invalid(
            "timeout_ms",
            &format!("must be between {} and {}", MIN_TIMEOUT_MS, MAX_TIMEOUT_MS),
        ));
    }
    Ok(())
}

fn invalid(parameter: &str, reason: &str) -> Error {
    Error::InvalidParameter {
        parameter: parameter.to_string(),
        reason: reason.to_string(),
    }
}
