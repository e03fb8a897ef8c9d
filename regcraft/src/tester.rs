//! Tester: runs a pattern against labeled inputs under a per-case timeout
//!
//! The pattern is compiled once. Each case then runs on its own worker thread
//! with its own handle to the compiled pattern, and the caller waits for at
//! most the configured timeout. A hung match is abandoned, not joined, so it
//! cannot delay or corrupt the cases after it.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TesterConfig;
use crate::dialect::Dialect;
use crate::engine::{CompiledPattern, ExecError};
use crate::error::CompileError;

/// One labeled input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// The input string
    pub input: String,
    /// Whether the pattern is expected to match somewhere in `input`
    pub should_match: bool,
    /// Expected captured substrings by group name or decimal index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_captures: Option<BTreeMap<String, String>>,
}

impl TestCase {
    /// A case that must match
    pub fn positive(input: impl Into<String>) -> Self {
        TestCase {
            input: input.into(),
            should_match: true,
            expected_captures: None,
        }
    }

    /// A case that must not match
    pub fn negative(input: impl Into<String>) -> Self {
        TestCase {
            input: input.into(),
            should_match: false,
            expected_captures: None,
        }
    }

    /// Require a capture to equal `value`
    pub fn with_capture(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.expected_captures
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Outcome of one case
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseStatus {
    /// Verdict and captures as expected
    Pass,
    /// Wrong match/no-match verdict
    Mismatch {
        /// What the case expected
        expected: bool,
        /// What the pattern did
        actual: bool,
    },
    /// Verdict correct but a capture differs
    CaptureMismatch {
        /// The capture key
        key: String,
        /// Expected substring
        expected: String,
        /// Captured substring, if the group participated
        actual: Option<String>,
    },
    /// Execution did not complete in time (likely catastrophic backtracking)
    Timeout,
    /// The engine failed for another reason
    Error {
        /// Engine message
        message: String,
    },
}

impl CaseStatus {
    /// Whether the case passed
    pub fn is_pass(&self) -> bool {
        matches!(self, CaseStatus::Pass)
    }
}

/// Per-case details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    /// Position of the case in the input list
    pub index: usize,
    /// The case input
    pub input: String,
    /// The expected verdict
    pub should_match: bool,
    /// The outcome
    pub status: CaseStatus,
    /// Captured groups of the first match, when there was one
    pub captures: Option<BTreeMap<String, String>>,
    /// Wall-clock time spent waiting for the case
    pub elapsed: Duration,
}

/// Aggregate outcome of a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    /// The pattern that was tested
    pub pattern: String,
    /// Its dialect
    pub dialect: Dialect,
    /// Cases that passed
    pub passed: usize,
    /// Cases that did not pass (including timeouts)
    pub failed: usize,
    /// Cases that timed out
    pub timed_out: usize,
    /// One report per case, in input order
    pub details: Vec<CaseReport>,
}

impl TestResult {
    /// Whether every case passed
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// The reports of failing cases
    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.details.iter().filter(|d| !d.status.is_pass())
    }
}

/// Compile `pattern` for `dialect` and run every case under the configured timeout
///
/// A pattern that does not compile fails the whole run; everything after
/// compilation is reported per case.
///
/// # Example
/// ```
/// use regcraft::{test_regex, Dialect, TestCase, TesterConfig};
///
/// let result = test_regex(
///     r"\d{3}-\d{4}",
///     &[TestCase::positive("123-4567")],
///     Dialect::Js,
///     &TesterConfig::default(),
/// )
/// .unwrap();
/// assert_eq!(result.passed, 1);
/// ```
#[tracing::instrument(level = "debug", skip_all, fields(dialect = %dialect, cases = cases.len()))]
pub fn test_regex(
    pattern: &str,
    cases: &[TestCase],
    dialect: Dialect,
    config: &TesterConfig,
) -> Result<TestResult, CompileError> {
    let compiled = CompiledPattern::compile(pattern, dialect, config.backtrack_limit)?;
    let timeout = config.timeout();

    let details: Vec<CaseReport> = cases
        .iter()
        .enumerate()
        .map(|(index, case)| run_case(&compiled, index, case, timeout))
        .collect();

    let passed = details.iter().filter(|d| d.status.is_pass()).count();
    let timed_out = details
        .iter()
        .filter(|d| d.status == CaseStatus::Timeout)
        .count();
    debug!(passed, failed = details.len() - passed, timed_out, "test run finished");

    Ok(TestResult {
        pattern: pattern.to_string(),
        dialect,
        passed,
        failed: details.len() - passed,
        timed_out,
        details,
    })
}

fn run_case(compiled: &CompiledPattern, index: usize, case: &TestCase, timeout: Duration) -> CaseReport {
    let started = Instant::now();
    let (tx, rx) = mpsc::channel();
    let worker_pattern = compiled.clone();
    let worker_case = case.clone();

    let spawned = thread::Builder::new()
        .name(format!("regcraft-case-{}", index))
        .spawn(move || {
            let outcome = evaluate(&worker_pattern, &worker_case);
            // the receiver is gone if the case already timed out
            let _ = tx.send(outcome);
        });

    let (status, captures) = match spawned {
        Err(err) => (
            CaseStatus::Error {
                message: format!("could not start case worker: {}", err),
            },
            None,
        ),
        Ok(_handle) => match rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                warn!(index, timeout_ms = timeout.as_millis() as u64, "case timed out");
                (CaseStatus::Timeout, None)
            }
            Err(RecvTimeoutError::Disconnected) => (
                CaseStatus::Error {
                    message: "case worker exited without a verdict".to_string(),
                },
                None,
            ),
        },
    };

    let elapsed = started.elapsed();
    debug!(index, status = ?status, elapsed_us = elapsed.as_micros() as u64, "case finished");
    CaseReport {
        index,
        input: case.input.clone(),
        should_match: case.should_match,
        status,
        captures,
        elapsed,
    }
}

fn evaluate(compiled: &CompiledPattern, case: &TestCase) -> (CaseStatus, Option<BTreeMap<String, String>>) {
    let captures = match compiled.captures(&case.input) {
        Ok(captures) => captures,
        Err(ExecError::BacktrackLimitExceeded) => return (CaseStatus::Timeout, None),
        Err(ExecError::Runtime(message)) => return (CaseStatus::Error { message }, None),
    };

    let matched = captures.is_some();
    if matched != case.should_match {
        return (
            CaseStatus::Mismatch {
                expected: case.should_match,
                actual: matched,
            },
            captures,
        );
    }

    if let (Some(expected), Some(actual)) = (&case.expected_captures, &captures) {
        for (key, want) in expected {
            let got = actual.get(key);
            if got != Some(want) {
                return (
                    CaseStatus::CaptureMismatch {
                        key: key.clone(),
                        expected: want.clone(),
                        actual: got.cloned(),
                    },
                    captures,
                );
            }
        }
    }

    (CaseStatus::Pass, captures)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TesterConfig {
        TesterConfig::default()
    }

    #[test]
    fn test_phone_pattern_passes() {
        let result = test_regex(
            r"\d{3}-\d{4}",
            &[TestCase::positive("123-4567")],
            Dialect::Js,
            &config(),
        )
        .unwrap();
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 0);
        assert!(result.all_passed());
    }

    #[test]
    fn test_mismatch_is_reported() {
        let result = test_regex(
            r"^\d+$",
            &[TestCase::positive("12a"), TestCase::negative("42")],
            Dialect::Re2,
            &config(),
        )
        .unwrap();
        assert_eq!(result.failed, 2);
        assert_eq!(
            result.details[0].status,
            CaseStatus::Mismatch {
                expected: true,
                actual: false
            }
        );
        assert_eq!(
            result.details[1].status,
            CaseStatus::Mismatch {
                expected: false,
                actual: true
            }
        );
    }

    #[test]
    fn test_capture_checks() {
        let cases = [
            TestCase::positive("2024-05").with_capture("year", "2024"),
            TestCase::positive("2024-05").with_capture("2", "06"),
        ];
        let result = test_regex(r"(?<year>\d{4})-(\d{2})", &cases, Dialect::Js, &config()).unwrap();
        assert_eq!(result.passed, 1);
        assert_eq!(
            result.details[1].status,
            CaseStatus::CaptureMismatch {
                key: "2".to_string(),
                expected: "06".to_string(),
                actual: Some("05".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_capture_group() {
        let cases = [TestCase::positive("abc").with_capture("missing", "x")];
        let result = test_regex("abc", &cases, Dialect::Js, &config()).unwrap();
        assert!(matches!(
            result.details[0].status,
            CaseStatus::CaptureMismatch { actual: None, .. }
        ));
    }

    #[test]
    fn test_compile_failure_short_circuits() {
        let err = test_regex("(abc", &[TestCase::positive("abc")], Dialect::Js, &config()).unwrap_err();
        assert_eq!(err.pattern, "(abc");
        assert_eq!(err.dialect, Dialect::Js);
    }

    #[test]
    fn test_re2_backreference_is_a_compile_error() {
        assert!(test_regex(r"(a)\1", &[TestCase::positive("aa")], Dialect::Re2, &config()).is_err());
        let result = test_regex(r"(a)\1", &[TestCase::positive("aa")], Dialect::Pcre, &config()).unwrap();
        assert!(result.all_passed());
    }

    #[test]
    fn test_runaway_case_is_isolated() {
        let mut cases: Vec<TestCase> = (1..=9).map(|n| TestCase::positive("a".repeat(n))).collect();
        cases.insert(4, TestCase::negative(format!("{}!", "a".repeat(30))));
        let config = TesterConfig {
            timeout_ms: 200,
            backtrack_limit: 100_000,
        };
        let result = test_regex(r"^(a+)+\1?$", &cases, Dialect::Js, &config).unwrap();
        assert_eq!(result.timed_out, 1);
        assert_eq!(result.details[4].status, CaseStatus::Timeout);
        assert_eq!(result.passed, 9);
        assert_eq!(result.failed, 1);
    }

    #[test]
    fn test_wall_clock_timeout_without_backtrack_limit() {
        // nothing stops the engine, only the deadline ends the case
        let config = TesterConfig {
            timeout_ms: 50,
            backtrack_limit: usize::MAX,
        };
        let cases = [
            TestCase::positive("aa"),
            TestCase::negative(format!("{}!", "a".repeat(40))),
            TestCase::positive("aaaa"),
        ];
        let started = Instant::now();
        let result = test_regex(r"^(a+)+\1?$", &cases, Dialect::Pcre, &config).unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(result.details[1].status, CaseStatus::Timeout);
        assert!(result.details[1].elapsed >= Duration::from_millis(50));
        assert!(result.details[0].status.is_pass());
        assert!(result.details[2].status.is_pass());
        assert_eq!(result.timed_out, 1);
        assert_eq!(result.passed, 2);
    }

    #[test]
    fn test_empty_case_list() {
        let result = test_regex("a", &[], Dialect::Js, &config()).unwrap();
        assert_eq!(result.passed, 0);
        assert!(result.details.is_empty());
    }
}
