//! Tool surface: validating adapters over the core components
//!
//! Each operation takes a serde request, checks it against [`Limits`], and
//! delegates to the core. Rejected input is a [`ToolError::InvalidParameter`];
//! anything that goes wrong after validation is a [`ToolError::Execution`].
//! Transport (a remote-procedure layer, a CLI) is left to the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::captures::CaptureMap;
use crate::config::{Limits, SynthesisConfig, TesterConfig, check_timeout};
use crate::convert::{ConversionResult, convert_dialect};
use crate::dialect::Dialect;
use crate::emit::emit;
use crate::error::Error;
use crate::library::{self, LibraryDialect};
use crate::lint::{LintIssue, lint};
use crate::optimize::{OptimizerOptions, optimize};
use crate::propose::Proposer;
use crate::schema::Node;
use crate::synthesis::{SynthesisError, Synthesizer};
use crate::tester::{TestCase, TestResult, test_regex};

/// Error returned by every tool operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// The request was rejected before any work was done
    #[error("invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the offending field
        parameter: String,
        /// Why it was rejected
        reason: String,
    },

    /// The core failed while handling a valid request
    #[error(transparent)]
    Execution(Error),
}

impl From<Error> for ToolError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidParameter { parameter, reason } => ToolError::InvalidParameter { parameter, reason },
            other => ToolError::Execution(other),
        }
    }
}

impl From<SynthesisError> for ToolError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::Input(err) => err.into(),
            SynthesisError::Proposal { source, .. } => ToolError::Execution(Error::Propose(source)),
        }
    }
}

fn invalid(parameter: &str, reason: impl Into<String>) -> ToolError {
    ToolError::InvalidParameter {
        parameter: parameter.to_string(),
        reason: reason.into(),
    }
}

/// Build a pattern from a tree
#[derive(Debug, Clone, Deserialize)]
pub struct BuildRequest {
    pub tree: Node,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub anchored: bool,
}

/// An emitted pattern and its capture map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResponse {
    pub pattern: String,
    pub dialect: Dialect,
    pub captures: BTreeMap<String, u32>,
}

/// Optimize a tree and emit the result
#[derive(Debug, Clone, Deserialize)]
pub struct OptimizeRequest {
    pub tree: Node,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub options: OptimizerOptions,
}

/// Before/after view of an optimization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizeResponse {
    pub original: String,
    pub pattern: String,
    pub tree: Node,
    pub before_size: usize,
    pub after_size: usize,
    pub nodes_reduced: usize,
    pub passes_applied: Vec<String>,
}

/// Run a pattern against test cases
#[derive(Debug, Clone, Deserialize)]
pub struct TestRequest {
    pub pattern: String,
    pub cases: Vec<TestCase>,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Convert a pattern string between dialects
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertRequest {
    pub pattern: String,
    pub from: Dialect,
    pub to: Dialect,
    #[serde(default)]
    pub allow_downgrades: bool,
}

/// Lint a pattern string
#[derive(Debug, Clone, Deserialize)]
pub struct LintRequest {
    pub pattern: String,
    #[serde(default)]
    pub dialect: Dialect,
}

/// Lint findings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintResponse {
    pub issues: Vec<LintIssue>,
}

/// Synthesize a pattern from examples
#[derive(Debug, Clone, Deserialize)]
pub struct ProposeRequest {
    pub positive: Vec<String>,
    #[serde(default)]
    pub negative: Vec<String>,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

/// Summary of one synthesis round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSummary {
    pub iteration: usize,
    pub pattern: String,
    pub passed: usize,
    pub failed: usize,
}

/// Outcome of a synthesis run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposeResponse {
    pub success: bool,
    pub pattern: Option<String>,
    pub reasoning: Option<String>,
    pub confidence: Option<f64>,
    pub iterations: usize,
    pub rounds: Vec<RoundSummary>,
}

/// Browse the standard library
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub dialect: Option<Dialect>,
}

/// One library entry with its emitted pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryItem {
    pub name: String,
    pub description: String,
    pub examples: Vec<String>,
    pub dialect: LibraryDialect,
    pub pattern: String,
}

/// The tool operations, sharing one set of limits
#[derive(Debug, Clone, Default)]
pub struct Tools {
    limits: Limits,
}

impl Tools {
    /// Tools enforcing `limits`
    pub fn new(limits: Limits) -> Self {
        Tools { limits }
    }

    /// Emit a tree
    pub fn build(&self, request: BuildRequest) -> Result<BuildResponse, ToolError> {
        let tree = request
            .tree
            .to_pattern()
            .map_err(|e| invalid("tree", e.to_string()))?;
        CaptureMap::collect_strict(&tree).map_err(|e| invalid("tree", e.to_string()))?;
        let emitted = emit(&tree, request.dialect, request.anchored);
        self.limits.check_pattern(&emitted.pattern)?;
        Ok(BuildResponse {
            captures: emitted
                .captures
                .entries()
                .map(|(key, index)| (key.to_string(), index))
                .collect(),
            pattern: emitted.pattern,
            dialect: emitted.dialect,
        })
    }

    /// Optimize a tree
    pub fn optimize(&self, request: OptimizeRequest) -> Result<OptimizeResponse, ToolError> {
        let tree = request
            .tree
            .to_pattern()
            .map_err(|e| invalid("tree", e.to_string()))?;
        CaptureMap::collect_strict(&tree).map_err(|e| invalid("tree", e.to_string()))?;
        if request.options.max_iterations == 0 {
            return Err(invalid("options.max_iterations", "must be at least 1"));
        }
        let original = emit(&tree, request.dialect, false).pattern;
        self.limits.check_pattern(&original)?;
        let report = optimize(&tree, &request.options).map_err(Error::from)?;
        Ok(OptimizeResponse {
            original,
            pattern: emit(&report.optimized, request.dialect, false).pattern,
            tree: Node::from_pattern(&report.optimized),
            before_size: report.before_size,
            after_size: report.after_size,
            nodes_reduced: report.nodes_reduced,
            passes_applied: report.passes_applied.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Test a pattern
    pub fn test(&self, request: TestRequest) -> Result<TestResult, ToolError> {
        self.limits.check_pattern(&request.pattern)?;
        self.limits.check_test_cases(request.cases.len())?;
        let config = match request.timeout_ms {
            Some(timeout_ms) => {
                check_timeout(timeout_ms)?;
                TesterConfig::with_timeout_ms(timeout_ms)
            }
            None => TesterConfig::default(),
        };
        debug!(dialect = %request.dialect, cases = request.cases.len(), "tool: test");
        test_regex(&request.pattern, &request.cases, request.dialect, &config)
            .map_err(|e| ToolError::Execution(e.into()))
    }

    /// Convert a pattern between dialects
    pub fn convert(&self, request: ConvertRequest) -> Result<ConversionResult, ToolError> {
        self.limits.check_pattern(&request.pattern)?;
        Ok(convert_dialect(
            &request.pattern,
            request.from,
            request.to,
            request.allow_downgrades,
        ))
    }

    /// Lint a pattern
    pub fn lint(&self, request: LintRequest) -> Result<LintResponse, ToolError> {
        self.limits.check_pattern(&request.pattern)?;
        Ok(LintResponse {
            issues: lint(&request.pattern, request.dialect),
        })
    }

    /// Synthesize a pattern with `proposer`
    pub fn propose(&self, request: ProposeRequest, proposer: &dyn Proposer) -> Result<ProposeResponse, ToolError> {
        self.limits
            .check_examples(request.positive.len(), request.negative.len())?;
        let mut config = SynthesisConfig {
            dialect: request.dialect,
            ..SynthesisConfig::default()
        };
        if let Some(max_iterations) = request.max_iterations {
            self.limits.check_iterations(max_iterations)?;
            config.max_iterations = max_iterations;
        }

        let outcome = Synthesizer::new(config).run(&request.positive, &request.negative, proposer)?;
        Ok(ProposeResponse {
            success: outcome.success,
            pattern: outcome.pattern.map(|e| e.pattern),
            reasoning: outcome.proposal.as_ref().map(|p| p.reasoning.clone()),
            confidence: outcome.proposal.as_ref().map(|p| p.confidence),
            iterations: outcome.iterations,
            rounds: outcome
                .history
                .iter()
                .map(|round| RoundSummary {
                    iteration: round.iteration,
                    pattern: round.pattern.clone(),
                    passed: round.passed,
                    failed: round.failed,
                })
                .collect(),
        })
    }

    /// List library entries
    pub fn list(&self, request: ListRequest) -> Result<Vec<LibraryItem>, ToolError> {
        let query = request.query.as_deref().unwrap_or("");
        library::search(query, request.dialect)
            .into_iter()
            .map(|entry| -> Result<LibraryItem, ToolError> {
                let tree = entry.pattern().map_err(Error::from)?;
                let dialect = request.dialect.unwrap_or(match entry.dialect {
                    LibraryDialect::Re2 => Dialect::Re2,
                    LibraryDialect::Backtracking | LibraryDialect::Universal => Dialect::Js,
                });
                Ok(LibraryItem {
                    name: entry.name.to_string(),
                    description: entry.description.to_string(),
                    examples: entry.examples.iter().map(|e| e.to_string()).collect(),
                    dialect: entry.dialect,
                    pattern: emit(&tree, dialect, true).pattern,
                })
            })
            .collect()
    }
}
