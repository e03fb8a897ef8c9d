//! Regcraft Core Library
//!
//! Build regular expressions from a typed pattern tree instead of by hand:
//! optimize the tree, emit it for the `js`, `pcre` or `re2` dialect, test it
//! against labeled inputs under a timeout, and synthesize patterns from
//! examples with a propose-test-refine loop.

pub mod captures;
pub mod config;
pub mod convert;
pub mod credentials;
pub mod dialect;
pub mod emit;
pub mod engine;
pub mod error;
pub mod library;
pub mod lint;
pub mod llm;
pub mod optimize;
pub mod pattern;
pub mod propose;
pub mod retry;
pub mod schema;
pub mod synthesis;
pub mod tester;
pub mod tools;

pub use captures::{CaptureMap, CaptureMapError, GroupInfo};
pub use config::{Limits, SynthesisConfig, TesterConfig};
pub use convert::{ConversionResult, Feature, convert_dialect, detect_features};
pub use dialect::Dialect;
pub use emit::{Emitted, emit, render};
pub use engine::CompiledPattern;
pub use error::{CompileError, Error, LlmError, OptimizeError, PatternError, ProposeError, Result};
pub use library::{LibraryDialect, LibraryEntry};
pub use lint::{LintIssue, LintRule, Severity, lint};
pub use llm::{ApiKey, CompletionClient, LlmConfig, LlmProposer, Provider};
pub use optimize::{OptimizeReport, OptimizerOptions, Pass, optimize};
pub use pattern::{
    Alternatives, AnchorKind, AssertionKind, BackrefTarget, CharClass, ClassItem, Group, GroupName, Pattern, Repeat,
    Shorthand,
};
pub use propose::{HeuristicProposer, PatternProposal, ProposalRequest, Proposer, Refinement, select_proposer};
pub use retry::{Retrier, RetryDecision, RetryPolicy, RetryState, Sleeper, ThreadSleeper, decide};
pub use schema::Node;
pub use synthesis::{RoundRecord, SynthesisError, SynthesisOutcome, Synthesizer};
pub use tester::{CaseReport, CaseStatus, TestCase, TestResult, test_regex};
pub use tools::{ToolError, Tools};

/// Optimize `tree` with default options and emit it for `dialect`
///
/// Duplicate group names and backreferences to missing groups are rejected
/// before anything is emitted.
///
/// # Example
/// ```
/// use regcraft::{Dialect, Pattern, build};
///
/// let tree = Pattern::sequence(vec![Pattern::literal("v"), Pattern::literal("1.0")]);
/// assert_eq!(build(&tree, Dialect::Js, true).unwrap().pattern, r"^v1\.0$");
/// ```
pub fn build(tree: &Pattern, dialect: Dialect, anchored: bool) -> Result<Emitted> {
    CaptureMap::collect_strict(tree)?;
    let report = optimize(tree, &OptimizerOptions::default())?;
    Ok(emit(&report.optimized, dialect, anchored))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_to_end() {
        // tree -> optimized tree -> string -> test run
        let tree = Pattern::sequence(vec![
            Pattern::named_group("area", Pattern::exactly(Pattern::digit(), 3)).unwrap(),
            Pattern::literal("-"),
            Pattern::exactly(Pattern::digit(), 4),
        ]);
        let emitted = build(&tree, Dialect::Pcre, true).unwrap();
        assert_eq!(emitted.pattern, r"^(?<area>\d{3})-\d{4}$");
        assert_eq!(emitted.captures.get("area"), Some(1));

        let cases = [TestCase::positive("555-1234").with_capture("area", "555"), TestCase::negative("5551234")];
        let result = test_regex(&emitted.pattern, &cases, Dialect::Pcre, &TesterConfig::default()).unwrap();
        assert!(result.all_passed());
    }

    #[test]
    fn test_build_rejects_dangling_backreference() {
        let tree = Pattern::sequence(vec![
            Pattern::group(Pattern::literal("a")),
            Pattern::backref_index(5).unwrap(),
        ]);
        assert_eq!(
            build(&tree, Dialect::Js, true),
            Err(Error::Captures(CaptureMapError::InvalidBackreference(5)))
        );

        let dup = Pattern::alternation(vec![
            Pattern::named_group("x", Pattern::literal("a")).unwrap(),
            Pattern::named_group("x", Pattern::literal("b")).unwrap(),
        ])
        .unwrap();
        assert!(matches!(
            build(&dup, Dialect::Pcre, false),
            Err(Error::Captures(CaptureMapError::DuplicateName(_)))
        ));
    }

    #[test]
    fn test_same_tree_every_dialect() {
        let tree = Pattern::named_group("id", Pattern::one_or_more(Pattern::word())).unwrap();
        for dialect in Dialect::ALL {
            let emitted = build(&tree, dialect, false).unwrap();
            assert!(CompiledPattern::compile(&emitted.pattern, dialect, 1_000).is_ok());
        }
    }
}
