//! Synthesis loop: propose, test, refine
//!
//! Each round asks a [`Proposer`] for a tree, optimizes it, emits it for the
//! configured dialect and tests it against the examples (positives first,
//! then negatives). A round that passes every case ends the loop. A round
//! that fails (including one whose pattern does not compile) feeds its
//! failing cases back into the next proposal. A proposer error ends the loop
//! at once, keeping the rounds recorded so far.

use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::SynthesisConfig;
use crate::emit::{Emitted, emit};
use crate::error::{CompileError, Error, ProposeError};
use crate::optimize::{OptimizerOptions, optimize};
use crate::propose::{PatternProposal, ProposalRequest, Proposer, Refinement};
use crate::tester::{CaseReport, CaseStatus, TestCase, test_regex};

/// One proposal round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRecord {
    /// 1-based round number
    pub iteration: usize,
    /// Name of the proposer that produced the pattern
    pub proposer: String,
    /// The proposal as returned
    pub proposal: PatternProposal,
    /// The optimized, emitted pattern that was tested
    pub pattern: String,
    /// Cases that passed
    pub passed: usize,
    /// Cases that failed
    pub failed: usize,
    /// Reports of the failing cases
    pub failures: Vec<CaseReport>,
    /// Set when the emitted pattern did not compile
    pub compile_error: Option<CompileError>,
}

impl RoundRecord {
    /// Whether every case passed
    pub fn succeeded(&self) -> bool {
        self.failed == 0 && self.compile_error.is_none()
    }
}

/// Result of a synthesis run
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutcome {
    /// Whether some round passed every case
    pub success: bool,
    /// The passing pattern, or the best failing one
    pub pattern: Option<Emitted>,
    /// The proposal behind `pattern`
    pub proposal: Option<PatternProposal>,
    /// Rounds performed
    pub iterations: usize,
    /// Every round, in order
    pub history: Vec<RoundRecord>,
}

/// Why a synthesis run stopped without an outcome
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthesisError {
    /// Examples or configuration were rejected before the first round
    #[error("invalid synthesis input: {0}")]
    Input(#[from] Error),

    /// The proposer failed; earlier rounds are kept
    #[error("proposer '{proposer}' failed in round {iteration}: {source}")]
    Proposal {
        /// Proposer name
        proposer: String,
        /// The round that failed
        iteration: usize,
        /// The proposer's error
        source: ProposeError,
        /// Rounds completed before the failure
        history: Vec<RoundRecord>,
    },
}

/// Drives the propose-test-refine loop
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SynthesisConfig,
    optimizer: OptimizerOptions,
}

impl Synthesizer {
    /// A synthesizer with default optimizer options
    pub fn new(config: SynthesisConfig) -> Self {
        Synthesizer {
            config,
            optimizer: OptimizerOptions::default(),
        }
    }

    /// Replace the optimizer options applied to each proposal
    pub fn with_optimizer(mut self, optimizer: OptimizerOptions) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// The active configuration
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Search for a pattern matching every positive and no negative
    ///
    /// # Example
    /// ```
    /// use regcraft::{HeuristicProposer, SynthesisConfig, Synthesizer};
    ///
    /// let positives = vec!["123".to_string(), "456".to_string()];
    /// let negatives = vec!["abc".to_string()];
    /// let outcome = Synthesizer::new(SynthesisConfig::default())
    ///     .run(&positives, &negatives, &HeuristicProposer::default())
    ///     .unwrap();
    /// assert!(outcome.success);
    /// assert_eq!(outcome.pattern.unwrap().pattern, r"^\d+$");
    /// ```
    pub fn run(
        &self,
        positives: &[String],
        negatives: &[String],
        proposer: &dyn Proposer,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        self.config.validate()?;
        if positives.is_empty() {
            return Err(Error::InvalidParameter {
                parameter: "positive".to_string(),
                reason: "at least one positive example is required".to_string(),
            }
            .into());
        }

        let cases: Vec<TestCase> = positives
            .iter()
            .map(|p| TestCase::positive(p.as_str()))
            .chain(negatives.iter().map(|n| TestCase::negative(n.as_str())))
            .collect();
        let mut request = ProposalRequest::new(positives.to_vec(), negatives.to_vec())
            .with_target(self.config.dialect, self.config.anchored);
        let mut history: Vec<RoundRecord> = Vec::new();
        let mut tried: Vec<String> = Vec::new();
        let mut best: Option<(usize, Emitted, PatternProposal)> = None;

        for iteration in 1..=self.config.max_iterations {
            let proposal = match proposer.propose(&request) {
                Ok(proposal) => proposal,
                Err(source) => {
                    warn!(iteration, proposer = proposer.name(), error = %source, "proposal failed");
                    return Err(SynthesisError::Proposal {
                        proposer: proposer.name().to_string(),
                        iteration,
                        source,
                        history,
                    });
                }
            };

            let tree = match optimize(&proposal.pattern, &self.optimizer) {
                Ok(report) => report.optimized,
                Err(err) => {
                    warn!(iteration, error = %err, "optimization failed; testing the proposal as given");
                    proposal.pattern.clone()
                }
            };
            let emitted = emit(&tree, self.config.dialect, self.config.anchored);
            let record = self.test_round(iteration, proposer.name(), &proposal, &emitted, &cases);
            info!(
                iteration,
                pattern = %record.pattern,
                passed = record.passed,
                failed = record.failed,
                "synthesis round finished"
            );

            let succeeded = record.succeeded();
            let passed = record.passed;
            tried.push(emitted.pattern.clone());
            request.refinement = Some(Refinement {
                iteration,
                previous_pattern: emitted.pattern.clone(),
                failures: record.failures.clone(),
                tried: tried.clone(),
            });
            history.push(record);

            if succeeded {
                return Ok(SynthesisOutcome {
                    success: true,
                    pattern: Some(emitted),
                    proposal: Some(proposal),
                    iterations: iteration,
                    history,
                });
            }
            if best.as_ref().is_none_or(|(most, _, _)| passed > *most) {
                best = Some((passed, emitted, proposal));
            }
        }

        let iterations = history.len();
        let (pattern, proposal) = match best {
            Some((_, emitted, proposal)) => (Some(emitted), Some(proposal)),
            None => (None, None),
        };
        Ok(SynthesisOutcome {
            success: false,
            pattern,
            proposal,
            iterations,
            history,
        })
    }

    fn test_round(
        &self,
        iteration: usize,
        proposer: &str,
        proposal: &PatternProposal,
        emitted: &Emitted,
        cases: &[TestCase],
    ) -> RoundRecord {
        match test_regex(&emitted.pattern, cases, self.config.dialect, &self.config.tester) {
            Ok(result) => RoundRecord {
                iteration,
                proposer: proposer.to_string(),
                proposal: proposal.clone(),
                pattern: emitted.pattern.clone(),
                passed: result.passed,
                failed: result.failed,
                failures: result.failures().cloned().collect(),
                compile_error: None,
            },
            Err(err) => {
                warn!(iteration, error = %err, "proposed pattern does not compile");
                let failures = cases
                    .iter()
                    .enumerate()
                    .map(|(index, case)| CaseReport {
                        index,
                        input: case.input.clone(),
                        should_match: case.should_match,
                        status: CaseStatus::Error {
                            message: err.message.clone(),
                        },
                        captures: None,
                        elapsed: Duration::ZERO,
                    })
                    .collect();
                RoundRecord {
                    iteration,
                    proposer: proposer.to_string(),
                    proposal: proposal.clone(),
                    pattern: emitted.pattern.clone(),
                    passed: 0,
                    failed: cases.len(),
                    failures,
                    compile_error: Some(err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::error::LlmError;
    use crate::pattern::Pattern;
    use crate::propose::HeuristicProposer;
    use std::cell::RefCell;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Replays a fixed list of trees and records what it was asked
    struct Script {
        trees: RefCell<Vec<Pattern>>,
        requests: RefCell<Vec<ProposalRequest>>,
    }

    impl Script {
        fn new(mut trees: Vec<Pattern>) -> Self {
            trees.reverse();
            Script {
                trees: RefCell::new(trees),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl Proposer for Script {
        fn name(&self) -> &str {
            "script"
        }

        fn propose(&self, request: &ProposalRequest) -> Result<PatternProposal, ProposeError> {
            self.requests.borrow_mut().push(request.clone());
            self.trees
                .borrow_mut()
                .pop()
                .map(|tree| PatternProposal::new(tree, "scripted", 0.5))
                .ok_or_else(|| LlmError::Call("out of proposals".to_string()).into())
        }
    }

    #[test]
    fn test_converges_on_digits() {
        let outcome = Synthesizer::new(SynthesisConfig::default())
            .run(&strings(&["123", "456"]), &strings(&["abc"]), &HeuristicProposer::default())
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.pattern.unwrap().pattern, r"^\d+$");
    }

    #[test]
    fn test_refinement_carries_failures() {
        let script = Script::new(vec![
            Pattern::one_or_more(Pattern::word()),
            Pattern::one_or_more(Pattern::digit()),
        ]);
        let outcome = Synthesizer::new(SynthesisConfig::default())
            .run(&strings(&["123"]), &strings(&["abc"]), &script)
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.iterations, 2);
        assert!(!outcome.history[0].succeeded());

        let requests = script.requests.borrow();
        assert!(requests[0].refinement.is_none());
        let refinement = requests[1].refinement.as_ref().unwrap();
        assert_eq!(refinement.iteration, 1);
        assert_eq!(refinement.previous_pattern, r"^\w+$");
        assert_eq!(refinement.failures.len(), 1);
        assert_eq!(refinement.failures[0].input, "abc");
    }

    #[test]
    fn test_compile_failure_is_fed_back() {
        let script = Script::new(vec![Pattern::raw("(unclosed"), Pattern::one_or_more(Pattern::digit())]);
        let outcome = Synthesizer::new(SynthesisConfig::default())
            .run(&strings(&["1"]), &[], &script)
            .unwrap();
        assert!(outcome.success);
        let first = &outcome.history[0];
        assert!(first.compile_error.is_some());
        assert_eq!(first.failed, 1);
        assert!(matches!(first.failures[0].status, CaseStatus::Error { .. }));
    }

    #[test]
    fn test_proposer_error_keeps_history() {
        let script = Script::new(vec![Pattern::literal("nope")]);
        let err = Synthesizer::new(SynthesisConfig::default())
            .run(&strings(&["123"]), &[], &script)
            .unwrap_err();
        let SynthesisError::Proposal {
            iteration, history, ..
        } = err
        else {
            panic!("expected a proposal error");
        };
        assert_eq!(iteration, 2);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_exhausted_budget_reports_best_round() {
        let script = Script::new(vec![
            Pattern::literal("x"),
            Pattern::literal("12"),
            Pattern::literal("y"),
        ]);
        let config = SynthesisConfig {
            dialect: Dialect::Re2,
            ..SynthesisConfig::default()
        };
        let outcome = Synthesizer::new(config)
            .run(&strings(&["12", "34"]), &[], &script)
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.pattern.unwrap().pattern, "^12$");
    }

    #[test]
    fn test_requests_name_the_configured_target() {
        let script = Script::new(vec![Pattern::literal("x"), Pattern::literal("12")]);
        let config = SynthesisConfig {
            dialect: Dialect::Re2,
            anchored: false,
            ..SynthesisConfig::default()
        };
        Synthesizer::new(config)
            .run(&strings(&["12"]), &[], &script)
            .unwrap();
        let requests = script.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.dialect == Dialect::Re2 && !r.anchored));
    }

    #[test]
    fn test_unanchored_synthesis_avoids_substring_negatives() {
        let config = SynthesisConfig {
            anchored: false,
            ..SynthesisConfig::default()
        };
        let outcome = Synthesizer::new(config)
            .run(&strings(&["ab-12", "cd-34"]), &strings(&["abcdef-123456"]), &HeuristicProposer)
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_rejects_empty_positives() {
        let err = Synthesizer::default()
            .run(&[], &strings(&["a"]), &HeuristicProposer::default())
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Input(Error::InvalidParameter { .. })));
    }
}
