//! Pattern proposers
//!
//! A proposer turns positive and negative examples (plus, after a failed
//! round, the failing test cases) into a candidate pattern tree. Two
//! implementations exist:
//! - [`HeuristicProposer`]: deterministic, derives candidates from the shape
//!   of the examples and never performs I/O
//! - [`LlmProposer`](crate::llm::LlmProposer): asks a language model
//!
//! [`select_proposer`] falls back to the heuristic proposer whenever the
//! model-backed one is unavailable.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::dialect::Dialect;
use crate::emit::emit;
use crate::engine::{CompiledPattern, DEFAULT_BACKTRACK_LIMIT};
use crate::error::ProposeError;
use crate::pattern::{ClassItem, Pattern, Shorthand};
use crate::tester::CaseReport;

/// A candidate pattern with the proposer's explanation
#[derive(Debug, Clone, PartialEq)]
pub struct PatternProposal {
    /// The proposed tree
    pub pattern: Pattern,
    /// Why the proposer chose it
    pub reasoning: String,
    /// Self-reported confidence in `[0, 1]`
    pub confidence: f64,
}

impl PatternProposal {
    /// Build a proposal, clamping `confidence` into `[0, 1]`
    pub fn new(pattern: Pattern, reasoning: impl Into<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        PatternProposal {
            pattern,
            reasoning: reasoning.into(),
            confidence,
        }
    }
}

/// Feedback from the previous round
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    /// The round that failed (1-based)
    pub iteration: usize,
    /// The emitted pattern that failed
    pub previous_pattern: String,
    /// Reports of the cases it failed
    pub failures: Vec<CaseReport>,
    /// Every emitted pattern tried so far, oldest first
    pub tried: Vec<String>,
}

/// What a proposer is asked for
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalRequest {
    /// Inputs the pattern must match
    pub positives: Vec<String>,
    /// Inputs the pattern must not match
    pub negatives: Vec<String>,
    /// Dialect the proposal will be emitted and tested in
    pub dialect: Dialect,
    /// Whether the proposal will be anchored at both ends
    pub anchored: bool,
    /// Present from the second round on
    pub refinement: Option<Refinement>,
}

impl ProposalRequest {
    /// A first-round request for an anchored `js` pattern
    pub fn new(positives: Vec<String>, negatives: Vec<String>) -> Self {
        ProposalRequest {
            positives,
            negatives,
            dialect: Dialect::Js,
            anchored: true,
            refinement: None,
        }
    }

    /// Target `dialect`, anchored or not
    pub fn with_target(mut self, dialect: Dialect, anchored: bool) -> Self {
        self.dialect = dialect;
        self.anchored = anchored;
        self
    }
}

impl Default for ProposalRequest {
    fn default() -> Self {
        ProposalRequest::new(Vec::new(), Vec::new())
    }
}

/// Something that proposes patterns from examples
pub trait Proposer {
    /// Short identifier for logs and reports
    fn name(&self) -> &str;

    /// Propose a pattern for `request`
    fn propose(&self, request: &ProposalRequest) -> Result<PatternProposal, ProposeError>;

    /// Whether the proposer can currently be used
    fn is_available(&self) -> bool {
        true
    }
}

/// Use `preferred` when it is available, otherwise `fallback`
pub fn select_proposer<'a>(preferred: Option<&'a dyn Proposer>, fallback: &'a dyn Proposer) -> &'a dyn Proposer {
    match preferred {
        Some(proposer) if proposer.is_available() => {
            info!(proposer = proposer.name(), "using preferred proposer");
            proposer
        }
        Some(proposer) => {
            info!(
                unavailable = proposer.name(),
                fallback = fallback.name(),
                "preferred proposer unavailable, falling back"
            );
            fallback
        }
        None => fallback,
    }
}

/// Character categories used to describe the shape of an example
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Digit,
    Lower,
    Upper,
    Space,
    Other(char),
}

impl Category {
    fn of(c: char) -> Self {
        match c {
            '0'..='9' => Category::Digit,
            'a'..='z' => Category::Lower,
            'A'..='Z' => Category::Upper,
            c if c.is_whitespace() => Category::Space,
            c => Category::Other(c),
        }
    }

    fn atom(&self) -> Pattern {
        match self {
            Category::Digit => Pattern::digit(),
            Category::Lower => Pattern::range('a', 'z'),
            Category::Upper => Pattern::range('A', 'Z'),
            Category::Space => Pattern::whitespace(),
            Category::Other(c) => Pattern::literal(c.to_string()),
        }
    }
}

/// A maximal run of one category
type Run = (Category, usize);

fn shape(example: &str) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for c in example.chars() {
        let category = Category::of(c);
        match runs.last_mut() {
            Some((last, count)) if *last == category => *count += 1,
            _ => runs.push((category, 1)),
        }
    }
    runs
}

/// The common category sequence with per-run length bounds, if all examples share one
fn common_shape(examples: &[String]) -> Option<Vec<(Category, usize, usize)>> {
    let mut shapes = examples.iter().map(|e| shape(e));
    let first = shapes.next()?;
    if first.is_empty() {
        return None;
    }
    let mut bounds: Vec<(Category, usize, usize)> = first.iter().map(|(c, n)| (*c, *n, *n)).collect();
    for other in shapes {
        if other.len() != bounds.len() {
            return None;
        }
        for ((category, min, max), (c, n)) in bounds.iter_mut().zip(other) {
            if *category != c {
                return None;
            }
            *min = (*min).min(n);
            *max = (*max).max(n);
        }
    }
    Some(bounds)
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Deterministic proposer that generalizes the shape of the positive examples
///
/// Candidates, in order of preference:
/// 1. one character class per run, each repeated with `+` (`[a-z]+-\d+`)
/// 2. the same shape with the observed run lengths (`[a-z]{3}-\d{2,4}`)
/// 3. one broad class covering every example character (`\w+`)
/// 4. an alternation of the literal positives
///
/// Candidates already tried in earlier rounds, or that match a negative
/// example, are skipped. Both checks use the dialect and anchoring named in
/// the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicProposer;

impl HeuristicProposer {
    fn candidates(&self, positives: &[String]) -> Vec<(Pattern, &'static str, f64)> {
        let mut out = Vec::new();
        if let Some(bounds) = common_shape(positives) {
            let loose = bounds
                .iter()
                .map(|(category, min, max)| match category {
                    Category::Other(_) if *min == 1 && *max == 1 => category.atom(),
                    _ => Pattern::one_or_more(category.atom()),
                })
                .collect();
            out.push((
                Pattern::sequence(loose),
                "every positive shares one character-class shape; each run may repeat",
                0.7,
            ));

            let exact: Vec<Pattern> = bounds
                .iter()
                .map(|(category, min, max)| {
                    let atom = category.atom();
                    match (min, max) {
                        (1, 1) => atom,
                        (n, m) if n == m => Pattern::exactly(atom, count(*n)),
                        (n, m) => Pattern::repeat(atom.clone(), count(*n), Some(count(*m)), false)
                            .unwrap_or_else(|_| Pattern::one_or_more(atom)),
                    }
                })
                .collect();
            out.push((
                Pattern::sequence(exact),
                "every positive shares one shape; run lengths follow the examples",
                0.6,
            ));
        }

        if let Some(broad) = broad_class(positives) {
            out.push((
                Pattern::one_or_more(broad),
                "one character class covering every character seen in the positives",
                0.4,
            ));
        }

        let distinct: BTreeSet<&str> = positives.iter().map(String::as_str).collect();
        let literals: Vec<Pattern> = distinct.into_iter().map(Pattern::literal).collect();
        if let Ok(alternation) = Pattern::alternation(literals) {
            out.push((alternation, "the positives, listed literally", 0.3));
        }
        out
    }

    fn emitted(&self, tree: &Pattern, request: &ProposalRequest) -> String {
        emit(tree, request.dialect, request.anchored).pattern
    }

    fn matches_negative(&self, pattern: &str, request: &ProposalRequest) -> bool {
        let Ok(compiled) = CompiledPattern::compile(pattern, request.dialect, DEFAULT_BACKTRACK_LIMIT) else {
            return true;
        };
        request
            .negatives
            .iter()
            .any(|negative| compiled.is_match(negative).unwrap_or(true))
    }
}

fn broad_class(positives: &[String]) -> Option<Pattern> {
    let mut items = Vec::new();
    let mut any = false;
    for c in positives.iter().flat_map(|p| p.chars()) {
        any = true;
        if c.is_ascii_alphanumeric() || c == '_' {
            items.push(ClassItem::Shorthand(Shorthand::Word));
        } else if c.is_whitespace() {
            items.push(ClassItem::Shorthand(Shorthand::Space));
        } else {
            items.push(ClassItem::Char(c));
        }
    }
    if !any {
        return None;
    }
    Pattern::char_class(items, false).ok()
}

impl Proposer for HeuristicProposer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn propose(&self, request: &ProposalRequest) -> Result<PatternProposal, ProposeError> {
        let tried: &[String] = request
            .refinement
            .as_ref()
            .map(|r| r.tried.as_slice())
            .unwrap_or(&[]);

        let candidates = self.candidates(&request.positives);
        let mut last = None;
        for (rank, (tree, reasoning, confidence)) in candidates.into_iter().enumerate() {
            let pattern = self.emitted(&tree, request);
            if tried.contains(&pattern) {
                debug!(rank, %pattern, "skipping candidate already tried");
            } else if self.matches_negative(&pattern, request) {
                debug!(rank, %pattern, "skipping candidate that matches a negative");
            } else {
                return Ok(PatternProposal::new(tree, reasoning, confidence));
            }
            last = Some(tree);
        }

        Ok(PatternProposal::new(
            last.unwrap_or_else(Pattern::empty),
            "no untried candidate avoids every negative; repeating the literal positives",
            0.1,
        ))
    }
}
