//! Optimizer: semantics-preserving rewrite passes over the pattern tree
//!
//! The optimizer runs a fixed, ordered pipeline of independently toggleable
//! passes until no pass changes the tree or the iteration cap is reached.
//! Passes never mutate their input; each produces a new tree, so the
//! "before" and "after" trees can be compared directly.
//!
//! Pipeline order:
//! 1. `constant-folding`: merge adjacent literals, splice nested sequences
//! 2. `quantifier-simplification`: drop `{1}` and group-free `{0}` repeats
//! 3. `char-class-merging`: union non-negated class alternatives
//! 4. `alternation-dedup`: collapse alternatives that emit identically

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::emit;
use crate::error::{OptimizeError, PatternError};
use crate::pattern::{Alternatives, CharClass, Group, Pattern};

/// Which passes to run and how long to iterate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerOptions {
    /// Merge adjacent literals
    pub constant_folding: bool,
    /// Remove trivial quantifiers
    pub quantifier_simplification: bool,
    /// Merge character-class alternatives
    pub char_class_merging: bool,
    /// Remove duplicate alternatives
    pub alternation_dedup: bool,
    /// Upper bound on full pipeline iterations
    pub max_iterations: usize,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        OptimizerOptions {
            constant_folding: true,
            quantifier_simplification: true,
            char_class_merging: true,
            alternation_dedup: true,
            max_iterations: 16,
        }
    }
}

/// One rewrite rule of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Adjacent `Literal` siblings merge into one literal
    ConstantFolding,
    /// `{1,1}` becomes its child; `{0,0}` becomes the empty sequence
    QuantifierSimplification,
    /// Non-negated class alternatives merge into one class
    CharClassMerging,
    /// Alternatives with identical renderings collapse
    AlternationDedup,
}

impl Pass {
    /// The passes in pipeline order
    pub const PIPELINE: [Pass; 4] = [
        Pass::ConstantFolding,
        Pass::QuantifierSimplification,
        Pass::CharClassMerging,
        Pass::AlternationDedup,
    ];

    /// The pass name reported in [`OptimizeReport::passes_applied`]
    pub fn name(&self) -> &'static str {
        match self {
            Pass::ConstantFolding => "constant-folding",
            Pass::QuantifierSimplification => "quantifier-simplification",
            Pass::CharClassMerging => "char-class-merging",
            Pass::AlternationDedup => "alternation-dedup",
        }
    }

    fn enabled(&self, options: &OptimizerOptions) -> bool {
        match self {
            Pass::ConstantFolding => options.constant_folding,
            Pass::QuantifierSimplification => options.quantifier_simplification,
            Pass::CharClassMerging => options.char_class_merging,
            Pass::AlternationDedup => options.alternation_dedup,
        }
    }

    /// Apply this pass once over the whole tree, bottom-up
    pub fn apply(&self, tree: &Pattern) -> Result<Pattern, OptimizeError> {
        let name = self.name();
        let rule: Rule = match self {
            Pass::ConstantFolding => fold_literals,
            Pass::QuantifierSimplification => simplify_quantifier,
            Pass::CharClassMerging => merge_classes,
            Pass::AlternationDedup => dedup_alternatives,
        };
        rewrite(tree, &rule).map_err(|source| OptimizeError::MalformedTree { pass: name, source })
    }
}

/// Outcome of [`optimize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeReport {
    /// The rewritten tree
    pub optimized: Pattern,
    /// Node count before optimization
    pub before_size: usize,
    /// Node count after optimization
    pub after_size: usize,
    /// `before_size - after_size`
    pub nodes_reduced: usize,
    /// Names of passes that changed the tree, in the order they first fired
    pub passes_applied: Vec<&'static str>,
    /// Full pipeline iterations performed
    pub iterations: usize,
}

/// Run the enabled passes to a fixpoint (or the iteration cap)
///
/// # Example
/// ```
/// use regcraft::{optimize, OptimizerOptions, Pattern};
///
/// let tree = Pattern::sequence(vec![Pattern::literal("a"), Pattern::literal("b")]);
/// let report = optimize(&tree, &OptimizerOptions::default()).unwrap();
/// assert_eq!(report.optimized, Pattern::sequence(vec![Pattern::literal("ab")]));
/// assert_eq!(report.nodes_reduced, 1);
/// ```
pub fn optimize(tree: &Pattern, options: &OptimizerOptions) -> Result<OptimizeReport, OptimizeError> {
    let before_size = tree.size();
    let mut current = tree.clone();
    let mut passes_applied: Vec<&'static str> = Vec::new();
    let mut iterations = 0;

    while iterations < options.max_iterations {
        iterations += 1;
        let mut changed = false;
        for pass in Pass::PIPELINE.iter().filter(|p| p.enabled(options)) {
            let next = pass.apply(&current)?;
            if next != current {
                trace!(pass = pass.name(), iteration = iterations, "pass fired");
                changed = true;
                current = next;
                if !passes_applied.contains(&pass.name()) {
                    passes_applied.push(pass.name());
                }
            }
        }
        if !changed {
            break;
        }
    }

    let after_size = current.size();
    debug!(
        before_size,
        after_size,
        iterations,
        passes = ?passes_applied,
        "optimization finished"
    );
    Ok(OptimizeReport {
        optimized: current,
        before_size,
        after_size,
        nodes_reduced: before_size.saturating_sub(after_size),
        passes_applied,
        iterations,
    })
}

type Rule = fn(Pattern) -> Result<Pattern, PatternError>;

/// Rebuild `tree` bottom-up, applying `rule` to every node after its children
fn rewrite(tree: &Pattern, rule: &Rule) -> Result<Pattern, PatternError> {
    let rebuilt = match tree {
        Pattern::Literal(_)
        | Pattern::Raw(_)
        | Pattern::CharClass(_)
        | Pattern::Backreference(_)
        | Pattern::Anchor(_) => tree.clone(),
        Pattern::Sequence(children) => Pattern::Sequence(
            children
                .iter()
                .map(|child| rewrite(child, rule))
                .collect::<Result<_, _>>()?,
        ),
        Pattern::Alternation(alts) => Pattern::Alternation(Alternatives::new(
            alts.children()
                .iter()
                .map(|child| rewrite(child, rule))
                .collect::<Result<_, _>>()?,
        )?),
        Pattern::Group(group) => Pattern::Group(Group {
            child: Box::new(rewrite(&group.child, rule)?),
            name: group.name.clone(),
        }),
        Pattern::NonCapturingGroup(child) => {
            Pattern::NonCapturingGroup(Box::new(rewrite(child, rule)?))
        }
        Pattern::Assertion { kind, child } => Pattern::Assertion {
            kind: *kind,
            child: Box::new(rewrite(child, rule)?),
        },
        Pattern::Quantifier(repeat) => {
            Pattern::Quantifier(repeat.with_child(rewrite(repeat.child(), rule)?))
        }
    };
    rule(rebuilt)
}

fn fold_literals(node: Pattern) -> Result<Pattern, PatternError> {
    let Pattern::Sequence(children) = node else {
        return Ok(node);
    };

    let mut spliced = Vec::with_capacity(children.len());
    for child in children {
        match child {
            Pattern::Sequence(inner) => spliced.extend(inner),
            other => spliced.push(other),
        }
    }

    let mut folded: Vec<Pattern> = Vec::with_capacity(spliced.len());
    for child in spliced {
        match child {
            Pattern::Literal(text) if text.is_empty() => {}
            Pattern::Literal(text) => match folded.last_mut() {
                Some(Pattern::Literal(prev)) => prev.push_str(&text),
                _ => folded.push(Pattern::Literal(text)),
            },
            other => folded.push(other),
        }
    }
    Ok(Pattern::Sequence(folded))
}

fn simplify_quantifier(node: Pattern) -> Result<Pattern, PatternError> {
    let Pattern::Quantifier(repeat) = node else {
        return Ok(node);
    };
    match (repeat.min(), repeat.max()) {
        (1, Some(1)) => Ok(repeat.into_child()),
        // dropping a group would renumber every later group
        (0, Some(0)) if !repeat.child().contains_group() => Ok(Pattern::empty()),
        _ => Ok(Pattern::Quantifier(repeat)),
    }
}

fn merge_classes(node: Pattern) -> Result<Pattern, PatternError> {
    let Pattern::Alternation(alts) = node else {
        return Ok(node);
    };
    let mergeable = alts
        .children()
        .iter()
        .filter(|child| matches!(child, Pattern::CharClass(class) if !class.negated()))
        .count();
    if mergeable < 2 {
        return Ok(Pattern::Alternation(alts));
    }

    let mut merged: Option<CharClass> = None;
    let mut rest = Vec::new();
    for child in alts.into_children() {
        match child {
            Pattern::CharClass(class) if !class.negated() => {
                merged = Some(match merged {
                    Some(acc) => acc.union(&class)?,
                    None => class,
                });
            }
            other => rest.push(other),
        }
    }
    if let Some(class) = merged {
        rest.push(Pattern::CharClass(class));
    }
    Pattern::alternation(rest)
}

fn dedup_alternatives(node: Pattern) -> Result<Pattern, PatternError> {
    let Pattern::Alternation(alts) = node else {
        return Ok(node);
    };
    let mut seen = HashSet::new();
    // a duplicate group still owns a group number
    let unique: Vec<Pattern> = alts
        .into_children()
        .into_iter()
        .filter(|child| child.contains_group() || seen.insert(emit::canonical(child)))
        .collect();
    Pattern::alternation(unique)
}
