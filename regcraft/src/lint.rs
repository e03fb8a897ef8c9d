//! Lint rules for pattern strings
//!
//! Lints are advisory text checks. They do not prove anything about
//! backtracking behavior; the tester's timeout is the only guarantee.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::convert::{Feature, detect_features};
use crate::dialect::Dialect;
use crate::engine::{CompiledPattern, DEFAULT_BACKTRACK_LIMIT};

/// How serious a lint finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Style or redundancy
    Info,
    /// Likely a mistake or a portability problem
    Warning,
    /// The pattern cannot be used as written
    Error,
}

/// The rule that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LintRule {
    /// A quantified group whose body is itself quantified, e.g. `(a+)+`
    NestedQuantifier,
    /// `.*` at the start of the pattern
    LeadingWildcard,
    /// `.*` at the end of the pattern
    TrailingWildcard,
    /// Neither end is anchored
    Unanchored,
    /// `a||b`, `(|a)`, `a|`
    EmptyAlternative,
    /// A feature the dialect does not support
    DialectGap,
    /// The pattern does not compile
    InvalidPattern,
}

impl LintRule {
    /// Kebab-case rule name
    pub fn as_str(&self) -> &'static str {
        match self {
            LintRule::NestedQuantifier => "nested-quantifier",
            LintRule::LeadingWildcard => "leading-wildcard",
            LintRule::TrailingWildcard => "trailing-wildcard",
            LintRule::Unanchored => "unanchored",
            LintRule::EmptyAlternative => "empty-alternative",
            LintRule::DialectGap => "dialect-gap",
            LintRule::InvalidPattern => "invalid-pattern",
        }
    }
}

impl fmt::Display for LintRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintIssue {
    /// Which rule fired
    pub rule: LintRule,
    /// How serious it is
    pub severity: Severity,
    /// What was found
    pub message: String,
}

impl LintIssue {
    fn new(rule: LintRule, severity: Severity, message: impl Into<String>) -> Self {
        LintIssue {
            rule,
            severity,
            message: message.into(),
        }
    }
}

struct Detectors {
    nested_quantifier: Regex,
    empty_alternative: Regex,
}

impl Detectors {
    fn build() -> Result<Self, regex::Error> {
        Ok(Detectors {
            nested_quantifier: Regex::new(r"\((?:\?:)?[^()]*[^\\()][+*}][^()]*\)(?:[+*]|\{\d+,\d*\})")?,
            empty_alternative: Regex::new(r"^\||\(\||\(\?:\||\|\||[^\\]\|\)|[^\\]\|$")?,
        })
    }
}

static DETECTORS: LazyLock<Result<Detectors, regex::Error>> = LazyLock::new(Detectors::build);

/// Check `pattern` for `dialect`, most serious findings first
pub fn lint(pattern: &str, dialect: Dialect) -> Vec<LintIssue> {
    let mut issues = Vec::new();

    if dialect == Dialect::Re2 {
        for feature in detect_features(pattern) {
            if matches!(
                feature,
                Feature::NumericBackreference
                    | Feature::NamedBackreference
                    | Feature::Lookahead
                    | Feature::Lookbehind
                    | Feature::AtomicGroup
                    | Feature::PossessiveQuantifier
            ) {
                issues.push(LintIssue::new(
                    LintRule::DialectGap,
                    Severity::Warning,
                    format!("{} are not supported by re2", feature),
                ));
            }
        }
    }

    if let Err(err) = CompiledPattern::compile(pattern, dialect, DEFAULT_BACKTRACK_LIMIT) {
        issues.push(LintIssue::new(LintRule::InvalidPattern, Severity::Error, err.message));
    }

    if let Ok(detectors) = DETECTORS.as_ref() {
        if detectors.nested_quantifier.is_match(pattern) {
            issues.push(LintIssue::new(
                LintRule::NestedQuantifier,
                Severity::Warning,
                "quantified group contains a quantifier; inputs that almost match may backtrack catastrophically",
            ));
        }
        if detectors.empty_alternative.is_match(pattern) {
            issues.push(LintIssue::new(
                LintRule::EmptyAlternative,
                Severity::Warning,
                "an alternative is empty and matches the empty string",
            ));
        }
    }

    let body = pattern.strip_prefix('^').unwrap_or(pattern);
    if body.starts_with(".*") {
        issues.push(LintIssue::new(
            LintRule::LeadingWildcard,
            Severity::Info,
            "leading '.*' only adds backtracking to an unanchored search",
        ));
    }
    let body = pattern.strip_suffix('$').unwrap_or(pattern);
    if body.ends_with(".*") && !body.ends_with("\\.*") {
        issues.push(LintIssue::new(
            LintRule::TrailingWildcard,
            Severity::Info,
            "trailing '.*' does not change whether the pattern matches",
        ));
    }

    let starts = pattern.starts_with('^') || pattern.starts_with("\\A");
    let ends = (pattern.ends_with('$') && !pattern.ends_with("\\$")) || pattern.ends_with("\\z");
    if !starts && !ends {
        issues.push(LintIssue::new(
            LintRule::Unanchored,
            Severity::Info,
            "pattern is unanchored and matches anywhere in the input",
        ));
    }

    issues.sort_by(|a, b| b.severity.cmp(&a.severity));
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(pattern: &str, dialect: Dialect) -> Vec<LintRule> {
        lint(pattern, dialect).into_iter().map(|i| i.rule).collect()
    }

    #[test]
    fn test_clean_pattern() {
        assert!(lint(r"^\d{3}-\d{4}$", Dialect::Js).is_empty());
    }

    #[test]
    fn test_nested_quantifier() {
        assert!(rules(r"^(a+)+$", Dialect::Js).contains(&LintRule::NestedQuantifier));
        assert!(rules(r"^(?:\w*\s)*$", Dialect::Pcre).contains(&LintRule::NestedQuantifier));
        assert!(!rules(r"^(ab)+$", Dialect::Js).contains(&LintRule::NestedQuantifier));
        assert!(!rules(r"^(a\+)+$", Dialect::Js).contains(&LintRule::NestedQuantifier));
    }

    #[test]
    fn test_wildcards_and_anchors() {
        assert_eq!(
            rules(".*foo.*", Dialect::Js),
            vec![LintRule::LeadingWildcard, LintRule::TrailingWildcard, LintRule::Unanchored]
        );
        assert_eq!(rules("^foo", Dialect::Js), Vec::<LintRule>::new());
        assert_eq!(rules("foo", Dialect::Re2), vec![LintRule::Unanchored]);
    }

    #[test]
    fn test_empty_alternative() {
        for pattern in ["^(a||b)$", "^(|a)$", "^(?:|a)$", "^(a|)$", "^a|", "|a"] {
            assert!(
                rules(pattern, Dialect::Js).contains(&LintRule::EmptyAlternative),
                "{}",
                pattern
            );
        }
        for pattern in [r"^(a|b)$", r"^(?:a|b)$", r"^a\|$"] {
            assert!(
                !rules(pattern, Dialect::Js).contains(&LintRule::EmptyAlternative),
                "{}",
                pattern
            );
        }
    }

    #[test]
    fn test_re2_gaps_and_invalid_pattern_come_first() {
        let issues = lint(r"^(a)\1$", Dialect::Re2);
        assert_eq!(issues[0].rule, LintRule::InvalidPattern);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues.iter().any(|i| i.rule == LintRule::DialectGap));
        assert!(lint(r"^(a)\1$", Dialect::Js).is_empty());
    }

    #[test]
    fn test_rule_names_serialize_in_kebab_case() {
        let issue = LintIssue::new(LintRule::NestedQuantifier, Severity::Warning, "x");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["rule"], "nested-quantifier");
        assert_eq!(json["severity"], "warning");
    }
}
