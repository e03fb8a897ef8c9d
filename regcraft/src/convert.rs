//! Dialect converter for opaque pattern strings
//!
//! This module converts patterns that did not come from a [`Pattern`] tree
//! between dialects. It works on the text itself:
//! - Features are detected by matching fixed regexes against the pattern text
//! - Conversion to `re2` strips unsupported features when downgrades are allowed
//! - Conversion to `js` or `pcre` is advisory only (notes and warnings)
//!
//! Downgrades are lossy. Removing a look-around keeps the pattern valid but
//! changes which inputs it accepts, so a successful conversion is best
//! effort, never an equivalence.
//!
//! [`Pattern`]: crate::pattern::Pattern

use std::fmt;
use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use serde::Serialize;
use tracing::debug;

use crate::dialect::Dialect;
use crate::engine::{CompiledPattern, DEFAULT_BACKTRACK_LIMIT};
use crate::error::{Error, Result};

/// A syntax feature detected in a pattern string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// `(?<name>...)` or `(?P<name>...)`
    NamedGroup,
    /// `(?P<name>...)` or `(?P=name)` spelling
    PythonStyleName,
    /// `\1` .. `\9`
    NumericBackreference,
    /// `\k<name>` or `(?P=name)`
    NamedBackreference,
    /// `(?=...)` or `(?!...)`
    Lookahead,
    /// `(?<=...)` or `(?<!...)`
    Lookbehind,
    /// `(?>...)`
    AtomicGroup,
    /// `a++`, `a*+`, `a?+`, `a{n}+`
    PossessiveQuantifier,
    /// `(?i)` or `(?i:...)`
    InlineFlags,
    /// `\A`, `\Z`, `\z`
    StringAnchor,
    /// `\p{...}` or `\P{...}`
    UnicodeProperty,
}

impl Feature {
    /// Human-readable feature name
    pub fn description(&self) -> &'static str {
        match self {
            Feature::NamedGroup => "named groups",
            Feature::PythonStyleName => "(?P<name>) group syntax",
            Feature::NumericBackreference => "numeric backreferences",
            Feature::NamedBackreference => "named backreferences",
            Feature::Lookahead => "lookahead",
            Feature::Lookbehind => "lookbehind",
            Feature::AtomicGroup => "atomic groups",
            Feature::PossessiveQuantifier => "possessive quantifiers",
            Feature::InlineFlags => "inline flags",
            Feature::StringAnchor => "string anchors (\\A, \\Z)",
            Feature::UnicodeProperty => "unicode property classes",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

const DETECTOR_SOURCES: &[(Feature, &str)] = &[
    (Feature::NamedGroup, r"\(\?P?<[A-Za-z_]\w*>"),
    (Feature::PythonStyleName, r"\(\?P[<=]"),
    (Feature::NumericBackreference, r"\\[1-9]"),
    (Feature::NamedBackreference, r"\\k<[A-Za-z_]\w*>|\(\?P=[A-Za-z_]\w*\)"),
    (Feature::Lookahead, r"\(\?[=!]"),
    (Feature::Lookbehind, r"\(\?<[=!]"),
    (Feature::AtomicGroup, r"\(\?>"),
    (Feature::PossessiveQuantifier, r"[*+?}]\+"),
    (Feature::InlineFlags, r"\(\?[imsxU-]+[:)]"),
    (Feature::StringAnchor, r"\\[AZz]"),
    (Feature::UnicodeProperty, r"\\[pP]\{"),
];

struct Rewriter {
    detectors: Vec<(Feature, Regex)>,
    named_group: Regex,
    backreference: Regex,
    lookaround: Regex,
    lookaround_open: Regex,
}

impl Rewriter {
    fn build() -> std::result::Result<Self, regex::Error> {
        let detectors = DETECTOR_SOURCES
            .iter()
            .map(|(feature, source)| Regex::new(source).map(|re| (*feature, re)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Rewriter {
            detectors,
            named_group: Regex::new(r"\(\?P?<[A-Za-z_]\w*>")?,
            backreference: Regex::new(r"\\[1-9]\d*|\\k<[A-Za-z_]\w*>|\(\?P=[A-Za-z_]\w*\)")?,
            // innermost assertions only; the scan does not track nesting
            lookaround: Regex::new(r"\(\?<?[=!][^()]*\)")?,
            lookaround_open: Regex::new(r"\(\?<?[=!]")?,
        })
    }

    fn detect(&self, pattern: &str) -> Vec<Feature> {
        self.detectors
            .iter()
            .filter(|(_, re)| re.is_match(pattern))
            .map(|(feature, _)| *feature)
            .collect()
    }
}

static REWRITER: LazyLock<std::result::Result<Rewriter, regex::Error>> = LazyLock::new(Rewriter::build);

/// Features detected in `pattern`, in detector order
pub fn detect_features(pattern: &str) -> Vec<Feature> {
    match REWRITER.as_ref() {
        Ok(rewriter) => rewriter.detect(pattern),
        Err(_) => Vec::new(),
    }
}

/// Outcome of a dialect conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    /// The converted pattern (the input when nothing was rewritten)
    pub pattern: String,
    /// Source dialect
    pub from: Dialect,
    /// Target dialect
    pub to: Dialect,
    /// Whether the converted pattern may be used in the target dialect
    pub success: bool,
    /// Whether `pattern` differs from the input
    pub changed: bool,
    /// Informational remarks
    pub notes: Vec<String>,
    /// Gaps worth a manual review
    pub warnings: Vec<String>,
    /// Blocking problems
    pub incompatibilities: Vec<String>,
}

impl ConversionResult {
    fn unchanged(pattern: &str, from: Dialect, to: Dialect) -> Self {
        ConversionResult {
            pattern: pattern.to_string(),
            from,
            to,
            success: true,
            changed: false,
            notes: Vec::new(),
            warnings: Vec::new(),
            incompatibilities: Vec::new(),
        }
    }

    /// The converted pattern, or a validation error naming the first blocking problem
    pub fn into_pattern(self) -> Result<String> {
        if self.success {
            return Ok(self.pattern);
        }
        Err(Error::Validation {
            feature: self
                .incompatibilities
                .into_iter()
                .next()
                .unwrap_or_else(|| "conversion".to_string()),
            from: self.from,
            to: self.to,
        })
    }
}

/// Convert `pattern` from one dialect to another
///
/// # Example
/// ```
/// use regcraft::{convert_dialect, Dialect};
///
/// let result = convert_dialect(r"(?<year>\d{4})-\1", Dialect::Js, Dialect::Re2, true);
/// assert!(result.success);
/// assert_eq!(result.pattern, r"(\d{4})-.*?");
/// ```
pub fn convert_dialect(pattern: &str, from: Dialect, to: Dialect, allow_downgrades: bool) -> ConversionResult {
    let mut result = ConversionResult::unchanged(pattern, from, to);
    if from == to {
        result.notes.push(format!("source and target are both {}", to));
        return result;
    }

    if let Err(err) = CompiledPattern::compile(pattern, from, DEFAULT_BACKTRACK_LIMIT) {
        result.success = false;
        result
            .incompatibilities
            .push(format!("source does not compile for {}: {}", from, err.message));
        return result;
    }

    let rewriter = match REWRITER.as_ref() {
        Ok(rewriter) => rewriter,
        Err(err) => {
            result.success = false;
            result
                .incompatibilities
                .push(format!("feature detectors are unavailable: {}", err));
            return result;
        }
    };

    let features = rewriter.detect(pattern);
    debug!(%from, %to, ?features, "detected pattern features");

    match to {
        Dialect::Re2 => downgrade_to_re2(&mut result, rewriter, &features, allow_downgrades),
        Dialect::Js | Dialect::Pcre => advise(&mut result, &features),
    }
    result.changed = result.pattern != pattern;
    result
}

fn downgrade_to_re2(result: &mut ConversionResult, rewriter: &Rewriter, features: &[Feature], allow_downgrades: bool) {
    let has = |feature: Feature| features.contains(&feature);
    let mut pattern = result.pattern.clone();
    let mut blocked = false;

    if has(Feature::Lookahead) || has(Feature::Lookbehind) {
        if allow_downgrades {
            pattern = rewriter.lookaround.replace_all(&pattern, "").into_owned();
            result
                .warnings
                .push("look-around removed; the pattern may now accept more inputs".to_string());
            if rewriter.lookaround_open.is_match(&pattern) {
                result
                    .incompatibilities
                    .push("nested look-around cannot be removed".to_string());
                blocked = true;
            }
        } else {
            for feature in [Feature::Lookahead, Feature::Lookbehind] {
                if has(feature) {
                    result.incompatibilities.push(format!("{} is not supported by re2", feature));
                }
            }
        }
    }

    if has(Feature::NumericBackreference) || has(Feature::NamedBackreference) {
        if allow_downgrades {
            pattern = rewriter
                .backreference
                .replace_all(&pattern, NoExpand(".*?"))
                .into_owned();
            result
                .warnings
                .push("backreferences replaced with '.*?'; repeated text is no longer enforced".to_string());
        } else {
            for feature in [Feature::NumericBackreference, Feature::NamedBackreference] {
                if has(feature) {
                    result.incompatibilities.push(format!("{} are not supported by re2", feature));
                }
            }
        }
    }

    if has(Feature::NamedGroup) {
        if allow_downgrades {
            pattern = rewriter.named_group.replace_all(&pattern, NoExpand("(")).into_owned();
            result.notes.push("named groups converted to numbered groups".to_string());
        } else {
            result
                .incompatibilities
                .push(format!("{} are not supported by re2", Feature::NamedGroup));
        }
    }

    for feature in [Feature::AtomicGroup, Feature::PossessiveQuantifier, Feature::StringAnchor] {
        if has(feature) {
            result.warnings.push(format!("{} may not be supported by re2", feature));
        }
    }

    if allow_downgrades {
        result.pattern = pattern;
    }

    if let Err(err) = CompiledPattern::compile(&result.pattern, Dialect::Re2, DEFAULT_BACKTRACK_LIMIT) {
        result
            .incompatibilities
            .push(format!("converted pattern does not compile for re2: {}", err.message));
        blocked = true;
    }

    result.success = !blocked && (result.incompatibilities.is_empty() || allow_downgrades);
}

fn advise(result: &mut ConversionResult, features: &[Feature]) {
    let to = result.to;
    for feature in features {
        match (to, feature) {
            (Dialect::Js, Feature::PythonStyleName) => result
                .warnings
                .push("js spells named groups (?<name>) and backreferences \\k<name>".to_string()),
            (Dialect::Js, Feature::AtomicGroup | Feature::PossessiveQuantifier | Feature::StringAnchor) => {
                result.warnings.push(format!("{} are not supported by js", feature))
            }
            (Dialect::Js, Feature::InlineFlags) => result
                .warnings
                .push("inline flags are not supported by js; pass them as RegExp flags".to_string()),
            (Dialect::Js, Feature::UnicodeProperty) => result
                .notes
                .push("unicode property classes require the 'u' flag in js".to_string()),
            (Dialect::Js, Feature::Lookbehind) => result
                .notes
                .push("lookbehind requires an ES2018 engine".to_string()),
            (Dialect::Pcre, Feature::Lookbehind) => result
                .warnings
                .push("pcre requires fixed-length lookbehind".to_string()),
            _ => {}
        }
    }
    if result.warnings.is_empty() {
        result
            .notes
            .push(format!("no {} feature gaps detected; review manually before relying on it", to));
    }
}
