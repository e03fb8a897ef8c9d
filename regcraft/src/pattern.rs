//! Pattern tree for regex construction
//!
//! This module defines the immutable tree that represents a pattern before it
//! is rendered to a dialect string. Supports:
//! - Literals (escaped at emission) and raw fragments (inserted verbatim)
//! - Sequences and canonically ordered alternations
//! - Character classes with ranges and shorthands
//! - Groups (capturing, named, non-capturing) and backreferences
//! - Look-around assertions, quantifiers and anchors
//!
//! Nodes that carry invariants (`Alternatives`, `Repeat`, `GroupName`,
//! `CharClass`) keep their fields private and are only built through
//! validating constructors, so every tree that exists is well formed.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::emit;
use crate::error::PatternError;

/// A node in the pattern tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Text matched verbatim
    Literal(String),

    /// An already-valid fragment inserted without escaping or validation
    Raw(String),

    /// Concatenation; an empty sequence matches the empty string
    Sequence(Vec<Pattern>),

    /// Matches if any alternative matches
    Alternation(Alternatives),

    /// One character from (or not from) a set
    CharClass(CharClass),

    /// A capturing group, optionally named
    Group(Group),

    /// A non-capturing group: (?:...)
    NonCapturingGroup(Box<Pattern>),

    /// A reference to an earlier capture
    Backreference(BackrefTarget),

    /// A zero-width look-around assertion
    Assertion {
        /// Direction and polarity
        kind: AssertionKind,
        /// The asserted pattern
        child: Box<Pattern>,
    },

    /// A bounded or unbounded repetition
    Quantifier(Repeat),

    /// A zero-width position anchor
    Anchor(AnchorKind),
}

/// The non-empty, canonically ordered alternatives of an alternation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alternatives {
    children: Vec<Pattern>,
}

impl Alternatives {
    /// Build an alternative set, ordering children by their canonical rendering
    pub fn new(children: Vec<Pattern>) -> Result<Self, PatternError> {
        if children.is_empty() {
            return Err(PatternError::EmptyAlternation);
        }
        let mut keyed: Vec<(String, Pattern)> = children
            .into_iter()
            .map(|child| (emit::canonical(&child), child))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Alternatives {
            children: keyed.into_iter().map(|(_, child)| child).collect(),
        })
    }

    /// The alternatives in canonical order
    pub fn children(&self) -> &[Pattern] {
        &self.children
    }

    /// Consume the set, yielding the alternatives in canonical order
    pub fn into_children(self) -> Vec<Pattern> {
        self.children
    }

    /// Number of alternatives (always at least one)
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether there are no alternatives; `new` rejects that, so a built set returns false
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A character class `[abc]`, `[^abc]`, or `[a-z\d]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharClass {
    items: Vec<ClassItem>,
    negated: bool,
}

impl CharClass {
    /// Build a class; items are sorted and de-duplicated
    pub fn new(items: Vec<ClassItem>, negated: bool) -> Result<Self, PatternError> {
        for item in &items {
            if let ClassItem::Range(start, end) = item {
                if end < start {
                    return Err(PatternError::InvalidRange {
                        start: *start,
                        end: *end,
                    });
                }
            }
        }
        let mut items = items;
        items.sort();
        items.dedup();
        Ok(CharClass { items, negated })
    }

    /// The class items in canonical order
    pub fn items(&self) -> &[ClassItem] {
        &self.items
    }

    /// Whether the class is negated `[^...]`
    pub fn negated(&self) -> bool {
        self.negated
    }

    /// Union of two classes with the same polarity
    pub fn union(&self, other: &CharClass) -> Result<CharClass, PatternError> {
        let mut items = self.items.clone();
        items.extend(other.items.iter().cloned());
        CharClass::new(items, self.negated)
    }
}

/// An item in a character class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClassItem {
    /// A single character
    Char(char),
    /// An inclusive character range (e.g., a-z)
    Range(char, char),
    /// A shorthand class (\d, \w, \s and their negations)
    Shorthand(Shorthand),
}

/// Shorthand character classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shorthand {
    /// `\d`
    Digit,
    /// `\D`
    NotDigit,
    /// `\w`
    Word,
    /// `\W`
    NotWord,
    /// `\s`
    Space,
    /// `\S`
    NotSpace,
}

impl Shorthand {
    /// The escape letter for this shorthand
    pub fn letter(&self) -> char {
        match self {
            Shorthand::Digit => 'd',
            Shorthand::NotDigit => 'D',
            Shorthand::Word => 'w',
            Shorthand::NotWord => 'W',
            Shorthand::Space => 's',
            Shorthand::NotSpace => 'S',
        }
    }

    /// Parse an escape letter
    pub fn from_letter(c: char) -> Result<Self, PatternError> {
        match c {
            'd' => Ok(Shorthand::Digit),
            'D' => Ok(Shorthand::NotDigit),
            'w' => Ok(Shorthand::Word),
            'W' => Ok(Shorthand::NotWord),
            's' => Ok(Shorthand::Space),
            'S' => Ok(Shorthand::NotSpace),
            other => Err(PatternError::UnknownShorthand(other)),
        }
    }
}

/// A validated capture-group name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupName(String);

impl GroupName {
    /// Validate an identifier: a letter or underscore followed by letters, digits or underscores
    pub fn new(name: impl Into<String>) -> Result<Self, PatternError> {
        let name = name.into();
        let mut chars = name.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(GroupName(name))
        } else {
            Err(PatternError::InvalidGroupName(name))
        }
    }

    /// The name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A capturing group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Group {
    /// The pattern inside the group
    pub child: Box<Pattern>,
    /// Optional name
    pub name: Option<GroupName>,
}

/// What a backreference points at
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackrefTarget {
    /// A named group
    Name(GroupName),
    /// A 1-based group index
    Index(NonZeroU32),
}

/// Look-around assertion kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    /// `(?=...)`
    Lookahead,
    /// `(?!...)`
    NegativeLookahead,
    /// `(?<=...)`
    Lookbehind,
    /// `(?<!...)`
    NegativeLookbehind,
}

/// Anchor positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    /// `^`
    Start,
    /// `$`
    End,
    /// `\b`
    WordBoundary,
}

/// A quantified pattern with validated bounds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repeat {
    child: Box<Pattern>,
    min: u32,
    max: Option<u32>,
    lazy: bool,
}

impl Repeat {
    /// Build a repetition; a bounded `max` must be at least `min`
    pub fn new(child: Pattern, min: u32, max: Option<u32>, lazy: bool) -> Result<Self, PatternError> {
        if let Some(max) = max {
            if max < min {
                return Err(PatternError::InvalidQuantifier { min, max });
            }
        }
        Ok(Repeat {
            child: Box::new(child),
            min,
            max,
            lazy,
        })
    }

    /// The repeated pattern
    pub fn child(&self) -> &Pattern {
        &self.child
    }

    /// Consume the repetition, yielding its child
    pub fn into_child(self) -> Pattern {
        *self.child
    }

    /// Minimum repetitions
    pub fn min(&self) -> u32 {
        self.min
    }

    /// Maximum repetitions, `None` when unbounded
    pub fn max(&self) -> Option<u32> {
        self.max
    }

    /// Whether the repetition prefers fewer matches
    pub fn lazy(&self) -> bool {
        self.lazy
    }

    /// Rebuild the same bounds around a different child
    pub fn with_child(&self, child: Pattern) -> Repeat {
        Repeat {
            child: Box::new(child),
            min: self.min,
            max: self.max,
            lazy: self.lazy,
        }
    }
}

impl Pattern {
    /// Create a literal that matches `text` verbatim
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    /// Insert an already-valid fragment verbatim
    pub fn raw(fragment: impl Into<String>) -> Self {
        Pattern::Raw(fragment.into())
    }

    /// Create a sequence
    pub fn sequence(children: Vec<Pattern>) -> Self {
        Pattern::Sequence(children)
    }

    /// The empty sequence, which matches the empty string
    pub fn empty() -> Self {
        Pattern::Sequence(Vec::new())
    }

    /// Create an alternation; fails if `children` is empty
    pub fn alternation(children: Vec<Pattern>) -> Result<Self, PatternError> {
        Ok(Pattern::Alternation(Alternatives::new(children)?))
    }

    /// Create a character class
    pub fn char_class(items: Vec<ClassItem>, negated: bool) -> Result<Self, PatternError> {
        Ok(Pattern::CharClass(CharClass::new(items, negated)?))
    }

    /// A class holding a single shorthand, emitted bare (e.g. `\d`)
    pub fn shorthand(shorthand: Shorthand) -> Self {
        Pattern::CharClass(CharClass {
            items: vec![ClassItem::Shorthand(shorthand)],
            negated: false,
        })
    }

    /// A class holding one range; the bounds are put in order
    pub fn range(start: char, end: char) -> Self {
        Pattern::CharClass(CharClass {
            items: vec![ClassItem::Range(start.min(end), start.max(end))],
            negated: false,
        })
    }

    /// `\d`
    pub fn digit() -> Self {
        Pattern::shorthand(Shorthand::Digit)
    }

    /// `\w`
    pub fn word() -> Self {
        Pattern::shorthand(Shorthand::Word)
    }

    /// `\s`
    pub fn whitespace() -> Self {
        Pattern::shorthand(Shorthand::Space)
    }

    /// Create an unnamed capturing group
    pub fn group(child: Pattern) -> Self {
        Pattern::Group(Group {
            child: Box::new(child),
            name: None,
        })
    }

    /// Create a named capturing group; the name must be an identifier
    pub fn named_group(name: impl Into<String>, child: Pattern) -> Result<Self, PatternError> {
        Ok(Pattern::Group(Group {
            child: Box::new(child),
            name: Some(GroupName::new(name)?),
        }))
    }

    /// Create a non-capturing group
    pub fn non_capturing(child: Pattern) -> Self {
        Pattern::NonCapturingGroup(Box::new(child))
    }

    /// Backreference by 1-based index
    pub fn backref_index(index: u32) -> Result<Self, PatternError> {
        NonZeroU32::new(index)
            .map(|n| Pattern::Backreference(BackrefTarget::Index(n)))
            .ok_or(PatternError::ZeroBackreference)
    }

    /// Backreference by group name
    pub fn backref_name(name: impl Into<String>) -> Result<Self, PatternError> {
        Ok(Pattern::Backreference(BackrefTarget::Name(GroupName::new(name)?)))
    }

    /// Create a look-around assertion
    pub fn assertion(kind: AssertionKind, child: Pattern) -> Self {
        Pattern::Assertion {
            kind,
            child: Box::new(child),
        }
    }

    /// `(?=child)`
    pub fn lookahead(child: Pattern) -> Self {
        Pattern::assertion(AssertionKind::Lookahead, child)
    }

    /// `(?!child)`
    pub fn negative_lookahead(child: Pattern) -> Self {
        Pattern::assertion(AssertionKind::NegativeLookahead, child)
    }

    /// `(?<=child)`
    pub fn lookbehind(child: Pattern) -> Self {
        Pattern::assertion(AssertionKind::Lookbehind, child)
    }

    /// `(?<!child)`
    pub fn negative_lookbehind(child: Pattern) -> Self {
        Pattern::assertion(AssertionKind::NegativeLookbehind, child)
    }

    /// Create a quantifier; `max = None` is unbounded
    pub fn repeat(child: Pattern, min: u32, max: Option<u32>, lazy: bool) -> Result<Self, PatternError> {
        Ok(Pattern::Quantifier(Repeat::new(child, min, max, lazy)?))
    }

    /// `child*`
    pub fn zero_or_more(child: Pattern) -> Self {
        Pattern::Quantifier(Repeat {
            child: Box::new(child),
            min: 0,
            max: None,
            lazy: false,
        })
    }

    /// `child+`
    pub fn one_or_more(child: Pattern) -> Self {
        Pattern::Quantifier(Repeat {
            child: Box::new(child),
            min: 1,
            max: None,
            lazy: false,
        })
    }

    /// `child?`
    pub fn optional(child: Pattern) -> Self {
        Pattern::Quantifier(Repeat {
            child: Box::new(child),
            min: 0,
            max: Some(1),
            lazy: false,
        })
    }

    /// `child{n}`
    pub fn exactly(child: Pattern, n: u32) -> Self {
        Pattern::Quantifier(Repeat {
            child: Box::new(child),
            min: n,
            max: Some(n),
            lazy: false,
        })
    }

    /// `^`
    pub fn start() -> Self {
        Pattern::Anchor(AnchorKind::Start)
    }

    /// `$`
    pub fn end() -> Self {
        Pattern::Anchor(AnchorKind::End)
    }

    /// `\b`
    pub fn word_boundary() -> Self {
        Pattern::Anchor(AnchorKind::WordBoundary)
    }

    /// Direct children of this node, in order
    pub fn children(&self) -> Vec<&Pattern> {
        match self {
            Pattern::Literal(_)
            | Pattern::Raw(_)
            | Pattern::CharClass(_)
            | Pattern::Backreference(_)
            | Pattern::Anchor(_) => Vec::new(),
            Pattern::Sequence(children) => children.iter().collect(),
            Pattern::Alternation(alts) => alts.children().iter().collect(),
            Pattern::Group(group) => vec![group.child.as_ref()],
            Pattern::NonCapturingGroup(child) => vec![child.as_ref()],
            Pattern::Assertion { child, .. } => vec![child.as_ref()],
            Pattern::Quantifier(repeat) => vec![repeat.child()],
        }
    }

    /// Total node count, including this node
    pub fn size(&self) -> usize {
        1 + self.children().into_iter().map(Pattern::size).sum::<usize>()
    }

    /// Whether a capturing group occurs anywhere in this subtree
    pub fn contains_group(&self) -> bool {
        matches!(self, Pattern::Group(_)) || self.children().into_iter().any(Pattern::contains_group)
    }

    /// Render for a dialect without anchoring
    pub fn to_regex_string(&self, dialect: Dialect) -> String {
        emit::render(self, dialect)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&emit::canonical(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_alternation_is_rejected() {
        assert_eq!(
            Pattern::alternation(vec![]),
            Err(PatternError::EmptyAlternation)
        );
        assert_eq!(Alternatives::new(vec![]), Err(PatternError::EmptyAlternation));
        let one = Alternatives::new(vec![Pattern::literal("a")]).unwrap();
        assert_eq!(one.len(), 1);
        assert!(!one.is_empty());
    }

    #[test]
    fn test_alternation_is_canonically_ordered() {
        let alt = Pattern::alternation(vec![
            Pattern::literal("dog"),
            Pattern::literal("cat"),
            Pattern::literal("bird"),
        ])
        .unwrap();
        let Pattern::Alternation(alts) = alt else {
            panic!("expected alternation");
        };
        assert_eq!(
            alts.children(),
            &[
                Pattern::literal("bird"),
                Pattern::literal("cat"),
                Pattern::literal("dog"),
            ]
        );
    }

    #[test]
    fn test_quantifier_bounds_are_validated() {
        assert_eq!(
            Pattern::repeat(Pattern::literal("a"), 3, Some(2), false),
            Err(PatternError::InvalidQuantifier { min: 3, max: 2 })
        );
        assert!(Pattern::repeat(Pattern::literal("a"), 2, Some(2), false).is_ok());
        assert!(Pattern::repeat(Pattern::literal("a"), 5, None, true).is_ok());
    }

    #[test]
    fn test_group_names_are_validated() {
        assert!(Pattern::named_group("year", Pattern::digit()).is_ok());
        assert!(Pattern::named_group("_x1", Pattern::digit()).is_ok());
        assert_eq!(
            Pattern::named_group("1st", Pattern::digit()),
            Err(PatternError::InvalidGroupName("1st".to_string()))
        );
        assert!(Pattern::named_group("", Pattern::digit()).is_err());
        assert!(Pattern::backref_name("has space").is_err());
    }

    #[test]
    fn test_zero_backreference_is_rejected() {
        assert_eq!(Pattern::backref_index(0), Err(PatternError::ZeroBackreference));
        assert!(Pattern::backref_index(1).is_ok());
    }

    #[test]
    fn test_char_class_sorted_and_deduplicated() {
        let class = CharClass::new(
            vec![ClassItem::Char('b'), ClassItem::Char('a'), ClassItem::Char('b')],
            false,
        )
        .unwrap();
        assert_eq!(class.items(), &[ClassItem::Char('a'), ClassItem::Char('b')]);
    }

    #[test]
    fn test_char_class_range_validated() {
        assert_eq!(
            CharClass::new(vec![ClassItem::Range('z', 'a')], false),
            Err(PatternError::InvalidRange { start: 'z', end: 'a' })
        );
    }

    #[test]
    fn test_char_class_union() {
        let a = CharClass::new(vec![ClassItem::Char('a')], false).unwrap();
        let b = CharClass::new(vec![ClassItem::Range('0', '9'), ClassItem::Char('a')], false).unwrap();
        let merged = a.union(&b).unwrap();
        assert_eq!(
            merged.items(),
            &[ClassItem::Char('a'), ClassItem::Range('0', '9')]
        );
    }

    #[test]
    fn test_size_counts_every_node() {
        let tree = Pattern::sequence(vec![Pattern::literal("a"), Pattern::literal("b")]);
        assert_eq!(tree.size(), 3);

        let tree = Pattern::one_or_more(Pattern::group(Pattern::digit()));
        assert_eq!(tree.size(), 3);
    }

    #[test]
    fn test_contains_group() {
        let tree = Pattern::optional(Pattern::non_capturing(Pattern::group(Pattern::word())));
        assert!(tree.contains_group());
        assert!(!Pattern::one_or_more(Pattern::digit()).contains_group());
    }

    #[test]
    fn test_shorthand_letters() {
        for letter in ['d', 'D', 'w', 'W', 's', 'S'] {
            assert_eq!(Shorthand::from_letter(letter).unwrap().letter(), letter);
        }
        assert_eq!(
            Shorthand::from_letter('x'),
            Err(PatternError::UnknownShorthand('x'))
        );
    }
}
