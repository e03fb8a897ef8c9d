//! Serde wire form of the pattern tree
//!
//! Model output and tool requests describe trees as tagged JSON objects:
//!
//! ```json
//! {"type": "sequence", "children": [
//!     {"type": "anchor", "position": "start"},
//!     {"type": "quantifier", "min": 1, "child": {"type": "char_class", "items": ["\\d"]}},
//!     {"type": "anchor", "position": "end"}
//! ]}
//! ```
//!
//! Class items are strings: a single character (`"a"`), a range (`"a-z"`), or
//! a shorthand (`"\\d"`). Converting a [`Node`] into a [`Pattern`] runs every
//! tree constructor, so invalid input surfaces as a [`PatternError`].

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use crate::pattern::{
    AnchorKind, AssertionKind, BackrefTarget, CharClass, ClassItem, Group, Pattern, Repeat, Shorthand,
};

/// One node of the wire form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Text matched verbatim
    Literal {
        text: String,
    },
    /// Fragment inserted without escaping
    Raw {
        pattern: String,
    },
    /// Concatenation
    Sequence {
        #[serde(default)]
        children: Vec<Node>,
    },
    /// Any one of the children
    Alternation {
        children: Vec<Node>,
    },
    /// Character class; items are `"a"`, `"a-z"` or `"\\d"`
    CharClass {
        items: Vec<String>,
        #[serde(default)]
        negated: bool,
    },
    /// Capturing group, named when `name` is present
    Group {
        child: Box<Node>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// `(?:...)`
    NonCapturingGroup {
        child: Box<Node>,
    },
    /// Reference to an earlier group
    Backreference {
        target: BackrefSpec,
    },
    /// Look-around
    Assertion {
        kind: AssertionKind,
        child: Box<Node>,
    },
    /// Repetition; `max` absent means unbounded
    Quantifier {
        child: Box<Node>,
        #[serde(default)]
        min: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u32>,
        #[serde(default)]
        lazy: bool,
    },
    /// `^`, `$` or `\b`
    Anchor {
        position: AnchorKind,
    },
}

/// A backreference target: a 1-based index or a group name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackrefSpec {
    /// 1-based group index
    Index(u32),
    /// Group name
    Name(String),
}

impl Node {
    /// Build the validated pattern tree this node describes
    pub fn to_pattern(&self) -> Result<Pattern, PatternError> {
        Ok(match self {
            Node::Literal { text } => Pattern::literal(text.as_str()),
            Node::Raw { pattern } => Pattern::raw(pattern.as_str()),
            Node::Sequence { children } => Pattern::sequence(
                children
                    .iter()
                    .map(Node::to_pattern)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Node::Alternation { children } => Pattern::alternation(
                children
                    .iter()
                    .map(Node::to_pattern)
                    .collect::<Result<Vec<_>, _>>()?,
            )?,
            Node::CharClass { items, negated } => Pattern::char_class(
                items
                    .iter()
                    .map(|item| parse_class_item(item))
                    .collect::<Result<Vec<_>, _>>()?,
                *negated,
            )?,
            Node::Group { child, name: None } => Pattern::group(child.to_pattern()?),
            Node::Group {
                child,
                name: Some(name),
            } => Pattern::named_group(name.as_str(), child.to_pattern()?)?,
            Node::NonCapturingGroup { child } => Pattern::non_capturing(child.to_pattern()?),
            Node::Backreference {
                target: BackrefSpec::Index(index),
            } => Pattern::backref_index(*index)?,
            Node::Backreference {
                target: BackrefSpec::Name(name),
            } => Pattern::backref_name(name.as_str())?,
            Node::Assertion { kind, child } => Pattern::assertion(*kind, child.to_pattern()?),
            Node::Quantifier {
                child,
                min,
                max,
                lazy,
            } => Pattern::repeat(child.to_pattern()?, *min, *max, *lazy)?,
            Node::Anchor { position } => Pattern::Anchor(*position),
        })
    }

    /// Describe an existing tree in wire form
    pub fn from_pattern(tree: &Pattern) -> Node {
        match tree {
            Pattern::Literal(text) => Node::Literal { text: text.clone() },
            Pattern::Raw(pattern) => Node::Raw {
                pattern: pattern.clone(),
            },
            Pattern::Sequence(children) => Node::Sequence {
                children: children.iter().map(Node::from_pattern).collect(),
            },
            Pattern::Alternation(alternatives) => Node::Alternation {
                children: alternatives.children().iter().map(Node::from_pattern).collect(),
            },
            Pattern::CharClass(class) => class_node(class),
            Pattern::Group(Group { child, name }) => Node::Group {
                child: Box::new(Node::from_pattern(child)),
                name: name.as_ref().map(|n| n.as_str().to_string()),
            },
            Pattern::NonCapturingGroup(child) => Node::NonCapturingGroup {
                child: Box::new(Node::from_pattern(child)),
            },
            Pattern::Backreference(BackrefTarget::Index(index)) => Node::Backreference {
                target: BackrefSpec::Index(NonZeroU32::get(*index)),
            },
            Pattern::Backreference(BackrefTarget::Name(name)) => Node::Backreference {
                target: BackrefSpec::Name(name.as_str().to_string()),
            },
            Pattern::Assertion { kind, child } => Node::Assertion {
                kind: *kind,
                child: Box::new(Node::from_pattern(child)),
            },
            Pattern::Quantifier(repeat) => quantifier_node(repeat),
            Pattern::Anchor(position) => Node::Anchor { position: *position },
        }
    }
}

fn class_node(class: &CharClass) -> Node {
    let items = class
        .items()
        .iter()
        .map(|item| match item {
            ClassItem::Char(c) => c.to_string(),
            ClassItem::Range(start, end) => format!("{}-{}", start, end),
            ClassItem::Shorthand(s) => format!("\\{}", s.letter()),
        })
        .collect();
    Node::CharClass {
        items,
        negated: class.negated(),
    }
}

fn quantifier_node(repeat: &Repeat) -> Node {
    Node::Quantifier {
        child: Box::new(Node::from_pattern(repeat.child())),
        min: repeat.min(),
        max: repeat.max(),
        lazy: repeat.lazy(),
    }
}

/// Parse one class item string: `"a"`, `"a-z"` or `"\\d"`
pub fn parse_class_item(item: &str) -> Result<ClassItem, PatternError> {
    let chars: Vec<char> = item.chars().collect();
    match chars.as_slice() {
        [c] => Ok(ClassItem::Char(*c)),
        ['\\', letter] => Ok(ClassItem::Shorthand(Shorthand::from_letter(*letter)?)),
        [start, '-', end] => {
            if end < start {
                Err(PatternError::InvalidRange {
                    start: *start,
                    end: *end,
                })
            } else {
                Ok(ClassItem::Range(*start, *end))
            }
        }
        _ => Err(PatternError::InvalidClassItem(item.to_string())),
    }
}
