//! Emitter: renders a pattern tree to a dialect-specific pattern string
//!
//! Rendering is a pure recursive fold with one production rule per node kind.
//! Every node dispatches on the dialect itself, so productions can diverge per
//! dialect without touching the traversal. Emission is total: any tree that
//! could be constructed renders to some string.

use crate::captures::CaptureMap;
use crate::dialect::Dialect;
use crate::pattern::{
    AnchorKind, AssertionKind, BackrefTarget, CharClass, ClassItem, Group, Pattern, Repeat,
};

/// A rendered pattern and its capture map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    /// The pattern string
    pub pattern: String,
    /// Capture key to 1-based group index
    pub captures: CaptureMap,
    /// Dialect the pattern was rendered for
    pub dialect: Dialect,
}

/// Render `tree` for `dialect`, optionally wrapping it in start/end anchors
///
/// # Example
/// ```
/// use regcraft::{emit, Dialect, Pattern};
///
/// let tree = Pattern::one_or_more(Pattern::digit());
/// assert_eq!(emit(&tree, Dialect::Js, true).pattern, r"^\d+$");
/// ```
pub fn emit(tree: &Pattern, dialect: Dialect, anchored: bool) -> Emitted {
    let body = render(tree, dialect);
    let pattern = if anchored {
        anchor_whole(tree, body, dialect)
    } else {
        body
    };
    Emitted {
        pattern,
        captures: CaptureMap::collect(tree),
        dialect,
    }
}

/// Render a tree without anchoring
pub fn render(tree: &Pattern, dialect: Dialect) -> String {
    match tree {
        Pattern::Literal(text) => escape_literal(text, dialect),
        Pattern::Raw(fragment) => fragment.clone(),
        Pattern::Sequence(children) => render_sequence(children, dialect),
        Pattern::Alternation(alts) => alts
            .children()
            .iter()
            .map(|child| render(child, dialect))
            .collect::<Vec<_>>()
            .join("|"),
        Pattern::CharClass(class) => render_class(class, dialect),
        Pattern::Group(group) => render_group(group, dialect),
        Pattern::NonCapturingGroup(child) => format!("(?:{})", render(child, dialect)),
        Pattern::Backreference(target) => render_backref(target, dialect),
        Pattern::Assertion { kind, child } => render_assertion(*kind, child, dialect),
        Pattern::Quantifier(repeat) => render_quantifier(repeat, dialect),
        Pattern::Anchor(kind) => render_anchor(*kind, dialect).to_string(),
    }
}

/// Dialect-independent rendering used for ordering and deduplication
pub(crate) fn canonical(tree: &Pattern) -> String {
    render(tree, Dialect::Js)
}

fn anchor_whole(tree: &Pattern, body: String, dialect: Dialect) -> String {
    let starts = starts_with_anchor(tree, AnchorKind::Start);
    let ends = ends_with_anchor(tree, AnchorKind::End);
    if starts && ends {
        return body;
    }
    let body = if renders_bare_alternation(tree) {
        format!("(?:{})", body)
    } else {
        body
    };
    let mut out = String::with_capacity(body.len() + 2);
    if !starts {
        out.push_str(render_anchor(AnchorKind::Start, dialect));
    }
    out.push_str(&body);
    if !ends {
        out.push_str(render_anchor(AnchorKind::End, dialect));
    }
    out
}

fn starts_with_anchor(tree: &Pattern, kind: AnchorKind) -> bool {
    match tree {
        Pattern::Anchor(k) => *k == kind,
        Pattern::Sequence(children) => children
            .first()
            .is_some_and(|first| starts_with_anchor(first, kind)),
        _ => false,
    }
}

fn ends_with_anchor(tree: &Pattern, kind: AnchorKind) -> bool {
    match tree {
        Pattern::Anchor(k) => *k == kind,
        Pattern::Sequence(children) => children
            .last()
            .is_some_and(|last| ends_with_anchor(last, kind)),
        _ => false,
    }
}

/// Whether the rendering of `tree` has a `|` at its outermost level
fn renders_bare_alternation(tree: &Pattern) -> bool {
    match tree {
        Pattern::Alternation(alts) => match alts.children() {
            [only] => renders_bare_alternation(only),
            _ => true,
        },
        Pattern::Sequence(children) => match children.as_slice() {
            [only] => renders_bare_alternation(only),
            _ => false,
        },
        Pattern::Raw(fragment) => has_top_level_bar(fragment),
        _ => false,
    }
}

/// Whether `fragment` has a `|` outside every group and class
fn has_top_level_bar(fragment: &str) -> bool {
    let mut depth = 0usize;
    let mut in_class = false;
    let mut chars = fragment.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            _ if in_class => {}
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Byte offset of a `\N` backreference that ends `out`, if any
fn trailing_backref(out: &str) -> Option<usize> {
    let digits_start = out.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits_start == out.len() {
        return None;
    }
    let head = &out[..digits_start];
    let slashes = head.len() - head.trim_end_matches('\\').len();
    (slashes % 2 == 1).then(|| digits_start - 1)
}

fn render_sequence(children: &[Pattern], dialect: Dialect) -> String {
    let parts: Vec<String> = children
        .iter()
        .map(|child| {
            if children.len() > 1 && renders_bare_alternation(child) {
                format!("(?:{})", render(child, dialect))
            } else {
                render(child, dialect)
            }
        })
        .collect();

    let mut out = String::new();
    for part in &parts {
        let digit_next = part.chars().next().is_some_and(|c| c.is_ascii_digit());
        if let Some(start) = trailing_backref(&out).filter(|_| digit_next) {
            // \1 followed by "0" would read as \10
            out.insert_str(start, "(?:");
            out.push(')');
        }
        out.push_str(part);
    }
    out
}

fn is_literal_meta(c: char, dialect: Dialect) -> bool {
    match dialect {
        Dialect::Js | Dialect::Pcre | Dialect::Re2 => matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ),
    }
}

fn escape_literal(text: &str, dialect: Dialect) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_literal_meta(c, dialect) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn is_class_meta(c: char, dialect: Dialect) -> bool {
    match dialect {
        Dialect::Js | Dialect::Pcre | Dialect::Re2 => matches!(c, '\\' | ']' | '[' | '^' | '-'),
    }
}

fn push_class_char(out: &mut String, c: char, dialect: Dialect) {
    if is_class_meta(c, dialect) {
        out.push('\\');
    }
    out.push(c);
}

fn render_class(class: &CharClass, dialect: Dialect) -> String {
    match (class.items(), class.negated()) {
        // a lone shorthand needs no brackets
        ([ClassItem::Shorthand(s)], false) => return format!("\\{}", s.letter()),
        // an empty set matches nothing; its negation matches anything
        ([], false) => return r"[^\s\S]".to_string(),
        ([], true) => return r"[\s\S]".to_string(),
        _ => {}
    }

    let mut out = String::from("[");
    if class.negated() {
        out.push('^');
    }
    for item in class.items() {
        match item {
            ClassItem::Char(c) => push_class_char(&mut out, *c, dialect),
            ClassItem::Range(start, end) => {
                push_class_char(&mut out, *start, dialect);
                out.push('-');
                push_class_char(&mut out, *end, dialect);
            }
            ClassItem::Shorthand(s) => {
                out.push('\\');
                out.push(s.letter());
            }
        }
    }
    out.push(']');
    out
}

fn render_group(group: &Group, dialect: Dialect) -> String {
    let body = render(&group.child, dialect);
    match (&group.name, dialect) {
        (None, _) => format!("({})", body),
        (Some(name), Dialect::Js | Dialect::Pcre) => format!("(?<{}>{})", name, body),
        (Some(name), Dialect::Re2) => format!("(?P<{}>{})", name, body),
    }
}

fn render_backref(target: &BackrefTarget, dialect: Dialect) -> String {
    match (target, dialect) {
        (BackrefTarget::Index(n), Dialect::Js | Dialect::Pcre | Dialect::Re2) => format!("\\{}", n),
        (BackrefTarget::Name(name), Dialect::Js | Dialect::Pcre | Dialect::Re2) => {
            format!("\\k<{}>", name)
        }
    }
}

fn render_assertion(kind: AssertionKind, child: &Pattern, dialect: Dialect) -> String {
    let open = match (kind, dialect) {
        (AssertionKind::Lookahead, _) => "(?=",
        (AssertionKind::NegativeLookahead, _) => "(?!",
        (AssertionKind::Lookbehind, _) => "(?<=",
        (AssertionKind::NegativeLookbehind, _) => "(?<!",
    };
    format!("{}{})", open, render(child, dialect))
}

fn render_anchor(kind: AnchorKind, dialect: Dialect) -> &'static str {
    match (kind, dialect) {
        (AnchorKind::Start, _) => "^",
        (AnchorKind::End, _) => "$",
        (AnchorKind::WordBoundary, _) => "\\b",
    }
}

/// Whether a node must be wrapped in `(?:...)` before a quantifier applies to it
fn needs_group_for_quantifier(child: &Pattern) -> bool {
    match child {
        Pattern::Literal(text) => text.chars().count() != 1,
        Pattern::Sequence(children) => match children.as_slice() {
            [only] => needs_group_for_quantifier(only),
            _ => true,
        },
        Pattern::CharClass(_)
        | Pattern::Group(_)
        | Pattern::NonCapturingGroup(_)
        | Pattern::Backreference(_) => false,
        Pattern::Raw(_)
        | Pattern::Alternation(_)
        | Pattern::Assertion { .. }
        | Pattern::Quantifier(_)
        | Pattern::Anchor(_) => true,
    }
}

fn quantifier_suffix(repeat: &Repeat, dialect: Dialect) -> String {
    let base = match (repeat.min(), repeat.max(), dialect) {
        (0, None, _) => "*".to_string(),
        (1, None, _) => "+".to_string(),
        (0, Some(1), _) => "?".to_string(),
        (min, Some(max), _) if min == max => format!("{{{}}}", min),
        (min, None, _) => format!("{{{},}}", min),
        (min, Some(max), _) => format!("{{{},{}}}", min, max),
    };
    if repeat.lazy() {
        format!("{}?", base)
    } else {
        base
    }
}

fn render_quantifier(repeat: &Repeat, dialect: Dialect) -> String {
    let child = repeat.child();
    let atom = render(child, dialect);
    let atom = if needs_group_for_quantifier(child) {
        format!("(?:{})", atom)
    } else {
        atom
    };
    format!("{}{}", atom, quantifier_suffix(repeat, dialect))
}
