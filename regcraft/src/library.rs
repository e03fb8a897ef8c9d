//! Standard pattern library
//!
//! A fixed registry of prebuilt patterns. Entries carry metadata and build
//! their tree on demand, so the registry itself is plain static data.

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::PatternError;
use crate::pattern::Pattern;
use crate::schema::parse_class_item;

/// Which dialects an entry is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryDialect {
    /// Emits correctly for every dialect
    Universal,
    /// Needs a backtracking engine (look-around, backreferences), so `js` or `pcre`
    Backtracking,
    /// Written for `re2`
    Re2,
}

impl LibraryDialect {
    /// Whether the entry can be used with `dialect`
    pub fn supports(&self, dialect: Dialect) -> bool {
        match self {
            LibraryDialect::Universal => true,
            LibraryDialect::Backtracking => matches!(dialect, Dialect::Js | Dialect::Pcre),
            LibraryDialect::Re2 => dialect == Dialect::Re2,
        }
    }
}

/// One library entry
#[derive(Debug, Clone, Copy)]
pub struct LibraryEntry {
    /// Lookup key
    pub name: &'static str,
    /// What the pattern matches
    pub description: &'static str,
    /// Inputs the pattern matches when anchored
    pub examples: &'static [&'static str],
    /// Dialects the entry is written for
    pub dialect: LibraryDialect,
    build: fn() -> Result<Pattern, PatternError>,
}

impl LibraryEntry {
    /// Build the entry's tree
    pub fn pattern(&self) -> Result<Pattern, PatternError> {
        (self.build)()
    }

    fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query) || self.description.to_lowercase().contains(&query)
    }
}

const ENTRIES: &[LibraryEntry] = &[
    LibraryEntry {
        name: "email",
        description: "Email address with a dotted domain",
        examples: &["user.name+tag@example.co.uk", "a@b.io"],
        dialect: LibraryDialect::Universal,
        build: email,
    },
    LibraryEntry {
        name: "url",
        description: "HTTP or HTTPS URL with an optional path",
        examples: &["https://example.com/path?q=1", "http://sub.domain.org"],
        dialect: LibraryDialect::Universal,
        build: url,
    },
    LibraryEntry {
        name: "ipv4",
        description: "Dotted-quad IPv4 address (octet values are not range-checked)",
        examples: &["192.168.0.1", "8.8.8.8"],
        dialect: LibraryDialect::Universal,
        build: ipv4,
    },
    LibraryEntry {
        name: "uuid",
        description: "UUID in 8-4-4-4-12 hexadecimal form",
        examples: &["123e4567-e89b-12d3-a456-426614174000"],
        dialect: LibraryDialect::Universal,
        build: uuid,
    },
    LibraryEntry {
        name: "iso-date",
        description: "ISO 8601 calendar date with year, month and day captures",
        examples: &["2024-05-17", "1999-12-31"],
        dialect: LibraryDialect::Universal,
        build: iso_date,
    },
    LibraryEntry {
        name: "us-phone",
        description: "US phone number written as 555-123-4567",
        examples: &["555-123-4567"],
        dialect: LibraryDialect::Universal,
        build: us_phone,
    },
    LibraryEntry {
        name: "hex-color",
        description: "CSS hex color in short or long form",
        examples: &["#fff", "#1a2B3c"],
        dialect: LibraryDialect::Universal,
        build: hex_color,
    },
    LibraryEntry {
        name: "slug",
        description: "Lowercase URL slug of words joined by hyphens",
        examples: &["hello-world", "v2"],
        dialect: LibraryDialect::Universal,
        build: slug,
    },
    LibraryEntry {
        name: "semver",
        description: "Semantic version with an optional pre-release tag",
        examples: &["1.2.3", "10.0.0-beta.1"],
        dialect: LibraryDialect::Universal,
        build: semver,
    },
    LibraryEntry {
        name: "repeated-word",
        description: "A word immediately repeated, using a named backreference",
        examples: &["the the", "go  go"],
        dialect: LibraryDialect::Backtracking,
        build: repeated_word,
    },
    LibraryEntry {
        name: "strong-password",
        description: "At least 8 characters with a digit, a lowercase and an uppercase letter",
        examples: &["Passw0rdX", "aB3defgh"],
        dialect: LibraryDialect::Backtracking,
        build: strong_password,
    },
];

/// Every entry, in registry order
pub fn all() -> &'static [LibraryEntry] {
    ENTRIES
}

/// The entry named `name`
pub fn get(name: &str) -> Option<&'static LibraryEntry> {
    ENTRIES.iter().find(|entry| entry.name == name)
}

/// Entries whose name or description contains `query` (case-insensitive),
/// optionally restricted to those usable with `dialect`
pub fn search(query: &str, dialect: Option<Dialect>) -> Vec<&'static LibraryEntry> {
    ENTRIES
        .iter()
        .filter(|entry| entry.matches_query(query))
        .filter(|entry| dialect.is_none_or(|d| entry.dialect.supports(d)))
        .collect()
}

fn class(items: &[&str]) -> Result<Pattern, PatternError> {
    let items = items
        .iter()
        .map(|item| parse_class_item(item))
        .collect::<Result<Vec<_>, _>>()?;
    Pattern::char_class(items, false)
}

fn hex() -> Result<Pattern, PatternError> {
    class(&["0-9", "a-f", "A-F"])
}

fn any_char() -> Result<Pattern, PatternError> {
    Pattern::char_class(Vec::new(), true)
}

fn dot_segments(segment: Pattern) -> Pattern {
    Pattern::one_or_more(Pattern::sequence(vec![Pattern::literal("."), segment]))
}

fn email() -> Result<Pattern, PatternError> {
    Ok(Pattern::sequence(vec![
        Pattern::one_or_more(class(&["\\w", ".", "+", "-"])?),
        Pattern::literal("@"),
        Pattern::one_or_more(class(&["\\w", "-"])?),
        dot_segments(Pattern::one_or_more(class(&["\\w", "-"])?)),
    ]))
}

fn url() -> Result<Pattern, PatternError> {
    Ok(Pattern::sequence(vec![
        Pattern::literal("http"),
        Pattern::optional(Pattern::literal("s")),
        Pattern::literal("://"),
        Pattern::one_or_more(class(&["\\w", "-"])?),
        dot_segments(Pattern::one_or_more(class(&["\\w", "-"])?)),
        Pattern::optional(Pattern::sequence(vec![
            Pattern::literal("/"),
            Pattern::zero_or_more(Pattern::char_class(vec![parse_class_item("\\s")?], true)?),
        ])),
    ]))
}

fn ipv4() -> Result<Pattern, PatternError> {
    let octet = || Pattern::repeat(Pattern::digit(), 1, Some(3), false);
    Ok(Pattern::sequence(vec![
        Pattern::exactly(Pattern::sequence(vec![octet()?, Pattern::literal(".")]), 3),
        octet()?,
    ]))
}

fn uuid() -> Result<Pattern, PatternError> {
    let mut parts = Vec::new();
    for (i, len) in [8, 4, 4, 4, 12].into_iter().enumerate() {
        if i > 0 {
            parts.push(Pattern::literal("-"));
        }
        parts.push(Pattern::exactly(hex()?, len));
    }
    Ok(Pattern::sequence(parts))
}

fn iso_date() -> Result<Pattern, PatternError> {
    Ok(Pattern::sequence(vec![
        Pattern::named_group("year", Pattern::exactly(Pattern::digit(), 4))?,
        Pattern::literal("-"),
        Pattern::named_group("month", Pattern::exactly(Pattern::digit(), 2))?,
        Pattern::literal("-"),
        Pattern::named_group("day", Pattern::exactly(Pattern::digit(), 2))?,
    ]))
}

fn us_phone() -> Result<Pattern, PatternError> {
    Ok(Pattern::sequence(vec![
        Pattern::exactly(Pattern::digit(), 3),
        Pattern::literal("-"),
        Pattern::exactly(Pattern::digit(), 3),
        Pattern::literal("-"),
        Pattern::exactly(Pattern::digit(), 4),
    ]))
}

fn hex_color() -> Result<Pattern, PatternError> {
    Ok(Pattern::sequence(vec![
        Pattern::literal("#"),
        Pattern::repeat(Pattern::exactly(hex()?, 3), 1, Some(2), false)?,
    ]))
}

fn slug() -> Result<Pattern, PatternError> {
    let word = || class(&["a-z", "0-9"]).map(Pattern::one_or_more);
    Ok(Pattern::sequence(vec![
        word()?,
        Pattern::zero_or_more(Pattern::sequence(vec![Pattern::literal("-"), word()?])),
    ]))
}

fn semver() -> Result<Pattern, PatternError> {
    let number = || Pattern::one_or_more(Pattern::digit());
    Ok(Pattern::sequence(vec![
        number(),
        Pattern::literal("."),
        number(),
        Pattern::literal("."),
        number(),
        Pattern::optional(Pattern::sequence(vec![
            Pattern::literal("-"),
            Pattern::one_or_more(class(&["\\w", "."])?),
        ])),
    ]))
}

fn repeated_word() -> Result<Pattern, PatternError> {
    Ok(Pattern::sequence(vec![
        Pattern::word_boundary(),
        Pattern::named_group("word", Pattern::one_or_more(Pattern::word()))?,
        Pattern::one_or_more(Pattern::whitespace()),
        Pattern::backref_name("word")?,
        Pattern::word_boundary(),
    ]))
}

fn strong_password() -> Result<Pattern, PatternError> {
    let requires = |atom: Pattern| -> Result<Pattern, PatternError> {
        Ok(Pattern::lookahead(Pattern::sequence(vec![
            Pattern::zero_or_more(any_char()?),
            atom,
        ])))
    };
    Ok(Pattern::sequence(vec![
        requires(Pattern::digit())?,
        requires(Pattern::range('a', 'z'))?,
        requires(Pattern::range('A', 'Z'))?,
        Pattern::repeat(any_char()?, 8, None, false)?,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TesterConfig;
    use crate::emit::emit;
    use crate::tester::{TestCase, test_regex};

    #[test]
    fn test_every_entry_matches_its_examples() {
        for entry in all() {
            let tree = entry.pattern().unwrap();
            for dialect in Dialect::ALL.into_iter().filter(|d| entry.dialect.supports(*d)) {
                let pattern = emit(&tree, dialect, true).pattern;
                let cases: Vec<TestCase> = entry.examples.iter().map(|e| TestCase::positive(*e)).collect();
                let result = test_regex(&pattern, &cases, dialect, &TesterConfig::default()).unwrap();
                assert!(result.all_passed(), "{} ({}) failed: {:?}", entry.name, dialect, result.details);
            }
        }
    }

    #[test]
    fn test_backtracking_entries_cover_js_and_pcre() {
        assert!(LibraryDialect::Backtracking.supports(Dialect::Js));
        assert!(LibraryDialect::Backtracking.supports(Dialect::Pcre));
        assert!(!LibraryDialect::Backtracking.supports(Dialect::Re2));
        let entry = get("strong-password").unwrap();
        let pattern = emit(&entry.pattern().unwrap(), Dialect::Js, true).pattern;
        let cases = [TestCase::positive("Passw0rdX"), TestCase::negative("password1")];
        assert!(test_regex(&pattern, &cases, Dialect::Js, &TesterConfig::default()).unwrap().all_passed());
    }

    #[test]
    fn test_names_are_unique() {
        for (i, entry) in all().iter().enumerate() {
            assert!(all()[i + 1..].iter().all(|other| other.name != entry.name));
        }
    }

    #[test]
    fn test_get() {
        let entry = get("iso-date").unwrap();
        assert_eq!(
            emit(&entry.pattern().unwrap(), Dialect::Re2, false).pattern,
            r"(?P<year>\d{4})-(?P<month>\d{2})-(?P<day>\d{2})"
        );
        assert!(get("nope").is_none());
    }

    #[test]
    fn test_search_by_text_and_dialect() {
        let names = |hits: Vec<&LibraryEntry>| hits.iter().map(|e| e.name).collect::<Vec<_>>();
        assert_eq!(names(search("URL", None)), vec!["url", "slug"]);
        assert!(names(search("", Some(Dialect::Re2))).iter().all(|n| *n != "repeated-word"));
        assert!(names(search("", Some(Dialect::Re2))).iter().all(|n| *n != "strong-password"));
        assert_eq!(names(search("password", Some(Dialect::Pcre))), vec!["strong-password"]);
        assert_eq!(names(search("password", Some(Dialect::Js))), vec!["strong-password"]);
        assert_eq!(search("", Some(Dialect::Js)).len(), all().len());
        assert_eq!(search("", Some(Dialect::Re2)).len(), all().len() - 2);
    }
}
