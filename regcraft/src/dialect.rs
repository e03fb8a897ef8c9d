//! Regex dialects understood by the emitter, tester and converter

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A regex engine flavor with its own supported-feature set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// ECMAScript regular expressions
    #[default]
    Js,
    /// Perl-compatible regular expressions
    Pcre,
    /// Linear-time engines without backreferences or look-around
    Re2,
}

impl Dialect {
    /// All dialects, in a stable order
    pub const ALL: [Dialect; 3] = [Dialect::Js, Dialect::Pcre, Dialect::Re2];

    /// The lowercase name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Js => "js",
            Dialect::Pcre => "pcre",
            Dialect::Re2 => "re2",
        }
    }

    /// Whether the dialect supports backreferences
    pub fn supports_backreferences(&self) -> bool {
        !matches!(self, Dialect::Re2)
    }

    /// Whether the dialect supports lookahead and lookbehind
    pub fn supports_lookaround(&self) -> bool {
        !matches!(self, Dialect::Re2)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "js" | "javascript" | "ecmascript" => Ok(Dialect::Js),
            "pcre" => Ok(Dialect::Pcre),
            "re2" => Ok(Dialect::Re2),
            other => Err(Error::InvalidParameter {
                parameter: "dialect".to_string(),
                reason: format!("unknown dialect '{}'", other),
            }),
        }
    }
}
