//! Compiled patterns backed by real regex engines
//!
//! `re2` patterns compile with the linear-time [`regex`] crate; `js` and
//! `pcre` patterns need backreferences and look-around, so they compile with
//! [`fancy_regex`], which bounds its backtracking with a step limit.

use std::collections::BTreeMap;

use crate::dialect::Dialect;
use crate::error::CompileError;

/// Default backtracking step limit for the backtracking engine
pub const DEFAULT_BACKTRACK_LIMIT: usize = 1_000_000;

/// A pattern compiled for a specific dialect
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    /// Compiled with the linear-time engine
    Linear(regex::Regex),
    /// Compiled with the backtracking engine
    Backtracking(fancy_regex::Regex),
}

/// Why a match attempt did not produce a verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The backtracking engine gave up after its step limit
    BacktrackLimitExceeded,
    /// Any other runtime failure
    Runtime(String),
}

impl CompiledPattern {
    /// Compile `pattern` with the engine for `dialect`
    pub fn compile(pattern: &str, dialect: Dialect, backtrack_limit: usize) -> Result<Self, CompileError> {
        let compile_error = |message: String| CompileError {
            pattern: pattern.to_string(),
            dialect,
            message,
        };
        match dialect {
            Dialect::Re2 => regex::Regex::new(pattern)
                .map(CompiledPattern::Linear)
                .map_err(|e| compile_error(e.to_string())),
            Dialect::Js | Dialect::Pcre => fancy_regex::RegexBuilder::new(pattern)
                .backtrack_limit(backtrack_limit)
                .build()
                .map(CompiledPattern::Backtracking)
                .map_err(|e| compile_error(e.to_string())),
        }
    }

    /// Whether the pattern matches anywhere in `input`
    pub fn is_match(&self, input: &str) -> Result<bool, ExecError> {
        match self {
            CompiledPattern::Linear(re) => Ok(re.is_match(input)),
            CompiledPattern::Backtracking(re) => re.is_match(input).map_err(exec_error),
        }
    }

    /// Captured substrings of the first match, keyed by group name and by index
    ///
    /// Every participating group appears under its decimal index; named
    /// groups also appear under their name. Returns `None` when there is no
    /// match.
    pub fn captures(&self, input: &str) -> Result<Option<BTreeMap<String, String>>, ExecError> {
        match self {
            CompiledPattern::Linear(re) => {
                let Some(caps) = re.captures(input) else {
                    return Ok(None);
                };
                let mut out = BTreeMap::new();
                for (index, name) in re.capture_names().enumerate().skip(1) {
                    if let Some(m) = caps.get(index) {
                        out.insert(index.to_string(), m.as_str().to_string());
                        if let Some(name) = name {
                            out.insert(name.to_string(), m.as_str().to_string());
                        }
                    }
                }
                Ok(Some(out))
            }
            CompiledPattern::Backtracking(re) => {
                let Some(caps) = re.captures(input).map_err(exec_error)? else {
                    return Ok(None);
                };
                let mut out = BTreeMap::new();
                for (index, name) in re.capture_names().enumerate().skip(1) {
                    if let Some(m) = caps.get(index) {
                        out.insert(index.to_string(), m.as_str().to_string());
                        if let Some(name) = name {
                            out.insert(name.to_string(), m.as_str().to_string());
                        }
                    }
                }
                Ok(Some(out))
            }
        }
    }

    /// Number of capture groups, excluding the whole match
    pub fn group_count(&self) -> usize {
        match self {
            CompiledPattern::Linear(re) => re.captures_len().saturating_sub(1),
            CompiledPattern::Backtracking(re) => re.captures_len().saturating_sub(1),
        }
    }
}

fn exec_error(err: fancy_regex::Error) -> ExecError {
    match err {
        fancy_regex::Error::RuntimeError(fancy_regex::RuntimeError::BacktrackLimitExceeded) => {
            ExecError::BacktrackLimitExceeded
        }
        other => ExecError::Runtime(other.to_string()),
    }
}
