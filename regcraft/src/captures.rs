//! Capture map for emitted patterns
//!
//! This module tracks the capture groups of a pattern tree, mapping capture
//! keys to 1-based group indices. Named groups are keyed by name; unnamed
//! groups by their decimal ordinal (`"1"`, `"2"`, ...). The map is derived at
//! emission time and is never stored in the tree.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::pattern::{BackrefTarget, Pattern};

/// Information about a capture group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupInfo {
    /// The index of the group (1-based, as in `\1`, `\2`)
    pub index: u32,
    /// The name of the group, if it is named
    pub name: Option<String>,
}

/// Name-or-ordinal to group index map, built left to right
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureMap {
    groups: Vec<GroupInfo>,
    by_key: BTreeMap<String, u32>,
}

impl CaptureMap {
    /// Create an empty map
    pub fn new() -> Self {
        CaptureMap::default()
    }

    /// Build the map for a tree by counting `Group` nodes in pre-order
    ///
    /// Duplicate names are tolerated here, the first one keeps the key; use
    /// [`CaptureMap::collect_strict`] to reject them.
    pub fn collect(tree: &Pattern) -> Self {
        let mut map = CaptureMap::new();
        map.visit(tree, &mut |_| {});
        map
    }

    /// Build the map, failing on a duplicate group name or on a
    /// backreference to a group that does not exist
    pub fn collect_strict(tree: &Pattern) -> Result<Self, CaptureMapError> {
        let mut map = CaptureMap::new();
        let mut first_error = None;
        map.visit(tree, &mut |err| {
            if first_error.is_none() {
                first_error = Some(err);
            }
        });
        if let Some(err) = first_error {
            return Err(err);
        }
        map.check_backrefs(tree)?;
        Ok(map)
    }

    fn check_backrefs(&self, node: &Pattern) -> Result<(), CaptureMapError> {
        match node {
            Pattern::Backreference(BackrefTarget::Index(index)) => {
                self.validate_backref_index(index.get())?;
            }
            Pattern::Backreference(BackrefTarget::Name(name)) => {
                self.validate_backref_name(name.as_str())?;
            }
            _ => {}
        }
        node.children()
            .into_iter()
            .try_for_each(|child| self.check_backrefs(child))
    }

    fn visit(&mut self, node: &Pattern, on_error: &mut dyn FnMut(CaptureMapError)) {
        if let Pattern::Group(group) = node {
            let name = group.name.as_ref().map(|n| n.as_str().to_string());
            if let Err(err) = self.register_group(name) {
                on_error(err);
            }
        }
        for child in node.children() {
            self.visit(child, on_error);
        }
    }

    /// Register the next group and return its index
    ///
    /// # Errors
    /// Returns an error if the name is already in use; the group still
    /// consumes an index so later groups keep their engine numbering.
    pub fn register_group(&mut self, name: Option<String>) -> Result<u32, CaptureMapError> {
        let index = self.groups.len() as u32 + 1;
        self.groups.push(GroupInfo {
            index,
            name: name.clone(),
        });
        match name {
            Some(name) => {
                if self.by_key.contains_key(&name) {
                    return Err(CaptureMapError::DuplicateName(name));
                }
                self.by_key.insert(name, index);
            }
            None => {
                self.by_key.insert(index.to_string(), index);
            }
        }
        Ok(index)
    }

    /// Index for a capture key (a name, or a decimal ordinal)
    pub fn get(&self, key: &str) -> Option<u32> {
        self.by_key.get(key).copied()
    }

    /// Total number of capture groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// All groups in index order
    pub fn groups(&self) -> &[GroupInfo] {
        &self.groups
    }

    /// Key to index entries in key order
    pub fn entries(&self) -> impl Iterator<Item = (&str, u32)> {
        self.by_key.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Whether a backreference index refers to an existing group
    pub fn validate_backref_index(&self, index: u32) -> Result<u32, CaptureMapError> {
        if index == 0 || index as usize > self.groups.len() {
            Err(CaptureMapError::InvalidBackreference(index))
        } else {
            Ok(index)
        }
    }

    /// Resolve a backreference name to an index
    pub fn validate_backref_name(&self, name: &str) -> Result<u32, CaptureMapError> {
        self.groups
            .iter()
            .find(|g| g.name.as_deref() == Some(name))
            .map(|g| g.index)
            .ok_or_else(|| CaptureMapError::UndefinedBackreference(name.to_string()))
    }
}

/// Errors that can occur while building a capture map
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureMapError {
    /// A group name is used more than once
    #[error("duplicate group name: {0}")]
    DuplicateName(String),
    /// A backreference refers to a non-existent named group
    #[error("undefined backreference: {0}")]
    UndefinedBackreference(String),
    /// A backreference number is out of range
    #[error("invalid backreference number: {0}")]
    InvalidBackreference(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_unnamed_group() {
        let mut map = CaptureMap::new();
        let index = map.register_group(None).unwrap();
        assert_eq!(index, 1);
        assert_eq!(map.get("1"), Some(1));
    }

    #[test]
    fn test_register_mixed_groups() {
        let mut map = CaptureMap::new();
        assert_eq!(map.register_group(Some("first".to_string())).unwrap(), 1);
        assert_eq!(map.register_group(None).unwrap(), 2);
        assert_eq!(map.register_group(Some("third".to_string())).unwrap(), 3);

        assert_eq!(map.get("first"), Some(1));
        assert_eq!(map.get("2"), Some(2));
        assert_eq!(map.get("third"), Some(3));
        assert_eq!(map.group_count(), 3);
    }

    #[test]
    fn test_duplicate_name_error() {
        let mut map = CaptureMap::new();
        map.register_group(Some("name".to_string())).unwrap();
        let result = map.register_group(Some("name".to_string()));
        assert!(matches!(result, Err(CaptureMapError::DuplicateName(_))));
        // the duplicate still occupies index 2
        assert_eq!(map.group_count(), 2);
        assert_eq!(map.get("name"), Some(1));
    }

    #[test]
    fn test_collect_nested_groups_in_preorder() {
        let tree = Pattern::named_group(
            "outer",
            Pattern::sequence(vec![
                Pattern::group(Pattern::literal("a")),
                Pattern::named_group("inner", Pattern::literal("b")).unwrap(),
            ]),
        )
        .unwrap();

        let map = CaptureMap::collect(&tree);
        assert_eq!(map.get("outer"), Some(1));
        assert_eq!(map.get("2"), Some(2));
        assert_eq!(map.get("inner"), Some(3));
    }

    #[test]
    fn test_collect_strict_rejects_duplicates() {
        let tree = Pattern::sequence(vec![
            Pattern::named_group("dup", Pattern::literal("a")).unwrap(),
            Pattern::named_group("dup", Pattern::literal("b")).unwrap(),
        ]);
        assert_eq!(
            CaptureMap::collect_strict(&tree),
            Err(CaptureMapError::DuplicateName("dup".to_string()))
        );
        assert_eq!(CaptureMap::collect(&tree).group_count(), 2);
    }

    #[test]
    fn test_validate_backrefs() {
        let mut map = CaptureMap::new();
        map.register_group(Some("word".to_string())).unwrap();
        map.register_group(None).unwrap();

        assert_eq!(map.validate_backref_index(2).unwrap(), 2);
        assert_eq!(
            map.validate_backref_index(3),
            Err(CaptureMapError::InvalidBackreference(3))
        );
        assert_eq!(
            map.validate_backref_index(0),
            Err(CaptureMapError::InvalidBackreference(0))
        );
        assert_eq!(map.validate_backref_name("word").unwrap(), 1);
        assert!(map.validate_backref_name("missing").is_err());
    }

    #[test]
    fn test_collect_strict_checks_backreferences() {
        let word = || Pattern::named_group("word", Pattern::one_or_more(Pattern::word())).unwrap();

        let valid = Pattern::sequence(vec![word(), Pattern::backref_name("word").unwrap()]);
        assert_eq!(CaptureMap::collect_strict(&valid).unwrap().get("word"), Some(1));

        let dangling = Pattern::sequence(vec![word(), Pattern::backref_index(5).unwrap()]);
        assert_eq!(
            CaptureMap::collect_strict(&dangling),
            Err(CaptureMapError::InvalidBackreference(5))
        );

        let undefined = Pattern::sequence(vec![word(), Pattern::backref_name("other").unwrap()]);
        assert_eq!(
            CaptureMap::collect_strict(&undefined),
            Err(CaptureMapError::UndefinedBackreference("other".to_string()))
        );
    }
}
