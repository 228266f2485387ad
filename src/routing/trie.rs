//! Prefix trie over path segments.
//!
//! # Responsibilities
//! - Store one leaf per fully-qualified segment path
//! - Deepest-match lookup for request dispatch
//! - Reject double registration with an error naming the path
//!
//! # Design Decisions
//! - Children kept sorted by name; lookup is a binary search per step
//! - The same structure stores path prefixes and reversed domain suffixes
//! - Frozen after registration, so the serve path reads without locks

use thiserror::Error;

/// Error returned when a leaf cannot be inserted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrieError {
    /// A leaf is already registered at this path. The payload is the
    /// `": "`-joined segment path as traversed from the insertion root.
    #[error("{0}: leaf already exists")]
    LeafExists(String),
}

/// A node in the trie. The root has an empty name.
#[derive(Debug)]
pub struct Trie<T> {
    name: String,
    children: Vec<Trie<T>>,
    leaf: Option<T>,
}

impl<T> Trie<T> {
    /// Creates an empty, leafless trie root.
    pub fn new() -> Self {
        Self::named(String::new())
    }

    /// Creates a trie root that already carries a leaf.
    pub fn with_leaf(leaf: T) -> Self {
        Self {
            name: String::new(),
            children: Vec::new(),
            leaf: Some(leaf),
        }
    }

    fn named(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
            leaf: None,
        }
    }

    /// The segment name of this node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The leaf registered at this node, if any.
    pub fn leaf(&self) -> Option<&T> {
        self.leaf.as_ref()
    }

    /// Inserts `leaf` at the given segment path, creating intermediate nodes
    /// as needed and keeping siblings sorted. Fails if a leaf already exists
    /// at the full path; intermediate nodes are left in place in that case.
    pub fn insert(&mut self, segments: &[String], leaf: T) -> Result<(), TrieError> {
        if segments.is_empty() {
            if self.leaf.is_some() {
                return Err(TrieError::LeafExists(self.name.clone()));
            }
            self.leaf = Some(leaf);
            return Ok(());
        }

        let next = &segments[0];
        let idx = match self.children.iter().position(|c| &c.name == next) {
            Some(idx) => idx,
            None => {
                let child = Trie::named(next.clone());
                let idx = self
                    .children
                    .binary_search_by(|c| c.name.cmp(&child.name))
                    .unwrap_err();
                self.children.insert(idx, child);
                idx
            }
        };

        match self.children[idx].insert(&segments[1..], leaf) {
            Err(TrieError::LeafExists(path)) if !self.name.is_empty() => {
                Err(TrieError::LeafExists(format!("{}: {}", self.name, path)))
            }
            other => other,
        }
    }

    /// Returns the leaf at exactly the given segment path, mutably.
    pub fn get_mut(&mut self, segments: &[&str]) -> Option<&mut T> {
        match segments.split_first() {
            None => self.leaf.as_mut(),
            Some((piece, rest)) => {
                let idx = self
                    .children
                    .binary_search_by(|c| c.name.as_str().cmp(piece))
                    .ok()?;
                self.children[idx].get_mut(rest)
            }
        }
    }

    /// Finds the deepest descendant with a present leaf whose segment path is
    /// a prefix of `segments`, returning how many segments were consumed to
    /// reach it. When nothing below matches, returns `(0, self)` — which may
    /// itself be leafless; callers that guarantee a leaf at their root (as
    /// every Domain does) can always dereference the result.
    pub fn find<'a>(&'a self, segments: &[&str]) -> (usize, &'a Trie<T>) {
        let Some((piece, rest)) = segments.split_first() else {
            return (0, self);
        };

        if let Ok(idx) = self
            .children
            .binary_search_by(|c| c.name.as_str().cmp(piece))
        {
            let (n, found) = self.children[idx].find(rest);
            if found.leaf.is_some() {
                return (n + 1, found);
            }
        }
        (0, self)
    }
}

impl<T> Default for Trie<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn insert_creates_sorted_children() {
        let mut trie: Trie<&str> = Trie::new();
        trie.insert(&segs(&["foo", "baz"]), "/foo/baz handler").unwrap();
        trie.insert(&segs(&["foo", "bar"]), "/foo/bar handler").unwrap();

        let (_, foo) = trie.find(&["foo"]);
        // "foo" has no leaf, so find stays at the root; walk manually.
        assert!(foo.leaf().is_none());
        let (n, bar) = trie.find(&["foo", "bar"]);
        assert_eq!(n, 2);
        assert_eq!(bar.leaf(), Some(&"/foo/bar handler"));
        assert_eq!(bar.name(), "bar");
    }

    #[test]
    fn insert_rejects_existing_leaf_with_path() {
        let mut trie: Trie<&str> = Trie::new();
        trie.insert(&segs(&["foo", "baz"]), "first").unwrap();
        let err = trie.insert(&segs(&["foo", "baz"]), "second").unwrap_err();
        assert_eq!(err.to_string(), "foo: baz: leaf already exists");
        // The original leaf survives the failed insert.
        let (n, found) = trie.find(&["foo", "baz"]);
        assert_eq!((n, found.leaf()), (2, Some(&"first")));
    }

    #[test]
    fn find_returns_deepest_leaf_prefix() {
        let mut trie: Trie<&str> = Trie::with_leaf("/");
        trie.insert(&segs(&["foo"]), "/foo").unwrap();
        trie.insert(&segs(&["foo", "bar"]), "/foo/bar").unwrap();
        trie.insert(&segs(&["foo", "baz"]), "/foo/baz").unwrap();

        let cases: &[(&[&str], usize, &str)] = &[
            (&[], 0, "/"),
            (&["fox"], 0, "/"),
            (&["foo"], 1, "/foo"),
            (&["foo", "bar"], 2, "/foo/bar"),
            (&["foo", "baz"], 2, "/foo/baz"),
            (&["foo", "qux"], 1, "/foo"),
            (&["foo", "bar", "deep"], 2, "/foo/bar"),
        ];
        for (query, want_n, want_leaf) in cases {
            let (n, found) = trie.find(query);
            assert_eq!(n, *want_n, "query {query:?}");
            assert_eq!(found.leaf(), Some(want_leaf), "query {query:?}");
        }
    }

    #[test]
    fn find_skips_leafless_intermediates() {
        let mut trie: Trie<&str> = Trie::with_leaf("root");
        trie.insert(&segs(&["a", "b", "c"]), "deep").unwrap();

        // "a" and "a/b" exist but carry no leaf: the root is the best match.
        let (n, found) = trie.find(&["a", "b"]);
        assert_eq!(n, 0);
        assert_eq!(found.leaf(), Some(&"root"));

        let (n, found) = trie.find(&["a", "b", "c"]);
        assert_eq!(n, 3);
        assert_eq!(found.leaf(), Some(&"deep"));
    }

    #[test]
    fn slash_twins_are_distinct() {
        let mut trie: Trie<&str> = Trie::new();
        trie.insert(&segs(&["dir"]), "file").unwrap();
        trie.insert(&segs(&["dir/"]), "dir").unwrap();

        let (_, found) = trie.find(&["dir"]);
        assert_eq!(found.leaf(), Some(&"file"));
        let (_, found) = trie.find(&["dir/"]);
        assert_eq!(found.leaf(), Some(&"dir"));
    }

    #[test]
    fn get_mut_is_exact() {
        let mut trie: Trie<&str> = Trie::new();
        trie.insert(&segs(&["com", "example"]), "leaf").unwrap();
        assert!(trie.get_mut(&["com"]).is_none());
        assert!(trie.get_mut(&["com", "example", "www"]).is_none());
        assert_eq!(trie.get_mut(&["com", "example"]), Some(&mut "leaf"));
    }
}
