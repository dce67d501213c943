//! Longest-prefix route tables.
//!
//! [`Router`] maps path patterns to values. It backs both protocol routing
//! inside a [`MuxDestination`](crate::MuxDestination) and address routing in
//! a [`RouteAddressBook`](crate::RouteAddressBook).
//!
//! # Matching rules
//!
//! - Paths and patterns are normalized to start with `/` (an empty string
//!   becomes `/`).
//! - A pattern ending in `/` matches every path it prefixes.
//! - Any other pattern matches only the identical path.
//! - When several patterns match, the longest one wins. Registration order
//!   does not matter.
//!
//! ```rust
//! use courier_core::Router;
//!
//! let router = Router::new();
//! router.bind("/a/", "a");
//! router.bind("/a/b/", "ab");
//!
//! assert_eq!(router.lookup("/a/b/c"), Some("ab"));
//! assert_eq!(router.lookup("/a/x"), Some("a"));
//! assert_eq!(router.lookup("/b"), None);
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;

/// Separator that marks prefix patterns.
pub const SEPARATOR: char = '/';

/// Normalizes a path or pattern so that it starts with the separator.
pub fn normalize(path: &str) -> Cow<'_, str> {
    if path.starts_with(SEPARATOR) {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("{SEPARATOR}{path}"))
    }
}

/// Returns `true` if the normalized `pattern` matches the normalized `path`.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    if pattern.ends_with(SEPARATOR) {
        path.starts_with(pattern)
    } else {
        pattern == path
    }
}

/// A concurrent longest-prefix route table.
///
/// Lookups take a read lock; binding takes a write lock. Tables are usually
/// filled once and then read from many tasks.
pub struct Router<T> {
    routes: RwLock<HashMap<String, T>>,
}

impl<T> Router<T> {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Binds `value` to `pattern`, returning the value previously bound to
    /// the same normalized pattern.
    pub fn bind(&self, pattern: &str, value: T) -> Option<T> {
        let pattern = normalize(pattern).into_owned();
        self.routes.write().insert(pattern, value)
    }

    /// Removes the binding for `pattern`.
    pub fn unbind(&self, pattern: &str) -> Option<T> {
        self.routes.write().remove(normalize(pattern).as_ref())
    }

    /// Returns the number of bound patterns.
    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    /// Returns the bound patterns, longest first.
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self.routes.read().keys().cloned().collect();
        patterns.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        patterns
    }
}

impl<T: Clone> Router<T> {
    /// Returns the value of the longest pattern matching `path`.
    pub fn lookup(&self, path: &str) -> Option<T> {
        self.lookup_route(path).map(|(_, value)| value)
    }

    /// Returns the longest pattern matching `path` together with its value.
    pub fn lookup_route(&self, path: &str) -> Option<(String, T)> {
        let path = normalize(path);
        let routes = self.routes.read();

        routes
            .iter()
            .filter(|(pattern, _)| pattern_matches(pattern, &path))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(pattern, value)| (pattern.clone(), value.clone()))
    }
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Router<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("patterns", &self.patterns())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("a/b"), "/a/b");
        assert_eq!(normalize("/a/b"), "/a/b");
    }

    #[test]
    fn test_exact_pattern() {
        let router = Router::new();
        router.bind("/echo", 1);

        assert_eq!(router.lookup("/echo"), Some(1));
        assert_eq!(router.lookup("echo"), Some(1));
        assert_eq!(router.lookup("/echo/more"), None);
        assert_eq!(router.lookup("/ech"), None);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let router = Router::new();
        // Registered shortest-last to show order does not matter.
        router.bind("/a/b/", "ab");
        router.bind("/a/", "a");

        assert_eq!(router.lookup("/a/b/c"), Some("ab"));
        assert_eq!(router.lookup("/a/x"), Some("a"));
        assert_eq!(router.lookup("/a/b"), Some("a"));
        assert_eq!(router.lookup_route("/a/b/c").unwrap().0, "/a/b/");
    }

    #[test]
    fn test_exact_beats_shorter_prefix() {
        let router = Router::new();
        router.bind("/", "root");
        router.bind("/a/exact", "exact");

        assert_eq!(router.lookup("/a/exact"), Some("exact"));
        assert_eq!(router.lookup("/a/other"), Some("root"));
        assert_eq!(router.lookup(""), Some("root"));
    }

    #[test]
    fn test_rebind_replaces() {
        let router = Router::new();
        assert_eq!(router.bind("x/", 1), None);
        assert_eq!(router.bind("/x/", 2), Some(1));
        assert_eq!(router.len(), 1);
        assert_eq!(router.lookup("/x/y"), Some(2));

        assert_eq!(router.unbind("x/"), Some(2));
        assert!(router.is_empty());
    }

    #[test]
    fn test_patterns_longest_first() {
        let router = Router::new();
        router.bind("/a/", ());
        router.bind("/a/b/", ());
        router.bind("/", ());

        assert_eq!(router.patterns(), vec!["/a/b/", "/a/", "/"]);
    }
}
