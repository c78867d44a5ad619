//! Route pattern matching.
//!
//! # Responsibilities
//! - Match a request path against a route pattern
//! - Extract `:name` parameter bindings
//!
//! # Design Decisions
//! - Segment-wise comparison after splitting on `/`
//! - Segment counts must be equal (no wildcard-length segments)
//! - Literal segments are compared byte for byte (case-sensitive)
//! - Pure functions, no shared state: safe from any number of request tasks

use std::collections::HashMap;

/// Parameter bindings extracted from a matched path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    bindings: HashMap<String, String>,
}

impl PathParams {
    /// Create an empty binding set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a bound parameter by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    /// Bind `name` to `value`. A repeated name keeps the last binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Returns true if any segment of `pattern` is a `:name` parameter.
pub fn is_parameterized(pattern: &str) -> bool {
    pattern.split('/').any(|segment| segment.starts_with(':'))
}

/// Match `path` against `pattern`, returning the parameter bindings on success.
pub fn match_path(pattern: &str, path: &str) -> Option<PathParams> {
    let pattern_segments = pattern.split('/');
    let mut path_segments = path.split('/');
    let mut params = PathParams::new();

    for expected in pattern_segments {
        let actual = path_segments.next()?;
        match expected.strip_prefix(':') {
            Some(name) => params.insert(name, actual),
            None if expected == actual => {}
            None => return None,
        }
    }

    // Path has more segments than the pattern
    if path_segments.next().is_some() {
        return None;
    }

    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_named_segment() {
        let params = match_path("/article/:id", "/article/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn literal_pattern_matches_itself_without_bindings() {
        let params = match_path("/article", "/article").unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn segment_count_mismatch_never_matches() {
        assert!(match_path("/article/:id", "/article").is_none());
        assert!(match_path("/article/:id", "/article/42/comments").is_none());
        assert!(match_path("/article/:id", "/article/42/").is_none());
    }

    #[test]
    fn literal_segments_are_case_sensitive() {
        assert!(match_path("/Article/:id", "/article/1").is_none());
    }

    #[test]
    fn multiple_parameters() {
        let params = match_path("/shop/:shop/item/:item", "/shop/7/item/ab").unwrap();
        assert_eq!(params.get("shop"), Some("7"));
        assert_eq!(params.get("item"), Some("ab"));
    }

    #[test]
    fn parameter_may_bind_empty_segment() {
        let params = match_path("/article/:id", "/article/").unwrap();
        assert_eq!(params.get("id"), Some(""));
    }

    #[test]
    fn detects_parameterized_patterns() {
        assert!(is_parameterized("/article/:id"));
        assert!(!is_parameterized("/article"));
        assert!(!is_parameterized("/"));
    }
}
