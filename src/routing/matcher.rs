//! Path matching logic.
//!
//! # Responsibilities
//! - Segment-class matching: `root/<segment>/...` for a fixed segment set
//! - Literal prefix matching (catch-all under an API root)
//! - Match-everything default
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Segments match whole path segments, never substrings
//! - No regex to guarantee O(n) matching

use std::collections::BTreeSet;
use std::fmt;

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;

    /// Short human-readable form for logs and the CLI.
    fn describe(&self) -> String;
}

/// Matches `root + "/" + segment + "/"` where `segment` is in a fixed set.
#[derive(Debug, Clone)]
pub struct SegmentMatcher {
    root: String,
    segments: BTreeSet<String>,
}

impl SegmentMatcher {
    /// Create a segment matcher. A trailing `/` on `root` is ignored.
    pub fn new<I, S>(root: &str, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.trim_end_matches('/').to_string(),
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// The leading segment the path would be dispatched on, if under `root`.
    fn first_segment<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.root.as_str())?.strip_prefix('/')?;
        rest.split_once('/').map(|(segment, _)| segment)
    }
}

impl Matcher for SegmentMatcher {
    fn matches(&self, path: &str) -> bool {
        self.first_segment(path)
            .map(|segment| self.segments.contains(segment))
            .unwrap_or(false)
    }

    fn describe(&self) -> String {
        let segments: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        format!("{}/({})/", self.root, segments.join("|"))
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    fn describe(&self) -> String {
        format!("{}*", self.prefix)
    }
}

/// Matches every path.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyMatcher;

impl Matcher for AnyMatcher {
    fn matches(&self, _path: &str) -> bool {
        true
    }

    fn describe(&self) -> String {
        "*".to_string()
    }
}
