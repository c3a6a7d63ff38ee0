//! # Hierarchical Paths
//!
//! Dot-segmented keys into the leaf namespace, plus the structural
//! predicate algebra used by queries and deletes.
//!
//! ## Invariants
//! - PATH-1: segments are non-empty; the empty path is the namespace root
//! - PATH-2: ordering is segment-wise, not lexicographic over the joined form
//! - PATH-3: indexed segments (`tags[0]`) are ordinary segments for matching

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between path segments in the textual form.
pub const SEPARATOR: char = '.';

/// Path parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A segment between two separators was empty
    #[error("empty segment in path {0:?}")]
    EmptySegment(String),
}

/// A key into the global leaf namespace.
///
/// Ordered segment-wise, so `a.b < a.b.c < a.c` regardless of segment
/// lengths. The root path has no segments and addresses the whole
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HierarchicalPath {
    segments: Vec<String>,
}

impl HierarchicalPath {
    /// The empty path (namespace root).
    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    /// Parse a dot-separated path. The empty string parses to the root.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in s.split(SEPARATOR) {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(s.to_string()));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Build a path from pre-validated segments. Empty segments are skipped.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// True for the namespace root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True when the path has no segments.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path's segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment, if any. Used for per-root write serialization.
    pub fn first_segment(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Extend with one segment.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self { segments }
    }

    /// Rewrite the last segment into its indexed form (`tags` -> `tags[0]`).
    ///
    /// On the root path this produces a single `[i]` segment, matching the
    /// flattening of a top-level sequence.
    pub fn with_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        match segments.last_mut() {
            Some(last) => last.push_str(&format!("[{}]", index)),
            None => segments.push(format!("[{}]", index)),
        }
        Self { segments }
    }

    /// Append all of `other`'s segments.
    pub fn join(&self, other: &Self) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Segment-bounded prefix test: `a.b` is a prefix of `a.b.c` but not of
    /// `a.bc`.
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Segment-bounded suffix test.
    pub fn ends_with(&self, suffix: &Self) -> bool {
        self.segments.len() >= suffix.segments.len()
            && self.segments[self.segments.len() - suffix.segments.len()..]
                == suffix.segments[..]
    }

    /// True when `needle`'s segments appear contiguously anywhere in self.
    pub fn contains(&self, needle: &Self) -> bool {
        if needle.segments.is_empty() {
            return true;
        }
        if needle.segments.len() > self.segments.len() {
            return false;
        }
        self.segments
            .windows(needle.segments.len())
            .any(|w| w == needle.segments.as_slice())
    }

    /// Remainder after removing `prefix`, or `None` when `prefix` does not
    /// structurally prefix this path.
    pub fn strip_prefix(&self, prefix: &Self) -> Option<Self> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(Self {
            segments: self.segments[prefix.segments.len()..].to_vec(),
        })
    }
}

impl fmt::Display for HierarchicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for HierarchicalPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HierarchicalPath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<HierarchicalPath> for String {
    fn from(path: HierarchicalPath) -> String {
        path.to_string()
    }
}

/// Splits an indexed segment (`tags[3]`) into its name and index.
///
/// Returns `None` for ordinary segments. Only reconstruction interprets the
/// indexed form; matching treats it as an opaque segment (PATH-3).
pub fn index_parts(segment: &str) -> Option<(&str, usize)> {
    let open = segment.rfind('[')?;
    let close = segment.rfind(']')?;
    if close != segment.len() - 1 || close <= open {
        return None;
    }
    let index: usize = segment[open + 1..close].parse().ok()?;
    Some((&segment[..open], index))
}

/// Structural path predicate, evaluated segment-wise.
///
/// These mirror the pattern set the store exposes for queries and deletes.
/// All variants except `Contains` anchor at the path boundary they name;
/// `Contains` matches the segment sequence anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPredicate {
    /// Path begins with the given segments (root prefix matches everything).
    StartsWith(HierarchicalPath),
    /// Path ends with the given segments.
    EndsWith(HierarchicalPath),
    /// Path contains the given segments contiguously, anywhere.
    Contains(HierarchicalPath),
    /// Path both begins with the first and ends with the second.
    StartsAndEndsWith(HierarchicalPath, HierarchicalPath),
    /// Exact path equality.
    Equals(HierarchicalPath),
    /// Anything but the given path.
    NotEquals(HierarchicalPath),
}

impl PathPredicate {
    /// Evaluate the predicate against a path.
    pub fn matches(&self, path: &HierarchicalPath) -> bool {
        match self {
            Self::StartsWith(p) => path.starts_with(p),
            Self::EndsWith(p) => path.ends_with(p),
            Self::Contains(p) => path.contains(p),
            Self::StartsAndEndsWith(a, b) => path.starts_with(a) && path.ends_with(b),
            Self::Equals(p) => path == p,
            Self::NotEquals(p) => path != p,
        }
    }
}
