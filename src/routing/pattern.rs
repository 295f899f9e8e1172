//! Route pattern parsing and segment matching.
//!
//! # Responsibilities
//! - Split patterns like `/did/:uid/socket` into literal and parameter segments
//! - Match a request path exactly (terminal routes) or by prefix (`use` routes)
//! - Bind parameter values by name
//!
//! # Design Decisions
//! - Literal segments are case-sensitive
//! - A parameter never matches an empty segment
//! - One leading and one trailing slash are ignored, so `/` has no segments

use std::collections::HashMap;
use std::fmt;

/// Parameters bound while matching, keyed by parameter name.
pub type Params = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern. `:name` segments become parameters.
    pub fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .into_iter()
            .map(|seg| match seg.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(seg.to_string()),
            })
            .collect();
        Self { segments }
    }

    /// Number of segments in this pattern.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns true for the root pattern `/`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Match the whole path. Segment counts must be equal.
    pub fn match_exact(&self, path: &str) -> Option<Params> {
        let parts = split_path(path);
        if parts.len() != self.segments.len() {
            return None;
        }
        self.bind(&parts)
    }

    /// Match the leading segments of the path.
    pub fn match_prefix(&self, path: &str) -> Option<Params> {
        let parts = split_path(path);
        if parts.len() < self.segments.len() {
            return None;
        }
        self.bind(&parts[..self.segments.len()])
    }

    /// Prepend another pattern's segments to this one.
    pub fn prefixed(&self, prefix: &Pattern) -> Pattern {
        let mut segments = prefix.segments.clone();
        segments.extend(self.segments.iter().cloned());
        Pattern { segments }
    }

    fn bind(&self, parts: &[&str]) -> Option<Params> {
        let mut params = Params::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some(params)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => write!(f, "/{}", lit)?,
                Segment::Param(name) => write!(f, "/:{}", name)?,
            }
        }
        Ok(())
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}
