//! Slash-delimited paths into the state tree and the patterns used to
//! subscribe to them.
//!
//! A pattern such as `sticks/:stickId/children/:childId/:key` is parsed once
//! into a list of literal and capture segments. Matching a concrete path is
//! a segment-by-segment comparison: the segment counts must be equal, a
//! literal must match exactly, and a capture takes exactly one segment.

use crate::error::StateError;
use std::fmt;
use std::str::FromStr;

/// Splits a path into its non-empty segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Joins segments into a path.
pub fn join(parts: &[&str]) -> String {
    parts.join("/")
}

/// Splits `a/b/c` into (`a/b`, `c`).
pub fn split_last(path: &str) -> Option<(&str, &str)> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(index) => Some((&trimmed[..index], &trimmed[index + 1..])),
        None if !trimmed.is_empty() => Some(("", trimmed)),
        None => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Capture(String),
}

/// Named segment values captured while matching a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures(Vec<(String, String)>);

impl Captures {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A pre-parsed subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, StateError> {
        let invalid = |reason: &str| StateError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: reason.to_owned(),
        };

        let mut parsed = Vec::new();
        for segment in segments(pattern) {
            match segment.strip_prefix(':') {
                Some("") => return Err(invalid("capture segment without a name")),
                Some(name) => {
                    let taken = parsed
                        .iter()
                        .any(|s| matches!(s, Segment::Capture(existing) if existing == name));
                    if taken {
                        return Err(invalid("capture name used twice"));
                    }
                    parsed.push(Segment::Capture(name.to_owned()));
                }
                None => parsed.push(Segment::Literal(segment.to_owned())),
            }
        }

        if parsed.is_empty() {
            return Err(invalid("pattern has no segments"));
        }

        Ok(PathPattern {
            source: pattern.to_owned(),
            segments: parsed,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Matches a concrete path, returning the captured segments on success.
    pub fn matches(&self, path: &str) -> Option<Captures> {
        let mut captures = Vec::new();
        let mut concrete = segments(path);

        for expected in &self.segments {
            let actual = concrete.next()?;
            match expected {
                Segment::Literal(literal) if literal == actual => {}
                Segment::Literal(_) => return None,
                Segment::Capture(name) => captures.push((name.clone(), actual.to_owned())),
            }
        }

        if concrete.next().is_some() {
            return None;
        }

        Some(Captures(captures))
    }
}

impl FromStr for PathPattern {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathPattern::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_last() {
        assert_eq!(split_last("logs/2"), Some(("logs", "2")));
        assert_eq!(split_last("sticks/1/children/marshmallow/texture"), Some(("sticks/1/children/marshmallow", "texture")));
        assert_eq!(split_last("ready"), Some(("", "ready")));
        assert_eq!(split_last(""), None);
    }

    #[test]
    fn test_literal_pattern() {
        let pattern = PathPattern::parse("ready").unwrap();
        assert!(pattern.matches("ready").unwrap().is_empty());
        assert!(pattern.matches("ready/now").is_none());
        assert!(pattern.matches("steady").is_none());
    }

    #[test]
    fn test_single_capture() {
        let pattern = PathPattern::parse("smallFire/:key").unwrap();
        let captures = pattern.matches("smallFire/scale").unwrap();
        assert_eq!(captures.get("key"), Some("scale"));
        assert_eq!(captures.len(), 1);
        assert!(pattern.matches("largeFire/scale").is_none());
    }

    #[test]
    fn test_segment_count_must_match() {
        let pattern = PathPattern::parse("logs/:modelId").unwrap();
        assert!(pattern.matches("logs/1").is_some());
        assert!(pattern.matches("logs/1/x").is_none());
        assert!(pattern.matches("logs").is_none());
    }

    #[test]
    fn test_nested_captures() {
        let pattern = PathPattern::parse("sticks/:stickId/children/:childId/:key").unwrap();
        let captures = pattern
            .matches("sticks/2/children/marshmallow/texture")
            .unwrap();
        assert_eq!(captures.get("stickId"), Some("2"));
        assert_eq!(captures.get("childId"), Some("marshmallow"));
        assert_eq!(captures.get("key"), Some("texture"));
        assert!(pattern.matches("sticks/2/parents/marshmallow/texture").is_none());
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(PathPattern::parse("").is_err());
        assert!(PathPattern::parse("logs/:").is_err());
        assert!(PathPattern::parse("a/:id/b/:id").is_err());
        assert!("fox/:key".parse::<PathPattern>().is_ok());
    }
}
