//! Multi-segment content keys.
//!
//! A [`ContentKey`] is the path-like name of a content entity, e.g.
//! `["analytics", "events", "page_views"]`. Keys are validated at
//! construction: at least one segment, segments non-empty, and segments free
//! of `.` and control characters (the dot is reserved for the human-readable
//! rendering used in conflict messages).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Ordered, non-empty sequence of name segments identifying a content
/// entity. Equality and ordering are segment-wise.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentKey {
    elements: Vec<String>,
}

impl ContentKey {
    /// Create a key from its segments, validating each.
    pub fn new(elements: Vec<String>) -> Result<Self, TypeError> {
        if elements.is_empty() {
            return Err(TypeError::EmptyKey);
        }
        for segment in &elements {
            validate_segment(segment)?;
        }
        Ok(Self { elements })
    }

    /// Convenience constructor from string slices.
    pub fn of<S: AsRef<str>>(segments: &[S]) -> Result<Self, TypeError> {
        Self::new(segments.iter().map(|s| s.as_ref().to_string()).collect())
    }
}

fn validate_segment(segment: &str) -> Result<(), TypeError> {
    if segment.is_empty() {
        return Err(TypeError::InvalidKeySegment {
            segment: segment.to_string(),
            reason: "segment must not be empty".into(),
        });
    }
    if segment.contains('.') {
        return Err(TypeError::InvalidKeySegment {
            segment: segment.to_string(),
            reason: "segment must not contain '.'".into(),
        });
    }
    if segment.chars().any(char::is_control) {
        return Err(TypeError::InvalidKeySegment {
            segment: segment.to_string(),
            reason: "segment must not contain control characters".into(),
        });
    }
    Ok(())
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({self})")
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.elements.join("."))
    }
}
