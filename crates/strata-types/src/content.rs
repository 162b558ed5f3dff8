//! Content identity and record atoms.
//!
//! The engine never interprets content bytes. A content entity is identified
//! by a [`ContentId`] that stays stable across key renames and type changes;
//! the [`ContentType`] discriminator is opaque to the engine except for the
//! decision whether a type carries shared global state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::key::ContentKey;

/// Globally unique identifier of a logical content entity across its
/// lifetime (survives renames and type changes).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque content-type discriminator carried through puts and key lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentType(pub u8);

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single put: key, content identity, and the reference-local value bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWithBytes {
    pub key: ContentKey,
    pub content_id: ContentId,
    pub content_type: ContentType,
    pub value: Vec<u8>,
}

impl KeyWithBytes {
    pub fn new(
        key: ContentKey,
        content_id: ContentId,
        content_type: ContentType,
        value: Vec<u8>,
    ) -> Self {
        Self {
            key,
            content_id,
            content_type,
            value,
        }
    }

    /// The key-list form of this put (identity without the value bytes).
    pub fn to_key_with_type(&self) -> KeyWithType {
        KeyWithType {
            key: self.key.clone(),
            content_id: self.content_id.clone(),
            content_type: self.content_type,
        }
    }
}

/// A key-list entry: a live key with its content identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyWithType {
    pub key: ContentKey,
    pub content_id: ContentId,
    pub content_type: ContentType,
}

/// A global-state put: one shared value per content id, replaced on each put.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIdAndBytes {
    pub content_id: ContentId,
    pub bytes: Vec<u8>,
}

impl ContentIdAndBytes {
    pub fn new(content_id: ContentId, bytes: Vec<u8>) -> Self {
        Self { content_id, bytes }
    }
}

/// The value of a key at a commit: the reference-local bytes plus, for
/// content types with global state, the current shared bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentAndState {
    pub ref_state: Vec<u8>,
    pub global_state: Option<Vec<u8>>,
}

impl ContentAndState {
    pub fn on_reference(ref_state: Vec<u8>) -> Self {
        Self {
            ref_state,
            global_state: None,
        }
    }

    pub fn with_global(ref_state: Vec<u8>, global_state: Vec<u8>) -> Self {
        Self {
            ref_state,
            global_state: Some(global_state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_display_is_raw() {
        let cid = ContentId::new("C0");
        assert_eq!(format!("{cid}"), "C0");
        assert_eq!(cid.as_str(), "C0");
    }

    #[test]
    fn key_with_bytes_strips_value_for_key_list() {
        let put = KeyWithBytes::new(
            ContentKey::of(&["a"]).unwrap(),
            ContentId::new("C1"),
            ContentType(0),
            b"value".to_vec(),
        );
        let kwt = put.to_key_with_type();
        assert_eq!(kwt.key, put.key);
        assert_eq!(kwt.content_id, put.content_id);
        assert_eq!(kwt.content_type, put.content_type);
    }

    #[test]
    fn content_and_state_variants() {
        let on_ref = ContentAndState::on_reference(b"local".to_vec());
        assert!(on_ref.global_state.is_none());

        let with_global = ContentAndState::with_global(b"local".to_vec(), b"shared".to_vec());
        assert_eq!(with_global.global_state.as_deref(), Some(&b"shared"[..]));
    }
}
