//! Conversation turns: the unit persisted in per-user history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SautiError;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    /// Stable storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
        }
    }

    /// Parse a storage name back into a role.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

/// One piece of turn content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Part {
    Text {
        text: String,
    },
    Media {
        mime_type: String,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn media(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Media {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Text content, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Media { .. } => None,
        }
    }
}

/// A role-tagged, multi-part message. Always holds at least one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    parts: Vec<Part>,
    timestamp: DateTime<Utc>,
}

impl Turn {
    /// Build a turn, rejecting an empty part list.
    pub fn new(role: Role, parts: Vec<Part>) -> Result<Self, SautiError> {
        Self::at(role, parts, Utc::now())
    }

    /// Build a turn with an explicit timestamp (used when loading from storage).
    pub fn at(role: Role, parts: Vec<Part>, timestamp: DateTime<Utc>) -> Result<Self, SautiError> {
        if parts.is_empty() {
            return Err(SautiError::Memory("a turn needs at least one part".into()));
        }
        Ok(Self {
            role,
            parts,
            timestamp,
        })
    }

    /// Shorthand for a single-text user turn.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
            timestamp: Utc::now(),
        }
    }

    /// Shorthand for a single-text agent turn.
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            parts: vec![Part::text(text)],
            timestamp: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_rejects_empty_parts() {
        assert!(Turn::new(Role::User, Vec::new()).is_err());
    }

    #[test]
    fn test_turn_text_skips_media() {
        let turn = Turn::new(
            Role::User,
            vec![
                Part::text("look at this"),
                Part::media("image/jpeg", vec![1, 2, 3]),
                Part::text("what is it?"),
            ],
        )
        .unwrap();
        assert_eq!(turn.text(), "look at this\nwhat is it?");
        assert_eq!(turn.parts().len(), 3);
    }

    #[test]
    fn test_media_part_serializes_as_base64() {
        let part = Part::media("image/png", vec![0xff, 0x00, 0x10]);
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "media");
        assert_eq!(json["mime_type"], "image/png");
        assert_eq!(json["data"], "/wAQ");
        let back: Part = serde_json::from_value(json).unwrap();
        assert_eq!(back, part);
    }

    #[test]
    fn test_role_storage_names() {
        assert_eq!(Role::parse(Role::User.as_str()), Some(Role::User));
        assert_eq!(Role::parse("agent"), Some(Role::Agent));
        assert_eq!(Role::parse("assistant"), None);
    }
}
