//! Channel and user identifiers.
//!
//! Backends are inconsistent about whether ids travel as JSON strings or
//! integers (`"7"` vs `7`). Both newtypes accept either form on decode and
//! always encode as a string, so ids compare equal regardless of how the
//! server spelled them.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Deserializer, Serialize};

/// Accepted JSON spellings of an identifier.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Signed(n) => n.to_string(),
            Self::Unsigned(n) => n.to_string(),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from anything string-like.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id.to_string())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into_string()))
            }
        }
    };
}

string_id! {
    /// Channel identifier.
    ChannelId
}

string_id! {
    /// User identifier.
    UserId
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_string_ids_are_equal() {
        let from_int: ChannelId = serde_json::from_str("7").unwrap();
        let from_str: ChannelId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(from_int.as_str(), "7");
    }

    #[test]
    fn ids_encode_as_strings() {
        let encoded = serde_json::to_string(&UserId::from(42)).unwrap();
        assert_eq!(encoded, "\"42\"");
    }

    #[test]
    fn non_scalar_ids_are_rejected() {
        assert!(serde_json::from_str::<ChannelId>("{\"id\":1}").is_err());
        assert!(serde_json::from_str::<ChannelId>("null").is_err());
    }
}
