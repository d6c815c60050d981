//! Identifier newtypes.
//!
//! Local ids (users, posts) and the numeric library id are integers; remote
//! collection and video ids are the GUID strings Bunny Stream hands out.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Get the inner value.
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

macro_rules! guid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create from an existing string. Surrounding whitespace is dropped.
            pub fn from_string(s: impl Into<String>) -> Self {
                let s = s.into();
                let trimmed = s.trim();
                if trimmed.len() == s.len() {
                    Self(s)
                } else {
                    Self(trimmed.to_string())
                }
            }

            /// Get the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

numeric_id!(
    /// Local application user.
    UserId
);

numeric_id!(
    /// Local post or attachment that owns an offloaded video.
    PostId
);

numeric_id!(
    /// Bunny Stream video library.
    LibraryId
);

guid_id!(
    /// Remote collection GUID.
    CollectionId
);

guid_id!(
    /// Remote video GUID.
    VideoId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_trims_whitespace() {
        let id = CollectionId::from_string("  abc-123 \n");
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn test_guid_empty() {
        assert!(VideoId::from("   ").is_empty());
        assert!(!VideoId::from("v1").is_empty());
    }

    #[test]
    fn test_numeric_parse() {
        assert_eq!("42".parse::<UserId>().unwrap(), UserId(42));
        assert_eq!(" 7 ".parse::<PostId>().unwrap(), PostId(7));
        assert!("abc".parse::<LibraryId>().is_err());
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&UserId(5)).unwrap();
        assert_eq!(json, "5");
        let id: VideoId = serde_json::from_str("\"guid-1\"").unwrap();
        assert_eq!(id.as_str(), "guid-1");
    }
}
