//! Validated logical resource names.
//!
//! Declarations identify resources by user-chosen names (`roleA`,
//! `eks-cluster`), unique within a stack. Names are validated once at
//! parse time so the rest of the engine can treat them as opaque keys.

use std::fmt;
use std::str::FromStr;

use crate::IdError;

/// Maximum length of a resource name in bytes.
pub const MAX_NAME_LEN: usize = 128;

/// The logical name of a declared resource.
///
/// Valid names start with an ASCII alphanumeric character and contain
/// only ASCII alphanumerics, `-`, and `_`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceName(String);

impl ResourceName {
    /// Parses and validates a resource name.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if s.len() > MAX_NAME_LEN {
            return Err(IdError::InvalidName {
                name: s.to_string(),
                reason: "name exceeds 128 bytes",
            });
        }
        let mut chars = s.chars();
        let first = chars.next().unwrap();
        if !first.is_ascii_alphanumeric() {
            return Err(IdError::InvalidName {
                name: s.to_string(),
                reason: "name must start with an ASCII alphanumeric character",
            });
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(IdError::InvalidName {
                name: s.to_string(),
                reason: "name may only contain ASCII alphanumerics, '-', and '_'",
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for ResourceName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ResourceName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_names() {
        for name in ["roleA", "eks-cluster", "addon_coredns", "a", "0node"] {
            assert!(ResourceName::parse(name).is_ok(), "{name} should parse");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "-leading", "_leading", "has space", "dot.ted", "a/b"] {
            assert!(
                ResourceName::parse(name).is_err(),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_overlong() {
        let long = "a".repeat(MAX_NAME_LEN + 1);
        assert!(ResourceName::parse(&long).is_err());
    }

    proptest! {
        #[test]
        fn prop_roundtrip(s in "[a-zA-Z0-9][a-zA-Z0-9_-]{0,63}") {
            let name = ResourceName::parse(&s).unwrap();
            let json = serde_json::to_string(&name).unwrap();
            let back: ResourceName = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(name, back);
        }
    }
}
