//! # Capabilities
//!
//! A permission value is a small bitmask:
//!
//! | bit | meaning |
//! |-----|---------|
//! | 1   | read    |
//! | 2   | write   |
//! | 4   | creator |
//!
//! The creator bit implies both read and write, whatever the other bits say.
//! All checks are bitwise non-zero tests: a value is readable if *any* of the
//! read or creator bits are set, never only when the masked value equals one.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PermissionValue(u8);

impl PermissionValue {
    pub const NOTHING: Self = Self(0);
    pub const READ: Self = Self(1);
    pub const WRITE: Self = Self(2);
    pub const READ_WRITE: Self = Self(1 | 2);
    pub const CREATOR: Self = Self(4);

    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn can_read(&self) -> bool {
        self.0 & Self::READ.0 != 0 || self.is_creator()
    }

    pub const fn can_write(&self) -> bool {
        self.0 & Self::WRITE.0 != 0 || self.is_creator()
    }

    pub const fn is_creator(&self) -> bool {
        self.0 & Self::CREATOR.0 != 0
    }
}

impl BitOr for PermissionValue {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl From<u8> for PermissionValue {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl From<PermissionValue> for u8 {
    fn from(value: PermissionValue) -> Self {
        value.0
    }
}

impl fmt::Display for PermissionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_creator() {
            return write!(f, "creator");
        }
        match (self.can_read(), self.can_write()) {
            (true, true) => write!(f, "read_write"),
            (true, false) => write!(f, "read"),
            (false, true) => write!(f, "write"),
            (false, false) => write!(f, "nothing"),
        }
    }
}

/// Accepts either a raw bitmask (`"3"`) or one of the names printed by
/// `Display` (`"read"`, `"write"`, `"read_write"`, `"creator"`, `"nothing"`).
impl FromStr for PermissionValue {
    type Err = PermissionValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(bits) = s.parse::<u8>() {
            return Ok(Self(bits));
        }
        match s.to_ascii_lowercase().as_str() {
            "nothing" | "none" => Ok(Self::NOTHING),
            "read" | "r" => Ok(Self::READ),
            "write" | "w" => Ok(Self::WRITE),
            "read_write" | "readwrite" | "rw" => Ok(Self::READ_WRITE),
            "creator" | "c" => Ok(Self::CREATOR),
            _ => Err(PermissionValueError(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid permission value: {0}")]
pub struct PermissionValueError(String);

/// Serialized as the raw bitmask; either form is accepted on input.
impl<'de> Deserialize<'de> for PermissionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bits(u8),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Bits(bits) => Ok(Self(bits)),
            Repr::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

/// What a permission row is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    File,
    Namespace,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::File => "file",
            TargetType::Namespace => "namespace",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = TargetTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(TargetType::File),
            "namespace" | "ns" => Ok(TargetType::Namespace),
            other => Err(TargetTypeError(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown permission target type: {0}")]
pub struct TargetTypeError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creator_implies_read_and_write() {
        for bits in 0..=u8::MAX {
            let value = PermissionValue::new(bits);
            if value.is_creator() {
                assert!(value.can_read(), "creator without read for {bits}");
                assert!(value.can_write(), "creator without write for {bits}");
            }
        }
    }

    #[test]
    fn test_multi_bit_values_are_not_compared_by_equality() {
        // 3 & WRITE == 2, which an equality-to-one test would reject
        assert!(PermissionValue::READ_WRITE.can_write());
        assert!(PermissionValue::READ_WRITE.can_read());
        assert!(PermissionValue::new(6).can_read());
        assert!(PermissionValue::new(2).can_write());
        assert!(!PermissionValue::new(2).can_read());
        assert!(!PermissionValue::READ.can_write());
    }

    #[test]
    fn test_nothing() {
        let value = PermissionValue::NOTHING;
        assert!(!value.can_read());
        assert!(!value.can_write());
        assert!(!value.is_creator());
    }

    #[test]
    fn test_parse_names_and_bits() {
        assert_eq!(
            "read_write".parse::<PermissionValue>().unwrap(),
            PermissionValue::READ_WRITE
        );
        assert_eq!("5".parse::<PermissionValue>().unwrap().bits(), 5);
        assert_eq!(
            "Creator".parse::<PermissionValue>().unwrap(),
            PermissionValue::CREATOR
        );
        assert!("admin".parse::<PermissionValue>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(PermissionValue::READ.to_string(), "read");
        assert_eq!(PermissionValue::new(7).to_string(), "creator");
        assert_eq!(PermissionValue::NOTHING.to_string(), "nothing");
    }

    #[test]
    fn test_serde_accepts_bits_or_names() {
        let json = serde_json::to_string(&PermissionValue::READ_WRITE).unwrap();
        assert_eq!(json, "3");
        let parsed: PermissionValue = serde_json::from_str(r#""write""#).unwrap();
        assert_eq!(parsed, PermissionValue::WRITE);
        let parsed: PermissionValue = serde_json::from_str("4").unwrap();
        assert!(parsed.is_creator());
        assert!(serde_json::from_str::<PermissionValue>(r#""owner""#).is_err());
        assert!(serde_json::from_str::<PermissionValue>("300").is_err());
    }

    #[test]
    fn test_target_type_serde() {
        let json = serde_json::to_string(&TargetType::Namespace).unwrap();
        assert_eq!(json, r#""namespace""#);
        let parsed: TargetType = serde_json::from_str(r#""file""#).unwrap();
        assert_eq!(parsed, TargetType::File);
    }
}
