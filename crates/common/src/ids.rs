use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Length of a file id in characters.
pub const FILE_ID_LENGTH: usize = 32;

/// Length of an auth or recovery token in characters (hex of 32 random bytes).
pub const TOKEN_LENGTH: usize = 64;

/// Opaque, fixed-length handle under which a file's bytes are stored.
///
/// Ids are random (122 bits from a v4 uuid) and carry no information about
/// the file's name or namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FileId(String);

impl FileId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for FileId {
    type Err = FileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != FILE_ID_LENGTH {
            return Err(FileIdError::Length(s.len()));
        }
        if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(FileIdError::Charset);
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for FileId {
    type Error = FileIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FileId> for String {
    fn from(id: FileId) -> Self {
        id.0
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FileIdError {
    #[error("file id must be {FILE_ID_LENGTH} characters, got {0}")]
    Length(usize),
    #[error("file id must be alphanumeric")]
    Charset,
}

/// Generate a fresh random credential token.
pub fn generate_token() -> String {
    let mut buf = [0u8; TOKEN_LENGTH / 2];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid_and_distinct() {
        let a = FileId::generate();
        let b = FileId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), FILE_ID_LENGTH);
        assert_eq!(a.as_str().parse::<FileId>().unwrap(), a);
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert_eq!("abc".parse::<FileId>(), Err(FileIdError::Length(3)));
        let bad = "../../../../etc/passwd_xxxxxxxxxx";
        assert_eq!(bad.len(), FILE_ID_LENGTH);
        assert_eq!(bad.parse::<FileId>(), Err(FileIdError::Charset));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<FileId, _> = serde_json::from_str(r#""0123456789abcdef0123456789abcdef""#);
        assert!(ok.is_ok());
        let bad: Result<FileId, _> = serde_json::from_str(r#""short""#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }
}
