//! SHA-256 digest newtype and file hashing.
//!
//! Validates that the value is a 64-character lowercase hexadecimal string
//! representing a 256-bit hash digest.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// Errors arising from digest validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// The value is not a valid 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    Invalid {
        /// Description of the validation failure.
        reason: String,
    },
}

/// A validated hex-encoded SHA-256 digest string.
///
/// # Examples
///
/// ```
/// use pinsmith::digest::Sha256Digest;
///
/// let hex = "a".repeat(64);
/// let digest = Sha256Digest::try_from(hex.as_str()).expect("valid digest");
/// assert_eq!(digest.as_str().len(), 64);
///
/// let pinned = Sha256Digest::normalise(&format!("  {}\n", "B".repeat(64)))
///     .expect("valid pin");
/// assert_eq!(pinned.as_str(), "b".repeat(64));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse caller-supplied text, trimming whitespace and lowercasing first.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Invalid`] when the normalised text is not a
    /// well-formed digest.
    pub fn normalise(value: &str) -> Result<Self, DigestError> {
        Self::try_from(value.trim().to_ascii_lowercase())
    }

    /// Find the first digest-shaped token in a checksum record.
    ///
    /// Accepts `sha256sum` output (`<hex>  <file>`), bare digests, and BSD
    /// style `SHA256 (file) = <hex>` lines.
    #[must_use]
    pub fn find_in(record: &str) -> Option<Self> {
        record
            .split(|c: char| c.is_whitespace() || c == '=')
            .find_map(|token| Self::normalise(token.trim_start_matches('*')).ok())
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = DigestError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        validate_sha256(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = DigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_sha256(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validate that `value` is a well-formed hex-encoded SHA-256 digest.
fn validate_sha256(value: &str) -> Result<(), DigestError> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(DigestError::Invalid {
            reason: format!(
                "expected {DIGEST_HEX_LEN} hex characters, got {}",
                value.len()
            ),
        });
    }
    if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(DigestError::Invalid {
            reason: format!("non-hex character '{bad}'"),
        });
    }
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(DigestError::Invalid {
            reason: "digest must be lowercase".to_owned(),
        });
    }
    Ok(())
}

/// Compute the SHA-256 digest of a file, reading it in chunks.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn compute_sha256(path: &Path) -> std::io::Result<Sha256Digest> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    // sha2 lower-hex output is always a valid digest.
    Ok(Sha256Digest(format!("{:x}", hasher.finalize())))
}

/// Compute the SHA-256 digest of an in-memory buffer.
#[must_use]
pub fn sha256_bytes(bytes: &[u8]) -> Sha256Digest {
    Sha256Digest(format!("{:x}", Sha256::digest(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn valid_digest() -> String {
        "a".repeat(64)
    }

    #[test]
    fn accepts_valid_sixty_four_char_hex() {
        assert!(Sha256Digest::try_from(valid_digest().as_str()).is_ok());
    }

    #[rstest]
    #[case::too_short("abcdef")]
    #[case::too_long(&"a".repeat(65))]
    #[case::non_hex(&format!("{}g", "a".repeat(63)))]
    #[case::uppercase(&"A".repeat(64))]
    fn rejects_malformed(#[case] value: &str) {
        assert!(Sha256Digest::try_from(value).is_err());
    }

    #[test]
    fn normalise_accepts_uppercase_with_whitespace() {
        let digest = Sha256Digest::normalise(&format!(" {} ", "AB".repeat(32))).expect("valid");
        assert_eq!(digest.as_str(), "ab".repeat(32));
    }

    #[rstest]
    #[case::sha256sum(&format!("{}  socat-1.8.0.0.tar.gz\n", "c".repeat(64)))]
    #[case::binary_marker(&format!("{} *socat-1.8.0.0.tar.gz", "c".repeat(64)))]
    #[case::bsd(&format!("SHA256 (socat-1.8.0.0.tar.gz) = {}", "c".repeat(64)))]
    #[case::bare(&"c".repeat(64))]
    fn find_in_reads_common_record_formats(#[case] record: &str) {
        let found = Sha256Digest::find_in(record).expect("digest present");
        assert_eq!(found.as_str(), "c".repeat(64));
    }

    #[test]
    fn find_in_returns_none_without_digest() {
        assert!(Sha256Digest::find_in("<html>404 Not Found</html>").is_none());
    }

    #[test]
    fn compute_matches_in_memory_digest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("payload");
        fs::write(&path, b"hello world").expect("write payload");
        let from_file = compute_sha256(&path).expect("hash file");
        assert_eq!(from_file, sha256_bytes(b"hello world"));
        assert_eq!(
            from_file.as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
