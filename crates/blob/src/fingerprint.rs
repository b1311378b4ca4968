//! Content fingerprints.
//!
//! A [`Fingerprint`] is the identity of a blob: the algorithm tag plus the
//! raw digest of its content. Two fingerprints with the same algorithm and
//! digest are interchangeable, which is what makes them usable as the dedup
//! key for the content-addressed store.

use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

/// The one and only content hash algorithm used by the whole system.
///
/// Changing this changes the on-disk layout of every existing store.
pub const ALGORITHM: &str = "sha1";
const DIGEST_LENGTH: usize = 20;

/// Algorithm-tagged content hash.
///
/// The hex and composite (`algorithm:hex`) forms are derived lazily and
/// cached on first use.
///
/// # Examples
///
/// ```
/// use hoard_blob::Fingerprint;
///
/// let fp = Fingerprint::compute(b"hello");
/// assert_eq!(fp.algorithm(), "sha1");
/// assert_eq!(fp.hex(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
/// assert_eq!(fp.to_string(), "sha1:aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
/// ```
#[derive(Clone)]
pub struct Fingerprint {
    algorithm: &'static str,
    digest: Vec<u8>,
    hex: OnceLock<String>,
    composite: OnceLock<String>,
}

impl Fingerprint {
    fn new(algorithm: &'static str, digest: Vec<u8>) -> Self {
        Self {
            algorithm,
            digest,
            hex: OnceLock::new(),
            composite: OnceLock::new(),
        }
    }

    /// Fingerprint a byte sequence. Any input (including empty) is valid.
    #[must_use]
    pub fn compute(bytes: &[u8]) -> Self {
        Self::new(ALGORITHM, Sha1::digest(bytes).to_vec())
    }

    pub fn algorithm(&self) -> &'static str {
        self.algorithm
    }

    /// Raw digest bytes.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Lower-case hex encoding of the digest.
    pub fn hex(&self) -> &str {
        self.hex.get_or_init(|| hex::encode(&self.digest))
    }

    /// The `algorithm:hex` form used in `meta` records and the index.
    pub fn composite(&self) -> &str {
        self.composite.get_or_init(|| format!("{}:{}", self.algorithm, self.hex()))
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.digest == other.digest
    }
}
impl Eq for Fingerprint {}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.algorithm.hash(state);
        self.digest.hash(state);
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.composite())
    }
}

impl Debug for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple("Fingerprint").field(&self.composite()).finish()
    }
}

impl FromStr for Fingerprint {
    type Err = crate::error::Error;

    /// Parse the composite `algorithm:hex` form back into a fingerprint.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ErrorKind::InvalidFingerprint(s.to_string());
        let Some((algorithm, hex)) = s.split_once(':') else {
            exn::bail!(invalid());
        };
        if algorithm != ALGORITHM || hex.len() != DIGEST_LENGTH * 2 {
            exn::bail!(invalid());
        }
        // Normalise to lower-case so the cached hex matches `hex::encode`.
        let digest = hex::decode(hex.to_ascii_lowercase()).map_err(|_| invalid())?;
        Ok(Self::new(ALGORITHM, digest))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.composite())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: crate::error::Error| serde::de::Error::custom(&*e))
    }
}
