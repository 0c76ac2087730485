//! # Pack Content Hash
//!
//! A pack's digest fingerprints its *structure*: the ordered, deduplicated set
//! of `(role, string)` pairs that have at least one slot. Resource ids and
//! classes do not contribute, so replacing a blob never changes the digest.
//!
//! ## Encoding
//!
//! SHA-256 over the pairs in `(role, string)` byte order. Each time the role
//! changes, the hasher absorbs `0x00` followed by the role bytes. Every pair
//! then absorbs `0x01` followed by the string bytes. The empty pack hashes the
//! empty input, [`PackDigest::EMPTY`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

const ROLE_MARKER: u8 = 0x00;
const STRING_MARKER: u8 = 0x01;

/// A 32-byte SHA-256 pack digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackDigest([u8; 32]);

impl PackDigest {
    /// Digest of a pack with no slots (SHA-256 of the empty input).
    pub const EMPTY: PackDigest = PackDigest([
        0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f, 0xb9,
        0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b, 0x78, 0x52,
        0xb8, 0x55,
    ]);

    /// Wrap a stored digest, checking its length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ValidationError::InvalidDigestLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Raw digest bytes, as stored.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding, as surfaced to clients.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for PackDigest {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for PackDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackDigest({})", self.to_hex())
    }
}

impl fmt::Display for PackDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PackDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PackDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Streaming pack hasher.
///
/// Pairs must be pushed in ascending `(role, string)` order. Consecutive
/// duplicates (the same pair held by both an image and an audio slot) are
/// absorbed once.
#[derive(Default)]
pub struct PackHasher {
    inner: Sha256,
    last_role: Option<String>,
    last_string: Option<String>,
}

impl PackHasher {
    /// Start a new digest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one `(role, string)` pair.
    pub fn push(&mut self, role: &str, string: &str) {
        let same_role = self.last_role.as_deref() == Some(role);
        if same_role && self.last_string.as_deref() == Some(string) {
            return;
        }
        if !same_role {
            self.inner.update([ROLE_MARKER]);
            self.inner.update(role.as_bytes());
            self.last_role = Some(role.to_string());
        }
        self.inner.update([STRING_MARKER]);
        self.inner.update(string.as_bytes());
        self.last_string = Some(string.to_string());
    }

    /// Finish and return the digest.
    pub fn finish(self) -> PackDigest {
        PackDigest(self.inner.finalize().into())
    }
}

/// Digest of an arbitrary collection of pairs; order and duplicates do not
/// matter.
pub fn pack_digest<'a, I>(pairs: I) -> PackDigest
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let ordered: BTreeSet<(&str, &str)> = pairs.into_iter().collect();
    let mut hasher = PackHasher::new();
    for (role, string) in ordered {
        hasher.push(role, string);
    }
    hasher.finish()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn pairs() -> impl Strategy<Value = Vec<(String, String)>> {
        proptest::collection::vec(("[a-z0-9_]{1,8}", "[a-z0-9_]{1,8}"), 0..24)
    }

    proptest! {
        /// Order and multiplicity of the input do not affect the digest.
        #[test]
        fn digest_is_a_set_function(mut input in pairs()) {
            let forward = pack_digest(input.iter().map(|(r, s)| (r.as_str(), s.as_str())));
            input.reverse();
            let doubled: Vec<_> = input.iter().chain(input.iter()).cloned().collect();
            let backward = pack_digest(doubled.iter().map(|(r, s)| (r.as_str(), s.as_str())));
            prop_assert_eq!(forward, backward);
        }

        /// Streaming sorted rows matches the set-based helper.
        #[test]
        fn streaming_matches_set(input in pairs()) {
            let mut sorted = input.clone();
            sorted.sort();
            let mut hasher = PackHasher::new();
            for (r, s) in &sorted {
                hasher.push(r, s);
            }
            let set = pack_digest(input.iter().map(|(r, s)| (r.as_str(), s.as_str())));
            prop_assert_eq!(hasher.finish(), set);
        }
    }
}
