use core::fmt;

use blake2::{Blake2s256, Digest};

use crate::errors::CryptoError;

pub const DIGEST_NUM_BYTES: usize = 32;

/// A Blake2s-256 digest.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Blake2s256Digest([u8; DIGEST_NUM_BYTES]);

impl Blake2s256Digest {
    pub const fn from_digest(bytes: [u8; DIGEST_NUM_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; DIGEST_NUM_BYTES] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidDigestLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_NUM_BYTES] {
        &self.0
    }

    pub fn hash_bytes(data: &[u8]) -> Self {
        let mut hasher = Blake2s256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Hashes the concatenation `left ∥ right`, as the Merkle tree's inner
    /// nodes require.
    pub fn hash_pair(left: &Self, right: &Self) -> Self {
        let mut hasher = Blake2s256::new();
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Blake2s256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Blake2s256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_pair_matches_concatenation() {
        let left = Blake2s256Digest::hash_bytes(b"left");
        let right = Blake2s256Digest::hash_bytes(b"right");
        let mut concatenated = Vec::new();
        concatenated.extend_from_slice(left.as_bytes());
        concatenated.extend_from_slice(right.as_bytes());
        assert_eq!(
            Blake2s256Digest::hash_pair(&left, &right),
            Blake2s256Digest::hash_bytes(&concatenated)
        );
    }

    #[test]
    fn known_empty_digest() {
        // Blake2s-256 of the empty string.
        assert_eq!(
            Blake2s256Digest::hash_bytes(b"").to_string(),
            "0x69217a3079908094e11121d042354a7c1f55b6482ca1a51e1b250dfd1ed0eef9"
        );
    }

    #[test]
    fn byte_round_trip() {
        let digest = Blake2s256Digest::hash_bytes(b"roundtrip");
        assert_eq!(
            Blake2s256Digest::from_bytes(digest.as_bytes()).unwrap(),
            digest
        );
        assert!(Blake2s256Digest::from_bytes(&[0u8; 31]).is_err());
    }
}
