//! A fixed-difficulty hash puzzle gating the query phase.
//!
//! The prover searches for an 8-byte nonce such that
//! `Blake2s(Blake2s(magic ∥ state ∥ bits) ∥ BE64(nonce))` starts with
//! `work_bits` zero bits; the verifier re-checks the predicate.

use basalt_crypto::hash::Blake2s256Digest;

use crate::errors::{Result, StarkError};

const MAGIC: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xed];
pub const NONCE_BYTES: usize = 8;
const MAX_WORK_BITS: usize = 40;

#[cfg(feature = "parallel")]
const PARALLEL_SEARCH_CHUNK: u64 = 1 << 16;

fn check_work_bits(work_bits: usize) -> Result<()> {
    if work_bits == 0 {
        return Err(StarkError::InvariantViolation(
            "at least one bit of work is required".to_string(),
        ));
    }
    if work_bits > MAX_WORK_BITS {
        return Err(StarkError::InvariantViolation(
            "too many bits of work requested".to_string(),
        ));
    }
    Ok(())
}

fn init_digest(seed: &[u8; 32], work_bits: usize) -> Blake2s256Digest {
    let mut bytes = Vec::with_capacity(MAGIC.len() + seed.len() + 1);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(seed);
    bytes.push(work_bits as u8);
    Blake2s256Digest::hash_bytes(&bytes)
}

fn nonce_satisfies(init: &Blake2s256Digest, nonce: u64, work_bits: usize) -> bool {
    let mut bytes = [0u8; 40];
    bytes[..32].copy_from_slice(init.as_bytes());
    bytes[32..].copy_from_slice(&nonce.to_be_bytes());
    let digest = Blake2s256Digest::hash_bytes(&bytes);
    let head = u64::from_be_bytes(digest.as_bytes()[..8].try_into().unwrap());
    head.leading_zeros() as usize >= work_bits
}

/// Finds a witness for the given difficulty over the given channel state.
pub fn prove(seed: &[u8; 32], work_bits: usize) -> Result<[u8; NONCE_BYTES]> {
    check_work_bits(work_bits)?;
    let init = init_digest(seed, work_bits);

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        let mut chunk_start = 0u64;
        loop {
            let found = (chunk_start..chunk_start + PARALLEL_SEARCH_CHUNK)
                .into_par_iter()
                .find_any(|nonce| nonce_satisfies(&init, *nonce, work_bits));
            if let Some(nonce) = found {
                return Ok(nonce.to_be_bytes());
            }
            chunk_start = chunk_start.checked_add(PARALLEL_SEARCH_CHUNK).ok_or_else(|| {
                StarkError::InvariantViolation("proof of work search exhausted".to_string())
            })?;
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        for nonce in 0..u64::MAX {
            if nonce_satisfies(&init, nonce, work_bits) {
                return Ok(nonce.to_be_bytes());
            }
        }
        Err(StarkError::InvariantViolation(
            "proof of work search exhausted".to_string(),
        ))
    }
}

/// Checks a witness against the given difficulty and channel state.
pub fn verify(seed: &[u8; 32], work_bits: usize, witness: &[u8; NONCE_BYTES]) -> Result<bool> {
    check_work_bits(work_bits)?;
    let init = init_digest(seed, work_bits);
    Ok(nonce_satisfies(
        &init,
        u64::from_be_bytes(*witness),
        work_bits,
    ))
}
