use basalt_crypto::fiat_shamir::Prng;

use crate::commitment::packaging::{
    PackagingCommitmentSchemeProver, PackagingCommitmentSchemeVerifier,
};
use crate::commitment::salted::{SaltedCommitmentSchemeProver, SaltedCommitmentSchemeVerifier};
use crate::commitment::{CommitmentSchemeProver, CommitmentSchemeVerifier};
use crate::errors::{ensure, Result};

/// Builds the commitment scheme stack: salted Merkle when zero knowledge is
/// required (hiding), packaged Merkle otherwise (shorter proofs).
pub fn make_commitment_scheme_prover(
    size_of_element: usize,
    n_elements_in_segment: u64,
    n_segments: usize,
    with_salt: bool,
    salts_prng: Option<&Prng>,
) -> Result<Box<dyn CommitmentSchemeProver>> {
    if with_salt {
        let prng = salts_prng.ok_or_else(|| {
            crate::errors::StarkError::InvariantViolation(
                "missing prng for generating salts".to_string(),
            )
        })?;
        ensure(n_segments > 0, || "at least one segment is required".to_string())?;
        return Ok(Box::new(SaltedCommitmentSchemeProver::new(
            size_of_element,
            n_elements_in_segment * n_segments as u64,
            n_segments,
            prng.clone(),
        )?));
    }
    Ok(Box::new(PackagingCommitmentSchemeProver::new(
        size_of_element,
        n_elements_in_segment,
        n_segments,
    )?))
}

pub fn make_commitment_scheme_verifier(
    size_of_element: usize,
    n_elements: u64,
    with_salt: bool,
) -> Result<Box<dyn CommitmentSchemeVerifier>> {
    if with_salt {
        return Ok(Box::new(SaltedCommitmentSchemeVerifier::new(
            size_of_element,
            n_elements,
        )));
    }
    Ok(Box::new(PackagingCommitmentSchemeVerifier::new(
        size_of_element,
        n_elements,
    )?))
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use basalt_crypto::fiat_shamir::Prng;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    use super::*;
    use crate::channel::{ProverChannel, VerifierChannel};

    #[test]
    fn both_stacks_round_trip() {
        let mut rng = StdRng::seed_from_u64(91);
        let size_of_element = 24;
        let n_elements = 32u64;
        let mut data = vec![0u8; size_of_element * n_elements as usize];
        rng.fill_bytes(&mut data);
        let queries = BTreeSet::from([4u64, 17, 30]);
        let salts_prng = Prng::from_seed(b"builder salts");

        for with_salt in [false, true] {
            let mut prover_channel = ProverChannel::new(Prng::from_seed(b"builder"));
            let mut prover = make_commitment_scheme_prover(
                size_of_element,
                n_elements,
                1,
                with_salt,
                Some(&salts_prng),
            )
            .unwrap();
            prover.add_segment_for_commitment(&data, 0).unwrap();
            prover.commit(&mut prover_channel).unwrap();
            let to_fetch = prover.start_decommitment_phase(&queries).unwrap();
            let mut fetched = Vec::new();
            for element in &to_fetch {
                let offset = *element as usize * size_of_element;
                fetched.extend_from_slice(&data[offset..offset + size_of_element]);
            }
            prover.decommit(&fetched, &mut prover_channel).unwrap();

            let elements: BTreeMap<u64, Vec<u8>> = queries
                .iter()
                .map(|q| {
                    let offset = *q as usize * size_of_element;
                    (*q, data[offset..offset + size_of_element].to_vec())
                })
                .collect();
            let mut verifier_channel =
                VerifierChannel::new(Prng::from_seed(b"builder"), prover_channel.into_proof());
            let mut verifier =
                make_commitment_scheme_verifier(size_of_element, n_elements, with_salt).unwrap();
            verifier.read_commitment(&mut verifier_channel).unwrap();
            assert!(verifier
                .verify_integrity(&elements, &mut verifier_channel)
                .unwrap());
            assert!(verifier_channel.is_end_of_proof());
        }
    }
}
