use std::collections::{BTreeMap, BTreeSet};

use basalt_crypto::fiat_shamir::Prng;
use basalt_crypto::hash::{Blake2s256Digest, DIGEST_NUM_BYTES};
use basalt_math::helpers::safe_div;

use crate::channel::{ProverChannel, VerifierChannel};
use crate::commitment::merkle_scheme::{
    MerkleCommitmentSchemeProver, MerkleCommitmentSchemeVerifier,
};
use crate::commitment::{CommitmentSchemeProver, CommitmentSchemeVerifier};
use crate::errors::{ensure, ensure_proof, Result};

pub const SALT_NUM_BYTES: usize = DIGEST_NUM_BYTES / 2;

fn salt_annotation(index: u64) -> String {
    format!("salt {index}")
}

fn hash_salted_element(element: &[u8], salt: &[u8]) -> Blake2s256Digest {
    let mut salted = Vec::with_capacity(element.len() + salt.len());
    salted.extend_from_slice(element);
    salted.extend_from_slice(salt);
    Blake2s256Digest::hash_bytes(&salted)
}

fn derive_salt(salts_prng: &Prng, index: u64) -> [u8; SALT_NUM_BYTES] {
    let mut prng = salts_prng.clone();
    prng.mix_seed_with_bytes(&index.to_be_bytes());
    let mut salt = [0u8; SALT_NUM_BYTES];
    prng.random_bytes(&mut salt);
    salt
}

/// Commits to `Blake2s(element ∥ salt(i))` per element, the salts derived
/// from a dedicated prover-side PRNG and revealed only for queried
/// elements. Decommitments then expose nothing about unqueried cells.
pub struct SaltedCommitmentSchemeProver {
    size_of_element: usize,
    n_elements: u64,
    n_segments: usize,
    inner_commitment_scheme: Box<dyn CommitmentSchemeProver>,
    salts_prng: Prng,
    queries: BTreeSet<u64>,
}

impl SaltedCommitmentSchemeProver {
    pub fn new(
        size_of_element: usize,
        n_elements: u64,
        n_segments: usize,
        salts_prng: Prng,
    ) -> Result<Self> {
        let inner = MerkleCommitmentSchemeProver::new(n_elements, n_segments)?;
        Ok(Self {
            size_of_element,
            n_elements,
            n_segments,
            inner_commitment_scheme: Box::new(inner),
            salts_prng,
            queries: BTreeSet::new(),
        })
    }

    fn salt(&self, index: u64) -> [u8; SALT_NUM_BYTES] {
        derive_salt(&self.salts_prng, index)
    }
}

impl CommitmentSchemeProver for SaltedCommitmentSchemeProver {
    fn num_segments(&self) -> usize {
        self.n_segments
    }

    fn segment_length_in_elements(&self) -> u64 {
        safe_div(self.n_elements, self.n_segments as u64)
    }

    fn element_length_in_bytes(&self) -> usize {
        self.size_of_element
    }

    fn add_segment_for_commitment(
        &mut self,
        segment_data: &[u8],
        segment_index: usize,
    ) -> Result<()> {
        let segment_length = self.segment_length_in_elements();
        ensure(
            segment_data.len() as u64 == segment_length * self.size_of_element as u64,
            || {
                format!(
                    "segment size is {} instead of the expected {}",
                    segment_data.len(),
                    segment_length * self.size_of_element as u64
                )
            },
        )?;
        let first_element = segment_index as u64 * segment_length;
        let mut hashed = Vec::with_capacity(segment_length as usize * DIGEST_NUM_BYTES);
        for (i, element) in segment_data.chunks(self.size_of_element).enumerate() {
            let salt = self.salt(first_element + i as u64);
            hashed.extend_from_slice(hash_salted_element(element, &salt).as_bytes());
        }
        self.inner_commitment_scheme
            .add_segment_for_commitment(&hashed, segment_index)
    }

    fn commit(&mut self, channel: &mut ProverChannel) -> Result<()> {
        self.inner_commitment_scheme.commit(channel)
    }

    fn start_decommitment_phase(&mut self, queries: &BTreeSet<u64>) -> Result<Vec<u64>> {
        self.queries = queries.clone();
        self.inner_commitment_scheme.start_decommitment_phase(queries)
    }

    fn decommit(&mut self, elements_data: &[u8], channel: &mut ProverChannel) -> Result<()> {
        ensure(elements_data.is_empty(), || {
            "the salted layer expects no element data".to_string()
        })?;
        for query in self.queries.clone() {
            channel.send_data(&self.salt(query), &salt_annotation(query))?;
        }
        self.inner_commitment_scheme.decommit(&[], channel)
    }
}

pub struct SaltedCommitmentSchemeVerifier {
    size_of_element: usize,
    n_elements: u64,
    inner_commitment_scheme: Box<dyn CommitmentSchemeVerifier>,
}

impl SaltedCommitmentSchemeVerifier {
    pub fn new(size_of_element: usize, n_elements: u64) -> Self {
        Self {
            size_of_element,
            n_elements,
            inner_commitment_scheme: Box::new(MerkleCommitmentSchemeVerifier::new(n_elements)),
        }
    }
}

impl CommitmentSchemeVerifier for SaltedCommitmentSchemeVerifier {
    fn num_elements(&self) -> u64 {
        self.n_elements
    }

    fn read_commitment(&mut self, channel: &mut VerifierChannel) -> Result<()> {
        self.inner_commitment_scheme.read_commitment(channel)
    }

    fn verify_integrity(
        &mut self,
        elements_to_verify: &BTreeMap<u64, Vec<u8>>,
        channel: &mut VerifierChannel,
    ) -> Result<bool> {
        let mut leaves_to_verify = BTreeMap::new();
        for (query, value) in elements_to_verify {
            ensure_proof(*query < self.n_elements, || "query out of range".to_string())?;
            ensure_proof(value.len() == self.size_of_element, || {
                "element size mismatches".to_string()
            })?;
            let salt = channel.receive_data(SALT_NUM_BYTES, &salt_annotation(*query))?;
            leaves_to_verify.insert(
                *query,
                hash_salted_element(value, &salt).as_bytes().to_vec(),
            );
        }
        self.inner_commitment_scheme
            .verify_integrity(&leaves_to_verify, channel)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, RngCore, SeedableRng};

    use super::*;

    const SEED: &[u8] = b"salted";

    fn prove(
        data: &[u8],
        size_of_element: usize,
        n_elements: u64,
        queries: &BTreeSet<u64>,
    ) -> (Vec<u8>, BTreeMap<u64, Vec<u8>>) {
        let mut channel = ProverChannel::new(Prng::from_seed(SEED));
        let mut prover = SaltedCommitmentSchemeProver::new(
            size_of_element,
            n_elements,
            1,
            Prng::from_seed(b"salts"),
        )
        .unwrap();
        prover.add_segment_for_commitment(data, 0).unwrap();
        prover.commit(&mut channel).unwrap();
        let to_fetch = prover.start_decommitment_phase(queries).unwrap();
        assert!(to_fetch.is_empty());
        prover.decommit(&[], &mut channel).unwrap();

        let elements: BTreeMap<u64, Vec<u8>> = queries
            .iter()
            .map(|q| {
                let offset = *q as usize * size_of_element;
                (*q, data[offset..offset + size_of_element].to_vec())
            })
            .collect();
        (channel.into_proof(), elements)
    }

    fn verify(
        proof: Vec<u8>,
        size_of_element: usize,
        n_elements: u64,
        elements: &BTreeMap<u64, Vec<u8>>,
    ) -> bool {
        let mut channel = VerifierChannel::new(Prng::from_seed(SEED), proof);
        let mut verifier = SaltedCommitmentSchemeVerifier::new(size_of_element, n_elements);
        verifier.read_commitment(&mut channel).unwrap();
        verifier
            .verify_integrity(elements, &mut channel)
            .unwrap_or(false)
    }

    #[test]
    fn round_trip() {
        let mut rng = StdRng::seed_from_u64(81);
        let size_of_element = 24;
        let n_elements = 16u64;
        let mut data = vec![0u8; size_of_element * n_elements as usize];
        rng.fill_bytes(&mut data);
        let queries = BTreeSet::from([0u64, 7, 15]);
        let (proof, elements) = prove(&data, size_of_element, n_elements, &queries);
        assert!(verify(proof, size_of_element, n_elements, &elements));
    }

    #[test]
    fn corruption_is_detected() {
        let mut rng = StdRng::seed_from_u64(82);
        let size_of_element = 16;
        let n_elements = 8u64;
        let mut data = vec![0u8; size_of_element * n_elements as usize];
        rng.fill_bytes(&mut data);
        let queries = BTreeSet::from([2u64, 5]);
        let (proof, elements) = prove(&data, size_of_element, n_elements, &queries);

        let mut bad_proof = proof.clone();
        let index = rng.gen_range(0..bad_proof.len());
        bad_proof[index] ^= 2;
        assert!(!verify(bad_proof, size_of_element, n_elements, &elements));

        let mut bad_elements = elements;
        bad_elements.get_mut(&5).unwrap()[3] ^= 1;
        assert!(!verify(proof, size_of_element, n_elements, &bad_elements));
    }

    #[test]
    fn salts_differ_per_index() {
        let prng = Prng::from_seed(b"salts");
        assert_ne!(derive_salt(&prng, 0), derive_salt(&prng, 1));
        // Deriving twice gives the same salt.
        assert_eq!(derive_salt(&prng, 3), derive_salt(&prng, 3));
    }
}
