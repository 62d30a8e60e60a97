use std::collections::{BTreeMap, BTreeSet};

use basalt_crypto::hash::{Blake2s256Digest, DIGEST_NUM_BYTES};
use basalt_crypto::merkle::MerkleTree;
use basalt_math::helpers::{safe_div, safe_log2};

use crate::channel::{ProverChannel, VerifierChannel};
use crate::commitment::{CommitmentSchemeProver, CommitmentSchemeVerifier};
use crate::errors::{ensure, ensure_proof, Result};

const NODE_ANNOTATION: &str = "Decommitment node";

/// The innermost commitment scheme: elements are 32-byte digests committed
/// as the leaves of a Merkle tree.
pub struct MerkleCommitmentSchemeProver {
    n_elements: u64,
    n_segments: usize,
    tree: MerkleTree,
    queries: BTreeSet<u64>,
}

impl MerkleCommitmentSchemeProver {
    pub fn new(n_elements: u64, n_segments: usize) -> Result<Self> {
        Ok(Self {
            n_elements,
            n_segments,
            tree: MerkleTree::new(n_elements)?,
            queries: BTreeSet::new(),
        })
    }
}

impl CommitmentSchemeProver for MerkleCommitmentSchemeProver {
    fn num_segments(&self) -> usize {
        self.n_segments
    }

    fn segment_length_in_elements(&self) -> u64 {
        safe_div(self.n_elements, self.n_segments as u64)
    }

    fn element_length_in_bytes(&self) -> usize {
        DIGEST_NUM_BYTES
    }

    fn add_segment_for_commitment(
        &mut self,
        segment_data: &[u8],
        segment_index: usize,
    ) -> Result<()> {
        let segment_length = self.segment_length_in_elements();
        ensure(
            segment_data.len() as u64 == segment_length * DIGEST_NUM_BYTES as u64,
            || {
                format!(
                    "segment size is {} instead of the expected {}",
                    segment_data.len(),
                    segment_length * DIGEST_NUM_BYTES as u64
                )
            },
        )?;
        ensure(segment_index < self.n_segments, || {
            "segment index must be smaller than the number of segments".to_string()
        })?;
        let leaves: Vec<Blake2s256Digest> = segment_data
            .chunks(DIGEST_NUM_BYTES)
            .map(|chunk| Blake2s256Digest::from_bytes(chunk).expect("chunks are digest sized"))
            .collect();
        self.tree
            .add_data(&leaves, segment_index as u64 * segment_length)?;
        Ok(())
    }

    fn commit(&mut self, channel: &mut ProverChannel) -> Result<()> {
        // All nodes below (tree height - log2(segment length)) were already
        // hashed while the segments were added.
        let from_depth = self.tree.height() - safe_log2(self.segment_length_in_elements());
        let commitment = self.tree.get_root(from_depth)?;
        channel.send_commitment_hash(&commitment, "Commitment")
    }

    fn start_decommitment_phase(&mut self, queries: &BTreeSet<u64>) -> Result<Vec<u64>> {
        self.queries = queries.clone();
        Ok(Vec::new())
    }

    fn decommit(&mut self, elements_data: &[u8], channel: &mut ProverChannel) -> Result<()> {
        ensure(elements_data.is_empty(), || {
            "the merkle layer expects no element data".to_string()
        })?;
        for node in self.tree.generate_decommitment(&self.queries)? {
            channel.send_decommitment_node(&node, NODE_ANNOTATION)?;
        }
        Ok(())
    }
}

pub struct MerkleCommitmentSchemeVerifier {
    n_elements: u64,
    commitment: Option<Blake2s256Digest>,
}

impl MerkleCommitmentSchemeVerifier {
    pub fn new(n_elements: u64) -> Self {
        Self {
            n_elements,
            commitment: None,
        }
    }
}

impl CommitmentSchemeVerifier for MerkleCommitmentSchemeVerifier {
    fn num_elements(&self) -> u64 {
        self.n_elements
    }

    fn read_commitment(&mut self, channel: &mut VerifierChannel) -> Result<()> {
        self.commitment = Some(channel.receive_commitment_hash("Commitment")?);
        Ok(())
    }

    fn verify_integrity(
        &mut self,
        elements_to_verify: &BTreeMap<u64, Vec<u8>>,
        channel: &mut VerifierChannel,
    ) -> Result<bool> {
        let commitment = self.commitment.ok_or_else(|| {
            crate::errors::StarkError::InvariantViolation(
                "verify_integrity requires a commitment".to_string(),
            )
        })?;
        let mut leaves = BTreeMap::new();
        for (index, bytes) in elements_to_verify {
            ensure_proof(*index < self.n_elements, || "query out of range".to_string())?;
            ensure_proof(bytes.len() == DIGEST_NUM_BYTES, || {
                "element size mismatches".to_string()
            })?;
            leaves.insert(
                *index,
                Blake2s256Digest::from_bytes(bytes).expect("length checked above"),
            );
        }
        if leaves.is_empty() {
            return Ok(false);
        }
        MerkleTree::verify_decommitment(&leaves, self.n_elements, &commitment, || {
            channel.receive_decommitment_node(NODE_ANNOTATION)
        })
    }
}

#[cfg(test)]
mod tests {
    use basalt_crypto::fiat_shamir::Prng;
    use rand::rngs::StdRng;
    use rand::{Rng, RngCore, SeedableRng};

    use super::*;

    fn random_element_bytes(rng: &mut StdRng, n_elements: usize) -> Vec<u8> {
        let mut data = vec![0u8; n_elements * DIGEST_NUM_BYTES];
        rng.fill_bytes(&mut data);
        data
    }

    fn commit_and_decommit(
        data: &[u8],
        n_elements: u64,
        queries: &BTreeSet<u64>,
    ) -> (Vec<u8>, BTreeMap<u64, Vec<u8>>) {
        let mut channel = ProverChannel::new(Prng::from_seed(b"merkle scheme"));
        let mut prover = MerkleCommitmentSchemeProver::new(n_elements, 1).unwrap();
        prover.add_segment_for_commitment(data, 0).unwrap();
        prover.commit(&mut channel).unwrap();
        let to_fetch = prover.start_decommitment_phase(queries).unwrap();
        assert!(to_fetch.is_empty());
        prover.decommit(&[], &mut channel).unwrap();

        let elements: BTreeMap<u64, Vec<u8>> = queries
            .iter()
            .map(|q| {
                let offset = *q as usize * DIGEST_NUM_BYTES;
                (*q, data[offset..offset + DIGEST_NUM_BYTES].to_vec())
            })
            .collect();
        (channel.into_proof(), elements)
    }

    fn verify(proof: Vec<u8>, n_elements: u64, elements: &BTreeMap<u64, Vec<u8>>) -> bool {
        let mut channel = VerifierChannel::new(Prng::from_seed(b"merkle scheme"), proof);
        let mut verifier = MerkleCommitmentSchemeVerifier::new(n_elements);
        verifier.read_commitment(&mut channel).unwrap();
        verifier
            .verify_integrity(elements, &mut channel)
            .unwrap_or(false)
    }

    #[test]
    fn round_trip_with_random_queries() {
        let mut rng = StdRng::seed_from_u64(61);
        let n_elements = 32u64;
        let data = random_element_bytes(&mut rng, n_elements as usize);
        let mut queries = BTreeSet::new();
        for _ in 0..5 {
            queries.insert(rng.gen_range(0..n_elements));
        }
        let (proof, elements) = commit_and_decommit(&data, n_elements, &queries);
        assert!(verify(proof, n_elements, &elements));
    }

    #[test]
    fn corruption_is_detected() {
        let mut rng = StdRng::seed_from_u64(62);
        let n_elements = 16u64;
        let data = random_element_bytes(&mut rng, n_elements as usize);
        let queries = BTreeSet::from([3u64, 11]);
        let (proof, elements) = commit_and_decommit(&data, n_elements, &queries);

        // A flipped proof byte fails.
        let mut bad_proof = proof.clone();
        let index = rng.gen_range(0..bad_proof.len());
        bad_proof[index] ^= 0x40;
        assert!(!verify(bad_proof, n_elements, &elements));

        // A flipped data byte fails.
        let mut bad_elements = elements;
        bad_elements.get_mut(&11).unwrap()[0] ^= 1;
        assert!(!verify(proof, n_elements, &bad_elements));
    }
}
