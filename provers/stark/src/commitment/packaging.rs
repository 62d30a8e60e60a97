use std::collections::{BTreeMap, BTreeSet};

use crate::channel::{ProverChannel, VerifierChannel};
use crate::commitment::merkle_scheme::{
    MerkleCommitmentSchemeProver, MerkleCommitmentSchemeVerifier,
};
use crate::commitment::packer_hasher::PackerHasher;
use crate::commitment::{CommitmentSchemeProver, CommitmentSchemeVerifier};
use crate::errors::{ensure, Result};

fn missing_element_annotation(element: u64) -> String {
    format!("To complete packages, element #{element}")
}

/// Packs runs of small elements into hash-sized leaves before handing them
/// to an inner commitment scheme. Decommitting a query then requires the
/// sibling elements of its package, which are sent over the channel.
pub struct PackagingCommitmentSchemeProver {
    size_of_element: usize,
    n_elements_in_segment: u64,
    n_segments: usize,
    packer: PackerHasher,
    inner_commitment_scheme: Box<dyn CommitmentSchemeProver>,
    queries: BTreeSet<u64>,
    missing_element_queries: Vec<u64>,
    n_missing_elements_for_inner_layer: usize,
}

impl PackagingCommitmentSchemeProver {
    /// Packs into an inner Merkle scheme over the packages.
    pub fn new(
        size_of_element: usize,
        n_elements_in_segment: u64,
        n_segments: usize,
    ) -> Result<Self> {
        let packer =
            PackerHasher::new(size_of_element, n_elements_in_segment * n_segments as u64)?;
        let inner = MerkleCommitmentSchemeProver::new(packer.n_packages, n_segments)?;
        Self::with_inner(size_of_element, n_elements_in_segment, n_segments, packer, Box::new(inner))
    }

    pub fn with_inner(
        size_of_element: usize,
        n_elements_in_segment: u64,
        n_segments: usize,
        packer: PackerHasher,
        inner_commitment_scheme: Box<dyn CommitmentSchemeProver>,
    ) -> Result<Self> {
        ensure(
            packer.n_elements_in_package <= n_elements_in_segment,
            || "a package cannot span multiple segments".to_string(),
        )?;
        Ok(Self {
            size_of_element,
            n_elements_in_segment,
            n_segments,
            packer,
            inner_commitment_scheme,
            queries: BTreeSet::new(),
            missing_element_queries: Vec::new(),
            n_missing_elements_for_inner_layer: 0,
        })
    }

    pub fn num_packages(&self) -> u64 {
        self.packer.n_packages
    }
}

impl CommitmentSchemeProver for PackagingCommitmentSchemeProver {
    fn num_segments(&self) -> usize {
        self.n_segments
    }

    fn segment_length_in_elements(&self) -> u64 {
        self.n_elements_in_segment
    }

    fn element_length_in_bytes(&self) -> usize {
        self.size_of_element
    }

    fn add_segment_for_commitment(
        &mut self,
        segment_data: &[u8],
        segment_index: usize,
    ) -> Result<()> {
        ensure(
            segment_data.len() as u64 == self.n_elements_in_segment * self.size_of_element as u64,
            || {
                format!(
                    "segment size is {} instead of the expected {}",
                    segment_data.len(),
                    self.n_elements_in_segment * self.size_of_element as u64
                )
            },
        )?;
        self.inner_commitment_scheme
            .add_segment_for_commitment(&self.packer.pack_and_hash(segment_data), segment_index)
    }

    fn commit(&mut self, channel: &mut ProverChannel) -> Result<()> {
        self.inner_commitment_scheme.commit(channel)
    }

    fn start_decommitment_phase(&mut self, queries: &BTreeSet<u64>) -> Result<Vec<u64>> {
        self.queries = queries.clone();
        self.missing_element_queries =
            self.packer.elements_required_to_compute_hashes(queries)?;

        // The inner scheme works in package indices.
        let package_queries: BTreeSet<u64> = queries
            .iter()
            .map(|q| q / self.packer.n_elements_in_package)
            .collect();
        let missing_package_queries = self
            .inner_commitment_scheme
            .start_decommitment_phase(&package_queries)?;
        let missing_elements_for_inner =
            self.packer.elements_in_packages(&missing_package_queries);

        self.n_missing_elements_for_inner_layer = missing_elements_for_inner.len();
        let mut all_missing_elements = Vec::with_capacity(
            self.missing_element_queries.len() + missing_elements_for_inner.len(),
        );
        // The two missing-element lists are disjoint.
        all_missing_elements.extend_from_slice(&self.missing_element_queries);
        all_missing_elements.extend_from_slice(&missing_elements_for_inner);
        Ok(all_missing_elements)
    }

    fn decommit(&mut self, elements_data: &[u8], channel: &mut ProverChannel) -> Result<()> {
        let n_fetched =
            self.missing_element_queries.len() + self.n_missing_elements_for_inner_layer;
        ensure(
            elements_data.len() == self.size_of_element * n_fetched,
            || "decommit data does not match the start_decommitment_phase request".to_string(),
        )?;

        // Send the elements needed to complete this layer's packages.
        for (i, element) in self.missing_element_queries.iter().enumerate() {
            let bytes = &elements_data[i * self.size_of_element..(i + 1) * self.size_of_element];
            channel.send_data(bytes, &missing_element_annotation(*element))?;
        }

        // Pack and hash the data the inner layer requested and pass it down.
        let inner_data = self.packer.pack_and_hash(
            &elements_data[self.missing_element_queries.len() * self.size_of_element..],
        );
        self.inner_commitment_scheme.decommit(&inner_data, channel)
    }
}

pub struct PackagingCommitmentSchemeVerifier {
    size_of_element: usize,
    n_elements: u64,
    packer: PackerHasher,
    inner_commitment_scheme: Box<dyn CommitmentSchemeVerifier>,
}

impl PackagingCommitmentSchemeVerifier {
    pub fn new(size_of_element: usize, n_elements: u64) -> Result<Self> {
        let packer = PackerHasher::new(size_of_element, n_elements)?;
        let inner = MerkleCommitmentSchemeVerifier::new(packer.n_packages);
        Ok(Self {
            size_of_element,
            n_elements,
            packer,
            inner_commitment_scheme: Box::new(inner),
        })
    }

    pub fn num_packages(&self) -> u64 {
        self.packer.n_packages
    }
}

impl CommitmentSchemeVerifier for PackagingCommitmentSchemeVerifier {
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
        // Read the package-completing elements the prover sent.
        let known: BTreeSet<u64> = elements_to_verify.keys().copied().collect();
        let missing_element_indices = self.packer.elements_required_to_compute_hashes(&known)?;

        let mut full_data_to_verify = elements_to_verify.clone();
        for missing_element in missing_element_indices {
            let data = channel.receive_data(
                self.size_of_element,
                &missing_element_annotation(missing_element),
            )?;
            full_data_to_verify.insert(missing_element, data);
        }

        let packages_to_verify = self.packer.pack_and_hash_map(&full_data_to_verify)?;
        self.inner_commitment_scheme
            .verify_integrity(&packages_to_verify, channel)
    }
}

#[cfg(test)]
mod tests {
    use basalt_crypto::fiat_shamir::Prng;
    use rand::rngs::StdRng;
    use rand::{Rng, RngCore, SeedableRng};

    use super::*;

    const SEED: &[u8] = b"packaging";

    fn prove(
        data: &[u8],
        size_of_element: usize,
        n_elements: u64,
        queries: &BTreeSet<u64>,
    ) -> (Vec<u8>, BTreeMap<u64, Vec<u8>>) {
        let mut channel = ProverChannel::new(Prng::from_seed(SEED));
        let mut prover =
            PackagingCommitmentSchemeProver::new(size_of_element, n_elements, 1).unwrap();
        prover.add_segment_for_commitment(data, 0).unwrap();
        prover.commit(&mut channel).unwrap();

        let to_fetch = prover.start_decommitment_phase(queries).unwrap();
        let mut fetched = Vec::new();
        for element in &to_fetch {
            let offset = *element as usize * size_of_element;
            fetched.extend_from_slice(&data[offset..offset + size_of_element]);
        }
        prover.decommit(&fetched, &mut channel).unwrap();

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
        let mut verifier =
            PackagingCommitmentSchemeVerifier::new(size_of_element, n_elements).unwrap();
        verifier.read_commitment(&mut channel).unwrap();
        verifier
            .verify_integrity(elements, &mut channel)
            .unwrap_or(false)
    }

    #[test]
    fn small_element_round_trip() {
        let size_of_element = 17;
        let n_elements = 32u64;
        let mut rng = StdRng::seed_from_u64(71);
        let mut data = vec![0u8; size_of_element * n_elements as usize];
        rng.fill_bytes(&mut data);

        let queries = BTreeSet::from([1u64]);
        let (proof, elements) = prove(&data, size_of_element, n_elements, &queries);
        assert!(verify(proof, size_of_element, n_elements, &elements));
    }

    #[test]
    fn prover_fetch_list_covers_packages_and_merkle_needs() {
        // With 4 elements per package, query {1} forces elements 0, 2, 3.
        let size_of_element = 17;
        let n_elements = 32u64;
        let mut prover =
            PackagingCommitmentSchemeProver::new(size_of_element, n_elements, 1).unwrap();
        let to_fetch = prover
            .start_decommitment_phase(&BTreeSet::from([1u64]))
            .unwrap();
        assert_eq!(to_fetch, vec![0, 2, 3]);
    }

    #[test]
    fn random_round_trips_and_corruptions() {
        let mut rng = StdRng::seed_from_u64(72);
        for size_of_element in [8usize, 24, 32, 48] {
            let n_elements = 64u64;
            let mut data = vec![0u8; size_of_element * n_elements as usize];
            rng.fill_bytes(&mut data);

            let mut queries = BTreeSet::new();
            for _ in 0..7 {
                queries.insert(rng.gen_range(0..n_elements));
            }
            let (proof, elements) = prove(&data, size_of_element, n_elements, &queries);
            assert!(verify(
                proof.clone(),
                size_of_element,
                n_elements,
                &elements
            ));

            let mut bad_proof = proof.clone();
            let index = rng.gen_range(0..bad_proof.len());
            bad_proof[index] ^= 1 << rng.gen_range(0..8);
            assert!(!verify(bad_proof, size_of_element, n_elements, &elements));

            let mut bad_elements = elements;
            let victim = *bad_elements.keys().next().unwrap();
            bad_elements.get_mut(&victim).unwrap()[0] ^= 1;
            assert!(!verify(proof, size_of_element, n_elements, &bad_elements));
        }
    }
}
