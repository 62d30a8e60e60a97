//! A full binary Merkle tree of Blake2s-256 digests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::errors::CryptoError;
use crate::hash::Blake2s256Digest;

/// A binary tree over `data_length` hash-sized leaves (a power of two).
///
/// Nodes are stored heap-style in a 1-based array: the root is node 1, the
/// children of node `i` are `2i` and `2i+1`, and the leaves occupy
/// `[data_length, 2·data_length)`. Writing a segment of leaves eagerly
/// hashes the complete subtrees it covers; `get_root` finishes the upper
/// levels on demand.
pub struct MerkleTree {
    data_length: u64,
    height: u32,
    nodes: Vec<Blake2s256Digest>,
}

impl MerkleTree {
    pub fn new(data_length: u64) -> Result<Self, CryptoError> {
        if data_length == 0 || !data_length.is_power_of_two() {
            return Err(CryptoError::DataLengthNotPowerOfTwo(data_length));
        }
        Ok(Self {
            data_length,
            height: data_length.trailing_zeros(),
            nodes: vec![Blake2s256Digest::default(); 2 * data_length as usize],
        })
    }

    pub fn data_length(&self) -> u64 {
        self.data_length
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Writes `leaves` into consecutive leaf slots starting at `start_index`
    /// and hashes every pair whose two children are now within the written
    /// range, cascading upwards.
    pub fn add_data(
        &mut self,
        leaves: &[Blake2s256Digest],
        start_index: u64,
    ) -> Result<(), CryptoError> {
        let end_index = start_index
            .checked_add(leaves.len() as u64)
            .ok_or(CryptoError::SegmentOutOfRange)?;
        if end_index > self.data_length {
            return Err(CryptoError::SegmentOutOfRange);
        }
        let first_node = (self.data_length + start_index) as usize;
        self.nodes[first_node..first_node + leaves.len()].copy_from_slice(leaves);

        // Hash the complete subtrees covered by the written range.
        let mut low = self.data_length + start_index;
        let mut high = self.data_length + end_index;
        loop {
            let parent_low = (low + 1) / 2;
            let parent_high = high / 2;
            if parent_low >= parent_high {
                break;
            }
            for parent in parent_low..parent_high {
                self.nodes[parent as usize] = Blake2s256Digest::hash_pair(
                    &self.nodes[2 * parent as usize],
                    &self.nodes[(2 * parent + 1) as usize],
                );
            }
            low = parent_low;
            high = parent_high;
        }
        Ok(())
    }

    /// Returns the root, recomputing the levels above `from_depth` (depth 0
    /// is the root, depth `height` the leaves). Levels at depth >=
    /// `from_depth` are assumed up to date, which `add_data` guarantees for
    /// any depth down to the written segments' subtree roots.
    pub fn get_root(&mut self, from_depth: u32) -> Result<Blake2s256Digest, CryptoError> {
        if from_depth > self.height {
            return Err(CryptoError::DepthOutOfRange);
        }
        for depth in (0..from_depth).rev() {
            let level_start = 1u64 << depth;
            for node in level_start..2 * level_start {
                self.nodes[node as usize] = Blake2s256Digest::hash_pair(
                    &self.nodes[2 * node as usize],
                    &self.nodes[(2 * node + 1) as usize],
                );
            }
        }
        Ok(self.nodes[1])
    }

    /// Produces the minimal set of sibling hashes with which the queried
    /// leaves authenticate against the root, in a deterministic bottom-up
    /// order. The tree's inner nodes are completed first if necessary.
    pub fn generate_decommitment(
        &mut self,
        queries: &BTreeSet<u64>,
    ) -> Result<Vec<Blake2s256Digest>, CryptoError> {
        if queries.is_empty() {
            return Err(CryptoError::EmptyQueries);
        }
        if queries.iter().any(|q| *q >= self.data_length) {
            return Err(CryptoError::QueryOutOfRange);
        }
        self.get_root(self.height)?;

        let mut queue: VecDeque<u64> = queries.iter().map(|q| q + self.data_length).collect();
        let mut siblings = Vec::new();
        while let Some(node) = queue.pop_front() {
            if node == 1 {
                break;
            }
            let sibling = node ^ 1;
            if queue.front() == Some(&sibling) {
                queue.pop_front();
            } else {
                siblings.push(self.nodes[sibling as usize]);
            }
            queue.push_back(node / 2);
        }
        Ok(siblings)
    }

    /// Recomputes the root from the queried leaves, pulling missing siblings
    /// from `next_sibling` in the order `generate_decommitment` emits them.
    /// Returns whether the recomputed root matches.
    pub fn verify_decommitment<E>(
        leaves_by_index: &BTreeMap<u64, Blake2s256Digest>,
        data_length: u64,
        root: &Blake2s256Digest,
        mut next_sibling: impl FnMut() -> Result<Blake2s256Digest, E>,
    ) -> Result<bool, E> {
        if leaves_by_index.is_empty()
            || !data_length.is_power_of_two()
            || leaves_by_index.keys().any(|q| *q >= data_length)
        {
            return Ok(false);
        }
        let mut queue: VecDeque<(u64, Blake2s256Digest)> = leaves_by_index
            .iter()
            .map(|(index, digest)| (index + data_length, *digest))
            .collect();
        while let Some((node, digest)) = queue.pop_front() {
            if node == 1 {
                return Ok(digest == *root);
            }
            let sibling = node ^ 1;
            let sibling_digest = match queue.front() {
                Some((front_node, front_digest)) if *front_node == sibling => {
                    let digest = *front_digest;
                    queue.pop_front();
                    digest
                }
                _ => next_sibling()?,
            };
            let parent = if node % 2 == 0 {
                Blake2s256Digest::hash_pair(&digest, &sibling_digest)
            } else {
                Blake2s256Digest::hash_pair(&sibling_digest, &digest)
            };
            queue.push_back((node / 2, parent));
        }
        unreachable!("the queue drains only through the root")
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, RngCore, SeedableRng};

    use super::*;

    fn random_digests(rng: &mut StdRng, n: usize) -> Vec<Blake2s256Digest> {
        (0..n)
            .map(|_| {
                let mut bytes = [0u8; 32];
                rng.fill_bytes(&mut bytes);
                Blake2s256Digest::from_digest(bytes)
            })
            .collect()
    }

    fn verify_with_siblings(
        leaves: &BTreeMap<u64, Blake2s256Digest>,
        n: u64,
        root: &Blake2s256Digest,
        siblings: &[Blake2s256Digest],
    ) -> bool {
        let mut iter = siblings.iter();
        let result = MerkleTree::verify_decommitment(leaves, n, root, || {
            iter.next().copied().ok_or(())
        });
        result.unwrap_or(false) && iter.next().is_none()
    }

    #[test]
    fn root_is_stable_across_calls_and_depths() {
        let mut rng = StdRng::seed_from_u64(41);
        let data = random_digests(&mut rng, 16);
        let mut tree = MerkleTree::new(16).unwrap();
        tree.add_data(&data[..8], 0).unwrap();
        tree.add_data(&data[8..], 8).unwrap();
        let reference = tree.get_root(4).unwrap();
        for from_depth in 0..=4 {
            assert_eq!(tree.get_root(from_depth).unwrap(), reference);
        }
    }

    #[test]
    fn invalid_inputs() {
        assert!(MerkleTree::new(9).is_err());
        let mut tree = MerkleTree::new(8).unwrap();
        assert!(tree.get_root(4).is_err());
        let mut rng = StdRng::seed_from_u64(42);
        let data = random_digests(&mut rng, 9);
        assert!(tree.add_data(&data, 0).is_err());
        assert!(tree.add_data(&data[..8], 2).is_err());
        assert!(tree
            .generate_decommitment(&BTreeSet::new())
            .is_err());
        assert!(tree
            .generate_decommitment(&BTreeSet::from([2, 17]))
            .is_err());
    }

    #[test]
    fn changing_a_leaf_changes_the_root() {
        let mut rng = StdRng::seed_from_u64(43);
        let data = random_digests(&mut rng, 8);
        let mut tree = MerkleTree::new(8).unwrap();
        tree.add_data(&data, 0).unwrap();
        let root = tree.get_root(0).unwrap();
        tree.add_data(&random_digests(&mut rng, 1), 0).unwrap();
        assert_ne!(tree.get_root(3).unwrap(), root);
    }

    #[test]
    fn single_query_decommitment_has_height_many_siblings() {
        let mut rng = StdRng::seed_from_u64(44);
        let data = random_digests(&mut rng, 8);
        let mut tree = MerkleTree::new(8).unwrap();
        tree.add_data(&data, 0).unwrap();
        let root = tree.get_root(0).unwrap();

        let queries = BTreeSet::from([3u64]);
        let siblings = tree.generate_decommitment(&queries).unwrap();
        assert_eq!(siblings.len(), 3);

        let leaves = BTreeMap::from([(3u64, data[3])]);
        assert!(verify_with_siblings(&leaves, 8, &root, &siblings));
    }

    #[test]
    fn random_queries_round_trip() {
        let mut rng = StdRng::seed_from_u64(45);
        for log_size in 0..8 {
            let n = 1u64 << log_size;
            let data = random_digests(&mut rng, n as usize);
            let mut tree = MerkleTree::new(n).unwrap();
            tree.add_data(&data, 0).unwrap();
            let root = tree.get_root(0).unwrap();

            let mut queries = BTreeSet::new();
            let n_queries = rng.gen_range(1..=u64::min(10, n));
            while (queries.len() as u64) < n_queries {
                queries.insert(rng.gen_range(0..n));
            }
            let leaves: BTreeMap<u64, Blake2s256Digest> =
                queries.iter().map(|q| (*q, data[*q as usize])).collect();
            let siblings = tree.generate_decommitment(&queries).unwrap();
            assert!(verify_with_siblings(&leaves, n, &root, &siblings));
        }
    }

    #[test]
    fn corrupting_data_or_siblings_fails_verification() {
        let mut rng = StdRng::seed_from_u64(46);
        let data = random_digests(&mut rng, 32);
        let mut tree = MerkleTree::new(32).unwrap();
        tree.add_data(&data, 0).unwrap();
        let root = tree.get_root(0).unwrap();

        let queries = BTreeSet::from([1u64, 12, 31]);
        let siblings = tree.generate_decommitment(&queries).unwrap();

        let good: BTreeMap<u64, Blake2s256Digest> =
            queries.iter().map(|q| (*q, data[*q as usize])).collect();
        assert!(verify_with_siblings(&good, 32, &root, &siblings));

        let mut bad_leaves = good.clone();
        bad_leaves.insert(12, random_digests(&mut rng, 1)[0]);
        assert!(!verify_with_siblings(&bad_leaves, 32, &root, &siblings));

        let mut bad_siblings = siblings;
        let victim = rng.gen_range(0..bad_siblings.len());
        let mut bytes = *bad_siblings[victim].as_bytes();
        bytes[0] ^= 1;
        bad_siblings[victim] = Blake2s256Digest::from_digest(bytes);
        assert!(!verify_with_siblings(&good, 32, &root, &bad_siblings));
    }
}
