use crate::hash::{Blake2s256Digest, DIGEST_NUM_BYTES};

/// A seeded, extendable pseudo-random byte stream over Blake2s-256.
///
/// Blocks are produced as `Blake2s(state ∥ 0^24 ∥ BE64(counter))` over a
/// fixed 64-byte buffer; unused tail bytes of a partial block are kept in a
/// spare buffer and served first on the next request. Mixing new bytes in
/// replaces the state with `Blake2s(state ∥ bytes)` and resets the counter
/// and the spare buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct HashChain {
    state: Blake2s256Digest,
    spare_bytes: [u8; 2 * DIGEST_NUM_BYTES],
    num_spare_bytes: usize,
    counter: u64,
}

impl HashChain {
    pub fn new() -> Self {
        Self {
            state: Blake2s256Digest::default(),
            spare_bytes: [0u8; 2 * DIGEST_NUM_BYTES],
            num_spare_bytes: 0,
            counter: 0,
        }
    }

    pub fn with_seed(seed: &[u8]) -> Self {
        let mut chain = Self::new();
        chain.init(seed);
        chain
    }

    /// Re-seeds the chain. The initial seed binds the public input so the
    /// randomness depends on the instance being proven.
    pub fn init(&mut self, seed: &[u8]) {
        self.state = Blake2s256Digest::hash_bytes(seed);
        self.num_spare_bytes = 0;
        self.counter = 0;
    }

    pub fn state(&self) -> &Blake2s256Digest {
        &self.state
    }

    fn hash_with_counter(&self, counter: u64) -> Blake2s256Digest {
        let mut block = [0u8; 2 * DIGEST_NUM_BYTES];
        block[..DIGEST_NUM_BYTES].copy_from_slice(self.state.as_bytes());
        // The counter occupies the most significant end of the buffer.
        block[2 * DIGEST_NUM_BYTES - 8..].copy_from_slice(&counter.to_be_bytes());
        Blake2s256Digest::hash_bytes(&block)
    }

    fn next_block_into(&mut self, out: &mut [u8]) {
        debug_assert!(out.len() <= DIGEST_NUM_BYTES);
        let block = self.hash_with_counter(self.counter);
        self.counter += 1;
        out.copy_from_slice(&block.as_bytes()[..out.len()]);
        let n_leftover = DIGEST_NUM_BYTES - out.len();
        assert!(
            self.num_spare_bytes + n_leftover <= self.spare_bytes.len(),
            "not enough room in the spare bytes buffer"
        );
        self.spare_bytes[self.num_spare_bytes..self.num_spare_bytes + n_leftover]
            .copy_from_slice(&block.as_bytes()[out.len()..]);
        self.num_spare_bytes += n_leftover;
    }

    pub fn random_bytes(&mut self, out: &mut [u8]) {
        let num_full_blocks = out.len() / DIGEST_NUM_BYTES;
        let mut offset = 0;
        for _ in 0..num_full_blocks {
            self.next_block_into(&mut out[offset..offset + DIGEST_NUM_BYTES]);
            offset += DIGEST_NUM_BYTES;
        }

        let num_tail_bytes = out.len() % DIGEST_NUM_BYTES;
        if num_tail_bytes == 0 {
            return;
        }
        if num_tail_bytes <= self.num_spare_bytes {
            out[offset..].copy_from_slice(&self.spare_bytes[..num_tail_bytes]);
            self.spare_bytes.copy_within(num_tail_bytes.., 0);
            self.num_spare_bytes -= num_tail_bytes;
        } else {
            self.next_block_into(&mut out[offset..]);
        }
    }

    /// Mixes arbitrary bytes into the chain.
    pub fn update(&mut self, bytes: &[u8]) {
        let mut mixed = Vec::with_capacity(DIGEST_NUM_BYTES + bytes.len());
        mixed.extend_from_slice(self.state.as_bytes());
        mixed.extend_from_slice(bytes);
        self.state = Blake2s256Digest::hash_bytes(&mixed);
        self.num_spare_bytes = 0;
        self.counter = 0;
    }
}

impl Default for HashChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identically_seeded_chains_agree() {
        let mut first = HashChain::with_seed(b"public input");
        let mut second = HashChain::with_seed(b"public input");
        for request in [1usize, 7, 31, 32, 33, 64, 100] {
            let mut a = vec![0u8; request];
            let mut b = vec![0u8; request];
            first.random_bytes(&mut a);
            second.random_bytes(&mut b);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn differently_seeded_chains_diverge() {
        let mut first = HashChain::with_seed(b"seed a");
        let mut second = HashChain::with_seed(b"seed b");
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        first.random_bytes(&mut a);
        second.random_bytes(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn update_resets_the_stream() {
        let mut chain = HashChain::with_seed(b"seed");
        let mut reference = chain.clone();
        let mut skipped = [0u8; 48];
        chain.random_bytes(&mut skipped);
        chain.update(b"mix");
        reference.update(b"mix");

        // After the update both chains agree, regardless of the bytes drawn
        // before it.
        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        chain.random_bytes(&mut a);
        reference.random_bytes(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn spare_bytes_continue_the_stream() {
        // Drawing 40 bytes then 24 bytes must equal drawing 64 bytes.
        let mut split = HashChain::with_seed(b"stream");
        let mut whole = HashChain::with_seed(b"stream");
        let mut first = [0u8; 40];
        let mut second = [0u8; 24];
        split.random_bytes(&mut first);
        split.random_bytes(&mut second);
        let mut all = [0u8; 64];
        whole.random_bytes(&mut all);
        assert_eq!(&all[..40], &first[..]);
        assert_eq!(&all[40..], &second[..]);
    }

    proptest::proptest! {
        /// Identically seeded chains agree over any request pattern, and a
        /// single mixed byte decorrelates them.
        #[test]
        fn determinism_over_arbitrary_requests(
            requests in proptest::collection::vec(0usize..100, 1..20)
        ) {
            let mut first = HashChain::with_seed(b"deterministic");
            let mut second = HashChain::with_seed(b"deterministic");
            for request in &requests {
                let mut a = vec![0u8; *request];
                let mut b = vec![0u8; *request];
                first.random_bytes(&mut a);
                second.random_bytes(&mut b);
                proptest::prop_assert_eq!(a, b);
            }
            second.update(&[0]);
            let mut a = [0u8; 32];
            let mut b = [0u8; 32];
            first.random_bytes(&mut a);
            second.random_bytes(&mut b);
            proptest::prop_assert_ne!(a, b);
        }
    }

    #[test]
    fn request_larger_than_spare_draws_a_new_block() {
        let mut chain = HashChain::with_seed(b"tail");
        let mut head = [0u8; 31];
        chain.random_bytes(&mut head);
        assert_eq!(chain.num_spare_bytes, 1);
        let mut tail = [0u8; 2];
        chain.random_bytes(&mut tail);
        // The spare byte was bypassed and a fresh block consumed.
        assert_eq!(chain.counter, 2);
    }
}
