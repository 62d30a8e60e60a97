use basalt_crypto::fiat_shamir::Prng;
use basalt_crypto::hash::{Blake2s256Digest, DIGEST_NUM_BYTES};
use basalt_math::field::{ExtensionFieldElement, FieldElement};

use crate::channel::proof_of_work;
use crate::channel::{Channel, ChannelState};
use crate::errors::{Result, StarkError};

/// The verifier's end of the transcript: `receive_*` reads from the fixed
/// proof buffer while mixing the same bytes into an identically-seeded hash
/// chain, and `get_and_send_*` re-derives the randomness the prover already
/// consumed.
pub struct VerifierChannel {
    state: ChannelState,
    proof: Vec<u8>,
    proof_read_index: usize,
}

impl VerifierChannel {
    pub fn new(prng: Prng, proof: Vec<u8>) -> Self {
        Self {
            state: ChannelState::new(prng),
            proof,
            proof_read_index: 0,
        }
    }

    /// True once the whole proof buffer was consumed.
    pub fn is_end_of_proof(&self) -> bool {
        self.proof_read_index >= self.proof.len()
    }

    /// Reads raw bytes from the proof and updates the hash chain.
    pub fn receive_bytes(&mut self, n_bytes: usize) -> Result<Vec<u8>> {
        if self.proof_read_index + n_bytes > self.proof.len() {
            return Err(StarkError::TranscriptExhausted);
        }
        let bytes = self.proof[self.proof_read_index..self.proof_read_index + n_bytes].to_vec();
        self.proof_read_index += n_bytes;
        self.state.prng.mix_seed_with_bytes(&bytes);
        Ok(bytes)
    }

    pub fn receive_data(&mut self, n_bytes: usize, annotation: &str) -> Result<Vec<u8>> {
        let data = self.receive_bytes(n_bytes)?;
        self.state.annotate_prover_to_verifier(
            &format!("{annotation}: Data(0x{})", hex::encode(&data)),
            n_bytes,
        )?;
        self.state.statistics.data_count += 1;
        Ok(data)
    }

    pub fn receive_field_element<F: FieldElement>(&mut self, annotation: &str) -> Result<F> {
        let bytes = self.receive_bytes(F::SIZE_IN_BYTES)?;
        let element = F::from_bytes(&bytes)
            .map_err(|e| StarkError::InvalidProof(format!("malformed field element: {e}")))?;
        self.state.annotate_prover_to_verifier(
            &format!("{annotation}: Field Element({element})"),
            F::SIZE_IN_BYTES,
        )?;
        self.state.statistics.field_element_count += 1;
        Ok(element)
    }

    pub fn receive_field_element_span(
        &mut self,
        n_elements: usize,
        annotation: &str,
    ) -> Result<Vec<ExtensionFieldElement>> {
        let n_bytes = n_elements * ExtensionFieldElement::SIZE_IN_BYTES;
        let bytes = self.receive_bytes(n_bytes)?;
        let mut elements = Vec::with_capacity(n_elements);
        for chunk in bytes.chunks(ExtensionFieldElement::SIZE_IN_BYTES) {
            elements.push(
                ExtensionFieldElement::from_bytes(chunk).map_err(|e| {
                    StarkError::InvalidProof(format!("malformed field element: {e}"))
                })?,
            );
        }
        let rendered: Vec<String> = elements.iter().map(|v| v.to_string()).collect();
        self.state.annotate_prover_to_verifier(
            &format!("{annotation}: Field Elements({})", rendered.join(", ")),
            n_bytes,
        )?;
        self.state.statistics.field_element_count += n_elements;
        Ok(elements)
    }

    pub fn receive_commitment_hash(&mut self, annotation: &str) -> Result<Blake2s256Digest> {
        let bytes = self.receive_bytes(DIGEST_NUM_BYTES)?;
        let hash = Blake2s256Digest::from_bytes(&bytes)
            .expect("receive_bytes returned the requested length");
        self.state.annotate_prover_to_verifier(
            &format!("{annotation}: Hash({hash})"),
            DIGEST_NUM_BYTES,
        )?;
        self.state.statistics.commitment_count += 1;
        self.state.statistics.hash_count += 1;
        Ok(hash)
    }

    pub fn receive_decommitment_node(&mut self, annotation: &str) -> Result<Blake2s256Digest> {
        let bytes = self.receive_bytes(DIGEST_NUM_BYTES)?;
        let hash = Blake2s256Digest::from_bytes(&bytes)
            .expect("receive_bytes returned the requested length");
        self.state.annotate_prover_to_verifier(
            &format!("{annotation}: Hash({hash})"),
            DIGEST_NUM_BYTES,
        )?;
        self.state.statistics.hash_count += 1;
        Ok(hash)
    }

    /// Draws a number in `[0, upper_bound)` and "sends" it to the prover
    /// (a no-op for a non-interactive transcript).
    pub fn get_and_send_random_number(&mut self, upper_bound: u64, annotation: &str) -> Result<u64> {
        self.check_sending_allowed()?;
        let number = self.state.draw_number(upper_bound);
        self.state
            .annotate_verifier_to_prover(&format!("{annotation}: Number({number})"))?;
        Ok(number)
    }

    pub fn get_and_send_random_field_element(
        &mut self,
        annotation: &str,
    ) -> Result<ExtensionFieldElement> {
        self.check_sending_allowed()?;
        let element = self.state.draw_field_element();
        self.state
            .annotate_verifier_to_prover(&format!("{annotation}: Field Element({element})"))?;
        Ok(element)
    }

    /// Asserts each future annotation equals the corresponding entry, e.g.
    /// to replay a prover transcript.
    pub fn set_expected_annotations(&mut self, expected: Vec<String>) {
        self.state.expected_annotations = Some(expected);
    }

    fn check_sending_allowed(&self) -> Result<()> {
        if self.state.query_phase_begun {
            return Err(StarkError::InvariantViolation(
                "verifier can't send randomness after query phase has begun".to_string(),
            ));
        }
        Ok(())
    }
}

impl Channel for VerifierChannel {
    fn state(&mut self) -> &mut ChannelState {
        &mut self.state
    }

    fn state_ref(&self) -> &ChannelState {
        &self.state
    }

    fn random_number(&mut self, upper_bound: u64, annotation: &str) -> Result<u64> {
        self.get_and_send_random_number(upper_bound, annotation)
    }

    fn random_field_element(&mut self, annotation: &str) -> Result<ExtensionFieldElement> {
        self.get_and_send_random_field_element(annotation)
    }

    /// Reads the nonce and checks it against the pre-read chain state.
    fn apply_proof_of_work(&mut self, work_bits: usize) -> Result<()> {
        if work_bits == 0 {
            return Ok(());
        }
        let seed = self.state.prng.state();
        let witness_bytes = self.receive_data(proof_of_work::NONCE_BYTES, "POW")?;
        let witness: [u8; proof_of_work::NONCE_BYTES] = witness_bytes
            .try_into()
            .expect("receive_data returned the requested length");
        if !proof_of_work::verify(&seed, work_bits, &witness)? {
            return Err(StarkError::InvalidProof("wrong proof of work".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ProverChannel;
    use basalt_math::field::BaseFieldElement;

    fn channel_pair(
        build_proof: impl FnOnce(&mut ProverChannel),
    ) -> (ProverChannel, VerifierChannel) {
        let mut prover = ProverChannel::new(Prng::from_seed(b"channel"));
        build_proof(&mut prover);
        let proof = prover.proof().to_vec();
        (prover, VerifierChannel::new(Prng::from_seed(b"channel"), proof))
    }

    #[test]
    fn sent_bytes_are_received_in_order() {
        let (_, mut verifier) = channel_pair(|prover| {
            prover.send_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
            prover.send_bytes(&[9, 10, 11, 12]);
        });
        assert_eq!(verifier.receive_bytes(8).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(verifier.receive_bytes(4).unwrap(), vec![9, 10, 11, 12]);
        assert!(verifier.is_end_of_proof());
    }

    #[test]
    fn derived_randomness_matches_the_prover() {
        let mut prover = ProverChannel::new(Prng::from_seed(b"rand"));
        let prover_number = prover.receive_number(1000, "q").unwrap();
        let prover_element = prover.receive_field_element("z").unwrap();

        let mut verifier = VerifierChannel::new(Prng::from_seed(b"rand"), prover.proof().to_vec());
        assert_eq!(
            verifier.get_and_send_random_number(1000, "q").unwrap(),
            prover_number
        );
        assert_eq!(
            verifier.get_and_send_random_field_element("z").unwrap(),
            prover_element
        );
    }

    #[test]
    fn send_receive_round_trip() {
        let element = BaseFieldElement::from_uint(777);
        let extension = ExtensionFieldElement::from_uint(1234);
        let digest = Blake2s256Digest::hash_bytes(b"commitment");
        let (_, mut verifier) = channel_pair(|prover| {
            prover.send_field_element(&element, "base").unwrap();
            prover.send_field_element(&extension, "ext").unwrap();
            prover.send_commitment_hash(&digest, "commitment").unwrap();
        });
        assert!(!verifier.is_end_of_proof());
        assert_eq!(
            verifier
                .receive_field_element::<BaseFieldElement>("base")
                .unwrap(),
            element
        );
        assert_eq!(
            verifier
                .receive_field_element::<ExtensionFieldElement>("ext")
                .unwrap(),
            extension
        );
        assert_eq!(
            verifier.receive_commitment_hash("commitment").unwrap(),
            digest
        );
        assert!(verifier.is_end_of_proof());
        assert_eq!(
            verifier.receive_commitment_hash("past the end"),
            Err(StarkError::TranscriptExhausted)
        );
    }

    #[test]
    fn proof_of_work_round_trip() {
        let work_bits = 12;
        let mut prover = ProverChannel::new(Prng::from_seed(b"channel"));
        prover.apply_proof_of_work(work_bits).unwrap();
        let number = prover.receive_number(1 << 24, "q").unwrap();

        let mut verifier_good =
            VerifierChannel::new(Prng::from_seed(b"channel"), prover.proof().to_vec());
        verifier_good.apply_proof_of_work(work_bits).unwrap();
        assert_eq!(
            verifier_good
                .get_and_send_random_number(1 << 24, "q")
                .unwrap(),
            number
        );

        // Wrong difficulty fails.
        let mut verifier_bad =
            VerifierChannel::new(Prng::from_seed(b"channel"), prover.proof().to_vec());
        assert!(matches!(
            verifier_bad.apply_proof_of_work(work_bits + 1),
            Err(StarkError::InvalidProof(_))
        ));
    }

    #[test]
    fn annotation_replay() {
        let mut prover = ProverChannel::new(Prng::from_seed(b"notes"));
        prover.enter_annotation_scope("FRI");
        prover
            .send_field_element(&BaseFieldElement::from_uint(5), "value")
            .unwrap();
        let _ = prover.receive_number(16, "index").unwrap();
        prover.exit_annotation_scope();

        let mut verifier = VerifierChannel::new(Prng::from_seed(b"notes"), prover.proof().to_vec());
        verifier.set_expected_annotations(prover.annotations().to_vec());
        verifier.enter_annotation_scope("FRI");
        verifier
            .receive_field_element::<BaseFieldElement>("value")
            .unwrap();
        verifier.get_and_send_random_number(16, "index").unwrap();
        verifier.exit_annotation_scope();
        assert_eq!(prover.annotations(), verifier.annotations());
    }

    #[test]
    fn mismatched_annotation_is_detected() {
        let mut prover = ProverChannel::new(Prng::from_seed(b"notes"));
        let _ = prover.receive_number(16, "index").unwrap();

        let mut verifier = VerifierChannel::new(Prng::from_seed(b"notes"), Vec::new());
        verifier.set_expected_annotations(prover.annotations().to_vec());
        assert!(verifier
            .get_and_send_random_number(16, "wrong label")
            .is_err());
    }
}
