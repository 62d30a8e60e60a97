use basalt_crypto::fiat_shamir::Prng;
use basalt_crypto::hash::Blake2s256Digest;
use basalt_math::field::{ExtensionFieldElement, FieldElement};

use crate::channel::proof_of_work;
use crate::channel::{Channel, ChannelState};
use crate::errors::{Result, StarkError};

/// The prover's end of the transcript: `send_*` appends to the proof and
/// mixes the bytes into the hash chain, `receive_*`/`random_*` derives the
/// simulated verifier's randomness from the chain without appending.
pub struct ProverChannel {
    state: ChannelState,
    proof: Vec<u8>,
}

impl ProverChannel {
    /// The prng must be seeded from the public input so the prover cannot
    /// retrofit the statement to the transcript.
    pub fn new(prng: Prng) -> Self {
        Self {
            state: ChannelState::new(prng),
            proof: Vec::new(),
        }
    }

    pub fn proof(&self) -> &[u8] {
        &self.proof
    }

    pub fn into_proof(self) -> Vec<u8> {
        self.proof
    }

    /// Writes raw bytes to the proof and updates the hash chain.
    pub fn send_bytes(&mut self, bytes: &[u8]) {
        self.proof.extend_from_slice(bytes);
        self.state.prng.mix_seed_with_bytes(bytes);
    }

    pub fn send_data(&mut self, data: &[u8], annotation: &str) -> Result<()> {
        self.send_bytes(data);
        self.state.annotate_prover_to_verifier(
            &format!("{annotation}: Data(0x{})", hex::encode(data)),
            data.len(),
        )?;
        self.state.statistics.data_count += 1;
        Ok(())
    }

    pub fn send_field_element<F: FieldElement>(
        &mut self,
        value: &F,
        annotation: &str,
    ) -> Result<()> {
        self.send_bytes(&value.to_bytes_vec());
        self.state.annotate_prover_to_verifier(
            &format!("{annotation}: Field Element({value})"),
            F::SIZE_IN_BYTES,
        )?;
        self.state.statistics.field_element_count += 1;
        Ok(())
    }

    pub fn send_field_element_span(
        &mut self,
        values: &[ExtensionFieldElement],
        annotation: &str,
    ) -> Result<()> {
        let mut bytes = Vec::with_capacity(values.len() * ExtensionFieldElement::SIZE_IN_BYTES);
        for value in values {
            bytes.extend_from_slice(&value.to_bytes_vec());
        }
        self.send_bytes(&bytes);
        let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.state.annotate_prover_to_verifier(
            &format!("{annotation}: Field Elements({})", rendered.join(", ")),
            bytes.len(),
        )?;
        self.state.statistics.field_element_count += values.len();
        Ok(())
    }

    pub fn send_commitment_hash(
        &mut self,
        hash: &Blake2s256Digest,
        annotation: &str,
    ) -> Result<()> {
        self.send_bytes(hash.as_bytes());
        self.state.annotate_prover_to_verifier(
            &format!("{annotation}: Hash({hash})"),
            hash.as_bytes().len(),
        )?;
        self.state.statistics.commitment_count += 1;
        self.state.statistics.hash_count += 1;
        Ok(())
    }

    pub fn send_decommitment_node(
        &mut self,
        hash: &Blake2s256Digest,
        annotation: &str,
    ) -> Result<()> {
        self.send_bytes(hash.as_bytes());
        self.state.annotate_prover_to_verifier(
            &format!("{annotation}: Hash({hash})"),
            hash.as_bytes().len(),
        )?;
        self.state.statistics.hash_count += 1;
        Ok(())
    }

    /// Derives the simulated verifier's next field element. Forbidden after
    /// the query phase has begun.
    pub fn receive_field_element(&mut self, annotation: &str) -> Result<ExtensionFieldElement> {
        self.check_receiving_allowed()?;
        let element = self.state.draw_field_element();
        self.state
            .annotate_verifier_to_prover(&format!("{annotation}: Field Element({element})"))?;
        Ok(element)
    }

    /// Derives the simulated verifier's next number in `[0, upper_bound)`.
    pub fn receive_number(&mut self, upper_bound: u64, annotation: &str) -> Result<u64> {
        self.check_receiving_allowed()?;
        let number = self.state.draw_number(upper_bound);
        self.state
            .annotate_verifier_to_prover(&format!("{annotation}: Number({number})"))?;
        Ok(number)
    }

    fn check_receiving_allowed(&self) -> Result<()> {
        if self.state.query_phase_begun {
            return Err(StarkError::InvariantViolation(
                "prover can't receive randomness after query phase has begun".to_string(),
            ));
        }
        Ok(())
    }
}

impl Channel for ProverChannel {
    fn state(&mut self) -> &mut ChannelState {
        &mut self.state
    }

    fn state_ref(&self) -> &ChannelState {
        &self.state
    }

    fn random_number(&mut self, upper_bound: u64, annotation: &str) -> Result<u64> {
        self.receive_number(upper_bound, annotation)
    }

    fn random_field_element(&mut self, annotation: &str) -> Result<ExtensionFieldElement> {
        self.receive_field_element(annotation)
    }

    /// Finds a nonce for the current chain state and sends it.
    fn apply_proof_of_work(&mut self, work_bits: usize) -> Result<()> {
        if work_bits == 0 {
            return Ok(());
        }
        let witness = proof_of_work::prove(&self.state.prng.state(), work_bits)?;
        self.send_data(&witness, "POW")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_math::field::BaseFieldElement;

    fn channel(seed: &[u8]) -> ProverChannel {
        ProverChannel::new(Prng::from_seed(seed))
    }

    #[test]
    fn sent_bytes_change_future_randomness() {
        let mut quiet = channel(b"state");
        let mut talkative = channel(b"state");
        talkative.send_bytes(&[1, 2, 3]);
        assert_ne!(
            quiet.receive_number(1 << 24, "n").unwrap(),
            talkative.receive_number(1 << 24, "n").unwrap()
        );
    }

    #[test]
    fn receiving_does_not_touch_the_proof() {
        let mut channel = channel(b"quiet");
        let _ = channel.receive_field_element("z").unwrap();
        let _ = channel.receive_number(100, "q").unwrap();
        assert!(channel.proof().is_empty());
    }

    #[test]
    fn field_elements_are_serialized_big_endian() {
        let mut channel = channel(b"wire");
        channel
            .send_field_element(&BaseFieldElement::from_uint(0x0102), "x")
            .unwrap();
        assert_eq!(channel.proof(), &[0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn no_randomness_after_query_phase() {
        let mut channel = channel(b"late");
        channel.begin_query_phase();
        assert!(channel.receive_number(4, "q").is_err());
        assert!(channel.receive_field_element("z").is_err());
    }

    #[test]
    fn proof_of_work_mixes_into_the_chain() {
        let mut with_pow = channel(b"pow");
        let mut without_pow = channel(b"pow");
        let baseline = without_pow.receive_number(1 << 24, "n").unwrap();
        with_pow.apply_proof_of_work(10).unwrap();
        assert_ne!(with_pow.receive_number(1 << 24, "n").unwrap(), baseline);
        // Zero difficulty is a no-op.
        let mut zero_pow = channel(b"pow");
        zero_pow.apply_proof_of_work(0).unwrap();
        assert_eq!(zero_pow.receive_number(1 << 24, "n").unwrap(), baseline);
    }
}
