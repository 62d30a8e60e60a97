//! Non-interactive prover/verifier channels.
//!
//! Both channels mix every transmitted byte into an identically-seeded hash
//! chain and derive "verifier" randomness from it, so the interaction
//! collapses to a byte transcript (Fiat-Shamir). The order of send/receive
//! calls defines the transcript and must match exactly on both sides.

pub mod proof_of_work;
pub mod prover_channel;
pub mod verifier_channel;

pub use prover_channel::ProverChannel;
pub use verifier_channel::VerifierChannel;

use basalt_crypto::fiat_shamir::Prng;
use basalt_math::field::{ExtensionFieldElement, FieldElement};

use crate::errors::{Result, StarkError};

/// Counters for the proof-cost breakdown of a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStatistics {
    pub field_element_count: usize,
    pub commitment_count: usize,
    pub hash_count: usize,
    pub data_count: usize,
}

/// State common to the prover and verifier channels: the Fiat-Shamir hash
/// chain, the annotation log and the query-phase latch.
pub struct ChannelState {
    prng: Prng,
    annotations: Vec<String>,
    scope_stack: Vec<String>,
    annotations_enabled: bool,
    expected_annotations: Option<Vec<String>>,
    prover_to_verifier_bytes: usize,
    statistics: ChannelStatistics,
    query_phase_begun: bool,
}

impl ChannelState {
    fn new(prng: Prng) -> Self {
        Self {
            prng,
            annotations: Vec::new(),
            scope_stack: Vec::new(),
            annotations_enabled: true,
            expected_annotations: None,
            prover_to_verifier_bytes: 0,
            statistics: ChannelStatistics::default(),
            query_phase_begun: false,
        }
    }

    fn annotation_prefix(&self) -> String {
        let mut prefix = String::new();
        for scope in &self.scope_stack {
            prefix.push('/');
            prefix.push_str(scope);
        }
        prefix.push_str(": ");
        prefix
    }

    fn add_annotation(&mut self, annotation: String) -> Result<()> {
        debug_assert!(self.annotations_enabled);
        if let Some(expected) = &self.expected_annotations {
            let index = self.annotations.len();
            if index >= expected.len() {
                return Err(StarkError::InvalidProof(
                    "expected annotations list is too short".to_string(),
                ));
            }
            if expected[index] != annotation {
                return Err(StarkError::InvalidProof(format!(
                    "annotation mismatch. expected: '{}'. found: '{}'",
                    expected[index], annotation
                )));
            }
        }
        self.annotations.push(annotation);
        Ok(())
    }

    fn annotate_prover_to_verifier(&mut self, annotation: &str, n_bytes: usize) -> Result<()> {
        if !self.annotations_enabled {
            return Ok(());
        }
        let start = self.prover_to_verifier_bytes;
        self.prover_to_verifier_bytes += n_bytes;
        let end = self.prover_to_verifier_bytes;
        let prefix = self.annotation_prefix();
        self.add_annotation(format!("P->V[{start}:{end}]: {prefix}{annotation}\n"))
    }

    fn annotate_verifier_to_prover(&mut self, annotation: &str) -> Result<()> {
        if !self.annotations_enabled {
            return Ok(());
        }
        let prefix = self.annotation_prefix();
        self.add_annotation(format!("V->P: {prefix}{annotation}\n"))
    }

    /// Draws a uniform number in `[0, upper_bound)` from the hash chain by
    /// masking to the next power of two and rejecting overflows.
    fn draw_number(&mut self, upper_bound: u64) -> u64 {
        assert!(upper_bound > 0, "upper bound must be positive");
        let mask = upper_bound.next_power_of_two() - 1;
        loop {
            let mut bytes = [0u8; 8];
            self.prng.random_bytes(&mut bytes);
            let value = u64::from_be_bytes(bytes) & mask;
            if value < upper_bound {
                return value;
            }
        }
    }

    fn draw_field_element(&mut self) -> ExtensionFieldElement {
        ExtensionFieldElement::random(&mut self.prng)
    }
}

/// Behavior shared by [`ProverChannel`] and [`VerifierChannel`]: annotation
/// scopes and the Fiat-Shamir randomness both parties derive.
pub trait Channel {
    fn state(&mut self) -> &mut ChannelState;
    fn state_ref(&self) -> &ChannelState;

    /// Draws a number in `[0, upper_bound)` shared by both parties.
    fn random_number(&mut self, upper_bound: u64, annotation: &str) -> Result<u64>;

    /// Draws an extension field element shared by both parties.
    fn random_field_element(&mut self, annotation: &str) -> Result<ExtensionFieldElement>;

    /// Applies (prover) or checks (verifier) the proof-of-work gate.
    fn apply_proof_of_work(&mut self, work_bits: usize) -> Result<()>;

    fn enter_annotation_scope(&mut self, scope: impl Into<String>) {
        self.state().scope_stack.push(scope.into());
    }

    fn exit_annotation_scope(&mut self) {
        self.state().scope_stack.pop();
    }

    /// Runs `body` inside an annotation scope, restoring the scope on exit.
    fn scope<T>(&mut self, name: impl Into<String>, body: impl FnOnce(&mut Self) -> T) -> T
    where
        Self: Sized,
    {
        self.enter_annotation_scope(name);
        let result = body(self);
        self.exit_annotation_scope();
        result
    }

    /// After this point no party may derive fresh randomness.
    fn begin_query_phase(&mut self) {
        self.state().query_phase_begun = true;
    }

    fn annotations(&self) -> &[String] {
        &self.state_ref().annotations
    }

    fn disable_annotations(&mut self) {
        self.state().annotations_enabled = false;
    }

    fn statistics(&self) -> &ChannelStatistics {
        &self.state_ref().statistics
    }
}
