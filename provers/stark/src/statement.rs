use basalt_crypto::fiat_shamir::Prng;

use crate::air::{Air, Trace};
use crate::errors::Result;

/// The narrow interface through which the engine consumes an application
/// claim (public/private input marshalling lives with the application).
pub trait Statement {
    /// Builds (or returns the cached) AIR for this statement. The AIR
    /// accounts for zero-knowledge slackness when requested.
    fn build_air(&mut self, is_zero_knowledge: bool, n_queries: usize) -> Result<&dyn Air>;

    /// The channel seed derived from the public input, binding the
    /// transcript to the instance.
    fn initial_hash_chain_seed(&self) -> Vec<u8>;

    /// The seed for the zero-knowledge salts and padding randomness.
    /// Implementations typically mix fresh entropy over the public seed.
    fn zero_knowledge_hash_chain_seed(&self) -> Vec<u8>;

    /// Generates the witness trace.
    fn get_trace(&self, prng: &mut Prng) -> Result<Trace>;

    /// Normalizes and returns the public input document.
    fn fix_public_input(&mut self) -> Result<serde_json::Value>;

    fn name(&self) -> String;
}
