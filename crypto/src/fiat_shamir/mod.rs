pub mod hash_chain;
pub mod prng;

pub use hash_chain::HashChain;
pub use prng::Prng;
