//! The FRI low degree test: a layered folding protocol with per-layer step
//! sizes, last-layer polynomial transmission, and proof-of-work-gated
//! queries.

pub mod details;
pub mod folder;
pub mod layer;
pub mod parameters;
pub mod prover;
pub mod verifier;

pub use parameters::FriParameters;
pub use prover::prove_fri;
pub use verifier::verify_fri;
