use basalt_crypto::errors::CryptoError;
use basalt_math::errors::MathError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StarkError {
    /// A caller-side contract was broken (sizes, ranges, ordering). On the
    /// prover these are fatal; the verifier maps violations caused by
    /// untrusted proof bytes to `InvalidProof` instead.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("invalid proof: {0}")]
    InvalidProof(String),
    #[error("proof too short")]
    TranscriptExhausted,
    #[error("bad configuration: {0}")]
    BadConfig(String),
    #[error(transparent)]
    Arithmetic(#[from] MathError),
}

impl From<CryptoError> for StarkError {
    fn from(error: CryptoError) -> Self {
        StarkError::InvariantViolation(error.to_string())
    }
}

pub type Result<T> = core::result::Result<T, StarkError>;

/// Shorthand for raising an `InvariantViolation` unless `condition` holds.
pub fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(StarkError::InvariantViolation(message()))
    }
}

/// The verifier-side counterpart of [`ensure`]: violations on untrusted
/// data are proof failures.
pub fn ensure_proof(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(StarkError::InvalidProof(message()))
    }
}
