use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("inverse of zero")]
    InverseOfZero,
    #[error("division by zero")]
    DivisionByZero,
    #[error("byte slice of length {got} cannot encode a field element of {expected} bytes")]
    InvalidByteLength { expected: usize, got: usize },
    #[error("value is not a canonical field element")]
    NonCanonicalRepresentation,
    #[error("{0} is not a power of two")]
    NotPowerOfTwo(u64),
    #[error("the multiplicative group has no subgroup of order {0}")]
    UnsupportedSubgroupOrder(u64),
    #[error("coset offset cannot be zero")]
    ZeroCosetOffset,
    #[error("input length {input} does not match expected length {expected}")]
    LengthMismatch { expected: usize, input: usize },
}
