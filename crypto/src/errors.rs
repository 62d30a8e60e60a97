use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("data length {0} is not a power of 2")]
    DataLengthNotPowerOfTwo(u64),
    #[error("segment exceeds the data length declared at tree construction")]
    SegmentOutOfRange,
    #[error("depth should not exceed the tree's height")]
    DepthOutOfRange,
    #[error("empty input queries")]
    EmptyQueries,
    #[error("query out of range")]
    QueryOutOfRange,
    #[error("byte slice of length {0} is not a digest")]
    InvalidDigestLength(usize),
}
