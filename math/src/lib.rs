pub mod bit_reversal;
pub mod coset;
pub mod domain;
pub mod errors;
pub mod fft;
pub mod field;
pub mod helpers;
pub mod lde;
pub mod parallel;
pub mod polynomial;
