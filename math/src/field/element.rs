use core::fmt::{Debug, Display};
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use rand::RngCore;

use crate::errors::MathError;
use crate::field::BaseFieldElement;

/// Arithmetic interface shared by the base field and its cubic extension.
///
/// Byte encodings are big endian and use the standard (non-Montgomery)
/// representation, as the proof wire format requires.
pub trait FieldElement:
    Copy
    + Clone
    + Debug
    + Display
    + PartialEq
    + Eq
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
{
    const SIZE_IN_BYTES: usize;

    fn zero() -> Self;
    fn one() -> Self;

    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Multiplicative inverse. Fails on zero.
    fn inverse(&self) -> Result<Self, MathError>;

    fn pow(&self, exponent: u64) -> Self {
        let mut result = Self::one();
        let mut base = *self;
        let mut exponent = exponent;
        while exponent != 0 {
            if exponent & 1 == 1 {
                result *= base;
            }
            base = base * base;
            exponent >>= 1;
        }
        result
    }

    fn div(&self, rhs: &Self) -> Result<Self, MathError> {
        if rhs.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        Ok(*self * rhs.inverse()?)
    }

    /// Writes the canonical big-endian encoding into `out`.
    /// Panics unless `out.len() == SIZE_IN_BYTES`.
    fn to_bytes(&self, out: &mut [u8]);

    fn to_bytes_vec(&self) -> Vec<u8> {
        let mut out = vec![0u8; Self::SIZE_IN_BYTES];
        self.to_bytes(&mut out);
        out
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MathError>;

    /// Samples a uniform element from the given randomness source.
    fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self;
}

/// Returns a uniformly random nonzero element.
pub fn random_nonzero_element<F: FieldElement, R: RngCore + ?Sized>(rng: &mut R) -> F {
    loop {
        let candidate = F::random(rng);
        if !candidate.is_zero() {
            return candidate;
        }
    }
}

/// Returns a vector of random elements.
pub fn random_element_vector<F: FieldElement, R: RngCore + ?Sized>(
    rng: &mut R,
    n_elements: usize,
) -> Vec<F> {
    (0..n_elements).map(|_| F::random(rng)).collect()
}

/// Marker bound for element types the coset FFT machinery accepts: the
/// twiddle factors live in the base field while the data may be extension
/// field elements.
pub trait FftField:
    FieldElement + Mul<BaseFieldElement, Output = Self> + From<BaseFieldElement>
{
}

impl<T> FftField for T where
    T: FieldElement + Mul<BaseFieldElement, Output = Self> + From<BaseFieldElement>
{
}
