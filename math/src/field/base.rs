use core::fmt;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use rand::RngCore;

use crate::errors::MathError;
use crate::field::element::FieldElement;
use crate::helpers::pow2;

/// An element of the prime field of order `2^61 + 20·2^32 + 1`.
///
/// Elements fit in one 64-bit word and are stored in Montgomery
/// representation for fast modular multiplication. See
/// <https://en.wikipedia.org/wiki/Montgomery_modular_multiplication>.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct BaseFieldElement {
    value: u64,
}

pub const MODULUS: u64 = 0x2000001400000001; // 2^61 + 20 * 2^32 + 1.
pub const MODULUS_BITS: u32 = 61;
const MONTGOMERY_R: u64 = 0x1fffff73fffffff9; // 2^64 % MODULUS.
const MONTGOMERY_R_SQUARED: u64 = 0x1fc18a13fffce041; // R^2 % MODULUS.
const MONTGOMERY_M_PRIME: u64 = 0x20000013ffffffff; // (-MODULUS^-1) % 2^64.

/// The prime factorization of `MODULUS - 1 = 2^34 · 13 · 167 · 211 · 293`.
pub const MULTIPLICATIVE_GROUP_PRIME_FACTORS: [u64; 5] = [2, 13, 167, 211, 293];

/// log2 of the largest power-of-two subgroup of the multiplicative group.
pub const TWO_ADICITY: u32 = 34;

#[inline]
const fn is_negative(val: u64) -> bool {
    (val as i64) < 0
}

/// Brings a sum below 2·MODULUS back into [0, MODULUS).
#[inline]
const fn reduce_if_needed(val: u64) -> u64 {
    let alt_val = val.wrapping_sub(MODULUS);
    if is_negative(alt_val) {
        val
    } else {
        alt_val
    }
}

/// Computes (x·y / 2^64) mod MODULUS (CIOS Montgomery reduction).
#[inline]
const fn montgomery_mul(x: u64, y: u64) -> u64 {
    let mul_res = (x as u128) * (y as u128);
    let u = (mul_res as u64).wrapping_mul(MONTGOMERY_M_PRIME);
    let res = (MODULUS as u128) * (u as u128) + mul_res;
    debug_assert!(res as u64 == 0, "low 64 bits should be 0");
    reduce_if_needed((res >> 64) as u64)
}

impl BaseFieldElement {
    pub const fn from_uint(val: u64) -> Self {
        // MontgomeryMul divides by R, so multiply by R^2 here.
        Self {
            value: montgomery_mul(val, MONTGOMERY_R_SQUARED),
        }
    }

    /// Returns a generator of the multiplicative group of the field.
    pub const fn generator() -> Self {
        Self::from_uint(3)
    }

    /// Returns the canonical generator of the subgroup of the given order.
    /// The order must divide `MODULUS - 1`; in particular any power of two
    /// up to `2^TWO_ADICITY` is accepted.
    pub fn subgroup_generator(order: u64) -> Result<Self, MathError> {
        if order == 0 || (MODULUS - 1) % order != 0 {
            return Err(MathError::UnsupportedSubgroupOrder(order));
        }
        Ok(Self::generator().pow((MODULUS - 1) / order))
    }

    pub fn to_standard_form(&self) -> u64 {
        montgomery_mul(self.value, 1)
    }
}

impl FieldElement for BaseFieldElement {
    const SIZE_IN_BYTES: usize = 8;

    fn zero() -> Self {
        Self { value: 0 }
    }

    fn one() -> Self {
        Self {
            value: MONTGOMERY_R,
        }
    }

    fn inverse(&self) -> Result<Self, MathError> {
        if self.is_zero() {
            return Err(MathError::InverseOfZero);
        }
        Ok(self.pow(MODULUS - 2))
    }

    fn to_bytes(&self, out: &mut [u8]) {
        assert_eq!(out.len(), Self::SIZE_IN_BYTES, "destination size mismatch");
        out.copy_from_slice(&self.to_standard_form().to_be_bytes());
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MathError> {
        if bytes.len() != Self::SIZE_IN_BYTES {
            return Err(MathError::InvalidByteLength {
                expected: Self::SIZE_IN_BYTES,
                got: bytes.len(),
            });
        }
        let val = u64::from_be_bytes(bytes.try_into().unwrap());
        if val >= MODULUS {
            return Err(MathError::NonCanonicalRepresentation);
        }
        Ok(Self::from_uint(val))
    }

    fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        // Uniform distribution is preserved under the Montgomery map, so the
        // rejection-sampled value is stored directly as the representation.
        let relevant_bits = pow2(MODULUS_BITS + 1) - 1;
        let mut bytes = [0u8; 8];
        loop {
            rng.fill_bytes(&mut bytes);
            let value = u64::from_be_bytes(bytes) & relevant_bits;
            if value < MODULUS {
                return Self { value };
            }
        }
    }
}

impl Add for BaseFieldElement {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            value: reduce_if_needed(self.value + rhs.value),
        }
    }
}

impl Sub for BaseFieldElement {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let val = self.value.wrapping_sub(rhs.value);
        Self {
            value: if is_negative(val) {
                val.wrapping_add(MODULUS)
            } else {
                val
            },
        }
    }
}

impl Neg for BaseFieldElement {
    type Output = Self;

    fn neg(self) -> Self {
        Self::zero() - self
    }
}

impl Mul for BaseFieldElement {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            value: montgomery_mul(self.value, rhs.value),
        }
    }
}

impl AddAssign for BaseFieldElement {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for BaseFieldElement {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for BaseFieldElement {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl fmt::Debug for BaseFieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.to_standard_form())
    }
}

impl fmt::Display for BaseFieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.to_standard_form())
    }
}
