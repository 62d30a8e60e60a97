use core::fmt;
use core::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use rand::RngCore;

use crate::errors::MathError;
use crate::field::base::BaseFieldElement;
use crate::field::element::FieldElement;

/// An element of the cubic extension `F[X]/(X^3 + 2X - 1)` of the base
/// field `F`, represented as `coef0 + coef1·φ + coef2·φ²` where φ is a root
/// of the modulus polynomial (so `φ³ = 1 − 2φ`).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionFieldElement {
    coef0: BaseFieldElement,
    coef1: BaseFieldElement,
    coef2: BaseFieldElement,
}

// The matrix of the Frobenius endomorphism x -> x^p in the basis (1, φ, φ²).
const FROBENIUS_PHI_0: u64 = 318233216319004744;
const FROBENIUS_PHI2_0: u64 = 2067168182873786313;
const FROBENIUS_PHI_1: u64 = 179006184179440168;
const FROBENIUS_PHI2_1: u64 = 159116608159502372;
const FROBENIUS_PHI_2: u64 = 238674912239253558;
const FROBENIUS_PHI2_2: u64 = 2126836910933599704;

impl ExtensionFieldElement {
    pub const fn new(
        coef0: BaseFieldElement,
        coef1: BaseFieldElement,
        coef2: BaseFieldElement,
    ) -> Self {
        Self {
            coef0,
            coef1,
            coef2,
        }
    }

    pub const fn from_uint(val: u64) -> Self {
        Self {
            coef0: BaseFieldElement::from_uint(val),
            coef1: BaseFieldElement::from_uint(0),
            coef2: BaseFieldElement::from_uint(0),
        }
    }

    pub fn coefficients(&self) -> [BaseFieldElement; 3] {
        [self.coef0, self.coef1, self.coef2]
    }

    pub fn is_in_base_field(&self) -> bool {
        self.coef1.is_zero() && self.coef2.is_zero()
    }

    /// The Frobenius endomorphism `x -> x^p`, applied as a linear map with
    /// precomputed matrix entries.
    pub fn frobenius(&self) -> Self {
        Self {
            coef0: self.coef0
                + BaseFieldElement::from_uint(FROBENIUS_PHI_0) * self.coef1
                + BaseFieldElement::from_uint(FROBENIUS_PHI2_0) * self.coef2,
            coef1: BaseFieldElement::from_uint(FROBENIUS_PHI_1) * self.coef1
                + BaseFieldElement::from_uint(FROBENIUS_PHI2_1) * self.coef2,
            coef2: BaseFieldElement::from_uint(FROBENIUS_PHI_2) * self.coef1
                + BaseFieldElement::from_uint(FROBENIUS_PHI2_2) * self.coef2,
        }
    }
}

impl From<BaseFieldElement> for ExtensionFieldElement {
    fn from(coef0: BaseFieldElement) -> Self {
        Self {
            coef0,
            coef1: BaseFieldElement::zero(),
            coef2: BaseFieldElement::zero(),
        }
    }
}

impl FieldElement for ExtensionFieldElement {
    const SIZE_IN_BYTES: usize = 3 * BaseFieldElement::SIZE_IN_BYTES;

    fn zero() -> Self {
        Self::from(BaseFieldElement::zero())
    }

    fn one() -> Self {
        Self::from(BaseFieldElement::one())
    }

    fn inverse(&self) -> Result<Self, MathError> {
        // x^-1 = (x^p · x^p²) / Norm(x), where the norm x · x^p · x^p²
        // lies in the base field.
        if self.is_zero() {
            return Err(MathError::InverseOfZero);
        }
        let conjugate_product = self.frobenius() * self.frobenius().frobenius();
        let norm = *self * conjugate_product;
        debug_assert!(norm.is_in_base_field(), "norm must be in the base field");
        Ok(conjugate_product * norm.coef0.inverse()?)
    }

    fn to_bytes(&self, out: &mut [u8]) {
        assert_eq!(out.len(), Self::SIZE_IN_BYTES, "destination size mismatch");
        let size = BaseFieldElement::SIZE_IN_BYTES;
        self.coef0.to_bytes(&mut out[..size]);
        self.coef1.to_bytes(&mut out[size..2 * size]);
        self.coef2.to_bytes(&mut out[2 * size..]);
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, MathError> {
        if bytes.len() != Self::SIZE_IN_BYTES {
            return Err(MathError::InvalidByteLength {
                expected: Self::SIZE_IN_BYTES,
                got: bytes.len(),
            });
        }
        let size = BaseFieldElement::SIZE_IN_BYTES;
        Ok(Self {
            coef0: BaseFieldElement::from_bytes(&bytes[..size])?,
            coef1: BaseFieldElement::from_bytes(&bytes[size..2 * size])?,
            coef2: BaseFieldElement::from_bytes(&bytes[2 * size..])?,
        })
    }

    fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        Self {
            coef0: BaseFieldElement::random(rng),
            coef1: BaseFieldElement::random(rng),
            coef2: BaseFieldElement::random(rng),
        }
    }
}

impl Add for ExtensionFieldElement {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            coef0: self.coef0 + rhs.coef0,
            coef1: self.coef1 + rhs.coef1,
            coef2: self.coef2 + rhs.coef2,
        }
    }
}

impl Add<BaseFieldElement> for ExtensionFieldElement {
    type Output = Self;

    fn add(self, rhs: BaseFieldElement) -> Self {
        Self {
            coef0: self.coef0 + rhs,
            ..self
        }
    }
}

impl Sub for ExtensionFieldElement {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            coef0: self.coef0 - rhs.coef0,
            coef1: self.coef1 - rhs.coef1,
            coef2: self.coef2 - rhs.coef2,
        }
    }
}

impl Sub<BaseFieldElement> for ExtensionFieldElement {
    type Output = Self;

    fn sub(self, rhs: BaseFieldElement) -> Self {
        Self {
            coef0: self.coef0 - rhs,
            ..self
        }
    }
}

impl Neg for ExtensionFieldElement {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            coef0: -self.coef0,
            coef1: -self.coef1,
            coef2: -self.coef2,
        }
    }
}

impl Mul for ExtensionFieldElement {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        // Schoolbook multiplication followed by reduction with
        // φ³ = 1 − 2φ and φ⁴ = φ − 2φ².
        let t0 = self.coef0 * rhs.coef0;
        let t1 = self.coef0 * rhs.coef1 + self.coef1 * rhs.coef0;
        let t2 = self.coef0 * rhs.coef2 + self.coef1 * rhs.coef1 + self.coef2 * rhs.coef0;
        let t3 = self.coef1 * rhs.coef2 + self.coef2 * rhs.coef1;
        let t4 = self.coef2 * rhs.coef2;
        let two = BaseFieldElement::from_uint(2);
        Self {
            coef0: t0 + t3,
            coef1: t1 - two * t3 + t4,
            coef2: t2 - two * t4,
        }
    }
}

impl Mul<BaseFieldElement> for ExtensionFieldElement {
    type Output = Self;

    fn mul(self, rhs: BaseFieldElement) -> Self {
        Self {
            coef0: self.coef0 * rhs,
            coef1: self.coef1 * rhs,
            coef2: self.coef2 * rhs,
        }
    }
}

impl AddAssign for ExtensionFieldElement {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for ExtensionFieldElement {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign for ExtensionFieldElement {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl fmt::Debug for ExtensionFieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.coef0, self.coef1, self.coef2)
    }
}

impl fmt::Display for ExtensionFieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.coef0, self.coef1, self.coef2)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::field::base::MODULUS;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0xe47)
    }

    #[test]
    fn phi_satisfies_modulus_polynomial() {
        // φ³ + 2φ − 1 = 0.
        let phi = ExtensionFieldElement::new(
            BaseFieldElement::zero(),
            BaseFieldElement::one(),
            BaseFieldElement::zero(),
        );
        let result =
            phi.pow(3) + phi * BaseFieldElement::from_uint(2) - ExtensionFieldElement::one();
        assert!(result.is_zero());
    }

    #[test]
    fn mixed_arithmetic_agrees_with_lifting() {
        let mut rng = rng();
        for _ in 0..50 {
            let x = ExtensionFieldElement::random(&mut rng);
            let b = BaseFieldElement::random(&mut rng);
            let lifted = ExtensionFieldElement::from(b);
            assert_eq!(x + b, x + lifted);
            assert_eq!(x - b, x - lifted);
            assert_eq!(x * b, x * lifted);
        }
    }

    #[test]
    fn frobenius_is_pth_power_and_has_order_three() {
        let mut rng = rng();
        for _ in 0..10 {
            let x = ExtensionFieldElement::random(&mut rng);
            assert_eq!(x.frobenius(), x.pow(MODULUS));
            assert_eq!(x.frobenius().frobenius().frobenius(), x);
        }
    }

    #[test]
    fn frobenius_fixes_base_field() {
        let mut rng = rng();
        let b = ExtensionFieldElement::from(BaseFieldElement::random(&mut rng));
        assert_eq!(b.frobenius(), b);
    }

    #[test]
    fn byte_round_trip() {
        let mut rng = rng();
        for _ in 0..20 {
            let x = ExtensionFieldElement::random(&mut rng);
            let bytes = x.to_bytes_vec();
            assert_eq!(bytes.len(), 24);
            assert_eq!(ExtensionFieldElement::from_bytes(&bytes).unwrap(), x);
        }
    }

    #[test]
    fn base_field_membership() {
        let mut rng = rng();
        let b = ExtensionFieldElement::from(BaseFieldElement::random(&mut rng));
        assert!(b.is_in_base_field());
        let phi = ExtensionFieldElement::new(
            BaseFieldElement::zero(),
            BaseFieldElement::one(),
            BaseFieldElement::zero(),
        );
        assert!(!phi.is_in_base_field());
    }

    prop_compose! {
        fn arb_ext()(c0 in 0..MODULUS, c1 in 0..MODULUS, c2 in 0..MODULUS) -> ExtensionFieldElement {
            ExtensionFieldElement::new(
                BaseFieldElement::from_uint(c0),
                BaseFieldElement::from_uint(c1),
                BaseFieldElement::from_uint(c2),
            )
        }
    }

    proptest! {
        #[test]
        fn field_axioms(a in arb_ext(), b in arb_ext(), c in arb_ext()) {
            prop_assert_eq!((a + b) + c, a + (b + c));
            prop_assert_eq!(a * b, b * a);
            prop_assert_eq!((a * b) * c, a * (b * c));
            prop_assert_eq!(a * (b + c), a * b + a * c);
            prop_assert_eq!(a + (-a), ExtensionFieldElement::zero());
        }

        #[test]
        fn multiplicative_inverse(a in arb_ext()) {
            if !a.is_zero() {
                prop_assert_eq!(a * a.inverse().unwrap(), ExtensionFieldElement::one());
            }
        }
    }

    #[test]
    fn one_is_not_zero() {
        assert_ne!(
            ExtensionFieldElement::one(),
            ExtensionFieldElement::zero()
        );
    }
}
