//! Coefficient-form polynomial evaluation helpers.

use crate::field::FieldElement;

/// Evaluates `sum coefficients[i]·point^i` by Horner's rule. The
/// coefficients may live in a subfield of the evaluation point's field.
pub fn horner_eval<T, E>(point: &E, coefficients: &[T]) -> E
where
    T: FieldElement,
    E: FieldElement + From<T>,
{
    let mut result = E::zero();
    for coefficient in coefficients.iter().rev() {
        result = result * *point + E::from(*coefficient);
    }
    result
}

/// Returns `base^e` for every exponent in `exponents`.
pub fn batch_pow<F: FieldElement>(base: &F, exponents: &[u64]) -> Vec<F> {
    exponents.iter().map(|e| base.pow(*e)).collect()
}

/// The degree of the polynomial with the given natural-order coefficients,
/// or -1 for the zero polynomial.
pub fn polynomial_degree<F: FieldElement>(coefficients: &[F]) -> i64 {
    for (i, coefficient) in coefficients.iter().enumerate().rev() {
        if !coefficient.is_zero() {
            return i as i64;
        }
    }
    -1
}
