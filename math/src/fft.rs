//! Radix-2 FFT and IFFT on multiplicative cosets.
//!
//! The forward transform maps natural-order coefficients to bit-reversed
//! evaluations; the inverse maps bit-reversed evaluations back to
//! natural-order coefficients. The coset offset is folded into the
//! coefficients (`c_j ↦ c_j·offset^j`), so the butterflies only ever see
//! subgroup twiddles.

use crate::bit_reversal::bit_reverse_in_place;
use crate::coset::Coset;
use crate::errors::MathError;
use crate::field::element::FftField;
use crate::field::{BaseFieldElement, FieldElement};

fn scale_by_offset_powers<T: FftField>(values: &mut [T], offset: BaseFieldElement) {
    let mut power = BaseFieldElement::one();
    for value in values.iter_mut() {
        *value = *value * power;
        power *= offset;
    }
}

/// In-place Gentleman-Sande butterflies: natural-order input, bit-reversed
/// output. `generator` must generate the subgroup of order `values.len()`.
fn butterflies_natural_to_bit_reversed<T: FftField>(
    values: &mut [T],
    generator: BaseFieldElement,
) {
    let n = values.len();
    let mut half = n / 2;
    let mut twiddle_step = generator;
    while half >= 1 {
        for start in (0..n).step_by(2 * half) {
            let mut twiddle = BaseFieldElement::one();
            for i in start..start + half {
                let low = values[i];
                let high = values[i + half];
                values[i] = low + high;
                values[i + half] = (low - high) * twiddle;
                twiddle *= twiddle_step;
            }
        }
        half /= 2;
        twiddle_step *= twiddle_step;
    }
}

/// Evaluates the polynomial with the given natural-order coefficients over
/// the coset; the result is in bit-reversed order.
pub fn fft_natural_to_bit_reversed<T: FftField>(
    coefficients: &mut [T],
    coset: &Coset,
) -> Result<(), MathError> {
    if coefficients.len() as u64 != coset.size() {
        return Err(MathError::LengthMismatch {
            expected: coset.size() as usize,
            input: coefficients.len(),
        });
    }
    scale_by_offset_powers(coefficients, coset.offset());
    butterflies_natural_to_bit_reversed(coefficients, coset.generator());
    Ok(())
}

/// Interpolates bit-reversed-order evaluations over the coset; the result is
/// the natural-order coefficient vector of the unique interpolant of degree
/// smaller than the coset size.
pub fn ifft_bit_reversed_to_natural<T: FftField>(
    evaluations: &mut [T],
    coset: &Coset,
) -> Result<(), MathError> {
    if evaluations.len() as u64 != coset.size() {
        return Err(MathError::LengthMismatch {
            expected: coset.size() as usize,
            input: evaluations.len(),
        });
    }
    let n = evaluations.len() as u64;
    // n·c_j = sum_i v_i·g^(-ij): a forward transform with inverted twiddles.
    bit_reverse_in_place(evaluations);
    butterflies_natural_to_bit_reversed(evaluations, coset.generator().inverse()?);
    bit_reverse_in_place(evaluations);
    let n_inverse = BaseFieldElement::from_uint(n).inverse()?;
    for value in evaluations.iter_mut() {
        *value = *value * n_inverse;
    }
    scale_by_offset_powers(evaluations, coset.offset().inverse()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::coset::GroupOrdering;
    use crate::field::element::{random_element_vector, random_nonzero_element};
    use crate::field::{BaseFieldElement, ExtensionFieldElement};
    use crate::polynomial::horner_eval;

    #[test]
    fn forward_matches_horner() {
        let mut rng = StdRng::seed_from_u64(101);
        for log_size in 0..6 {
            let size = 1u64 << log_size;
            let coset = Coset::new(size, random_nonzero_element(&mut rng)).unwrap();
            let coefficients: Vec<BaseFieldElement> =
                random_element_vector(&mut rng, size as usize);

            let mut evaluations = coefficients.clone();
            fft_natural_to_bit_reversed(&mut evaluations, &coset).unwrap();

            for (i, x) in coset.elements(GroupOrdering::BitReversed).iter().enumerate() {
                assert_eq!(evaluations[i], horner_eval(x, &coefficients));
            }
        }
    }

    #[test]
    fn forward_then_inverse_is_identity() {
        let mut rng = StdRng::seed_from_u64(102);
        let coset = Coset::new(32, random_nonzero_element(&mut rng)).unwrap();
        let coefficients: Vec<ExtensionFieldElement> = random_element_vector(&mut rng, 32);

        let mut round_trip = coefficients.clone();
        fft_natural_to_bit_reversed(&mut round_trip, &coset).unwrap();
        ifft_bit_reversed_to_natural(&mut round_trip, &coset).unwrap();
        assert_eq!(round_trip, coefficients);
    }

    #[test]
    fn different_offsets_give_different_coefficients() {
        let mut rng = StdRng::seed_from_u64(103);
        let offset: BaseFieldElement = random_nonzero_element(&mut rng);
        let coset = Coset::new(16, offset).unwrap();
        let other_coset = Coset::new(16, offset * offset + BaseFieldElement::one()).unwrap();
        assert_ne!(coset.offset(), other_coset.offset());

        let evaluations: Vec<BaseFieldElement> = random_element_vector(&mut rng, 16);
        let mut on_coset = evaluations.clone();
        let mut on_other = evaluations;
        ifft_bit_reversed_to_natural(&mut on_coset, &coset).unwrap();
        ifft_bit_reversed_to_natural(&mut on_other, &other_coset).unwrap();
        assert_ne!(on_coset, on_other);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let coset = Coset::new(8, BaseFieldElement::one()).unwrap();
        let mut values = vec![BaseFieldElement::zero(); 4];
        assert!(fft_natural_to_bit_reversed(&mut values, &coset).is_err());
    }
}
