use basalt_math::coset::Coset;
use basalt_math::fft::ifft_bit_reversed_to_natural;
use basalt_math::field::element::FftField;
use basalt_math::field::{BaseFieldElement, FieldElement};
use basalt_math::helpers::{is_power_of_two, safe_div};
use basalt_math::polynomial::horner_eval;

use crate::errors::{ensure, Result};

/// A virtual column whose trace-domain evaluation is the cyclic repetition
/// of a short list of values (spaced out by the slackness factor on a
/// zero-knowledge trace). Realized as the low-degree polynomial
/// `P(x^n_copies)` where `P` interpolates the values over the subgroup of
/// their count.
#[derive(Clone, Debug)]
pub struct PeriodicColumn {
    coefficients: Vec<BaseFieldElement>,
    n_copies: u64,
}

impl PeriodicColumn {
    pub fn new(
        values: &[BaseFieldElement],
        trace_length: u64,
        slackness_factor: u64,
    ) -> Result<Self> {
        let period = values.len() as u64;
        ensure(is_power_of_two(period), || {
            "the number of periodic values must be a power of two".to_string()
        })?;
        ensure(
            trace_length % (period * slackness_factor) == 0,
            || "the period must divide the trace length".to_string(),
        )?;
        let n_copies = safe_div(trace_length, period * slackness_factor);

        // Interpolate over the order-`period` subgroup. The values are given
        // in natural order.
        let subgroup = Coset::new(period, BaseFieldElement::one())?;
        let mut coefficients = basalt_math::bit_reversal::bit_reverse_vector(values);
        ifft_bit_reversed_to_natural(&mut coefficients, &subgroup)?;
        Ok(Self {
            coefficients,
            n_copies,
        })
    }

    /// The column's interpolant evaluated at an arbitrary point.
    pub fn eval_at_point<E>(&self, point: &E) -> E
    where
        E: FftField,
    {
        horner_eval(&point.pow(self.n_copies), &self.coefficients)
    }

    /// The column's values over a full coset (natural order), exploiting
    /// the fact that they cycle with period `coset_size / n_copies`.
    pub fn eval_on_coset(
        &self,
        coset_offset: &BaseFieldElement,
        coset_generator: &BaseFieldElement,
        coset_size: u64,
    ) -> Result<Vec<BaseFieldElement>> {
        ensure(coset_size % self.n_copies == 0, || {
            "coset size must be a multiple of the number of copies".to_string()
        })?;
        let cycle_length = coset_size / self.n_copies;
        let mut point = coset_offset.pow(self.n_copies);
        let step = coset_generator.pow(self.n_copies);
        let mut cycle = Vec::with_capacity(cycle_length as usize);
        for _ in 0..cycle_length {
            cycle.push(horner_eval(&point, &self.coefficients));
            point *= step;
        }
        Ok((0..coset_size)
            .map(|i| cycle[(i % cycle_length) as usize])
            .collect())
    }
}
