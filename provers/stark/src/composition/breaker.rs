use basalt_math::coset::Coset;
use basalt_math::fft::{fft_natural_to_bit_reversed, ifft_bit_reversed_to_natural};
use basalt_math::field::ExtensionFieldElement;
use basalt_math::helpers::pow2;
use basalt_math::polynomial::horner_eval;

use crate::errors::{ensure, Result};

/// Splits a polynomial `f` of degree below `2^log_breaks · N`, given by its
/// evaluation over a coset of that size, into `2^log_breaks` polynomials of
/// degree below `N` satisfying `f(x) = Σ_j x^j · h_j(x^k)`.
///
/// The `h_j` come out as evaluations over the folded coset (the k-th power
/// image, offset raised to the k-th power), in bit-reversed order like the
/// input. The split is exact: recombining samples with `eval_from_samples`
/// reproduces `f` with no scale factor.
pub struct PolynomialBreaker {
    coset: Coset,
    log_breaks: u32,
}

impl PolynomialBreaker {
    pub fn new(coset: Coset, log_breaks: u32) -> Result<Self> {
        ensure(pow2(log_breaks) <= coset.size(), || {
            "cannot break into more parts than the coset size".to_string()
        })?;
        Ok(Self { coset, log_breaks })
    }

    pub fn n_breaks(&self) -> u64 {
        pow2(self.log_breaks)
    }

    /// The coset over which the broken polynomials are evaluated.
    pub fn folded_coset(&self) -> Result<Coset> {
        Ok(self.coset.fold(self.log_breaks)?)
    }

    /// Takes the bit-reversed evaluation of `f` over the coset and returns
    /// the bit-reversed evaluations of `h_0, ..., h_{k-1}` over the folded
    /// coset.
    pub fn break_evaluation(
        &self,
        evaluation: &[ExtensionFieldElement],
    ) -> Result<Vec<Vec<ExtensionFieldElement>>> {
        ensure(evaluation.len() as u64 == self.coset.size(), || {
            "evaluation size must match the coset size".to_string()
        })?;
        let n_breaks = self.n_breaks() as usize;
        let folded = self.folded_coset()?;

        let mut coefficients = evaluation.to_vec();
        ifft_bit_reversed_to_natural(&mut coefficients, &self.coset)?;

        // h_j takes every k-th coefficient starting at j.
        let mut broken = Vec::with_capacity(n_breaks);
        for j in 0..n_breaks {
            let mut h_coefficients: Vec<ExtensionFieldElement> = coefficients
                .iter()
                .skip(j)
                .step_by(n_breaks)
                .copied()
                .collect();
            fft_natural_to_bit_reversed(&mut h_coefficients, &folded)?;
            broken.push(h_coefficients);
        }
        Ok(broken)
    }

    /// Recombines `{h_j(x^k)}` into `f(x)` by Horner evaluation in `x`.
    pub fn eval_from_samples(
        &self,
        samples: &[ExtensionFieldElement],
        point: &ExtensionFieldElement,
    ) -> ExtensionFieldElement {
        horner_eval(point, samples)
    }
}
