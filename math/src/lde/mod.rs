//! Low degree extension of column evaluations via coset FFTs.

pub mod cached;

pub use cached::CachedLdeManager;

use crate::bit_reversal::{bit_reverse_in_place, bit_reverse_vector};
use crate::coset::Coset;
use crate::errors::MathError;
use crate::fft::{fft_natural_to_bit_reversed, ifft_bit_reversed_to_natural};
use crate::field::element::FftField;
use crate::field::{BaseFieldElement, FieldElement};
use crate::polynomial::{horner_eval, polynomial_degree};

/// Manages the interpolation polynomials of several columns over a common
/// source coset (the trace domain) and evaluates them on shifted cosets.
///
/// The `eval_in_natural_order` flag fixes the enumeration order of every
/// evaluation the manager consumes or produces; the coefficient order is
/// always the opposite one (natural evaluations come with bit-reversed
/// coefficients and vice versa).
pub struct LdeManager<T> {
    coset: Coset,
    eval_in_natural_order: bool,
    /// Interpolation coefficients, stored in the manager's coefficient order.
    coefficients: Vec<Vec<T>>,
}

impl<T: FftField> LdeManager<T> {
    pub fn new(coset: Coset, eval_in_natural_order: bool) -> Self {
        Self {
            coset,
            eval_in_natural_order,
            coefficients: Vec::new(),
        }
    }

    pub fn domain_size(&self) -> u64 {
        self.coset.size()
    }

    pub fn n_columns(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_eval_naturally_ordered(&self) -> bool {
        self.eval_in_natural_order
    }

    /// Adds a column given as its evaluation over the source coset.
    pub fn add_evaluation(&mut self, evaluation: Vec<T>) -> Result<(), MathError> {
        if evaluation.len() as u64 != self.coset.size() {
            return Err(MathError::LengthMismatch {
                expected: self.coset.size() as usize,
                input: evaluation.len(),
            });
        }
        let mut work = evaluation;
        if self.eval_in_natural_order {
            bit_reverse_in_place(&mut work);
        }
        ifft_bit_reversed_to_natural(&mut work, &self.coset)?;
        if self.eval_in_natural_order {
            // Natural-order evaluations pair with bit-reversed coefficients.
            bit_reverse_in_place(&mut work);
        }
        self.coefficients.push(work);
        Ok(())
    }

    /// Adds a column directly from coefficients (in the manager's
    /// coefficient order), bypassing the interpolation IFFT.
    pub fn add_from_coefficients(&mut self, coefficients: &[T]) -> Result<(), MathError> {
        if coefficients.len() as u64 != self.coset.size() {
            return Err(MathError::LengthMismatch {
                expected: self.coset.size() as usize,
                input: coefficients.len(),
            });
        }
        self.coefficients.push(coefficients.to_vec());
        Ok(())
    }

    /// The stored coefficients of a column, in the manager's coefficient
    /// order.
    pub fn coefficients(&self, column_index: usize) -> &[T] {
        &self.coefficients[column_index]
    }

    fn natural_order_coefficients(&self, column_index: usize) -> Vec<T> {
        let stored = &self.coefficients[column_index];
        if self.eval_in_natural_order {
            bit_reverse_vector(stored)
        } else {
            stored.clone()
        }
    }

    /// Evaluates one column on the coset shifted to `offset`; the output
    /// order is the manager's evaluation order.
    pub fn eval_column_on_coset(
        &self,
        column_index: usize,
        offset: &BaseFieldElement,
    ) -> Result<Vec<T>, MathError> {
        let destination =
            Coset::with_generator(self.coset.size(), self.coset.generator(), *offset)?;
        let mut values = self.natural_order_coefficients(column_index);
        fft_natural_to_bit_reversed(&mut values, &destination)?;
        if self.eval_in_natural_order {
            bit_reverse_in_place(&mut values);
        }
        Ok(values)
    }

    /// Evaluates every column on the coset shifted to `offset`.
    pub fn eval_on_coset(&self, offset: &BaseFieldElement) -> Result<Vec<Vec<T>>, MathError> {
        (0..self.n_columns())
            .map(|column| self.eval_column_on_coset(column, offset))
            .collect()
    }

    /// Evaluates one column at arbitrary points, possibly in the extension
    /// field.
    pub fn eval_at_points<E>(
        &self,
        column_index: usize,
        points: &[E],
        outputs: &mut [E],
    ) -> Result<(), MathError>
    where
        E: FieldElement + From<T>,
    {
        if points.len() != outputs.len() {
            return Err(MathError::LengthMismatch {
                expected: points.len(),
                input: outputs.len(),
            });
        }
        let coefficients = self.natural_order_coefficients(column_index);
        for (point, output) in points.iter().zip(outputs.iter_mut()) {
            *output = horner_eval(point, &coefficients);
        }
        Ok(())
    }

    /// The degree of a column's interpolation polynomial, or -1 for the
    /// zero polynomial.
    pub fn evaluation_degree(&self, column_index: usize) -> i64 {
        polynomial_degree(&self.natural_order_coefficients(column_index))
    }
}
