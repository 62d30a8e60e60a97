use basalt_math::field::element::random_element_vector;
use basalt_math::field::{BaseFieldElement, ExtensionFieldElement, FieldElement};
use rand::RngCore;

use crate::errors::{ensure, Result};

/// An execution trace: an ordered sequence of equally-long columns. Also
/// used for the composition trace, whose columns live in the extension
/// field.
#[derive(Clone, Debug)]
pub struct TraceBase<F> {
    columns: Vec<Vec<F>>,
}

pub type Trace = TraceBase<BaseFieldElement>;
pub type CompositionTrace = TraceBase<ExtensionFieldElement>;

impl<F: FieldElement> TraceBase<F> {
    pub fn new(columns: Vec<Vec<F>>) -> Result<Self> {
        ensure(!columns.is_empty(), || "trace cannot be empty".to_string())?;
        let length = columns[0].len();
        for column in &columns {
            ensure(column.len() == length, || {
                "all trace columns must be of the same length".to_string()
            })?;
        }
        Ok(Self { columns })
    }

    pub fn length(&self) -> usize {
        self.columns[0].len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> &[F] {
        &self.columns[index]
    }

    pub fn into_columns(self) -> Vec<Vec<F>> {
        self.columns
    }

    /// Overwrites one cell. Intended for corruption tests only.
    pub fn set_cell_for_testing(&mut self, column: usize, index: usize, value: F) {
        self.columns[column][index] = value;
    }

    pub fn cell(&self, column: usize, index: usize) -> F {
        self.columns[column][index]
    }

    /// Spaces the trace with fresh random values, making each column
    /// `slackness_factor` times longer: `[v0, r, ..., v1, r, ...]`.
    pub fn add_zero_knowledge_slackness<R: RngCore + ?Sized>(
        &mut self,
        slackness_factor: usize,
        rng: &mut R,
    ) {
        assert!(slackness_factor >= 1, "slackness factor must be positive");
        for column in &mut self.columns {
            let mut replacement = Vec::with_capacity(column.len() * slackness_factor);
            for value in column.iter() {
                replacement.push(*value);
                for _ in 0..slackness_factor - 1 {
                    replacement.push(F::random(rng));
                }
            }
            *column = replacement;
        }
    }

    /// Appends one fully-random column.
    pub fn add_zero_knowledge_extra_column<R: RngCore + ?Sized>(&mut self, rng: &mut R) {
        let length = self.length();
        self.columns.push(random_element_vector(rng, length));
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn ragged_columns_are_rejected() {
        let columns = vec![
            vec![BaseFieldElement::one(); 4],
            vec![BaseFieldElement::one(); 3],
        ];
        assert!(Trace::new(columns).is_err());
        assert!(Trace::new(Vec::new()).is_err());
    }

    #[test]
    fn slackness_interleaves_originals() {
        let mut rng = StdRng::seed_from_u64(121);
        let original: Vec<BaseFieldElement> =
            (0..4).map(|i| BaseFieldElement::from_uint(i)).collect();
        let mut trace = Trace::new(vec![original.clone()]).unwrap();
        trace.add_zero_knowledge_slackness(4, &mut rng);
        assert_eq!(trace.length(), 16);
        for (i, value) in original.iter().enumerate() {
            assert_eq!(trace.cell(0, 4 * i), *value);
        }
    }

    #[test]
    fn extra_column_keeps_lengths_equal() {
        let mut rng = StdRng::seed_from_u64(122);
        let mut trace = Trace::new(vec![vec![BaseFieldElement::one(); 8]]).unwrap();
        trace.add_zero_knowledge_extra_column(&mut rng);
        assert_eq!(trace.width(), 2);
        assert_eq!(trace.length(), 8);
    }
}
