use basalt_math::bit_reversal::bit_reverse;
use basalt_math::field::{BaseFieldElement, ExtensionFieldElement, FieldElement};
use basalt_math::helpers::safe_log2;
use basalt_math::parallel::parallel_for_chunks;
use basalt_math::polynomial::batch_pow;

use crate::air::{Air, MaskEntry};
use crate::composition::PeriodicColumn;
use crate::errors::{ensure, Result, StarkError};

/// The random linear combination of an AIR's constraints, evaluable at a
/// single (possibly out-of-domain) point or over a whole coset.
///
/// Borrows the AIR for the duration of the proof; the verifier-chosen
/// coefficients, the degree-adjustment exponents and the generator shifts
/// are fixed at construction.
pub struct CompositionPolynomial<'a> {
    air: &'a dyn Air,
    trace_generator: BaseFieldElement,
    coset_size: u64,
    periodic_columns: Vec<PeriodicColumn>,
    coefficients: Vec<ExtensionFieldElement>,
    point_exponents: Vec<u64>,
    shifts: Vec<BaseFieldElement>,
}

impl<'a> CompositionPolynomial<'a> {
    pub fn new(
        air: &'a dyn Air,
        trace_generator: &BaseFieldElement,
        coset_size: u64,
        periodic_columns: Vec<PeriodicColumn>,
        random_coefficients: &[ExtensionFieldElement],
        point_exponents: Vec<u64>,
        shifts: Vec<BaseFieldElement>,
    ) -> Result<Self> {
        ensure(
            random_coefficients.len() == air.num_random_coefficients(),
            || "wrong number of coefficients".to_string(),
        )?;
        Ok(Self {
            air,
            trace_generator: *trace_generator,
            coset_size,
            periodic_columns,
            coefficients: random_coefficients.to_vec(),
            point_exponents,
            shifts,
        })
    }

    pub fn degree_bound(&self) -> u64 {
        self.air.composition_polynomial_degree_bound()
    }

    fn point_powers(&self, point: &ExtensionFieldElement) -> Vec<ExtensionFieldElement> {
        let mut powers = Vec::with_capacity(1 + self.point_exponents.len());
        powers.push(*point);
        powers.extend(batch_pow(point, &self.point_exponents));
        powers
    }

    /// Evaluates the composition polynomial at one point given the mask
    /// values.
    pub fn eval_at_point(
        &self,
        point: &ExtensionFieldElement,
        neighbors: &[ExtensionFieldElement],
        composition_neighbors: &[ExtensionFieldElement],
    ) -> Result<ExtensionFieldElement> {
        let periodic_values: Vec<ExtensionFieldElement> = self
            .periodic_columns
            .iter()
            .map(|column| column.eval_at_point(point))
            .collect();
        self.air.constraints_eval(
            neighbors,
            composition_neighbors,
            &periodic_values,
            &self.coefficients,
            &self.point_powers(point),
            &self.shifts,
        )
    }

    /// Evaluates the composition polynomial on the whole coset
    /// `offset·⟨trace generator⟩`, writing the result in bit-reversed
    /// order. The output is filled in contiguous chunks of at most
    /// `task_size` points, dispatched in parallel.
    ///
    /// The trace columns are given in natural order over the coset; mask
    /// rows wrap around the coset.
    pub fn eval_on_coset_bit_reversed_output(
        &self,
        coset_offset: &BaseFieldElement,
        trace_lde: &[&[BaseFieldElement]],
        composition_trace_lde: &[&[ExtensionFieldElement]],
        output: &mut [ExtensionFieldElement],
        task_size: u64,
    ) -> Result<()> {
        let coset_size = self.coset_size;
        ensure(output.len() as u64 == coset_size, || {
            "output size must match the coset size".to_string()
        })?;
        for column in trace_lde {
            ensure(column.len() as u64 == coset_size, || {
                "trace columns must match the coset size".to_string()
            })?;
        }
        for column in composition_trace_lde {
            ensure(column.len() as u64 == coset_size, || {
                "composition trace columns must match the coset size".to_string()
            })?;
        }
        let mask = self.air.mask();
        for (_, column) in &mask {
            ensure(
                *column < trace_lde.len() + composition_trace_lde.len(),
                || "too few trace columns provided".to_string(),
            )?;
        }

        let periodic_tables: Vec<Vec<BaseFieldElement>> = self
            .periodic_columns
            .iter()
            .map(|column| column.eval_on_coset(coset_offset, &self.trace_generator, coset_size))
            .collect::<Result<_>>()?;

        let log_coset_size = safe_log2(coset_size);
        let index_mask = coset_size - 1;
        let error_flag = std::sync::Mutex::new(None::<StarkError>);

        parallel_for_chunks(output, task_size as usize, |chunk, window| {
            let mut neighbors = vec![ExtensionFieldElement::zero(); mask.len()];
            let mut composition_neighbors = vec![ExtensionFieldElement::zero(); mask.len()];
            for (window_index, slot) in window.iter_mut().enumerate() {
                let output_index = (chunk.start + window_index) as u64;
                let natural_index = bit_reverse(output_index, log_coset_size);

                // Gather the mask values around this point.
                let mut n_base = 0;
                let mut n_composition = 0;
                for (row, column) in &mask {
                    let neighbor_index =
                        ((natural_index as i64 + row).rem_euclid(coset_size as i64)) as u64
                            & index_mask;
                    if *column < trace_lde.len() {
                        neighbors[n_base] = ExtensionFieldElement::from(
                            trace_lde[*column][neighbor_index as usize],
                        );
                        n_base += 1;
                    } else {
                        composition_neighbors[n_composition] = composition_trace_lde
                            [*column - trace_lde.len()][neighbor_index as usize];
                        n_composition += 1;
                    }
                }

                let point = ExtensionFieldElement::from(
                    *coset_offset * self.trace_generator.pow(natural_index),
                );
                let periodic_values: Vec<ExtensionFieldElement> = periodic_tables
                    .iter()
                    .map(|table| ExtensionFieldElement::from(table[natural_index as usize]))
                    .collect();

                match self.air.constraints_eval(
                    &neighbors[..n_base],
                    &composition_neighbors[..n_composition],
                    &periodic_values,
                    &self.coefficients,
                    &self.point_powers(&point),
                    &self.shifts,
                ) {
                    Ok(value) => *slot = value,
                    Err(error) => {
                        *error_flag.lock().unwrap() = Some(error);
                        return;
                    }
                }
            }
        });

        match error_flag.into_inner().unwrap() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use basalt_math::field::element::random_element_vector;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    /// A flexible single-constraint AIR:
    /// `x_i · periodic_i − y_i`, adjusted over all rows.
    struct ProductAir {
        trace_length: u64,
        periodic_values: Vec<BaseFieldElement>,
    }

    impl Air for ProductAir {
        fn trace_length(&self) -> u64 {
            self.trace_length
        }

        fn num_columns(&self) -> usize {
            1
        }

        fn num_random_coefficients(&self) -> usize {
            2
        }

        fn mask(&self) -> Vec<MaskEntry> {
            vec![(0, 0), (0, 1)]
        }

        fn composition_polynomial_degree_bound(&self) -> u64 {
            2 * self.trace_length
        }

        fn create_composition_polynomial<'a>(
            &'a self,
            trace_generator: &BaseFieldElement,
            random_coefficients: &[ExtensionFieldElement],
        ) -> Result<CompositionPolynomial<'a>> {
            let degree_bound = self.composition_polynomial_degree_bound();
            // Constraint degree 2L-2, no numerator, denominator x^L - 1.
            let adjustment =
                degree_bound - 1 - (2 * (self.trace_length - 1) - self.trace_length);
            CompositionPolynomial::new(
                self,
                trace_generator,
                self.trace_length,
                vec![PeriodicColumn::new(&self.periodic_values, self.trace_length, 1)?],
                random_coefficients,
                vec![self.trace_length, adjustment],
                vec![],
            )
        }

        fn constraints_eval(
            &self,
            neighbors: &[ExtensionFieldElement],
            composition_neighbors: &[ExtensionFieldElement],
            periodic_values: &[ExtensionFieldElement],
            random_coefficients: &[ExtensionFieldElement],
            point_powers: &[ExtensionFieldElement],
            _shifts: &[BaseFieldElement],
        ) -> Result<ExtensionFieldElement> {
            let constraint = neighbors[0] * periodic_values[0] - composition_neighbors[0];
            let degree_adjustment =
                random_coefficients[0] + random_coefficients[1] * point_powers[2];
            let denominator = point_powers[1] - ExtensionFieldElement::one();
            Ok(constraint * degree_adjustment * denominator.inverse()?)
        }
    }

    #[test]
    fn coset_evaluation_matches_pointwise_evaluation() {
        let mut rng = StdRng::seed_from_u64(131);
        for (log_coset_size, task_size) in [(5u32, 16u64), (6, 20), (4, 32)] {
            let trace_length = 1u64 << log_coset_size;
            let air = ProductAir {
                trace_length,
                periodic_values: random_element_vector(&mut rng, 4),
            };
            let coefficients: Vec<ExtensionFieldElement> = random_element_vector(&mut rng, 2);
            let generator = BaseFieldElement::subgroup_generator(trace_length).unwrap();
            let polynomial = air
                .create_composition_polynomial(&generator, &coefficients)
                .unwrap();

            let trace: Vec<BaseFieldElement> =
                random_element_vector(&mut rng, trace_length as usize);
            let composition_trace: Vec<ExtensionFieldElement> =
                random_element_vector(&mut rng, trace_length as usize);

            let coset_offset = BaseFieldElement::generator();
            let mut evaluation = vec![ExtensionFieldElement::zero(); trace_length as usize];
            polynomial
                .eval_on_coset_bit_reversed_output(
                    &coset_offset,
                    &[&trace],
                    &[&composition_trace],
                    &mut evaluation,
                    task_size,
                )
                .unwrap();

            for i in 0..trace_length {
                let point =
                    ExtensionFieldElement::from(coset_offset * generator.pow(i));
                let expected = polynomial
                    .eval_at_point(
                        &point,
                        &[ExtensionFieldElement::from(trace[i as usize])],
                        &[composition_trace[i as usize]],
                    )
                    .unwrap();
                assert_eq!(
                    evaluation[bit_reverse(i, log_coset_size) as usize],
                    expected
                );
            }
        }
    }

    #[test]
    fn wrong_coefficient_count_is_rejected() {
        let air = ProductAir {
            trace_length: 8,
            periodic_values: vec![BaseFieldElement::one()],
        };
        let generator = BaseFieldElement::subgroup_generator(8).unwrap();
        assert!(air
            .create_composition_polynomial(&generator, &[])
            .is_err());
    }
}
