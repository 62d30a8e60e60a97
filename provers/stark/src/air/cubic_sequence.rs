//! An AIR for the claim: "there exists a sequence starting at a secret
//! witness `w` with `y_i = x_i³`, `x_{i+1} = c·y_i + periodic_i`, such that
//! `x_{res_claim_index}` equals a public claimed value."
//!
//! Two columns (x, y); the transition constraint skips the last row, the
//! claim is a single-point constraint. Doubles as the engine's end-to-end
//! test subject.

use basalt_math::field::{BaseFieldElement, ExtensionFieldElement, FieldElement};
use basalt_math::helpers::{is_power_of_two, log2_ceil, pow2, safe_div};
use basalt_math::polynomial::batch_pow;
use rand::RngCore;

use crate::air::{Air, MaskEntry, Trace};
use crate::composition::{CompositionPolynomial, PeriodicColumn};
use crate::errors::{ensure, Result};

const SEQUENCE_CONSTANT: u64 = 16;
const PERIODIC_VALUES: [u64; 2] = [2, 10];
const N_CONSTRAINTS: usize = 3;

fn periodic_values() -> Vec<BaseFieldElement> {
    PERIODIC_VALUES
        .iter()
        .map(|v| BaseFieldElement::from_uint(*v))
        .collect()
}

fn sequence_constant() -> BaseFieldElement {
    BaseFieldElement::from_uint(SEQUENCE_CONSTANT)
}

pub struct CubicSequenceAir {
    original_trace_length: u64,
    trace_length: u64,
    slackness_factor: u64,
    res_claim_index: u64,
    claimed_res: BaseFieldElement,
}

impl CubicSequenceAir {
    pub fn new(
        original_trace_length: u64,
        res_claim_index: u64,
        claimed_res: BaseFieldElement,
        is_zero_knowledge: bool,
        n_queries: usize,
    ) -> Result<Self> {
        ensure(is_power_of_two(original_trace_length), || {
            "trace length must be a power of 2".to_string()
        })?;
        ensure(res_claim_index < original_trace_length, || {
            "res_claim_index must be smaller than the trace length".to_string()
        })?;
        let slackness_factor = if is_zero_knowledge {
            Self::compute_slackness_factor(original_trace_length, n_queries)
        } else {
            1
        };
        Ok(Self {
            original_trace_length,
            trace_length: original_trace_length * slackness_factor,
            slackness_factor,
            res_claim_index,
            claimed_res,
        })
    }

    /// The trace must be padded so that the cells revealed by decommitments
    /// (the mask samples and the queries) leave enough fresh randomness.
    fn compute_slackness_factor(original_trace_length: u64, n_queries: usize) -> u64 {
        // Column 0 carries two mask entries.
        let max_deep_queries_per_column = 2u64;
        let modified_trace_length = pow2(log2_ceil(
            original_trace_length + max_deep_queries_per_column + n_queries as u64,
        ));
        safe_div(modified_trace_length, original_trace_length)
    }

    pub fn slackness_factor(&self) -> u64 {
        self.slackness_factor
    }

    /// Generates the trace. `rng` supplies the zero-knowledge slack values;
    /// it is untouched when the AIR is not zero knowledge.
    pub fn get_trace<R: RngCore + ?Sized>(
        &self,
        witness: &BaseFieldElement,
        rng: &mut R,
    ) -> Result<Trace> {
        let constant = sequence_constant();
        let periodic = periodic_values();
        let mut x_column = Vec::with_capacity(self.original_trace_length as usize);
        let mut y_column = Vec::with_capacity(self.original_trace_length as usize);
        let mut x = *witness;
        for i in 0..self.original_trace_length {
            x_column.push(x);
            let y = x.pow(3);
            y_column.push(y);
            x = constant * y + periodic[(i % 2) as usize];
        }
        let mut trace = Trace::new(vec![x_column, y_column])?;
        if self.slackness_factor > 1 {
            trace.add_zero_knowledge_slackness(self.slackness_factor as usize, rng);
        }
        ensure(trace.length() as u64 == self.trace_length, || {
            "wrong trace length".to_string()
        })?;
        Ok(trace)
    }

    /// Derives the public claimed value from the secret witness.
    pub fn public_input_from_private_input(
        witness: &BaseFieldElement,
        res_claim_index: u64,
    ) -> BaseFieldElement {
        let constant = sequence_constant();
        let periodic = periodic_values();
        let mut x = *witness;
        for i in 0..res_claim_index {
            x = constant * x.pow(3) + periodic[(i % 2) as usize];
        }
        x
    }
}

impl Air for CubicSequenceAir {
    fn trace_length(&self) -> u64 {
        self.trace_length
    }

    fn num_columns(&self) -> usize {
        2
    }

    fn num_random_coefficients(&self) -> usize {
        2 * N_CONSTRAINTS
    }

    fn mask(&self) -> Vec<MaskEntry> {
        vec![(0, 0), (self.slackness_factor as i64, 0), (0, 1)]
    }

    fn composition_polynomial_degree_bound(&self) -> u64 {
        4 * self.trace_length
    }

    fn create_composition_polynomial<'a>(
        &'a self,
        trace_generator: &BaseFieldElement,
        random_coefficients: &[ExtensionFieldElement],
    ) -> Result<CompositionPolynomial<'a>> {
        let length = self.trace_length;
        let original_length = self.original_trace_length;
        let degree_bound = self.composition_polynomial_degree_bound();

        // Degree adjustments make every summand of degree bound - 1:
        // adjustment = bound - 1 - (constraint + numerator - denominator).
        let point_exponents = vec![
            original_length,
            degree_bound - 1 - (3 * (length - 1) - original_length),
            degree_bound - 1 - (length - original_length),
            degree_bound - 1 - (length - 2),
        ];
        let generator_exponents = vec![
            self.slackness_factor * (original_length - 1),
            self.slackness_factor * self.res_claim_index,
        ];

        CompositionPolynomial::new(
            self,
            trace_generator,
            length,
            vec![PeriodicColumn::new(
                &periodic_values(),
                length,
                self.slackness_factor,
            )?],
            random_coefficients,
            point_exponents,
            batch_pow(trace_generator, &generator_exponents),
        )
    }

    fn constraints_eval(
        &self,
        neighbors: &[ExtensionFieldElement],
        _composition_neighbors: &[ExtensionFieldElement],
        periodic_values: &[ExtensionFieldElement],
        random_coefficients: &[ExtensionFieldElement],
        point_powers: &[ExtensionFieldElement],
        shifts: &[BaseFieldElement],
    ) -> Result<ExtensionFieldElement> {
        let [x, x_next, y] = [neighbors[0], neighbors[1], neighbors[2]];
        let point = point_powers[0];
        let one = ExtensionFieldElement::one();

        // All original rows: the vanishing polynomial of the spaced-out
        // subgroup is point^original_trace_length - 1.
        let original_rows_inverse = (point_powers[1] - one).inverse()?;

        // y_i = x_i^3 on all original rows.
        let cube_constraint = (y - x * x * x)
            * (random_coefficients[0] + random_coefficients[1] * point_powers[2])
            * original_rows_inverse;

        // x_{i+1} = c·y_i + periodic_i on all original rows but the last.
        let transition_constraint = (x_next - y * sequence_constant() - periodic_values[0])
            * (random_coefficients[2] + random_coefficients[3] * point_powers[3])
            * (point - shifts[0])
            * original_rows_inverse;

        // x_{res_claim_index} equals the claimed result.
        let claim_constraint = (x - self.claimed_res)
            * (random_coefficients[4] + random_coefficients[5] * point_powers[4])
            * (point - shifts[1]).inverse()?;

        Ok(cube_constraint + transition_constraint + claim_constraint)
    }
}
