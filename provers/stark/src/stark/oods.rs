//! Out-of-domain sampling: reduces proving low-degreeness of the
//! composition polynomial to boundary constraints on a single virtual
//! oracle over the trace and composition-trace columns.

use basalt_math::coset::Coset;
use basalt_math::field::{ExtensionFieldElement, FieldElement};
use basalt_math::helpers::safe_log2;
use basalt_math::polynomial::horner_eval;
use itertools::izip;

use crate::air::{BoundaryConstraint, CompositionTrace, MaskEntry};
use crate::channel::{ProverChannel, VerifierChannel};
use crate::composition::PolynomialBreaker;
use crate::errors::{ensure_proof, Result};
use crate::stark::committed_trace::CommittedTraceProver;
use crate::stark::oracle::{CompositionOracleProver, CompositionOracleVerifier};

const EVAL_POINT_ANNOTATION: &str = "Evaluation point";

fn mask_value_annotation(index: usize) -> String {
    format!("Mask value #{index}")
}

fn broken_value_annotation(index: usize) -> String {
    format!("Broken composition value #{index}")
}

/// The oracle mask extended with a `(0, col)` entry for every main-trace
/// column the mask leaves uncovered (the zero-knowledge extra column, when
/// present), so every column ends up pinned by boundary constraints.
fn effective_mask(mask: &[MaskEntry], trace_width: usize) -> Vec<MaskEntry> {
    let mut covered = vec![false; trace_width];
    for (_, column) in mask {
        if *column < trace_width {
            covered[*column] = true;
        }
    }
    let mut extended = mask.to_vec();
    for (column, covered) in covered.iter().enumerate() {
        if !covered {
            extended.push((0, column));
        }
    }
    extended
}

/// The boundary constraints induced by the sampled values: a point-match
/// per mask entry, a Frobenius pair per distinct masked column (pinning the
/// column to base-field coefficients), and a point-match per broken
/// composition column at `z^n_breaks`.
fn collect_boundary_constraints(
    mask: &[MaskEntry],
    mask_values: &[ExtensionFieldElement],
    broken_values: &[ExtensionFieldElement],
    point: &ExtensionFieldElement,
    trace_generator: &basalt_math::field::BaseFieldElement,
    trace_width: usize,
    trace_length: u64,
) -> Vec<BoundaryConstraint> {
    let n_breaks = broken_values.len();
    let mut constraints = Vec::with_capacity(mask.len() + trace_width + n_breaks);

    let mask_points: Vec<ExtensionFieldElement> = mask
        .iter()
        .map(|(row, _)| {
            *point * trace_generator.pow(row.rem_euclid(trace_length as i64) as u64)
        })
        .collect();

    for ((_, column), mask_point, value) in izip!(mask, &mask_points, mask_values) {
        constraints.push(BoundaryConstraint {
            column_index: *column,
            point: *mask_point,
            value: *value,
        });
    }

    // One Frobenius constraint per distinct column, via its first mask
    // entry: a base-field polynomial satisfies c(x^p) = c(x)^p.
    for column in 0..trace_width {
        if let Some(entry_index) = mask.iter().position(|(_, c)| *c == column) {
            constraints.push(BoundaryConstraint {
                column_index: column,
                point: mask_points[entry_index].frobenius(),
                value: mask_values[entry_index].frobenius(),
            });
        }
    }

    let point_to_n_breaks = point.pow(n_breaks as u64);
    for (break_index, value) in broken_values.iter().enumerate() {
        constraints.push(BoundaryConstraint {
            column_index: trace_width + break_index,
            point: point_to_n_breaks,
            value: *value,
        });
    }
    constraints
}

/// Breaks the composition-polynomial evaluation (bit-reversed, over
/// `composition_eval_domain`) into `n_breaks` columns over the folded
/// coset; returns the composition trace and its domain.
pub fn break_composition_polynomial(
    evaluation: &[ExtensionFieldElement],
    n_breaks: u64,
    composition_eval_domain: &Coset,
) -> Result<(CompositionTrace, Coset)> {
    let breaker = PolynomialBreaker::new(
        composition_eval_domain.clone(),
        safe_log2(n_breaks),
    )?;
    let columns = breaker.break_evaluation(evaluation)?;
    Ok((CompositionTrace::new(columns)?, breaker.folded_coset()?))
}

/// Prover side: sends the mask values at `z` and the broken-column values
/// at `z^n_breaks`, and derives the boundary constraints for the low
/// degree test.
pub fn prove_oods(
    channel: &mut ProverChannel,
    oracle: &CompositionOracleProver<'_, '_>,
    composition_trace: &CommittedTraceProver<ExtensionFieldElement>,
    trace_length: u64,
    trace_generator: &basalt_math::field::BaseFieldElement,
) -> Result<Vec<BoundaryConstraint>> {
    let point = channel.receive_field_element(EVAL_POINT_ANNOTATION)?;

    let mask = effective_mask(oracle.mask(), oracle.trace_width());
    let mut mask_values = vec![ExtensionFieldElement::zero(); mask.len()];
    oracle.eval_trace_mask_at_point(&mask, &point, &mut mask_values)?;
    for (index, value) in mask_values.iter().enumerate() {
        channel.send_field_element(value, &mask_value_annotation(index))?;
    }

    let n_breaks = composition_trace.num_columns();
    let broken_mask: Vec<MaskEntry> = (0..n_breaks).map(|column| (0, column)).collect();
    let mut broken_values = vec![ExtensionFieldElement::zero(); n_breaks];
    composition_trace.eval_mask_at_point(
        &broken_mask,
        &point.pow(n_breaks as u64),
        &mut broken_values,
    )?;
    for (index, value) in broken_values.iter().enumerate() {
        channel.send_field_element(value, &broken_value_annotation(index))?;
    }

    Ok(collect_boundary_constraints(
        &mask,
        &mask_values,
        &broken_values,
        &point,
        trace_generator,
        oracle.trace_width(),
        trace_length,
    ))
}

/// Verifier side: draws the same `z`, reads the sampled values, checks the
/// composition identity `C(z, mask values) = Σ_j z^j · b_j`, and derives
/// the same boundary constraints.
pub fn verify_oods(
    channel: &mut VerifierChannel,
    oracle: &CompositionOracleVerifier<'_, '_>,
    n_breaks: u64,
    trace_length: u64,
    trace_generator: &basalt_math::field::BaseFieldElement,
) -> Result<Vec<BoundaryConstraint>> {
    let point = channel.get_and_send_random_field_element(EVAL_POINT_ANNOTATION)?;

    let mask = effective_mask(oracle.mask(), oracle.trace_width());
    let mut mask_values = Vec::with_capacity(mask.len());
    for index in 0..mask.len() {
        mask_values.push(
            channel.receive_field_element::<ExtensionFieldElement>(
                &mask_value_annotation(index),
            )?,
        );
    }
    let mut broken_values = Vec::with_capacity(n_breaks as usize);
    for index in 0..n_breaks as usize {
        broken_values.push(
            channel.receive_field_element::<ExtensionFieldElement>(
                &broken_value_annotation(index),
            )?,
        );
    }

    // The air mask is a prefix of the effective mask.
    let air_mask_values = &mask_values[..oracle.mask().len()];
    let composition_value =
        oracle
            .composition_polynomial()
            .eval_at_point(&point, air_mask_values, &[])?;
    let recombined_value = horner_eval(&point, &broken_values);
    ensure_proof(composition_value == recombined_value, || {
        "out-of-domain sampling composition identity mismatch".to_string()
    })?;

    Ok(collect_boundary_constraints(
        &mask,
        &mask_values,
        &broken_values,
        &point,
        trace_generator,
        oracle.trace_width(),
        trace_length,
    ))
}
