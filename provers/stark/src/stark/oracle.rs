use basalt_math::bit_reversal::{bit_reverse, bit_reverse_vector};
use basalt_math::domain::EvaluationDomain;
use basalt_math::field::{BaseFieldElement, ExtensionFieldElement, FieldElement};
use basalt_math::helpers::{safe_div, safe_log2};

use crate::air::MaskEntry;
use crate::channel::{ProverChannel, VerifierChannel};
use crate::composition::CompositionPolynomial;
use crate::errors::{ensure, Result};
use crate::stark::committed_trace::{
    CommittedTraceProver, CommittedTraceVerifier, TraceQuery,
};

/// A query against the virtual oracle: (coset index, offset within the
/// coset), in the commitment layout.
pub type OracleQuery = (u64, u64);

/// Translates a mask entry at an oracle query into the commitment cell it
/// reads: the neighbor at `x·g^row` sits at the bit-reversed position of
/// `natural(offset) + row`.
fn neighbor_offset(offset: u64, row: i64, trace_size: u64) -> u64 {
    let log_size = safe_log2(trace_size);
    let natural = bit_reverse(offset, log_size);
    let shifted = (natural as i64 + row).rem_euclid(trace_size as i64) as u64;
    bit_reverse(shifted, log_size)
}

/// Splits combined-width mask entries into per-trace queries for one
/// oracle query point.
fn split_queries(
    queries: &[OracleQuery],
    mask: &[MaskEntry],
    base_width: usize,
    trace_size: u64,
) -> (Vec<TraceQuery>, Vec<TraceQuery>) {
    let mut base_queries = Vec::new();
    let mut extension_queries = Vec::new();
    for (coset_index, offset) in queries {
        for (row, column) in mask {
            let cell_offset = neighbor_offset(*offset, *row, trace_size);
            if *column < base_width {
                base_queries.push((*coset_index, cell_offset, *column));
            } else {
                extension_queries.push((*coset_index, cell_offset, *column - base_width));
            }
        }
    }
    (base_queries, extension_queries)
}

/// A virtual oracle for the composition polynomial: its value at a domain
/// point is the composition polynomial applied to the mask values drawn
/// from the committed trace LDEs. Decommitting a point decommits the mask
/// cells from the underlying traces.
pub struct CompositionOracleProver<'t, 'p> {
    evaluation_domain: EvaluationDomain,
    trace: &'t mut CommittedTraceProver<BaseFieldElement>,
    composition_trace: Option<&'t mut CommittedTraceProver<ExtensionFieldElement>>,
    mask: Vec<MaskEntry>,
    composition_polynomial: CompositionPolynomial<'p>,
}

impl<'t, 'p> CompositionOracleProver<'t, 'p> {
    pub fn new(
        evaluation_domain: &EvaluationDomain,
        trace: &'t mut CommittedTraceProver<BaseFieldElement>,
        composition_trace: Option<&'t mut CommittedTraceProver<ExtensionFieldElement>>,
        mask: Vec<MaskEntry>,
        composition_polynomial: CompositionPolynomial<'p>,
    ) -> Result<Self> {
        let width =
            trace.num_columns() + composition_trace.as_ref().map_or(0, |t| t.num_columns());
        for (_, column) in &mask {
            ensure(*column < width, || "mask column out of range".to_string())?;
        }
        Ok(Self {
            evaluation_domain: evaluation_domain.clone(),
            trace,
            composition_trace,
            mask,
            composition_polynomial,
        })
    }

    pub fn mask(&self) -> &[MaskEntry] {
        &self.mask
    }

    pub fn trace_width(&self) -> usize {
        self.trace.num_columns()
    }

    /// Total number of columns, including the composition trace.
    pub fn width(&self) -> usize {
        self.trace.num_columns()
            + self
                .composition_trace
                .as_ref()
                .map_or(0, |t| t.num_columns())
    }

    pub fn composition_polynomial(&self) -> &CompositionPolynomial<'p> {
        &self.composition_polynomial
    }

    /// Composition polynomial degree bound divided by the trace length.
    pub fn constraints_degree_bound(&self) -> u64 {
        safe_div(
            self.composition_polynomial.degree_bound(),
            self.evaluation_domain.trace_size(),
        )
    }

    /// Evaluates the composition polynomial over the first `n_cosets`
    /// cosets (commitment order); the output is the concatenated
    /// bit-reversed evaluation, `n_cosets · trace_length` points.
    pub fn eval_composition(&mut self, task_size: u64, n_cosets: u64) -> Result<Vec<ExtensionFieldElement>> {
        let trace_size = self.evaluation_domain.trace_size();
        ensure(n_cosets <= self.evaluation_domain.num_cosets(), || {
            "cannot evaluate on more cosets than the domain has".to_string()
        })?;
        let offsets = self.evaluation_domain.coset_offsets_bit_reversed();
        let mut evaluation =
            vec![ExtensionFieldElement::zero(); (n_cosets * trace_size) as usize];

        for coset_index in 0..n_cosets {
            // The cache is bit-reversed; the composition polynomial walks
            // the coset in natural order.
            let trace_columns: Vec<Vec<BaseFieldElement>> = self
                .trace
                .lde_mut()
                .eval_on_coset(coset_index)?
                .iter()
                .map(|column| bit_reverse_vector(column))
                .collect();
            let composition_columns: Vec<Vec<ExtensionFieldElement>> =
                match self.composition_trace.as_mut() {
                    Some(composition_trace) => composition_trace
                        .lde_mut()
                        .eval_on_coset(coset_index)?
                        .iter()
                        .map(|column| bit_reverse_vector(column))
                        .collect(),
                    None => Vec::new(),
                };

            let trace_spans: Vec<&[BaseFieldElement]> =
                trace_columns.iter().map(|c| c.as_slice()).collect();
            let composition_spans: Vec<&[ExtensionFieldElement]> =
                composition_columns.iter().map(|c| c.as_slice()).collect();
            let output = &mut evaluation
                [(coset_index * trace_size) as usize..((coset_index + 1) * trace_size) as usize];
            self.composition_polynomial.eval_on_coset_bit_reversed_output(
                &offsets[coset_index as usize],
                &trace_spans,
                &composition_spans,
                output,
                task_size,
            )?;
        }
        Ok(evaluation)
    }

    /// Decommits the mask cells of the queried points, base trace first.
    pub fn decommit_queries(
        &mut self,
        queries: &[OracleQuery],
        channel: &mut ProverChannel,
    ) -> Result<()> {
        let (base_queries, extension_queries) = split_queries(
            queries,
            &self.mask,
            self.trace.num_columns(),
            self.evaluation_domain.trace_size(),
        );
        self.trace.decommit_queries(&base_queries, channel)?;
        if let Some(composition_trace) = self.composition_trace.as_mut() {
            composition_trace.decommit_queries(&extension_queries, channel)?;
        } else {
            ensure(extension_queries.is_empty(), || {
                "mask touches a composition trace that was not provided".to_string()
            })?;
        }
        Ok(())
    }

    /// Evaluates the mask at an out-of-domain point (main trace entries
    /// only; the oracle's mask must not touch the composition trace).
    pub fn eval_mask_at_point(
        &self,
        point: &ExtensionFieldElement,
        output: &mut [ExtensionFieldElement],
    ) -> Result<()> {
        self.trace.eval_mask_at_point(&self.mask, point, output)
    }

    /// Forwards `eval_mask_at_point` for an ad-hoc mask over the main
    /// trace (used by out-of-domain sampling for uncovered columns).
    pub fn eval_trace_mask_at_point(
        &self,
        mask: &[MaskEntry],
        point: &ExtensionFieldElement,
        output: &mut [ExtensionFieldElement],
    ) -> Result<()> {
        self.trace.eval_mask_at_point(mask, point, output)
    }

    /// Releases the uncached evaluation pathways of the wrapped traces.
    pub fn finalize_eval(&mut self) {
        self.trace.finalize_eval();
        if let Some(composition_trace) = self.composition_trace.as_mut() {
            composition_trace.finalize_eval();
        }
    }
}

pub struct CompositionOracleVerifier<'t, 'p> {
    evaluation_domain: EvaluationDomain,
    trace: &'t mut CommittedTraceVerifier<BaseFieldElement>,
    composition_trace: Option<&'t mut CommittedTraceVerifier<ExtensionFieldElement>>,
    mask: Vec<MaskEntry>,
    composition_polynomial: CompositionPolynomial<'p>,
}

impl<'t, 'p> CompositionOracleVerifier<'t, 'p> {
    pub fn new(
        evaluation_domain: &EvaluationDomain,
        trace: &'t mut CommittedTraceVerifier<BaseFieldElement>,
        composition_trace: Option<&'t mut CommittedTraceVerifier<ExtensionFieldElement>>,
        mask: Vec<MaskEntry>,
        composition_polynomial: CompositionPolynomial<'p>,
    ) -> Result<Self> {
        let width =
            trace.num_columns() + composition_trace.as_ref().map_or(0, |t| t.num_columns());
        for (_, column) in &mask {
            ensure(*column < width, || "mask column out of range".to_string())?;
        }
        Ok(Self {
            evaluation_domain: evaluation_domain.clone(),
            trace,
            composition_trace,
            mask,
            composition_polynomial,
        })
    }

    pub fn mask(&self) -> &[MaskEntry] {
        &self.mask
    }

    pub fn trace_width(&self) -> usize {
        self.trace.num_columns()
    }

    pub fn width(&self) -> usize {
        self.trace.num_columns()
            + self
                .composition_trace
                .as_ref()
                .map_or(0, |t| t.num_columns())
    }

    pub fn composition_polynomial(&self) -> &CompositionPolynomial<'p> {
        &self.composition_polynomial
    }

    pub fn constraints_degree_bound(&self) -> u64 {
        safe_div(
            self.composition_polynomial.degree_bound(),
            self.evaluation_domain.trace_size(),
        )
    }

    /// Authenticates the mask cells behind the queried points and computes
    /// the oracle values there.
    pub fn verify_decommitment(
        &mut self,
        queries: &[OracleQuery],
        channel: &mut VerifierChannel,
    ) -> Result<Vec<ExtensionFieldElement>> {
        let base_width = self.trace.num_columns();
        let trace_size = self.evaluation_domain.trace_size();
        let (base_queries, extension_queries) =
            split_queries(queries, &self.mask, base_width, trace_size);

        let base_values = self.trace.verify_decommitment(&base_queries, channel)?;
        let extension_values = match self.composition_trace.as_mut() {
            Some(composition_trace) => {
                composition_trace.verify_decommitment(&extension_queries, channel)?
            }
            None => {
                ensure(extension_queries.is_empty(), || {
                    "mask touches a composition trace that was not provided".to_string()
                })?;
                Vec::new()
            }
        };

        // Reassemble per-query neighbors (the split preserved mask order
        // within each query) and evaluate the composition polynomial at
        // the corresponding domain points.
        let mut results = Vec::with_capacity(queries.len());
        let mut base_cursor = 0;
        let mut extension_cursor = 0;
        for (coset_index, offset) in queries {
            let mut neighbors = Vec::new();
            let mut composition_neighbors = Vec::new();
            for (_, column) in &self.mask {
                if *column < base_width {
                    neighbors.push(ExtensionFieldElement::from(base_values[base_cursor]));
                    base_cursor += 1;
                } else {
                    composition_neighbors.push(extension_values[extension_cursor]);
                    extension_cursor += 1;
                }
            }
            let point = ExtensionFieldElement::from(
                self.evaluation_domain.element_at(*coset_index, *offset),
            );
            results.push(self.composition_polynomial.eval_at_point(
                &point,
                &neighbors,
                &composition_neighbors,
            )?);
        }
        Ok(results)
    }
}
