use std::collections::BTreeSet;

use basalt_crypto::fiat_shamir::Prng;
use basalt_math::bit_reversal::bit_reverse_in_place;
use basalt_math::coset::Coset;
use basalt_math::domain::EvaluationDomain;
use basalt_math::field::element::FftField;
use basalt_math::field::{ExtensionFieldElement, FieldElement};
use basalt_math::lde::{CachedLdeManager, LdeManager};

use crate::air::{MaskEntry, TraceBase};
use crate::channel::{ProverChannel, VerifierChannel};
use crate::commitment::{
    make_commitment_scheme_prover, make_commitment_scheme_verifier, RowCol, TableProver,
    TableVerifier,
};
use crate::errors::{ensure, ensure_proof, Result, StarkError};

/// A query against a committed trace: (coset index, offset within the
/// coset, column index), all in the commitment's bit-reversed layout.
pub type TraceQuery = (u64, u64, usize);

/// Computes the trace LDE over the evaluation domain and owns its
/// commitment: the per-coset bit-reversed evaluations (cached), the table
/// prover, and the domain reference.
///
/// Lifecycle: construct, `commit` once, then `decommit_queries` /
/// `eval_mask_at_point` freely, and `finalize_eval` to release the
/// uncached evaluation pathway.
pub struct CommittedTraceProver<F: FftField> {
    evaluation_domain: EvaluationDomain,
    n_columns: usize,
    lde: Option<CachedLdeManager<F>>,
    table_prover: TableProver<F>,
}

impl<F: FftField> CommittedTraceProver<F> {
    /// Commitment rows are the domain points, `n_columns` elements wide.
    /// With `with_salt`, rows are committed under the hiding (salted)
    /// scheme using `salts_prng`.
    pub fn new(
        evaluation_domain: &EvaluationDomain,
        n_columns: usize,
        with_salt: bool,
        salts_prng: Option<&Prng>,
    ) -> Result<Self> {
        let commitment_scheme = make_commitment_scheme_prover(
            n_columns * F::SIZE_IN_BYTES,
            evaluation_domain.trace_size(),
            evaluation_domain.num_cosets() as usize,
            with_salt,
            salts_prng,
        )?;
        Ok(Self {
            evaluation_domain: evaluation_domain.clone(),
            n_columns,
            lde: None,
            table_prover: TableProver::new(n_columns, commitment_scheme),
        })
    }

    pub fn num_columns(&self) -> usize {
        self.n_columns
    }

    pub fn lde(&self) -> &CachedLdeManager<F> {
        self.lde.as_ref().expect("commit must be called first")
    }

    pub fn lde_mut(&mut self) -> &mut CachedLdeManager<F> {
        self.lde.as_mut().expect("commit must be called first")
    }

    /// Interpolates the trace columns over `trace_domain`, evaluates them
    /// on every coset of the evaluation domain (in the bit-reversed
    /// commitment layout) and commits to the whole table.
    pub fn commit(
        &mut self,
        trace: TraceBase<F>,
        trace_domain: &Coset,
        eval_in_natural_order: bool,
        channel: &mut ProverChannel,
    ) -> Result<()> {
        ensure(trace.width() == self.n_columns, || {
            format!(
                "trace has {} columns, expected {}",
                trace.width(),
                self.n_columns
            )
        })?;
        ensure(
            trace.length() as u64 == self.evaluation_domain.trace_size(),
            || "trace length does not match the evaluation domain".to_string(),
        )?;

        // The cache works in bit-reversed evaluations over bit-reversed
        // coset offsets, so that concatenating the cosets yields the
        // bit-reversed enumeration of the whole domain.
        let lde_manager = LdeManager::new(trace_domain.clone(), false);
        let mut lde = CachedLdeManager::new(
            lde_manager,
            self.evaluation_domain.coset_offsets_bit_reversed(),
        )?;
        for mut column in trace.into_columns() {
            if eval_in_natural_order {
                bit_reverse_in_place(&mut column);
            }
            lde.add_evaluation(column)?;
        }
        lde.finalize_adding();

        for coset_index in 0..self.evaluation_domain.num_cosets() {
            let entry = lde.eval_on_coset(coset_index)?;
            let spans: Vec<&[F]> = entry.iter().map(|column| column.as_slice()).collect();
            self.table_prover
                .add_segment_for_commitment(&spans, coset_index as usize, 1)?;
        }
        self.lde = Some(lde);
        self.table_prover.commit(channel)
    }

    /// Decommits the commitment cells behind the given queries.
    pub fn decommit_queries(
        &mut self,
        queries: &[TraceQuery],
        channel: &mut ProverChannel,
    ) -> Result<()> {
        let trace_size = self.evaluation_domain.trace_size();
        let mut data_queries = BTreeSet::new();
        for (coset_index, offset, column) in queries {
            ensure(*coset_index < self.evaluation_domain.num_cosets(), || {
                "coset index out of range".to_string()
            })?;
            ensure(*offset < trace_size, || "offset out of range".to_string())?;
            ensure(*column < self.n_columns, || {
                "column index out of range".to_string()
            })?;
            data_queries.insert(RowCol::new(coset_index * trace_size + offset, *column as u64));
        }

        let rows_to_fetch = self
            .table_prover
            .start_decommitment_phase(&data_queries, &BTreeSet::new())?;
        let row_queries: Vec<(u64, u64)> = rows_to_fetch
            .iter()
            .map(|row| (row / trace_size, row % trace_size))
            .collect();
        let mut columns_data =
            vec![vec![F::zero(); row_queries.len()]; self.n_columns];
        self.lde()
            .eval_at_points(&row_queries, &mut columns_data)?;
        let spans: Vec<&[F]> = columns_data.iter().map(|column| column.as_slice()).collect();
        self.table_prover.decommit(&spans, channel)
    }

    /// Evaluates the trace mask at an out-of-domain point: entry `i` is
    /// column `mask[i].1` at `point·g^mask[i].0`.
    pub fn eval_mask_at_point(
        &self,
        mask: &[MaskEntry],
        point: &ExtensionFieldElement,
        output: &mut [ExtensionFieldElement],
    ) -> Result<()>
    where
        ExtensionFieldElement: From<F>,
    {
        ensure(mask.len() == output.len(), || {
            "one output slot per mask entry is required".to_string()
        })?;
        let trace_size = self.evaluation_domain.trace_size() as i64;
        let generator = self.evaluation_domain.trace_generator();
        for ((row, column), out) in mask.iter().zip(output.iter_mut()) {
            ensure(*column < self.n_columns, || {
                "mask column out of range".to_string()
            })?;
            let shift = generator.pow(row.rem_euclid(trace_size) as u64);
            let shifted_point = *point * shift;
            let mut result = [ExtensionFieldElement::zero()];
            self.lde()
                .eval_at_points_not_cached(*column, &[shifted_point], &mut result)?;
            *out = result[0];
        }
        Ok(())
    }

    /// Releases the uncached evaluation pathway.
    pub fn finalize_eval(&mut self) {
        self.lde_mut().finalize_evaluations();
    }
}

/// The verifier mirror: reads the commitment and authenticates query
/// answers against it.
pub struct CommittedTraceVerifier<F: FieldElement> {
    evaluation_domain: EvaluationDomain,
    n_columns: usize,
    table_verifier: TableVerifier<F>,
}

impl<F: FieldElement> CommittedTraceVerifier<F> {
    pub fn new(
        evaluation_domain: &EvaluationDomain,
        n_columns: usize,
        with_salt: bool,
    ) -> Result<Self> {
        let commitment_scheme = make_commitment_scheme_verifier(
            n_columns * F::SIZE_IN_BYTES,
            evaluation_domain.size(),
            with_salt,
        )?;
        Ok(Self {
            evaluation_domain: evaluation_domain.clone(),
            n_columns,
            table_verifier: TableVerifier::new(n_columns, commitment_scheme),
        })
    }

    pub fn num_columns(&self) -> usize {
        self.n_columns
    }

    pub fn read_commitment(&mut self, channel: &mut VerifierChannel) -> Result<()> {
        self.table_verifier.read_commitment(channel)
    }

    /// Reads and authenticates the queried cells; returns their values in
    /// query order.
    pub fn verify_decommitment(
        &mut self,
        queries: &[TraceQuery],
        channel: &mut VerifierChannel,
    ) -> Result<Vec<F>> {
        let trace_size = self.evaluation_domain.trace_size();
        let mut data_queries = BTreeSet::new();
        for (coset_index, offset, column) in queries {
            ensure_proof(*coset_index < self.evaluation_domain.num_cosets(), || {
                "coset index out of range".to_string()
            })?;
            ensure_proof(*offset < trace_size, || "offset out of range".to_string())?;
            ensure_proof(*column < self.n_columns, || {
                "column index out of range".to_string()
            })?;
            data_queries.insert(RowCol::new(coset_index * trace_size + offset, *column as u64));
        }

        let response =
            self.table_verifier
                .query(&data_queries, &BTreeSet::new(), channel)?;
        if !self.table_verifier.verify_decommitment(&response, channel)? {
            return Err(StarkError::InvalidProof(
                "trace decommitment does not match the commitment".to_string(),
            ));
        }
        Ok(queries
            .iter()
            .map(|(coset_index, offset, column)| {
                response[&RowCol::new(coset_index * trace_size + offset, *column as u64)]
            })
            .collect())
    }
}
