//! The STARK prover/verifier drivers: commit to the trace, draw constraint
//! coefficients, commit to the broken composition polynomial, run
//! out-of-domain sampling, and hand the resulting virtual oracle to FRI.

pub mod committed_trace;
pub mod oods;
pub mod oracle;

pub use committed_trace::{CommittedTraceProver, CommittedTraceVerifier};
pub use oracle::{CompositionOracleProver, CompositionOracleVerifier};

use basalt_crypto::fiat_shamir::Prng;
use basalt_math::coset::Coset;
use basalt_math::domain::EvaluationDomain;
use basalt_math::field::{BaseFieldElement, ExtensionFieldElement};
use basalt_math::helpers::{is_power_of_two, safe_div, safe_log2};
use log::info;

use crate::air::{Air, BoundaryAir, Trace};
use crate::channel::{Channel, ProverChannel, VerifierChannel};
use crate::config::{ProverConfig, StarkConfig};
use crate::errors::{ensure, ensure_proof, Result};
use crate::fri::{self, FriParameters};

const COEFFICIENT_ANNOTATION: &str = "Constraint polynomial random coefficient";
const BOUNDARY_COEFFICIENT_ANNOTATION: &str = "Boundary random coefficient";

/// Protocol parameters shared by prover and verifier, derived from the
/// configuration document and the AIR's shape.
pub struct StarkParameters {
    pub evaluation_domain: EvaluationDomain,
    /// The union of the first `constraints degree bound` cosets, over which
    /// the composition polynomial is evaluated before breaking.
    pub composition_eval_domain: Coset,
    pub fri_params: FriParameters,
    pub is_zero_knowledge: bool,
    pub constraint_polynomial_task_size: u64,
}

impl StarkParameters {
    pub fn new(config: &StarkConfig, prover_config: &ProverConfig, air: &dyn Air) -> Result<Self> {
        let trace_length = air.trace_length();
        ensure(is_power_of_two(trace_length), || {
            "trace length must be a power of two".to_string()
        })?;
        config.validate(safe_log2(trace_length))?;

        let n_cosets = 1u64 << config.log_n_cosets;
        let degree_bound = air.composition_polynomial_degree_bound();
        let constraints_degree_bound = safe_div(degree_bound, trace_length);
        ensure(is_power_of_two(constraints_degree_bound), || {
            "composition degree bound must be a power-of-two multiple of the trace length"
                .to_string()
        })?;
        ensure(constraints_degree_bound <= n_cosets, || {
            format!(
                "the evaluation domain must contain at least {constraints_degree_bound} cosets"
            )
        })?;

        let evaluation_domain = EvaluationDomain::new(trace_length, n_cosets)?;
        let composition_eval_domain = Coset::new(
            trace_length * constraints_degree_bound,
            BaseFieldElement::generator(),
        )?;
        let fri_params =
            FriParameters::new(&config.fri, evaluation_domain.as_single_coset())?;
        // The low degree test must certify exactly "degree < trace length".
        ensure(
            params_fri_degree_bound(&fri_params) == trace_length,
            || "FRI parameters do not match the AIR parameters".to_string(),
        )?;

        Ok(Self {
            evaluation_domain,
            composition_eval_domain,
            fri_params,
            is_zero_knowledge: config.enable_zero_knowledge,
            constraint_polynomial_task_size: prover_config.constraint_polynomial_task_size,
        })
    }

    pub fn trace_length(&self) -> u64 {
        self.evaluation_domain.trace_size()
    }

    pub fn n_cosets(&self) -> u64 {
        self.evaluation_domain.num_cosets()
    }

    /// The committed trace width: the AIR columns plus the zero-knowledge
    /// extra column.
    pub fn n_committed_columns(&self, air: &dyn Air) -> usize {
        air.num_columns() + usize::from(self.is_zero_knowledge)
    }
}

fn params_fri_degree_bound(fri_params: &FriParameters) -> u64 {
    fri_params.last_layer_degree_bound << fri_params.total_reduction()
}

fn draw_coefficients<C: Channel>(
    channel: &mut C,
    n_coefficients: usize,
    annotation: &str,
) -> Result<Vec<ExtensionFieldElement>> {
    let mut coefficients = Vec::with_capacity(n_coefficients);
    for index in 0..n_coefficients {
        coefficients.push(channel.random_field_element(&format!("{annotation} #{index}"))?);
    }
    Ok(coefficients)
}

pub struct StarkProver<'a> {
    params: &'a StarkParameters,
    air: &'a dyn Air,
    /// Seeds the commitment salts when zero knowledge is enabled. Never
    /// reused for anything transcript-visible.
    salts_prng: Option<Prng>,
}

impl<'a> StarkProver<'a> {
    pub fn new(
        params: &'a StarkParameters,
        air: &'a dyn Air,
        salts_prng: Option<Prng>,
    ) -> Result<Self> {
        ensure(!params.is_zero_knowledge || salts_prng.is_some(), || {
            "zero knowledge proving requires a salts prng".to_string()
        })?;
        Ok(Self {
            params,
            air,
            salts_prng,
        })
    }

    fn fork_salts_prng(&self, tag: &[u8]) -> Option<Prng> {
        self.salts_prng.as_ref().map(|prng| {
            let mut fork = prng.clone();
            fork.mix_seed_with_bytes(tag);
            fork
        })
    }

    /// Generates a proof for the given trace into the channel transcript.
    pub fn prove(&self, trace: Trace, channel: &mut ProverChannel) -> Result<()> {
        let params = self.params;
        let air = self.air;
        let domain = &params.evaluation_domain;
        let trace_length = params.trace_length();
        let n_columns = params.n_committed_columns(air);
        ensure(trace.width() == n_columns, || {
            format!("trace has {} columns, expected {n_columns}", trace.width())
        })?;
        ensure(trace.length() as u64 == trace_length, || {
            format!(
                "trace length is {}, expected {trace_length}",
                trace.length()
            )
        })?;

        info!("proving a trace of {n_columns} columns over {trace_length} rows");
        channel.enter_annotation_scope("STARK");

        // Commit to the trace LDE.
        channel.enter_annotation_scope("Original");
        let trace_salts = self.fork_salts_prng(b"trace salts");
        let mut trace_prover = CommittedTraceProver::<BaseFieldElement>::new(
            domain,
            n_columns,
            params.is_zero_knowledge,
            trace_salts.as_ref(),
        )?;
        trace_prover.commit(trace, domain.trace_domain(), true, channel)?;
        channel.exit_annotation_scope();

        // Draw the constraint combination coefficients.
        channel.enter_annotation_scope("Constraint Coefficients");
        let coefficients =
            draw_coefficients(channel, air.num_random_coefficients(), COEFFICIENT_ANNOTATION)?;
        channel.exit_annotation_scope();

        let composition_polynomial =
            air.create_composition_polynomial(&domain.trace_generator(), &coefficients)?;
        let mut oracle = CompositionOracleProver::new(
            domain,
            &mut trace_prover,
            None,
            air.mask(),
            composition_polynomial,
        )?;
        let n_breaks = oracle.constraints_degree_bound();

        // Evaluate the composition polynomial over the first n_breaks
        // cosets and break it into trace-length columns.
        channel.enter_annotation_scope("Out Of Domain Sampling");
        let composition_evaluation =
            oracle.eval_composition(params.constraint_polynomial_task_size, n_breaks)?;
        let (composition_trace, composition_trace_domain) = oods::break_composition_polynomial(
            &composition_evaluation,
            n_breaks,
            &params.composition_eval_domain,
        )?;
        let composition_salts = self.fork_salts_prng(b"composition salts");
        let mut composition_prover = CommittedTraceProver::<ExtensionFieldElement>::new(
            domain,
            n_breaks as usize,
            params.is_zero_knowledge,
            composition_salts.as_ref(),
        )?;
        composition_prover.commit(
            composition_trace,
            &composition_trace_domain,
            false,
            channel,
        )?;

        // Sample out of domain and derive the boundary constraints of the
        // final virtual oracle.
        let boundary_constraints = oods::prove_oods(
            channel,
            &oracle,
            &composition_prover,
            trace_length,
            &domain.trace_generator(),
        )?;
        drop(oracle);

        let boundary_air = BoundaryAir::new(
            trace_length,
            n_columns + n_breaks as usize,
            n_columns,
            boundary_constraints,
        )?;
        let boundary_coefficients = draw_coefficients(
            channel,
            boundary_air.num_random_coefficients(),
            BOUNDARY_COEFFICIENT_ANNOTATION,
        )?;
        channel.exit_annotation_scope();

        let boundary_polynomial = boundary_air
            .create_composition_polynomial(&domain.trace_generator(), &boundary_coefficients)?;
        let mut boundary_oracle = CompositionOracleProver::new(
            domain,
            &mut trace_prover,
            Some(&mut composition_prover),
            boundary_air.mask(),
            boundary_polynomial,
        )?;

        // The FRI first layer is the boundary oracle over the whole domain.
        let fri_witness = boundary_oracle.eval_composition(
            params.constraint_polynomial_task_size,
            params.n_cosets(),
        )?;
        boundary_oracle.finalize_eval();

        channel.enter_annotation_scope("FRI");
        let trace_size = trace_length;
        let mut first_layer_callback =
            |channel: &mut ProverChannel, queries: &[u64]| -> Result<()> {
                let pairs: Vec<(u64, u64)> = queries
                    .iter()
                    .map(|query| (query / trace_size, query % trace_size))
                    .collect();
                boundary_oracle.decommit_queries(&pairs, channel)
            };
        fri::prove_fri(
            &params.fri_params,
            fri_witness,
            channel,
            &mut first_layer_callback,
        )?;
        channel.exit_annotation_scope();
        channel.exit_annotation_scope();
        info!("proof generation done ({} bytes)", channel.proof().len());
        Ok(())
    }
}

pub struct StarkVerifier<'a> {
    params: &'a StarkParameters,
    air: &'a dyn Air,
}

impl<'a> StarkVerifier<'a> {
    pub fn new(params: &'a StarkParameters, air: &'a dyn Air) -> Self {
        Self { params, air }
    }

    /// Replays the transcript, checking commitments, the out-of-domain
    /// sampling identity and the low degree test. Returns `Err` on any
    /// mismatch; the proof must end exactly at the last decommitment byte.
    pub fn verify(&self, channel: &mut VerifierChannel) -> Result<()> {
        let params = self.params;
        let air = self.air;
        let domain = &params.evaluation_domain;
        let trace_length = params.trace_length();
        let n_columns = params.n_committed_columns(air);

        channel.enter_annotation_scope("STARK");

        channel.enter_annotation_scope("Original");
        let mut trace_verifier = CommittedTraceVerifier::<BaseFieldElement>::new(
            domain,
            n_columns,
            params.is_zero_knowledge,
        )?;
        trace_verifier.read_commitment(channel)?;
        channel.exit_annotation_scope();

        channel.enter_annotation_scope("Constraint Coefficients");
        let coefficients =
            draw_coefficients(channel, air.num_random_coefficients(), COEFFICIENT_ANNOTATION)?;
        channel.exit_annotation_scope();

        let composition_polynomial =
            air.create_composition_polynomial(&domain.trace_generator(), &coefficients)?;
        let mut composition_verifier;
        let boundary_constraints;
        {
            let oracle = CompositionOracleVerifier::new(
                domain,
                &mut trace_verifier,
                None,
                air.mask(),
                composition_polynomial,
            )?;
            let n_breaks = oracle.constraints_degree_bound();

            channel.enter_annotation_scope("Out Of Domain Sampling");
            composition_verifier = CommittedTraceVerifier::<ExtensionFieldElement>::new(
                domain,
                n_breaks as usize,
                params.is_zero_knowledge,
            )?;
            composition_verifier.read_commitment(channel)?;

            boundary_constraints = oods::verify_oods(
                channel,
                &oracle,
                n_breaks,
                trace_length,
                &domain.trace_generator(),
            )?;
        }

        let n_breaks = composition_verifier.num_columns();
        let boundary_air = BoundaryAir::new(
            trace_length,
            n_columns + n_breaks,
            n_columns,
            boundary_constraints,
        )?;
        let boundary_coefficients = draw_coefficients(
            channel,
            boundary_air.num_random_coefficients(),
            BOUNDARY_COEFFICIENT_ANNOTATION,
        )?;
        channel.exit_annotation_scope();

        let boundary_polynomial = boundary_air
            .create_composition_polynomial(&domain.trace_generator(), &boundary_coefficients)?;
        let mut boundary_oracle = CompositionOracleVerifier::new(
            domain,
            &mut trace_verifier,
            Some(&mut composition_verifier),
            boundary_air.mask(),
            boundary_polynomial,
        )?;

        channel.enter_annotation_scope("FRI");
        let trace_size = trace_length;
        let mut first_layer_callback = |channel: &mut VerifierChannel,
                                        queries: &[u64]|
         -> Result<Vec<ExtensionFieldElement>> {
            let pairs: Vec<(u64, u64)> = queries
                .iter()
                .map(|query| (query / trace_size, query % trace_size))
                .collect();
            boundary_oracle.verify_decommitment(&pairs, channel)
        };
        fri::verify_fri(&params.fri_params, channel, &mut first_layer_callback)?;
        channel.exit_annotation_scope();
        channel.exit_annotation_scope();

        ensure_proof(channel.is_end_of_proof(), || {
            "proof contains excess bytes".to_string()
        })?;
        Ok(())
    }
}
