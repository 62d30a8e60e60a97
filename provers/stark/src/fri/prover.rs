use basalt_math::field::{ExtensionFieldElement, FieldElement};
use basalt_math::helpers::pow2;
use basalt_math::lde::LdeManager;
use log::info;

use crate::channel::{Channel, ProverChannel};
use crate::commitment::{make_commitment_scheme_prover, TableProver};
use crate::errors::{ensure, Result, StarkError};
use crate::fri::details;
use crate::fri::layer::FriLayer;
use crate::fri::parameters::FriParameters;

/// Sends whatever the verifier needs to evaluate the queried first-layer
/// positions and authenticates it. The STARK integration decommits its
/// virtual oracle here.
pub type FirstLayerCallback<'c> = dyn FnMut(&mut ProverChannel, &[u64]) -> Result<()> + 'c;

/// A committed FRI layer, ready for decommitment: either the caller's
/// first-layer callback, or a table commitment over a materialized layer.
enum FriCommittedLayer {
    Callback,
    Table {
        layer_num: usize,
        /// log2 of the committed row width (the next group's step).
        fri_step: u32,
        layer: FriLayer,
        table_prover: TableProver<ExtensionFieldElement>,
    },
}

impl FriCommittedLayer {
    fn decommit(
        &mut self,
        queries: &[u64],
        params: &FriParameters,
        first_layer_callback: &mut FirstLayerCallback<'_>,
        channel: &mut ProverChannel,
    ) -> Result<()> {
        match self {
            FriCommittedLayer::Callback => first_layer_callback(
                channel,
                &details::second_layer_queries_to_first_layer_queries(
                    queries,
                    params.fri_step_list[0],
                ),
            ),
            FriCommittedLayer::Table {
                layer_num,
                fri_step,
                layer,
                table_prover,
            } => {
                let (data_queries, integrity_queries) =
                    details::next_layer_data_and_integrity_queries(queries, params, *layer_num);
                let rows =
                    table_prover.start_decommitment_phase(&data_queries, &integrity_queries)?;

                // Column j of the table reads every 2^fri_step-th element.
                let row_width = pow2(*fri_step);
                let mut columns_data = Vec::with_capacity(row_width as usize);
                for col in 0..row_width {
                    let indices: Vec<u64> =
                        rows.iter().map(|row| row * row_width + col).collect();
                    columns_data.push(layer.eval_at_indices(&indices)?);
                }
                let spans: Vec<&[ExtensionFieldElement]> =
                    columns_data.iter().map(|c| c.as_slice()).collect();
                table_prover.decommit(&spans, channel)
            }
        }
    }
}

/// Creates the table commitment for one materialized inner layer.
fn commit_layer(
    layer_num: usize,
    next_fri_step: u32,
    evaluation: &[ExtensionFieldElement],
    domain: &basalt_math::coset::Coset,
    channel: &mut ProverChannel,
) -> Result<FriCommittedLayer> {
    let row_width = pow2(next_fri_step);
    let n_rows = evaluation.len() as u64 / row_width;
    let commitment_scheme = make_commitment_scheme_prover(
        row_width as usize * ExtensionFieldElement::SIZE_IN_BYTES,
        n_rows,
        1,
        false,
        None,
    )?;
    let mut table_prover = TableProver::new(row_width as usize, commitment_scheme);
    table_prover.add_segment_for_commitment(&[evaluation], 0, row_width as usize)?;
    table_prover.commit(channel)?;
    Ok(FriCommittedLayer::Table {
        layer_num,
        fri_step: next_fri_step,
        layer: FriLayer::new_real(evaluation.to_vec(), domain.clone())?,
        table_prover,
    })
}

/// Runs the FRI protocol to prove that the witness (the first-layer
/// evaluation, bit-reversed over the parameters' domain) has degree below
/// `last_layer_degree_bound · 2^(Σ fri steps)`.
pub fn prove_fri(
    params: &FriParameters,
    witness: Vec<ExtensionFieldElement>,
    channel: &mut ProverChannel,
    first_layer_callback: &mut FirstLayerCallback<'_>,
) -> Result<()> {
    ensure(witness.len() as u64 == params.domain.size(), || {
        "witness should be an evaluation on the entire domain".to_string()
    })?;
    let n_layers = params.n_layers();
    info!("FRI commit phase over {n_layers} layers");

    let mut committed_layers = vec![FriCommittedLayer::Callback];

    // Commitment phase.
    channel.enter_annotation_scope("Commitment");
    let mut current_layer = FriLayer::new_real(witness, params.domain.clone())?;
    for layer_num in 1..=n_layers {
        let fri_step = params.fri_step_list[layer_num - 1];
        ensure(layer_num == 1 || fri_step != 0, || {
            "only the first layer may have fri_step = 0".to_string()
        })?;
        channel.enter_annotation_scope(format!("Layer {layer_num}"));
        if fri_step > 0 {
            let mut eval_point = channel.receive_field_element("Evaluation point")?;
            for _ in 0..fri_step {
                current_layer = FriLayer::new_proxy(current_layer, eval_point)?;
                eval_point = eval_point * eval_point;
            }
        }
        current_layer = current_layer.into_real()?;

        if layer_num < n_layers {
            let evaluation = current_layer.get_layer()?;
            committed_layers.push(commit_layer(
                layer_num,
                params.fri_step_list[layer_num],
                &evaluation,
                current_layer.domain(),
                channel,
            )?);
        }
        channel.exit_annotation_scope();
    }
    channel.exit_annotation_scope();

    // Last layer: transmit the interpolation coefficients instead of
    // committing.
    channel.enter_annotation_scope("Last Layer");
    let last_layer_coset = params.coset_for_layer(params.total_reduction())?;
    let mut lde_manager = LdeManager::new(last_layer_coset, false);
    lde_manager.add_evaluation(current_layer.get_layer()?)?;
    let degree = lde_manager.evaluation_degree(0);
    let degree_bound = params.last_layer_degree_bound;
    if degree >= degree_bound as i64 {
        return Err(StarkError::InvariantViolation(format!(
            "last FRI layer is of degree {degree}, expected degree < {degree_bound}"
        )));
    }
    channel.send_field_element_span(
        &lde_manager.coefficients(0)[..degree_bound as usize],
        "Coefficients",
    )?;
    channel.exit_annotation_scope();

    // Query phase.
    let queries = details::choose_query_indices(
        channel,
        params.layer_domain_size(params.fri_step_list[0]),
        params.n_queries,
        params.proof_of_work_bits,
    )?;
    // From here on no party may derive fresh randomness.
    channel.begin_query_phase();

    // Decommitment phase.
    info!("FRI decommitment for {} queries", queries.len());
    channel.enter_annotation_scope("Decommitment");
    for (index, layer) in committed_layers.iter_mut().enumerate() {
        channel.enter_annotation_scope(format!("Layer {index}"));
        layer.decommit(&queries, params, first_layer_callback, channel)?;
        channel.exit_annotation_scope();
    }
    channel.exit_annotation_scope();
    Ok(())
}
