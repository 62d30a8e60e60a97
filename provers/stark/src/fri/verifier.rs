use std::collections::BTreeMap;

use basalt_math::field::{ExtensionFieldElement, FieldElement};
use basalt_math::helpers::pow2;
use basalt_math::polynomial::horner_eval;
use log::info;

use crate::channel::{Channel, VerifierChannel};
use crate::commitment::{make_commitment_scheme_verifier, RowCol, TableVerifier};
use crate::errors::{ensure_proof, Result, StarkError};
use crate::fri::details;
use crate::fri::parameters::FriParameters;

/// Returns the values of the queried first-layer positions, verifying the
/// prover's decommitments along the way.
pub type FirstLayerCallback<'c> =
    dyn FnMut(&mut VerifierChannel, &[u64]) -> Result<Vec<ExtensionFieldElement>> + 'c;

/// Runs the FRI verifier. Fails with `InvalidProof` on any inconsistency.
pub fn verify_fri(
    params: &FriParameters,
    channel: &mut VerifierChannel,
    first_layer_callback: &mut FirstLayerCallback<'_>,
) -> Result<()> {
    let n_layers = params.n_layers();
    info!("FRI verification over {n_layers} layers");

    // Commitment phase: collect evaluation points and table commitments.
    let mut eval_points: Vec<Option<ExtensionFieldElement>> = Vec::with_capacity(n_layers);
    let mut table_verifiers: Vec<TableVerifier<ExtensionFieldElement>> = Vec::new();
    channel.enter_annotation_scope("Commitment");
    for layer_num in 1..=n_layers {
        let fri_step = params.fri_step_list[layer_num - 1];
        ensure_proof(layer_num == 1 || fri_step != 0, || {
            "only the first layer may have fri_step = 0".to_string()
        })?;
        channel.enter_annotation_scope(format!("Layer {layer_num}"));
        if fri_step > 0 {
            eval_points.push(Some(
                channel.get_and_send_random_field_element("Evaluation point")?,
            ));
        } else {
            eval_points.push(None);
        }
        if layer_num < n_layers {
            let row_width = pow2(params.fri_step_list[layer_num]);
            let layer_size =
                params.layer_domain_size(params.cumulative_fri_step(0, layer_num));
            let commitment_scheme = make_commitment_scheme_verifier(
                row_width as usize * ExtensionFieldElement::SIZE_IN_BYTES,
                layer_size / row_width,
                false,
            )?;
            let mut table_verifier =
                TableVerifier::new(row_width as usize, commitment_scheme);
            table_verifier.read_commitment(channel)?;
            table_verifiers.push(table_verifier);
        }
        channel.exit_annotation_scope();
    }
    channel.exit_annotation_scope();

    // Last layer coefficients.
    channel.enter_annotation_scope("Last Layer");
    let last_layer_coefficients = channel
        .receive_field_element_span(params.last_layer_degree_bound as usize, "Coefficients")?;
    channel.exit_annotation_scope();

    // Query phase.
    let first_fri_step = params.fri_step_list[0];
    let queries = details::choose_query_indices(
        channel,
        params.layer_domain_size(first_fri_step),
        params.n_queries,
        params.proof_of_work_bits,
    )?;
    channel.begin_query_phase();

    channel.enter_annotation_scope("Decommitment");

    // First layer: get the witness values through the callback and fold
    // each queried coset once.
    let mut query_results = channel.scope("Layer 0", |channel| -> Result<Vec<_>> {
        let first_layer_queries =
            details::second_layer_queries_to_first_layer_queries(&queries, first_fri_step);
        let witness_values = first_layer_callback(channel, &first_layer_queries)?;
        ensure_proof(witness_values.len() == first_layer_queries.len(), || {
            "first layer callback returned the wrong number of values".to_string()
        })?;
        let coset_size = pow2(first_fri_step) as usize;
        queries
            .iter()
            .enumerate()
            .map(|(i, _)| {
                details::apply_fri_layers(
                    &witness_values[i * coset_size..(i + 1) * coset_size],
                    eval_points[0].as_ref(),
                    params,
                    0,
                    first_layer_queries[i * coset_size],
                )
            })
            .collect()
    })?;

    // Inner layers: authenticate each table against the locally-computed
    // integrity cells, then fold onwards.
    for layer_num in 1..n_layers {
        channel.enter_annotation_scope(format!("Layer {layer_num}"));
        let fri_step = params.fri_step_list[layer_num];
        let cumulative_fri_step = params.cumulative_fri_step(1, layer_num);
        let (data_queries, integrity_queries) =
            details::next_layer_data_and_integrity_queries(&queries, params, layer_num);

        let mut all_cells = table_verifiers[layer_num - 1].query(
            &data_queries,
            &integrity_queries,
            channel,
        )?;
        for (query, result) in queries.iter().zip(&query_results) {
            let element_index = query >> cumulative_fri_step;
            let cell = details::table_row_col(element_index, fri_step);
            if let Some(existing) = all_cells.get(&cell) {
                // Duplicate queries must agree with themselves.
                ensure_proof(existing == result, || {
                    "conflicting integrity values".to_string()
                })?;
            }
            all_cells.insert(cell, *result);
        }
        if !table_verifiers[layer_num - 1].verify_decommitment(&all_cells, channel)? {
            return Err(StarkError::InvalidProof(format!(
                "FRI layer {layer_num} decommitment does not match the commitment"
            )));
        }

        query_results = fold_cosets(
            &queries,
            &all_cells,
            eval_points[layer_num].as_ref(),
            params,
            layer_num,
            cumulative_fri_step,
            fri_step,
        )?;
        channel.exit_annotation_scope();
    }
    channel.exit_annotation_scope();

    // Last layer: the transmitted polynomial must reproduce the folded
    // values.
    let last_layer_coset = params.coset_for_layer(params.total_reduction())?;
    let last_layer_cumulative = params.cumulative_fri_step(1, n_layers);
    for (query, result) in queries.iter().zip(&query_results) {
        let index = query >> last_layer_cumulative;
        let point = ExtensionFieldElement::from(last_layer_coset.at_bit_reversed(index));
        let expected = horner_eval(&point, &last_layer_coefficients);
        ensure_proof(expected == *result, || {
            "FRI last layer evaluation mismatch".to_string()
        })?;
    }
    Ok(())
}

/// Folds each queried coset of layer `layer_num` to its element in the
/// next committed layer.
fn fold_cosets(
    queries: &[u64],
    all_cells: &BTreeMap<RowCol, ExtensionFieldElement>,
    eval_point: Option<&ExtensionFieldElement>,
    params: &FriParameters,
    layer_num: usize,
    cumulative_fri_step: u32,
    fri_step: u32,
) -> Result<Vec<ExtensionFieldElement>> {
    let row_width = pow2(fri_step);
    queries
        .iter()
        .map(|query| {
            let element_index = query >> cumulative_fri_step;
            let row = details::table_row(element_index, fri_step);
            let coset: Vec<ExtensionFieldElement> = (0..row_width)
                .map(|col| {
                    all_cells
                        .get(&RowCol::new(row, col))
                        .copied()
                        .ok_or_else(|| {
                            StarkError::InvalidProof("missing layer cell".to_string())
                        })
                })
                .collect::<Result<_>>()?;
            details::apply_fri_layers(&coset, eval_point, params, layer_num, row * row_width)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use basalt_crypto::fiat_shamir::Prng;
    use basalt_math::coset::{Coset, GroupOrdering};
    use basalt_math::field::element::{random_element_vector, random_nonzero_element};
    use basalt_math::field::BaseFieldElement;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    use super::*;
    use crate::channel::ProverChannel;
    use crate::config::FriConfig;
    use crate::fri::prover::prove_fri;

    const CHANNEL_SEED: &[u8] = b"fri end to end";

    /// Evaluates a random polynomial of the given degree bound over the
    /// domain in bit-reversed order.
    fn witness_of_degree(
        rng: &mut StdRng,
        degree_bound: usize,
        domain: &Coset,
    ) -> Vec<ExtensionFieldElement> {
        let mut coefficients: Vec<ExtensionFieldElement> =
            random_element_vector(rng, degree_bound);
        // Pin the leading coefficient away from zero so the degree is
        // exactly degree_bound - 1.
        while coefficients[degree_bound - 1].is_zero() {
            coefficients[degree_bound - 1] = ExtensionFieldElement::random(rng);
        }
        domain
            .elements(GroupOrdering::BitReversed)
            .iter()
            .map(|x| horner_eval(&ExtensionFieldElement::from(*x), &coefficients))
            .collect()
    }

    fn make_params(
        fri_step_list: Vec<u32>,
        last_layer_degree_bound: u64,
        log_domain: u32,
        offset: BaseFieldElement,
    ) -> FriParameters {
        FriParameters::new(
            &FriConfig {
                fri_step_list,
                last_layer_degree_bound,
                n_queries: 4,
                proof_of_work_bits: 9,
            },
            Coset::new(pow2(log_domain), offset).unwrap(),
        )
        .unwrap()
    }

    fn prove(params: &FriParameters, witness: Vec<ExtensionFieldElement>) -> Result<Vec<u8>> {
        let mut channel = ProverChannel::new(Prng::from_seed(CHANNEL_SEED));
        // The first layer data travels out of band in these tests; the
        // verifier-side callback reads it from the shared witness.
        let mut callback = |_channel: &mut ProverChannel, _queries: &[u64]| Ok(());
        prove_fri(params, witness, &mut channel, &mut callback)?;
        Ok(channel.into_proof())
    }

    fn verify(
        params: &FriParameters,
        proof: Vec<u8>,
        eval_domain_data: &[ExtensionFieldElement],
    ) -> Result<()> {
        let mut channel = VerifierChannel::new(Prng::from_seed(CHANNEL_SEED), proof);
        let data = eval_domain_data.to_vec();
        let mut callback = move |_channel: &mut VerifierChannel, queries: &[u64]| {
            Ok(queries.iter().map(|q| data[*q as usize]).collect())
        };
        verify_fri(params, &mut channel, &mut callback)
    }

    #[rstest]
    #[case::zero_first_step(vec![0, 2, 1, 4], 3)]
    #[case::plain_steps(vec![2, 1, 4], 3)]
    #[case::large_steps(vec![0, 4, 3], 3)]
    #[case::three_layers(vec![2, 3, 1], 5)]
    fn fri_end_to_end(#[case] fri_step_list: Vec<u32>, #[case] last_layer_degree_bound: u64) {
        let mut rng = StdRng::seed_from_u64(221);
        let offset: BaseFieldElement = random_nonzero_element(&mut rng);
        let total_reduction: u32 = fri_step_list.iter().sum();
        let degree_bound = (last_layer_degree_bound as usize) << total_reduction;
        let params = make_params(fri_step_list, last_layer_degree_bound, 10, offset);

        let witness = witness_of_degree(&mut rng, degree_bound, &params.domain);
        let proof = prove(&params, witness.clone()).unwrap();
        verify(&params, proof, &witness).unwrap();
    }

    #[test]
    fn too_large_degree_fails_at_the_prover() {
        let mut rng = StdRng::seed_from_u64(222);
        let offset: BaseFieldElement = random_nonzero_element(&mut rng);
        let params = make_params(vec![2, 3, 1], 5, 10, offset);
        // One extra coefficient beyond 5·2^6 = 320.
        let witness = witness_of_degree(&mut rng, 321, &params.domain);
        let error = prove(&params, witness.clone()).unwrap_err();
        assert!(error.to_string().contains("last FRI layer is of degree"));
    }

    #[test]
    fn proof_corruption_fails_verification() {
        let mut rng = StdRng::seed_from_u64(223);
        let offset: BaseFieldElement = random_nonzero_element(&mut rng);
        let params = make_params(vec![2, 3, 1], 5, 10, offset);
        let witness = witness_of_degree(&mut rng, 320, &params.domain);
        let proof = prove(&params, witness.clone()).unwrap();
        verify(&params, proof.clone(), &witness).unwrap();

        let mut corrupted = proof;
        let index = rng.gen_range(0..corrupted.len());
        corrupted[index] ^= 1 << rng.gen_range(0..8);
        assert!(verify(&params, corrupted, &witness).is_err());
    }

    #[test]
    fn wrong_witness_values_fail_verification() {
        let mut rng = StdRng::seed_from_u64(224);
        let offset: BaseFieldElement = random_nonzero_element(&mut rng);
        let params = make_params(vec![1, 2], 4, 7, offset);
        let witness = witness_of_degree(&mut rng, 32, &params.domain);
        let proof = prove(&params, witness.clone()).unwrap();

        let tampered: Vec<ExtensionFieldElement> = witness
            .iter()
            .map(|value| *value + ExtensionFieldElement::one())
            .collect();
        assert!(verify(&params, proof, &tampered).is_err());
    }
}
