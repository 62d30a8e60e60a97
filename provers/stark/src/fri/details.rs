//! Query bookkeeping shared by the FRI prover and verifier.

use std::collections::BTreeSet;

use basalt_math::field::{ExtensionFieldElement, FieldElement};
use basalt_math::helpers::pow2;

use crate::channel::Channel;
use crate::commitment::RowCol;
use crate::errors::{ensure, Result};
use crate::fri::parameters::FriParameters;
use crate::fri::folder;

/// A layer element index split into its table cell: the row is the coset,
/// the column the position within it (`2^fri_step` wide).
pub fn table_row(query_index: u64, fri_step: u32) -> u64 {
    query_index >> fri_step
}

pub fn table_col(query_index: u64, fri_step: u32) -> u64 {
    query_index & (pow2(fri_step) - 1)
}

pub fn table_row_col(query_index: u64, fri_step: u32) -> RowCol {
    RowCol::new(table_row(query_index, fri_step), table_col(query_index, fri_step))
}

/// Computes the element of a later layer from a whole coset of the current
/// one, folding `fri_step_list[layer_num]` times with successively squared
/// evaluation points. `first_element_index` is the index of `elements[0]`
/// within the current layer.
pub fn apply_fri_layers(
    elements: &[ExtensionFieldElement],
    eval_point: Option<&ExtensionFieldElement>,
    params: &FriParameters,
    layer_num: usize,
    first_element_index: u64,
) -> Result<ExtensionFieldElement> {
    let cumulative_fri_step = params.cumulative_fri_step(0, layer_num);
    let layer_fri_step = params.fri_step_list[layer_num];
    ensure(elements.len() as u64 == pow2(layer_fri_step), || {
        "number of elements is not consistent with the fri_step parameter".to_string()
    })?;

    let mut current_layer = elements.to_vec();
    let mut current_eval_point = eval_point.copied();
    let mut first_element_index = first_element_index;
    for basis_index in cumulative_fri_step..cumulative_fri_step + layer_fri_step {
        let eval_point = current_eval_point.ok_or_else(|| {
            crate::errors::StarkError::InvariantViolation(
                "missing evaluation point for a folding step".to_string(),
            )
        })?;
        let basis = params.coset_for_layer(basis_index)?;
        let mut next_layer = Vec::with_capacity(current_layer.len() / 2);
        for j in (0..current_layer.len()).step_by(2) {
            next_layer.push(folder::next_layer_element_from_two_previous_layer_elements(
                &current_layer[j],
                &current_layer[j + 1],
                &eval_point,
                &basis.at_bit_reversed(first_element_index + j as u64),
            )?);
        }
        current_layer = next_layer;
        current_eval_point = Some(eval_point * eval_point);
        first_element_index /= 2;
    }
    ensure(current_layer.len() == 1, || {
        "expected the coset to fold to a single element".to_string()
    })?;
    Ok(current_layer[0])
}

/// Expands query indices (drawn over the first-fold domain) to the cosets
/// of the first layer they cover.
pub fn second_layer_queries_to_first_layer_queries(
    query_indices: &[u64],
    first_fri_step: u32,
) -> Vec<u64> {
    let coset_size = pow2(first_fri_step);
    let mut first_layer_queries = Vec::with_capacity(query_indices.len() * coset_size as usize);
    for index in query_indices {
        for expanded in index * coset_size..(index + 1) * coset_size {
            first_layer_queries.push(expanded);
        }
    }
    first_layer_queries
}

/// Splits the cells of layer `layer_num` touched by the queries into
/// *integrity* cells (the verifier folds them out of the previous layer)
/// and *data* cells (the rest of each touched coset, sent on the channel).
/// The two sets are disjoint.
pub fn next_layer_data_and_integrity_queries(
    query_indices: &[u64],
    params: &FriParameters,
    layer_num: usize,
) -> (BTreeSet<RowCol>, BTreeSet<RowCol>) {
    // Queries live in the second layer; shift them down to this layer.
    let cumulative_fri_step = params.cumulative_fri_step(1, layer_num);
    let layer_fri_step = params.fri_step_list[layer_num];

    let mut integrity_queries = BTreeSet::new();
    for index in query_indices {
        integrity_queries.insert(table_row_col(index >> cumulative_fri_step, layer_fri_step));
    }
    let mut data_queries = BTreeSet::new();
    for index in query_indices {
        let coset_row = table_row(index >> cumulative_fri_step, layer_fri_step);
        for coset_col in 0..pow2(layer_fri_step) {
            let query = RowCol::new(coset_row, coset_col);
            if !integrity_queries.contains(&query) {
                data_queries.insert(query);
            }
        }
    }
    (data_queries, integrity_queries)
}

/// Draws the query indices: proof of work first, then `n_queries` uniform
/// indices over the given domain, sorted ascending (duplicates kept).
pub fn choose_query_indices<C: Channel>(
    channel: &mut C,
    domain_size: u64,
    n_queries: usize,
    proof_of_work_bits: usize,
) -> Result<Vec<u64>> {
    channel.apply_proof_of_work(proof_of_work_bits)?;
    let mut query_indices = Vec::with_capacity(n_queries);
    channel.enter_annotation_scope("QueryIndices");
    for i in 0..n_queries {
        query_indices.push(channel.random_number(domain_size, &i.to_string())?);
    }
    channel.exit_annotation_scope();
    query_indices.sort_unstable();
    Ok(query_indices)
}
