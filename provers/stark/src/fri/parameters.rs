use basalt_math::coset::Coset;
use basalt_math::helpers::safe_log2;

use crate::config::FriConfig;
use crate::errors::{ensure, Result};

/// The FRI protocol parameters, shared verbatim by prover and verifier.
#[derive(Clone, Debug)]
pub struct FriParameters {
    /// Per-layer log2 reduction factors; layer `i` folds `2^fri_step_list[i]`
    /// times. A step of 0 is allowed only for the first layer (the STARK
    /// integration commits that layer through its own oracle).
    pub fri_step_list: Vec<u32>,
    /// The prover sends this many last-layer coefficients verbatim instead
    /// of continuing to fold.
    pub last_layer_degree_bound: u64,
    pub n_queries: usize,
    /// The evaluation domain of the first layer.
    pub domain: Coset,
    pub proof_of_work_bits: usize,
}

impl FriParameters {
    pub fn new(config: &FriConfig, domain: Coset) -> Result<Self> {
        let params = Self {
            fri_step_list: config.fri_step_list.clone(),
            last_layer_degree_bound: config.last_layer_degree_bound,
            n_queries: config.n_queries,
            domain,
            proof_of_work_bits: config.proof_of_work_bits,
        };
        ensure(
            params.total_reduction() <= safe_log2(params.domain.size()),
            || "FRI reduces below a single element".to_string(),
        )?;
        Ok(params)
    }

    pub fn n_layers(&self) -> usize {
        self.fri_step_list.len()
    }

    pub fn total_reduction(&self) -> u32 {
        self.fri_step_list.iter().sum()
    }

    /// The domain of the layer after `idx` halvings: `2^idx` times smaller,
    /// offset raised to the `2^idx`-th power.
    pub fn coset_for_layer(&self, idx: u32) -> Result<Coset> {
        Ok(self.domain.fold(idx)?)
    }

    /// The size of the layer after `idx` halvings.
    pub fn layer_domain_size(&self, idx: u32) -> u64 {
        assert!(
            idx <= safe_log2(self.domain.size()),
            "invalid layer index"
        );
        self.domain.size() >> idx
    }

    /// Sum of the steps of layers before `layer_num`, skipping the first
    /// `skip_layers` entries.
    pub fn cumulative_fri_step(&self, skip_layers: usize, layer_num: usize) -> u32 {
        self.fri_step_list[skip_layers..layer_num].iter().sum()
    }
}
