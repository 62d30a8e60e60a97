//! The JSON parameters document shared by prover and verifier.

use basalt_math::helpers::is_power_of_two;
use serde::Deserialize;

use crate::errors::{Result, StarkError};

fn bad_config(message: impl Into<String>) -> StarkError {
    StarkError::BadConfig(message.into())
}

/// FRI section of the parameters document (`stark.fri`).
#[derive(Debug, Clone, Deserialize)]
pub struct FriConfig {
    /// Per-layer log2 reduction factors. The first entry may be zero; the
    /// rest must be in [1, 10].
    pub fri_step_list: Vec<u32>,
    /// Power of two in [1, 16384]; that many last-layer coefficients are
    /// sent verbatim.
    pub last_layer_degree_bound: u64,
    /// Number of FRI queries, in [1, 256].
    pub n_queries: usize,
    /// Proof-of-work difficulty applied before drawing queries, in [0, 50].
    pub proof_of_work_bits: usize,
}

impl FriConfig {
    pub fn validate(&self, log_trace_length: u32) -> Result<()> {
        if self.fri_step_list.is_empty() {
            return Err(bad_config("fri_step_list must not be empty"));
        }
        for (i, step) in self.fri_step_list.iter().enumerate() {
            if i > 0 && *step == 0 {
                return Err(bad_config(
                    "fri_step_list entries after the first must be at least 1",
                ));
            }
            if *step > 10 {
                return Err(bad_config(
                    "fri_step_list entries cannot be greater than 10",
                ));
            }
        }
        if !is_power_of_two(self.last_layer_degree_bound) || self.last_layer_degree_bound > 16384 {
            return Err(bad_config(
                "last_layer_degree_bound must be a power of two in [1, 2^14]",
            ));
        }
        let total_reduction: u32 = self.fri_step_list.iter().sum();
        if total_reduction + self.last_layer_degree_bound.trailing_zeros() != log_trace_length {
            return Err(bad_config(format!(
                "last_layer_degree_bound ({}) and FRI total reduction (2^{}) do not match the \
                 trace length (2^{})",
                self.last_layer_degree_bound, total_reduction, log_trace_length
            )));
        }
        if self.n_queries == 0 || self.n_queries > 256 {
            return Err(bad_config("n_queries must be in the range [1, 256]"));
        }
        if self.proof_of_work_bits > 50 {
            return Err(bad_config(
                "proof_of_work_bits must be in the range [0, 50]",
            ));
        }
        Ok(())
    }
}

/// The `stark` section of the parameters document.
#[derive(Debug, Clone, Deserialize)]
pub struct StarkConfig {
    pub log_n_cosets: u32,
    #[serde(default)]
    pub enable_zero_knowledge: bool,
    pub fri: FriConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct ParametersDocument {
    stark: StarkConfig,
}

impl StarkConfig {
    /// Parses the `stark` section out of a full parameters document.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: ParametersDocument =
            serde_json::from_str(json).map_err(|e| bad_config(e.to_string()))?;
        Ok(document.stark)
    }

    pub fn validate(&self, log_trace_length: u32) -> Result<()> {
        // The blowup must leave room for the composition degree; concrete
        // bounds are checked against the AIR when parameters are built.
        if self.log_n_cosets > 20 {
            return Err(bad_config("log_n_cosets is out of range"));
        }
        self.fri.validate(log_trace_length)
    }
}

fn default_task_size() -> u64 {
    256
}

/// Prover-only tuning knobs.
///
/// Evaluation of the composition polynomial on a coset is split into tasks
/// of `constraint_polynomial_task_size` points each for multithreading.
#[derive(Debug, Clone, Deserialize)]
pub struct ProverConfig {
    #[serde(default = "default_task_size")]
    pub constraint_polynomial_task_size: u64,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            constraint_polynomial_task_size: default_task_size(),
        }
    }
}

impl ProverConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| bad_config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_DOCUMENT: &str = r#"{
        "stark": {
            "log_n_cosets": 2,
            "enable_zero_knowledge": false,
            "fri": {
                "fri_step_list": [0, 2, 1],
                "last_layer_degree_bound": 32,
                "n_queries": 12,
                "proof_of_work_bits": 15
            }
        }
    }"#;

    #[test]
    fn parses_and_validates() {
        let config = StarkConfig::from_json(VALID_DOCUMENT).unwrap();
        assert_eq!(config.log_n_cosets, 2);
        assert!(!config.enable_zero_knowledge);
        assert_eq!(config.fri.fri_step_list, vec![0, 2, 1]);
        // 0 + 2 + 1 + log2(32) = 8.
        config.validate(8).unwrap();
    }

    #[test]
    fn step_sum_mismatch_is_rejected() {
        let config = StarkConfig::from_json(VALID_DOCUMENT).unwrap();
        assert!(matches!(
            config.validate(9),
            Err(StarkError::BadConfig(_))
        ));
    }

    #[test]
    fn zero_inner_step_is_rejected() {
        let mut config = StarkConfig::from_json(VALID_DOCUMENT).unwrap();
        config.fri.fri_step_list = vec![1, 0, 2];
        assert!(config.validate(8).is_err());
    }

    #[test]
    fn non_power_of_two_last_layer_is_rejected() {
        let mut config = StarkConfig::from_json(VALID_DOCUMENT).unwrap();
        config.fri.last_layer_degree_bound = 33;
        assert!(config.validate(8).is_err());
    }

    #[test]
    fn query_count_bounds() {
        let mut config = StarkConfig::from_json(VALID_DOCUMENT).unwrap();
        config.fri.n_queries = 0;
        assert!(config.validate(8).is_err());
        config.fri.n_queries = 257;
        assert!(config.validate(8).is_err());
    }

    #[test]
    fn prover_config_default_task_size() {
        let config = ProverConfig::from_json("{}").unwrap();
        assert_eq!(config.constraint_polynomial_task_size, 256);
        let config = ProverConfig::from_json(r#"{"constraint_polynomial_task_size": 64}"#).unwrap();
        assert_eq!(config.constraint_polynomial_task_size, 64);
    }
}
