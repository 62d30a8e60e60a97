use log::error;

use crate::errors::Result;

/// Runs a verifier entry point and converts any failure into `false`,
/// logging the reason. The user boundary sees a boolean; everything inside
/// works with `Result`.
pub fn false_on_error(verification: impl FnOnce() -> Result<()>) -> bool {
    match verification() {
        Ok(()) => true,
        Err(error) => {
            error!("verification failed: {error}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StarkError;

    #[test]
    fn converts_results_to_booleans() {
        assert!(false_on_error(|| Ok(())));
        assert!(!false_on_error(|| Err(StarkError::InvalidProof(
            "mismatch".to_string()
        ))));
        assert!(!false_on_error(|| Err(StarkError::TranscriptExhausted)));
    }
}
