pub mod boundary;
pub mod cubic_sequence;
pub mod trace;

pub use boundary::{BoundaryAir, BoundaryConstraint};
pub use trace::{CompositionTrace, Trace, TraceBase};

use basalt_math::field::{BaseFieldElement, ExtensionFieldElement};

use crate::composition::CompositionPolynomial;
use crate::errors::Result;

/// A mask entry: (relative row, column index). The columns a constraint
/// reads at trace point `x` are `column[c]` at `x·g^row`.
pub type MaskEntry = (i64, usize);

/// An algebraic intermediate representation: the constraint system a valid
/// trace satisfies. The engine consumes AIRs only through this interface;
/// the statement layer provides concrete implementations. `Sync` because
/// coset evaluation calls `constraints_eval` from worker threads.
pub trait Air: Sync {
    /// The length of the trace, a power of two (already including any
    /// zero-knowledge slackness).
    fn trace_length(&self) -> u64;

    /// The number of main-trace columns (excluding the zero-knowledge extra
    /// column, which the AIR never reads).
    fn num_columns(&self) -> usize;

    /// The number of random coefficients the verifier draws, two per
    /// constraint.
    fn num_random_coefficients(&self) -> usize;

    /// The neighborhood of cells the constraints read at each point.
    fn mask(&self) -> Vec<MaskEntry>;

    /// The degree bound of the composition polynomial, a power-of-two
    /// multiple of the trace length.
    fn composition_polynomial_degree_bound(&self) -> u64;

    /// Builds the composition polynomial for the given verifier-chosen
    /// coefficients. The returned object borrows this AIR.
    fn create_composition_polynomial<'a>(
        &'a self,
        trace_generator: &BaseFieldElement,
        random_coefficients: &[ExtensionFieldElement],
    ) -> Result<CompositionPolynomial<'a>>;

    /// Evaluates the random linear combination of the constraints at one
    /// point, given the mask values and auxiliary precomputations:
    /// * `neighbors` / `composition_neighbors` - mask values drawn from the
    ///   main and composition traces, in mask order.
    /// * `periodic_values` - the AIR's periodic columns at the point.
    /// * `point_powers` - `point` followed by `point^e` for each exponent
    ///   the AIR registered with its composition polynomial.
    /// * `shifts` - precomputed trace-generator powers.
    #[allow(clippy::too_many_arguments)]
    fn constraints_eval(
        &self,
        neighbors: &[ExtensionFieldElement],
        composition_neighbors: &[ExtensionFieldElement],
        periodic_values: &[ExtensionFieldElement],
        random_coefficients: &[ExtensionFieldElement],
        point_powers: &[ExtensionFieldElement],
        shifts: &[BaseFieldElement],
    ) -> Result<ExtensionFieldElement>;
}
