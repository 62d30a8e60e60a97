use std::collections::BTreeMap;

use basalt_math::field::{BaseFieldElement, ExtensionFieldElement, FieldElement};

use crate::air::{Air, MaskEntry};
use crate::composition::CompositionPolynomial;
use crate::errors::{ensure, Result};

/// A single boundary condition: column `column_index` takes `value` at
/// `point`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundaryConstraint {
    pub column_index: usize,
    pub point: ExtensionFieldElement,
    pub value: ExtensionFieldElement,
}

/// The AIR produced by out-of-domain sampling: for each condition
/// `(c, x0, y0)` the rational constraint `(column_c(x) − y0)/(x − x0)`,
/// which is a polynomial exactly when the condition holds. The random
/// combination of all conditions has degree below the trace length, which
/// FRI then certifies.
pub struct BoundaryAir {
    trace_length: u64,
    n_columns: usize,
    constraints: Vec<BoundaryConstraint>,
    mask: Vec<MaskEntry>,
    /// For each constraint, the index of its column's value within the
    /// base-field or extension-field neighbor slice.
    constraint_neighbor_slots: Vec<(bool, usize)>,
}

impl BoundaryAir {
    /// `n_columns` counts the combined width (main trace then composition
    /// trace); `base_width` is where the composition-trace columns start.
    pub fn new(
        trace_length: u64,
        n_columns: usize,
        base_width: usize,
        constraints: Vec<BoundaryConstraint>,
    ) -> Result<Self> {
        ensure(!constraints.is_empty(), || {
            "at least one boundary constraint is required".to_string()
        })?;
        for constraint in &constraints {
            ensure(constraint.column_index < n_columns, || {
                format!("boundary column {} out of range", constraint.column_index)
            })?;
        }

        // One mask entry per distinct constrained column, ascending.
        let mut columns: Vec<usize> = constraints.iter().map(|c| c.column_index).collect();
        columns.sort_unstable();
        columns.dedup();
        let mask: Vec<MaskEntry> = columns.iter().map(|column| (0i64, *column)).collect();

        // Neighbor slices are split by trace side and keep mask order.
        let mut base_slot = 0;
        let mut extension_slot = 0;
        let mut column_slots = BTreeMap::new();
        for column in &columns {
            if *column < base_width {
                column_slots.insert(*column, (true, base_slot));
                base_slot += 1;
            } else {
                column_slots.insert(*column, (false, extension_slot));
                extension_slot += 1;
            }
        }
        let constraint_neighbor_slots = constraints
            .iter()
            .map(|constraint| column_slots[&constraint.column_index])
            .collect();

        Ok(Self {
            trace_length,
            n_columns,
            constraints,
            mask,
            constraint_neighbor_slots,
        })
    }

    pub fn constraints(&self) -> &[BoundaryConstraint] {
        &self.constraints
    }
}

impl Air for BoundaryAir {
    fn trace_length(&self) -> u64 {
        self.trace_length
    }

    fn num_columns(&self) -> usize {
        self.n_columns
    }

    fn num_random_coefficients(&self) -> usize {
        2 * self.constraints.len()
    }

    fn mask(&self) -> Vec<MaskEntry> {
        self.mask.clone()
    }

    fn composition_polynomial_degree_bound(&self) -> u64 {
        self.trace_length
    }

    fn create_composition_polynomial<'a>(
        &'a self,
        trace_generator: &BaseFieldElement,
        random_coefficients: &[ExtensionFieldElement],
    ) -> Result<CompositionPolynomial<'a>> {
        CompositionPolynomial::new(
            self,
            trace_generator,
            self.trace_length,
            Vec::new(),
            random_coefficients,
            Vec::new(),
            Vec::new(),
        )
    }

    fn constraints_eval(
        &self,
        neighbors: &[ExtensionFieldElement],
        composition_neighbors: &[ExtensionFieldElement],
        _periodic_values: &[ExtensionFieldElement],
        random_coefficients: &[ExtensionFieldElement],
        point_powers: &[ExtensionFieldElement],
        _shifts: &[BaseFieldElement],
    ) -> Result<ExtensionFieldElement> {
        let point = point_powers[0];
        let mut result = ExtensionFieldElement::zero();
        for (j, constraint) in self.constraints.iter().enumerate() {
            let (is_base, slot) = self.constraint_neighbor_slots[j];
            let column_value = if is_base {
                neighbors[slot]
            } else {
                composition_neighbors[slot]
            };
            // Each summand is degree-adjusted by one: constraint degree
            // L-2 after division, bound L.
            let degree_adjustment =
                random_coefficients[2 * j] + random_coefficients[2 * j + 1] * point;
            let numerator = column_value - constraint.value;
            let denominator = point - constraint.point;
            result += degree_adjustment * numerator * denominator.inverse()?;
        }
        Ok(result)
    }
}
