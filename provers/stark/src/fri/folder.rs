//! One FRI folding step.
//!
//! Splitting the layer polynomial into even and odd parts,
//! `f(x) = g(x²) + x·h(x²)`, the next layer for evaluation point α is
//! `p = 2g + 2αh`, sampled via
//! `p(x²) = f(x) + f(−x) + α·(f(x) − f(−x))/x`.
//! The halving skips the division by two; the accumulated `2^step` factor
//! cancels out because the verifier compares against the transmitted
//! last-layer polynomial, which carries the same factor.

use basalt_math::bit_reversal::bit_reverse_vector;
use basalt_math::coset::Coset;
use basalt_math::field::{BaseFieldElement, ExtensionFieldElement, FieldElement};
use basalt_math::helpers::safe_div;

use crate::errors::{ensure, Result};

fn fold(
    f_x: &ExtensionFieldElement,
    f_minus_x: &ExtensionFieldElement,
    eval_point: &ExtensionFieldElement,
    x_inverse: &BaseFieldElement,
) -> ExtensionFieldElement {
    *f_x + *f_minus_x + *eval_point * (*f_x - *f_minus_x) * *x_inverse
}

/// Computes the next layer from a full layer evaluation (bit-reversed
/// order over `domain`); consecutive pairs `(2i, 2i+1)` hold `f(x)` and
/// `f(−x)`.
pub fn compute_next_fri_layer(
    domain: &Coset,
    values: &[ExtensionFieldElement],
    eval_point: &ExtensionFieldElement,
) -> Result<Vec<ExtensionFieldElement>> {
    ensure(values.len() as u64 == domain.size(), || {
        "values size does not match the domain size".to_string()
    })?;
    let half_size = safe_div(values.len() as u64, 2) as usize;

    // The inverses of the pair representatives x, ordered like the output:
    // x for pair i is offset·g^bit_reverse(i), so the inverse coset's first
    // half, bit-reversed, lines up.
    let inverse_domain = domain.inverse()?;
    let x_inverses = bit_reverse_vector(&inverse_domain.first_elements(half_size));

    Ok((0..half_size)
        .map(|i| fold(&values[2 * i], &values[2 * i + 1], eval_point, &x_inverses[i]))
        .collect())
}

/// A single folding step from the two preimages of a point, given `x`
/// itself (the first of the pair in bit-reversed order).
pub fn next_layer_element_from_two_previous_layer_elements(
    f_x: &ExtensionFieldElement,
    f_minus_x: &ExtensionFieldElement,
    eval_point: &ExtensionFieldElement,
    x: &BaseFieldElement,
) -> Result<ExtensionFieldElement> {
    Ok(fold(f_x, f_minus_x, eval_point, &x.inverse()?))
}
