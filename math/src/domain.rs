use crate::bit_reversal::{bit_reverse, bit_reverse_vector};
use crate::coset::Coset;
use crate::errors::MathError;
use crate::field::{BaseFieldElement, FieldElement};
use crate::helpers::{is_power_of_two, safe_log2};

/// The evaluation domain of the protocol: the trace domain (the canonical
/// subgroup of size `trace_size`, offset 1) together with `n_cosets`
/// disjoint cosets of it whose offsets are `h·G^i`, where `G` generates the
/// subgroup of size `trace_size·n_cosets` and `h` is the multiplicative
/// generator of the field.
///
/// Enumerating coset `q` (offsets taken in bit-reversed order) in
/// bit-reversed order and concatenating over `q` yields exactly the
/// bit-reversed enumeration of `Coset(trace_size·n_cosets, h)`. The
/// commitment layout and the FRI first layer both rely on this identity.
#[derive(Clone, Debug)]
pub struct EvaluationDomain {
    trace_domain: Coset,
    group_generator: BaseFieldElement,
    coset_offsets: Vec<BaseFieldElement>,
}

impl EvaluationDomain {
    pub fn new(trace_size: u64, n_cosets: u64) -> Result<Self, MathError> {
        if !is_power_of_two(trace_size) {
            return Err(MathError::NotPowerOfTwo(trace_size));
        }
        if !is_power_of_two(n_cosets) {
            return Err(MathError::NotPowerOfTwo(n_cosets));
        }
        let group_generator = BaseFieldElement::subgroup_generator(trace_size * n_cosets)?;
        let base_offset = BaseFieldElement::generator();
        let mut coset_offsets = Vec::with_capacity(n_cosets as usize);
        let mut offset = base_offset;
        for _ in 0..n_cosets {
            coset_offsets.push(offset);
            offset *= group_generator;
        }
        Ok(Self {
            trace_domain: Coset::new(trace_size, BaseFieldElement::one())?,
            group_generator,
            coset_offsets,
        })
    }

    pub fn trace_size(&self) -> u64 {
        self.trace_domain.size()
    }

    pub fn num_cosets(&self) -> u64 {
        self.coset_offsets.len() as u64
    }

    /// Total number of points, `trace_size · n_cosets`.
    pub fn size(&self) -> u64 {
        self.trace_size() * self.num_cosets()
    }

    pub fn trace_domain(&self) -> &Coset {
        &self.trace_domain
    }

    pub fn trace_generator(&self) -> BaseFieldElement {
        self.trace_domain.generator()
    }

    /// The coset offsets in natural order, `h·G^i`.
    pub fn coset_offsets(&self) -> &[BaseFieldElement] {
        &self.coset_offsets
    }

    /// The coset offsets in the commitment layout order (bit-reversed).
    pub fn coset_offsets_bit_reversed(&self) -> Vec<BaseFieldElement> {
        bit_reverse_vector(&self.coset_offsets)
    }

    /// The whole domain as a single coset of size `trace_size·n_cosets`.
    pub fn as_single_coset(&self) -> Coset {
        Coset::new(self.size(), BaseFieldElement::generator())
            .expect("domain sizes are validated at construction")
    }

    /// The domain point at position `offset_in_coset` of coset
    /// `coset_index`, both in the commitment (bit-reversed) layout.
    pub fn element_at(&self, coset_index: u64, offset_in_coset: u64) -> BaseFieldElement {
        let n_cosets = self.num_cosets();
        let trace_size = self.trace_size();
        assert!(coset_index < n_cosets, "coset index out of range");
        assert!(offset_in_coset < trace_size, "offset out of range");
        let coset_offset =
            self.coset_offsets[bit_reverse(coset_index, safe_log2(n_cosets)) as usize];
        coset_offset
            * self
                .trace_generator()
                .pow(bit_reverse(offset_in_coset, safe_log2(trace_size)))
    }
}
