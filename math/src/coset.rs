use crate::bit_reversal::{bit_reverse, bit_reverse_vector};
use crate::errors::MathError;
use crate::field::{BaseFieldElement, FieldElement};
use crate::helpers::{is_power_of_two, safe_log2};

/// Enumeration order of a multiplicative coset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupOrdering {
    Natural,
    BitReversed,
}

/// A coset `offset·⟨generator⟩` of a cyclic power-of-two subgroup of the
/// multiplicative group of the field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Coset {
    size: u64,
    generator: BaseFieldElement,
    offset: BaseFieldElement,
}

impl Coset {
    /// Creates the coset of the canonical subgroup of the given size.
    pub fn new(size: u64, offset: BaseFieldElement) -> Result<Self, MathError> {
        if !is_power_of_two(size) {
            return Err(MathError::NotPowerOfTwo(size));
        }
        Self::with_generator(size, BaseFieldElement::subgroup_generator(size)?, offset)
    }

    pub fn with_generator(
        size: u64,
        generator: BaseFieldElement,
        offset: BaseFieldElement,
    ) -> Result<Self, MathError> {
        if !is_power_of_two(size) {
            return Err(MathError::NotPowerOfTwo(size));
        }
        if offset.is_zero() {
            return Err(MathError::ZeroCosetOffset);
        }
        Ok(Self {
            size,
            generator,
            offset,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn log_size(&self) -> u32 {
        safe_log2(self.size)
    }

    pub fn generator(&self) -> BaseFieldElement {
        self.generator
    }

    pub fn offset(&self) -> BaseFieldElement {
        self.offset
    }

    /// The element at the given index in natural order: `offset·generator^idx`.
    pub fn at(&self, index: u64) -> BaseFieldElement {
        self.offset * self.generator.pow(index)
    }

    /// The element at the given index in bit-reversed order:
    /// `offset·generator^bit_reverse(idx)`.
    pub fn at_bit_reversed(&self, index: u64) -> BaseFieldElement {
        self.at(bit_reverse(index, self.log_size()))
    }

    /// The first `n_elements` elements in natural order.
    pub fn first_elements(&self, n_elements: usize) -> Vec<BaseFieldElement> {
        assert!(
            n_elements as u64 <= self.size,
            "the number of elements must not exceed the coset size"
        );
        let mut elements = Vec::with_capacity(n_elements);
        let mut point = self.offset;
        for _ in 0..n_elements {
            elements.push(point);
            point *= self.generator;
        }
        elements
    }

    /// All coset elements in the requested order.
    pub fn elements(&self, order: GroupOrdering) -> Vec<BaseFieldElement> {
        let natural = self.first_elements(self.size as usize);
        match order {
            GroupOrdering::Natural => natural,
            GroupOrdering::BitReversed => bit_reverse_vector(&natural),
        }
    }

    /// The coset of the `k`-th power map image, `{x^(2^log_folds) : x ∈ self}`:
    /// `2^log_folds` times smaller, with the canonical generator of its size.
    pub fn fold(&self, log_folds: u32) -> Result<Self, MathError> {
        assert!(
            log_folds <= self.log_size(),
            "cannot fold a coset below a single element"
        );
        let folds = 1u64 << log_folds;
        Self::new(self.size >> log_folds, self.offset.pow(folds))
    }

    /// The same coset with element-wise inverted generator and offset.
    pub fn inverse(&self) -> Result<Self, MathError> {
        Self::with_generator(
            self.size,
            self.generator.inverse()?,
            self.offset.inverse()?,
        )
    }
}
