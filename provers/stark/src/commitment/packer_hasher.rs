use std::collections::{BTreeMap, BTreeSet};

use basalt_crypto::hash::{Blake2s256Digest, DIGEST_NUM_BYTES};
use basalt_math::helpers::{div_ceil, is_power_of_two, log2_ceil, pow2};

use crate::errors::{ensure, Result};

/// Packs small elements into hash-sized packages: `n_elements_in_package`
/// consecutive elements are concatenated and hashed into one 32-byte leaf.
#[derive(Debug, Clone)]
pub struct PackerHasher {
    pub size_of_element: usize,
    pub n_elements_in_package: u64,
    pub n_packages: u64,
}

/// The package size targets two digests worth of bytes: the smallest
/// power-of-two element count that fills 64 bytes, capped by the total
/// element count.
fn compute_n_elements_in_package(size_of_element: usize, max_n_elements: u64) -> u64 {
    assert!(size_of_element > 0, "an element must be at least one byte");
    let size_of_package = 2 * DIGEST_NUM_BYTES;
    if size_of_element >= size_of_package {
        return 1;
    }
    let elements_fit_in_package = div_ceil(size_of_package as u64, size_of_element as u64);
    u64::min(pow2(log2_ceil(elements_fit_in_package)), max_n_elements)
}

impl PackerHasher {
    pub fn new(size_of_element: usize, n_elements: u64) -> Result<Self> {
        ensure(is_power_of_two(n_elements), || {
            format!("total number of elements ({n_elements}) must be a power of 2")
        })?;
        let n_elements_in_package = compute_n_elements_in_package(size_of_element, n_elements);
        Ok(Self {
            size_of_element,
            n_elements_in_package,
            n_packages: n_elements / n_elements_in_package,
        })
    }

    /// Hashes a contiguous run of whole packages into consecutive digests.
    pub fn pack_and_hash(&self, data: &[u8]) -> Vec<u8> {
        if data.is_empty() {
            return Vec::new();
        }
        let package_bytes = self.size_of_element * self.n_elements_in_package as usize;
        assert!(
            data.len() % package_bytes == 0,
            "data must contain whole packages"
        );
        let mut hashes = Vec::with_capacity(data.len() / package_bytes * DIGEST_NUM_BYTES);
        for package in data.chunks(package_bytes) {
            hashes.extend_from_slice(Blake2s256Digest::hash_bytes(package).as_bytes());
        }
        hashes
    }

    /// All element indices belonging to the given packages.
    pub fn elements_in_packages(&self, packages: &[u64]) -> Vec<u64> {
        let mut elements = Vec::with_capacity(packages.len() * self.n_elements_in_package as usize);
        for package in packages {
            for element in
                package * self.n_elements_in_package..(package + 1) * self.n_elements_in_package
            {
                elements.push(element);
            }
        }
        elements
    }

    /// The complement of `elements_known` within the packages it touches:
    /// the elements that must travel over the channel before the package
    /// hashes can be recomputed.
    pub fn elements_required_to_compute_hashes(
        &self,
        elements_known: &BTreeSet<u64>,
    ) -> Result<Vec<u64>> {
        let mut packages = BTreeSet::new();
        for element in elements_known {
            let package = element / self.n_elements_in_package;
            ensure(package < self.n_packages, || {
                format!("query {element} out of range")
            })?;
            packages.insert(package);
        }
        let all_packages_elements =
            self.elements_in_packages(&packages.into_iter().collect::<Vec<_>>());
        Ok(all_packages_elements
            .into_iter()
            .filter(|element| !elements_known.contains(element))
            .collect())
    }

    /// Packs a map of element bytes into a map of package hashes. Every
    /// touched package must be fully present.
    pub fn pack_and_hash_map(
        &self,
        elements: &BTreeMap<u64, Vec<u8>>,
    ) -> Result<BTreeMap<u64, Vec<u8>>> {
        let mut packages = BTreeSet::new();
        for element in elements.keys() {
            packages.insert(element / self.n_elements_in_package);
        }
        let mut hashed_packages = BTreeMap::new();
        for package in packages {
            let mut packed =
                Vec::with_capacity(self.size_of_element * self.n_elements_in_package as usize);
            for element in
                package * self.n_elements_in_package..(package + 1) * self.n_elements_in_package
            {
                let element_data = elements.get(&element).ok_or_else(|| {
                    crate::errors::StarkError::InvariantViolation(format!(
                        "element {element} is missing from its package"
                    ))
                })?;
                ensure(element_data.len() == self.size_of_element, || {
                    "element size mismatches the one declared".to_string()
                })?;
                packed.extend_from_slice(element_data);
            }
            hashed_packages.insert(
                package,
                Blake2s256Digest::hash_bytes(&packed).as_bytes().to_vec(),
            );
        }
        Ok(hashed_packages)
    }
}
