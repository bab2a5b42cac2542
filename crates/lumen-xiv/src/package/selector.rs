//! Selector arithmetic.
//!
//! A render node is addressed by a selector: a weighted sum of the hashes of
//! the key values it was built for, in wrapping `u32` arithmetic. Each
//! position is weighted by a power of [`SELECTOR_MULTIPLIER`].

use crate::Name;

pub const SELECTOR_MULTIPLIER: u32 = 31;

/// Modular inverse of [`SELECTOR_MULTIPLIER`], for undoing a weighting.
pub const SELECTOR_INVERSE_MULTIPLIER: u32 = 3_186_588_639;

/// Σ `values[i] · 31^i`.
pub fn build<I>(values: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    let mut selector = 0u32;
    let mut weight = 1u32;
    for value in values {
        selector = selector.wrapping_add(value.wrapping_mul(weight));
        weight = weight.wrapping_mul(SELECTOR_MULTIPLIER);
    }
    selector
}

/// Hash-weighted selector of a list of values.
pub fn build_from_names<'a, I>(values: I) -> u32
where
    I: IntoIterator<Item = &'a Name>,
{
    build(values.into_iter().map(|name| name.hash()))
}

/// Combine the per-scope selectors into a node selector.
pub fn node_selector(system: u32, scene: u32, material: u32, subview: u32) -> u32 {
    build([system, scene, material, subview])
}

pub fn subview_selector(subview_0: u32, subview_1: u32) -> u32 {
    build([subview_0, subview_1])
}

/// `31^exponent`, wrapping.
pub fn weight(exponent: usize) -> u32 {
    (0..exponent).fold(1u32, |weight, _| weight.wrapping_mul(SELECTOR_MULTIPLIER))
}
