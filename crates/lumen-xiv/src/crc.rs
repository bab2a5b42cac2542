//! CRC32 hashing as used for shader names.
//!
//! This is the reflected IEEE polynomial with the final inversion dropped:
//! the result is the complement of the usual CRC-32. Dropping the inversion
//! makes hashes chainable, since `crc32_with_seed(b, !crc32_with_seed(a, s))`
//! equals `crc32_with_seed(a ++ b, s)`.

/// Seed for hashing a whole name.
pub const NAME_SEED: u32 = 0xFFFF_FFFF;

/// CRC32 of `data`, continuing from `seed`.
#[inline]
pub fn crc32_with_seed(data: &[u8], seed: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(seed);
    hasher.update(data);
    !hasher.finalize()
}

/// CRC32 of `data` with a zero seed.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32_with_seed(data, 0)
}

/// Hash of a name, as stored in ShCd and ShPk files.
#[inline]
pub fn name_hash(s: &str) -> u32 {
    crc32_with_seed(s.as_bytes(), NAME_SEED)
}
