//! DXBC container digest.
//!
//! The digest is the MD5 compression function (from the `md-5` crate) run
//! over the container body, but with a proprietary finalisation: the bit
//! length is stored in a different position than standard MD5 puts it, and
//! an extra `(bits >> 2) | 1` word closes the stream. The output is the raw
//! state registers, without MD5's usual length block.

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 16;

const BLOCK_LEN: usize = 64;

const INITIAL_STATE: [u32; 4] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476];

fn output(state: &[u32; 4]) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    for (chunk, value) in out.chunks_exact_mut(4).zip(state) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    out
}

/// Compute the digest of `data`, normally the container bytes from offset
/// 0x14 up to its declared size.
pub fn calculate(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut state = INITIAL_STATE;

    let body = data.chunks_exact(BLOCK_LEN);
    let last = body.remainder();
    let mut block = [0u8; BLOCK_LEN];
    for chunk in body {
        block.copy_from_slice(chunk);
        md5::block_api::compress(&mut state, std::slice::from_ref(&block));
    }

    // The length is stored as a 32-bit bit count, so it wraps like the
    // reference implementation does for inputs of 512 MiB and more.
    let bits = (data.len() as u32).wrapping_shl(3);
    let closing = (bits >> 2) | 1;

    let mut tail = [[0u8; BLOCK_LEN]; 2];
    let blocks = if last.len() >= 56 {
        tail[0][..last.len()].copy_from_slice(last);
        tail[0][last.len()] = 0x80;
        tail[1][..4].copy_from_slice(&bits.to_le_bytes());
        tail[1][BLOCK_LEN - 4..].copy_from_slice(&closing.to_le_bytes());
        &tail[..]
    } else {
        tail[0][..4].copy_from_slice(&bits.to_le_bytes());
        tail[0][4..4 + last.len()].copy_from_slice(last);
        tail[0][4 + last.len()] = 0x80;
        tail[0][BLOCK_LEN - 4..].copy_from_slice(&closing.to_le_bytes());
        &tail[..1]
    };
    md5::block_api::compress(&mut state, blocks);

    output(&state)
}

/// Check `data` against a stored digest.
pub fn verify(data: &[u8], digest: &[u8; DIGEST_LEN]) -> bool {
    calculate(data) == *digest
}

/// Lowercase hex rendering used in diagnostics.
pub fn to_hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn test_compression_matches_md5() {
        // Standard MD5 of "abc" through the same compression function and
        // state layout, with standard padding.
        let mut block = [0u8; 64];
        block[..3].copy_from_slice(b"abc");
        block[3] = 0x80;
        block[56] = 24;

        let mut state = INITIAL_STATE;
        md5::block_api::compress(&mut state, &[block]);
        assert_eq!(to_hex(&output(&state)), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_short_tail_branch() {
        assert_eq!(to_hex(&calculate(&[])), "140d60f6b775e2ba4e4abed401b2e9a1");
        assert_eq!(to_hex(&calculate(&ramp(3))), "5aa7853c51e4677dc7c828e6a7a97221");
        assert_eq!(to_hex(&calculate(&ramp(64))), "f42eb06ca921c878e435e3b8d4f92b13");
        assert_eq!(to_hex(&calculate(&ramp(100))), "afe2674615db54e14ce65f0dcf3504f4");
        assert_eq!(to_hex(&calculate(&ramp(130))), "b56c3cec1878beca5fa02cd6401be624");
    }

    #[test]
    fn test_long_tail_branch() {
        assert_eq!(to_hex(&calculate(&ramp(56))), "00f9cc964ff2ec81959d4a3f092ce63f");
        assert_eq!(to_hex(&calculate(&ramp(60))), "d98a05681c6f0439ba5a8dab5efe1853");
    }

    #[test]
    fn test_verify() {
        let data = ramp(77);
        let digest = calculate(&data);
        assert!(verify(&data, &digest));
        assert!(!verify(&data[1..], &digest));
    }
}
