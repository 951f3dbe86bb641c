//! Snapshot block codec.
//!
//! A machine state is difference-encoded against its predecessor first and
//! deflated second. Consecutive frames differ in few bytes, so the XOR output
//! is mostly zero and deflates far better than either raw buffer.
//!
//! ## Block format
//!
//! ```text
//! +------------------+
//! | Raw length       |  u32 little-endian
//! +------------------+
//! | Deflate stream   |  miniz_oxide, raw deflate
//! +------------------+
//! ```
//!
//! Blocks only ever live in memory, so the layout carries no magic or
//! version. A block that fails to inflate was not produced by [`compress`]
//! and is treated as a broken invariant.

/// Size of the raw-length header in front of each deflate stream.
const HEADER_LEN: usize = 4;

/// Deflate `raw` into a length-prefixed block.
pub fn compress(raw: &[u8], level: u8) -> Vec<u8> {
    let deflated = miniz_oxide::deflate::compress_to_vec(raw, level.min(10));
    let mut out = Vec::with_capacity(HEADER_LEN + deflated.len());
    out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
    out.extend_from_slice(&deflated);
    out
}

/// Raw length recorded in a block header.
pub fn raw_len(block: &[u8]) -> usize {
    assert!(block.len() >= HEADER_LEN, "snapshot block truncated ({} bytes)", block.len());
    u32::from_le_bytes([block[0], block[1], block[2], block[3]]) as usize
}

/// Inflate a block produced by [`compress`].
///
/// # Panics
///
/// If the block is corrupt or inflates to a different length than recorded.
pub fn decompress(block: &[u8]) -> Vec<u8> {
    let expected = raw_len(block);
    // One byte of slack so an exact-size stream still reaches its end marker
    let limit = expected.saturating_add(1);
    let raw = match miniz_oxide::inflate::decompress_to_vec_with_limit(&block[HEADER_LEN..], limit) {
        Ok(raw) => raw,
        Err(e) => panic!("snapshot block failed to inflate: {:?}", e.status),
    };
    assert_eq!(raw.len(), expected, "snapshot block inflated to wrong length");
    raw
}

/// XOR `src` into `dst` byte-wise.
///
/// # Panics
///
/// If the buffers differ in length. The machine's serialized size must not
/// change while history exists.
#[inline]
pub fn xor_into(dst: &mut [u8], src: &[u8]) {
    assert_eq!(
        dst.len(),
        src.len(),
        "XOR length mismatch: machine state size changed from {} to {} bytes",
        src.len(),
        dst.len()
    );
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= *s;
    }
}

/// Encode a machine state. Returns the block and whether it is a full state.
///
/// With no predecessor the block is the deflated state itself; otherwise it
/// is the deflated XOR of `state` and `prev`.
pub fn encode(state: &[u8], prev: Option<&[u8]>, level: u8) -> (Vec<u8>, bool) {
    match prev {
        None => (compress(state, level), true),
        Some(prev) => {
            let mut diff = state.to_vec();
            xor_into(&mut diff, prev);
            (compress(&diff, level), false)
        }
    }
}

/// Apply a delta block onto `state`, turning the predecessor into the
/// successor (or back again, XOR being its own inverse).
pub fn apply_delta(state: &mut [u8], block: &[u8]) {
    let diff = decompress(block);
    xor_into(state, &diff);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_state_passthrough() {
        let state: Vec<u8> = (0..=255).collect();
        let (block, full) = encode(&state, None, 1);
        assert!(full);
        assert_eq!(raw_len(&block), 256);
        assert_eq!(decompress(&block), state);
    }

    #[test]
    fn test_xor_round_trip() {
        let a: Vec<u8> = (0..512u32).map(|i| (i * 7) as u8).collect();
        let mut b = a.clone();
        b[3] ^= 0x55;
        b[400] = 0;
        let (block, full) = encode(&b, Some(&a), 1);
        assert!(!full);
        let mut restored = a.clone();
        apply_delta(&mut restored, &block);
        assert_eq!(restored, b);
        // And back again
        apply_delta(&mut restored, &block);
        assert_eq!(restored, a);
    }

    #[test]
    fn test_delta_smaller_than_full() {
        let mut seed = 0x2545_f491_4f6c_dd1du64;
        let a: Vec<u8> = (0..4096)
            .map(|_| {
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (seed >> 56) as u8
            })
            .collect();
        let mut b = a.clone();
        b[100] ^= 1;
        let (full, _) = encode(&b, None, 1);
        let (delta, _) = encode(&b, Some(&a), 1);
        assert!(delta.len() < full.len() / 4);
    }

    #[test]
    fn test_empty_state() {
        let (block, _) = encode(&[], None, 6);
        assert!(decompress(&block).is_empty());
    }

    #[test]
    #[should_panic(expected = "XOR length mismatch")]
    fn test_length_mismatch_panics() {
        encode(&[1, 2, 3], Some(&[1, 2]), 1);
    }

    #[test]
    #[should_panic]
    fn test_corrupt_block_panics() {
        let mut block = compress(&[9u8; 64], 1);
        let last = block.len() - 1;
        block.truncate(last - 2);
        decompress(&block);
    }
}
