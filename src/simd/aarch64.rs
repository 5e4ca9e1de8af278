/*!
NEON bit-mask kernels for `aarch64` (spec §4.A).

NEON has no direct equivalent to `x86`'s `movemask`, so byte classification
is done eight bytes at a time using [`crate::std_ext::arch::aarch64::vmovemask_u8`]
and assembled into the same `u64` layout the scalar and AVX2 kernels use.
There's no carry-less multiply on this baseline, so the prefix-XOR step
(`quote_mask_and_bits`) and the pseudo-structural carry arithmetic
(`finalize_structurals`) reuse the scalar bit-trick implementations directly
— they're already branch-free integer ops with nothing left to vectorize
profitably at 8-byte granularity.
*/

use std::arch::aarch64::*;

use super::QuoteMasks;
use crate::std_ext::arch::aarch64::vmovemask_u8;

// SAFETY: callers must ensure NEON is available.
#[target_feature(enable = "neon")]
#[inline]
unsafe fn byte_mask(window: &[u8], needle: u8) -> u64 {
    test_assert_eq!(64, window.len());

    let pat = vdup_n_u8(needle);
    let mut mask = 0u64;

    for chunk in 0..8 {
        let lane = vld1_u8(window.as_ptr().add(chunk * 8));
        let eq = vceq_u8(lane, pat);
        let bits = vmovemask_u8(eq) as u64;
        mask |= bits << (chunk * 8);
    }

    mask
}

// SAFETY: callers must ensure NEON is available.
#[target_feature(enable = "neon")]
#[inline]
unsafe fn control_char_mask(window: &[u8]) -> u64 {
    test_assert_eq!(64, window.len());

    let threshold = vdup_n_u8(0x20);
    let mut mask = 0u64;

    for chunk in 0..8 {
        let lane = vld1_u8(window.as_ptr().add(chunk * 8));
        let lt = vclt_u8(lane, threshold);
        let bits = vmovemask_u8(lt) as u64;
        mask |= bits << (chunk * 8);
    }

    mask
}

// SAFETY: callers must ensure NEON is available.
#[target_feature(enable = "neon")]
#[inline]
pub(crate) unsafe fn odd_backslash(window: &[u8], prev_ends_odd: &mut bool) -> u64 {
    let bs = byte_mask(window, b'\\');

    let prev = *prev_ends_odd as u64;
    let bs = bs & !prev;
    let follows_escape = (bs << 1) | prev;

    const EVEN_BITS: u64 = 0x5555_5555_5555_5555;
    let odd_starts = bs & !EVEN_BITS & !follows_escape;

    let (sum, carry) = odd_starts.overflowing_add(bs);
    *prev_ends_odd = carry;

    let invert_mask = sum << 1;
    let escaped = (EVEN_BITS ^ invert_mask) & follows_escape;

    escaped >> 1
}

// SAFETY: callers must ensure NEON is available.
#[target_feature(enable = "neon")]
#[inline]
pub(crate) unsafe fn quote_mask_and_bits(
    window: &[u8],
    odd_ends: u64,
    prev_iter_inside_quote: &mut u64,
) -> QuoteMasks {
    let quote_bits = byte_mask(window, b'"') & !odd_ends;

    let mut quote_mask = super::scalar::prefix_xor(quote_bits);
    quote_mask ^= *prev_iter_inside_quote;
    *prev_iter_inside_quote = (quote_mask as i64 >> 63) as u64;

    let error_mask = control_char_mask(window) & quote_mask;

    QuoteMasks {
        quote_bits,
        quote_mask,
        error_mask,
    }
}

// SAFETY: callers must ensure NEON is available.
#[target_feature(enable = "neon")]
#[inline]
pub(crate) unsafe fn whitespace_and_structurals(window: &[u8]) -> (u64, u64) {
    test_assert_eq!(64, window.len());

    let ws_space = vdup_n_u8(b' ');
    let ws_tab = vdup_n_u8(b'\t');
    let ws_nl = vdup_n_u8(b'\n');
    let ws_cr = vdup_n_u8(b'\r');

    let mut whitespace = 0u64;
    let mut structural = 0u64;

    for chunk in 0..8 {
        let lane = vld1_u8(window.as_ptr().add(chunk * 8));

        let is_ws = vorr_u8(
            vorr_u8(vceq_u8(lane, ws_space), vceq_u8(lane, ws_tab)),
            vorr_u8(vceq_u8(lane, ws_nl), vceq_u8(lane, ws_cr)),
        );
        whitespace |= (vmovemask_u8(is_ws) as u64) << (chunk * 8);

        // structural chars are classified byte-by-byte: there are only six
        // of them and NEON has no cheap 6-way parallel compare at this lane
        // width, so this falls back to scalar classification per lane.
        for i in 0..8 {
            let b = *get_unchecked!(window, chunk * 8 + i);
            if matches!(b, b'{' | b'}' | b'[' | b']' | b':' | b',') {
                structural |= 1 << (chunk * 8 + i);
            }
        }
    }

    (whitespace, structural)
}

#[inline]
pub(crate) fn finalize_structurals(
    structural: u64,
    whitespace: u64,
    quote_masks: &QuoteMasks,
    prev_ends_pseudo_pred: &mut bool,
) -> u64 {
    super::scalar::finalize_structurals(structural, whitespace, quote_masks, prev_ends_pseudo_pred)
}
