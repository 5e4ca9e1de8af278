/*!
Structural indexer: Stage 1 (spec §4.B).

Walks the input in 64-byte strides, running the [`crate::simd`] kernels over
each window and threading their carries across stride boundaries. The tail
(less than 64 bytes remaining) is copied into a zero-padded scratch buffer so
no kernel ever reads past the input (spec §9 "padding").

Per spec §9 ("the production parser rejects unsupported CPUs rather than
degrading silently"), this never falls back to [`crate::simd::scalar`] —
that module exists purely as a test oracle. A CPU that doesn't meet
[`crate::cpu::supported_cpu`]'s baseline gets [`crate::error::Error::UnsupportedCpu`].
*/

use crate::error::Error;
use crate::indexslot::{IndexSlot, SlotPool};
use crate::simd::{self, Carries, BLOCK_SIZE};

/// Emit every structural/pseudo-structural delta found in `input` to `emit`,
/// in source order (spec §4.A `flatten_bits_incremental`).
fn scan_with_sink(input: &[u8], mut emit: impl FnMut(u32)) -> Result<(), Error> {
    if !crate::cpu::supported_cpu() {
        return Err(Error::UnsupportedCpu);
    }

    let mut carries = Carries::default();
    let mut last_pos: i64 = -1;
    let mut any_structural = false;
    let mut deltas: Vec<u32> = Vec::with_capacity(16);

    let len = input.len();
    let mut pos = 0usize;

    while pos < len {
        let remaining = len - pos;

        let final_mask = if remaining >= BLOCK_SIZE {
            let window = &input[pos..pos + BLOCK_SIZE];
            // SAFETY: `supported_cpu()` verified the required feature set.
            unsafe { process_block(window, &mut carries) }
                .map_err(|(tz, byte)| Error::ControlCharacterInString {
                    offset: pos + tz,
                    byte,
                })?
        } else {
            // up to 128 bytes of zero-padded scratch past the logical end of
            // input (spec §9 "padding"); only the first 64 are a real window.
            let mut scratch = [0u8; 128];
            scratch[..remaining].copy_from_slice(&input[pos..]);
            // SAFETY: `supported_cpu()` verified the required feature set.
            let mask = unsafe { process_block(&scratch[..BLOCK_SIZE], &mut carries) }
                .map_err(|(tz, byte)| Error::ControlCharacterInString {
                    offset: pos + tz,
                    byte,
                })?;
            // zero padding bytes past the real input must never be reported
            // as structural/pseudo-structural positions.
            mask & ((1u64 << remaining) - 1)
        };

        if final_mask != 0 {
            any_structural = true;
        }

        deltas.clear();
        simd::flatten_bits_incremental(final_mask, pos, &mut last_pos, &mut deltas);
        for &d in &deltas {
            emit(d);
        }

        pos += BLOCK_SIZE;
    }

    if carries.prev_iter_inside_quote != 0 {
        return Err(Error::UnterminatedString { offset: len });
    }

    if !any_structural {
        return Err(Error::InvalidSyntax { offset: 0 });
    }

    Ok(())
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,pclmulqdq")]
unsafe fn process_block(window: &[u8], carries: &mut Carries) -> Result<u64, (usize, u8)> {
    use crate::simd::x86_64;

    let odd = x86_64::odd_backslash(window, &mut carries.prev_ends_odd_backslash);
    let masks = x86_64::quote_mask_and_bits(window, odd << 1, &mut carries.prev_iter_inside_quote);

    if masks.error_mask != 0 {
        let tz = masks.error_mask.trailing_zeros() as usize;
        return Err((tz, window[tz]));
    }

    let (ws, st) = x86_64::whitespace_and_structurals(window);
    Ok(x86_64::finalize_structurals(st, ws, &masks, &mut carries.prev_ends_pseudo_pred))
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
unsafe fn process_block(window: &[u8], carries: &mut Carries) -> Result<u64, (usize, u8)> {
    use crate::simd::aarch64;

    let odd = aarch64::odd_backslash(window, &mut carries.prev_ends_odd_backslash);
    let masks = aarch64::quote_mask_and_bits(window, odd << 1, &mut carries.prev_iter_inside_quote);

    if masks.error_mask != 0 {
        let tz = masks.error_mask.trailing_zeros() as usize;
        return Err((tz, window[tz]));
    }

    let (ws, st) = aarch64::whitespace_and_structurals(window);
    Ok(aarch64::finalize_structurals(st, ws, &masks, &mut carries.prev_ends_pseudo_pred))
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
unsafe fn process_block(_window: &[u8], _carries: &mut Carries) -> Result<u64, (usize, u8)> {
    // `cpu::supported_cpu()` is unconditionally `false` on these targets, so
    // `scan_with_sink` always returns `UnsupportedCpu` before this is called.
    unreachable!("no supported SIMD baseline on this architecture")
}

/// Reconstruct absolute byte offsets from the deltas [`scan_with_sink`]
/// emits (the inverse of [`crate::simd::flatten_bits_incremental`]).
fn resolve_positions(deltas: &[u32]) -> Vec<usize> {
    let mut last: i64 = -1;
    deltas
        .iter()
        .map(|&d| {
            last += d as i64;
            last as usize
        })
        .collect()
}

/// Scan the whole of `input` and return the absolute structural/pseudo-
/// structural byte offsets in source order. Used by the serial fallback
/// path for small inputs (spec §5) and directly by tests.
pub(crate) fn scan_to_positions(input: &[u8]) -> Result<Vec<usize>, Error> {
    let mut deltas = Vec::new();
    scan_with_sink(input, |d| deltas.push(d))?;
    Ok(resolve_positions(&deltas))
}

/// Scan `input`, publishing filled [`IndexSlot`]s to `tx` as they fill (spec
/// §3.4/§5). Used by the concurrent two-worker pipeline.
pub(crate) fn scan_into_channel(
    input: &[u8],
    pool: &mut SlotPool,
    tx: &crossbeam_channel::Sender<IndexSlot>,
) -> Result<(), Error> {
    let mut slot = pool.take();

    let result = scan_with_sink(input, |d| {
        slot.push(d);
        if slot.is_full() {
            let full = std::mem::replace(&mut slot, pool.take());
            // a closed receiver means Stage 2 already gave up; nothing left
            // to do but stop publishing.
            let _ = tx.send(full);
        }
    });

    if !slot.is_empty() {
        let _ = tx.send(slot);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_manual_structural_scan() {
        let input = br#"{"a":"b","c":[1,2,true,null]}"#;
        let positions = scan_to_positions(input).unwrap();

        // every position should land on a byte that's either a structural
        // character or the start of a string/number/atom.
        for &p in &positions {
            let b = input[p];
            assert!(
                matches!(
                    b,
                    b'{' | b'}' | b'[' | b']' | b':' | b',' | b'"' | b't' | b'n' | b'-' | b'0'..=b'9'
                ),
                "unexpected structural byte {:?} at {p}",
                b as char
            );
        }
        assert!(!positions.is_empty());
    }

    #[test]
    fn rejects_unterminated_string() {
        let input = br#"{"a":"b"#;
        assert!(scan_to_positions(input).is_err());
    }

    #[test]
    fn rejects_empty_input() {
        assert!(scan_to_positions(b"").is_err());
        assert!(scan_to_positions(b"   ").is_err());
    }

    #[test]
    fn rejects_control_character_in_string() {
        let input = b"\"a\x01b\"";
        assert!(matches!(
            scan_to_positions(input),
            Err(Error::ControlCharacterInString { .. })
        ));
    }

    #[test]
    fn handles_input_spanning_multiple_blocks() {
        let mut input = Vec::new();
        input.push(b'[');
        for i in 0..40 {
            if i > 0 {
                input.push(b',');
            }
            input.extend_from_slice(b"1");
        }
        input.push(b']');
        // input is well over one 64-byte block
        assert!(input.len() > BLOCK_SIZE);

        let positions = scan_to_positions(&input).unwrap();
        assert_eq!(positions.first(), Some(&0));
        assert_eq!(*positions.last().unwrap(), input.len() - 1);
    }
}
