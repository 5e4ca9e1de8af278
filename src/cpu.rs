/*!
CPU capability detection (spec §6.2).

The SIMD kernels target a 256-bit-wide integer baseline (AVX2 + PCLMULQDQ
for the carry-less multiply used by [`crate::simd::quote_mask_and_bits`]).
Callers query [`supported_cpu`] before parsing; on unsupported hardware the
parser returns [`crate::Error::UnsupportedCpu`] rather than silently
degrading to a scalar fallback with very different throughput
characteristics.

Serialized documents ([`crate::codec`]) use no SIMD and can always be
deserialized, on any CPU.
*/

use std::sync::atomic::{AtomicU8, Ordering};

const UNCHECKED: u8 = 0;
const SUPPORTED: u8 = 1;
const UNSUPPORTED: u8 = 2;

static CACHED: AtomicU8 = AtomicU8::new(UNCHECKED);

/// Whether this process can use the vectorized parsing path.
///
/// The underlying feature probe only runs once; the result is process-wide
/// and read-only after that first check, matching spec §5's "no global
/// mutable state... a process-wide CPU-capability probe is read-only after
/// first access".
#[inline]
pub fn supported_cpu() -> bool {
    match CACHED.load(Ordering::Relaxed) {
        SUPPORTED => true,
        UNSUPPORTED => false,
        _ => {
            let supported = probe();
            CACHED.store(
                if supported { SUPPORTED } else { UNSUPPORTED },
                Ordering::Relaxed,
            );
            supported
        }
    }
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn probe() -> bool {
    is_x86_feature_detected!("avx2") && is_x86_feature_detected!("pclmulqdq")
}

#[cfg(target_arch = "aarch64")]
#[inline]
fn probe() -> bool {
    std::arch::is_aarch64_feature_detected!("neon")
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
fn probe() -> bool {
    false
}
