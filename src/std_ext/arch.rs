/*!
Architecture-specific helpers that fill gaps in `std::arch`.
*/

#[cfg(target_arch = "aarch64")]
pub(crate) mod aarch64;
