/*!
Run-time configuration for the parser and serializer (spec §6.5).

Compile-time toggles (the `checked` debug-assertion mode used throughout
[`crate::macros`]) live in `build.rs` instead, since they change which code
is emitted rather than how the parser behaves at a given call site.
*/

/// The default maximum container nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Options that control how a document is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Force every string to be copied into the string buffer, even when its
    /// raw source bytes could be aliased directly.
    ///
    /// Defaults to `true`: it makes the resulting [`crate::ParsedDocument`]
    /// independent of the input buffer's lifetime, which is the footgun most
    /// callers don't want to reason about.
    pub copy_strings: bool,

    /// Upper bound on nested container depth (spec §3.2).
    pub max_depth: usize,

    /// Diagnostic switch: parse numbers using the host's standard library
    /// float/int parsing instead of the SIMD-adjacent fast path in
    /// [`crate::number`]. Semantics are unchanged within representable
    /// range; this exists to isolate regressions to one code path or the
    /// other during development.
    pub use_language_number_parser: bool,

    /// Compression mode used only by [`crate::codec`].
    pub compress_mode: CompressMode,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            copy_strings: true,
            max_depth: DEFAULT_MAX_DEPTH,
            use_language_number_parser: false,
            compress_mode: CompressMode::Default,
        }
    }
}

/// Compression mode for [`crate::codec::serialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressMode {
    /// Store blocks raw, uncompressed.
    None,
    /// Favor speed: the `lz4_flex` general-purpose block compressor.
    Fast,
    /// The recommended balance of speed and ratio.
    #[default]
    Default,
    /// Favor ratio: `zstd` at its highest compression level.
    Best,
}
