/*!
Literal atom validation (spec §4.E): `true`, `false`, `null`.

Each is matched with a single word-sized comparison when enough trailing
bytes remain in the input, falling back to a byte-by-byte compare near the
end of the buffer. Either way the byte immediately after the literal must be
structural or whitespace, same as numbers (spec §4.D/§4.E share this rule).
*/

use crate::error::Error;

#[inline]
fn is_structural_or_whitespace(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'\t' | b'\n' | b'\r' | b'{' | b'}' | b'[' | b']' | b':' | b','
    )
}

#[inline]
fn trailing_ok(input: &[u8], len: usize) -> bool {
    match input.get(len) {
        None => true,
        Some(&b) => is_structural_or_whitespace(b),
    }
}

/// Validate a `true` literal starting at `input[0]`. Returns the byte count
/// consumed (always 4) on success.
#[inline]
pub(crate) fn parse_true(input: &[u8]) -> Result<usize, Error> {
    const WORD: u32 = u32::from_le_bytes(*b"true");

    let matches = if input.len() >= 4 {
        u32::from_le_bytes([input[0], input[1], input[2], input[3]]) == WORD
    } else {
        input == b"true"
    };

    if matches && trailing_ok(input, 4) {
        Ok(4)
    } else {
        Err(Error::InvalidSyntax { offset: 0 })
    }
}

/// Validate a `false` literal starting at `input[0]`. Returns the byte count
/// consumed (always 5) on success.
#[inline]
pub(crate) fn parse_false(input: &[u8]) -> Result<usize, Error> {
    let matches = input.len() >= 5 && &input[..5] == b"false";

    if matches && trailing_ok(input, 5) {
        Ok(5)
    } else {
        Err(Error::InvalidSyntax { offset: 0 })
    }
}

/// Validate a `null` literal starting at `input[0]`. Returns the byte count
/// consumed (always 4) on success.
#[inline]
pub(crate) fn parse_null(input: &[u8]) -> Result<usize, Error> {
    const WORD: u32 = u32::from_le_bytes(*b"null");

    let matches = if input.len() >= 4 {
        u32::from_le_bytes([input[0], input[1], input[2], input[3]]) == WORD
    } else {
        input == b"null"
    };

    if matches && trailing_ok(input, 4) {
        Ok(4)
    } else {
        Err(Error::InvalidSyntax { offset: 0 })
    }
}
