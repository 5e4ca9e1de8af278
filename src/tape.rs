/*!
The tape word format (spec §3.1) and the Stage 2 tape builder (spec §4.F).

A tape is a flat `Vec<u64>`. Each word is an 8-bit tag in the high byte and a
56-bit payload in the low bits — see [`encode_word`]/[`decode_word`]. The
builder walks a list of structural byte offsets (produced by
[`crate::stage1`]) and an explicit, non-recursive state machine, so document
depth is bounded by [`crate::config::ParserConfig::max_depth`] rather than
the host call stack (spec §9 "flat scope stack").
*/

use crate::config::ParserConfig;
use crate::error::Error;
use crate::scope::{Discriminator, ScopeStack};
use crate::{atom, number, string};

pub(crate) const TAG_ROOT: u8 = b'r';
pub(crate) const TAG_OBJECT_OPEN: u8 = b'{';
pub(crate) const TAG_OBJECT_CLOSE: u8 = b'}';
pub(crate) const TAG_ARRAY_OPEN: u8 = b'[';
pub(crate) const TAG_ARRAY_CLOSE: u8 = b']';
pub(crate) const TAG_STRING: u8 = b'"';
pub(crate) const TAG_INT: u8 = b'l';
pub(crate) const TAG_UINT: u8 = b'u';
pub(crate) const TAG_DOUBLE: u8 = b'd';
pub(crate) const TAG_NULL: u8 = b'n';
pub(crate) const TAG_TRUE: u8 = b't';
pub(crate) const TAG_FALSE: u8 = b'f';
/// Not part of the closed tag set the spec documents; written in place of a
/// deleted object member by [`crate::document`]'s mutation API so forward
/// iteration can skip it without rewriting the tape. Payload is the span
/// length in tape words.
pub(crate) const TAG_NOP: u8 = b'_';

const PAYLOAD_BITS: u32 = 56;
const PAYLOAD_MASK: u64 = (1u64 << PAYLOAD_BITS) - 1;
/// High bit of the 56-bit payload field, set on a `"` tag's payload when it
/// points into the string buffer rather than the source message (spec §3.3).
pub(crate) const STRING_COPIED_BIT: u64 = 1 << (PAYLOAD_BITS - 1);

#[inline]
pub(crate) fn encode_word(tag: u8, payload: u64) -> u64 {
    test_assert!(payload & !PAYLOAD_MASK == 0, "payload overflows 56 bits");
    ((tag as u64) << PAYLOAD_BITS) | (payload & PAYLOAD_MASK)
}

#[inline]
pub(crate) fn decode_word(word: u64) -> (u8, u64) {
    ((word >> PAYLOAD_BITS) as u8, word & PAYLOAD_MASK)
}

/// Result of a completed [`build`] call.
pub(crate) struct TapeOutput {
    pub(crate) tape: Vec<u64>,
    pub(crate) strings: Vec<u8>,
}

/// What the state machine expects to see at the next structural position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    RootValue,
    /// The current root finished; stop consuming positions and close it.
    RootDone,
    ObjectKeyOrClose,
    ObjectKey,
    ObjectColon,
    ObjectValue,
    ObjectCommaOrClose,
    ArrayValueOrClose,
    ArrayValue,
    ArrayCommaOrClose,
}

/// A pull source of absolute structural byte offsets, in ascending order
/// (spec §4.B's output feeding spec §4.F's input). Implemented both by a
/// plain `&[usize]` cursor (serial path, tests) and by a channel-backed
/// source that blocks on Stage 1 rather than ever claiming exhaustion
/// while Stage 1 is still scanning ([`crate::pipeline`]).
pub(crate) trait PositionSource {
    /// The next absolute structural offset, or `None` once there genuinely
    /// are no more — the source's producer has finished and every position
    /// it ever had has been returned. A source that merely hasn't produced
    /// its *next* position yet blocks here instead of returning `None`.
    fn next(&mut self) -> Option<usize>;
}

struct SliceSource<'a> {
    positions: &'a [usize],
    idx: usize,
}

impl PositionSource for SliceSource<'_> {
    fn next(&mut self) -> Option<usize> {
        let p = self.positions.get(self.idx).copied();
        if p.is_some() {
            self.idx += 1;
        }
        p
    }
}

/// Build a tape from `input` and the list of absolute structural byte
/// offsets Stage 1 found in it (spec §4.B's output, §4.F's input).
///
/// Supports NDJSON: once a root value completes, if structural positions
/// remain, a new root is opened and chained (spec §3.1 "consecutive roots
/// form a linked chain").
pub(crate) fn build(
    input: &[u8],
    structural_positions: &[usize],
    config: &ParserConfig,
) -> Result<TapeOutput, Error> {
    build_into(
        input,
        structural_positions,
        config,
        Vec::with_capacity(structural_positions.len() * 2),
        Vec::new(),
    )
}

/// Same as [`build`], but reuses `tape`/`strings` allocations the caller
/// already has lying around (spec §6.1 `parse(bytes, reuse?)`) instead of
/// allocating fresh `Vec`s. Both must be empty; passing one with leftover
/// capacity from a previous parse is the whole point.
pub(crate) fn build_into(
    input: &[u8],
    structural_positions: &[usize],
    config: &ParserConfig,
    tape: Vec<u64>,
    strings: Vec<u8>,
) -> Result<TapeOutput, Error> {
    let mut source = SliceSource {
        positions: structural_positions,
        idx: 0,
    };
    build_from_source(input, &mut source, config, tape, strings)
}

/// Same as [`build_into`], but pulls structural positions from an arbitrary
/// [`PositionSource`] instead of a fully-materialized slice — the seam
/// [`crate::pipeline`]'s concurrent path uses to let Stage 2 consume
/// positions as Stage 1 produces them, rather than waiting for the whole
/// document to be indexed first.
pub(crate) fn build_from_source(
    input: &[u8],
    source: &mut dyn PositionSource,
    config: &ParserConfig,
    mut tape: Vec<u64>,
    mut strings: Vec<u8>,
) -> Result<TapeOutput, Error> {
    test_assert!(tape.is_empty() && strings.is_empty());

    let mut scope = ScopeStack::new(config.max_depth);
    let mut resume: Vec<Expect> = Vec::new();
    let mut parsed_any = false;

    while build_one_root(input, source, config, &mut tape, &mut strings, &mut scope, &mut resume)? {
        parsed_any = true;
    }

    if !parsed_any {
        return Err(Error::InvalidSyntax { offset: 0 });
    }

    if !scope.is_empty() {
        return Err(Error::UnbalancedContainers {
            open: scope.depth(),
        });
    }

    Ok(TapeOutput { tape, strings })
}

/// Parse one root value off `source`. Returns `Ok(false)` without touching
/// `tape`/`scope` if `source` has nothing left at all (a clean end of
/// input between roots); `Ok(true)` once a whole root has been closed.
#[allow(clippy::too_many_arguments)]
fn build_one_root(
    input: &[u8],
    source: &mut dyn PositionSource,
    config: &ParserConfig,
    tape: &mut Vec<u64>,
    strings: &mut Vec<u8>,
    scope: &mut ScopeStack,
    resume: &mut Vec<Expect>,
) -> Result<bool, Error> {
    let first = match source.next() {
        Some(p) => p,
        None => return Ok(false),
    };

    let root_open = tape.len();
    tape.push(encode_word(TAG_ROOT, 0));
    scope.push(root_open, Discriminator::Root)?;
    resume.clear();
    let mut state = Expect::RootValue;
    let mut pending = Some(first);

    loop {
        if state == Expect::RootDone {
            break;
        }

        let p = match pending.take() {
            Some(p) => p,
            None => source.next().ok_or(Error::UnbalancedContainers {
                open: scope.depth(),
            })?,
        };
        let b = *get_unchecked!(input, p);

        state = match state {
            Expect::RootValue => {
                dispatch_value(input, p, b, config, tape, strings, scope, resume, Expect::RootDone)?
            }
            Expect::ObjectKeyOrClose => {
                if b == b'}' {
                    close_container(tape, scope, TAG_OBJECT_CLOSE, TAG_OBJECT_OPEN)?;
                    resume.pop().ok_or(Error::UnbalancedContainers { open: scope.depth() })?
                } else if b == b'"' {
                    parse_key(input, p, config, tape, strings)?;
                    Expect::ObjectColon
                } else {
                    return Err(Error::InvalidSyntax { offset: p });
                }
            }
            Expect::ObjectKey => {
                if b == b'"' {
                    parse_key(input, p, config, tape, strings)?;
                    Expect::ObjectColon
                } else {
                    return Err(Error::InvalidSyntax { offset: p });
                }
            }
            Expect::ObjectColon => {
                if b == b':' {
                    Expect::ObjectValue
                } else {
                    return Err(Error::InvalidSyntax { offset: p });
                }
            }
            Expect::ObjectValue => dispatch_value(
                input,
                p,
                b,
                config,
                tape,
                strings,
                scope,
                resume,
                Expect::ObjectCommaOrClose,
            )?,
            Expect::ObjectCommaOrClose => {
                if b == b'}' {
                    close_container(tape, scope, TAG_OBJECT_CLOSE, TAG_OBJECT_OPEN)?;
                    resume.pop().ok_or(Error::UnbalancedContainers { open: scope.depth() })?
                } else if b == b',' {
                    Expect::ObjectKey
                } else {
                    return Err(Error::InvalidSyntax { offset: p });
                }
            }
            Expect::ArrayValueOrClose => {
                if b == b']' {
                    close_container(tape, scope, TAG_ARRAY_CLOSE, TAG_ARRAY_OPEN)?;
                    resume.pop().ok_or(Error::UnbalancedContainers { open: scope.depth() })?
                } else {
                    dispatch_value(
                        input,
                        p,
                        b,
                        config,
                        tape,
                        strings,
                        scope,
                        resume,
                        Expect::ArrayCommaOrClose,
                    )?
                }
            }
            Expect::ArrayValue => dispatch_value(
                input,
                p,
                b,
                config,
                tape,
                strings,
                scope,
                resume,
                Expect::ArrayCommaOrClose,
            )?,
            Expect::ArrayCommaOrClose => {
                if b == b']' {
                    close_container(tape, scope, TAG_ARRAY_CLOSE, TAG_ARRAY_OPEN)?;
                    resume.pop().ok_or(Error::UnbalancedContainers { open: scope.depth() })?
                } else if b == b',' {
                    Expect::ArrayValue
                } else {
                    return Err(Error::InvalidSyntax { offset: p });
                }
            }
            Expect::RootDone => unreachable!(),
        };
    }

    let close_index = tape.len();
    tape.push(encode_word(TAG_ROOT, root_open as u64));

    let (popped_open, discriminator) = scope
        .pop()
        .ok_or(Error::UnbalancedContainers { open: 0 })?;
    test_assert_eq!(popped_open, root_open);
    test_assert_eq!(discriminator, Discriminator::Root);

    tape[root_open] = encode_word(TAG_ROOT, (close_index + 1) as u64);

    Ok(true)
}

/// Dispatch on the byte at a value position and return the state to resume
/// with. For scalars that's just `after`; for a freshly opened container
/// it's that container's own initial state, with `after` pushed onto
/// `resume` for when it closes.
#[allow(clippy::too_many_arguments)]
fn dispatch_value(
    input: &[u8],
    p: usize,
    b: u8,
    config: &ParserConfig,
    tape: &mut Vec<u64>,
    strings: &mut Vec<u8>,
    scope: &mut ScopeStack,
    resume: &mut Vec<Expect>,
    after: Expect,
) -> Result<Expect, Error> {
    match b {
        b'"' => {
            write_string(input, p, config, tape, strings)?;
            Ok(after)
        }
        b'-' | b'0'..=b'9' => {
            let (n, _consumed) = number::parse(&input[p..], config.use_language_number_parser)
                .map_err(|e| offset_error_by(e, p))?;
            write_number(tape, n);
            Ok(after)
        }
        b't' => {
            atom::parse_true(&input[p..]).map_err(|e| offset_error_by(e, p))?;
            tape.push(encode_word(TAG_TRUE, 0));
            Ok(after)
        }
        b'f' => {
            atom::parse_false(&input[p..]).map_err(|e| offset_error_by(e, p))?;
            tape.push(encode_word(TAG_FALSE, 0));
            Ok(after)
        }
        b'n' => {
            atom::parse_null(&input[p..]).map_err(|e| offset_error_by(e, p))?;
            tape.push(encode_word(TAG_NULL, 0));
            Ok(after)
        }
        b'{' => {
            resume.push(after);
            let open_index = tape.len();
            tape.push(encode_word(TAG_OBJECT_OPEN, 0));
            scope.push(open_index, Discriminator::Object)?;
            Ok(Expect::ObjectKeyOrClose)
        }
        b'[' => {
            resume.push(after);
            let open_index = tape.len();
            tape.push(encode_word(TAG_ARRAY_OPEN, 0));
            scope.push(open_index, Discriminator::Array)?;
            Ok(Expect::ArrayValueOrClose)
        }
        _ => Err(Error::InvalidSyntax { offset: p }),
    }
}

/// [`number::parse`] reports offsets relative to the slice it was handed;
/// rebase them to absolute input offsets for error reporting.
fn offset_error_by(err: Error, base: usize) -> Error {
    match err {
        Error::NumberSyntax { offset } => Error::NumberSyntax {
            offset: offset + base,
        },
        Error::InvalidSyntax { offset } => Error::InvalidSyntax {
            offset: offset + base,
        },
        other => other,
    }
}

fn write_string(
    input: &[u8],
    p: usize,
    config: &ParserConfig,
    tape: &mut Vec<u64>,
    strings: &mut Vec<u8>,
) -> Result<(), Error> {
    let (location, _close) = string::parse(input, p + 1, config.copy_strings, strings)?;

    let (payload, len) = match location {
        string::StringLocation::InPlace { offset, len } => (offset as u64, len as u32),
        string::StringLocation::Copied { buf_offset } => {
            let content_len = u32::from_le_bytes([
                strings[buf_offset],
                strings[buf_offset + 1],
                strings[buf_offset + 2],
                strings[buf_offset + 3],
            ]);
            ((buf_offset as u64) | STRING_COPIED_BIT, content_len)
        }
    };

    tape.push(encode_word(TAG_STRING, payload));
    tape.push(len as u64);
    Ok(())
}

fn parse_key(
    input: &[u8],
    p: usize,
    config: &ParserConfig,
    tape: &mut Vec<u64>,
    strings: &mut Vec<u8>,
) -> Result<(), Error> {
    write_string(input, p, config, tape, strings)
}

fn write_number(tape: &mut Vec<u64>, n: number::Number) {
    match n {
        number::Number::Signed(v) => {
            tape.push(encode_word(TAG_INT, 0));
            tape.push(v as u64);
        }
        number::Number::Unsigned(v) => {
            tape.push(encode_word(TAG_UINT, 0));
            tape.push(v);
        }
        number::Number::Double { value, overflowed } => {
            tape.push(encode_word(TAG_DOUBLE, overflowed as u64));
            tape.push(value.to_bits());
        }
    }
}

fn close_container(
    tape: &mut Vec<u64>,
    scope: &mut ScopeStack,
    close_tag: u8,
    open_tag: u8,
) -> Result<(), Error> {
    let (open_index, _discriminator) = scope
        .pop()
        .ok_or(Error::UnbalancedContainers { open: 0 })?;

    let close_index = tape.len();
    tape.push(encode_word(close_tag, open_index as u64));
    tape[open_index] = encode_word(open_tag, close_index as u64);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ParserConfig {
        ParserConfig::default()
    }

    /// Emulates Stage 1's output directly from a structural-character scan,
    /// good enough for exercising the tape builder in isolation before
    /// Stage 1 exists.
    fn structural_positions(input: &[u8]) -> Vec<usize> {
        let mut out = Vec::new();
        let mut in_string = false;
        let mut escape = false;
        let mut prev_significant = true; // start-of-input counts as a boundary

        for (i, &b) in input.iter().enumerate() {
            if in_string {
                if escape {
                    escape = false;
                } else if b == b'\\' {
                    escape = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }

            match b {
                b'"' => {
                    out.push(i);
                    in_string = true;
                    prev_significant = true;
                }
                b'{' | b'}' | b'[' | b']' | b':' | b',' => {
                    out.push(i);
                    prev_significant = true;
                }
                b' ' | b'\t' | b'\n' | b'\r' => {
                    prev_significant = false;
                }
                _ => {
                    if prev_significant {
                        out.push(i);
                    }
                    prev_significant = false;
                }
            }
        }
        out
    }

    fn build_from(json: &[u8]) -> TapeOutput {
        let positions = structural_positions(json);
        build(json, &positions, &cfg()).unwrap()
    }

    #[test]
    fn parses_flat_object() {
        let out = build_from(br#"{"a":1,"b":true}"#);
        assert_eq!(decode_word(out.tape[0]).0, TAG_ROOT);
        assert_eq!(decode_word(out.tape[1]).0, TAG_OBJECT_OPEN);
    }

    #[test]
    fn rejects_trailing_comma() {
        let positions = structural_positions(br#"{"a":1,}"#);
        assert!(build(br#"{"a":1,}"#, &positions, &cfg()).is_err());
    }

    #[test]
    fn rejects_unbalanced_containers() {
        let positions = structural_positions(br#"{"a":1"#);
        assert!(build(br#"{"a":1"#, &positions, &cfg()).is_err());
    }

    #[test]
    fn parses_nested_array_of_objects() {
        let out = build_from(br#"[{"x":1},{"y":2}]"#);
        let tags: Vec<u8> = out.tape.iter().map(|&w| decode_word(w).0).collect();
        assert_eq!(tags.first(), Some(&TAG_ROOT));
        assert!(tags.contains(&TAG_ARRAY_OPEN));
        assert_eq!(tags.iter().filter(|&&t| t == TAG_OBJECT_OPEN).count(), 2);
    }

    #[test]
    fn ndjson_chains_two_roots() {
        let out = build_from(b"{\"x\":1}\n{\"x\":2}");
        let root_opens: Vec<usize> = out
            .tape
            .iter()
            .enumerate()
            .filter(|&(_, &w)| decode_word(w).0 == TAG_ROOT)
            .map(|(i, _)| i)
            .collect();
        // two roots, each with an open and close tag
        assert_eq!(root_opens.len(), 4);
        let (_, first_open_payload) = decode_word(out.tape[root_opens[0]]);
        assert!(first_open_payload as usize > root_opens[0]);
    }

    #[test]
    fn plain_scalar_root_is_valid() {
        let out = build_from(b"42");
        assert_eq!(decode_word(out.tape[0]).0, TAG_ROOT);
        assert_eq!(decode_word(out.tape[1]).0, TAG_INT);
    }

    #[test]
    fn string_values_round_trip_through_tape() {
        let out = build_from(br#"{"name":"hi"}"#);
        let string_word_idx = out
            .tape
            .iter()
            .position(|&w| decode_word(w).0 == TAG_STRING)
            .unwrap();
        // skip the key; the value string is the second `"` tag
        let value_idx = out.tape[string_word_idx + 2..]
            .iter()
            .position(|&w| decode_word(w).0 == TAG_STRING)
            .map(|i| i + string_word_idx + 2)
            .unwrap();
        let (_, payload) = decode_word(out.tape[value_idx]);
        assert_eq!(payload & STRING_COPIED_BIT, STRING_COPIED_BIT);
    }
}
