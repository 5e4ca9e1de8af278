/*!
String scanning and storage (spec §4.C, §3.3).

A string is first scanned to find its closing quote and validate escapes,
control characters, and surrogate pairs without allocating. What happens
next depends on [`crate::config::ParserConfig::copy_strings`] and whether
the string actually contained any escapes:

- if the config asks for in-place strings and none were found, the tape
  just aliases the original input buffer (no decoding needed, since an
  escape-free JSON string *is* its own UTF-8 content minus the quotes);
- otherwise the decoded content is written into the document's string
  buffer as a 4-byte little-endian length prefix, the UTF-8 bytes, and a
  trailing zero byte (spec §3.3), and the tape payload's high bit is set to
  mark it as a buffer offset rather than a raw input offset.
*/

use crate::error::Error;
use crate::std_ext::char::try_from_utf16_surrogate_pair;

/// Where a scanned string's decoded bytes ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StringLocation {
    /// Aliases the original input at `[offset, offset + len)`, quotes
    /// excluded.
    InPlace { offset: usize, len: usize },
    /// Written into the string buffer at `buf_offset` (the position of the
    /// length prefix).
    Copied { buf_offset: usize },
}

/// Scan a string literal starting just after the opening `"` at
/// `input[start]`. Returns whether it contained any escapes and the offset
/// of the closing quote.
fn scan(input: &[u8], start: usize) -> Result<(bool, usize), Error> {
    let mut i = start;
    let mut has_escapes = false;

    loop {
        let b = match input.get(i) {
            Some(&b) => b,
            None => return Err(Error::UnterminatedString { offset: start }),
        };

        match b {
            b'"' => return Ok((has_escapes, i)),
            b'\\' => {
                has_escapes = true;
                i = validate_escape(input, i)?;
            }
            0x00..=0x1f => {
                return Err(Error::ControlCharacterInString { offset: i, byte: b });
            }
            _ => i += 1,
        }
    }
}

/// Validate the escape sequence starting at `input[i]` (the backslash).
/// Returns the offset just past it.
fn validate_escape(input: &[u8], i: usize) -> Result<usize, Error> {
    let esc = match input.get(i + 1) {
        Some(&b) => b,
        None => return Err(Error::UnterminatedString { offset: i }),
    };

    match esc {
        b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => Ok(i + 2),
        b'u' => {
            let high = read_hex4(input, i + 2)?;
            let mut end = i + 6;

            if (0xD800..=0xDBFF).contains(&high) {
                // A high surrogate with nothing following it is a lone
                // surrogate and rejected outright. One followed by another
                // `\u` escape that pairs into a valid low surrogate consumes
                // both; followed by a `\u` escape that *doesn't* pair, the
                // high surrogate is left standalone and that following `\u`
                // is validated on its own when `scan` reaches it next.
                if input.get(end) != Some(&b'\\') || input.get(end + 1) != Some(&b'u') {
                    return Err(Error::InvalidEscape { offset: i });
                }
                if let Ok(low) = read_hex4(input, end + 2) {
                    if (0xDC00..=0xDFFF).contains(&low) {
                        end += 6;
                    }
                }
            } else if (0xDC00..=0xDFFF).contains(&high) {
                // lone low surrogate with no preceding high surrogate
                return Err(Error::InvalidEscape { offset: i });
            }

            Ok(end)
        }
        _ => Err(Error::InvalidEscape { offset: i }),
    }
}

fn read_hex4(input: &[u8], at: usize) -> Result<u16, Error> {
    let digits = input
        .get(at..at + 4)
        .ok_or(Error::InvalidEscape { offset: at })?;

    let mut value = 0u16;
    for &d in digits {
        let nibble = match d {
            b'0'..=b'9' => d - b'0',
            b'a'..=b'f' => d - b'a' + 10,
            b'A'..=b'F' => d - b'A' + 10,
            _ => return Err(Error::InvalidEscape { offset: at }),
        };
        value = (value << 4) | nibble as u16;
    }
    Ok(value)
}

/// Decode the validated (escapes already checked by [`scan`]) string body
/// `input[start..end]` into `out`, appending a 4-byte LE length prefix and a
/// trailing zero byte around the decoded bytes (spec §3.3).
///
/// Returns the offset in `out` where the length prefix starts.
fn decode_into(input: &[u8], start: usize, end: usize, out: &mut Vec<u8>) -> usize {
    let buf_offset = out.len();
    out.extend_from_slice(&[0u8; 4]); // length prefix placeholder

    let mut i = start;
    while i < end {
        let b = *get_unchecked!(input, i);
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }

        let esc = *get_unchecked!(input, i + 1);
        match esc {
            b'"' => {
                out.push(b'"');
                i += 2;
            }
            b'\\' => {
                out.push(b'\\');
                i += 2;
            }
            b'/' => {
                out.push(b'/');
                i += 2;
            }
            b'b' => {
                out.push(0x08);
                i += 2;
            }
            b'f' => {
                out.push(0x0c);
                i += 2;
            }
            b'n' => {
                out.push(b'\n');
                i += 2;
            }
            b'r' => {
                out.push(b'\r');
                i += 2;
            }
            b't' => {
                out.push(b'\t');
                i += 2;
            }
            b'u' => {
                let high = read_hex4(input, i + 2).unwrap_or(0);
                let paired_low = if (0xD800..=0xDBFF).contains(&high)
                    && input.get(i + 6) == Some(&b'\\')
                    && input.get(i + 7) == Some(&b'u')
                {
                    read_hex4(input, i + 8)
                        .ok()
                        .filter(|low| (0xDC00..=0xDFFF).contains(low))
                } else {
                    None
                };

                if let Some(low) = paired_low {
                    let c = try_from_utf16_surrogate_pair(high, low)
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    i += 12;
                } else {
                    // Unpaired surrogate half (high or low): not a valid
                    // scalar value on its own, so fall back to U+FFFD.
                    let c = char::from_u32(high as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    i += 6;
                }
            }
            _ => {
                test_unreachable!("validate_escape should have rejected this earlier");
                i += 2;
            }
        }
    }

    let content_len = (out.len() - buf_offset - 4) as u32;
    out[buf_offset..buf_offset + 4].copy_from_slice(&content_len.to_le_bytes());
    out.push(0);

    buf_offset
}

/// Scan and store the string literal starting just after the opening `"`
/// at `input[start]`. Returns its storage location and the offset of the
/// closing quote.
pub(crate) fn parse(
    input: &[u8],
    start: usize,
    copy_strings: bool,
    string_buf: &mut Vec<u8>,
) -> Result<(StringLocation, usize), Error> {
    let (has_escapes, close) = scan(input, start)?;

    let location = if !copy_strings && !has_escapes {
        StringLocation::InPlace {
            offset: start,
            len: close - start,
        }
    } else if !has_escapes {
        let buf_offset = string_buf.len();
        let len = (close - start) as u32;
        string_buf.extend_from_slice(&len.to_le_bytes());
        string_buf.extend_from_slice(&input[start..close]);
        string_buf.push(0);
        StringLocation::Copied { buf_offset }
    } else {
        let buf_offset = decode_into(input, start, close, string_buf);
        StringLocation::Copied { buf_offset }
    };

    Ok((location, close))
}

/// Read back a string previously written by [`decode_into`]/[`parse`]'s
/// copied path: `buf[buf_offset..]` starts with a 4-byte LE length prefix.
pub(crate) fn read_copied(buf: &[u8], buf_offset: usize) -> &[u8] {
    let len = u32::from_le_bytes([
        buf[buf_offset],
        buf[buf_offset + 1],
        buf[buf_offset + 2],
        buf[buf_offset + 3],
    ]) as usize;
    &buf[buf_offset + 4..buf_offset + 4 + len]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string_without_escapes_can_be_in_place() {
        let input = br#"hello" rest"#;
        let (loc, close) = parse(input, 0, false, &mut Vec::new()).unwrap();
        assert_eq!(loc, StringLocation::InPlace { offset: 0, len: 5 });
        assert_eq!(close, 5);
    }

    #[test]
    fn copy_strings_config_forces_copy_even_without_escapes() {
        let input = br#"hello" rest"#;
        let mut buf = Vec::new();
        let (loc, _) = parse(input, 0, true, &mut buf).unwrap();
        match loc {
            StringLocation::Copied { buf_offset } => {
                assert_eq!(read_copied(&buf, buf_offset), b"hello");
            }
            other => panic!("expected Copied, got {other:?}"),
        }
    }

    #[test]
    fn simple_escapes_decode() {
        let input = br#"a\"b\\c\/d\n\t"rest"#;
        let mut buf = Vec::new();
        let (loc, _) = parse(input, 0, false, &mut buf).unwrap();
        match loc {
            StringLocation::Copied { buf_offset } => {
                assert_eq!(read_copied(&buf, buf_offset), b"a\"b\\c/d\n\t");
            }
            other => panic!("expected Copied, got {other:?}"),
        }
    }

    #[test]
    fn unicode_escape_decodes_bmp_char() {
        let input = b"\\u00e9\"rest"; // \u00e9 == 'é'
        let mut buf = Vec::new();
        let (loc, _) = parse(input, 0, false, &mut buf).unwrap();
        match loc {
            StringLocation::Copied { buf_offset } => {
                assert_eq!(read_copied(&buf, buf_offset), "é".as_bytes());
            }
            other => panic!("expected Copied, got {other:?}"),
        }
    }

    #[test]
    fn surrogate_pair_decodes_to_supplementary_char() {
        let input = b"\\ud83d\\ude00\"rest"; // surrogate pair for U+1F600
        let mut buf = Vec::new();
        let (loc, _) = parse(input, 0, false, &mut buf).unwrap();
        match loc {
            StringLocation::Copied { buf_offset } => {
                assert_eq!(read_copied(&buf, buf_offset), "😀".as_bytes());
            }
            other => panic!("expected Copied, got {other:?}"),
        }
    }

    #[test]
    fn lone_low_surrogate_is_rejected() {
        let input = br#"\udc00"rest"#;
        assert!(parse(input, 0, false, &mut Vec::new()).is_err());
    }

    #[test]
    fn truly_lone_high_surrogate_is_rejected() {
        let input = br#"\udbff"rest"#;
        assert!(parse(input, 0, false, &mut Vec::new()).is_err());
    }

    #[test]
    fn high_surrogate_followed_by_non_low_surrogate_decodes_both_standalone() {
        let input = b"\\udbff\\u1234\"rest";
        let mut buf = Vec::new();
        let (loc, _) = parse(input, 0, false, &mut buf).unwrap();
        match loc {
            StringLocation::Copied { buf_offset } => {
                assert_eq!(read_copied(&buf, buf_offset).len(), 3 + 3);
            }
            other => panic!("expected Copied, got {other:?}"),
        }
    }

    #[test]
    fn control_character_is_rejected() {
        let input = b"a\x01b\"rest";
        assert!(parse(input, 0, false, &mut Vec::new()).is_err());
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let input = b"abc";
        assert!(parse(input, 0, false, &mut Vec::new()).is_err());
    }

    #[test]
    fn unknown_escape_is_rejected() {
        let input = br#"a\qb"rest"#;
        assert!(parse(input, 0, false, &mut Vec::new()).is_err());
    }
}
