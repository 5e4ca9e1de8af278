/*!
Number parsing (spec §4.D).

Parses the longest JSON-number prefix starting at a `-` or digit, validates
its grammar, and classifies the result into one of the tape's three numeric
tags: `l` (`i64`), `u` (`u64`, for values that overflow `i64` but fit
`u64`), or `d` (`f64`).
*/

use crate::error::Error;

/// The parsed, classified result of [`parse`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Signed(i64),
    Unsigned(u64),
    /// `overflowed` is set when the syntactic integer didn't fit in a
    /// `u64` and was converted to a double instead (spec §7
    /// "NumberOverflow... the float fallback sets the overflowed-integer
    /// flag and the parse continues").
    Double { value: f64, overflowed: bool },
}

/// Parse a JSON number starting at `input[0]`. Returns the number and the
/// count of bytes consumed.
///
/// `use_language_number_parser` routes float conversion through the host's
/// `f64::from_str` instead of tapeson's own fast path; this doesn't change
/// results for representable values, it exists purely so regressions can be
/// isolated to one code path (spec §6.5).
#[inline]
pub(crate) fn parse(input: &[u8], use_language_number_parser: bool) -> Result<(Number, usize), Error> {
    let start = 0usize;
    let mut i = 0usize;
    let negative = if *get_unchecked!(input, i) == b'-' {
        i += 1;
        true
    } else {
        false
    };

    let int_start = i;
    match input.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => {
            i += 1;
            while matches!(input.get(i), Some(b'0'..=b'9')) {
                i += 1;
            }
        }
        _ => return Err(Error::NumberSyntax { offset: start }),
    }

    if i == int_start {
        return Err(Error::NumberSyntax { offset: start });
    }

    let mut is_float = false;

    if matches!(input.get(i), Some(b'.')) {
        is_float = true;
        i += 1;
        let frac_start = i;
        while matches!(input.get(i), Some(b'0'..=b'9')) {
            i += 1;
        }
        if i == frac_start {
            return Err(Error::NumberSyntax { offset: start });
        }
    }

    if matches!(input.get(i), Some(b'e' | b'E')) {
        is_float = true;
        i += 1;
        if matches!(input.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_start = i;
        while matches!(input.get(i), Some(b'0'..=b'9')) {
            i += 1;
        }
        if i == exp_start {
            return Err(Error::NumberSyntax { offset: start });
        }
    }

    let text = from_utf8_unchecked!(&input[..i]);

    // end of input is a valid terminator too: a bare scalar document (e.g.
    // `42` with nothing else) has no trailing structural byte to check.
    match input.get(i) {
        None => (),
        Some(&b) if is_structural_or_whitespace(b) => (),
        Some(_) => return Err(Error::NumberSyntax { offset: start + i }),
    }

    if is_float {
        let value = parse_double(text, use_language_number_parser);
        return Ok((Number::Double {
            value,
            overflowed: false,
        }, i));
    }

    let digits = if negative { &text[1..] } else { text };

    if !negative {
        if let Ok(v) = digits.parse::<i64>() {
            return Ok((Number::Signed(v), i));
        }
        if let Ok(v) = digits.parse::<u64>() {
            return Ok((Number::Unsigned(v), i));
        }
    } else if let Ok(v) = text.parse::<i64>() {
        return Ok((Number::Signed(v), i));
    }

    // doesn't fit in i64/u64: fall through to a double, flagged as overflowed
    let value = parse_double(text, use_language_number_parser);
    Ok((Number::Double {
        value,
        overflowed: true,
    }, i))
}

#[inline]
fn is_structural_or_whitespace(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'\t' | b'\n' | b'\r' | b'{' | b'}' | b'[' | b']' | b':' | b','
    )
}

/// Powers of ten from 10^0 to 10^22, every one of which is exactly
/// representable as an `f64` (5^n needs at most 52 bits of mantissa for
/// n <= 22; the accompanying 2^n factor costs nothing since it's absorbed
/// into the float's binary exponent).
const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Parse a correctly-rounded `f64` from a validated JSON number string.
///
/// `use_language_number_parser` routes straight through the host's
/// `f64::from_str`, bypassing the fast path entirely (spec §6.5, a
/// diagnostic switch for isolating regressions to one code path).
/// Otherwise, try the fast path first and only fall back to `from_str` when
/// it can't prove its result is correctly rounded.
#[inline]
fn parse_double(text: &str, use_language_number_parser: bool) -> f64 {
    if use_language_number_parser {
        return text.parse::<f64>().unwrap_or(f64::NAN);
    }
    parse_double_fast(text).unwrap_or_else(|| text.parse::<f64>().unwrap_or(f64::NAN))
}

/// Double-precision fast path (spec §9): accumulate the significant digits
/// into an integer mantissa and track the decimal exponent implied by the
/// position of the decimal point and any `e`/`E` suffix. When the mantissa
/// fits exactly in an `f64` (<= 2^53) and the decimal exponent is within
/// the exactly-representable power-of-ten range (`POW10`), a single
/// multiply or divide is enough to get a correctly-rounded result, since
/// both operands are exact and IEEE 754 basic operations round to nearest.
/// Returns `None` when that can't be proven, leaving the slow path
/// (`f64::from_str`) to handle it.
fn parse_double_fast(text: &str) -> Option<f64> {
    let bytes = text.as_bytes();
    let mut i = 0;
    let negative = bytes.first() == Some(&b'-');
    if negative {
        i += 1;
    }

    let mut mantissa: u64 = 0;
    let mut exponent: i32 = 0;
    let mut digit_count = 0u32;
    let mut seen_dot = false;

    while let Some(&b) = bytes.get(i) {
        match b {
            b'0'..=b'9' => {
                if digit_count >= 19 {
                    // More significant digits than the mantissa can carry
                    // exactly; bail and let the slow path handle it.
                    return None;
                }
                mantissa = mantissa * 10 + (b - b'0') as u64;
                digit_count += 1;
                if seen_dot {
                    exponent -= 1;
                }
                i += 1;
            }
            b'.' => {
                seen_dot = true;
                i += 1;
            }
            b'e' | b'E' => {
                i += 1;
                let exp_negative = match bytes.get(i) {
                    Some(b'-') => {
                        i += 1;
                        true
                    }
                    Some(b'+') => {
                        i += 1;
                        false
                    }
                    _ => false,
                };
                let mut exp_value: i32 = 0;
                while let Some(&b) = bytes.get(i) {
                    if b.is_ascii_digit() {
                        exp_value = exp_value * 10 + (b - b'0') as i32;
                        i += 1;
                    } else {
                        break;
                    }
                }
                exponent += if exp_negative { -exp_value } else { exp_value };
                break;
            }
            _ => break,
        }
    }

    if mantissa > (1u64 << 53) {
        return None;
    }

    let abs_exp = exponent.unsigned_abs() as usize;
    let pow = *POW10.get(abs_exp)?;
    let mantissa_f = mantissa as f64;
    let magnitude = if exponent >= 0 {
        mantissa_f * pow
    } else {
        mantissa_f / pow
    };
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(s: &str) -> Number {
        let mut buf = s.as_bytes().to_vec();
        buf.push(b','); // trailing structural so the number has a terminator
        parse(&buf, false).unwrap().0
    }

    #[test]
    fn small_signed_int() {
        assert_eq!(parse_ok("1"), Number::Signed(1));
        assert_eq!(parse_ok("-1"), Number::Signed(-1));
    }

    #[test]
    fn uint_overflowing_i64() {
        match parse_ok("10000000000000000000") {
            Number::Unsigned(v) => assert_eq!(v, 10_000_000_000_000_000_000),
            other => panic!("expected Unsigned, got {other:?}"),
        }
    }

    #[test]
    fn overflowed_negative_falls_back_to_double() {
        match parse_ok("-9223372036854775809") {
            Number::Double { value, overflowed } => {
                assert!(overflowed);
                assert!((value - (-9.223372036854776e18)).abs() < 1e3);
            }
            other => panic!("expected Double, got {other:?}"),
        }
    }

    #[test]
    fn decimal_is_double() {
        assert_eq!(
            parse_ok("1.0"),
            Number::Double {
                value: 1.0,
                overflowed: false
            }
        );
    }

    #[test]
    fn exponent_is_double() {
        assert_eq!(
            parse_ok("1e23"),
            Number::Double {
                value: 1e23,
                overflowed: false
            }
        );
    }

    #[test]
    fn plain_decimal() {
        assert_eq!(
            parse_ok("339.7784"),
            Number::Double {
                value: 339.7784,
                overflowed: false
            }
        );
    }

    #[test]
    fn leading_zero_is_rejected() {
        assert!(parse(b"01,", false).is_err());
    }

    #[test]
    fn missing_exponent_digits_is_rejected() {
        assert!(parse(b"1e,", false).is_err());
    }

    #[test]
    fn trailing_junk_is_rejected() {
        assert!(parse(b"12a", false).is_err());
    }
}
