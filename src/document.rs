/*!
Parsed-document navigation and mutation (spec §4.G).

[`ParsedDocument`] owns a completed tape plus the string buffer and source
bytes it may still be aliasing (in-place strings, spec §3.3). Navigation is
exposed as a small cursor, [`Iter`], rather than a recursive tree: advancing
from one array/object element to the next costs one tag read, regardless of
how large a nested container is, because every container's close tag carries
its matching open index and vice versa (spec §3.2).

The mutation API overwrites scalar tape words in place. Because every tape
word has a fixed, tag-determined width, shrinking a value (e.g. turning a
string into a `null`) leaves a gap; that gap is filled with a [`crate::tape`]
internal NOP span so that forward iteration still walks over it correctly.
Growing a value in place (e.g. turning a `null` into a string) has nowhere to
put the extra words and returns [`crate::error::Error::CannotGrowValueInPlace`].
*/

use crate::error::Error;
use crate::tape::{
    decode_word, encode_word, STRING_COPIED_BIT, TAG_ARRAY_OPEN, TAG_DOUBLE, TAG_FALSE, TAG_INT,
    TAG_NOP, TAG_NULL, TAG_OBJECT_OPEN, TAG_ROOT, TAG_STRING, TAG_TRUE, TAG_UINT,
};
use crate::string;

/// The type of a value at an [`Iter`]'s current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Object,
    Array,
}

fn classify(tag: u8) -> ValueKind {
    match tag {
        TAG_NULL => ValueKind::Null,
        TAG_TRUE | TAG_FALSE => ValueKind::Bool,
        TAG_INT => ValueKind::Int,
        TAG_UINT => ValueKind::Uint,
        TAG_DOUBLE => ValueKind::Double,
        TAG_STRING => ValueKind::String,
        TAG_OBJECT_OPEN => ValueKind::Object,
        TAG_ARRAY_OPEN => ValueKind::Array,
        other => unreachable!("unexpected tape tag {other:#x} at a value position"),
    }
}

/// Number of tape words the value at `tape[index]` occupies, including the
/// tag word itself.
fn span_words_at(tape: &[u64], index: usize) -> usize {
    let (tag, payload) = decode_word(tape[index]);
    match tag {
        TAG_STRING | TAG_INT | TAG_UINT | TAG_DOUBLE => 2,
        TAG_NULL | TAG_TRUE | TAG_FALSE => 1,
        TAG_OBJECT_OPEN | TAG_ARRAY_OPEN => (payload as usize) - index + 1,
        TAG_NOP => payload as usize,
        other => unreachable!("unexpected tape tag {other:#x} at a value position"),
    }
}

/// A parsed JSON document: the tape, the string buffer copied strings were
/// written into, and the original input bytes that in-place strings still
/// alias (spec §3.3 "aliasing the original message").
pub struct ParsedDocument {
    tape: Vec<u64>,
    strings: Vec<u8>,
    source: Vec<u8>,
}

impl ParsedDocument {
    pub(crate) fn from_parts(source: Vec<u8>, tape: Vec<u64>, strings: Vec<u8>) -> Self {
        ParsedDocument { tape, strings, source }
    }

    /// Raw tape words, for [`crate::codec`].
    pub(crate) fn tape_words(&self) -> &[u64] {
        &self.tape
    }

    /// Tear the document down into its backing allocations, cleared but
    /// with their capacity intact, for [`crate::parser::Parser`]'s
    /// buffer-reuse path (spec §6.1 `parse(bytes, reuse?)`).
    pub(crate) fn into_parts(mut self) -> (Vec<u8>, Vec<u64>, Vec<u8>) {
        self.source.clear();
        self.tape.clear();
        self.strings.clear();
        (self.source, self.tape, self.strings)
    }

    /// The string bytes at a `"`-tagged tape index, resolving in-place vs.
    /// copied storage the same way [`Iter::as_string_bytes`] does. Used by
    /// [`crate::codec`], which walks the tape directly rather than through
    /// an [`Iter`].
    pub(crate) fn resolve_string_at(&self, tag_index: usize) -> &[u8] {
        let (tag, payload) = decode_word(self.tape[tag_index]);
        test_assert_eq!(tag, TAG_STRING);
        let len = self.tape[tag_index + 1] as usize;
        if payload & STRING_COPIED_BIT != 0 {
            let buf_offset = (payload & !STRING_COPIED_BIT) as usize;
            string::read_copied(&self.strings, buf_offset)
        } else {
            let offset = payload as usize;
            &self.source[offset..offset + len]
        }
    }

    /// Iterate over every root value in the document, in source order. A
    /// document parsed from a single JSON value has exactly one; an NDJSON
    /// stream has one per line (spec §3.1 "consecutive roots form a linked
    /// chain").
    pub fn roots(&self) -> RootsIter<'_> {
        RootsIter {
            doc: self,
            next_root_open: if self.tape.is_empty() { None } else { Some(0) },
        }
    }

    /// The document's first (and, for non-NDJSON input, only) root value.
    ///
    /// # Panics
    ///
    /// Panics if the tape is empty. A [`ParsedDocument`] produced by
    /// [`crate::parser::Parser`] always has at least one root.
    pub fn root(&self) -> Iter<'_> {
        self.roots().next().expect("a parsed document always has at least one root")
    }

    fn replace_scalar(&mut self, index: usize, words: &[u64]) -> Result<(), Error> {
        let old_span = span_words_at(&self.tape, index);
        let new_span = words.len();
        if new_span > old_span {
            return Err(Error::CannotGrowValueInPlace {
                old_words: old_span,
                new_words: new_span,
            });
        }
        self.tape[index..index + new_span].copy_from_slice(words);
        if new_span < old_span {
            let gap = old_span - new_span;
            self.tape[index + new_span] = encode_word(TAG_NOP, gap as u64);
        }
        Ok(())
    }

    pub fn set_null(&mut self, index: usize) -> Result<(), Error> {
        self.replace_scalar(index, &[encode_word(TAG_NULL, 0)])
    }

    pub fn set_bool(&mut self, index: usize, value: bool) -> Result<(), Error> {
        let tag = if value { TAG_TRUE } else { TAG_FALSE };
        self.replace_scalar(index, &[encode_word(tag, 0)])
    }

    pub fn set_int(&mut self, index: usize, value: i64) -> Result<(), Error> {
        self.replace_scalar(index, &[encode_word(TAG_INT, 0), value as u64])
    }

    pub fn set_uint(&mut self, index: usize, value: u64) -> Result<(), Error> {
        self.replace_scalar(index, &[encode_word(TAG_UINT, 0), value])
    }

    pub fn set_float(&mut self, index: usize, value: f64) -> Result<(), Error> {
        self.replace_scalar(index, &[encode_word(TAG_DOUBLE, 0), value.to_bits()])
    }

    /// Overwrite the value at `index` with a string. The bytes are always
    /// appended to the string buffer (previous storage, if any, is simply
    /// orphaned) rather than written in place, since an edited string's
    /// length rarely matches what was there before.
    pub fn set_string(&mut self, index: usize, bytes: &[u8]) -> Result<(), Error> {
        let buf_offset = self.strings.len();
        let len = bytes.len() as u32;
        self.strings.extend_from_slice(&len.to_le_bytes());
        self.strings.extend_from_slice(bytes);
        self.strings.push(0);
        let payload = (buf_offset as u64) | STRING_COPIED_BIT;
        self.replace_scalar(index, &[encode_word(TAG_STRING, payload), len as u64])
    }

    /// Delete the value at `index`, replacing its tape words with a single
    /// NOP span so that iteration over its parent container skips it.
    ///
    /// `span_words` must cover the value's full width (as returned by
    /// [`Iter::array_elements`]/[`Iter::object_entries`] walking one
    /// element). To delete an object member entirely — key and value both —
    /// pass the key's tape index and the combined width of the key plus its
    /// value.
    pub fn delete(&mut self, index: usize, span_words: usize) {
        self.tape[index] = encode_word(TAG_NOP, span_words as u64);
    }

    /// Serialize the document's first root to a JSON string (spec §4.G
    /// `marshal_json`). For NDJSON documents, serializes every root
    /// separated by newlines.
    pub fn marshal_json(&self) -> String {
        let mut out = String::new();
        let mut roots = self.roots().peekable();
        while let Some(r) = roots.next() {
            write_value(&r, &mut out);
            if roots.peek().is_some() {
                out.push('\n');
            }
        }
        out
    }
}

/// Iterates over every root value in a [`ParsedDocument`] (spec §3.1
/// NDJSON chaining).
pub struct RootsIter<'a> {
    doc: &'a ParsedDocument,
    next_root_open: Option<usize>,
}

impl<'a> Iterator for RootsIter<'a> {
    type Item = Iter<'a>;

    fn next(&mut self) -> Option<Iter<'a>> {
        let open_idx = self.next_root_open?;
        let (tag, payload) = decode_word(self.doc.tape[open_idx]);
        test_assert_eq!(tag, TAG_ROOT);
        let after_close = payload as usize;
        self.next_root_open = self
            .doc
            .tape
            .get(after_close)
            .filter(|&&w| decode_word(w).0 == TAG_ROOT)
            .map(|_| after_close);
        Some(Iter { doc: self.doc, index: open_idx + 1 })
    }
}

/// A cursor onto one value in a [`ParsedDocument`]'s tape.
#[derive(Clone, Copy)]
pub struct Iter<'a> {
    doc: &'a ParsedDocument,
    index: usize,
}

impl<'a> Iter<'a> {
    fn tag(&self) -> u8 {
        decode_word(self.doc.tape[self.index]).0
    }

    fn payload(&self) -> u64 {
        decode_word(self.doc.tape[self.index]).1
    }

    /// This value's tape index, for use with [`ParsedDocument`]'s mutation
    /// API.
    pub fn tape_index(&self) -> usize {
        self.index
    }

    pub fn kind(&self) -> ValueKind {
        classify(self.tag())
    }

    pub fn is_null(&self) -> bool {
        self.tag() == TAG_NULL
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.tag() {
            TAG_TRUE => Some(true),
            TAG_FALSE => Some(false),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        (self.tag() == TAG_INT).then(|| self.doc.tape[self.index + 1] as i64)
    }

    pub fn as_uint(&self) -> Option<u64> {
        (self.tag() == TAG_UINT).then(|| self.doc.tape[self.index + 1])
    }

    /// The double value, if this is a `d`-tagged word. Use
    /// [`Self::double_overflowed`] to tell an actual double literal apart
    /// from an integer that overflowed `u64` during parsing (spec §4.D).
    pub fn as_float(&self) -> Option<f64> {
        (self.tag() == TAG_DOUBLE).then(|| f64::from_bits(self.doc.tape[self.index + 1]))
    }

    pub fn double_overflowed(&self) -> bool {
        self.tag() == TAG_DOUBLE && self.payload() & 1 == 1
    }

    pub fn as_string_bytes(&self) -> Option<&'a [u8]> {
        if self.tag() != TAG_STRING {
            return None;
        }
        let payload = self.payload();
        let len = self.doc.tape[self.index + 1] as usize;
        if payload & STRING_COPIED_BIT != 0 {
            let buf_offset = (payload & !STRING_COPIED_BIT) as usize;
            Some(string::read_copied(&self.doc.strings, buf_offset))
        } else {
            let offset = payload as usize;
            Some(&self.doc.source[offset..offset + len])
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.as_string_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn object_entries(&self) -> Option<ObjectEntries<'a>> {
        if self.tag() != TAG_OBJECT_OPEN {
            return None;
        }
        Some(ObjectEntries {
            doc: self.doc,
            pos: self.index + 1,
            end: self.payload() as usize,
        })
    }

    pub fn array_elements(&self) -> Option<ArrayElements<'a>> {
        if self.tag() != TAG_ARRAY_OPEN {
            return None;
        }
        Some(ArrayElements {
            doc: self.doc,
            pos: self.index + 1,
            end: self.payload() as usize,
        })
    }

    /// Look up a member by key in an object value (spec §4.G `find_key`).
    /// Returns `None` if this isn't an object or the key isn't present.
    pub fn find_key(&self, name: &str) -> Option<Iter<'a>> {
        self.object_entries()?.find_map(|(key, value)| (key == name.as_bytes()).then_some(value))
    }

    /// Walk a sequence of object keys (spec §4.G `find_path`), returning
    /// `None` as soon as any segment is missing or isn't an object.
    pub fn find_path(&self, names: &[&str]) -> Option<Iter<'a>> {
        let mut cur = *self;
        for name in names {
            cur = cur.find_key(name)?;
        }
        Some(cur)
    }
}

/// Iterates over `(key_bytes, value)` pairs of an object, skipping deleted
/// (NOP) members.
pub struct ObjectEntries<'a> {
    doc: &'a ParsedDocument,
    pos: usize,
    end: usize,
}

impl<'a> Iterator for ObjectEntries<'a> {
    type Item = (&'a [u8], Iter<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos >= self.end {
                return None;
            }
            if decode_word(self.doc.tape[self.pos]).0 == TAG_NOP {
                self.pos += span_words_at(&self.doc.tape, self.pos);
                continue;
            }
            let key = Iter { doc: self.doc, index: self.pos };
            let key_bytes = key.as_string_bytes().expect("object key is always a string");
            self.pos += span_words_at(&self.doc.tape, self.pos);
            let value = Iter { doc: self.doc, index: self.pos };
            self.pos += span_words_at(&self.doc.tape, self.pos);
            return Some((key_bytes, value));
        }
    }
}

/// Iterates over an array's elements, skipping deleted (NOP) ones.
pub struct ArrayElements<'a> {
    doc: &'a ParsedDocument,
    pos: usize,
    end: usize,
}

impl<'a> Iterator for ArrayElements<'a> {
    type Item = Iter<'a>;

    fn next(&mut self) -> Option<Iter<'a>> {
        loop {
            if self.pos >= self.end {
                return None;
            }
            if decode_word(self.doc.tape[self.pos]).0 == TAG_NOP {
                self.pos += span_words_at(&self.doc.tape, self.pos);
                continue;
            }
            let value = Iter { doc: self.doc, index: self.pos };
            self.pos += span_words_at(&self.doc.tape, self.pos);
            return Some(value);
        }
    }
}

fn write_value(iter: &Iter<'_>, out: &mut String) {
    match iter.kind() {
        ValueKind::Null => out.push_str("null"),
        ValueKind::Bool => out.push_str(if iter.as_bool().unwrap() { "true" } else { "false" }),
        ValueKind::Int => out.push_str(&iter.as_int().unwrap().to_string()),
        ValueKind::Uint => out.push_str(&iter.as_uint().unwrap().to_string()),
        ValueKind::Double => {
            let v = iter.as_float().unwrap();
            if v.is_finite() {
                out.push_str(&v.to_string());
            } else {
                // not representable in JSON; simdjson-family parsers emit
                // `null` rather than produce invalid output.
                out.push_str("null");
            }
        }
        ValueKind::String => write_json_string(iter.as_string_bytes().unwrap(), out),
        ValueKind::Object => {
            out.push('{');
            let mut first = true;
            for (key, value) in iter.object_entries().unwrap() {
                if !first {
                    out.push(',');
                }
                first = false;
                write_json_string(key, out);
                out.push(':');
                write_value(&value, out);
            }
            out.push('}');
        }
        ValueKind::Array => {
            out.push('[');
            let mut first = true;
            for value in iter.array_elements().unwrap() {
                if !first {
                    out.push(',');
                }
                first = false;
                write_value(&value, out);
            }
            out.push(']');
        }
    }
}

#[cfg(any(test, feature = "serde_json"))]
impl<'a> Iter<'a> {
    /// Convert this value (and, recursively, everything under it) into a
    /// [`serde_json::Value`].
    pub fn to_value(&self) -> serde_json::Value {
        match self.kind() {
            ValueKind::Null => serde_json::Value::Null,
            ValueKind::Bool => serde_json::Value::Bool(self.as_bool().unwrap()),
            ValueKind::Int => serde_json::Value::Number(self.as_int().unwrap().into()),
            ValueKind::Uint => serde_json::Value::Number(self.as_uint().unwrap().into()),
            ValueKind::Double => {
                let v = self.as_float().unwrap();
                serde_json::Number::from_f64(v).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
            }
            ValueKind::String => serde_json::Value::String(self.as_str().unwrap_or_default().to_owned()),
            ValueKind::Object => {
                let mut map = serde_json::Map::new();
                for (key, value) in self.object_entries().unwrap() {
                    let key = std::str::from_utf8(key).unwrap_or_default().to_owned();
                    map.insert(key, value.to_value());
                }
                serde_json::Value::Object(map)
            }
            ValueKind::Array => {
                serde_json::Value::Array(self.array_elements().unwrap().map(|v| v.to_value()).collect())
            }
        }
    }
}

#[cfg(any(test, feature = "serde_json"))]
impl ParsedDocument {
    /// Convert this document's first root into a [`serde_json::Value`].
    pub fn to_value(&self) -> serde_json::Value {
        self.root().to_value()
    }
}

fn write_json_string(bytes: &[u8], out: &mut String) {
    out.push('"');
    // bytes here are always valid UTF-8: they were either copied verbatim
    // from validated input or decoded from escapes into valid chars.
    let s = std::str::from_utf8(bytes).unwrap_or("\u{fffd}");
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    fn parse(json: &[u8]) -> ParsedDocument {
        let positions = crate::stage1::scan_to_positions(json).unwrap_or_else(|_| {
            // scalar fallback for test environments without SIMD support
            manual_positions(json)
        });
        let config = ParserConfig::default();
        let out = crate::tape::build(json, &positions, &config).unwrap();
        ParsedDocument::from_parts(json.to_vec(), out.tape, out.strings)
    }

    fn manual_positions(input: &[u8]) -> Vec<usize> {
        let mut out = Vec::new();
        let mut in_string = false;
        let mut escape = false;
        let mut prev_significant = true;
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
                b' ' | b'\t' | b'\n' | b'\r' => prev_significant = false,
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

    #[test]
    fn navigates_object_and_array() {
        let doc = parse(br#"{"a":1,"b":[true,false,null],"c":"hi"}"#);
        let root = doc.root();
        assert_eq!(root.kind(), ValueKind::Object);
        assert_eq!(root.find_key("a").unwrap().as_int(), Some(1));
        let arr = root.find_key("b").unwrap();
        let elems: Vec<_> = arr.array_elements().unwrap().collect();
        assert_eq!(elems.len(), 3);
        assert_eq!(elems[0].as_bool(), Some(true));
        assert_eq!(elems[2].kind(), ValueKind::Null);
        assert_eq!(root.find_key("c").unwrap().as_str(), Some("hi"));
        assert!(root.find_key("nope").is_none());
    }

    #[test]
    fn find_path_descends_nested_objects() {
        let doc = parse(br#"{"a":{"b":{"c":42}}}"#);
        let v = doc.root().find_path(&["a", "b", "c"]).unwrap();
        assert_eq!(v.as_int(), Some(42));
        assert!(doc.root().find_path(&["a", "x"]).is_none());
    }

    #[test]
    fn marshal_json_round_trips_values() {
        let doc = parse(br#"{"x":1,"y":[1,2,3],"z":"a\"b"}"#);
        let text = doc.marshal_json();
        assert!(text.contains("\"x\":1"));
        assert!(text.contains("[1,2,3]"));
        assert!(text.contains("a\\\"b"));
    }

    #[test]
    fn ndjson_roots_iterate_all_lines() {
        let doc = parse(b"1\n2\n3");
        let values: Vec<i64> = doc.roots().map(|r| r.as_int().unwrap()).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn set_int_overwrites_same_width_value() {
        let mut doc = parse(br#"{"a":1}"#);
        let idx = doc.root().find_key("a").unwrap().tape_index();
        doc.set_int(idx, 99).unwrap();
        assert_eq!(doc.root().find_key("a").unwrap().as_int(), Some(99));
    }

    #[test]
    fn set_null_on_string_leaves_gap_that_iteration_skips() {
        let mut doc = parse(br#"{"a":"longer string","b":2}"#);
        let idx = doc.root().find_key("a").unwrap().tape_index();
        doc.set_null(idx).unwrap();
        assert!(doc.root().find_key("a").unwrap().is_null());
        assert_eq!(doc.root().find_key("b").unwrap().as_int(), Some(2));
    }

    #[test]
    fn set_string_cannot_grow_a_null_in_place() {
        let mut doc = parse(br#"{"a":null}"#);
        let idx = doc.root().find_key("a").unwrap().tape_index();
        assert!(matches!(
            doc.set_string(idx, b"too big to fit"),
            Err(Error::CannotGrowValueInPlace { .. })
        ));
    }

    #[test]
    fn delete_removes_array_element_from_iteration() {
        let mut doc = parse(b"[1,2,3]");
        let root = doc.root();
        let second = root.array_elements().unwrap().nth(1).unwrap();
        let idx = second.tape_index();
        doc.delete(idx, 2);
        let remaining: Vec<i64> = doc.root().array_elements().unwrap().map(|v| v.as_int().unwrap()).collect();
        assert_eq!(remaining, vec![1, 3]);
    }
}
