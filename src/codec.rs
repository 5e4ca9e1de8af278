/*!
Binary serialization for a [`ParsedDocument`] (spec §4.I/§6.3/§6.4).

The in-memory tape is not a stable format: string payloads may alias the
original input, and string-buffer offsets only make sense together with
that buffer. The serialized form fixes both problems — every string is
written out in full (deduplicated through a small open-addressed table
keyed by an `xxh3` hash, spec §4.I's closing paragraph) and container
cross-links are stored as signed deltas relative to the word they're
written at, so the decoder can rebuild absolute tape indices without
knowing anything about where the original document's words happened to
land.

Three independently compressed blocks carry the payload: the deduplicated
string buffer, a one-byte-per-word tag column, and an eight-byte-per-word
value column. Splitting tags from values lets a general-purpose compressor
exploit the tag column's small alphabet separately from the value column's
mostly-incompressible numeric payloads.
*/

use std::collections::HashMap;

use xxhash_rust::xxh3::xxh3_64;

use crate::config::CompressMode;
use crate::document::ParsedDocument;
use crate::error::Error;
use crate::tape::{
    decode_word, encode_word, STRING_COPIED_BIT, TAG_ARRAY_CLOSE, TAG_ARRAY_OPEN, TAG_DOUBLE,
    TAG_FALSE, TAG_INT, TAG_NOP, TAG_NULL, TAG_OBJECT_CLOSE, TAG_OBJECT_OPEN, TAG_ROOT, TAG_STRING,
    TAG_TRUE, TAG_UINT,
};

const VERSION: u8 = 1;

const COMPRESSION_RAW: u8 = 0;
const COMPRESSION_LZ4: u8 = 1;
const COMPRESSION_ZSTD: u8 = 2;

fn write_varuint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            break;
        }
    }
}

fn read_varuint(input: &[u8], pos: &mut usize) -> Result<u64, Error> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = *input
            .get(*pos)
            .ok_or(Error::CorruptSerialization { reason: "truncated varuint" })?;
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 63 {
            return Err(Error::CorruptSerialization { reason: "varuint too long" });
        }
    }
    Ok(result)
}

fn compress(mode: CompressMode, data: &[u8]) -> (u8, Vec<u8>) {
    match mode {
        CompressMode::None => (COMPRESSION_RAW, data.to_vec()),
        CompressMode::Fast => (COMPRESSION_LZ4, lz4_flex::compress_prepend_size(data)),
        CompressMode::Default => {
            (COMPRESSION_ZSTD, zstd::encode_all(data, 3).expect("zstd encode never fails on a byte slice"))
        }
        CompressMode::Best => {
            (COMPRESSION_ZSTD, zstd::encode_all(data, 19).expect("zstd encode never fails on a byte slice"))
        }
    }
}

fn decompress(kind: u8, data: &[u8]) -> Result<Vec<u8>, Error> {
    match kind {
        COMPRESSION_RAW => Ok(data.to_vec()),
        COMPRESSION_LZ4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|_| Error::CorruptSerialization { reason: "lz4 block is corrupt" }),
        COMPRESSION_ZSTD => {
            zstd::decode_all(data).map_err(|_| Error::CorruptSerialization { reason: "zstd block is corrupt" })
        }
        _ => Err(Error::CorruptSerialization { reason: "unknown compression kind" }),
    }
}

fn write_block(out: &mut Vec<u8>, mode: CompressMode, raw: &[u8]) {
    let (kind, compressed) = compress(mode, raw);
    write_varuint(out, raw.len() as u64);
    out.push(kind);
    write_varuint(out, compressed.len() as u64);
    out.extend_from_slice(&compressed);
}

fn read_block(input: &[u8], pos: &mut usize) -> Result<Vec<u8>, Error> {
    let uncompressed_len = read_varuint(input, pos)? as usize;
    let kind = *input
        .get(*pos)
        .ok_or(Error::CorruptSerialization { reason: "truncated block header" })?;
    *pos += 1;
    let compressed_len = read_varuint(input, pos)? as usize;
    let compressed = input
        .get(*pos..*pos + compressed_len)
        .ok_or(Error::CorruptSerialization { reason: "truncated block payload" })?;
    *pos += compressed_len;

    let data = decompress(kind, compressed)?;
    if data.len() != uncompressed_len {
        return Err(Error::CorruptSerialization { reason: "block uncompressed length mismatch" });
    }
    Ok(data)
}

/// Open-addressed string dedup table keyed by an `xxh3` hash (spec §4.I).
struct DedupTable<'a> {
    slots: Vec<Option<(u64, &'a [u8], u32)>>,
    mask: usize,
}

impl<'a> DedupTable<'a> {
    fn with_capacity_hint(distinct_strings_upper_bound: usize) -> Self {
        let cap = (distinct_strings_upper_bound.max(1) * 4).next_power_of_two().max(16);
        DedupTable { slots: vec![None; cap], mask: cap - 1 }
    }

    /// Look up `bytes`; if absent, call `insert` to append it to the new
    /// string buffer and record the offset it returns.
    fn get_or_insert(&mut self, bytes: &'a [u8], insert: impl FnOnce(&'a [u8]) -> u32) -> u32 {
        let hash = xxh3_64(bytes);
        let mut i = (hash as usize) & self.mask;
        loop {
            match self.slots[i] {
                None => {
                    let offset = insert(bytes);
                    self.slots[i] = Some((hash, bytes, offset));
                    return offset;
                }
                Some((h, k, offset)) if h == hash && k == bytes => return offset,
                _ => i = (i + 1) & self.mask,
            }
        }
    }
}

fn push_string_to_buffer(strings: &mut Vec<u8>, bytes: &[u8]) -> u32 {
    let offset = strings.len() as u32;
    strings.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    strings.extend_from_slice(bytes);
    strings.push(0);
    offset
}

fn is_container_or_root(tag: u8) -> bool {
    matches!(
        tag,
        TAG_ROOT | TAG_OBJECT_OPEN | TAG_OBJECT_CLOSE | TAG_ARRAY_OPEN | TAG_ARRAY_CLOSE
    )
}

/// Serialize `doc` into the wire format described at module level.
#[tracing::instrument(skip(doc), fields(words = doc.tape_words().len()))]
pub fn serialize(doc: &ParsedDocument, mode: CompressMode) -> Vec<u8> {
    let tape = doc.tape_words();
    let string_count_hint = tape.iter().filter(|&&w| decode_word(w).0 == TAG_STRING).count();

    let mut new_strings: Vec<u8> = Vec::new();
    let mut dedup = DedupTable::with_capacity_hint(string_count_hint);

    let mut tags: Vec<u8> = Vec::with_capacity(tape.len());
    let mut values: Vec<u64> = Vec::with_capacity(tape.len());

    let mut idx = 0usize;
    while idx < tape.len() {
        let (tag, payload) = decode_word(tape[idx]);
        if is_container_or_root(tag) {
            let delta = payload as i64 - idx as i64;
            tags.push(tag);
            values.push(delta as u64);
            idx += 1;
        } else if matches!(tag, TAG_NULL | TAG_TRUE | TAG_FALSE) {
            tags.push(tag);
            values.push(0);
            idx += 1;
        } else if tag == TAG_STRING {
            let bytes = doc.resolve_string_at(idx);
            let new_offset = dedup.get_or_insert(bytes, |b| push_string_to_buffer(&mut new_strings, b));
            tags.push(TAG_STRING);
            values.push(new_offset as u64);
            tags.push(TAG_STRING);
            values.push(tape[idx + 1]);
            idx += 2;
        } else if matches!(tag, TAG_INT | TAG_UINT | TAG_DOUBLE) {
            tags.push(tag);
            values.push(payload);
            tags.push(tag);
            values.push(tape[idx + 1]);
            idx += 2;
        } else if tag == TAG_NOP {
            let gap = payload as usize;
            tags.push(TAG_NOP);
            values.push(gap as u64);
            for _ in 1..gap {
                tags.push(TAG_NOP);
                values.push(0);
            }
            idx += gap;
        } else {
            unreachable!("unexpected tape tag {tag:#x}");
        }
    }

    let mut value_bytes: Vec<u8> = Vec::with_capacity(values.len() * 8);
    for v in &values {
        value_bytes.extend_from_slice(&v.to_le_bytes());
    }

    let mut out = Vec::new();
    out.push(VERSION);
    write_varuint(&mut out, new_strings.len() as u64);
    write_varuint(&mut out, tape.len() as u64);

    let mut blocks = Vec::new();
    write_block(&mut blocks, mode, &new_strings);
    write_block(&mut blocks, mode, &tags);
    write_block(&mut blocks, mode, &value_bytes);
    write_varuint(&mut out, blocks.len() as u64);
    out.extend_from_slice(&blocks);

    out
}

/// Deserialize bytes produced by [`serialize`] back into a [`ParsedDocument`].
///
/// This never depends on SIMD support (spec §6.2 "serialized documents can
/// be deserialized on any CPU"): it's a plain sequential walk.
#[tracing::instrument(skip(input))]
pub fn deserialize(input: &[u8]) -> Result<ParsedDocument, Error> {
    let mut pos = 0usize;
    let version = *input
        .get(pos)
        .ok_or(Error::CorruptSerialization { reason: "empty input" })?;
    pos += 1;
    if version != VERSION {
        return Err(Error::UnsupportedVersion { version });
    }

    let strings_uncompressed_len = read_varuint(input, &mut pos)? as usize;
    let tape_len_words = read_varuint(input, &mut pos)? as usize;
    let total_compressed_payload_len = read_varuint(input, &mut pos)? as usize;

    let blocks_start = pos;
    let strings = read_block(input, &mut pos)?;
    if strings.len() != strings_uncompressed_len {
        return Err(Error::CorruptSerialization { reason: "strings length mismatch with header" });
    }
    let tags = read_block(input, &mut pos)?;
    let value_bytes = read_block(input, &mut pos)?;

    if pos - blocks_start != total_compressed_payload_len {
        tracing::debug!(
            expected = total_compressed_payload_len,
            actual = pos - blocks_start,
            "serialized block framing length mismatch"
        );
        return Err(Error::CorruptSerialization { reason: "block framing length mismatch" });
    }

    if value_bytes.len() != tags.len() * 8 {
        return Err(Error::CorruptSerialization { reason: "tag/value column length mismatch" });
    }
    if tags.len() != tape_len_words {
        return Err(Error::CorruptSerialization { reason: "tape length mismatch with header" });
    }

    let values: Vec<u64> = value_bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect();

    let mut tape: Vec<u64> = Vec::with_capacity(tags.len());
    let mut idx = 0usize;
    while idx < tags.len() {
        let tag = tags[idx];
        if is_container_or_root(tag) {
            let delta = values[idx] as i64;
            let payload = (idx as i64 + delta) as u64;
            tape.push(encode_word(tag, payload));
            idx += 1;
        } else if matches!(tag, TAG_NULL | TAG_TRUE | TAG_FALSE) {
            tape.push(encode_word(tag, 0));
            idx += 1;
        } else if tag == TAG_STRING {
            let new_offset = values[idx];
            let len_word = *values
                .get(idx + 1)
                .ok_or(Error::CorruptSerialization { reason: "truncated string pair" })?;
            tape.push(encode_word(TAG_STRING, new_offset | STRING_COPIED_BIT));
            tape.push(len_word);
            idx += 2;
        } else if matches!(tag, TAG_INT | TAG_UINT | TAG_DOUBLE) {
            let payload = values[idx];
            let value_word = *values
                .get(idx + 1)
                .ok_or(Error::CorruptSerialization { reason: "truncated number pair" })?;
            tape.push(encode_word(tag, payload));
            tape.push(value_word);
            idx += 2;
        } else if tag == TAG_NOP {
            let gap = values[idx] as usize;
            if gap == 0 || idx + gap > tags.len() {
                return Err(Error::CorruptSerialization { reason: "nop span out of range" });
            }
            tape.push(encode_word(TAG_NOP, gap as u64));
            for _ in 1..gap {
                tape.push(encode_word(TAG_NOP, 0));
            }
            idx += gap;
        } else {
            return Err(Error::CorruptSerialization { reason: "unrecognized tag byte" });
        }
    }

    // deserialized documents never alias an original source buffer: every
    // string was rewritten into `strings` during serialization.
    Ok(ParsedDocument::from_parts(Vec::new(), tape, strings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    fn parse(json: &[u8]) -> ParsedDocument {
        let positions = crate::stage1::scan_to_positions(json).unwrap();
        let config = ParserConfig::default();
        let out = crate::tape::build(json, &positions, &config).unwrap();
        ParsedDocument::from_parts(json.to_vec(), out.tape, out.strings)
    }

    #[test]
    fn round_trips_flat_object() {
        let doc = parse(br#"{"a":1,"b":"hello","c":true}"#);
        let bytes = serialize(&doc, CompressMode::None);
        let restored = deserialize(&bytes).unwrap();
        assert_eq!(doc.marshal_json(), restored.marshal_json());
    }

    #[test]
    fn round_trips_with_lz4_compression() {
        let doc = parse(br#"{"values":[1,2,3,4,5],"name":"example"}"#);
        let bytes = serialize(&doc, CompressMode::Fast);
        let restored = deserialize(&bytes).unwrap();
        assert_eq!(doc.marshal_json(), restored.marshal_json());
    }

    #[test]
    fn round_trips_with_zstd_compression() {
        let doc = parse(br#"{"values":[1,2,3,4,5],"name":"example"}"#);
        let bytes = serialize(&doc, CompressMode::Best);
        let restored = deserialize(&bytes).unwrap();
        assert_eq!(doc.marshal_json(), restored.marshal_json());
    }

    #[test]
    fn round_trips_nested_object_first_child() {
        // exercises an open tag whose matching close is deep inside nested
        // content (positive-vs-negative delta orientation, DESIGN.md §9b).
        let doc = parse(br#"{"outer":{"inner":{"deep":1},"sibling":2}}"#);
        let bytes = serialize(&doc, CompressMode::None);
        let restored = deserialize(&bytes).unwrap();
        assert_eq!(doc.marshal_json(), restored.marshal_json());
    }

    #[test]
    fn round_trips_nested_object_last_child() {
        let doc = parse(br#"{"sibling":2,"outer":{"inner":{"deep":1}}}"#);
        let bytes = serialize(&doc, CompressMode::None);
        let restored = deserialize(&bytes).unwrap();
        assert_eq!(doc.marshal_json(), restored.marshal_json());
    }

    #[test]
    fn duplicate_strings_are_deduplicated() {
        let doc = parse(br#"[{"k":"same"},{"k":"same"},{"k":"same"}]"#);
        let bytes = serialize(&doc, CompressMode::None);
        let restored = deserialize(&bytes).unwrap();
        assert_eq!(doc.marshal_json(), restored.marshal_json());
    }

    #[test]
    fn round_trips_ndjson_multiple_roots() {
        let doc = parse(b"{\"a\":1}\n{\"a\":2}\n{\"a\":3}");
        let bytes = serialize(&doc, CompressMode::None);
        let restored = deserialize(&bytes).unwrap();
        assert_eq!(doc.marshal_json(), restored.marshal_json());
    }

    #[test]
    fn rejects_bad_version_byte() {
        let mut bytes = serialize(&parse(b"1"), CompressMode::None);
        bytes[0] = 0xff;
        assert!(matches!(deserialize(&bytes), Err(Error::UnsupportedVersion { version: 0xff })));
    }

    #[test]
    fn rejects_truncated_input() {
        let bytes = serialize(&parse(br#"{"a":1}"#), CompressMode::None);
        assert!(deserialize(&bytes[..bytes.len() - 3]).is_err());
    }
}
