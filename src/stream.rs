/*!
Chunked NDJSON consumption over `std::io::Read` (spec §6.1 `parse_ndjson_stream`).

JSON forbids literal, unescaped control characters inside strings (RFC 8259
§7), so a raw `\n` byte in a well-formed NDJSON stream can never be part of a
string's content — it is always a genuine line separator. That means a
reader doesn't need to re-derive Stage 1's own dangling-quote bookkeeping at
the chunk level: it only has to find the last `\n` in whatever bytes it has
buffered, parse everything up to it, and keep the remainder for the next
read. What's left over after the last newline in a buffer is exactly the
"partial structural index" this module re-attaches to the front of the next
chunk before re-scanning.
*/

use crate::config::ParserConfig;
use crate::document::ParsedDocument;
use crate::error::Error;
use crate::parser::Parser;

/// Size of each raw `read()` call. Independent of [`crate::pipeline::SERIAL_THRESHOLD`]:
/// a chunk may still end up parsed on the serial path if the stream happens
/// to put a newline early.
const READ_SIZE: usize = 64 * 1024;

/// Reads NDJSON off a [`std::io::Read`] source in bounded chunks, yielding
/// one [`ParsedDocument`] per chunk (each document may itself hold several
/// roots, one per line in that chunk).
///
/// A partial line straddling two `read()` calls is buffered and re-attached
/// to the front of the next chunk rather than parsed early.
pub struct NdjsonReader<R> {
    reader: R,
    parser: Parser,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: std::io::Read> NdjsonReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, ParserConfig::default())
    }

    pub fn with_config(reader: R, config: ParserConfig) -> Self {
        NdjsonReader {
            reader,
            parser: Parser::with_config(config),
            buf: Vec::new(),
            eof: false,
        }
    }

    /// Returns the next chunk's parsed document, reusing `recycle`'s
    /// allocations if supplied (spec §6.1 "non-blocking writes on the
    /// recycle channel"; here modeled as a plain by-value handback, since a
    /// pull-based reader has no separate writer thread to race with).
    ///
    /// Returns `None` once the stream is exhausted with no remaining bytes.
    /// The final `Some` before that may carry an [`Error`] describing why
    /// the stream ended abnormally (spec: "a final result carries the
    /// end-of-stream error").
    #[tracing::instrument(skip_all)]
    pub fn next_chunk(&mut self, recycle: Option<ParsedDocument>) -> Option<Result<ParsedDocument, Error>> {
        let chunk = loop {
            if let Some(boundary) = self.buf.iter().rposition(|&b| b == b'\n') {
                let candidate: Vec<u8> = self.buf.drain(..=boundary).collect();
                if candidate.iter().all(|&b| matches!(b, b'\n' | b'\r' | b' ' | b'\t')) {
                    // blank line(s) only; keep accumulating before we hand
                    // an empty chunk to the parser.
                    continue;
                }
                break candidate;
            }

            if self.eof {
                if self.buf.is_empty() {
                    return None;
                }
                break std::mem::take(&mut self.buf);
            }

            let mut tmp = [0u8; READ_SIZE];
            match self.reader.read(&mut tmp) {
                Ok(0) => self.eof = true,
                Ok(n) => self.buf.extend_from_slice(&tmp[..n]),
                Err(e) => {
                    tracing::debug!(error = %e, "ndjson stream read failed");
                    return Some(Err(Error::from(e)));
                }
            }
        };

        let result = match recycle {
            Some(doc) => self.parser.parse_ndjson_reusing(&chunk, doc),
            None => self.parser.parse_ndjson(&chunk),
        };
        if let Err(ref e) = result {
            tracing::debug!(error = %e, "ndjson chunk failed to parse");
        }
        Some(result)
    }
}
