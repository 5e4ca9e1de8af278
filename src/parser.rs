/*!
The public entry point (spec §6.1).

`spec.md` calls this an "external collaborator" to the core algorithm, but
it's the only way §6.1's conceptual API is actually reachable, so it ships
as a real module here rather than staying a summary.
*/

use crate::config::ParserConfig;
use crate::document::ParsedDocument;
use crate::error::Error;
use crate::pipeline;

/// Parses JSON/NDJSON input into [`ParsedDocument`]s.
///
/// Cheap to construct and clone (it just wraps a [`ParserConfig`]); keep
/// one around per configuration rather than rebuilding it per call.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    /// A parser using [`ParserConfig::default`].
    pub fn new() -> Self {
        Parser::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Parser { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse exactly one JSON value. Returns
    /// [`Error::InvalidSyntax`] if `input` contains more than one root
    /// value — use [`Self::parse_ndjson`] for streams of those.
    #[tracing::instrument(skip(self, input), fields(len = input.len()))]
    pub fn parse(&self, input: &[u8]) -> Result<ParsedDocument, Error> {
        self.parse_with_reuse(input, None)
    }

    /// Like [`Self::parse`], but reuses `reuse`'s tape/string-buffer
    /// allocations instead of allocating fresh ones.
    pub fn parse_reusing(&self, input: &[u8], reuse: ParsedDocument) -> Result<ParsedDocument, Error> {
        self.parse_with_reuse(input, Some(reuse))
    }

    fn parse_with_reuse(&self, input: &[u8], reuse: Option<ParsedDocument>) -> Result<ParsedDocument, Error> {
        let doc = self.parse_ndjson_with_reuse(input, reuse)?;
        if doc.roots().count() != 1 {
            tracing::debug!(len = input.len(), "parse() called on input with more than one root");
            return Err(Error::InvalidSyntax { offset: input.len() });
        }
        Ok(doc)
    }

    /// Parse a newline-delimited stream of JSON values into one document
    /// with multiple roots (spec §3.1 "consecutive roots form a linked
    /// chain").
    #[tracing::instrument(skip(self, input), fields(len = input.len()))]
    pub fn parse_ndjson(&self, input: &[u8]) -> Result<ParsedDocument, Error> {
        self.parse_ndjson_with_reuse(input, None)
    }

    pub fn parse_ndjson_reusing(&self, input: &[u8], reuse: ParsedDocument) -> Result<ParsedDocument, Error> {
        self.parse_ndjson_with_reuse(input, Some(reuse))
    }

    fn parse_ndjson_with_reuse(&self, input: &[u8], reuse: Option<ParsedDocument>) -> Result<ParsedDocument, Error> {
        let (_, tape_buf, strings_buf) = reuse.map(ParsedDocument::into_parts).unwrap_or_default();
        let out = pipeline::build_tape(input, &self.config, (tape_buf, strings_buf))?;
        Ok(ParsedDocument::from_parts(input.to_vec(), out.tape, out.strings))
    }
}
