/*!
# `tapeson`

A validating, SIMD-accelerated parser for bulk JSON and NDJSON throughput.
Rather than building a tree of boxed values, a parse produces a flat tape
(`Vec<u64>`) plus a string buffer — see [`document`] for the representation
and navigation API, [`parser`] for the entry points most callers want.

## ⚠️ CAREFUL

This library contains a _lot_ of unsafe code and is very performance
sensitive. Any changes need to be carefully considered and should be:

- tested against the benchmarks to make sure we don't regress (at least not
  accidentally).
- fuzz tested to ensure there aren't soundness holes introduced.

We take advantage of properties of the JSON grammar to avoid bounds checks
wherever possible. Hot paths try to avoid branching as much as possible.

Any unchecked operations performed on the document are done using macros
that use the checked variant in test/debug builds (or when the `checked`
feature is enabled) to make sure we don't ever cause UB when working
through documents.
*/

#![cfg_attr(checked, deny(warnings))]
#![allow(clippy::missing_safety_doc)] // false positives

pub(crate) mod std_ext;

#[macro_use]
mod macros;

mod atom;
mod number;
mod scope;
mod stage1;
mod string;
mod tape;

pub mod codec;
pub mod config;
pub mod cpu;
pub mod document;
pub mod error;
pub(crate) mod indexslot;
pub mod parser;
pub mod pipeline;
pub(crate) mod simd;
pub mod stream;

pub use config::{CompressMode, ParserConfig};
pub use document::{ArrayElements, Iter, ObjectEntries, ParsedDocument, RootsIter, ValueKind};
pub use error::{Error, Result};
pub use parser::Parser;
pub use stream::NdjsonReader;
