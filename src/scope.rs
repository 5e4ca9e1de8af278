/*!
The scope stack Stage 2 ([`crate::tape`]) maintains while writing the tape
(spec §3.2).

For each enclosing container, the stack records the tape index where its
open tag was written and a 2-bit discriminator for whether the parent is the
document root, an object, or an array. It's a flat `Vec`, not recursion —
document depth may exceed the host's call-stack budget far more cheaply
than it can exceed a configurable heap-allocated cap (spec §6.5
`max_depth`).
*/

use crate::error::Error;

/// What kind of container (or the document root) a scope entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Discriminator {
    Root = 0,
    Object = 1,
    Array = 2,
}

/// A single entry: which tape index opened this scope, and what kind of
/// container it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScopeEntry {
    tape_index: usize,
    discriminator: Discriminator,
}

impl ScopeEntry {
    #[inline]
    fn encode(&self) -> u64 {
        ((self.tape_index as u64) << 2) | (self.discriminator as u64)
    }

    #[inline]
    fn decode(word: u64) -> Self {
        let discriminator = match word & 0b11 {
            0 => Discriminator::Root,
            1 => Discriminator::Object,
            _ => Discriminator::Array,
        };

        ScopeEntry {
            tape_index: (word >> 2) as usize,
            discriminator,
        }
    }
}

/// Runtime stack of open containers (spec §3.2, §9 "flat vector").
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    // stored pre-encoded as `(tape_index << 2) | discriminator`, matching
    // the bit layout spec §3.2 describes literally.
    entries: Vec<u64>,
    max_depth: usize,
}

impl ScopeStack {
    #[inline]
    pub(crate) fn new(max_depth: usize) -> Self {
        ScopeStack {
            entries: Vec::with_capacity(16),
            max_depth,
        }
    }

    #[inline]
    pub(crate) fn attach(mut buf: Vec<u64>, max_depth: usize) -> Self {
        buf.clear();
        ScopeStack {
            entries: buf,
            max_depth,
        }
    }

    #[inline]
    pub(crate) fn detach(self) -> Vec<u64> {
        self.entries
    }

    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub(crate) fn push(
        &mut self,
        tape_index: usize,
        discriminator: Discriminator,
    ) -> Result<(), Error> {
        if self.entries.len() >= self.max_depth {
            return Err(Error::DepthExceeded {
                max_depth: self.max_depth,
            });
        }

        self.entries.push(
            ScopeEntry {
                tape_index,
                discriminator,
            }
            .encode(),
        );

        Ok(())
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Option<(usize, Discriminator)> {
        self.entries.pop().map(|w| {
            let entry = ScopeEntry::decode(w);
            (entry.tape_index, entry.discriminator)
        })
    }

    #[inline]
    pub(crate) fn top_discriminator(&self) -> Discriminator {
        self.entries
            .last()
            .map(|&w| ScopeEntry::decode(w).discriminator)
            .unwrap_or(Discriminator::Root)
    }
}
