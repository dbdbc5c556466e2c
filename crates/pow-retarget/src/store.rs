//! Read-only header lookup and bounded ancestor traversal.

use std::collections::HashMap;

use crate::hash::BlockHash;
use crate::header::StoredHeader;

/// Lookup of accepted headers by hash.
///
/// This is the only capability the retarget engine needs from the rest of the
/// node. Implementations that hit disk should keep lookups cached or indexed;
/// a retarget boundary walks a full interval of ancestors.
pub trait HeaderStore {
    fn get(&self, hash: &BlockHash) -> Option<StoredHeader>;
}

impl<S: HeaderStore + ?Sized> HeaderStore for &S {
    fn get(&self, hash: &BlockHash) -> Option<StoredHeader> {
        (**self).get(hash)
    }
}

impl HeaderStore for HashMap<BlockHash, StoredHeader> {
    fn get(&self, hash: &BlockHash) -> Option<StoredHeader> {
        HashMap::get(self, hash).cloned()
    }
}

/// In-memory header store.
#[derive(Debug, Clone, Default)]
pub struct MemoryHeaderStore {
    headers: HashMap<BlockHash, StoredHeader>,
}

impl MemoryHeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, returning its hash.
    pub fn insert(&mut self, header: StoredHeader) -> BlockHash {
        let hash = header.hash();
        self.headers.insert(hash, header);
        hash
    }

    pub fn remove(&mut self, hash: &BlockHash) -> Option<StoredHeader> {
        self.headers.remove(hash)
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.headers.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl HeaderStore for MemoryHeaderStore {
    fn get(&self, hash: &BlockHash) -> Option<StoredHeader> {
        self.headers.get(hash).cloned()
    }
}

/// Why an ancestor walk stopped yielding headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkHalt {
    /// Reached a header at height zero.
    Genesis,
    /// The store had no header for the parent at this height.
    Missing { at_height: u32 },
    /// The step cap was reached.
    Limit { limit: u32 },
}

/// Iterator over the ancestors of a header, nearest first.
///
/// Yields at most `max_steps` headers and never the starting header itself.
/// Once it stops, [`Ancestors::halted`] tells why.
pub struct Ancestors<'a, S: ?Sized> {
    store: &'a S,
    parent: BlockHash,
    height: u32,
    steps: u32,
    max_steps: u32,
    halted: Option<WalkHalt>,
}

impl<'a, S: HeaderStore + ?Sized> Ancestors<'a, S> {
    pub fn new(store: &'a S, from: &StoredHeader, max_steps: u32) -> Self {
        Ancestors {
            store,
            parent: from.prev_hash(),
            height: from.height(),
            steps: 0,
            max_steps,
            halted: None,
        }
    }

    /// Number of ancestors yielded so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn halted(&self) -> Option<WalkHalt> {
        self.halted
    }
}

impl<S: HeaderStore + ?Sized> Iterator for Ancestors<'_, S> {
    type Item = StoredHeader;

    fn next(&mut self) -> Option<StoredHeader> {
        if self.halted.is_some() {
            return None;
        }
        if self.height == 0 {
            self.halted = Some(WalkHalt::Genesis);
            return None;
        }
        if self.steps >= self.max_steps {
            self.halted = Some(WalkHalt::Limit { limit: self.max_steps });
            return None;
        }

        match self.store.get(&self.parent) {
            Some(header) => {
                self.steps += 1;
                self.parent = header.prev_hash();
                self.height = header.height();
                Some(header)
            }
            None => {
                self.halted = Some(WalkHalt::Missing { at_height: self.height - 1 });
                None
            }
        }
    }
}
