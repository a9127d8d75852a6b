//! The variable-data arena: a growable byte buffer backing directory
//! blocks, xattr blocks, symlink targets, file payloads, and content
//! digests, with content-hash deduplication so repeated blobs are
//! stored once.
//!
//! Unlike the pointer-to-arena-base indirection described in the format
//! this crate targets, the dedup index here keys on plain `(offset,
//! length)` pairs and re-slices the arena `Vec<u8>` at probe time --
//! reallocation never invalidates a `Vec`'s logical content, only its
//! backing pointer, so there is nothing to pin.

use std::collections::HashMap;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AppendFlags: u32 {
        /// Coalesce with an existing equal blob instead of appending a new copy.
        const DEDUP = 1 << 0;
        /// Pad the arena to a 4-byte boundary before appending.
        const ALIGN = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VdataRef {
    pub off: u64,
    pub len: u32,
}

impl VdataRef {
    pub const NONE: VdataRef = VdataRef { off: 0, len: 0 };
}

pub struct VdataArena {
    buf: Vec<u8>,
    // Rolling hash bucket -> candidate (offset, length) pairs.
    index: HashMap<u64, Vec<(u64, u32)>>,
    n_buckets: u64,
}

const DEFAULT_BUCKETS: u64 = 4099;

impl VdataArena {
    pub fn new() -> Self {
        VdataArena {
            buf: Vec::new(),
            index: HashMap::new(),
            n_buckets: DEFAULT_BUCKETS,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn rolling_hash(&self, data: &[u8]) -> u64 {
        let mut h: u64 = 0;
        for &byte in data {
            h = (h.wrapping_mul(31).wrapping_add(byte as u64)) % self.n_buckets;
        }
        h
    }

    /// Appends `data` according to `flags`, returning the resulting
    /// `(offset, length)` reference. An empty `data` with `ALIGN` still
    /// only pads if a non-empty blob follows; callers that have nothing
    /// to store should skip calling `append` entirely and use
    /// `VdataRef::NONE`.
    pub fn append(&mut self, data: &[u8], flags: AppendFlags) -> VdataRef {
        if data.is_empty() {
            return VdataRef::NONE;
        }

        if flags.contains(AppendFlags::DEDUP) {
            let h = self.rolling_hash(data);
            if let Some(candidates) = self.index.get(&h) {
                for &(off, len) in candidates {
                    if len as usize == data.len()
                        && &self.buf[off as usize..off as usize + len as usize] == data
                    {
                        return VdataRef { off, len };
                    }
                }
            }
        }

        if flags.contains(AppendFlags::ALIGN) {
            let pad = (4 - (self.buf.len() % 4)) % 4;
            self.buf.extend(std::iter::repeat(0u8).take(pad));
        }

        let off = self.buf.len() as u64;
        let len = data.len() as u32;
        self.buf.extend_from_slice(data);

        if flags.contains(AppendFlags::DEDUP) {
            let h = self.rolling_hash(data);
            self.index.entry(h).or_default().push((off, len));
        }

        VdataRef { off, len }
    }
}

impl Default for VdataArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_returns_same_reference() {
        let mut arena = VdataArena::new();
        let a = arena.append(b"hello", AppendFlags::DEDUP);
        let b = arena.append(b"hello", AppendFlags::DEDUP);
        assert_eq!(a, b);
        assert_eq!(arena.len(), 5);
    }

    #[test]
    fn align_pads_to_four_bytes() {
        let mut arena = VdataArena::new();
        arena.append(b"abc", AppendFlags::empty());
        let r = arena.append(b"xyz", AppendFlags::ALIGN);
        assert_eq!(r.off % 4, 0);
    }

    #[test]
    fn empty_blob_is_none() {
        let mut arena = VdataArena::new();
        let r = arena.append(b"", AppendFlags::DEDUP | AppendFlags::ALIGN);
        assert_eq!(r, VdataRef::NONE);
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn distinct_blobs_not_merged() {
        let mut arena = VdataArena::new();
        let a = arena.append(b"hello", AppendFlags::DEDUP);
        let b = arena.append(b"world", AppendFlags::DEDUP);
        assert_ne!(a, b);
    }
}
