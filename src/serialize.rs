//! Top-level image serialization: superblock, flat inode table, pad,
//! vdata region. The phased control flow (compute vdata first, then
//! stream the fixed parts, then the vdata bytes) follows the same
//! prepare-then-write split used by the EROFS builder's
//! `Builder::finalize` in the retrieval pack, and the teacher's own
//! `orchestrator::run_scan` phase-by-phase structure.

use std::io::Write;

use zerocopy::IntoBytes;

use crate::dirent::encode_dir_block;
use crate::error::Result;
use crate::io::fsverity::VerityDigest;
use crate::io::writer::DigestingWriter;
use crate::tree::node::{mode, Node};
use crate::tree::{compute_tree, CanonicalTree};
use crate::vdata::{AppendFlags, VdataArena};
use crate::wire::{InodeWire, Superblock, VdataRef as WireVdataRef, INODE_WIRE_SIZE, SUPERBLOCK_SIZE};
use crate::xattr::encode_xattr_block;

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

struct NodeRefs {
    variable_data: WireVdataRef,
    xattrs: WireVdataRef,
    digest: WireVdataRef,
}

fn compute_vdata(tree: &CanonicalTree) -> (VdataArena, Vec<NodeRefs>) {
    let mut arena = VdataArena::new();
    let mut refs = Vec::with_capacity(tree.nodes.len());

    for node in &tree.nodes {
        let data = node.0.borrow();
        let is_dir = mode::is_dir(data.mode);
        let is_regular = mode::file_type(data.mode) == mode::S_IFREG;
        let has_payload = !data.payload.is_empty() && (!is_regular || data.size != 0);
        let variable_data = if is_dir {
            drop(data);
            let block = encode_dir_block(node);
            let r = arena.append(&block, AppendFlags::ALIGN);
            WireVdataRef::new(r.off, r.len)
        } else if has_payload {
            let payload = data.payload.clone();
            drop(data);
            let r = arena.append(&payload, AppendFlags::DEDUP);
            WireVdataRef::new(r.off, r.len)
        } else {
            WireVdataRef::NONE
        };

        let digest = node
            .0
            .borrow()
            .digest
            .map(|d| {
                let r = arena.append(&d, AppendFlags::DEDUP);
                WireVdataRef::new(r.off, r.len)
            })
            .unwrap_or(WireVdataRef::NONE);

        let xattrs = if node.0.borrow().xattrs.is_empty() {
            WireVdataRef::NONE
        } else {
            let block = encode_xattr_block(node);
            let r = arena.append(&block, AppendFlags::DEDUP | AppendFlags::ALIGN);
            WireVdataRef::new(r.off, r.len)
        };

        refs.push(NodeRefs {
            variable_data,
            xattrs,
            digest,
        });
    }

    (arena, refs)
}

fn to_inode_wire(node: &Node, refs: &NodeRefs) -> InodeWire {
    let data = node.0.borrow();
    InodeWire {
        st_mode: data.mode.into(),
        st_nlink: data.nlink.into(),
        st_uid: data.uid.into(),
        st_gid: data.gid.into(),
        st_rdev: data.rdev.into(),
        st_size: data.size.into(),
        st_mtim_sec: data.mtime.sec.into(),
        st_mtim_nsec: data.mtime.nsec.into(),
        st_ctim_sec: data.ctime.sec.into(),
        st_ctim_nsec: data.ctime.nsec.into(),
        variable_data: refs.variable_data,
        xattrs: refs.xattrs,
        digest: refs.digest,
    }
}

/// Writes the canonical image for the tree rooted at `root` to `sink`.
/// If `digest_ctx` is provided, every byte written to `sink` is also
/// fed to it, and the finalized digest is returned.
pub fn write_to<W: Write>(
    root: Node,
    sink: W,
    digest_ctx: Option<Box<dyn VerityDigest>>,
) -> Result<Option<[u8; 32]>> {
    let tree = compute_tree(root)?;
    let (arena, refs) = compute_vdata(&tree);

    let inode_table_size = tree.nodes.len() * INODE_WIRE_SIZE;
    let vdata_offset = align_up(SUPERBLOCK_SIZE + inode_table_size, 4) as u64;

    let mut w = DigestingWriter::new(sink, digest_ctx);

    let sb = Superblock::new(vdata_offset);
    w.write_bytes(sb.as_bytes())?;

    for (node, node_refs) in tree.nodes.iter().zip(refs.iter()) {
        let wire = to_inode_wire(node, node_refs);
        w.write_bytes(wire.as_bytes())?;
    }

    assert_eq!(
        w.bytes_written() as usize,
        SUPERBLOCK_SIZE + inode_table_size,
        "inode table size drifted from the pre-computed budget"
    );

    let pad = vdata_offset as usize - (SUPERBLOCK_SIZE + inode_table_size);
    w.write_zeros(pad)?;

    w.write_bytes(arena.as_bytes())?;

    Ok(w.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::mode::S_IFDIR;
    use crate::wire::SUPERBLOCK_SIZE;

    fn dir() -> Node {
        let n = Node::new();
        n.0.borrow_mut().mode = S_IFDIR;
        n
    }

    #[test]
    fn empty_root_produces_one_inode_no_vdata() {
        let root = dir();
        let mut out = Vec::new();
        write_to(root, &mut out, None).unwrap();

        assert_eq!(out.len(), SUPERBLOCK_SIZE + INODE_WIRE_SIZE);
        let sb = &out[0..SUPERBLOCK_SIZE];
        let vdata_offset = u64::from_le_bytes(sb[8..16].try_into().unwrap());
        assert_eq!(vdata_offset, (SUPERBLOCK_SIZE + INODE_WIRE_SIZE) as u64);
    }

    #[test]
    fn canonicality_is_order_independent() {
        use crate::tree::node::mode::S_IFREG;

        let build = |first: &[u8], second: &[u8]| {
            let root = dir();
            let a = Node::new();
            a.0.borrow_mut().mode = S_IFREG;
            a.set_payload(b"same-bytes".to_vec());
            a.0.borrow_mut().size = 10;
            let b = Node::new();
            b.0.borrow_mut().mode = S_IFREG;
            b.set_payload(b"same-bytes".to_vec());
            b.0.borrow_mut().size = 10;
            root.add_child(&a, first).unwrap();
            root.add_child(&b, second).unwrap();
            let mut out = Vec::new();
            write_to(root, &mut out, None).unwrap();
            out
        };

        let out1 = build(b"a", b"b");
        let out2 = build(b"a", b"b");
        assert_eq!(out1, out2);
    }

    #[test]
    fn shared_payload_is_deduplicated() {
        use crate::tree::node::mode::S_IFREG;

        let root = dir();
        let a = Node::new();
        a.0.borrow_mut().mode = S_IFREG;
        a.set_payload(b"shared".to_vec());
        a.0.borrow_mut().size = 6;
        let b = Node::new();
        b.0.borrow_mut().mode = S_IFREG;
        b.set_payload(b"shared".to_vec());
        b.0.borrow_mut().size = 6;
        root.add_child(&a, b"a").unwrap();
        root.add_child(&b, b"b").unwrap();

        let mut out = Vec::new();
        write_to(root, &mut out, None).unwrap();
        let vdata_offset = u64::from_le_bytes(out[8..16].try_into().unwrap()) as usize;
        let vdata = &out[vdata_offset..];
        // "shared" should appear exactly once in the vdata region.
        let occurrences = vdata
            .windows(b"shared".len())
            .filter(|w| *w == b"shared")
            .count();
        assert_eq!(occurrences, 1);
    }
}
