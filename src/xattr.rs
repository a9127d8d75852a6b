//! Xattr block encoding: header, fixed-size descriptor array, then
//! concatenated key bytes followed by concatenated value bytes, in
//! per-attribute order. Byte-packing style follows the same
//! header-then-array-then-blob shape as `dirent.rs`.

use zerocopy::IntoBytes;

use crate::tree::node::Node;
use crate::wire::{XattrDesc, XattrHeader};

/// Encodes `node`'s xattrs into a block. `node` must already be
/// canonicalized (xattrs sorted by key).
pub fn encode_xattr_block(node: &Node) -> Vec<u8> {
    let xattrs = node.0.borrow().xattrs.clone();
    let mut out = Vec::new();

    out.extend_from_slice(XattrHeader {
        n_attr: (xattrs.len() as u16).into(),
    }.as_bytes());

    for x in &xattrs {
        out.extend_from_slice(XattrDesc {
            key_len: (x.key.len() as u16).into(),
            value_len: (x.value.len() as u16).into(),
        }.as_bytes());
    }
    for x in &xattrs {
        out.extend_from_slice(&x.key);
    }
    for x in &xattrs {
        out.extend_from_slice(&x.value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_sorted_attrs() {
        let n = Node::new();
        n.set_xattr(b"user.b", b"2").unwrap();
        n.set_xattr(b"user.a", b"1").unwrap();
        n.0.borrow_mut().xattrs.sort_by(|a, b| a.key.cmp(&b.key));

        let block = encode_xattr_block(&n);
        let n_attr = u16::from_le_bytes(block[0..2].try_into().unwrap());
        assert_eq!(n_attr, 2);
        assert!(block.ends_with(b"12") || block.ends_with(b"21"));
    }

    #[test]
    fn order_independent_after_sort() {
        let a = Node::new();
        a.set_xattr(b"user.b", b"2").unwrap();
        a.set_xattr(b"user.a", b"1").unwrap();
        a.0.borrow_mut().xattrs.sort_by(|x, y| x.key.cmp(&y.key));

        let b = Node::new();
        b.set_xattr(b"user.a", b"1").unwrap();
        b.set_xattr(b"user.b", b"2").unwrap();
        b.0.borrow_mut().xattrs.sort_by(|x, y| x.key.cmp(&y.key));

        assert_eq!(encode_xattr_block(&a), encode_xattr_block(&b));
    }
}
