//! Directory block encoding. Inverts the teacher pack's directory-entry
//! *parsing* loops (`xfs/dir/shortform.rs`, `xfs/dir/block.rs`) into an
//! encoder: header, fixed-size dirent array, then concatenated name
//! bytes with no terminators.

use zerocopy::IntoBytes;

use crate::tree::node::{mode, Node};
use crate::wire::{d_type, DirHeader, DirentWire};

fn d_type_for(m: u32) -> u8 {
    match mode::file_type(m) {
        mode::S_IFDIR => d_type::DIR,
        mode::S_IFREG => d_type::REG,
        mode::S_IFLNK => d_type::LNK,
        mode::S_IFBLK => d_type::BLK,
        mode::S_IFCHR => d_type::CHR,
        mode::S_IFIFO => d_type::FIFO,
        mode::S_IFSOCK => d_type::SOCK,
        _ => d_type::UNKNOWN,
    }
}

/// Encodes `node`'s children into a directory block. `node` must
/// already be canonicalized (children sorted, inode numbers assigned).
pub fn encode_dir_block(node: &Node) -> Vec<u8> {
    let children = node.0.borrow().children.clone();
    let mut out = Vec::new();

    out.extend_from_slice(DirHeader {
        n_dirents: (children.len() as u32).into(),
    }.as_bytes());

    let mut name_offset = 0u32;
    let mut names = Vec::new();
    for child in &children {
        let name = child.name().unwrap_or_default();
        let target = child.resolve();
        let target_data = target.0.borrow();
        let dirent = DirentWire {
            inode_num: target_data.inode_num.into(),
            name_offset: name_offset.into(),
            name_len: name.len() as u8,
            d_type: d_type_for(target_data.mode),
            _padding: 0u16.into(),
        };
        out.extend_from_slice(dirent.as_bytes());
        name_offset += name.len() as u32;
        names.push(name);
    }
    for name in names {
        out.extend_from_slice(&name);
    }
    out
}
