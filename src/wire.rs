//! On-disk wire structures.
//!
//! All multi-byte fields are little-endian and the structs carry no
//! implicit padding: every field is an alignment-1 `zerocopy` byteorder
//! wrapper, so `size_of::<T>()` matches the on-disk record size exactly.

use zerocopy::byteorder::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const LCFS_MAGIC: u32 = 0x6c63_6673; // "lcfs"
pub const LCFS_VERSION: u32 = 1;

/// Image superblock, at byte offset 0.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub struct Superblock {
    pub version: U32,
    pub magic: U32,
    pub vdata_offset: U64,
}

impl Superblock {
    pub fn new(vdata_offset: u64) -> Self {
        Superblock {
            version: U32::new(LCFS_VERSION),
            magic: U32::new(LCFS_MAGIC),
            vdata_offset: U64::new(vdata_offset),
        }
    }
}

/// A reference into the variable-data region. `(0, 0)` means absent.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct VdataRef {
    pub off: U64,
    pub len: U32,
}

impl VdataRef {
    pub const NONE: VdataRef = VdataRef {
        off: U64::ZERO,
        len: U32::ZERO,
    };

    pub fn new(off: u64, len: u32) -> Self {
        VdataRef {
            off: U64::new(off),
            len: U32::new(len),
        }
    }
}

/// Fixed-size per-inode record.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub struct InodeWire {
    pub st_mode: U32,
    pub st_nlink: U32,
    pub st_uid: U32,
    pub st_gid: U32,
    pub st_rdev: U32,
    pub st_size: U64,
    pub st_mtim_sec: U64,
    pub st_mtim_nsec: U32,
    pub st_ctim_sec: U64,
    pub st_ctim_nsec: U32,
    pub variable_data: VdataRef,
    pub xattrs: VdataRef,
    pub digest: VdataRef,
}

/// A single directory-entry record inside a directory block.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub struct DirentWire {
    pub inode_num: U32,
    pub name_offset: U32,
    pub name_len: u8,
    pub d_type: u8,
    pub _padding: U16,
}

/// POSIX `DT_*` values used in `DirentWire::d_type`.
pub mod d_type {
    pub const UNKNOWN: u8 = 0;
    pub const FIFO: u8 = 1;
    pub const CHR: u8 = 2;
    pub const DIR: u8 = 4;
    pub const BLK: u8 = 6;
    pub const REG: u8 = 8;
    pub const LNK: u8 = 10;
    pub const SOCK: u8 = 12;
}

/// Header prefixing a directory block's entry array.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub struct DirHeader {
    pub n_dirents: U32,
}

/// Header prefixing an xattr block's attribute array.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub struct XattrHeader {
    pub n_attr: U16,
}

/// One (key_length, value_length) descriptor inside an xattr block.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned, Debug, Clone, Copy)]
#[repr(C)]
pub struct XattrDesc {
    pub key_len: U16,
    pub value_len: U16,
}

pub const SUPERBLOCK_SIZE: usize = std::mem::size_of::<Superblock>();
pub const INODE_WIRE_SIZE: usize = std::mem::size_of::<InodeWire>();
pub const DIRENT_WIRE_SIZE: usize = std::mem::size_of::<DirentWire>();
