//! Deterministic builder for composefs-style read-only filesystem images.
//!
//! A caller constructs a [`tree::Node`] tree (directly, or via
//! [`ingest::build_from_filesystem`] when the `fs` feature is enabled),
//! then hands the root to [`serialize::write_to`] to produce a
//! byte-exact image: any two trees with the same logical content
//! produce the same bytes, regardless of construction order.

pub mod diag;
pub mod dirent;
pub mod error;
pub mod flags;
pub mod io;
pub mod serialize;
pub mod tree;
pub mod vdata;
pub mod wire;
pub mod xattr;

#[cfg(feature = "fs")]
pub mod ingest;

pub use error::{LcfsError, Result};
pub use flags::BuildFlags;
pub use io::fsverity::{Sha256VerityDigest, VerityDigest};
pub use serialize::write_to;
pub use tree::{compute_tree, Node};

#[cfg(feature = "fs")]
pub use ingest::build_from_filesystem;
