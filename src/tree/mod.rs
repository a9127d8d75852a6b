pub mod canon;
pub mod node;

pub use canon::{compute_tree, CanonicalTree};
pub use node::{mode, Node, Timespec, Xattr};
