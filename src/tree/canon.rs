//! Canonicalization pass: assigns contiguous breadth-first inode numbers,
//! sorts children and xattrs, and fixes up directory link counts.
//!
//! The BFS-number-then-descend shape is grounded on the EROFS builder's
//! two-pass (`prepare dirents` / `write inodes`) walk in the retrieval
//! pack; the iterative, explicit-queue structure (rather than recursion)
//! follows the eccfs builder's stack-based directory walk, per the
//! DESIGN NOTES recommendation against recursive tree walks.

use std::collections::VecDeque;

use crate::error::{LcfsError, Result};
use crate::tree::node::{mode, Node};

/// Canonical list of nodes in breadth-first visitation order, indexed by
/// their now-assigned `inode_num`.
pub struct CanonicalTree {
    pub nodes: Vec<Node>,
}

pub fn compute_tree(root: Node) -> Result<CanonicalTree> {
    let mut nodes = Vec::new();
    let mut queue = VecDeque::new();
    queue.push_back(root);

    while let Some(node) = queue.pop_front() {
        {
            let data = node.0.borrow();
            if !mode::is_dir(data.mode) && !data.children.is_empty() {
                return Err(LcfsError::InvalidArgument(
                    "non-directory node must not have children",
                ));
            }
        }

        if node.is_dir() {
            let subdirs = node
                .0
                .borrow()
                .children
                .iter()
                .filter(|c| c.is_dir())
                .count();
            node.0.borrow_mut().nlink = 2 + subdirs as u32;

            node.0
                .borrow_mut()
                .children
                .sort_by(|a, b| a.name().unwrap_or_default().cmp(&b.name().unwrap_or_default()));
        }

        node.0
            .borrow_mut()
            .xattrs
            .sort_by(|a, b| a.key.cmp(&b.key));

        // A hard-link alias is never itself serialized as an inode --
        // its dirent refers to the resolved target's inode_num (see
        // `dirent.rs`) -- so it does not consume a table slot. It also
        // cannot be a directory (see `Node::make_hardlink`), so there
        // is nothing to enqueue for it either.
        if node.0.borrow().link_to.is_some() {
            continue;
        }

        let idx = nodes.len() as u32;
        node.0.borrow_mut().inode_num = idx;
        nodes.push(node.clone());

        if node.is_dir() {
            for child in node.0.borrow().children.iter() {
                queue.push_back(child.clone());
            }
        }
    }

    Ok(CanonicalTree { nodes })
}
