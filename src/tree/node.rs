//! In-memory node tree.
//!
//! Grounded on the `Dir`/`File`/`Dirent` staging model of the EROFS
//! builder in the retrieval pack, collapsed into a single recursive
//! `Node` type since this format (unlike EROFS) has no separate
//! shortform/block directory representations to distinguish at this
//! layer. Ownership uses `Rc`/`Weak` rather than the hand-rolled
//! refcounting the spec describes, and node identity (for hard-link and
//! parent comparisons) uses `Rc::ptr_eq`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::{LcfsError, Result};

pub const MAX_NAME_LENGTH: usize = 255;
/// Max length, in bytes, of an xattr key or value (§3: "length ≤ 65535").
pub const MAX_XATTR_LENGTH: usize = 65535;

/// POSIX file-type bits, stored in the low bits of `mode` alongside
/// permission bits, same as `st_mode`.
pub mod mode {
    pub const S_IFMT: u32 = 0o170000;
    pub const S_IFSOCK: u32 = 0o140000;
    pub const S_IFLNK: u32 = 0o120000;
    pub const S_IFREG: u32 = 0o100000;
    pub const S_IFBLK: u32 = 0o060000;
    pub const S_IFDIR: u32 = 0o040000;
    pub const S_IFCHR: u32 = 0o020000;
    pub const S_IFIFO: u32 = 0o010000;

    pub fn file_type(m: u32) -> u32 {
        m & S_IFMT
    }

    pub fn is_dir(m: u32) -> bool {
        file_type(m) == S_IFDIR
    }
}

#[derive(Debug, Clone)]
pub struct Xattr {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Timespec {
    pub sec: u64,
    pub nsec: u32,
}

pub struct NodeData {
    pub name: Option<Vec<u8>>,
    pub parent: Option<Weak<RefCell<NodeData>>>,

    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub rdev: u32,
    pub size: u64,
    pub nlink: u32,
    pub mtime: Timespec,
    pub ctime: Timespec,

    /// Symlink target, or an opaque backing-content reference for a
    /// regular file. Empty means absent.
    pub payload: Vec<u8>,
    pub digest: Option<[u8; 32]>,
    pub xattrs: Vec<Xattr>,
    pub children: Vec<Node>,

    /// Set when this node is a hard link alias; points at the real
    /// target which owns the content and is the one actually
    /// serialized as an inode.
    pub link_to: Option<Node>,

    /// Assigned by the canonicalizer; `u32::MAX` until then.
    pub inode_num: u32,
}

impl Default for NodeData {
    fn default() -> Self {
        NodeData {
            name: None,
            parent: None,
            mode: 0,
            uid: 0,
            gid: 0,
            rdev: 0,
            size: 0,
            nlink: 1,
            mtime: Timespec::default(),
            ctime: Timespec::default(),
            payload: Vec::new(),
            digest: None,
            xattrs: Vec::new(),
            children: Vec::new(),
            link_to: None,
            inode_num: u32::MAX,
        }
    }
}

/// A reference-counted handle to a tree node. Cloning shares the
/// underlying node; it is not a deep copy.
#[derive(Clone)]
pub struct Node(pub Rc<RefCell<NodeData>>);

impl Node {
    pub fn new() -> Self {
        Node(Rc::new(RefCell::new(NodeData::default())))
    }

    pub fn ptr_eq(a: &Node, b: &Node) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    pub fn is_dir(&self) -> bool {
        mode::is_dir(self.0.borrow().mode)
    }

    pub fn name(&self) -> Option<Vec<u8>> {
        self.0.borrow().name.clone()
    }

    pub fn parent(&self) -> Option<Node> {
        self.0
            .borrow()
            .parent
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(Node)
    }

    /// Follows a hard-link chain to the node that actually owns content
    /// and is emitted as a distinct inode. Iterative, guarded against
    /// cycles by a bounded hop count rather than recursion.
    pub fn resolve(&self) -> Node {
        let mut cur = self.clone();
        let mut hops = 0usize;
        loop {
            let next = cur.0.borrow().link_to.clone();
            match next {
                Some(n) => {
                    cur = n;
                    hops += 1;
                    if hops > 4096 {
                        // A well-formed tree never chains this deep;
                        // bail rather than spin forever on bad input.
                        return cur;
                    }
                }
                None => return cur,
            }
        }
    }

    pub fn add_child(&self, child: &Node, name: &[u8]) -> Result<()> {
        if !self.is_dir() {
            return Err(LcfsError::NotDirectory);
        }
        if name.is_empty() || name.len() > MAX_NAME_LENGTH {
            return Err(LcfsError::NameTooLong {
                name: String::from_utf8_lossy(name).into_owned(),
                max: MAX_NAME_LENGTH,
            });
        }
        if child.0.borrow().parent.is_some() {
            return Err(LcfsError::AlreadyAttached);
        }
        {
            let this = self.0.borrow();
            if this.children.iter().any(|c| c.name().as_deref() == Some(name)) {
                return Err(LcfsError::Exists(String::from_utf8_lossy(name).into_owned()));
            }
        }
        child.0.borrow_mut().name = Some(name.to_vec());
        child.0.borrow_mut().parent = Some(Rc::downgrade(&self.0));
        self.0.borrow_mut().children.push(child.clone());
        Ok(())
    }

    pub fn remove_child(&self, name: &[u8]) -> Result<Node> {
        if !self.is_dir() {
            return Err(LcfsError::NotDirectory);
        }
        let mut this = self.0.borrow_mut();
        let idx = this
            .children
            .iter()
            .position(|c| c.name().as_deref() == Some(name))
            .ok_or_else(|| LcfsError::NotFound(String::from_utf8_lossy(name).into_owned()))?;
        let child = this.children.remove(idx);
        drop(this);
        child.0.borrow_mut().name = None;
        child.0.borrow_mut().parent = None;
        Ok(child)
    }

    pub fn lookup_child(&self, name: &[u8]) -> Option<Node> {
        self.0
            .borrow()
            .children
            .iter()
            .find(|c| c.name().as_deref() == Some(name))
            .cloned()
    }

    /// Aliases `self` onto `target`: `self`'s directory entry will refer
    /// to `target`'s inode. Rejects directory targets/sources -- see
    /// the aliased-directory decision recorded in DESIGN.md.
    pub fn make_hardlink(&self, target: &Node) -> Result<()> {
        if self.is_dir() || target.is_dir() {
            return Err(LcfsError::InvalidArgument(
                "hard links to or from directories are not supported",
            ));
        }
        let resolved = target.resolve();
        self.0.borrow_mut().link_to = Some(resolved.clone());
        resolved.0.borrow_mut().nlink += 1;
        Ok(())
    }

    pub fn set_xattr(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.len() > MAX_XATTR_LENGTH {
            return Err(LcfsError::InvalidArgument("xattr key exceeds 65535 bytes"));
        }
        if value.len() > MAX_XATTR_LENGTH {
            return Err(LcfsError::InvalidArgument("xattr value exceeds 65535 bytes"));
        }
        let mut this = self.0.borrow_mut();
        if let Some(x) = this.xattrs.iter_mut().find(|x| x.key == key) {
            x.value = value.to_vec();
        } else {
            this.xattrs.push(Xattr {
                key: key.to_vec(),
                value: value.to_vec(),
            });
        }
        Ok(())
    }

    pub fn get_xattr(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0
            .borrow()
            .xattrs
            .iter()
            .find(|x| x.key == key)
            .map(|x| x.value.clone())
    }

    pub fn unset_xattr(&self, key: &[u8]) -> Result<()> {
        let mut this = self.0.borrow_mut();
        let idx = this
            .xattrs
            .iter()
            .position(|x| x.key == key)
            .ok_or_else(|| LcfsError::NotFound(String::from_utf8_lossy(key).into_owned()))?;
        this.xattrs.remove(idx);
        Ok(())
    }

    pub fn set_payload(&self, payload: Vec<u8>) {
        self.0.borrow_mut().payload = payload;
    }

    pub fn set_fsverity_digest(&self, digest: [u8; 32]) {
        self.0.borrow_mut().digest = Some(digest);
    }

    pub fn compute_fsverity_from_stream(&self, mut ctx: Box<dyn crate::io::fsverity::VerityDigest>, bytes: &[u8]) {
        ctx.update(bytes);
        self.0.borrow_mut().digest = Some(ctx.finalize());
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::mode::S_IFDIR;

    fn dir() -> Node {
        let n = Node::new();
        n.0.borrow_mut().mode = S_IFDIR;
        n
    }

    #[test]
    fn add_and_lookup_child() {
        let root = dir();
        let child = Node::new();
        root.add_child(&child, b"a").unwrap();
        assert!(root.lookup_child(b"a").is_some());
        assert!(Node::ptr_eq(&root.lookup_child(b"a").unwrap(), &child));
    }

    #[test]
    fn duplicate_name_rejected_without_mutation() {
        let root = dir();
        let a = Node::new();
        let b = Node::new();
        root.add_child(&a, b"x").unwrap();
        let err = root.add_child(&b, b"x");
        assert!(matches!(err, Err(LcfsError::Exists(_))));
        assert!(b.0.borrow().parent.is_none());
        assert_eq!(root.0.borrow().children.len(), 1);
    }

    #[test]
    fn hardlink_to_directory_rejected() {
        let root = dir();
        let a = dir();
        let b = Node::new();
        let err = b.make_hardlink(&a);
        assert!(matches!(err, Err(LcfsError::InvalidArgument(_))));
        let _ = root;
    }

    #[test]
    fn hardlink_bumps_nlink_and_resolves() {
        let target = Node::new();
        let alias = Node::new();
        alias.make_hardlink(&target).unwrap();
        assert_eq!(target.0.borrow().nlink, 2);
        assert!(Node::ptr_eq(&alias.resolve(), &target));
    }

    #[test]
    fn unset_xattr_reports_not_found() {
        let n = Node::new();
        n.set_xattr(b"user.a", b"1").unwrap();
        assert!(n.unset_xattr(b"user.a").is_ok());
        assert!(matches!(n.unset_xattr(b"user.a"), Err(LcfsError::NotFound(_))));
    }

    #[test]
    fn set_xattr_rejects_oversized_value() {
        let n = Node::new();
        let huge = vec![0u8; MAX_XATTR_LENGTH + 1];
        assert!(matches!(
            n.set_xattr(b"user.a", &huge),
            Err(LcfsError::InvalidArgument(_))
        ));
        assert!(n.get_xattr(b"user.a").is_none());
    }
}
