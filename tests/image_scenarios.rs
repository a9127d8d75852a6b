//! End-to-end scenarios over the public builder API.

use lcfs_image::tree::node::mode;
use lcfs_image::{compute_tree, write_to, Node};

fn new_dir() -> Node {
    let n = Node::new();
    n.0.borrow_mut().mode = mode::S_IFDIR | 0o755;
    n
}

fn new_file(payload: &[u8]) -> Node {
    let n = Node::new();
    n.0.borrow_mut().mode = mode::S_IFREG | 0o644;
    n.0.borrow_mut().size = payload.len() as u64;
    n.set_payload(payload.to_vec());
    n
}

fn new_symlink(target: &[u8]) -> Node {
    let n = Node::new();
    n.0.borrow_mut().mode = mode::S_IFLNK | 0o777;
    n.set_payload(target.to_vec());
    n
}

#[test]
fn single_empty_root() {
    let root = new_dir();
    let mut out = Vec::new();
    write_to(root, &mut out, None).unwrap();

    assert_eq!(out.len(), 16 + 88); // superblock + one inode, no vdata.
    let vdata_offset = u64::from_le_bytes(out[8..16].try_into().unwrap());
    assert_eq!(vdata_offset as usize, out.len());
}

#[test]
fn two_files_share_deduplicated_content() {
    let root = new_dir();
    let a = new_file(b"sha256:abc");
    let b = new_file(b"sha256:abc");
    root.add_child(&a, b"a").unwrap();
    root.add_child(&b, b"b").unwrap();

    let mut out = Vec::new();
    write_to(root, &mut out, None).unwrap();

    let vdata_offset = u64::from_le_bytes(out[8..16].try_into().unwrap()) as usize;
    let vdata = &out[vdata_offset..];
    let occurrences = vdata
        .windows(b"sha256:abc".len())
        .filter(|w| *w == b"sha256:abc")
        .count();
    assert_eq!(occurrences, 1);
}

#[test]
fn hardlinked_file_appears_once_as_an_inode() {
    let root = new_dir();
    let x = new_file(b"p");
    let y = Node::new();
    y.make_hardlink(&x).unwrap();
    root.add_child(&x, b"x").unwrap();
    root.add_child(&y, b"y").unwrap();

    assert_eq!(x.0.borrow().nlink, 2);

    let tree = compute_tree(root).unwrap();
    // root + x only: y aliases x and is not assigned its own inode_num.
    assert_eq!(tree.nodes.len(), 2);
}

#[test]
fn symlink_payload_round_trips_into_vdata() {
    let root = new_dir();
    let l = new_symlink(b"target");
    root.add_child(&l, b"l").unwrap();

    let mut out = Vec::new();
    write_to(root, &mut out, None).unwrap();
    let vdata_offset = u64::from_le_bytes(out[8..16].try_into().unwrap()) as usize;
    assert!(out[vdata_offset..].windows(6).any(|w| w == b"target"));
}

#[test]
fn xattr_set_order_does_not_affect_output() {
    let build = |order: &[(&[u8], &[u8])]| {
        let root = new_dir();
        let f = new_file(b"x");
        for (k, v) in order {
            f.set_xattr(k, v).unwrap();
        }
        root.add_child(&f, b"f").unwrap();
        let mut out = Vec::new();
        write_to(root, &mut out, None).unwrap();
        out
    };

    let out1 = build(&[(b"user.b", b"2"), (b"user.a", b"1")]);
    let out2 = build(&[(b"user.a", b"1"), (b"user.b", b"2")]);
    assert_eq!(out1, out2);
}

#[test]
fn duplicate_child_name_is_rejected_without_mutating_state() {
    let root = new_dir();
    let a = new_file(b"a");
    let b = new_file(b"b");
    root.add_child(&a, b"dup").unwrap();
    let err = root.add_child(&b, b"dup");
    assert!(err.is_err());
    assert!(b.name().is_none());
    assert_eq!(root.0.borrow().children.len(), 1);
}

#[test]
fn empty_regular_file_has_no_variable_data() {
    let root = new_dir();
    let f = Node::new();
    f.0.borrow_mut().mode = mode::S_IFREG | 0o644;
    f.set_payload(b"should be ignored because size is 0".to_vec());
    root.add_child(&f, b"empty").unwrap();

    let mut out = Vec::new();
    write_to(root, &mut out, None).unwrap();
    // Only the dir block for root should occupy vdata; the empty file's
    // payload must not appear.
    let vdata_offset = u64::from_le_bytes(out[8..16].try_into().unwrap()) as usize;
    let vdata = &out[vdata_offset..];
    assert!(!vdata.windows(4).any(|w| w == b"shou"));
}
