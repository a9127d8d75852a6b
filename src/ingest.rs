//! Host filesystem ingestion: builds a node tree from a real directory.
//!
//! The `fstatat`/`readdir`/`/proc/self/fd`-xattr approach mirrors the
//! puzzlefs builder in the retrieval pack, including hard-link
//! detection via a host-inode-number map; conventions for which libc
//! calls to reach for and how to wrap raw fds follow the teacher's own
//! usage in `io::engine` (even though that module itself was trimmed,
//! its `CString`/`RawFd` handling style carries over here).

use std::collections::HashMap;
use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;

use crate::error::{LcfsError, Result};
use crate::flags::BuildFlags;
use crate::tree::node::{mode, Timespec};
use crate::tree::Node;

struct RawFdGuard(RawFd);

impl Drop for RawFdGuard {
    fn drop(&mut self) {
        if self.0 >= 0 {
            unsafe {
                libc::close(self.0);
            }
        }
    }
}

fn path_join(base: &str, name: &OsStr) -> String {
    if base.is_empty() {
        String::from_utf8_lossy(name.as_bytes()).into_owned()
    } else {
        format!("{}/{}", base, String::from_utf8_lossy(name.as_bytes()))
    }
}

fn cstr(name: &OsStr) -> Result<CString> {
    CString::new(name.as_bytes()).map_err(|_| LcfsError::InvalidArgument("name contains NUL byte"))
}

/// Builds a node tree rooted at `dirfd`/`fname` on the host filesystem.
/// `host_links` tracks host inode numbers already seen, so repeated
/// `(dev, ino)` pairs become hard-link aliases instead of duplicate
/// content.
pub fn build_from_filesystem(dirfd: RawFd, fname: &OsStr, flags: BuildFlags) -> Result<Node> {
    let mut host_links: HashMap<(u64, u64), Node> = HashMap::new();
    ingest_path(dirfd, fname, String::new(), flags, &mut host_links)
}

fn ingest_path(
    dirfd: RawFd,
    fname: &OsStr,
    display_path: String,
    flags: BuildFlags,
    host_links: &mut HashMap<(u64, u64), Node>,
) -> Result<Node> {
    let c_name = cstr(fname)?;
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    let rc = unsafe {
        libc::fstatat(
            dirfd,
            c_name.as_ptr(),
            &mut st as *mut _,
            libc::AT_SYMLINK_NOFOLLOW,
        )
    };
    if rc != 0 {
        return Err(LcfsError::NoData(display_path));
    }

    let host_key = (st.st_dev as u64, st.st_ino as u64);
    let is_dir = (st.st_mode as u32) & mode::S_IFMT == mode::S_IFDIR;
    let is_reg = (st.st_mode as u32) & mode::S_IFMT == mode::S_IFREG;
    let is_link = (st.st_mode as u32) & mode::S_IFMT == mode::S_IFLNK;

    if !is_dir && st.st_nlink > 1 {
        if let Some(existing) = host_links.get(&host_key) {
            let alias = Node::new();
            alias.make_hardlink(existing)?;
            return Ok(alias);
        }
    }

    if (flags.contains(BuildFlags::SKIP_DEVICES))
        && matches!(
            (st.st_mode as u32) & mode::S_IFMT,
            mode::S_IFBLK | mode::S_IFCHR
        )
    {
        return Err(LcfsError::NoData(display_path));
    }

    let node = Node::new();
    {
        let mut data = node.0.borrow_mut();
        data.mode = st.st_mode as u32;
        data.uid = st.st_uid;
        data.gid = st.st_gid;
        data.rdev = st.st_rdev as u32;
        data.size = st.st_size as u64;
        data.nlink = 1;
        if !flags.contains(BuildFlags::USE_EPOCH) {
            data.mtime = Timespec {
                sec: st.st_mtime as u64,
                nsec: st.st_mtime_nsec as u32,
            };
            data.ctime = Timespec {
                sec: st.st_ctime as u64,
                nsec: st.st_ctime_nsec as u32,
            };
        }
    }

    if !is_dir {
        host_links.insert(host_key, node.clone());
    }

    let opath_fd = unsafe {
        libc::openat(
            dirfd,
            c_name.as_ptr(),
            libc::O_PATH | libc::O_NOFOLLOW | libc::O_CLOEXEC,
        )
    };
    let opath = RawFdGuard(opath_fd);
    if opath_fd < 0 && !is_link {
        return Err(LcfsError::NoData(display_path));
    }

    if !flags.contains(BuildFlags::SKIP_XATTRS) && opath_fd >= 0 {
        ingest_xattrs(opath_fd, &node)?;
    }

    if is_link {
        let mut buf = vec![0u8; 4096];
        let n = unsafe {
            libc::readlinkat(
                dirfd,
                c_name.as_ptr(),
                buf.as_mut_ptr() as *mut libc::c_char,
                buf.len(),
            )
        };
        if n < 0 {
            return Err(LcfsError::NoData(display_path));
        }
        buf.truncate(n as usize);
        node.set_payload(buf);
    } else if is_reg && flags.contains(BuildFlags::COMPUTE_DIGEST) && st.st_size > 0 {
        let fd = unsafe { libc::openat(dirfd, c_name.as_ptr(), libc::O_RDONLY | libc::O_CLOEXEC) };
        if fd < 0 {
            return Err(LcfsError::NoData(display_path));
        }
        let guard = RawFdGuard(fd);
        let mut ctx: Box<dyn crate::io::fsverity::VerityDigest> =
            Box::new(crate::io::fsverity::Sha256VerityDigest::new());
        let mut buf = vec![0u8; 65536];
        loop {
            let n = unsafe { libc::read(guard.0, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n < 0 {
                return Err(LcfsError::NoData(display_path));
            }
            if n == 0 {
                break;
            }
            ctx.update(&buf[..n as usize]);
        }
        node.set_fsverity_digest(ctx.finalize());
    } else if is_dir {
        ingest_dir_children(dirfd, &c_name, &node, &display_path, flags, host_links)?;
    }

    Ok(node)
}

fn ingest_xattrs(opath_fd: RawFd, node: &Node) -> Result<()> {
    let proc_path = format!("/proc/self/fd/{}\0", opath_fd);
    let mut list_buf = vec![0u8; 4096];
    let list_len = unsafe {
        libc::listxattr(
            proc_path.as_ptr() as *const libc::c_char,
            list_buf.as_mut_ptr() as *mut libc::c_char,
            list_buf.len(),
        )
    };
    if list_len < 0 {
        // No xattr support on this filesystem/path; not an error.
        return Ok(());
    }
    list_buf.truncate(list_len as usize);

    for key in list_buf.split(|&b| b == 0).filter(|s| !s.is_empty()) {
        let key_c = CString::new(key).map_err(|_| LcfsError::InvalidArgument("xattr name contains NUL"))?;
        let mut val_buf = vec![0u8; 4096];
        let val_len = unsafe {
            libc::getxattr(
                proc_path.as_ptr() as *const libc::c_char,
                key_c.as_ptr(),
                val_buf.as_mut_ptr() as *mut libc::c_void,
                val_buf.len(),
            )
        };
        if val_len < 0 {
            continue;
        }
        val_buf.truncate(val_len as usize);
        node.set_xattr(key, &val_buf)?;
    }
    Ok(())
}

fn ingest_dir_children(
    parent_dirfd: RawFd,
    c_name: &CString,
    node: &Node,
    display_path: &str,
    flags: BuildFlags,
    host_links: &mut HashMap<(u64, u64), Node>,
) -> Result<()> {
    let fd = unsafe {
        libc::openat(
            parent_dirfd,
            c_name.as_ptr(),
            libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC,
        )
    };
    if fd < 0 {
        return Err(LcfsError::NoData(display_path.to_string()));
    }
    let guard = RawFdGuard(fd);

    let dirp = unsafe { libc::fdopendir(guard.0) };
    if dirp.is_null() {
        return Err(LcfsError::NoData(display_path.to_string()));
    }
    // `fdopendir` takes ownership of the fd; it is closed by `closedir`,
    // not by `RawFdGuard`.
    std::mem::forget(guard);

    loop {
        unsafe { *libc::__errno_location() = 0 };
        let entry = unsafe { libc::readdir(dirp) };
        if entry.is_null() {
            break;
        }
        let name = unsafe {
            std::ffi::CStr::from_ptr((*entry).d_name.as_ptr())
        };
        let name_bytes = name.to_bytes();
        if name_bytes == b"." || name_bytes == b".." {
            continue;
        }
        let os_name = OsStr::from_bytes(name_bytes);
        let child_path = path_join(display_path, os_name);
        let child = ingest_path(fd, os_name, child_path, flags, host_links)?;
        node.add_child(&child, name_bytes)?;
    }

    unsafe { libc::closedir(dirp) };
    Ok(())
}
