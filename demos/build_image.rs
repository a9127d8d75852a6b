//! Ingests a directory from the host filesystem and writes a composefs
//! image to stdout.
//!
//! Usage: `build_image <directory> [output-file]`

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use lcfs_image::{build_from_filesystem, write_to, BuildFlags, Sha256VerityDigest};

fn main() -> io::Result<()> {
    let mut args = std::env::args_os().skip(1);
    let dir = args.next().unwrap_or_else(|| OsString::from("."));
    let out_path = args.next();

    let path = Path::new(&dir);
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let name: &OsStr = path.file_name().unwrap_or_else(|| OsStr::new("."));

    let parent_file = File::open(parent)?;
    let root = build_from_filesystem(parent_file.as_raw_fd(), name, BuildFlags::empty())
        .map_err(io::Error::other)?;

    let digest_ctx: Box<dyn lcfs_image::VerityDigest> = Box::new(Sha256VerityDigest::new());

    let digest = match out_path {
        Some(path) => {
            let f = File::create(path)?;
            write_to(root, f, Some(digest_ctx)).map_err(io::Error::other)?
        }
        None => {
            let stdout = io::stdout();
            write_to(root, stdout.lock(), Some(digest_ctx)).map_err(io::Error::other)?
        }
    };

    if let Some(d) = digest {
        eprintln!("fs-verity digest: {}", d.iter().map(|b| format!("{:02x}", b)).collect::<String>());
    }
    io::stdout().flush()?;
    Ok(())
}
