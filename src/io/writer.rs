//! Streaming output sink. Wraps any `std::io::Write` and optionally tees
//! every byte into an fs-verity digest context, so the digest covers
//! exactly the bytes the sink received and nothing else.
//!
//! The retry-until-fully-consumed shape here mirrors
//! [`crate::io`]'s teacher-derived ancestor, `IoEngine::read_at`, just
//! inverted from reads to writes: `std::io::Write::write_all` already
//! gives us that loop, so `DigestingWriter` only needs to fan writes out
//! to the digest context alongside the real sink.

use std::io::{self, Write};

use super::fsverity::VerityDigest;
use crate::diag::trace;

pub struct DigestingWriter<W: Write> {
    inner: W,
    digest: Option<Box<dyn VerityDigest>>,
    bytes_written: u64,
}

impl<W: Write> DigestingWriter<W> {
    pub fn new(inner: W, digest: Option<Box<dyn VerityDigest>>) -> Self {
        DigestingWriter {
            inner,
            digest,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Consumes the writer, returning the finalized digest if one was
    /// attached.
    pub fn finish(self) -> Option<[u8; 32]> {
        self.digest.map(|d| d.finalize())
    }

    pub fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        if let Some(d) = self.digest.as_mut() {
            d.update(buf);
        }
        self.bytes_written += buf.len() as u64;
        trace!("wrote {} bytes (total {})", buf.len(), self.bytes_written);
        Ok(())
    }

    pub fn write_zeros(&mut self, n: usize) -> io::Result<()> {
        const CHUNK: usize = 4096;
        let zeros = [0u8; CHUNK];
        let mut remaining = n;
        while remaining > 0 {
            let take = remaining.min(CHUNK);
            self.write_bytes(&zeros[..take])?;
            remaining -= take;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::fsverity::Sha256VerityDigest;

    #[test]
    fn tracks_bytes_and_digest() {
        let mut buf = Vec::new();
        {
            let mut w = DigestingWriter::new(
                &mut buf,
                Some(Box::new(Sha256VerityDigest::new()) as Box<dyn VerityDigest>),
            );
            w.write_bytes(b"abc").unwrap();
            w.write_zeros(2).unwrap();
            assert_eq!(w.bytes_written(), 5);
            let digest = w.finish().unwrap();
            use sha2::Digest as _;
            let want: [u8; 32] = sha2::Sha256::digest(b"abc\0\0").into();
            assert_eq!(digest, want);
        }
        assert_eq!(buf, b"abc\0\0");
    }
}
