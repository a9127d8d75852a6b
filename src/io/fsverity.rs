//! fs-verity is consumed here as an opaque streaming digest context: the
//! kernel-side primitive is a block-wise Merkle tree over the file's
//! content, which this crate never implements or links against. What the
//! builder actually needs is the new/update/finalize contract, expressed
//! as a trait so a real Merkle-tree backend can be substituted.

/// 32-byte fs-verity digest.
pub type Digest = [u8; 32];

/// A streaming digest context: `update` may be called any number of
/// times before a single `finalize`. Implementations must not be reused
/// across `finalize` calls.
pub trait VerityDigest {
    fn update(&mut self, bytes: &[u8]);
    fn finalize(self: Box<Self>) -> Digest;
}

/// Default digest context. Computes a flat SHA-256 over the entire byte
/// stream, which is *not* the kernel's true block-wise Merkle digest: it
/// stands in for the opaque external primitive so the crate is runnable
/// without an FFI binding to the real fs-verity implementation.
pub struct Sha256VerityDigest {
    hasher: sha2::Sha256,
}

impl Sha256VerityDigest {
    pub fn new() -> Self {
        use sha2::Digest as _;
        Sha256VerityDigest {
            hasher: sha2::Sha256::new(),
        }
    }
}

impl Default for Sha256VerityDigest {
    fn default() -> Self {
        Self::new()
    }
}

impl VerityDigest for Sha256VerityDigest {
    fn update(&mut self, bytes: &[u8]) {
        use sha2::Digest as _;
        self.hasher.update(bytes);
    }

    fn finalize(self: Box<Self>) -> Digest {
        use sha2::Digest as _;
        self.hasher.finalize().into()
    }
}
