use bitflags::bitflags;

bitflags! {
    /// Flags controlling filesystem ingestion (`ingest::build_from_filesystem`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BuildFlags: u32 {
        /// Do not copy extended attributes from the host filesystem.
        const SKIP_XATTRS = 1 << 0;
        /// Zero out mtime/ctime instead of copying them from `stat`.
        const USE_EPOCH = 1 << 1;
        /// Omit block and character device nodes encountered while walking.
        const SKIP_DEVICES = 1 << 2;
        /// Compute and record a content digest for every regular file.
        const COMPUTE_DIGEST = 1 << 3;
    }
}
