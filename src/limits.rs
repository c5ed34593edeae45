//! Process resource limits.

/// Fallback when the soft limit cannot be read or is unlimited.
pub const DEFAULT_FILE_LIMIT: u64 = 10_000;

/// Soft limit on open file descriptors for this process.
///
/// The resolver pool builder caps admitted resolvers at 70% of this value,
/// leaving headroom for graphs, sources, and the feed client.
#[cfg(unix)]
pub fn soft_file_limit() -> u64 {
    rustix::process::getrlimit(rustix::process::Resource::Nofile)
        .current
        .unwrap_or(DEFAULT_FILE_LIMIT)
}

#[cfg(not(unix))]
pub fn soft_file_limit() -> u64 {
    DEFAULT_FILE_LIMIT
}
