//! Batch sizing for the bulk loader.

use crate::config::ChunkSettings;

/// Rows per insert batch for a file of `file_size_mb`.
///
/// Small and medium files share the base size; only files above the medium
/// breakpoint get the large size. Non-decreasing in file size as long as the
/// settings pass [`crate::config::IngestConfig::validate`].
pub fn chunk_size(settings: &ChunkSettings, file_size_mb: f64) -> usize {
    let size = if file_size_mb <= settings.small_file_mb || file_size_mb <= settings.medium_file_mb
    {
        settings.base_chunk_size
    } else {
        settings.large_chunk_size
    };
    size.max(1)
}

/// Suggested parallelism for a batch of files. Reported, never dispatched.
pub fn worker_count(settings: &ChunkSettings, file_count: usize) -> usize {
    settings.max_workers.min(file_count.max(1))
}
