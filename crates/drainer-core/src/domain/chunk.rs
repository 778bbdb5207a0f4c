//! Batch partitioning.

/// Chunk length used when a source does not override
/// [`TaskSource::chunk_size`](crate::ports::TaskSource::chunk_size).
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Split `batch` into contiguous chunks of `chunk_len` items.
///
/// `chunk_len` is a chunk *length*, not a number of pieces: ten items with a
/// length of 5 give two chunks, eleven items give three (the last one short).
/// Item order is preserved inside and across chunks. A length of zero is
/// treated as one.
pub fn partition<T>(batch: Vec<T>, chunk_len: usize) -> Vec<Vec<T>> {
    let chunk_len = chunk_len.max(1);
    let mut chunks = Vec::with_capacity(batch.len().div_ceil(chunk_len));
    let mut items = batch.into_iter();
    loop {
        let chunk: Vec<T> = items.by_ref().take(chunk_len).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    chunks
}
