/// Batches an iterable into fixed-size chunks, preserving input order.
///
/// This is the cross-cutting "buffered" facility: the KV Adapter's HTTP ancestor
/// kept request payloads under a safe size by chunking; here, against an embedded
/// store, chunking still bounds single-transaction size and keeps atomic batches
/// (see `index::get_index`) small enough to reason about.
pub fn chunked<T, I>(items: I, chunk_size: usize) -> impl Iterator<Item = Vec<T>>
where
    I: IntoIterator<Item = T>,
{
    assert!(chunk_size > 0, "chunk_size must be positive");
    let mut iter = items.into_iter().peekable();
    std::iter::from_fn(move || {
        iter.peek()?;
        let mut chunk = Vec::with_capacity(chunk_size);
        for _ in 0..chunk_size {
            match iter.next() {
                Some(item) => chunk.push(item),
                None => break,
            }
        }
        Some(chunk)
    })
}
