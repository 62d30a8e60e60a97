//! Chunked parallel iteration.
//!
//! With the `parallel` feature the chunks are dispatched on the global rayon
//! pool (nested calls are fine under work stealing); without it they run
//! serially on the caller's thread. Chunks must touch disjoint state.

/// A contiguous index range `[start, end)` handed to one task.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaskChunk {
    pub start: usize,
    pub end: usize,
}

fn chunk_ranges(start: usize, end: usize, max_chunk_size: usize) -> Vec<TaskChunk> {
    assert!(max_chunk_size > 0, "chunk size must be positive");
    let mut chunks = Vec::new();
    let mut chunk_start = start;
    while chunk_start < end {
        let chunk_end = usize::min(chunk_start + max_chunk_size, end);
        chunks.push(TaskChunk {
            start: chunk_start,
            end: chunk_end,
        });
        chunk_start = chunk_end;
    }
    chunks
}

/// Runs `body` over `[start, end)` split into chunks of at most
/// `max_chunk_size` indices. Ranges shorter than `min_parallel_size` run
/// serially regardless of the feature set.
pub fn parallel_for<F>(
    start: usize,
    end: usize,
    max_chunk_size: usize,
    min_parallel_size: usize,
    body: F,
) where
    F: Fn(TaskChunk) + Send + Sync,
{
    if end <= start {
        return;
    }
    let chunks = chunk_ranges(start, end, max_chunk_size);
    let run_serially = end - start < min_parallel_size;

    #[cfg(feature = "parallel")]
    {
        if !run_serially {
            use rayon::prelude::*;
            chunks.into_par_iter().for_each(body);
            return;
        }
    }

    let _ = run_serially;
    for chunk in chunks {
        body(chunk);
    }
}

/// Maps `body` over per-chunk mutable windows of `output`, in parallel when
/// available. The windows partition `output` in order.
pub fn parallel_for_chunks<T, F>(output: &mut [T], max_chunk_size: usize, body: F)
where
    T: Send,
    F: Fn(TaskChunk, &mut [T]) + Send + Sync,
{
    assert!(max_chunk_size > 0, "chunk size must be positive");

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        output
            .par_chunks_mut(max_chunk_size)
            .enumerate()
            .for_each(|(chunk_index, window)| {
                let start = chunk_index * max_chunk_size;
                body(
                    TaskChunk {
                        start,
                        end: start + window.len(),
                    },
                    window,
                );
            });
        return;
    }

    #[cfg(not(feature = "parallel"))]
    {
        let mut start = 0;
        for window in output.chunks_mut(max_chunk_size) {
            body(
                TaskChunk {
                    start,
                    end: start + window.len(),
                },
                window,
            );
            start += window.len();
        }
    }
}
