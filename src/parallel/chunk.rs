//! Static partitioning of the input list across workers

use crate::error::{HalfsizeError, Result};

/// Contiguous, non-empty run of items owned by one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<T> {
    index: usize,
    items: Vec<T>,
}

impl<T> Chunk<T> {
    /// Position of this chunk in the plan
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Always false for chunks produced by [`ChunkPlanner`]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Splits an ordered list into at most `workers` contiguous chunks.
///
/// Chunk size is `ceil(len / workers)`, at least 1. Every chunk except the
/// last has exactly that size; the last may be shorter. Ceiling division keeps
/// the chunk count within the worker count (17 items on 8 workers gives six
/// chunks of 3, 3, 3, 3, 3 and 2).
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlanner {
    workers: usize,
}

impl ChunkPlanner {
    /// Fails with `InvalidConfiguration` when `workers` is zero
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(HalfsizeError::invalid_configuration(
                "Worker count must be greater than 0",
            ));
        }
        Ok(Self { workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Items per chunk for an input of `len` items
    pub fn chunk_size(&self, len: usize) -> usize {
        len.div_ceil(self.workers).max(1)
    }

    /// Partition `items` without reordering. Empty input gives no chunks.
    pub fn plan<T>(&self, items: Vec<T>) -> Vec<Chunk<T>> {
        let chunk_size = self.chunk_size(items.len());
        let mut chunks = Vec::with_capacity(items.len().div_ceil(chunk_size));
        let mut remaining = items.into_iter().peekable();

        while remaining.peek().is_some() {
            let items: Vec<T> = remaining.by_ref().take(chunk_size).collect();
            chunks.push(Chunk {
                index: chunks.len(),
                items,
            });
        }

        chunks
    }
}
