//! Chunk planning: how many wire chunks a file of a given size needs.

use serde::{Deserialize, Serialize};

/// Error from an unusable plan input.
#[derive(Debug, thiserror::Error)]
#[error("chunk size must be greater than zero")]
pub struct PlanError;

/// Result of planning a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub total_size: u64,
    pub chunk_size: u64,
    pub chunk_count: u32,
    pub chunked: bool,
}

/// Computes the chunk plan for `total_size` bytes at `chunk_size` per chunk.
///
/// A zero-byte file plans to zero chunks; the caller must treat that as
/// nothing-to-send rather than an empty chunk.
pub fn plan(total_size: u64, chunk_size: u64) -> Result<ChunkPlan, PlanError> {
    if chunk_size == 0 {
        return Err(PlanError);
    }
    let chunk_count = u32::try_from(total_size.div_ceil(chunk_size)).map_err(|_| PlanError)?;
    Ok(ChunkPlan {
        total_size,
        chunk_size,
        chunk_count,
        chunked: chunk_count > 1,
    })
}
