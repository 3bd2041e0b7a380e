// ============================================================
// Layer 5 — Sequence Packing
// ============================================================
// Keeps only the real (non-padding) positions of a padded
// batch, as one flat sequence.
//
// For lengths [3, 1] and max_len 3 the padded grid is
//
//   row 0:  t0 t1 t2
//   row 1:  t0 ·  ·
//
// and the packed order is row by row, time within row:
//   (0,0) (0,1) (0,2) (1,0)  →  flat indices [0, 1, 2, 3]
//
// Targets and decoder outputs are both gathered with the same
// indices, so prediction row k always scores target token k.

use anyhow::{ensure, Result};
use burn::prelude::*;

/// Flat indices into a row-major [batch, max_len] grid for every
/// position `t < lengths[row]`, in batch-then-time order.
pub fn packed_indices(lengths: &[usize], max_len: usize) -> Result<Vec<i32>> {
    ensure!(!lengths.is_empty(), "cannot pack an empty batch");
    ensure!(
        lengths.iter().all(|&len| len > 0 && len <= max_len),
        "lengths {lengths:?} must lie in 1..={max_len}"
    );

    let total = lengths.iter().sum();
    let mut indices = Vec::with_capacity(total);
    for (row, &len) in lengths.iter().enumerate() {
        let base = row * max_len;
        indices.extend((base..base + len).map(|i| i as i32));
    }
    Ok(indices)
}

/// Pack padded token ids [batch, max_len] into [Σ lengths].
pub fn pack_tokens<B: Backend>(padded: Tensor<B, 2, Int>, lengths: &[usize]) -> Result<Tensor<B, 1, Int>> {
    let [batch, max_len] = padded.dims();
    ensure!(
        batch == lengths.len(),
        "{batch} padded rows but {} lengths",
        lengths.len()
    );

    let indices = index_tensor::<B>(lengths, max_len, &padded.device())?;
    Ok(padded.reshape([batch * max_len]).select(0, indices))
}

/// Pack per-step features [batch, max_len, width] into [Σ lengths, width].
pub fn pack_steps<B: Backend>(padded: Tensor<B, 3>, lengths: &[usize]) -> Result<Tensor<B, 2>> {
    let [batch, max_len, width] = padded.dims();
    ensure!(
        batch == lengths.len(),
        "{batch} padded rows but {} lengths",
        lengths.len()
    );

    let indices = index_tensor::<B>(lengths, max_len, &padded.device())?;
    Ok(padded.reshape([batch * max_len, width]).select(0, indices))
}

fn index_tensor<B: Backend>(
    lengths: &[usize],
    max_len: usize,
    device:  &B::Device,
) -> Result<Tensor<B, 1, Int>> {
    let indices = packed_indices(lengths, max_len)?;
    Ok(Tensor::<B, 1, Int>::from_ints(indices.as_slice(), device))
}
