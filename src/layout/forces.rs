//! Pairwise force computation.
//!
//! Computes one displacement per node from a read-only snapshot of the
//! registry: Coulomb repulsion between every node pair, Hooke attraction
//! between connected pairs. The per-node accumulation is embarrassingly
//! parallel; on native targets it is dispatched across rayon's worker pool
//! in chunks of `batch_size` nodes, on wasm32 it runs as the same loop on
//! the calling thread. Chunking never changes results.

use glam::Vec3;
use std::sync::atomic::{AtomicU32, Ordering};

use super::config::SimulationConfig;
use crate::graph::GraphRegistry;

/// Distances below this are clamped before the inverse-square division.
///
/// Two coincident nodes would otherwise produce an infinite Coulomb term
/// and an undefined direction; clamping keeps the step finite for every
/// other node pair.
pub const MIN_DISTANCE: f32 = 1e-4;

/// Immutable per-step view of everything the force kernel reads.
///
/// Captured once at the start of a step, then shared read-only across the
/// parallel workers. No worker ever touches the registry.
pub struct ForceSnapshot {
    positions: Vec<Vec3>,
    masses: Vec<f32>,
    csr_offsets: Vec<u32>,
    csr_neighbors: Vec<u32>,
}

impl ForceSnapshot {
    /// Capture the current virtual positions, masses and adjacency.
    pub fn capture(registry: &GraphRegistry) -> Self {
        let (csr_offsets, csr_neighbors) = registry.adjacency_csr();
        Self {
            positions: registry.virtual_positions().to_vec(),
            masses: registry.masses().to_vec(),
            csr_offsets,
            csr_neighbors,
        }
    }

    /// Number of nodes in the snapshot.
    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    fn neighbors_of(&self, slot: usize) -> &[u32] {
        let start = self.csr_offsets[slot] as usize;
        let end = self.csr_offsets[slot + 1] as usize;
        &self.csr_neighbors[start..end]
    }
}

/// Compute one displacement per node for the current step.
///
/// For node `i` the contribution of every other node `j` is
/// `(Ke / d^2 - [j is neighbor] * K * d) * normalize(pos_i - pos_j)`,
/// and the accumulated sum is scaled by `1 / (time_step * mass_i * (N - 1))`.
///
/// Fewer than two nodes yields all-zero displacements (the `N - 1` divisor
/// would be degenerate, and there is no pair to exert force).
pub fn compute_displacements(snapshot: &ForceSnapshot, config: &SimulationConfig) -> Vec<Vec3> {
    let n = snapshot.node_count();
    let mut displacements = vec![Vec3::ZERO; n];
    if n < 2 {
        return displacements;
    }

    let clamped = AtomicU32::new(0);

    #[cfg(not(target_arch = "wasm32"))]
    {
        use rayon::prelude::*;

        let chunk = config.batch_size.max(1) as usize;
        displacements
            .par_chunks_mut(chunk)
            .enumerate()
            .for_each(|(chunk_index, slots)| {
                let base = chunk_index * chunk;
                for (offset, slot) in slots.iter_mut().enumerate() {
                    *slot = displacement_for(snapshot, config, base + offset, &clamped);
                }
            });
    }

    #[cfg(target_arch = "wasm32")]
    {
        // No worker threads on wasm32; same kernel, same walk order.
        for (index, slot) in displacements.iter_mut().enumerate() {
            *slot = displacement_for(snapshot, config, index, &clamped);
        }
    }

    let clamped = clamped.load(Ordering::Relaxed);
    if clamped > 0 {
        log::warn!("clamped {clamped} degenerate node pairs to minimum distance");
    }

    displacements
}

/// Accumulate the displacement for a single node.
///
/// Pure function of the snapshot; called from parallel workers.
fn displacement_for(
    snapshot: &ForceSnapshot,
    config: &SimulationConfig,
    index: usize,
    clamped: &AtomicU32,
) -> Vec3 {
    let position = snapshot.positions[index];
    let neighbors = snapshot.neighbors_of(index);
    let n = snapshot.node_count();

    let mut accumulated = Vec3::ZERO;
    for (other, &other_position) in snapshot.positions.iter().enumerate() {
        if other == index {
            continue;
        }

        let delta = position - other_position;
        let distance = delta.length();
        let (distance, direction) = if distance < MIN_DISTANCE {
            clamped.fetch_add(1, Ordering::Relaxed);
            (MIN_DISTANCE, separation_axis(index, other))
        } else {
            (distance, delta / distance)
        };

        let coulomb = config.repulsion_constant / (distance * distance);
        let hooke = if neighbors.contains(&(other as u32)) {
            config.spring_constant * distance
        } else {
            0.0
        };

        accumulated += (coulomb - hooke) * direction;
    }

    accumulated / (config.time_step as f32 * snapshot.masses[index] * (n - 1) as f32)
}

/// Deterministic unit direction for a coincident node pair.
///
/// Antisymmetric in (i, j) so the two nodes separate in opposite directions
/// instead of both receiving the same push.
fn separation_axis(index: usize, other: usize) -> Vec3 {
    let axis = match (index + other) % 3 {
        0 => Vec3::X,
        1 => Vec3::Y,
        _ => Vec3::Z,
    };
    if index < other { axis } else { -axis }
}
