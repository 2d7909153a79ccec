//! Force simulation for graph layout.
//!
//! This module provides the CPU-side force simulation that computes node
//! positions: the pairwise force kernel, the tick-driven scheduler with its
//! continuous and headless-batch run modes, and the sync path that applies
//! simulated positions to the observed state the renderer reads.

pub mod config;
pub mod forces;
pub mod scheduler;
pub mod sync;

pub use config::{ConfigError, SimulationConfig};
pub use forces::{ForceSnapshot, MIN_DISTANCE, compute_displacements};
pub use scheduler::{RunState, SETTLE_DURATION, Scheduler};
