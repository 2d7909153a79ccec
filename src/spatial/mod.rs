//! Spatial indexing for O(log n) picking.
//!
//! This module provides an R-tree based spatial index for efficient
//! nearest-neighbor and radius queries on node positions in 3D.

mod rtree;

pub use rtree::SpatialIndex;
