//! Graph registry and node state.
//!
//! This module provides the node/edge registry for the force simulation:
//! petgraph topology with caller-assigned node ids, an identity map from
//! external handles to node ids, and SoA buffers for the observed positions
//! the renderer reads.

mod node;
mod registry;

pub use node::{HandleId, MovementCallback, NodeFlags, NodeId};
pub use registry::{GraphRegistry, RegistryError};
