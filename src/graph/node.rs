//! Node identity types and per-node simulation state.
//!
//! A node is a simulated point mass. Each node has:
//! - A caller-assigned unique identifier (`NodeId`)
//! - The opaque identity of the host entity it was registered under (`HandleId`)
//! - A positive mass and an immobility flag
//! - A virtual (simulated) position, decoupled from the observed position
//!   that the renderer reads until a sync point

use std::fmt;

/// Caller-assigned node identifier.
///
/// Unlike an auto-generated index, this id is chosen by the caller at
/// registration time and must be unique for the registry's lifetime.
/// It wraps a u32 for efficient storage and WebAssembly interop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new NodeId from a raw u32.
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl From<u32> for NodeId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<NodeId> for u32 {
    #[inline]
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Opaque identity of the external entity a node was registered under.
///
/// The visual layer registers nodes against whatever handle it owns (an
/// entity id, an object key). Edge and mutation operations resolve handles
/// through the registry's identity map rather than requiring node ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u32);

impl HandleId {
    /// Create a new HandleId from a raw u32.
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl From<u32> for HandleId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Zero-argument callback fired after a node's observed position is synced.
///
/// Hosts use this to update dependent visuals (edge lines, labels). The
/// callback must not mutate the registry; reentrancy is unguarded.
pub type MovementCallback = Box<dyn FnMut()>;

/// Node state flags packed into a single byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeFlags {
    flags: u8,
}

impl NodeFlags {
    const IMMOBILE: u8 = 0b0000_0001;

    /// Create a new default flag set (mobile).
    #[inline]
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    /// Check if the node is immobile (excluded from displacement application).
    #[inline]
    pub fn is_immobile(self) -> bool {
        self.flags & Self::IMMOBILE != 0
    }

    /// Set the immobile state.
    #[inline]
    pub fn set_immobile(&mut self, immobile: bool) {
        if immobile {
            self.flags |= Self::IMMOBILE;
        } else {
            self.flags &= !Self::IMMOBILE;
        }
    }
}
