//! GraphRegistry - node/edge registry for the force simulation.
//!
//! The registry stores the graph topology using petgraph's StableGraph
//! and maintains SoA (Structure of Arrays) buffers for the observed
//! positions so the renderer can read them zero-copy, alongside per-node
//! simulation state (mass, immobility, virtual position, movement callback).
//!
//! Node ids are assigned by the caller and must be unique. A secondary
//! identity map translates the opaque handles of the host's entities to
//! node ids, so edges and mutations can be expressed in terms of whatever
//! handle the host registered the node under.

use glam::Vec3;
use petgraph::Undirected;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;

use super::node::{HandleId, MovementCallback, NodeFlags, NodeId};
use crate::spatial::SpatialIndex;

/// Errors surfaced by node registration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegistryError {
    /// The node id is already registered.
    DuplicateId(NodeId),
    /// The supplied mass was zero, negative, or NaN.
    NonPositiveMass(f32),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "node id {id} is already registered"),
            Self::NonPositiveMass(mass) => write!(f, "node mass must be positive, got {mass}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// The node/edge registry.
///
/// This struct manages:
/// - Graph topology via petgraph (undirected; adjacency symmetry is structural)
/// - Observed-position buffers in SoA layout, read by the renderer
/// - Virtual (simulated) positions, masses, immobility flags, callbacks
/// - Spatial index for picking queries
/// - Identity mapping from external handles to caller-assigned node ids
pub struct GraphRegistry {
    /// The underlying graph structure. Nodes store their caller-assigned id.
    graph: StableGraph<NodeId, (), Undirected>,

    /// Map from caller-assigned NodeId to petgraph NodeIndex
    node_id_to_index: HashMap<NodeId, NodeIndex>,

    /// Map from external-entity handle to the node id registered under it
    handle_to_id: HashMap<HandleId, NodeId>,

    /// Observed X positions (SoA layout)
    pos_x: Vec<f32>,

    /// Observed Y positions (SoA layout)
    pos_y: Vec<f32>,

    /// Observed Z positions (SoA layout)
    pos_z: Vec<f32>,

    /// Simulated positions, decoupled from the observed buffers until synced
    virtual_positions: Vec<Vec3>,

    /// Node masses (always > 0)
    masses: Vec<f32>,

    /// Node flags (immobile)
    flags: Vec<NodeFlags>,

    /// Per-node movement callbacks, fired after each observed-position sync
    callbacks: Vec<Option<MovementCallback>>,

    /// Spatial index for picking queries
    spatial: SpatialIndex,

    /// Whether the spatial index needs rebuilding
    spatial_dirty: Cell<bool>,
}

impl GraphRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            graph: StableGraph::default(),
            node_id_to_index: HashMap::new(),
            handle_to_id: HashMap::new(),
            pos_x: Vec::new(),
            pos_y: Vec::new(),
            pos_z: Vec::new(),
            virtual_positions: Vec::new(),
            masses: Vec::new(),
            flags: Vec::new(),
            callbacks: Vec::new(),
            spatial: SpatialIndex::new(),
            spatial_dirty: Cell::new(false),
        }
    }

    /// Create a registry with pre-allocated capacity.
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            graph: StableGraph::with_capacity(node_capacity, edge_capacity),
            node_id_to_index: HashMap::with_capacity(node_capacity),
            handle_to_id: HashMap::with_capacity(node_capacity),
            pos_x: Vec::with_capacity(node_capacity),
            pos_y: Vec::with_capacity(node_capacity),
            pos_z: Vec::with_capacity(node_capacity),
            virtual_positions: Vec::with_capacity(node_capacity),
            masses: Vec::with_capacity(node_capacity),
            flags: Vec::with_capacity(node_capacity),
            callbacks: Vec::with_capacity(node_capacity),
            spatial: SpatialIndex::new(),
            spatial_dirty: Cell::new(false),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a node under a caller-assigned id.
    ///
    /// `position` seeds the observed buffers; the virtual position is
    /// re-seeded from the observed position when a simulation run starts.
    /// Re-registering an existing handle points it at the new node.
    ///
    /// # Errors
    ///
    /// `DuplicateId` if `id` is already registered, `NonPositiveMass` if
    /// `mass` is not a positive finite number.
    pub fn add_node(
        &mut self,
        handle: HandleId,
        id: NodeId,
        position: Vec3,
        mass: f32,
        callback: Option<MovementCallback>,
    ) -> Result<(), RegistryError> {
        if self.node_id_to_index.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        if !(mass > 0.0) || !mass.is_finite() {
            return Err(RegistryError::NonPositiveMass(mass));
        }

        let index = self.graph.add_node(id);
        self.node_id_to_index.insert(id, index);
        self.handle_to_id.insert(handle, id);

        self.pos_x.push(position.x);
        self.pos_y.push(position.y);
        self.pos_z.push(position.z);
        self.virtual_positions.push(position);
        self.masses.push(mass);
        self.flags.push(NodeFlags::new());
        self.callbacks.push(callback);

        self.spatial_dirty.set(true);
        Ok(())
    }

    /// Connect the nodes registered under two handles.
    ///
    /// The relation is symmetric: each node appears in the other's neighbor
    /// list. Parallel edges and self-edges are not rejected. If either
    /// handle was never registered the edge is silently dropped.
    pub fn add_edge(&mut self, handle_a: HandleId, handle_b: HandleId) {
        let (Some(index_a), Some(index_b)) = (self.index_for(handle_a), self.index_for(handle_b))
        else {
            log::debug!("dropping edge {handle_a} - {handle_b}: unresolved handle");
            return;
        };
        self.graph.add_edge(index_a, index_b, ());
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Mark the node registered under `handle` as immobile (or mobile again).
    ///
    /// Immobile nodes still exert forces but never receive displacements.
    /// Silently no-ops on an unresolved handle.
    pub fn set_mobility(&mut self, handle: HandleId, immobile: bool) {
        let Some(index) = self.index_for(handle) else {
            log::debug!("set_mobility on unresolved {handle}");
            return;
        };
        self.flags[index.index()].set_immobile(immobile);
    }

    /// Update the mass of the node registered under `handle`.
    ///
    /// Silently no-ops on an unresolved handle. Non-positive masses are
    /// rejected with a warning; the previous mass is kept.
    pub fn set_mass(&mut self, handle: HandleId, mass: f32) {
        let Some(index) = self.index_for(handle) else {
            log::debug!("set_mass on unresolved {handle}");
            return;
        };
        if !(mass > 0.0) || !mass.is_finite() {
            log::warn!("ignoring non-positive mass {mass} for {handle}");
            return;
        }
        self.masses[index.index()] = mass;
    }

    /// Overwrite the observed position of the node registered under `handle`.
    ///
    /// Used by hosts that move entities outside the simulation (e.g. drag
    /// interactions). Silently no-ops on an unresolved handle.
    pub fn set_observed_position(&mut self, handle: HandleId, position: Vec3) {
        let Some(index) = self.index_for(handle) else {
            log::debug!("set_observed_position on unresolved {handle}");
            return;
        };
        let slot = index.index();
        self.pos_x[slot] = position.x;
        self.pos_y[slot] = position.y;
        self.pos_z[slot] = position.z;
        self.spatial_dirty.set(true);
    }

    /// Remove all nodes, adjacency, identity mappings and callbacks.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.node_id_to_index.clear();
        self.handle_to_id.clear();
        self.pos_x.clear();
        self.pos_y.clear();
        self.pos_z.clear();
        self.virtual_positions.clear();
        self.masses.clear();
        self.flags.clear();
        self.callbacks.clear();
        self.spatial.clear();
        self.spatial_dirty.set(false);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the number of edges (parallel edges counted individually).
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Resolve a handle to the node id registered under it.
    pub fn resolve(&self, handle: HandleId) -> Option<NodeId> {
        self.handle_to_id.get(&handle).copied()
    }

    /// Get neighbor node ids of a node (duplicates preserved for parallel edges).
    pub fn neighbors(&self, id: NodeId) -> Vec<u32> {
        self.node_id_to_index
            .get(&id)
            .map(|&index| {
                self.graph
                    .neighbors(index)
                    .filter_map(|n| self.graph.node_weight(n).map(|id| id.0))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check if a node is immobile.
    pub fn is_immobile(&self, id: NodeId) -> bool {
        self.node_id_to_index
            .get(&id)
            .map(|&index| self.flags[index.index()].is_immobile())
            .unwrap_or(false)
    }

    /// Get a node's mass.
    pub fn mass_of(&self, id: NodeId) -> Option<f32> {
        self.node_id_to_index
            .get(&id)
            .map(|&index| self.masses[index.index()])
    }

    /// Get a node's observed position.
    pub fn observed_position_of(&self, id: NodeId) -> Option<Vec3> {
        self.node_id_to_index.get(&id).map(|&index| {
            let slot = index.index();
            Vec3::new(self.pos_x[slot], self.pos_y[slot], self.pos_z[slot])
        })
    }

    /// Get a node's virtual (simulated) position.
    pub fn virtual_position_of(&self, id: NodeId) -> Option<Vec3> {
        self.node_id_to_index
            .get(&id)
            .map(|&index| self.virtual_positions[index.index()])
    }

    /// Extract the undirected adjacency in CSR form, indexed by node slot.
    ///
    /// Returns `(offsets, neighbors)` where `offsets` has `node_count + 1`
    /// elements and `neighbors[offsets[i]..offsets[i + 1]]` lists the slots
    /// adjacent to slot `i`. Parallel edges contribute duplicate entries.
    pub fn adjacency_csr(&self) -> (Vec<u32>, Vec<u32>) {
        let n = self.graph.node_count();
        let mut offsets = vec![0u32; n + 1];

        // Count neighbors per slot
        for index in self.graph.node_indices() {
            offsets[index.index() + 1] = self.graph.neighbors(index).count() as u32;
        }

        // Prefix sum
        for i in 1..=n {
            offsets[i] += offsets[i - 1];
        }

        // Fill neighbor slots
        let mut neighbors = vec![0u32; offsets[n] as usize];
        let mut cursor: Vec<u32> = offsets[..n].to_vec();
        for index in self.graph.node_indices() {
            let slot = index.index();
            for adjacent in self.graph.neighbors(index) {
                neighbors[cursor[slot] as usize] = adjacent.index() as u32;
                cursor[slot] += 1;
            }
        }

        (offsets, neighbors)
    }

    // =========================================================================
    // Simulation state access
    // =========================================================================

    /// Seed every virtual position from the current observed position.
    ///
    /// Called exactly once per simulation run, at the moment the run starts.
    pub fn seed_virtual_from_observed(&mut self) {
        for slot in 0..self.virtual_positions.len() {
            self.virtual_positions[slot] =
                Vec3::new(self.pos_x[slot], self.pos_y[slot], self.pos_z[slot]);
        }
    }

    /// Add one displacement per slot to the virtual positions, skipping
    /// immobile nodes. Lengths must match.
    pub fn apply_displacements(&mut self, displacements: &[Vec3]) {
        debug_assert_eq!(displacements.len(), self.virtual_positions.len());
        for (slot, displacement) in displacements.iter().enumerate() {
            if self.flags[slot].is_immobile() {
                continue;
            }
            self.virtual_positions[slot] += *displacement;
        }
    }

    /// Masses indexed by slot.
    pub fn masses(&self) -> &[f32] {
        &self.masses
    }

    /// Virtual positions indexed by slot.
    pub fn virtual_positions(&self) -> &[Vec3] {
        &self.virtual_positions
    }

    pub(crate) fn observed_slot(&self, slot: usize) -> Vec3 {
        Vec3::new(self.pos_x[slot], self.pos_y[slot], self.pos_z[slot])
    }

    pub(crate) fn write_observed_slot(&mut self, slot: usize, position: Vec3) {
        self.pos_x[slot] = position.x;
        self.pos_y[slot] = position.y;
        self.pos_z[slot] = position.z;
        self.spatial_dirty.set(true);
    }

    /// Fire every registered movement callback once.
    pub(crate) fn invoke_movement_callbacks(&mut self) {
        for callback in self.callbacks.iter_mut().flatten() {
            callback();
        }
    }

    // =========================================================================
    // Observed buffer access
    // =========================================================================

    /// Observed X positions slice.
    pub fn positions_x(&self) -> &[f32] {
        &self.pos_x
    }

    /// Observed Y positions slice.
    pub fn positions_y(&self) -> &[f32] {
        &self.pos_y
    }

    /// Observed Z positions slice.
    pub fn positions_z(&self) -> &[f32] {
        &self.pos_z
    }

    // =========================================================================
    // Spatial Queries
    // =========================================================================

    /// Find the node nearest to a point.
    ///
    /// Reflects the observed positions as of the last
    /// [`rebuild_spatial_index`](Self::rebuild_spatial_index) call.
    pub fn find_nearest_node(&self, x: f32, y: f32, z: f32) -> Option<NodeId> {
        self.spatial.nearest(x, y, z)
    }

    /// Find the nearest node within a maximum distance.
    pub fn find_nearest_node_within(
        &self,
        x: f32,
        y: f32,
        z: f32,
        max_distance: f32,
    ) -> Option<NodeId> {
        self.spatial.nearest_within(x, y, z, max_distance)
    }

    /// Find all nodes within a radius of a point.
    pub fn find_nodes_in_radius(&self, x: f32, y: f32, z: f32, radius: f32) -> Vec<u32> {
        self.spatial
            .in_radius(x, y, z, radius)
            .into_iter()
            .map(|id| id.0)
            .collect()
    }

    /// Whether observed positions changed since the last index rebuild.
    pub fn spatial_index_dirty(&self) -> bool {
        self.spatial_dirty.get()
    }

    /// Rebuild the spatial index from the observed positions.
    pub fn rebuild_spatial_index(&mut self) {
        let points: Vec<_> = self
            .node_id_to_index
            .iter()
            .map(|(&id, &index)| {
                let slot = index.index();
                (id, self.pos_x[slot], self.pos_y[slot], self.pos_z[slot])
            })
            .collect();

        self.spatial.rebuild(&points);
        self.spatial_dirty.set(false);
    }

    fn index_for(&self, handle: HandleId) -> Option<NodeIndex> {
        self.handle_to_id
            .get(&handle)
            .and_then(|id| self.node_id_to_index.get(id))
            .copied()
    }
}

impl Default for GraphRegistry {
    fn default() -> Self {
        Self::new()
    }
}
