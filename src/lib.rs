//! Force Layout - WASM Module
//!
//! This module provides a force-directed 3D layout simulation for graph
//! visualization. It is compiled to WebAssembly and exposes a
//! JavaScript-friendly API via wasm-bindgen; the host's render loop feeds
//! tick signals and reads the observed positions back zero-copy.
//!
//! # Architecture
//!
//! - `graph`: node/edge registry with caller-assigned ids and an identity
//!   map from external entity handles to node ids
//! - `layout`: pairwise force kernel (Coulomb repulsion + Hooke springs),
//!   tick-driven scheduler, observed-position sync
//! - `spatial`: R-tree spatial indexing for O(log n) picking

use js_sys::Float32Array;
use log::Level;
use wasm_bindgen::prelude::*;

pub mod graph;
pub mod layout;
pub mod spatial;

use glam::Vec3;
use graph::{GraphRegistry, HandleId, MovementCallback, NodeId};
use layout::{Scheduler, SimulationConfig};

/// Initialize the WASM module: panic messages and log lines go to the
/// browser console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(Level::Info);
}

/// Main entry point for the layout engine.
///
/// This struct wraps the registry, scheduler and tunables and provides the
/// public API exposed to JavaScript.
#[wasm_bindgen]
pub struct ForceLayoutWasm {
    registry: GraphRegistry,
    scheduler: Scheduler,
    config: SimulationConfig,
}

#[wasm_bindgen]
impl ForceLayoutWasm {
    /// Create a new empty layout engine with default tunables.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            registry: GraphRegistry::new(),
            scheduler: Scheduler::new(),
            config: SimulationConfig::default(),
        }
    }

    /// Create a layout engine with pre-allocated capacity.
    ///
    /// # Arguments
    ///
    /// * `node_capacity` - Expected number of nodes
    /// * `edge_capacity` - Expected number of edges
    #[wasm_bindgen(js_name = withCapacity)]
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            registry: GraphRegistry::with_capacity(node_capacity, edge_capacity),
            scheduler: Scheduler::new(),
            config: SimulationConfig::default(),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a node under a caller-assigned id.
    ///
    /// `handle` is the host entity's identity; later edge and mutation calls
    /// refer to it. `mass` defaults to 1. The optional `callback` is invoked
    /// with no arguments every time the node's observed position is synced.
    ///
    /// Throws if the id is already registered or the mass is not positive.
    #[wasm_bindgen(js_name = addNode)]
    pub fn add_node(
        &mut self,
        handle: u32,
        id: u32,
        x: f32,
        y: f32,
        z: f32,
        mass: Option<f32>,
        callback: Option<js_sys::Function>,
    ) -> Result<(), JsError> {
        let callback = callback.map(|function| -> MovementCallback {
            Box::new(move || {
                let _ = function.call0(&JsValue::NULL);
            })
        });

        self.registry.add_node(
            HandleId(handle),
            NodeId(id),
            Vec3::new(x, y, z),
            mass.unwrap_or(1.0),
            callback,
        )?;
        Ok(())
    }

    /// Connect the nodes registered under two handles.
    ///
    /// Symmetric; silently dropped if either handle was never registered.
    #[wasm_bindgen(js_name = addEdge)]
    pub fn add_edge(&mut self, handle_a: u32, handle_b: u32) {
        self.registry.add_edge(HandleId(handle_a), HandleId(handle_b));
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Mark a node immobile (or mobile again). Silent no-op on an
    /// unresolved handle.
    #[wasm_bindgen(js_name = setMobility)]
    pub fn set_mobility(&mut self, handle: u32, immobile: bool) {
        self.registry.set_mobility(HandleId(handle), immobile);
    }

    /// Update a node's mass. Silent no-op on an unresolved handle;
    /// non-positive masses are ignored with a warning.
    #[wasm_bindgen(js_name = setMass)]
    pub fn set_mass(&mut self, handle: u32, mass: f32) {
        self.registry.set_mass(HandleId(handle), mass);
    }

    /// Overwrite a node's observed position (e.g. after a host-side drag).
    /// Silent no-op on an unresolved handle.
    #[wasm_bindgen(js_name = setNodePosition)]
    pub fn set_node_position(&mut self, handle: u32, x: f32, y: f32, z: f32) {
        self.registry
            .set_observed_position(HandleId(handle), Vec3::new(x, y, z));
    }

    /// Remove all nodes, edges and identity mappings.
    pub fn clear(&mut self) {
        self.scheduler.stop();
        self.registry.clear();
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get the number of nodes.
    #[wasm_bindgen(js_name = nodeCount)]
    pub fn node_count(&self) -> u32 {
        self.registry.node_count() as u32
    }

    /// Get the number of edges.
    #[wasm_bindgen(js_name = edgeCount)]
    pub fn edge_count(&self) -> u32 {
        self.registry.edge_count() as u32
    }

    /// Resolve a handle to the node id registered under it.
    #[wasm_bindgen(js_name = resolveHandle)]
    pub fn resolve_handle(&self, handle: u32) -> Option<u32> {
        self.registry.resolve(HandleId(handle)).map(|id| id.0)
    }

    /// Get neighbor node ids of a node.
    ///
    /// Returns a Uint32Array; parallel edges contribute duplicates.
    #[wasm_bindgen(js_name = getNeighbors)]
    pub fn get_neighbors(&self, id: u32) -> Vec<u32> {
        self.registry.neighbors(NodeId(id))
    }

    /// Check if a node is immobile.
    #[wasm_bindgen(js_name = isNodeImmobile)]
    pub fn is_node_immobile(&self, id: u32) -> bool {
        self.registry.is_immobile(NodeId(id))
    }

    // =========================================================================
    // Simulation lifecycle
    // =========================================================================

    /// Enter continuous mode: every subsequent tick advances one step and
    /// syncs observed positions. Runs until `stop`.
    pub fn start(&mut self) {
        self.scheduler.start(&mut self.registry);
    }

    /// Stop any run in progress. Idempotent.
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Enter batch mode: the next `iterations` ticks advance the simulation
    /// headless (no observed-position sync, no callbacks), then a settle
    /// phase eases observed positions onto the result over one time unit.
    #[wasm_bindgen(js_name = runForIterations)]
    pub fn run_for_iterations(&mut self, iterations: u32) {
        self.scheduler
            .run_for_iterations(&mut self.registry, iterations);
    }

    /// Advance the simulation by one tick.
    ///
    /// Call once per animation frame; `dt` is the frame time in the same
    /// unit as the settle duration (seconds for a 1-second settle).
    pub fn tick(&mut self, dt: f32) {
        self.scheduler.tick(&mut self.registry, &self.config, dt);
    }

    /// Whether a run (continuous, batch or settle) is in progress.
    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    // =========================================================================
    // Tunables
    // =========================================================================

    /// Set the Coulomb repulsion constant. Throws unless positive.
    #[wasm_bindgen(js_name = setRepulsionConstant)]
    pub fn set_repulsion_constant(&mut self, value: f32) -> Result<(), JsError> {
        self.config.set_repulsion_constant(value)?;
        Ok(())
    }

    /// Set the Hooke spring constant. Throws unless positive.
    #[wasm_bindgen(js_name = setSpringConstant)]
    pub fn set_spring_constant(&mut self, value: f32) -> Result<(), JsError> {
        self.config.set_spring_constant(value)?;
        Ok(())
    }

    /// Set the time step divisor (higher = slower movement per step).
    /// Throws unless at least 1.
    #[wasm_bindgen(js_name = setTimeStep)]
    pub fn set_time_step(&mut self, value: u32) -> Result<(), JsError> {
        self.config.set_time_step(value)?;
        Ok(())
    }

    /// Set how many node computations are grouped per parallel work unit.
    /// Performance knob only. Throws unless at least 1.
    #[wasm_bindgen(js_name = setBatchSize)]
    pub fn set_batch_size(&mut self, value: u32) -> Result<(), JsError> {
        self.config.set_batch_size(value)?;
        Ok(())
    }

    /// Get the current tunables as a plain object.
    #[wasm_bindgen(js_name = getConfig)]
    pub fn get_config(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.config)?)
    }

    /// Replace the tunables from a plain object. Missing fields keep their
    /// defaults; throws if any value is out of range.
    #[wasm_bindgen(js_name = setConfig)]
    pub fn set_config(&mut self, value: JsValue) -> Result<(), JsError> {
        let config: SimulationConfig = serde_wasm_bindgen::from_value(value)?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    // =========================================================================
    // Position Buffer Access (Zero-Copy)
    // =========================================================================

    /// Get a zero-copy view of observed X positions.
    ///
    /// # Safety
    ///
    /// The returned view is invalidated if any Rust allocation occurs.
    /// Use immediately for GPU upload, do not store.
    #[wasm_bindgen(js_name = getPositionsXView)]
    pub fn get_positions_x_view(&self) -> Float32Array {
        unsafe { Float32Array::view(self.registry.positions_x()) }
    }

    /// Get a zero-copy view of observed Y positions.
    ///
    /// # Safety
    ///
    /// The returned view is invalidated if any Rust allocation occurs.
    /// Use immediately for GPU upload, do not store.
    #[wasm_bindgen(js_name = getPositionsYView)]
    pub fn get_positions_y_view(&self) -> Float32Array {
        unsafe { Float32Array::view(self.registry.positions_y()) }
    }

    /// Get a zero-copy view of observed Z positions.
    ///
    /// # Safety
    ///
    /// The returned view is invalidated if any Rust allocation occurs.
    /// Use immediately for GPU upload, do not store.
    #[wasm_bindgen(js_name = getPositionsZView)]
    pub fn get_positions_z_view(&self) -> Float32Array {
        unsafe { Float32Array::view(self.registry.positions_z()) }
    }

    /// Get a pointer to the observed X positions buffer.
    ///
    /// Used for creating views after WASM memory growth.
    #[wasm_bindgen(js_name = positionsXPtr)]
    pub fn positions_x_ptr(&self) -> *const f32 {
        self.registry.positions_x().as_ptr()
    }

    /// Get a pointer to the observed Y positions buffer.
    #[wasm_bindgen(js_name = positionsYPtr)]
    pub fn positions_y_ptr(&self) -> *const f32 {
        self.registry.positions_y().as_ptr()
    }

    /// Get a pointer to the observed Z positions buffer.
    #[wasm_bindgen(js_name = positionsZPtr)]
    pub fn positions_z_ptr(&self) -> *const f32 {
        self.registry.positions_z().as_ptr()
    }

    /// Get the length of the position buffers.
    #[wasm_bindgen(js_name = positionsLen)]
    pub fn positions_len(&self) -> usize {
        self.registry.positions_x().len()
    }

    // =========================================================================
    // Spatial Queries
    // =========================================================================

    /// Find the node nearest to a point.
    ///
    /// Returns the node id, or None if the graph is empty. Reflects the
    /// last `rebuildSpatialIndex` call.
    #[wasm_bindgen(js_name = findNearestNode)]
    pub fn find_nearest_node(&self, x: f32, y: f32, z: f32) -> Option<u32> {
        self.registry.find_nearest_node(x, y, z).map(|id| id.0)
    }

    /// Find the nearest node within a maximum distance.
    ///
    /// Returns the node id, or None if no node is within the distance.
    #[wasm_bindgen(js_name = findNearestNodeWithin)]
    pub fn find_nearest_node_within(
        &self,
        x: f32,
        y: f32,
        z: f32,
        max_distance: f32,
    ) -> Option<u32> {
        self.registry
            .find_nearest_node_within(x, y, z, max_distance)
            .map(|id| id.0)
    }

    /// Find all nodes within a radius of a point.
    ///
    /// Returns a Uint32Array of node ids.
    #[wasm_bindgen(js_name = findNodesInRadius)]
    pub fn find_nodes_in_radius(&self, x: f32, y: f32, z: f32, radius: f32) -> Vec<u32> {
        self.registry.find_nodes_in_radius(x, y, z, radius)
    }

    /// Rebuild the spatial index from the current observed positions.
    ///
    /// Call after ticks or bulk position updates for accurate picking.
    #[wasm_bindgen(js_name = rebuildSpatialIndex)]
    pub fn rebuild_spatial_index(&mut self) {
        self.registry.rebuild_spatial_index();
    }
}

impl Default for ForceLayoutWasm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::layout::RunState;

    /// Drive the full pipeline the way a host does: register, simulate
    /// continuously, read observed state back. No JS types involved.
    #[test]
    fn test_continuous_pipeline_spreads_ring() {
        let mut engine = ForceLayoutWasm::new();

        // Five nodes bunched near the origin, connected in a ring.
        for i in 0..5u32 {
            let offset = i as f32 * 0.1;
            engine
                .add_node(i, i, offset, -offset, 0.05 * i as f32, None, None)
                .unwrap();
        }
        for i in 0..5u32 {
            engine.add_edge(i, (i + 1) % 5);
        }
        assert_eq!(engine.node_count(), 5);
        assert_eq!(engine.edge_count(), 5);

        engine.start();
        assert!(engine.is_running());
        for _ in 0..200 {
            engine.tick(1.0 / 60.0);
        }
        engine.stop();
        assert!(!engine.is_running());

        // All positions finite, and no two nodes collapsed together.
        let xs = engine.registry.positions_x();
        let ys = engine.registry.positions_y();
        let zs = engine.registry.positions_z();
        for i in 0..5 {
            assert!(xs[i].is_finite() && ys[i].is_finite() && zs[i].is_finite());
            for j in (i + 1)..5 {
                let dx = xs[i] - xs[j];
                let dy = ys[i] - ys[j];
                let dz = zs[i] - zs[j];
                let distance = (dx * dx + dy * dy + dz * dz).sqrt();
                assert!(distance > 0.5, "nodes {i} and {j} collapsed: {distance}");
            }
        }
    }

    #[test]
    fn test_batch_settle_ends_exact_and_pickable() {
        let mut engine = ForceLayoutWasm::new();
        for i in 0..4u32 {
            engine
                .add_node(i, i, i as f32 * 2.0, 0.0, 0.0, Some(1.0), None)
                .unwrap();
        }
        engine.add_edge(0, 1);
        engine.add_edge(1, 2);
        engine.add_edge(2, 3);

        engine.run_for_iterations(30);
        for _ in 0..30 {
            engine.tick(1.0 / 60.0);
        }
        assert_eq!(engine.scheduler.state(), RunState::Settling { elapsed: 0.0 });

        // Settle with quarter-second ticks until idle.
        let mut guard = 0;
        while engine.is_running() {
            engine.tick(0.25);
            guard += 1;
            assert!(guard < 100, "settle never completed");
        }

        // Observed state equals the simulated result exactly.
        for i in 0..4u32 {
            let observed = engine.registry.observed_position_of(NodeId(i)).unwrap();
            let simulated = engine.registry.virtual_position_of(NodeId(i)).unwrap();
            assert_eq!(observed.x.to_bits(), simulated.x.to_bits());
            assert_eq!(observed.y.to_bits(), simulated.y.to_bits());
            assert_eq!(observed.z.to_bits(), simulated.z.to_bits());
        }

        // The settled layout is immediately pickable.
        engine.rebuild_spatial_index();
        let anchor = engine.registry.observed_position_of(NodeId(0)).unwrap();
        assert_eq!(
            engine.find_nearest_node(anchor.x, anchor.y, anchor.z),
            Some(0)
        );
    }

    #[test]
    fn test_clear_and_reload() {
        let mut engine = ForceLayoutWasm::new();
        for i in 0..10u32 {
            engine
                .add_node(i, i, i as f32, 0.0, 0.0, None, None)
                .unwrap();
        }
        for i in 1..10u32 {
            engine.add_edge(0, i);
        }
        assert_eq!(engine.node_count(), 10);
        assert_eq!(engine.edge_count(), 9);

        engine.start();
        engine.clear();

        // Clearing stops the run and empties everything.
        assert!(!engine.is_running());
        assert_eq!(engine.node_count(), 0);
        assert_eq!(engine.edge_count(), 0);
        assert_eq!(engine.positions_len(), 0);

        // Ids are reusable after a clear; edges resolve against the new
        // registrations.
        for i in 0..3u32 {
            engine
                .add_node(i + 100, i, i as f32, i as f32, i as f32, None, None)
                .unwrap();
        }
        engine.add_edge(100, 101);
        assert_eq!(engine.node_count(), 3);
        assert_eq!(engine.edge_count(), 1);
        assert_eq!(engine.resolve_handle(100), Some(0));
        assert!(engine.get_neighbors(0).contains(&1));
    }

    #[test]
    fn test_tunables_validated_at_facade() {
        let mut engine = ForceLayoutWasm::new();
        assert!(engine.set_repulsion_constant(500.0).is_ok());
        assert!(engine.set_repulsion_constant(-1.0).is_err());
        assert!(engine.set_spring_constant(0.0).is_err());
        assert!(engine.set_time_step(0).is_err());
        assert!(engine.set_batch_size(0).is_err());
        assert!(engine.set_time_step(10).is_ok());
        assert_eq!(engine.config.repulsion_constant, 500.0);
        assert_eq!(engine.config.time_step, 10);
    }
}
