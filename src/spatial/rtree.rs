//! R-tree based spatial index using the rstar crate.
//!
//! Provides O(log n) spatial queries in 3D for:
//! - Nearest neighbor
//! - Point-in-radius

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::graph::NodeId;

/// A point in the spatial index with associated node ID.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePoint {
    /// The node identifier.
    pub id: NodeId,
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
}

impl NodePoint {
    /// Create a new NodePoint.
    pub fn new(id: NodeId, x: f32, y: f32, z: f32) -> Self {
        Self { id, x, y, z }
    }
}

impl RTreeObject for NodePoint {
    type Envelope = AABB<[f32; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y, self.z])
    }
}

impl PointDistance for NodePoint {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        let dz = self.z - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Spatial index over the observed node positions.
///
/// Uses an R*-tree for efficient picking queries from the visual layer.
pub struct SpatialIndex {
    tree: RTree<NodePoint>,
}

impl SpatialIndex {
    /// Create a new empty spatial index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Insert a node into the index.
    pub fn insert(&mut self, id: NodeId, x: f32, y: f32, z: f32) {
        self.tree.insert(NodePoint::new(id, x, y, z));
    }

    /// Find the nearest node to a point.
    pub fn nearest(&self, x: f32, y: f32, z: f32) -> Option<NodeId> {
        self.tree.nearest_neighbor(&[x, y, z]).map(|point| point.id)
    }

    /// Find the nearest node within a maximum distance.
    pub fn nearest_within(&self, x: f32, y: f32, z: f32, max_distance: f32) -> Option<NodeId> {
        let max_distance_sq = max_distance * max_distance;
        self.tree
            .nearest_neighbor(&[x, y, z])
            .filter(|point| point.distance_2(&[x, y, z]) <= max_distance_sq)
            .map(|point| point.id)
    }

    /// Find all nodes within a radius of a point.
    pub fn in_radius(&self, x: f32, y: f32, z: f32, radius: f32) -> Vec<NodeId> {
        let radius_sq = radius * radius;
        self.tree
            .locate_within_distance([x, y, z], radius_sq)
            .map(|point| point.id)
            .collect()
    }

    /// Rebuild the index from a list of (id, x, y, z) tuples.
    ///
    /// This is more efficient than incremental inserts for bulk updates.
    pub fn rebuild(&mut self, points: &[(NodeId, f32, f32, f32)]) {
        let node_points: Vec<_> = points
            .iter()
            .map(|&(id, x, y, z)| NodePoint::new(id, x, y, z))
            .collect();

        self.tree = RTree::bulk_load(node_points);
    }

    /// Clear all nodes from the index.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Get the number of nodes in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}
