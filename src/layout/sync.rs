//! Observed-position sync.
//!
//! The only code that writes externally visible state. Everything else in
//! the simulation operates on virtual positions; these two operations move
//! observed state toward (or onto) the virtual state and fire every node's
//! movement callback afterward, so dependent visuals can follow.

use crate::graph::GraphRegistry;

/// Copy every node's virtual position into its observed position, exactly.
///
/// Used on every continuous-mode step and at the end of the settle phase;
/// the final snap is bit-for-bit (same f32 values, no arithmetic).
pub fn sync_all(registry: &mut GraphRegistry) {
    for slot in 0..registry.node_count() {
        let target = registry.virtual_positions()[slot];
        registry.write_observed_slot(slot, target);
    }
    registry.invoke_movement_callbacks();
}

/// Blend every node's observed position toward its virtual position.
///
/// `factor` is the fraction of the remaining gap covered this tick; the
/// settle phase derives it from tick time over remaining settle time.
pub fn blend_all(registry: &mut GraphRegistry, factor: f32) {
    for slot in 0..registry.node_count() {
        let target = registry.virtual_positions()[slot];
        let observed = registry.observed_slot(slot);
        registry.write_observed_slot(slot, observed + (target - observed) * factor);
    }
    registry.invoke_movement_callbacks();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{HandleId, NodeId};
    use glam::Vec3;
    use std::cell::Cell;
    use std::rc::Rc;

    fn registry_with_gap() -> GraphRegistry {
        let mut reg = GraphRegistry::new();
        reg.add_node(HandleId(1), NodeId(0), Vec3::ZERO, 1.0, None)
            .unwrap();
        reg.seed_virtual_from_observed();
        // Push the virtual position away from the observed one.
        reg.apply_displacements(&[Vec3::new(10.0, -4.0, 2.0)]);
        reg
    }

    #[test]
    fn test_sync_all_copies_exactly() {
        let mut reg = registry_with_gap();
        sync_all(&mut reg);

        let observed = reg.observed_position_of(NodeId(0)).unwrap();
        let target = reg.virtual_position_of(NodeId(0)).unwrap();
        assert_eq!(observed.x.to_bits(), target.x.to_bits());
        assert_eq!(observed.y.to_bits(), target.y.to_bits());
        assert_eq!(observed.z.to_bits(), target.z.to_bits());
    }

    #[test]
    fn test_blend_all_moves_partway() {
        let mut reg = registry_with_gap();
        blend_all(&mut reg, 0.5);

        let observed = reg.observed_position_of(NodeId(0)).unwrap();
        assert_eq!(observed, Vec3::new(5.0, -2.0, 1.0));

        // Virtual state is untouched by the sync path.
        assert_eq!(
            reg.virtual_position_of(NodeId(0)),
            Some(Vec3::new(10.0, -4.0, 2.0))
        );
    }

    #[test]
    fn test_blend_zero_factor_keeps_observed() {
        let mut reg = registry_with_gap();
        blend_all(&mut reg, 0.0);
        assert_eq!(reg.observed_position_of(NodeId(0)), Some(Vec3::ZERO));
    }

    #[test]
    fn test_callbacks_fire_on_both_paths() {
        let count = Rc::new(Cell::new(0u32));
        let seen = count.clone();

        let mut reg = GraphRegistry::new();
        reg.add_node(
            HandleId(1),
            NodeId(0),
            Vec3::ZERO,
            1.0,
            Some(Box::new(move || seen.set(seen.get() + 1))),
        )
        .unwrap();
        reg.seed_virtual_from_observed();

        sync_all(&mut reg);
        assert_eq!(count.get(), 1);

        blend_all(&mut reg, 0.25);
        assert_eq!(count.get(), 2);
    }
}
