//! Step scheduling and run modes.
//!
//! The scheduler is a small state machine advanced by the host's tick
//! signal (one step per tick, no background thread):
//!
//! - **Continuous** (`start`): every tick computes displacements, applies
//!   them to virtual positions and syncs observed state, until `stop`.
//! - **Batch** (`run_for_iterations`): n headless ticks advance only the
//!   virtual positions, then a settle phase blends observed positions onto
//!   the final virtual positions over a fixed duration and snaps exactly.
//!
//! Within a step the force kernel fans out across the worker pool and is
//! awaited synchronously; apply and sync are single-threaded, so steps
//! never overlap and the registry is never shared mutably.

use super::config::SimulationConfig;
use super::forces::{self, ForceSnapshot};
use super::sync;
use crate::graph::GraphRegistry;

/// Length of the settle phase in time units.
pub const SETTLE_DURATION: f32 = 1.0;

/// Scheduler run state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunState {
    /// Not simulating; ticks are ignored.
    Idle,
    /// Continuous mode: step + sync every tick until stopped.
    Running,
    /// Batch mode: headless steps remaining before the settle phase.
    RunningHeadless {
        /// Steps left to perform.
        remaining: u32,
    },
    /// Post-batch interpolation of observed positions onto virtual ones.
    Settling {
        /// Settle time consumed so far.
        elapsed: f32,
    },
}

/// Drives simulation steps against a registry.
pub struct Scheduler {
    state: RunState,
}

impl Scheduler {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether any mode is active.
    pub fn is_running(&self) -> bool {
        self.state != RunState::Idle
    }

    /// Enter continuous mode.
    ///
    /// Seeds every virtual position from the current observed position.
    /// Calling while already running restarts from the observed state.
    pub fn start(&mut self, registry: &mut GraphRegistry) {
        registry.seed_virtual_from_observed();
        log::debug!("continuous run started ({} nodes)", registry.node_count());
        self.state = RunState::Running;
    }

    /// Return to idle from any state.
    ///
    /// Idempotent; a stop with no run in progress is a no-op. Positions are
    /// left exactly as the last completed step wrote them (no rollback).
    pub fn stop(&mut self) {
        if self.state != RunState::Idle {
            log::debug!("run stopped");
        }
        self.state = RunState::Idle;
    }

    /// Enter batch mode: `iterations` headless steps, then settle.
    ///
    /// Seeds every virtual position from the current observed position.
    /// With zero iterations the settle phase begins immediately.
    pub fn run_for_iterations(&mut self, registry: &mut GraphRegistry, iterations: u32) {
        registry.seed_virtual_from_observed();
        log::debug!(
            "headless run started ({iterations} iterations, {} nodes)",
            registry.node_count()
        );
        self.state = if iterations == 0 {
            RunState::Settling { elapsed: 0.0 }
        } else {
            RunState::RunningHeadless {
                remaining: iterations,
            }
        };
    }

    /// Advance by one tick.
    ///
    /// `dt` is the host's tick duration; it is only consulted by the settle
    /// phase (steps are paced by the `time_step` divisor, not wall time).
    pub fn tick(&mut self, registry: &mut GraphRegistry, config: &SimulationConfig, dt: f32) {
        match self.state {
            RunState::Idle => {}
            RunState::Running => {
                step(registry, config);
                sync::sync_all(registry);
            }
            RunState::RunningHeadless { remaining } => {
                step(registry, config);
                let remaining = remaining - 1;
                if remaining == 0 {
                    log::debug!("headless run complete, settling");
                    self.state = RunState::Settling { elapsed: 0.0 };
                } else {
                    self.state = RunState::RunningHeadless { remaining };
                }
            }
            RunState::Settling { elapsed } => {
                let remaining_time = SETTLE_DURATION - elapsed;
                if dt >= remaining_time {
                    // Snap to the final virtual positions, bit-for-bit.
                    sync::sync_all(registry);
                    log::debug!("settle complete");
                    self.state = RunState::Idle;
                } else {
                    sync::blend_all(registry, dt / remaining_time);
                    self.state = RunState::Settling {
                        elapsed: elapsed + dt,
                    };
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// One simulation step: snapshot, parallel force pass, apply.
fn step(registry: &mut GraphRegistry, config: &SimulationConfig) {
    let snapshot = ForceSnapshot::capture(registry);
    let displacements = forces::compute_displacements(&snapshot, config);
    registry.apply_displacements(&displacements);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{HandleId, NodeId};
    use glam::Vec3;
    use std::cell::Cell;
    use std::rc::Rc;

    const DT: f32 = 1.0 / 60.0;

    fn connected_pair() -> (GraphRegistry, Scheduler, SimulationConfig) {
        let mut reg = GraphRegistry::new();
        reg.add_node(HandleId(1), NodeId(0), Vec3::ZERO, 1.0, None)
            .unwrap();
        reg.add_node(HandleId(2), NodeId(1), Vec3::new(10.0, 0.0, 0.0), 1.0, None)
            .unwrap();
        reg.add_edge(HandleId(1), HandleId(2));
        (reg, Scheduler::new(), SimulationConfig::default())
    }

    fn observed_distance(reg: &GraphRegistry) -> f32 {
        let a = reg.observed_position_of(NodeId(0)).unwrap();
        let b = reg.observed_position_of(NodeId(1)).unwrap();
        (a - b).length()
    }

    #[test]
    fn test_idle_ticks_do_nothing() {
        let (mut reg, mut scheduler, config) = connected_pair();
        scheduler.tick(&mut reg, &config, DT);
        scheduler.tick(&mut reg, &config, DT);

        assert_eq!(scheduler.state(), RunState::Idle);
        assert_eq!(observed_distance(&reg), 10.0);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (_, mut scheduler, _) = connected_pair();
        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.state(), RunState::Idle);
    }

    #[test]
    fn test_continuous_converges_to_equilibrium() {
        let (mut reg, mut scheduler, config) = connected_pair();
        scheduler.start(&mut reg);

        for _ in 0..300 {
            scheduler.tick(&mut reg, &config, DT);
        }

        // Equilibrium where Ke/d^2 = K*d, i.e. d = (Ke/K)^(1/3).
        let d_star = (config.repulsion_constant / config.spring_constant).powf(1.0 / 3.0);
        let d = observed_distance(&reg);
        assert!(
            (d - d_star).abs() < 1e-3,
            "distance {d} did not stabilize near {d_star}"
        );
        assert_eq!(scheduler.state(), RunState::Running);
    }

    #[test]
    fn test_stop_cancels_without_rollback() {
        let (mut reg, mut scheduler, config) = connected_pair();
        scheduler.start(&mut reg);
        scheduler.tick(&mut reg, &config, DT);

        let after_one_step = observed_distance(&reg);
        assert!(after_one_step < 10.0);

        scheduler.stop();
        scheduler.tick(&mut reg, &config, DT);
        assert_eq!(observed_distance(&reg), after_one_step);
    }

    #[test]
    fn test_immobile_node_never_moves() {
        let (mut reg, mut scheduler, config) = connected_pair();
        reg.set_mobility(HandleId(2), true);

        scheduler.start(&mut reg);
        for _ in 0..50 {
            scheduler.tick(&mut reg, &config, DT);
        }
        assert_eq!(
            reg.observed_position_of(NodeId(1)),
            Some(Vec3::new(10.0, 0.0, 0.0))
        );
        assert_eq!(
            reg.virtual_position_of(NodeId(1)),
            Some(Vec3::new(10.0, 0.0, 0.0))
        );
        // The mobile partner still moved.
        assert_ne!(reg.observed_position_of(NodeId(0)), Some(Vec3::ZERO));
        scheduler.stop();

        scheduler.run_for_iterations(&mut reg, 10);
        for _ in 0..10 {
            scheduler.tick(&mut reg, &config, DT);
        }
        assert_eq!(
            reg.virtual_position_of(NodeId(1)),
            Some(Vec3::new(10.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_headless_steps_leave_observed_untouched() {
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
        reg.add_node(HandleId(2), NodeId(1), Vec3::new(10.0, 0.0, 0.0), 1.0, None)
            .unwrap();
        reg.add_edge(HandleId(1), HandleId(2));

        let mut scheduler = Scheduler::new();
        let config = SimulationConfig::default();
        scheduler.run_for_iterations(&mut reg, 5);

        for expected_remaining in (1..=4).rev() {
            scheduler.tick(&mut reg, &config, DT);
            assert_eq!(
                scheduler.state(),
                RunState::RunningHeadless {
                    remaining: expected_remaining
                }
            );
        }

        // Virtual positions moved, observed ones did not, no callbacks.
        assert_ne!(reg.virtual_position_of(NodeId(0)), Some(Vec3::ZERO));
        assert_eq!(reg.observed_position_of(NodeId(0)), Some(Vec3::ZERO));
        assert_eq!(count.get(), 0);

        // The nth step flips into the settle phase.
        scheduler.tick(&mut reg, &config, DT);
        assert_eq!(scheduler.state(), RunState::Settling { elapsed: 0.0 });
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_settle_blends_then_snaps_exactly() {
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
        reg.add_node(HandleId(2), NodeId(1), Vec3::new(10.0, 0.0, 0.0), 1.0, None)
            .unwrap();
        reg.add_edge(HandleId(1), HandleId(2));

        let mut scheduler = Scheduler::new();
        let config = SimulationConfig::default();
        scheduler.run_for_iterations(&mut reg, 20);
        for _ in 0..20 {
            scheduler.tick(&mut reg, &config, DT);
        }
        assert_eq!(scheduler.state(), RunState::Settling { elapsed: 0.0 });

        let target = reg.virtual_position_of(NodeId(0)).unwrap();

        // First settle tick covers 0.3 of the 1.0 settle duration.
        scheduler.tick(&mut reg, &config, 0.3);
        let partway = reg.observed_position_of(NodeId(0)).unwrap();
        assert!(partway != Vec3::ZERO && partway != target);
        assert_eq!(count.get(), 1);

        // Two more ticks pass the duration and snap.
        scheduler.tick(&mut reg, &config, 0.3);
        scheduler.tick(&mut reg, &config, 0.5);
        assert_eq!(scheduler.state(), RunState::Idle);
        assert_eq!(count.get(), 3);

        let observed = reg.observed_position_of(NodeId(0)).unwrap();
        let synced = reg.virtual_position_of(NodeId(0)).unwrap();
        assert_eq!(observed.x.to_bits(), synced.x.to_bits());
        assert_eq!(observed.y.to_bits(), synced.y.to_bits());
        assert_eq!(observed.z.to_bits(), synced.z.to_bits());

        // Virtual positions are frozen during settle.
        assert_eq!(synced, target);

        // Further ticks are ignored.
        scheduler.tick(&mut reg, &config, DT);
        assert_eq!(reg.observed_position_of(NodeId(0)), Some(observed));
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_zero_iterations_settles_onto_seed() {
        let (mut reg, mut scheduler, config) = connected_pair();
        scheduler.run_for_iterations(&mut reg, 0);
        assert_eq!(scheduler.state(), RunState::Settling { elapsed: 0.0 });

        scheduler.tick(&mut reg, &config, SETTLE_DURATION);
        assert_eq!(scheduler.state(), RunState::Idle);
        assert_eq!(observed_distance(&reg), 10.0);
    }

    #[test]
    fn test_start_reseeds_virtual_positions() {
        let (mut reg, mut scheduler, config) = connected_pair();
        scheduler.start(&mut reg);
        for _ in 0..5 {
            scheduler.tick(&mut reg, &config, DT);
        }
        scheduler.stop();

        // Host moves a node between runs; the next run picks that up.
        reg.set_observed_position(HandleId(1), Vec3::new(-3.0, 0.0, 0.0));
        scheduler.start(&mut reg);
        assert_eq!(
            reg.virtual_position_of(NodeId(0)),
            Some(Vec3::new(-3.0, 0.0, 0.0))
        );
    }
}
