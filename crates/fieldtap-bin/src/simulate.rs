// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Built-in simulation source.
//!
//! Serves the familiar `Simulation` folder of OPC UA demo servers from an
//! in-memory address space, so the gateway can run without a server:
//!
//! ```text
//! Objects
//! └── Simulation      ns=5;s=85/0:Simulation
//!     ├── Counter1    Int32, +1 per tick, wraps at 1000
//!     ├── Random1     Double in [-2, 2)
//!     ├── Sawtooth1   Double ramp over 20 ticks
//!     ├── Sinusoid1   Double, 20-tick period
//!     └── Square1     Boolean, flips every 10 ticks
//! ```

use std::f64::consts::TAU;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use fieldtap_opcua::{AddressSpace, MemoryTransport, NodeId, QualifiedName, UtcTimestamp, Variant, from_utc};

use crate::shutdown::ShutdownListener;

/// Namespace of the simulation nodes.
pub const SIMULATION_NAMESPACE: u16 = 5;

/// Identifier of the simulation folder.
pub const SIMULATION_FOLDER: &str = "85/0:Simulation";

const PERIOD_TICKS: u64 = 20;
const COUNTER_WRAP: u64 = 1000;
const AMPLITUDE: f64 = 2.0;

const VARIABLES: &[&str] = &["Counter1", "Random1", "Sawtooth1", "Sinusoid1", "Square1"];

/// Drives value changes on a [`MemoryTransport`].
#[derive(Debug)]
pub struct Simulation {
    transport: MemoryTransport,
    tick: u64,
    seed: u64,
}

impl Simulation {
    /// Returns the simulation address space.
    pub fn address_space() -> AddressSpace {
        let folder = NodeId::string(SIMULATION_NAMESPACE, SIMULATION_FOLDER);
        let mut space = AddressSpace::new().with_object(
            &NodeId::OBJECTS_FOLDER,
            folder.clone(),
            QualifiedName::new(SIMULATION_NAMESPACE, "Simulation"),
        );
        for name in VARIABLES {
            space = space.with_variable(
                &folder,
                NodeId::string(SIMULATION_NAMESPACE, *name),
                QualifiedName::new(SIMULATION_NAMESPACE, *name),
            );
        }
        space
    }

    /// Creates a simulation publishing through `transport`.
    pub fn new(transport: MemoryTransport) -> Self {
        Self {
            transport,
            tick: 0,
            seed: 0x2545_F491_4F6C_DD1D,
        }
    }

    /// Returns the values of the current tick.
    pub fn values(&mut self) -> Vec<(NodeId, Variant)> {
        let n = self.tick;
        let phase = (n % PERIOD_TICKS) as f64 / PERIOD_TICKS as f64;
        let random = self.next_random();

        let values = [
            ("Counter1", Variant::Int32((n % COUNTER_WRAP) as i32)),
            ("Random1", Variant::Double(random)),
            ("Sawtooth1", Variant::Double(-AMPLITUDE + 2.0 * AMPLITUDE * phase)),
            ("Sinusoid1", Variant::Double(AMPLITUDE * (TAU * phase).sin())),
            ("Square1", Variant::Boolean((n / (PERIOD_TICKS / 2)) % 2 == 0)),
        ];
        values
            .into_iter()
            .map(|(name, value)| (NodeId::string(SIMULATION_NAMESPACE, name), value))
            .collect()
    }

    /// Publishes one tick of values. Returns the number of deliveries.
    pub fn step(&mut self) -> usize {
        let ticks = from_utc(UtcTimestamp::now());
        let deliveries = self
            .values()
            .into_iter()
            .map(|(node_id, value)| self.transport.publish(&node_id, value, Some(ticks)))
            .sum();
        self.tick = self.tick.wrapping_add(1);
        deliveries
    }

    /// Publishes a tick every `period` until shutdown.
    pub fn spawn(mut self, period: Duration, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_ms = period.as_millis() as u64, "Simulation started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let deliveries = self.step();
                        debug!(tick = self.tick, deliveries, "Simulation tick");
                    }
                    _ = shutdown.triggered() => break,
                }
            }
            info!(ticks = self.tick, "Simulation stopped");
        })
    }

    // xorshift64*, mapped onto [-AMPLITUDE, AMPLITUDE)
    fn next_random(&mut self) -> f64 {
        self.seed ^= self.seed >> 12;
        self.seed ^= self.seed << 25;
        self.seed ^= self.seed >> 27;
        let bits = self.seed.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11;
        let unit = bits as f64 / (1u64 << 53) as f64;
        -AMPLITUDE + 2.0 * AMPLITUDE * unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_space() {
        let space = Simulation::address_space();
        assert!(space.contains(&NodeId::string(5, "85/0:Simulation")));
        for name in VARIABLES {
            assert!(space.contains(&NodeId::string(5, *name)));
        }
    }

    #[test]
    fn test_values_follow_tick() {
        let mut sim = Simulation::new(MemoryTransport::new(Simulation::address_space()));

        let first = sim.values();
        assert_eq!(first[0].1, Variant::Int32(0));
        assert_eq!(first[2].1, Variant::Double(-2.0));
        assert_eq!(first[4].1, Variant::Boolean(true));

        sim.tick = 10;
        let later = sim.values();
        assert_eq!(later[0].1, Variant::Int32(10));
        assert_eq!(later[2].1, Variant::Double(0.0));
        assert_eq!(later[4].1, Variant::Boolean(false));
    }

    #[test]
    fn test_random_stays_in_range() {
        let mut sim = Simulation::new(MemoryTransport::new(AddressSpace::new()));
        for _ in 0..1000 {
            let v = sim.next_random();
            assert!((-AMPLITUDE..AMPLITUDE).contains(&v));
        }
    }

    #[test]
    fn test_step_without_session_delivers_nothing() {
        let mut sim = Simulation::new(MemoryTransport::new(Simulation::address_space()));
        assert_eq!(sim.step(), 0);
        assert_eq!(sim.tick, 1);
    }
}
