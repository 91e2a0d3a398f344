// Gravity Ticker - advances body kinematics by fixed sub-steps
// Holds only a weak reference to the registry; elapsed time is the clock's business

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tracing::debug;

use crate::error::{OrreryError, Result};
use crate::physics_engine::{Integrator, VelocityVerletIntegrator};
use crate::registry::BodyRegistry;
use crate::scenario::DEFAULT_CALCULATIONS_PER_TICK;

pub type SharedRegistry = Arc<RwLock<BodyRegistry>>;

pub struct GravityTicker {
    /// Simulated seconds of one sub-step
    seconds_per_tick: f64,
    /// Sub-steps per tick
    calculations_per_tick: u32,
    integrator: Box<dyn Integrator>,
    registry: Weak<RwLock<BodyRegistry>>,
}

impl GravityTicker {
    pub fn new() -> Self {
        Self::with_integrator(Box::new(VelocityVerletIntegrator::new()))
    }

    pub fn with_integrator(integrator: Box<dyn Integrator>) -> Self {
        Self {
            seconds_per_tick: 1.0,
            calculations_per_tick: DEFAULT_CALCULATIONS_PER_TICK,
            integrator,
            registry: Weak::new(),
        }
    }

    /// `calculations_per_tick` falls back to [`DEFAULT_CALCULATIONS_PER_TICK`]
    pub fn configure(&mut self, seconds_per_tick: f64, calculations_per_tick: Option<u32>) -> Result<()> {
        let calculations = calculations_per_tick.unwrap_or(DEFAULT_CALCULATIONS_PER_TICK);
        if !(seconds_per_tick.is_finite() && seconds_per_tick > 0.0) {
            return Err(OrreryError::InvalidStepper(format!(
                "secondsPerTick must be positive and finite, got {}",
                seconds_per_tick
            )));
        }
        if calculations == 0 {
            return Err(OrreryError::InvalidStepper(
                "calculationsPerTick must be at least 1".to_string(),
            ));
        }

        self.seconds_per_tick = seconds_per_tick;
        self.calculations_per_tick = calculations;
        debug!(seconds_per_tick, calculations_per_tick = calculations, "gravity ticker configured");
        Ok(())
    }

    pub fn seconds_per_tick(&self) -> f64 {
        self.seconds_per_tick
    }

    pub fn calculations_per_tick(&self) -> u32 {
        self.calculations_per_tick
    }

    /// Simulated seconds one `tick` advances
    pub fn seconds_per_frame(&self) -> f64 {
        self.seconds_per_tick * self.calculations_per_tick as f64
    }

    pub fn attach(&mut self, registry: &SharedRegistry) {
        self.registry = Arc::downgrade(registry);
    }

    pub fn detach(&mut self) {
        self.registry = Weak::new();
    }

    /// Run every sub-step and return the simulated seconds advanced
    pub fn tick(&mut self) -> Result<f64> {
        let registry = self.registry.upgrade().ok_or(OrreryError::NotAttached)?;
        let mut registry = registry.write();
        let bodies = registry.bodies_mut();

        for step in 0..self.calculations_per_tick {
            self.integrator.step(bodies, self.seconds_per_tick);

            if let Some(body) = bodies.iter().find(|b| !b.state.is_finite()) {
                return Err(OrreryError::NumericalOverflow {
                    body: body.name.clone(),
                    step,
                });
            }
        }

        Ok(self.seconds_per_frame())
    }
}

impl Default for GravityTicker {
    fn default() -> Self {
        Self::new()
    }
}
