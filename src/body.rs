// Celestial Body - per-body record built from a scenario entry

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{OrreryError, Result};
use crate::physics_engine::{StateVector, KM};
use crate::scenario::{BodyConfig, OrbitConfig};

/// Mass given to non-central bodies when a scenario does not ask for full
/// N-body interaction, so they barely perturb each other while stepping
pub const NOMINAL_MASS: f64 = 1.0;

#[derive(Debug, Clone, Serialize)]
pub struct CelestialBody {
    pub name: String,
    /// Mass used by gravity stepping (kg)
    pub mass: f64,
    /// Mass from the scenario, kept for orbital placement (kg)
    configured_mass: f64,
    /// meters
    pub radius: f64,
    pub orbit: Option<OrbitConfig>,
    pub relative_to: Option<String>,
    pub is_central: bool,
    pub state: StateVector,
    #[serde(skip)]
    pub extra: Map<String, Value>,
}

impl CelestialBody {
    pub fn from_config(name: &str, config: &BodyConfig) -> Self {
        Self {
            name: name.to_string(),
            mass: config.mass,
            configured_mass: config.mass,
            radius: config.radius * KM,
            orbit: config.orbit.clone(),
            relative_to: config.relative_to.clone(),
            is_central: false,
            state: StateVector::zero(),
            extra: config.extra.clone(),
        }
    }

    /// A body with mass only, no orbit
    pub fn point(name: &str, mass: f64) -> Self {
        Self::from_config(name, &BodyConfig::new(mass))
    }

    pub fn configured_mass(&self) -> f64 {
        self.configured_mass
    }

    pub fn use_nominal_mass(&mut self) {
        self.mass = NOMINAL_MASS;
    }

    /// Semi-major axis at J2000 in meters, if the body has an orbit
    pub fn semi_major_axis(&self) -> Option<f64> {
        self.orbit.as_ref().map(|orbit| orbit.base.a * KM)
    }

    /// Pass 1: place the body from its own orbit at `epoch_seconds`, in the
    /// frame of its primary. `primary_mu` only affects velocity.
    pub fn set_position_from_date(&mut self, epoch_seconds: f64, primary_mu: f64) -> Result<()> {
        let state = match (&self.orbit, self.is_central) {
            (Some(orbit), false) => orbit.elements_at(epoch_seconds).to_state_vector(primary_mu),
            _ => StateVector::zero(),
        };

        if !state.is_finite() {
            return Err(OrreryError::Configuration(format!(
                "orbit of {} yields a non-finite position at epoch {}s",
                self.name, epoch_seconds
            )));
        }

        self.state = state;
        Ok(())
    }

    /// Pass 2: shift the body by its (already resolved) primary's state
    pub fn apply_relative_offset(&mut self, primary: &StateVector) {
        self.state = self.state.offset_by(primary);
    }
}
