// Body Registry - every body of the session, keyed by name
// Owns the bodies; positions are resolved in two passes so satellites follow their primaries

use tracing::debug;

use crate::body::CelestialBody;
use crate::collaborators::Scene;
use crate::error::{OrreryError, Result};
use crate::physics_engine::G;
use crate::scenario::BodyConfig;

/// Name that always resolves to the central body
pub const CENTRAL: &str = "central";

/// Extents of the system, meters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub largest_sma: f64,
    pub smallest_sma: f64,
    pub largest_radius: f64,
}

#[derive(Debug, Clone)]
pub struct BodyRegistry {
    bodies: Vec<CelestialBody>,
    central: usize,
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Pending,
    InProgress,
    Done,
}

impl BodyRegistry {
    /// Create one body per scenario entry. The heaviest body becomes central;
    /// on equal mass the first declared one wins.
    pub fn build(scenario_bodies: &[(String, BodyConfig)]) -> Result<Self> {
        if scenario_bodies.is_empty() {
            return Err(OrreryError::Configuration(
                "scenario has no bodies, cannot choose a central body".to_string(),
            ));
        }

        let mut bodies: Vec<CelestialBody> = Vec::with_capacity(scenario_bodies.len());
        let mut central = 0;
        for (name, config) in scenario_bodies {
            if bodies.iter().any(|b| b.name == *name) {
                return Err(OrreryError::Configuration(format!("duplicate body {}", name)));
            }
            let body = CelestialBody::from_config(name, config);
            if !bodies.is_empty() && body.mass > bodies[central].mass {
                central = bodies.len();
            }
            bodies.push(body);
        }
        bodies[central].is_central = true;

        let registry = Self { bodies, central };
        registry.check_references()?;
        Ok(registry)
    }

    fn check_references(&self) -> Result<()> {
        let central = self.central();
        if let Some(primary) = &central.relative_to {
            return Err(OrreryError::Configuration(format!(
                "central body {} cannot be relative to {}",
                central.name, primary
            )));
        }
        for body in &self.bodies {
            if let Some(primary) = &body.relative_to {
                if self.index_of(primary).is_none() {
                    return Err(OrreryError::Configuration(format!(
                        "{} is relative to unknown body {}",
                        body.name, primary
                    )));
                }
            }
        }
        Ok(())
    }

    /// First placement of the session. Non-central bodies become test
    /// particles unless `calculate_all_masses`. The scene hears about each
    /// body only once every body has its final position.
    pub fn initialize(
        &mut self,
        current_instant: f64,
        calculate_all_masses: bool,
        scene: &mut dyn Scene,
    ) -> Result<()> {
        self.place(current_instant, calculate_all_masses)?;
        self.announce(scene);
        Ok(())
    }

    /// The fallible half of [`Self::initialize`]: positions first, so a
    /// failure leaves masses as configured
    pub fn place(&mut self, current_instant: f64, calculate_all_masses: bool) -> Result<()> {
        self.reposition(current_instant)?;
        if !calculate_all_masses {
            for body in self.bodies.iter_mut().filter(|b| !b.is_central) {
                body.use_nominal_mass();
            }
        }
        Ok(())
    }

    /// `add_body` then `after_initialized` for every body, in registry order
    pub fn announce(&self, scene: &mut dyn Scene) {
        for body in &self.bodies {
            scene.add_body(body);
            scene.after_initialized(body);
        }
    }

    /// Place every body at `current_instant`. Nothing changes if any body fails.
    pub fn reposition(&mut self, current_instant: f64) -> Result<()> {
        let order = self.resolution_order()?;
        let mut staged = self.bodies.clone();

        // pass 1: own orbit only
        for body in staged.iter_mut() {
            let mu = G * self.primary_mass(body);
            body.set_position_from_date(current_instant, mu)?;
        }

        // pass 2: shift satellites by their resolved primary, primaries first
        for &idx in &order {
            let primary = match &staged[idx].relative_to {
                Some(name) => self.index_of(name).filter(|&p| p != self.central),
                None => None,
            };
            if let Some(p) = primary {
                let primary_state = staged[p].state;
                staged[idx].apply_relative_offset(&primary_state);
            }
        }

        self.bodies = staged;
        debug!(instant = current_instant, bodies = self.bodies.len(), "bodies repositioned");
        Ok(())
    }

    /// Indices ordered so every body comes after the body it is relative to
    pub fn resolution_order(&self) -> Result<Vec<usize>> {
        let mut marks = vec![Visit::Pending; self.bodies.len()];
        let mut order = Vec::with_capacity(self.bodies.len());
        let mut path = Vec::new();
        for idx in 0..self.bodies.len() {
            self.visit(idx, &mut marks, &mut path, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        idx: usize,
        marks: &mut [Visit],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[idx] {
            Visit::Done => return Ok(()),
            Visit::InProgress => {
                let start = path.iter().position(|&p| p == idx).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..]
                    .iter()
                    .map(|&p| self.bodies[p].name.clone())
                    .collect();
                cycle.push(self.bodies[idx].name.clone());
                return Err(OrreryError::CyclicDependency(cycle));
            }
            Visit::Pending => {}
        }

        marks[idx] = Visit::InProgress;
        path.push(idx);
        if let Some(name) = &self.bodies[idx].relative_to {
            let dep = self.index_of(name).ok_or_else(|| {
                OrreryError::Configuration(format!(
                    "{} is relative to unknown body {}",
                    self.bodies[idx].name, name
                ))
            })?;
            self.visit(dep, marks, path, order)?;
        }
        path.pop();
        marks[idx] = Visit::Done;
        order.push(idx);
        Ok(())
    }

    /// Configured mass of the body `body` orbits
    fn primary_mass(&self, body: &CelestialBody) -> f64 {
        let primary = body
            .relative_to
            .as_deref()
            .and_then(|name| self.index_of(name))
            .unwrap_or(self.central);
        self.bodies[primary].configured_mass()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.bodies.iter().position(|b| b.name == name)
    }

    /// Named body; `"central"` or an empty name gives the central body
    pub fn get(&self, name: &str) -> Option<&CelestialBody> {
        if name.is_empty() || name == CENTRAL {
            return Some(self.central());
        }
        self.bodies.iter().find(|b| b.name == name)
    }

    pub fn central(&self) -> &CelestialBody {
        &self.bodies[self.central]
    }

    pub fn bodies(&self) -> &[CelestialBody] {
        &self.bodies
    }

    /// Kinematic state is only mutated through this by the gravity ticker
    pub fn bodies_mut(&mut self) -> &mut [CelestialBody] {
        &mut self.bodies
    }

    pub fn dimensions(&self) -> Dimensions {
        let central_name = &self.central().name;
        let largest_radius = self.bodies.iter().map(|b| b.radius).fold(0.0, f64::max);

        let orbiting = || {
            self.bodies
                .iter()
                .filter(|b| !b.is_central)
                .filter_map(|b| b.semi_major_axis().map(|a| (b, a)))
        };
        let largest_sma = orbiting().map(|(_, a)| a).fold(0.0, f64::max);
        let smallest_sma = orbiting()
            .filter(|(b, _)| b.relative_to.as_ref().map_or(true, |r| r == central_name))
            .map(|(_, a)| a)
            .reduce(f64::min)
            .unwrap_or(0.0);

        Dimensions {
            largest_sma,
            smallest_sma,
            largest_radius,
        }
    }
}
