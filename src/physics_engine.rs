// Physics Engine - Orbital Mechanics
// Keplerian placement from orbital elements and the default N-body integrator

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::body::CelestialBody;

// =============================================================================
// PHYSICAL CONSTANTS (SI Units)
// =============================================================================

/// Gravitational constant (m³/(kg·s²))
pub const G: f64 = 6.67430e-11;

/// Astronomical Unit in meters
pub const AU: f64 = 1.495978707e11;

/// Kilometer in meters (scenario distances are given in km)
pub const KM: f64 = 1000.0;

/// Seconds in one Julian century (element rates are per century)
pub const SECONDS_PER_CENTURY: f64 = 36525.0 * 86400.0;

// =============================================================================
// 3D VECTOR MATHEMATICS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 1e-15 {
            self.scale(1.0 / mag)
        } else {
            Self::zero()
        }
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn sub(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// =============================================================================
// STATE VECTOR (Position + Velocity)
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct StateVector {
    pub position: Vector3, // meters (SI)
    pub velocity: Vector3, // m/s (SI)
}

impl StateVector {
    pub fn new(position: Vector3, velocity: Vector3) -> Self {
        Self { position, velocity }
    }

    pub fn zero() -> Self {
        Self {
            position: Vector3::zero(),
            velocity: Vector3::zero(),
        }
    }

    /// Shift this state into the frame of `origin` (used for relative bodies)
    pub fn offset_by(&self, origin: &StateVector) -> Self {
        Self {
            position: self.position.add(&origin.position),
            velocity: self.velocity.add(&origin.velocity),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }
}

// =============================================================================
// KEPLERIAN ORBITAL ELEMENTS
// =============================================================================

/// Osculating elements at one instant, SI units and radians
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OrbitalElements {
    /// Semi-major axis (meters)
    pub semi_major_axis: f64,
    /// Eccentricity (0-1 for elliptical)
    pub eccentricity: f64,
    /// Inclination (radians)
    pub inclination: f64,
    /// Longitude of ascending node (radians)
    pub longitude_ascending_node: f64,
    /// Argument of perihelion (radians)
    pub argument_perihelion: f64,
    /// Mean anomaly (radians)
    pub mean_anomaly: f64,
}

impl OrbitalElements {
    /// Convert orbital elements to a Cartesian state vector around a primary
    /// with gravitational parameter `mu`
    pub fn to_state_vector(&self, mu: f64) -> StateVector {
        let a = self.semi_major_axis;
        let e = self.eccentricity;
        let i = self.inclination;
        let omega_big = self.longitude_ascending_node; // Ω
        let omega_small = self.argument_perihelion; // ω
        let m = normalize_angle(self.mean_anomaly);

        let eccentric_anomaly = solve_kepler_equation(m, e);

        let cos_e = eccentric_anomaly.cos();
        let true_anomaly = 2.0
            * ((1.0 + e).sqrt() * (eccentric_anomaly / 2.0).sin())
                .atan2((1.0 - e).sqrt() * (eccentric_anomaly / 2.0).cos());

        // Distance from focus
        let r = a * (1.0 - e * cos_e);

        // Perifocal frame
        let cos_nu = true_anomaly.cos();
        let sin_nu = true_anomaly.sin();
        let x_orb = r * cos_nu;
        let y_orb = r * sin_nu;

        let semi_latus = a * (1.0 - e * e);
        let sqrt_mu_p = if mu > 0.0 && semi_latus > 0.0 {
            (mu / semi_latus).sqrt()
        } else {
            0.0
        };
        let vx_orb = -sqrt_mu_p * sin_nu;
        let vy_orb = sqrt_mu_p * (e + cos_nu);

        let cos_omega = omega_big.cos();
        let sin_omega = omega_big.sin();
        let cos_w = omega_small.cos();
        let sin_w = omega_small.sin();
        let cos_i = i.cos();
        let sin_i = i.sin();

        let r11 = cos_omega * cos_w - sin_omega * sin_w * cos_i;
        let r12 = -cos_omega * sin_w - sin_omega * cos_w * cos_i;
        let r21 = sin_omega * cos_w + cos_omega * sin_w * cos_i;
        let r22 = -sin_omega * sin_w + cos_omega * cos_w * cos_i;
        let r31 = sin_w * sin_i;
        let r32 = cos_w * sin_i;

        let position = Vector3::new(
            r11 * x_orb + r12 * y_orb,
            r21 * x_orb + r22 * y_orb,
            r31 * x_orb + r32 * y_orb,
        );

        let velocity = Vector3::new(
            r11 * vx_orb + r12 * vy_orb,
            r21 * vx_orb + r22 * vy_orb,
            r31 * vx_orb + r32 * vy_orb,
        );

        StateVector { position, velocity }
    }
}

/// Wrap an angle into [-π, π)
pub fn normalize_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

/// Solve Kepler's equation M = E - e*sin(E) using Newton-Raphson
pub fn solve_kepler_equation(mean_anomaly: f64, eccentricity: f64) -> f64 {
    let mut e_anom = if eccentricity > 0.8 {
        PI.copysign(mean_anomaly)
    } else {
        mean_anomaly
    };
    let tolerance = 1e-12;
    let max_iterations = 50;

    for _ in 0..max_iterations {
        let f = e_anom - eccentricity * e_anom.sin() - mean_anomaly;
        let f_prime = 1.0 - eccentricity * e_anom.cos();
        let delta = f / f_prime;
        e_anom -= delta;

        if delta.abs() < tolerance {
            break;
        }
    }

    e_anom
}

// =============================================================================
// INTEGRATORS
// =============================================================================

/// One fixed-size step of gravitational integration over the whole body set
pub trait Integrator: Send + Sync {
    fn step(&self, bodies: &mut [CelestialBody], dt: f64);
}

/// Velocity Verlet (symplectic)
///
/// x(t+dt) = x(t) + v(t)*dt + 0.5*a(t)*dt²
/// v(t+dt) = v(t) + 0.5*(a(t) + a(t+dt))*dt
#[derive(Debug, Clone, Default)]
pub struct VelocityVerletIntegrator {
    /// Plummer softening length (m), 0 for pure Newtonian gravity
    pub softening: f64,
}

impl VelocityVerletIntegrator {
    pub fn new() -> Self {
        Self { softening: 0.0 }
    }

    fn calculate_accelerations(&self, bodies: &[CelestialBody]) -> Vec<Vector3> {
        let eps2 = self.softening * self.softening;
        bodies
            .iter()
            .enumerate()
            .map(|(i, body)| {
                let mut total_accel = Vector3::zero();
                for (j, other) in bodies.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    let r_vec = other.state.position.sub(&body.state.position);
                    let r2 = r_vec.dot(&r_vec) + eps2;
                    if r2 > 1e-20 {
                        let accel_mag = G * other.mass / r2;
                        total_accel = total_accel.add(&r_vec.normalize().scale(accel_mag));
                    }
                }
                total_accel
            })
            .collect()
    }
}

impl Integrator for VelocityVerletIntegrator {
    fn step(&self, bodies: &mut [CelestialBody], dt: f64) {
        let dt_sq_half = dt * dt * 0.5;

        let accelerations = self.calculate_accelerations(bodies);

        for (body, a) in bodies.iter_mut().zip(&accelerations) {
            let v = body.state.velocity;
            body.state.position = body
                .state
                .position
                .add(&v.scale(dt))
                .add(&a.scale(dt_sq_half));
        }

        let new_accelerations = self.calculate_accelerations(bodies);

        for ((body, a0), a1) in bodies
            .iter_mut()
            .zip(&accelerations)
            .zip(&new_accelerations)
        {
            let avg_accel = a0.add(a1).scale(0.5);
            body.state.velocity = body.state.velocity.add(&avg_accel.scale(dt));
        }
    }
}

// =============================================================================
// ENERGY CALCULATIONS (for drift monitoring)
// =============================================================================

/// Total mechanical energy of the system
pub fn calculate_total_energy(bodies: &[CelestialBody]) -> f64 {
    let mut kinetic = 0.0;
    let mut potential = 0.0;

    for body in bodies {
        let v = body.state.velocity.magnitude();
        kinetic += 0.5 * body.mass * v * v;
    }

    for i in 0..bodies.len() {
        for j in (i + 1)..bodies.len() {
            let r = bodies[i]
                .state
                .position
                .sub(&bodies[j].state.position)
                .magnitude();
            if r > 1e-10 {
                potential -= G * bodies[i].mass * bodies[j].mass / r;
            }
        }
    }

    kinetic + potential
}

// =============================================================================
// TESTS
// =============================================================================
