// State Manager - session handle, frame loop and presentation snapshots
// The frame loop is the host's scheduling primitive; the clock never schedules itself

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::body::CelestialBody;
use crate::epoch;
use crate::error::Result;
use crate::physics_engine::{AU, KM};
use crate::simulation::{ClockState, SimulationClock};

/// ~60 FPS
pub const DEFAULT_FRAME_TIME: Duration = Duration::from_millis(16);

// =============================================================================
// SESSION HANDLE
// =============================================================================

/// Explicit handle to one simulation session, shared with the frame loop
pub type SessionHandle = Arc<RwLock<SimulationClock>>;

pub fn new_session(clock: SimulationClock) -> SessionHandle {
    Arc::new(RwLock::new(clock))
}

// =============================================================================
// FRAME LOOP (runs in background thread)
// =============================================================================

pub struct FrameLoop {
    handle: JoinHandle<Result<u64>>,
    is_running: Arc<RwLock<bool>>,
}

impl FrameLoop {
    /// Ask the loop to exit after the current frame
    pub fn stop(&self) {
        *self.is_running.write() = false;
    }

    /// Wait for the loop to exit; returns the number of frames ticked
    pub fn join(self) -> Result<u64> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Tick the session once per frame until it is killed, stopped, or
/// `max_frames` is reached. A failing tick kills the session.
pub fn start_simulation_loop(
    session: SessionHandle,
    frame_time: Duration,
    max_frames: Option<u64>,
) -> FrameLoop {
    let is_running = Arc::new(RwLock::new(true));
    let running = is_running.clone();

    let handle = thread::spawn(move || {
        let mut frames = 0u64;

        loop {
            let start = Instant::now();

            {
                let mut clock = session.write();
                if clock.state() == ClockState::Killed {
                    break;
                }
                if let Err(err) = clock.tick() {
                    error!(error = %err, frame = frames, "tick failed, killing session");
                    clock.kill();
                    return Err(err);
                }
            }
            frames += 1;

            if !*running.read() || max_frames.is_some_and(|max| frames >= max) {
                break;
            }

            // Sleep to maintain frame rate
            let elapsed = start.elapsed();
            if elapsed < frame_time {
                thread::sleep(frame_time - elapsed);
            }
        }

        info!(frames, "frame loop finished");
        Ok(frames)
    });

    FrameLoop { handle, is_running }
}

// =============================================================================
// SERIALIZABLE STATE FOR FRONTEND
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendBody {
    pub name: String,
    pub is_central: bool,
    pub relative_to: Option<String>,
    pub position: [f64; 3], // AU (scaled for frontend)
    pub velocity: [f64; 3], // km/s
    pub radius: f64,        // km
    pub mass: f64,          // kg
}

impl From<&CelestialBody> for FrontendBody {
    fn from(b: &CelestialBody) -> Self {
        FrontendBody {
            name: b.name.clone(),
            is_central: b.is_central,
            relative_to: b.relative_to.clone(),
            position: [
                b.state.position.x / AU,
                b.state.position.y / AU,
                b.state.position.z / AU,
            ],
            velocity: [
                b.state.velocity.x / KM,
                b.state.velocity.y / KM,
                b.state.velocity.z / KM,
            ],
            radius: b.radius / KM,
            mass: b.mass,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendState {
    pub scenario: String,
    pub bodies: Vec<FrontendBody>,
    pub time: f64, // seconds since J2000
    pub epoch_offset: f64,
    pub display_date: DateTime<Utc>,
    pub julian_date: f64,
    pub is_playing: bool,
    pub seconds_per_frame: f64,
    pub energy_drift: f64,
}

impl SimulationClock {
    pub fn to_frontend(&self) -> FrontendState {
        let bodies: Vec<FrontendBody> = self
            .with_registry(|registry| registry.bodies().iter().map(FrontendBody::from).collect())
            .unwrap_or_default();

        FrontendState {
            scenario: self.name().to_string(),
            bodies,
            time: self.current_time(),
            epoch_offset: self.epoch_offset(),
            display_date: self.display_date(),
            julian_date: epoch::julian_date(self.current_time()),
            is_playing: self.is_playing(),
            seconds_per_frame: self.seconds_per_frame(),
            energy_drift: self.energy_drift(),
        }
    }
}

// =============================================================================
// HOST COMMANDS
// =============================================================================

pub fn get_simulation_state(session: &SessionHandle) -> FrontendState {
    session.read().to_frontend()
}

pub fn set_paused(session: &SessionHandle, paused: bool) {
    session.write().set_playing(!paused);
}

pub fn toggle_play(session: &SessionHandle) -> bool {
    let mut clock = session.write();
    clock.toggle_play();
    clock.is_playing()
}

pub fn reset_to_date(session: &SessionHandle, date: DateTime<Utc>) -> Result<()> {
    session.write().reset_to_date(date)
}

pub fn get_body_details(session: &SessionHandle, name: &str) -> Option<FrontendBody> {
    session.read().get_body(name).as_ref().map(FrontendBody::from)
}

pub fn kill_session(session: &SessionHandle) {
    session.write().kill();
}

// =============================================================================
// TESTS
// =============================================================================
