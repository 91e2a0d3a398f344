// Orrery - time and propagation kernel for a solar system simulator
// Library entry point and headless runner

pub mod body;
pub mod collaborators;
pub mod config;
pub mod epoch;
pub mod error;
pub mod gravity_ticker;
pub mod headless;
pub mod physics_engine;
pub mod registry;
pub mod scenario;
pub mod simulation;
pub mod state_manager;

pub use body::CelestialBody;
pub use collaborators::{resource_channel, DateInput, ResourceLoader, ResourcesReady, Scene};
pub use config::OrreryConfig;
pub use error::{OrreryError, Result};
pub use gravity_ticker::GravityTicker;
pub use registry::BodyRegistry;
pub use scenario::Scenario;
pub use simulation::{ClockState, SimulationClock};
pub use state_manager::{start_simulation_loop, FrontendState, SessionHandle};

use headless::{HeadlessDateInput, HeadlessScene};
use state_manager::{get_simulation_state, kill_session, new_session};

/// Run a scenario without a presentation layer and return its final state
pub async fn run(config: OrreryConfig) -> anyhow::Result<FrontendState> {
    let scenario = Scenario::from_path(&config.scenario)?;

    let mut clock = SimulationClock::new(
        Box::new(HeadlessScene::default()),
        Box::new(HeadlessDateInput::new(config.start_date)),
    );
    clock.start(&scenario, &config.user_overrides())?;

    // nothing to load headless; signal from a task like a real loader would
    let (loader, ready) = resource_channel();
    tokio::spawn(async move { loader.ready() });
    clock.await_ready(ready).await?;
    clock.set_playing(!config.paused);

    let session = new_session(clock);
    let frame_loop = start_simulation_loop(session.clone(), config.frame_time(), Some(config.frames));
    let frames = tokio::task::spawn_blocking(move || frame_loop.join()).await??;

    let state = get_simulation_state(&session);
    tracing::info!(frames, date = %state.display_date, "run complete");
    kill_session(&session);
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use clap::Parser;

    #[tokio::test]
    async fn test_run_headless_scenario() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/earth_moon.json");
        let config = OrreryConfig::try_parse_from([
            "orrery",
            "--scenario",
            path,
            "--start-date",
            "2024-06-01T00:00:00Z",
            "--frames",
            "2",
            "--frame-ms",
            "0",
        ])
        .unwrap();

        let state = run(config).await.unwrap();

        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(state.scenario, "EarthMoon");
        assert!(state.is_playing);
        assert_eq!(state.epoch_offset, 2.0 * 86400.0);
        assert_eq!(state.display_date, start + Duration::days(2));
        assert_eq!(state.bodies.len(), 3);
    }
}
