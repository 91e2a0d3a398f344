// Simulation Clock - orchestrates playback of one simulation session
// Uninitialized -> Paused <-> Playing -> Killed

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::body::CelestialBody;
use crate::collaborators::{DateInput, ResourcesReady, Scene};
use crate::epoch;
use crate::error::{OrreryError, Result};
use crate::gravity_ticker::{GravityTicker, SharedRegistry};
use crate::physics_engine::calculate_total_energy;
use crate::registry::BodyRegistry;
use crate::scenario::Scenario;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClockState {
    Uninitialized,
    Paused,
    Playing,
    Killed,
}

pub struct SimulationClock {
    name: String,
    state: ClockState,
    /// Set once the resource loader has reported readiness
    ready: bool,
    start_epoch_time: f64,
    epoch_offset: f64,
    current_time: f64,
    display_date: DateTime<Utc>,
    registry: Option<SharedRegistry>,
    central_body: Option<String>,
    ticker: GravityTicker,
    scene: Option<Box<dyn Scene>>,
    date_input: Option<Box<dyn DateInput>>,
    initial_settings: Value,
    initial_energy: f64,
}

impl SimulationClock {
    pub fn new(scene: Box<dyn Scene>, date_input: Box<dyn DateInput>) -> Self {
        Self::with_ticker(scene, date_input, GravityTicker::new())
    }

    /// Same as [`SimulationClock::new`] with a custom gravity ticker
    /// (e.g. one built around another integrator)
    pub fn with_ticker(
        scene: Box<dyn Scene>,
        date_input: Box<dyn DateInput>,
        ticker: GravityTicker,
    ) -> Self {
        Self {
            name: String::new(),
            state: ClockState::Uninitialized,
            ready: false,
            start_epoch_time: 0.0,
            epoch_offset: 0.0,
            current_time: 0.0,
            display_date: epoch::j2000(),
            registry: None,
            central_body: None,
            ticker,
            scene: Some(scene),
            date_input: Some(date_input),
            initial_settings: Value::Null,
            initial_energy: 0.0,
        }
    }

    /// Build the bodies, place them at the date from the date input (or now)
    /// and leave the clock paused. Ticks stay no-ops until [`Self::await_ready`].
    pub fn start(&mut self, scenario: &Scenario, user_overrides: &Value) -> Result<()> {
        match self.state {
            ClockState::Killed => return Err(OrreryError::SessionKilled),
            ClockState::Uninitialized => {}
            _ => {
                return Err(OrreryError::Configuration(
                    "simulation already started".to_string(),
                ))
            }
        }

        self.ticker
            .configure(scenario.seconds_per_tick, Some(scenario.calculations_per_tick()))?;
        let mut registry = BodyRegistry::build(&scenario.bodies)?;
        registry.resolution_order()?;

        let (scene, date_input) = match (self.scene.as_mut(), self.date_input.as_ref()) {
            (Some(scene), Some(date_input)) => (scene, date_input),
            _ => return Err(OrreryError::SessionKilled),
        };

        let date = date_input.get_date().unwrap_or_else(Utc::now);
        let start_epoch_time = epoch::to_epoch_seconds(&date);
        registry.place(start_epoch_time, scenario.calculate_all())?;

        // nothing below can fail
        let dims = registry.dimensions();
        scene.set_dimension(dims.largest_sma, dims.smallest_sma, dims.largest_radius);
        registry.announce(scene.as_mut());
        scene.set_central_body(registry.central());

        self.start_epoch_time = start_epoch_time;
        self.epoch_offset = 0.0;
        self.current_time = start_epoch_time;
        self.display_date = date;
        self.initial_energy = calculate_total_energy(registry.bodies());
        self.central_body = Some(registry.central().name.clone());
        self.name = scenario.name.clone();
        self.initial_settings = scenario.initial_settings(user_overrides);

        let shared = Arc::new(RwLock::new(registry));
        self.ticker.attach(&shared);
        self.registry = Some(shared);
        self.state = ClockState::Paused;

        info!(
            scenario = %self.name,
            start = %date,
            seconds_per_frame = self.ticker.seconds_per_frame(),
            "simulation started"
        );
        Ok(())
    }

    /// Wait for the resource loader, then show the first frame and enable ticking
    pub async fn await_ready(&mut self, ready: ResourcesReady) -> Result<()> {
        match self.state {
            ClockState::Uninitialized => return Err(OrreryError::NotStarted),
            ClockState::Killed => return Err(OrreryError::SessionKilled),
            _ => {}
        }

        ready.wait().await?;

        self.show_date();
        let camera_settings = self
            .initial_settings
            .get("cameraSettings")
            .cloned()
            .unwrap_or(Value::Null);
        if let Some(scene) = self.scene.as_mut() {
            scene.set_camera_defaults(&camera_settings);
            scene.draw();
        }
        self.ready = true;
        debug!(scenario = %self.name, "resources ready");
        Ok(())
    }

    /// Jump to `date`: pauses, clears the offset and re-places every body
    pub fn reset_to_date(&mut self, date: DateTime<Utc>) -> Result<()> {
        let registry = match (self.state, &self.registry) {
            (ClockState::Killed, _) => return Err(OrreryError::SessionKilled),
            (_, Some(registry)) => registry.clone(),
            (_, None) => return Err(OrreryError::NotStarted),
        };

        let start_epoch_time = epoch::to_epoch_seconds(&date);
        {
            let mut registry = registry.write();
            registry.reposition(start_epoch_time)?;
            self.initial_energy = calculate_total_energy(registry.bodies());
        }

        self.state = ClockState::Paused;
        self.epoch_offset = 0.0;
        self.start_epoch_time = start_epoch_time;
        self.current_time = start_epoch_time;
        self.display_date = epoch::to_date(start_epoch_time);

        if let Some(scene) = self.scene.as_mut() {
            scene.on_date_reset();
        }
        info!(date = %date, "simulation reset");
        Ok(())
    }

    /// The user changed the date input: reset to what it now holds
    pub fn on_date_input_changed(&mut self) -> Result<()> {
        let date = self
            .date_input
            .as_ref()
            .ok_or(OrreryError::SessionKilled)?
            .get_date()
            .unwrap_or_else(Utc::now);
        self.reset_to_date(date)
    }

    pub fn toggle_play(&mut self) {
        self.state = match self.state {
            ClockState::Playing => ClockState::Paused,
            ClockState::Paused => ClockState::Playing,
            other => other,
        };
    }

    pub fn set_playing(&mut self, playing: bool) {
        if self.is_playing() != playing {
            self.toggle_play();
        }
    }

    /// Per-frame entry point. Errors are fatal to the session.
    pub fn tick(&mut self) -> Result<()> {
        if !self.ready || !matches!(self.state, ClockState::Paused | ClockState::Playing) {
            return Ok(());
        }

        if self.state == ClockState::Playing {
            let delta = self.ticker.tick().map_err(|err| {
                warn!(error = %err, "gravity tick failed");
                err
            })?;
            self.epoch_offset += delta;
            self.current_time = self.start_epoch_time + self.epoch_offset;
            self.show_date();
            if let Some(scene) = self.scene.as_mut() {
                scene.update_camera();
                scene.draw();
            }
        } else if let Some(scene) = self.scene.as_mut() {
            scene.update_camera();
        }
        Ok(())
    }

    /// Pause and redraw once without advancing time
    pub fn stop(&mut self) {
        if !matches!(self.state, ClockState::Paused | ClockState::Playing) {
            return;
        }
        self.state = ClockState::Paused;
        if let Some(scene) = self.scene.as_mut() {
            scene.update_camera();
            scene.draw();
        }
    }

    /// Tear the session down. Safe to call more than once.
    pub fn kill(&mut self) {
        if self.state == ClockState::Killed {
            return;
        }
        self.state = ClockState::Killed;
        self.ready = false;
        self.ticker.detach();

        if let Some(mut date_input) = self.date_input.take() {
            date_input.set_date(None);
        }
        if let Some(mut scene) = self.scene.take() {
            scene.kill();
        }
        self.registry = None;
        self.central_body = None;
        info!(scenario = %self.name, "simulation killed");
    }

    fn show_date(&mut self) {
        self.display_date = epoch::to_date(self.current_time);
        if let Some(date_input) = self.date_input.as_mut() {
            date_input.set_date(Some(self.display_date));
        }
    }

    // -------------------------------------------------------------------------
    // observers
    // -------------------------------------------------------------------------

    pub fn is_playing(&self) -> bool {
        self.state == ClockState::Playing
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_epoch_time(&self) -> f64 {
        self.start_epoch_time
    }

    pub fn epoch_offset(&self) -> f64 {
        self.epoch_offset
    }

    /// Current simulated instant, seconds since J2000
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn display_date(&self) -> DateTime<Utc> {
        self.display_date
    }

    pub fn initial_settings(&self) -> &Value {
        &self.initial_settings
    }

    pub fn seconds_per_frame(&self) -> f64 {
        self.ticker.seconds_per_frame()
    }

    pub fn central_body_name(&self) -> Option<&str> {
        self.central_body.as_deref()
    }

    /// Snapshot of a body; `"central"` or `""` gives the central body
    pub fn get_body(&self, name: &str) -> Option<CelestialBody> {
        self.with_registry(|registry| registry.get(name).cloned())
            .flatten()
    }

    pub fn with_registry<R>(&self, f: impl FnOnce(&BodyRegistry) -> R) -> Option<R> {
        self.registry.as_ref().map(|registry| f(&registry.read()))
    }

    /// Relative drift of total energy since start or the last reset
    pub fn energy_drift(&self) -> f64 {
        let total = self
            .with_registry(|registry| calculate_total_energy(registry.bodies()))
            .unwrap_or(self.initial_energy);
        if self.initial_energy.abs() > 1e-20 {
            (total - self.initial_energy).abs() / self.initial_energy.abs()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::NOMINAL_MASS;
    use crate::collaborators::resource_channel;
    use crate::collaborators::testing::{RecordingDateInput, RecordingScene, SceneEvent};
    use crate::scenario::{BodyConfig, OrbitConfig, OrbitValues};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn earth_moon() -> Scenario {
        let mut scenario = Scenario::new("EarthMoon", 3600.0)
            .with_body("Sun", BodyConfig::new(1.9891e30).radius(695_000.0))
            .with_body(
                "Earth",
                BodyConfig::new(5.9736e24).radius(6371.0).orbit(OrbitConfig::new(OrbitValues {
                    a: 149_598_261.0,
                    e: 0.0167,
                    l: 100.46,
                    lp: 102.94,
                    ..Default::default()
                })),
            )
            .with_body(
                "Moon",
                BodyConfig::new(7.3477e22)
                    .radius(1738.1)
                    .relative_to("Earth")
                    .orbit(OrbitConfig::new(OrbitValues {
                        a: 384_400.0,
                        e: 0.0554,
                        i: 5.16,
                        o: 125.08,
                        ..Default::default()
                    })),
            );
        scenario.calculations_per_tick = Some(24);
        scenario.default_gui_settings = json!({ "cameraSettings": { "fov": 45 } });
        scenario
    }

    fn start_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn clock() -> (SimulationClock, RecordingScene, RecordingDateInput) {
        let scene = RecordingScene::default();
        let date_input = scene.date_input(Some(start_date()));
        let clock = SimulationClock::new(Box::new(scene.clone()), Box::new(date_input.clone()));
        (clock, scene, date_input)
    }

    async fn started() -> (SimulationClock, RecordingScene, RecordingDateInput) {
        let (mut clock, scene, date_input) = clock();
        clock.start(&earth_moon(), &Value::Null).unwrap();
        clock.await_ready(ResourcesReady::immediate()).await.unwrap();
        scene.take();
        (clock, scene, date_input)
    }

    #[test]
    fn test_start_pauses_at_input_date() {
        let (mut clock, scene, _) = clock();
        assert_eq!(clock.state(), ClockState::Uninitialized);
        clock.start(&earth_moon(), &Value::Null).unwrap();

        assert_eq!(clock.state(), ClockState::Paused);
        assert!(!clock.is_playing());
        assert_eq!(clock.epoch_offset(), 0.0);
        assert_eq!(clock.start_epoch_time(), epoch::to_epoch_seconds(&start_date()));
        assert_eq!(clock.current_time(), clock.start_epoch_time());
        assert_eq!(clock.central_body_name(), Some("Sun"));

        let events = scene.take();
        assert!(matches!(events[0], SceneEvent::Dimension(..)));
        assert_eq!(events.last(), Some(&SceneEvent::CentralBody("Sun".to_string())));
        assert!(!events.contains(&SceneEvent::Draw));
    }

    #[test]
    fn test_start_without_input_date_uses_now() {
        let scene = RecordingScene::default();
        let date_input = scene.date_input(None);
        let mut clock = SimulationClock::new(Box::new(scene), Box::new(date_input));
        let before = Utc::now();
        clock.start(&earth_moon(), &Value::Null).unwrap();
        let started_at = epoch::to_date(clock.start_epoch_time());
        assert!(started_at >= before - Duration::milliseconds(1));
        assert!(started_at <= Utc::now() + Duration::milliseconds(1));
    }

    #[test]
    fn test_start_surfaces_configuration_errors() {
        let (mut clock, scene, _) = clock();
        let empty = Scenario::new("empty", 60.0);
        assert!(matches!(
            clock.start(&empty, &Value::Null),
            Err(OrreryError::Configuration(_))
        ));

        let mut bad_rate = earth_moon();
        bad_rate.seconds_per_tick = 0.0;
        assert!(matches!(
            clock.start(&bad_rate, &Value::Null),
            Err(OrreryError::InvalidStepper(_))
        ));

        let cyclic = Scenario::new("cyclic", 60.0)
            .with_body("Sun", BodyConfig::new(1e30))
            .with_body("A", BodyConfig::new(1.0).relative_to("B"))
            .with_body("B", BodyConfig::new(1.0).relative_to("A"));
        assert!(matches!(
            clock.start(&cyclic, &Value::Null),
            Err(OrreryError::CyclicDependency(_))
        ));

        assert_eq!(clock.state(), ClockState::Uninitialized);
        assert!(scene.take().is_empty());
    }

    #[test]
    fn test_ticks_wait_for_resources() {
        let (mut clock, scene, _) = clock();
        clock.start(&earth_moon(), &Value::Null).unwrap();
        clock.toggle_play();
        scene.take();

        clock.tick().unwrap();
        assert_eq!(clock.epoch_offset(), 0.0);
        assert!(scene.take().is_empty());
    }

    #[tokio::test]
    async fn test_ready_draws_first_frame() {
        let (mut clock, scene, date_input) = clock();
        clock.start(&earth_moon(), &json!({ "planetScale": 3 })).unwrap();
        scene.take();

        let (loader, ready) = resource_channel();
        loader.ready();
        clock.await_ready(ready).await.unwrap();

        assert!(clock.is_ready());
        assert_eq!(clock.initial_settings()["planetScale"], json!(3));
        assert_eq!(
            scene.take(),
            vec![
                SceneEvent::DateSet(Some(start_date())),
                SceneEvent::CameraDefaults(json!({ "fov": 45 })),
                SceneEvent::Draw,
            ]
        );
        assert_eq!(date_input.current(), Some(start_date()));
    }

    #[tokio::test]
    async fn test_await_ready_before_start_fails() {
        let (mut clock, _, _) = clock();
        assert!(matches!(
            clock.await_ready(ResourcesReady::immediate()).await,
            Err(OrreryError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_playing_tick_advances_one_day() {
        let (mut clock, scene, date_input) = started().await;
        clock.toggle_play();
        assert!(clock.is_playing());

        clock.tick().unwrap();

        let next_day = start_date() + Duration::days(1);
        assert_eq!(clock.epoch_offset(), 86400.0);
        assert_eq!(clock.current_time(), clock.start_epoch_time() + 86400.0);
        assert_eq!(clock.display_date(), next_day);
        assert_eq!(date_input.current(), Some(next_day));
        // step, then date, then redraw
        assert_eq!(
            scene.take(),
            vec![
                SceneEvent::DateSet(Some(next_day)),
                SceneEvent::UpdateCamera,
                SceneEvent::Draw,
            ]
        );
    }

    #[tokio::test]
    async fn test_offset_grows_by_exactly_one_frame() {
        let (mut clock, _, _) = started().await;
        clock.toggle_play();
        let mut previous = clock.epoch_offset();
        for _ in 0..5 {
            clock.tick().unwrap();
            assert_eq!(clock.epoch_offset() - previous, clock.seconds_per_frame());
            previous = clock.epoch_offset();
        }
        assert_eq!(clock.epoch_offset(), 5.0 * 86400.0);
    }

    #[tokio::test]
    async fn test_paused_tick_only_moves_camera() {
        let (mut clock, scene, _) = started().await;
        let date = clock.display_date();

        for _ in 0..3 {
            clock.tick().unwrap();
        }

        assert_eq!(clock.epoch_offset(), 0.0);
        assert_eq!(clock.display_date(), date);
        assert_eq!(scene.take(), vec![SceneEvent::UpdateCamera; 3]);
    }

    #[tokio::test]
    async fn test_bodies_move_while_playing() {
        let (mut clock, _, _) = started().await;
        let before = clock.get_body("Earth").unwrap().state.position;
        clock.toggle_play();
        clock.tick().unwrap();
        let after = clock.get_body("Earth").unwrap().state.position;
        assert!(after.sub(&before).magnitude() > 1e9);
        assert!(clock.energy_drift() < 1e-3);
    }

    #[tokio::test]
    async fn test_reset_to_date() {
        let (mut clock, scene, _) = started().await;
        clock.toggle_play();
        clock.tick().unwrap();
        clock.tick().unwrap();
        scene.take();

        let target = Utc.with_ymd_and_hms(1969, 7, 20, 20, 17, 40).unwrap();
        clock.reset_to_date(target).unwrap();

        assert_eq!(clock.state(), ClockState::Paused);
        assert_eq!(clock.epoch_offset(), 0.0);
        assert_eq!(clock.current_time(), epoch::to_epoch_seconds(&target));
        assert_eq!(clock.display_date(), target);
        assert_eq!(scene.take(), vec![SceneEvent::DateReset]);

        let mut expected = BodyRegistry::build(&earth_moon().bodies).unwrap();
        expected
            .initialize(clock.current_time(), false, &mut RecordingScene::default())
            .unwrap();
        let moon = clock.get_body("Moon").unwrap();
        assert_eq!(moon.state, expected.get("Moon").unwrap().state);
    }

    /// Eccentricity drifts past 1 after eight centuries
    fn eccentric() -> Scenario {
        let mut scenario = Scenario::new("Eccentric", 3600.0)
            .with_body("Sun", BodyConfig::new(1.9891e30))
            .with_body(
                "Rock",
                BodyConfig::new(1e12).orbit(
                    OrbitConfig::new(OrbitValues {
                        a: 150_000_000.0,
                        e: 0.5,
                        l: 40.0,
                        ..Default::default()
                    })
                    .with_rates(OrbitValues {
                        e: 0.1,
                        ..Default::default()
                    }),
                ),
            );
        scenario.calculations_per_tick = Some(24);
        scenario
    }

    fn far_future() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2800, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_failed_start_touches_nothing() {
        let scene = RecordingScene::default();
        let date_input = scene.date_input(Some(far_future()));
        let mut clock = SimulationClock::new(Box::new(scene.clone()), Box::new(date_input));

        assert!(matches!(
            clock.start(&eccentric(), &Value::Null),
            Err(OrreryError::Configuration(_))
        ));
        assert_eq!(clock.state(), ClockState::Uninitialized);
        assert_eq!(clock.start_epoch_time(), 0.0);
        assert_eq!(clock.current_time(), 0.0);
        assert_eq!(clock.central_body_name(), None);
        assert!(scene.take().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reset_keeps_clock_and_bodies() {
        let (mut clock, scene, date_input) = clock();
        clock.start(&eccentric(), &Value::Null).unwrap();
        clock.await_ready(ResourcesReady::immediate()).await.unwrap();
        clock.toggle_play();
        clock.tick().unwrap();
        scene.take();

        let start = clock.start_epoch_time();
        let now = clock.current_time();
        let shown = clock.display_date();
        let rock = clock.get_body("Rock").unwrap().state;

        assert!(matches!(
            clock.reset_to_date(far_future()),
            Err(OrreryError::Configuration(_))
        ));

        assert_eq!(clock.state(), ClockState::Playing);
        assert_eq!(clock.epoch_offset(), 86400.0);
        assert_eq!(clock.start_epoch_time(), start);
        assert_eq!(clock.current_time(), now);
        assert_eq!(clock.display_date(), shown);
        assert_eq!(date_input.current(), Some(shown));
        assert_eq!(clock.get_body("Rock").unwrap().state, rock);
        assert!(scene.take().is_empty());
    }

    #[tokio::test]
    async fn test_date_input_change_resets() {
        let (mut clock, scene, date_input) = started().await;
        let typed = Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap();
        date_input.type_date(typed);

        clock.on_date_input_changed().unwrap();
        assert_eq!(clock.current_time(), epoch::to_epoch_seconds(&typed));
        assert_eq!(scene.take(), vec![SceneEvent::DateReset]);
    }

    #[tokio::test]
    async fn test_stop_redraws_without_advancing() {
        let (mut clock, scene, _) = started().await;
        clock.toggle_play();
        clock.stop();

        assert!(!clock.is_playing());
        assert_eq!(clock.epoch_offset(), 0.0);
        assert_eq!(scene.take(), vec![SceneEvent::UpdateCamera, SceneEvent::Draw]);
    }

    #[tokio::test]
    async fn test_toggle_play_flips_only_playback() {
        let (mut clock, _, _) = started().await;
        let instant = clock.current_time();
        clock.toggle_play();
        assert_eq!(clock.state(), ClockState::Playing);
        clock.toggle_play();
        assert_eq!(clock.state(), ClockState::Paused);
        assert_eq!(clock.current_time(), instant);

        clock.set_playing(true);
        clock.set_playing(true);
        assert!(clock.is_playing());
    }

    #[tokio::test]
    async fn test_kill_makes_tick_a_no_op() {
        let (mut clock, scene, date_input) = started().await;
        clock.toggle_play();
        clock.tick().unwrap();
        scene.take();

        clock.kill();
        assert_eq!(scene.take(), vec![SceneEvent::DateSet(None), SceneEvent::Kill]);
        assert_eq!(date_input.current(), None);
        assert!(clock.get_body("central").is_none());
        assert_eq!(clock.central_body_name(), None);

        let offset = clock.epoch_offset();
        let date = clock.display_date();
        clock.tick().unwrap();
        clock.toggle_play();
        clock.stop();
        clock.kill();

        assert_eq!(clock.state(), ClockState::Killed);
        assert_eq!(clock.epoch_offset(), offset);
        assert_eq!(clock.display_date(), date);
        assert!(scene.take().is_empty());
        assert!(matches!(
            clock.reset_to_date(start_date()),
            Err(OrreryError::SessionKilled)
        ));
    }

    #[tokio::test]
    async fn test_non_central_masses_are_nominal() {
        let (clock, _, _) = started().await;
        assert_eq!(clock.get_body("Earth").unwrap().mass, NOMINAL_MASS);
        assert_eq!(clock.get_body("Moon").unwrap().mass, NOMINAL_MASS);
        assert_eq!(clock.get_body("central").unwrap().mass, 1.9891e30);
    }
}
