// Headless - scene and date input for running without a presentation layer
// Both only log what a renderer or date field would show

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::body::CelestialBody;
use crate::collaborators::{DateInput, Scene};

#[derive(Debug, Default)]
pub struct HeadlessScene {
    pub frames_drawn: u64,
}

impl Scene for HeadlessScene {
    fn set_dimension(&mut self, largest_sma: f64, smallest_sma: f64, largest_radius: f64) {
        debug!(largest_sma, smallest_sma, largest_radius, "scene dimensions");
    }

    fn set_central_body(&mut self, body: &CelestialBody) {
        debug!(central = %body.name, "central body");
    }

    fn add_body(&mut self, body: &CelestialBody) {
        debug!(
            body = %body.name,
            x = body.state.position.x,
            y = body.state.position.y,
            z = body.state.position.z,
            "body added"
        );
    }

    fn set_camera_defaults(&mut self, settings: &Value) {
        debug!(%settings, "camera defaults");
    }

    fn on_date_reset(&mut self) {
        info!("date reset");
    }

    fn update_camera(&mut self) {}

    fn draw(&mut self) {
        self.frames_drawn += 1;
        trace!(frame = self.frames_drawn, "draw");
    }

    fn kill(&mut self) {
        debug!(frames = self.frames_drawn, "scene killed");
    }
}

#[derive(Debug, Default)]
pub struct HeadlessDateInput {
    date: Option<DateTime<Utc>>,
}

impl HeadlessDateInput {
    pub fn new(date: Option<DateTime<Utc>>) -> Self {
        Self { date }
    }
}

impl DateInput for HeadlessDateInput {
    fn get_date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    fn set_date(&mut self, date: Option<DateTime<Utc>>) {
        if let Some(date) = date {
            trace!(%date, "date shown");
        }
        self.date = date;
    }
}
