// Configuration - command line and environment for the headless host
// `.env` is loaded first so its values act as environment defaults

use chrono::{DateTime, Utc};
use clap::Parser;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "orrery")]
#[command(about = "Run a solar system scenario headless and print the final state")]
pub struct OrreryConfig {
    /// Scenario descriptor (JSON)
    #[arg(long, env = "ORRERY_SCENARIO")]
    pub scenario: PathBuf,

    /// Start date (RFC 3339); defaults to now
    #[arg(long, env = "ORRERY_START_DATE")]
    pub start_date: Option<DateTime<Utc>>,

    /// Number of frames to run
    #[arg(long, env = "ORRERY_FRAMES", default_value_t = 600)]
    pub frames: u64,

    /// Frame period in milliseconds
    #[arg(long, env = "ORRERY_FRAME_MS", default_value_t = 16)]
    pub frame_ms: u64,

    /// Start paused instead of playing
    #[arg(long)]
    pub paused: bool,

    /// GUI setting override, `key=value`; value is parsed as JSON when possible
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,
}

impl OrreryConfig {
    /// Parse the process arguments after loading `.env`
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::parse()
    }

    pub fn frame_time(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    /// User layer of the GUI settings overlay
    pub fn user_overrides(&self) -> Value {
        let mut overrides = Map::new();
        for setting in &self.settings {
            let (key, raw) = setting.split_once('=').unwrap_or((setting.as_str(), "true"));
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            overrides.insert(key.trim().to_string(), value);
        }
        Value::Object(overrides)
    }
}
