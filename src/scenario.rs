// Scenario - static, host-supplied description of a simulated system
// Loaded from JSON; body declaration order is kept and defines registry order

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::physics_engine::{OrbitalElements, KM, SECONDS_PER_CENTURY};

/// Sub-steps per tick when a scenario does not say
pub const DEFAULT_CALCULATIONS_PER_TICK: u32 = 10;

// =============================================================================
// ORBITS
// =============================================================================

/// Classical element set: distances in km, angles in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitValues {
    /// Semi-major axis
    pub a: f64,
    /// Eccentricity
    pub e: f64,
    /// Inclination
    pub i: f64,
    /// Mean longitude
    pub l: f64,
    /// Longitude of perihelion
    pub lp: f64,
    /// Longitude of ascending node
    pub o: f64,
}

/// Elements at J2000 plus optional linear rates per Julian century
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrbitConfig {
    pub base: OrbitValues,
    #[serde(default)]
    pub cy: Option<OrbitValues>,
}

impl OrbitConfig {
    pub fn new(base: OrbitValues) -> Self {
        Self { base, cy: None }
    }

    pub fn with_rates(mut self, cy: OrbitValues) -> Self {
        self.cy = Some(cy);
        self
    }

    /// Osculating elements at `epoch_seconds` after J2000
    pub fn elements_at(&self, epoch_seconds: f64) -> OrbitalElements {
        let t = epoch_seconds / SECONDS_PER_CENTURY;
        let rates = self.cy.unwrap_or_default();
        let at = |base: f64, rate: f64| base + rate * t;

        let a = at(self.base.a, rates.a);
        let e = at(self.base.e, rates.e);
        let i = at(self.base.i, rates.i);
        let l = at(self.base.l, rates.l);
        let lp = at(self.base.lp, rates.lp);
        let o = at(self.base.o, rates.o);

        OrbitalElements {
            semi_major_axis: a * KM,
            eccentricity: e,
            inclination: i.to_radians(),
            longitude_ascending_node: o.to_radians(),
            argument_perihelion: (lp - o).to_radians(),
            mean_anomaly: (l - lp).to_radians(),
        }
    }
}

// =============================================================================
// BODIES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyConfig {
    /// kg
    pub mass: f64,
    /// km
    #[serde(default)]
    pub radius: f64,
    #[serde(default)]
    pub orbit: Option<OrbitConfig>,
    #[serde(default)]
    pub relative_to: Option<String>,
    /// Presentation-only fields (colors, textures, labels) carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BodyConfig {
    pub fn new(mass: f64) -> Self {
        Self {
            mass,
            radius: 0.0,
            orbit: None,
            relative_to: None,
            extra: Map::new(),
        }
    }

    pub fn radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn orbit(mut self, orbit: OrbitConfig) -> Self {
        self.orbit = Some(orbit);
        self
    }

    pub fn relative_to(mut self, name: &str) -> Self {
        self.relative_to = Some(name.to_string());
        self
    }
}

// =============================================================================
// SCENARIO
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    #[serde(deserialize_with = "ordered_bodies")]
    pub bodies: Vec<(String, BodyConfig)>,
    pub seconds_per_tick: f64,
    #[serde(default)]
    pub calculations_per_tick: Option<u32>,
    #[serde(default)]
    pub calculate_all: Option<bool>,
    #[serde(default)]
    pub default_gui_settings: Value,
    #[serde(default)]
    pub forced_gui_settings: Value,
}

impl Scenario {
    pub fn new(name: &str, seconds_per_tick: f64) -> Self {
        Self {
            name: name.to_string(),
            bodies: Vec::new(),
            seconds_per_tick,
            calculations_per_tick: None,
            calculate_all: None,
            default_gui_settings: Value::Null,
            forced_gui_settings: Value::Null,
        }
    }

    pub fn with_body(mut self, name: &str, config: BodyConfig) -> Self {
        self.bodies.push((name.to_string(), config));
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn calculations_per_tick(&self) -> u32 {
        self.calculations_per_tick
            .unwrap_or(DEFAULT_CALCULATIONS_PER_TICK)
    }

    /// Non-central bodies keep their configured mass only when this is set
    pub fn calculate_all(&self) -> bool {
        self.calculate_all.unwrap_or(false)
    }

    /// Settings the presentation layer starts with
    pub fn initial_settings(&self, user_overrides: &Value) -> Value {
        merge_gui_settings(
            &self.default_gui_settings,
            user_overrides,
            &self.forced_gui_settings,
        )
    }
}

fn ordered_bodies<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, BodyConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct BodiesVisitor;

    impl<'de> Visitor<'de> for BodiesVisitor {
        type Value = Vec<(String, BodyConfig)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of body name to body configuration")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut bodies: Vec<(String, BodyConfig)> =
                Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, config)) = map.next_entry::<String, BodyConfig>()? {
                if bodies.iter().any(|(existing, _)| *existing == name) {
                    return Err(de::Error::custom(format!("duplicate body `{}`", name)));
                }
                bodies.push((name, config));
            }
            Ok(bodies)
        }
    }

    deserializer.deserialize_map(BodiesVisitor)
}

/// Shallow key merge: defaults < user overrides < forced settings.
/// Layers that are not JSON objects contribute nothing.
pub fn merge_gui_settings(defaults: &Value, user: &Value, forced: &Value) -> Value {
    let mut merged = Map::new();
    for layer in [defaults, user, forced] {
        if let Value::Object(entries) = layer {
            for (key, value) in entries {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(merged)
}
