// Collaborators - narrow contracts with the presentation layer
// Rendering, date input and asset loading live outside the kernel

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::body::CelestialBody;
use crate::error::{OrreryError, Result};

/// Rendering side of the session (3D scene, camera, labels)
pub trait Scene: Send + Sync {
    /// Extents of the system in meters, sent once before bodies are added
    fn set_dimension(&mut self, _largest_sma: f64, _smallest_sma: f64, _largest_radius: f64) {}

    fn set_central_body(&mut self, _body: &CelestialBody) {}

    fn add_body(&mut self, body: &CelestialBody);

    /// Fired once per body after every body has its final initial position
    fn after_initialized(&mut self, _body: &CelestialBody) {}

    fn set_camera_defaults(&mut self, _settings: &Value) {}

    fn on_date_reset(&mut self);

    fn update_camera(&mut self);

    fn draw(&mut self);

    fn kill(&mut self) {}
}

/// Date picker the user can type a date into
pub trait DateInput: Send + Sync {
    fn get_date(&self) -> Option<DateTime<Utc>>;

    fn set_date(&mut self, date: Option<DateTime<Utc>>);
}

// =============================================================================
// RESOURCE READINESS
// =============================================================================

/// Held by the asset loader; consumed when every resource is loaded
#[derive(Debug)]
pub struct ResourceLoader(oneshot::Sender<()>);

impl ResourceLoader {
    pub fn ready(self) {
        // a receiver that is gone means the session was torn down already
        let _ = self.0.send(());
    }
}

/// One-shot "resources ready" signal awaited before the first tick
#[derive(Debug)]
pub struct ResourcesReady(oneshot::Receiver<()>);

impl ResourcesReady {
    /// A signal that is already resolved, for hosts with nothing to load
    pub fn immediate() -> Self {
        let (loader, ready) = resource_channel();
        loader.ready();
        ready
    }

    pub async fn wait(self) -> Result<()> {
        self.0.await.map_err(|_| OrreryError::ResourcesUnavailable)
    }
}

pub fn resource_channel() -> (ResourceLoader, ResourcesReady) {
    let (tx, rx) = oneshot::channel();
    (ResourceLoader(tx), ResourcesReady(rx))
}

// =============================================================================
// TEST DOUBLES
// =============================================================================


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_signal_resolves() {
        let (loader, ready) = resource_channel();
        let waiter = tokio::spawn(ready.wait());
        loader.ready();
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_dropped_loader_is_an_error() {
        let (loader, ready) = resource_channel();
        drop(loader);
        assert!(matches!(
            ready.wait().await,
            Err(OrreryError::ResourcesUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_immediate_signal() {
        assert!(ResourcesReady::immediate().wait().await.is_ok());
    }
}
