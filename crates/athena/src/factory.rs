//! Turns a [`BackendConfig`] into a ready-to-use backend handle.

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_types::region::Region;
use tracing::info;

use crate::backend::{AthenaBackend, SdkBackend};
use crate::config::{BackendConfig, MockMode};
use crate::error::QthenaError;
use crate::fixture::{FixtureStore, PlaybackBackend, RecordingBackend};

/// Builds backends for one validated [`BackendConfig`].
#[derive(Debug, Clone)]
pub struct ClientFactory {
    config: BackendConfig,
}

impl ClientFactory {
    /// Returns [`QthenaError::Config`] when service or region is missing,
    /// the service is unsupported, or a mock mode has no data path.
    pub fn new(config: BackendConfig) -> Result<Self, QthenaError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Produce the backend.
    ///
    /// Playback never loads AWS configuration; live and record modes load it
    /// with the configured region and, if given, the named profile.
    pub async fn build(&self) -> Result<Arc<dyn AthenaBackend>, QthenaError> {
        match (self.config.mock_mode, &self.config.mock_data_path) {
            (Some(MockMode::Playback), Some(path)) => {
                let store = FixtureStore::new(path, &self.config.service);
                Ok(Arc::new(PlaybackBackend::new(store)))
            }
            (Some(MockMode::Record), Some(path)) => {
                let live = self.sdk_backend().await;
                let store = FixtureStore::new(path, &self.config.service);
                Ok(Arc::new(RecordingBackend::new(live, store)))
            }
            (Some(mode), None) => Err(QthenaError::config(format!(
                "mock mode {mode} requires a mock data path"
            ))),
            (None, _) => Ok(self.sdk_backend().await),
        }
    }

    async fn sdk_backend(&self) -> Arc<dyn AthenaBackend> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()));
        if let Some(profile) = &self.config.aws_profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        info!(
            service = %self.config.service,
            region = %self.config.region,
            profile = self.config.aws_profile.as_deref().unwrap_or("(default chain)"),
            "AWS client initialised"
        );

        Arc::new(SdkBackend::new(&sdk_config))
    }
}
