use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Error;
use async_trait::async_trait;
use thiserror::Error as ThisError;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{SettingKey, Settings, SettingsOverride, SettingsStore};
use crate::tasks::Run;

#[derive(Debug, ThisError)]
pub enum LoadError {
    #[error("unable to read settings file: {0}")]
    Read(#[from] std::io::Error),
    #[error("unable to parse settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Periodically re-reads a JSON settings file and pushes it into the store.
/// Values from the file are applied on top of the base settings (CLI).
pub struct SettingsFile {
    path: PathBuf,
    base: Settings,
    poll_interval: Duration,
    store: Arc<SettingsStore>,
}

impl SettingsFile {
    pub const fn new(
        path: PathBuf,
        base: Settings,
        poll_interval: Duration,
        store: Arc<SettingsStore>,
    ) -> Self {
        Self {
            path,
            base,
            poll_interval,
            store,
        }
    }

    /// Reads the file and installs the resulting settings, returns the changed keys
    pub async fn load(&self) -> Result<Vec<SettingKey>, LoadError> {
        let data = tokio::fs::read(&self.path).await?;
        let ovr: SettingsOverride = serde_json::from_slice(&data)?;

        Ok(self.store.replace(ovr.apply(&self.base)))
    }
}

#[async_trait]
impl Run for SettingsFile {
    async fn run(&self, token: CancellationToken) -> Result<(), Error> {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            select! {
                () = token.cancelled() => return Ok(()),

                _ = interval.tick() => {
                    // Keep the previous settings if the file is broken
                    if let Err(e) = self.load().await {
                        warn!("Settings: unable to load {}: {e:#}", self.path.display());
                    }
                }
            }
        }
    }
}
