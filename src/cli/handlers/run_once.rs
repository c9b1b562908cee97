//! Run-once command handler
//!
//! Executes one dispatch pass against the configured infrastructure and
//! prints its summary as JSON.

use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::server::Server;

pub struct RunOnceCommandHandler {
    config: Settings,
}

impl RunOnceCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(&self) -> AppResult<()> {
        let summary = Server::new(self.config.clone()).run_once().await?;

        let rendered = serde_json::to_string_pretty(&summary).map_err(|e| AppError::Internal {
            source: anyhow::Error::from(e),
        })?;
        println!("{rendered}");

        Ok(())
    }
}
