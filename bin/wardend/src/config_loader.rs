use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use warden_common::logging::LoggingConfig;
use warden_reconciler::DesiredConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub logging: LoggingConfig,
    pub node: DesiredConfig,
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<WardenConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(config::Environment::with_prefix("WARDEN").separator("__"))
        .build()
        .context("failed to read configuration")?;
    settings.try_deserialize().context("invalid configuration")
}
