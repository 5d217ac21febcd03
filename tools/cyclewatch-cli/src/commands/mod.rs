pub mod info;
pub mod init;
pub mod measure;
pub mod report;
pub mod validate;

use std::path::Path;

use anyhow::Context;
use cyclewatch_common::config::AppConfig;

/// Load the config from `path`, or from the standard location when absent.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(AppConfig::load()),
    }
}
