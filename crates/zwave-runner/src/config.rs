//! Configuration loading with command line overrides.

use crate::error::RunnerResult;
use std::path::Path;
use tracing::debug;
use zwave_controller::ControllerConfig;

/// Values from the command line that replace the configured ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub interview_nodes: Option<bool>,
    pub auto_negotiate_versions: Option<bool>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut ControllerConfig) {
        if let Some(interview) = self.interview_nodes {
            config.interview_nodes = interview;
        }
        if let Some(negotiate) = self.auto_negotiate_versions {
            config.auto_negotiate_versions = negotiate;
        }
    }
}

/// Read the configuration (defaults when `path` is `None`), apply the
/// overrides and validate the result once.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> RunnerResult<ControllerConfig> {
    let mut config = match path {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            ControllerConfig::read_file(path)?
        }
        None => ControllerConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}
