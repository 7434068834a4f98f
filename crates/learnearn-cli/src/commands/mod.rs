pub mod init;
pub mod play;
pub mod topics;
pub mod validate;

use std::path::PathBuf;

use anyhow::Result;

use learnearn_providers::config::load_config_from;
use learnearn_providers::{create_backend, Backend, LearnEarnConfig, SourceConfig};

/// Load the config and build its backend, with `--catalog` taking
/// precedence over the configured source.
pub(crate) fn load_backend(
    catalog: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<(LearnEarnConfig, Backend)> {
    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(path) = catalog {
        config.source = SourceConfig::File { path };
    }
    tracing::debug!(source = ?config.source, "using question source");

    let backend = create_backend(&config.source)?;
    Ok((config, backend))
}
