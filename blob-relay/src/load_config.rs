/// `load_config` module: Loads the static YAML relay settings and injects the storage
/// connection value from the environment.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into [`RelaySettings`] (missing keys take defaults)
/// - Read the storage connection value, a secret, from the environment variable named by
///   `connection_setting` (with the `__serviceUri` / `__blobServiceUri` fallbacks)
/// - Resolve it into a [`StorageConnection`]
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use blob_relay_core::config::RelaySettings;
use blob_relay_core::connection::StorageConnection;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Settings plus the resolved storage connection.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub settings: RelaySettings,
    pub connection: StorageConnection,
}

/// Loads the relay settings from a YAML file, or defaults when no file is given.
pub fn load_settings<P: AsRef<Path>>(path: Option<P>) -> Result<RelaySettings> {
    let Some(path) = path else {
        info!("No config file given, using default relay settings");
        return Ok(RelaySettings::default());
    };
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid "all defaults" config.
    if config_content.trim().is_empty() {
        return Ok(RelaySettings::default());
    }

    match serde_yaml::from_str::<RelaySettings>(&config_content) {
        Ok(settings) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(settings)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Loads settings and resolves the storage connection from the process environment.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<RelayConfig> {
    let settings = load_settings(path)?;
    settings.trace_loaded();

    let connection =
        StorageConnection::from_setting(&settings.connection_setting, |key| {
            std::env::var(key).ok()
        })
        .with_context(|| {
            format!(
                "Failed to resolve storage connection from {}",
                settings.connection_setting
            )
        })?;

    info!(
        account = connection.account(),
        emulator = connection.is_emulator(),
        "Config loaded and merged successfully"
    );

    Ok(RelayConfig {
        settings,
        connection,
    })
}
