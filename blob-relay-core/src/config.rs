use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::naming::{DestinationNaming, DEFAULT_DESTINATION_PREFIX};

pub const DEFAULT_SOURCE_CONTAINER: &str = "unprocessed-pdf";
pub const DEFAULT_DESTINATION_CONTAINER: &str = "processed-pdf";
pub const DEFAULT_CONNECTION_SETTING: &str = "PDFProcessorSTORAGE";

/// Static relay settings. The storage connection value itself is a secret and is
/// read from the environment variable named by `connection_setting`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_source_container")]
    pub source_container: String,
    #[serde(default = "default_destination_container")]
    pub destination_container: String,
    #[serde(default = "default_destination_prefix")]
    pub destination_prefix: String,
    /// Skip the write when the destination already exists.
    #[serde(default = "default_skip_existing")]
    pub skip_existing: bool,
    #[serde(default = "default_connection_setting")]
    pub connection_setting: String,
}

impl RelaySettings {
    pub fn naming(&self) -> DestinationNaming {
        DestinationNaming::new(self.destination_prefix.clone())
    }

    pub fn trace_loaded(&self) {
        info!(
            source_container = %self.source_container,
            destination_container = %self.destination_container,
            destination_prefix = %self.destination_prefix,
            skip_existing = self.skip_existing,
            "Loaded RelaySettings"
        );
        debug!(?self, "RelaySettings loaded (full debug)");
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            source_container: default_source_container(),
            destination_container: default_destination_container(),
            destination_prefix: default_destination_prefix(),
            skip_existing: default_skip_existing(),
            connection_setting: default_connection_setting(),
        }
    }
}

fn default_source_container() -> String {
    DEFAULT_SOURCE_CONTAINER.to_string()
}

fn default_destination_container() -> String {
    DEFAULT_DESTINATION_CONTAINER.to_string()
}

fn default_destination_prefix() -> String {
    DEFAULT_DESTINATION_PREFIX.to_string()
}

fn default_skip_existing() -> bool {
    true
}

fn default_connection_setting() -> String {
    DEFAULT_CONNECTION_SETTING.to_string()
}
