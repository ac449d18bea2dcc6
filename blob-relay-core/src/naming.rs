use serde::{Deserialize, Serialize};

/// Prefix applied to source names when no other prefix is configured.
pub const DEFAULT_DESTINATION_PREFIX: &str = "processed_";

/// Derives destination blob names from source blob names.
///
/// A deployment uses exactly one prefix; it is never inferred per blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationNaming {
    prefix: String,
}

impl DestinationNaming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn destination_for(&self, source_name: &str) -> String {
        format!("{}{}", self.prefix, source_name)
    }
}

impl Default for DestinationNaming {
    fn default() -> Self {
        Self::new(DEFAULT_DESTINATION_PREFIX)
    }
}
