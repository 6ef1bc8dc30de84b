//! Manager configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minimum time between two throttled saves.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Configuration for a [`crate::KeyringManager`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerConfig {
    /// Where the keyring document is persisted.
    pub keyring_path: PathBuf,
    /// Server link used for new keyrings and inboxes.
    pub server_link: String,
    /// Throttle for saves triggered by mutations. [`crate::KeyringManager::save`]
    /// ignores it.
    pub save_interval: Duration,
    /// Name of the root keyring; also the name handed to peers in invitations.
    pub owner_name: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            keyring_path: PathBuf::from("keyring.json"),
            server_link: "localhost".to_string(),
            save_interval: DEFAULT_SAVE_INTERVAL,
            owner_name: "root".to_string(),
        }
    }
}

impl ManagerConfig {
    pub fn new(keyring_path: impl AsRef<Path>) -> Self {
        Self {
            keyring_path: keyring_path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_server_link(mut self, server_link: impl Into<String>) -> Self {
        self.server_link = server_link.into();
        self
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    pub fn with_owner_name(mut self, owner_name: impl Into<String>) -> Self {
        self.owner_name = owner_name.into();
        self
    }
}
