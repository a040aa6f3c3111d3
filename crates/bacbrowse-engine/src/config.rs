//! Client configuration and its persistence.

use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bacbrowse_datalink::DataLinkAddress;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs;

use crate::PersistenceError;

pub const DEFAULT_TIMEOUT_MILLIS: u64 = 4000;

/// Selects the interface and UDP port the client binds to and the
/// per-request timeout. Serialized with the keys of the settings file:
/// `port`, `nic` and `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub port: u16,
    #[serde(rename = "nic")]
    pub interface_index: usize,
    #[serde(rename = "timeout")]
    pub timeout_millis: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DataLinkAddress::BACNET_IP_DEFAULT_PORT,
            interface_index: 0,
            timeout_millis: DEFAULT_TIMEOUT_MILLIS,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }

    /// Fields present in `patch` replace the current value. Port 0 and
    /// timeout 0 mean "unchanged"; interface 0 selects the default entry.
    pub fn merged(&self, patch: &ConfigPatch) -> Self {
        Self {
            port: patch.port.filter(|&p| p != 0).unwrap_or(self.port),
            interface_index: patch.interface_index.unwrap_or(self.interface_index),
            timeout_millis: patch
                .timeout_millis
                .filter(|&t| t != 0)
                .unwrap_or(self.timeout_millis),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(rename = "nic", skip_serializing_if = "Option::is_none")]
    pub interface_index: Option<usize>,
    #[serde(rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_millis: Option<u64>,
}

impl ConfigPatch {
    pub fn port(port: u16) -> Self {
        Self {
            port: Some(port),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Where the engine keeps its [`ClientConfig`] between runs.
pub trait SettingsStore: Send + Sync {
    /// The stored configuration, or `None` when nothing has been saved yet.
    fn load(&self) -> impl Future<Output = Result<Option<ClientConfig>, PersistenceError>> + Send;

    fn save(&self, config: &ClientConfig)
        -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

/// Pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn existing_settings(&self) -> Result<Map<String, Value>, PersistenceError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&content) {
            Ok(Value::Object(settings)) => Ok(settings),
            _ => {
                log::warn!("replacing unreadable settings file {}", self.path.display());
                Ok(Map::new())
            }
        }
    }
}

impl SettingsStore for JsonFileStore {
    async fn load(&self) -> Result<Option<ClientConfig>, PersistenceError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Rewrites the client keys and keeps every other key already in the
    /// file (UI settings such as `language`).
    async fn save(&self, config: &ClientConfig) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut settings = self.existing_settings().await?;
        if let Value::Object(fields) = serde_json::to_value(config)? {
            settings.extend(fields);
        }
        let content = serde_json::to_string_pretty(&settings)?;
        fs::write(&self.path, content).await?;
        log::debug!("saved settings to {}", self.path.display());
        Ok(())
    }
}

/// In-process store, mainly for tests and embedding. Can be told to reject
/// writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    config: Mutex<Option<ClientConfig>>,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config: Mutex::new(Some(config)),
            reject_writes: AtomicBool::new(false),
        }
    }

    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::Relaxed);
    }

    pub fn stored(&self) -> Option<ClientConfig> {
        *self.config.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SettingsStore for MemoryStore {
    async fn load(&self) -> Result<Option<ClientConfig>, PersistenceError> {
        Ok(self.stored())
    }

    async fn save(&self, config: &ClientConfig) -> Result<(), PersistenceError> {
        if self.reject_writes.load(Ordering::Relaxed) {
            return Err(PersistenceError::Rejected("memory store is read-only".into()));
        }
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = Some(*config);
        Ok(())
    }
}
