use crate::infrastructure::bluetooth::protocol::Protocol;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "calima".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Which fan to talk to and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub protocol: Protocol,
    /// Address prefix identifying the fan family during discovery.
    #[serde(default = "default_address_prefix")]
    pub address_prefix: String,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            address: None,
            pin: None,
            protocol: Protocol::default(),
            address_prefix: default_address_prefix(),
        }
    }
}

fn default_address_prefix() -> String {
    "58:2b:db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleSettings {
    #[serde(default = "default_scan_duration_secs")]
    pub scan_duration_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for BleSettings {
    fn default() -> Self {
        Self {
            scan_duration_secs: default_scan_duration_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_scan_duration_secs() -> u64 {
    5
}
fn default_connect_timeout_secs() -> u64 {
    20
}

/// State polling policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Polling stops after this many transport failures in a row.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    2
}
fn default_max_consecutive_failures() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub ble: BleSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub log_settings: LogSettings,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
    /// False when the file exists but could not be read; it is then never overwritten.
    writable: bool,
}

impl SettingsService {
    /// Load settings from the given file, or from the per-user config directory.
    pub fn new(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let settings_path = match path {
            Some(path) => path,
            None => Self::get_settings_path()?,
        };
        let (settings, writable) = match Self::load_from_file(&settings_path) {
            Ok(Some(settings)) => (settings, true),
            Ok(None) => (Settings::default(), true),
            Err(e) => {
                warn!(
                    "Ignoring unreadable settings file {}: {}",
                    settings_path.display(),
                    e
                );
                (Settings::default(), false)
            }
        };

        Ok(Self {
            settings,
            settings_path,
            writable,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("calima");
        path.push("settings.json");
        Ok(path)
    }

    /// `Ok(None)` when the file does not exist yet.
    fn load_from_file(path: &Path) -> anyhow::Result<Option<Settings>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let settings = serde_json::from_str(&contents)?;
        Ok(Some(settings))
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if !self.writable {
            anyhow::bail!(
                "Refusing to overwrite {}: fix or remove the unreadable file first",
                self.settings_path.display()
            );
        }
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Remember the fan that was last used successfully.
    pub fn remember_device(&mut self, address: &str, pin: &str) -> anyhow::Result<()> {
        let device = &mut self.settings.device;
        if device.address.as_deref() != Some(address) || device.pin.as_deref() != Some(pin) {
            device.address = Some(address.to_string());
            device.pin = Some(pin.to_string());
            self.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.device.address_prefix, "58:2b:db");
        assert_eq!(settings.device.protocol, Protocol::Current);
        assert_eq!(settings.monitor.poll_interval_secs, 2);
        assert_eq!(settings.monitor.max_consecutive_failures, 1);
        assert!(!settings.log_settings.file_logging_enabled);
    }

    #[test]
    fn test_partial_document() {
        let json = r#"{
            "device": { "address": "58:2b:db:00:7b:a2", "protocol": "legacy" },
            "monitor": { "poll_interval_secs": 10 }
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.device.address.as_deref(), Some("58:2b:db:00:7b:a2"));
        assert_eq!(settings.device.protocol, Protocol::Legacy);
        assert_eq!(settings.device.pin, None);
        assert_eq!(settings.monitor.poll_interval_secs, 10);
        assert_eq!(settings.monitor.max_consecutive_failures, 1);
        assert_eq!(settings.ble.scan_duration_secs, 5);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("calima-settings-does-not-exist.json");
        let service = SettingsService::new(Some(path.clone())).unwrap();
        assert_eq!(service.path(), path.as_path());
        assert_eq!(service.get().ble.connect_timeout_secs, 20);
        assert_eq!(service.get().device.address_prefix, "58:2b:db");
    }

    #[test]
    fn test_default_settings_keep_address_prefix() {
        let settings = Settings::default();
        assert_eq!(settings.device.address_prefix, "58:2b:db");
        assert_eq!(settings.device.protocol, Protocol::Current);
    }

    #[test]
    fn test_unreadable_file_is_never_overwritten() {
        let dir = std::env::temp_dir().join(format!("calima-settings-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        let broken = r#"{ "monitor": { "poll_interval_secs": 10 }, }"#;
        fs::write(&path, broken).unwrap();

        let mut service = SettingsService::new(Some(path.clone())).unwrap();
        assert_eq!(service.get().monitor.poll_interval_secs, 2);
        assert!(service.remember_device("58:2b:db:00:7b:a2", "1234").is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), broken);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_remember_device_writes_new_file() {
        let dir = std::env::temp_dir().join(format!("calima-remember-{}", std::process::id()));
        let path = dir.join("settings.json");
        let _ = fs::remove_dir_all(&dir);

        let mut service = SettingsService::new(Some(path.clone())).unwrap();
        service.remember_device("58:2b:db:00:7b:a2", "1234").unwrap();

        let reloaded = SettingsService::new(Some(path)).unwrap();
        assert_eq!(
            reloaded.get().device.address.as_deref(),
            Some("58:2b:db:00:7b:a2")
        );
        assert_eq!(reloaded.get().device.address_prefix, "58:2b:db");

        fs::remove_dir_all(&dir).unwrap();
    }
}
