//! Application settings and paths.
//!
//! Settings live in `settings.json` under the XDG config directory.

use crate::error::{ConfigError, ConfigResult};
use crate::scanner::ScanConfig;
use crate::session::{ProbeOptions, TlsOptions};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Global paths singleton.
static PATHS: OnceLock<Paths> = OnceLock::new();

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/mailprobe)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Get the global paths instance.
    pub fn get() -> ConfigResult<&'static Paths> {
        if let Some(paths) = PATHS.get() {
            return Ok(paths);
        }
        let project =
            ProjectDirs::from("com", "mailprobe", "mailprobe").ok_or(ConfigError::DirectoryNotFound)?;
        let _ = PATHS.set(Self {
            config_dir: project.config_dir().to_path_buf(),
        });
        PATHS.get().ok_or(ConfigError::DirectoryNotFound)
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Overall deadline for SMTP/IMAP probes, in seconds.
    pub probe_timeout_secs: u64,
    /// Per-port connect timeout for scans, in seconds.
    pub scan_timeout_secs: u64,
    /// Wait for a banner on open ports, in milliseconds. 0 disables banners.
    pub banner_timeout_ms: u64,
    pub scan_concurrency: usize,
    /// Probes started per second, 0 for unlimited.
    pub scan_rate_limit: u32,
    /// Deadline for a whole scan, 0 for none.
    pub scan_deadline_secs: u64,
    pub verify_certificates: bool,
    /// Name announced in EHLO/HELO.
    pub client_identifier: String,
    pub capability_limit: usize,
    pub default_output_format: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 30,
            scan_timeout_secs: 5,
            banner_timeout_ms: 2000,
            scan_concurrency: 50,
            scan_rate_limit: 0,
            scan_deadline_secs: 0,
            verify_certificates: false,
            client_identifier: "mailprobe.localdomain".to_string(),
            capability_limit: 10,
            default_output_format: "plain".to_string(),
        }
    }
}

impl AppSettings {
    /// Load settings from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::get()?.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        let paths = Paths::get()?;
        fs::create_dir_all(&paths.config_dir)?;
        self.save_to(&paths.settings_file())
    }

    /// Save settings to a specific file.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.scan_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "scan_concurrency must be at least 1".to_string(),
            ));
        }
        if self.client_identifier.trim().is_empty()
            || self.client_identifier.contains(char::is_whitespace)
        {
            return Err(ConfigError::InvalidValue(format!(
                "client_identifier '{}' must be a single non-empty word",
                self.client_identifier
            )));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    fn banner_timeout(&self) -> Option<Duration> {
        (self.banner_timeout_ms > 0).then(|| Duration::from_millis(self.banner_timeout_ms))
    }

    /// Options handed to the SMTP and IMAP probes.
    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            tls: TlsOptions {
                verify_certificates: self.verify_certificates,
            },
            client_identifier: self.client_identifier.clone(),
            capability_limit: self.capability_limit,
            banner_timeout: self
                .banner_timeout()
                .unwrap_or(crate::banner::BANNER_TIMEOUT),
        }
    }

    /// Execution knobs for port scans.
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            concurrency: self.scan_concurrency,
            rate_limit: self.scan_rate_limit,
            deadline: (self.scan_deadline_secs > 0)
                .then(|| Duration::from_secs(self.scan_deadline_secs)),
            banner_timeout: self.banner_timeout(),
            show_progress: false,
        }
    }
}
