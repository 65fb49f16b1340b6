use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Overrides `service_url` when set.
pub const SERVICE_URL_ENV: &str = "POSTURE_SERVICE_URL";

#[cfg(target_os = "macos")]
const DEFAULT_CAMERA: &str = "0";
#[cfg(not(target_os = "macos"))]
const DEFAULT_CAMERA: &str = "/dev/video0";

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the analysis service, without the `/upload` path.
    pub service_url: String,
    /// v4l2 device path on Linux, avfoundation index on macOS.
    pub camera_device: String,
    pub ffmpeg_path: String,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: "http://localhost:5000".into(),
            camera_device: DEFAULT_CAMERA.into(),
            ffmpeg_path: "ffmpeg".into(),
            request_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Directory: ~/.config/posture-check/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("posture-check");
        p
    }

    fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from disk, returning defaults if file doesn't exist or is invalid.
    pub fn load() -> Self {
        let mut config = match fs::read_to_string(Self::path()) {
            Ok(data) => Self::parse(&data),
            Err(_) => Self::default(),
        };
        if let Ok(url) = std::env::var(SERVICE_URL_ENV) {
            if !url.trim().is_empty() {
                log::info!("Service URL from {SERVICE_URL_ENV}: {url}");
                config.service_url = url.trim().to_string();
            }
        }
        config
    }

    fn parse(data: &str) -> Self {
        serde_json::from_str(data).unwrap_or_else(|e| {
            log::warn!("Ignoring invalid config: {e}");
            Self::default()
        })
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let dir = Self::dir();
        fs::create_dir_all(&dir)?;
        let data = serde_json::to_string_pretty(self)?;
        fs::write(Self::path(), data)?;
        Ok(())
    }

    pub fn upload_url(&self) -> String {
        format!("{}/upload", self.service_url.trim_end_matches('/'))
    }

    pub fn ping_url(&self) -> String {
        format!("{}/ping", self.service_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = Config::parse(r#"{"service_url":"http://analysis.local:8080/"}"#);
        assert_eq!(config.service_url, "http://analysis.local:8080/");
        assert_eq!(config.ffmpeg_path, "ffmpeg");
        assert_eq!(config.upload_url(), "http://analysis.local:8080/upload");
        assert_eq!(config.ping_url(), "http://analysis.local:8080/ping");
    }

    #[test]
    fn garbage_yields_defaults() {
        assert_eq!(Config::parse("not json"), Config::default());
    }
}
