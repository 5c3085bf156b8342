use crate::events::DEFAULT_OUTBOUND_BUFFER;
use crate::logging::LogFormat;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "TICTAC_CONFIG";

/// Runtime settings of the game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: IpAddr,
    pub port: u16,
    /// Seconds a decided round may sit idle before its room is reclaimed.
    pub room_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub outbound_buffer: usize,
    /// Fixes role dealing; entropy when unset.
    pub seed: Option<u64>,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8080,
            room_ttl_secs: 60,
            sweep_interval_secs: 15,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            seed: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    pub fn room_ttl(&self) -> Duration {
        Duration::from_secs(self.room_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Resolves settings from the process environment.
    pub fn load() -> Result<Self, SettingsError> {
        let path = std::env::var(CONFIG_PATH_VAR)
            .ok()
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self::from_sources(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Layers defaults, then the TOML file at `path`, then `TICTAC_*`
    /// variables looked up through `env`, and validates the result.
    pub fn from_sources(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let mut settings = Settings::default();

        if let Some(path) = path {
            let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let file: FileSettings = toml::from_str(&raw)?;
            settings.apply_file(file);
        }

        settings.apply_env(env)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.room_ttl_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "room_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "sweep_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.outbound_buffer == 0 {
            return Err(SettingsError::InvalidValue(
                "outbound_buffer must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(v) = file.host {
            self.host = v;
        }
        if let Some(v) = file.port {
            self.port = v;
        }
        if let Some(v) = file.room_ttl_secs {
            self.room_ttl_secs = v;
        }
        if let Some(v) = file.sweep_interval_secs {
            self.sweep_interval_secs = v;
        }
        if let Some(v) = file.outbound_buffer {
            self.outbound_buffer = v;
        }
        if let Some(v) = file.seed {
            self.seed = Some(v);
        }
        if let Some(v) = file.log_format {
            self.log_format = v;
        }
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), SettingsError> {
        let lookup = |key: &'static str| env(key).filter(|value| !value.trim().is_empty());

        if let Some(v) = lookup("TICTAC_HOST") {
            self.host = parse_env("TICTAC_HOST", &v)?;
        }
        if let Some(v) = lookup("TICTAC_PORT") {
            self.port = parse_env("TICTAC_PORT", &v)?;
        }
        if let Some(v) = lookup("TICTAC_ROOM_TTL_SECS") {
            self.room_ttl_secs = parse_env("TICTAC_ROOM_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("TICTAC_SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = parse_env("TICTAC_SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("TICTAC_OUTBOUND_BUFFER") {
            self.outbound_buffer = parse_env("TICTAC_OUTBOUND_BUFFER", &v)?;
        }
        if let Some(v) = lookup("TICTAC_SEED") {
            self.seed = Some(parse_env("TICTAC_SEED", &v)?);
        }
        if let Some(v) = lookup("TICTAC_LOG_FORMAT") {
            self.log_format = v
                .parse()
                .map_err(|reason: String| SettingsError::InvalidEnv {
                    key: "TICTAC_LOG_FORMAT",
                    reason,
                })?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    #[serde(default)]
    host: Option<IpAddr>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    room_ttl_secs: Option<u64>,
    #[serde(default)]
    sweep_interval_secs: Option<u64>,
    #[serde(default)]
    outbound_buffer: Option<usize>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    log_format: Option<LogFormat>,
}

fn parse_env<T>(key: &'static str, raw: &str) -> Result<T, SettingsError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err: T::Err| SettingsError::InvalidEnv {
            key,
            reason: err.to_string(),
        })
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {reason}")]
    InvalidEnv { key: &'static str, reason: String },
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let settings = Settings::from_sources(None, env_of(&[])).expect("defaults");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.room_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn file_then_env_override() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "port = 9000\nroom_ttl_secs = 120\nseed = 7\nlog_format = \"json\""
        )
        .expect("write");

        let settings = Settings::from_sources(
            Some(file.path()),
            env_of(&[("TICTAC_PORT", "9100"), ("TICTAC_HOST", "0.0.0.0")]),
        )
        .expect("resolve");

        assert_eq!(settings.port, 9100);
        assert_eq!(settings.host, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(settings.room_ttl_secs, 120);
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.sweep_interval_secs, 15);
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let settings =
            Settings::from_sources(None, env_of(&[("TICTAC_SEED", ""), ("TICTAC_PORT", "  ")]))
                .expect("resolve");
        assert_eq!(settings.seed, None);
        assert_eq!(settings.port, 8080);
    }

    #[test]
    fn invalid_env_is_reported_with_key() {
        let err = Settings::from_sources(None, env_of(&[("TICTAC_PORT", "eighty")]))
            .expect_err("invalid port");
        assert!(matches!(err, SettingsError::InvalidEnv { key: "TICTAC_PORT", .. }));
    }

    #[test]
    fn zero_ttl_fails_validation() {
        let err = Settings::from_sources(None, env_of(&[("TICTAC_ROOM_TTL_SECS", "0")]))
            .expect_err("zero ttl");
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "prot = 9000").expect("write");
        let err = Settings::from_sources(Some(file.path()), env_of(&[])).expect_err("typo");
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Settings::from_sources(Some(Path::new("/nonexistent/tictac.toml")), env_of(&[]))
            .expect_err("missing");
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
