use std::{path::PathBuf, time::Duration};

use thiserror::Error;

use crate::gemini::{DEFAULT_API_BASE, DEFAULT_IMAGE_MODEL};

pub const DEFAULT_PANEL_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_STORE_PATH: &str = "comic-studio.json";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Pacing between panel requests. Fixed, never adaptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudioSettings {
    pub panel_delay: Duration,
}

impl Default for StudioSettings {
    fn default() -> Self {
        Self { panel_delay: DEFAULT_PANEL_DELAY }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub image_model: String,
    pub store_path: Option<PathBuf>,
    pub port: u16,
    pub studio: StudioSettings,
}

impl AppConfig {
    /// Reads configuration from the process environment (after `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("GEMINI_API_KEY").filter(|v| !v.trim().is_empty());
        let api_base = lookup("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let image_model = lookup("GEMINI_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());
        let store_path = match lookup("COMIC_STORE_PATH") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(PathBuf::from(v)),
            None => Some(PathBuf::from(DEFAULT_STORE_PATH)),
        };
        let port = parse_number(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        let panel_delay = parse_number::<u64>(&lookup, "PANEL_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PANEL_DELAY);

        Ok(Self {
            api_key,
            api_base,
            image_model,
            store_path,
            port,
            studio: StudioSettings { panel_delay },
        })
    }
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.api_key, None);
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(cfg.store_path, Some(PathBuf::from(DEFAULT_STORE_PATH)));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.studio.panel_delay, Duration::from_secs(1));
    }

    #[test]
    fn overrides_are_read() {
        let cfg = config(&[
            ("GEMINI_API_KEY", "abc"),
            ("PANEL_DELAY_MS", "250"),
            ("PORT", "9000"),
            ("COMIC_STORE_PATH", ""),
        ])
        .unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.studio.panel_delay, Duration::from_millis(250));
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.store_path, None);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = config(&[("PANEL_DELAY_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("PANEL_DELAY_MS"));
    }
}
