//! Configuration file loading
//!
//! Resolution order, later wins:
//! 1. built-in defaults
//! 2. the main file (`--config`, or the first of the standard locations)
//! 3. `fleetmap.local.toml` next to it, for secrets that stay out of git
//! 4. `FLEETMAP_*` environment variables

use super::schema::ConfigSchema;
use crate::error::{Error, ErrorCode, Result, ResultExt};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Uncommitted overlay merged over the main file
pub const LOCAL_OVERLAY_FILE: &str = "fleetmap.local.toml";

const CANDIDATES: [&str; 3] = ["fleetmap.toml", ".fleetmap.toml", ".config/fleetmap.toml"];

/// Loaded configuration plus where it came from
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Effective settings
    pub schema: ConfigSchema,
    /// Main file, if one was found
    pub path: Option<PathBuf>,
    /// Local overlay, if one was merged
    pub overlay: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path or the standard locations, then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::load_files(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load files only; no environment overrides, no validation
    pub fn load_files(path: Option<&Path>) -> Result<Self> {
        let main_path = match path {
            Some(p) if !p.exists() => return Err(Error::config_not_found(p)),
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(),
        };

        let overlay_dir = main_path
            .as_deref()
            .and_then(Path::parent)
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let overlay_path = overlay_dir.join(LOCAL_OVERLAY_FILE);
        let overlay = overlay_path.exists().then_some(overlay_path);

        let mut value = match &main_path {
            Some(p) => read_toml(p)?,
            None => toml::Value::Table(toml::map::Map::new()),
        };
        if let Some(p) = &overlay {
            debug!(path = %p.display(), "Merging local overlay");
            merge(&mut value, read_toml(p)?);
        }

        let schema = value
            .try_into::<ConfigSchema>()
            .map_err(Error::from)
            .context(format!(
                "Reading {}",
                main_path
                    .as_deref()
                    .map_or_else(|| "defaults".to_string(), |p| p.display().to_string())
            ))?;

        Ok(Self {
            schema,
            path: main_path,
            overlay,
        })
    }

    /// Apply `FLEETMAP_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let schema = &mut self.schema;

        if let Some(url) = lookup("FLEETMAP_BASE_URL") {
            schema.backend.base_url = url;
        }
        if let Some(url) = lookup("FLEETMAP_PREDICTION_URL") {
            schema.backend.prediction_url = url;
        }
        if let Some(raw) = lookup("FLEETMAP_TIMEOUT_MS") {
            schema.backend.timeout_ms = raw.trim().parse().map_err(|_| {
                Error::invalid_config("FLEETMAP_TIMEOUT_MS", format!("'{raw}' is not a number"))
            })?;
        }
        if let Some(key) = lookup("FLEETMAP_MAPS_API_KEY") {
            schema.map.api_key = Some(key);
        }
        if let Some(level) = lookup("FLEETMAP_LOG") {
            schema.logging.level = level;
        }

        Ok(())
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        let s = &self.schema;

        for (field, url) in [
            ("backend.base_url", &s.backend.base_url),
            ("backend.prediction_url", &s.backend.prediction_url),
        ] {
            if url.is_empty() {
                return Err(Error::invalid_config(field, "cannot be empty"));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::invalid_config(field, "must start with http:// or https://"));
            }
        }

        if s.backend.timeout_ms == 0 {
            return Err(Error::invalid_config("backend.timeout_ms", "cannot be zero"));
        }
        if s.polling.base_interval_ms == 0 {
            return Err(Error::invalid_config("polling.base_interval_ms", "cannot be zero"));
        }
        if s.polling.max_interval_ms < s.polling.base_interval_ms {
            return Err(Error::invalid_config(
                "polling.max_interval_ms",
                "must be at least polling.base_interval_ms",
            ));
        }
        if s.store.stale_after_ms == 0 {
            return Err(Error::invalid_config("store.stale_after_ms", "cannot be zero"));
        }
        if !(s.map.arrival_radius_m > 0.0) {
            return Err(Error::invalid_config("map.arrival_radius_m", "must be positive"));
        }

        s.route.build(s.map.arrival_radius_m)?;
        Ok(())
    }

    /// Copy of the settings safe to print (API key masked)
    #[must_use]
    pub fn redacted(&self) -> ConfigSchema {
        let mut schema = self.schema.clone();
        if let Some(key) = schema.map.api_key.as_mut() {
            *key = mask(key);
        }
        schema
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    CANDIDATES
        .into_iter()
        .map(PathBuf::from)
        .chain(dirs::config_dir().map(|d| d.join("fleetmap").join("fleetmap.toml")))
        .find(|p| p.exists())
}

fn read_toml(path: &Path) -> Result<toml::Value> {
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .context(format!("Reading config file {}", path.display()))?;

    toml::from_str(&content).map_err(|e| {
        Error::new(
            ErrorCode::ConfigParseError,
            format!("Failed to parse config file {}", path.display()),
        )
        .with_source(e)
    })
}

/// Deep-merge `overlay` into `base`; tables merge, everything else is replaced
fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.path.is_none());
        assert!(config.validate().is_ok());
        assert_eq!(config.schema.backend.timeout_ms, 10_000);
    }

    #[test]
    fn test_missing_explicit_path() {
        let err = Config::load_files(Some(Path::new("/nonexistent/fleetmap.toml"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_local_overlay_is_merged() {
        let dir = TempDir::new().unwrap();
        let main = write(
            &dir,
            "fleetmap.toml",
            "[backend]\nbase_url = \"http://10.0.0.5:8001\"\n\n[map]\nfollow_device = \"bus-1\"\n",
        );
        write(&dir, LOCAL_OVERLAY_FILE, "[map]\napi_key = \"AIzaLocalKey\"\n");

        let config = Config::load_files(Some(&main)).unwrap();
        assert_eq!(config.schema.backend.base_url, "http://10.0.0.5:8001");
        assert_eq!(config.schema.map.follow_device.as_deref(), Some("bus-1"));
        assert_eq!(config.schema.map.api_key.as_deref(), Some("AIzaLocalKey"));
        assert!(config.overlay.is_some());
    }

    #[test]
    fn test_parse_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let main = write(&dir, "fleetmap.toml", "[backend\nbase_url = 3");
        let err = Config::load_files(Some(&main)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseError);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FLEETMAP_BASE_URL", "https://iot.example.org"),
            ("FLEETMAP_TIMEOUT_MS", "2500"),
            ("FLEETMAP_MAPS_API_KEY", "secret-key"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides_with(|k| env.get(k).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.schema.backend.base_url, "https://iot.example.org");
        assert_eq!(config.schema.backend.timeout_ms, 2500);
        assert_eq!(config.schema.map.api_key.as_deref(), Some("secret-key"));
    }

    #[test]
    fn test_bad_timeout_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides_with(|k| (k == "FLEETMAP_TIMEOUT_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfigValue);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.schema.backend.base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.schema.polling.max_interval_ms = 10;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.schema.route.stops = vec![fleetmap_geo::Stop::new(
            "Lonely",
            fleetmap_geo::Coordinate::new(0.0, 0.0),
        )];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted_masks_key() {
        let mut config = Config::default();
        config.schema.map.api_key = Some("AIzaSyExample".to_string());
        assert_eq!(config.redacted().map.api_key.as_deref(), Some("AIza****"));
    }

    #[test]
    fn test_merge_replaces_scalars_and_merges_tables() {
        let mut base: toml::Value = toml::from_str("a = 1\n[t]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("a = 5\n[t]\ny = 3\n").unwrap();
        merge(&mut base, overlay);
        assert_eq!(base["a"].as_integer(), Some(5));
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(3));
    }
}
