//! Runtime configuration for spooldesk.
//!
//! Everything the service needs at startup lives in one explicit `Config`
//! value: no process-wide settings module. Values are layered
//! file → environment → CLI flags:
//!
//! ```toml
//! # spooldesk.toml
//! hostname = "https://tickets.example.org"
//! port = 8330
//! db_path = ".spooldesk/spooldesk.db"
//! wiki_dir = "wiki"
//! ```
//!
//! Environment overrides use the `SPOOLDESK_` prefix (`SPOOLDESK_PORT`,
//! `SPOOLDESK_HOSTNAME`, `SPOOLDESK_DB_PATH`, `SPOOLDESK_WIKI_DIR`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL prepended to derived ticket and file URLs.
    pub hostname: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Directory holding the wiki option descriptions
    /// (`production_methods/`, `material_types/`, `material_colors/`).
    pub wiki_dir: PathBuf,
    /// Permissive CORS and bind on all interfaces.
    pub dev_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: "http://localhost:8330".to_string(),
            port: 8330,
            db_path: PathBuf::from(".spooldesk/spooldesk.db"),
            wiki_dir: PathBuf::from("wiki"),
            dev_mode: false,
        }
    }
}

impl Config {
    /// Load configuration with the file → environment layering applied.
    ///
    /// An explicitly given path must exist; otherwise `spooldesk.toml` is
    /// tried in the working directory, then in the user config directory,
    /// falling back to defaults when neither is present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::find_file()?
                .map(|p| Self::from_file(&p))
                .transpose()?
                .unwrap_or_default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn find_file() -> Result<Option<PathBuf>> {
        let local = PathBuf::from("spooldesk.toml");
        if local.is_file() {
            return Ok(Some(local));
        }
        if let Some(dir) = dirs::config_dir() {
            let user = dir.join("spooldesk").join("spooldesk.toml");
            if user.is_file() {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    /// Apply environment overrides from an arbitrary lookup, so tests can
    /// inject values without touching the process environment.
    fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = get("SPOOLDESK_HOSTNAME") {
            self.hostname = v;
        }
        if let Some(v) = get("SPOOLDESK_PORT") {
            self.port = v
                .parse()
                .with_context(|| format!("SPOOLDESK_PORT must be a port number, got '{}'", v))?;
        }
        if let Some(v) = get("SPOOLDESK_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = get("SPOOLDESK_WIKI_DIR") {
            self.wiki_dir = PathBuf::from(v);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.port, 8330);
        assert!(config.hostname.starts_with("http"));
        assert!(!config.dev_mode);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str("port = 9000\nhostname = \"https://t.example\"\n")
            .expect("partial config should parse");
        assert_eq!(config.port, 9000);
        assert_eq!(config.hostname, "https://t.example");
        // untouched fields keep their defaults
        assert_eq!(config.wiki_dir, PathBuf::from("wiki"));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spooldesk.toml");
        std::fs::write(&path, "db_path = \"/tmp/desk.db\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/desk.db"));
    }

    #[test]
    fn from_file_missing_is_an_error() {
        assert!(Config::from_file(Path::new("/nonexistent/spooldesk.toml")).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config
            .apply_env_from(|key| match key {
                "SPOOLDESK_PORT" => Some("9999".to_string()),
                "SPOOLDESK_HOSTNAME" => Some("https://env.example".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.hostname, "https://env.example");
    }

    #[test]
    fn invalid_env_port_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_env_from(|key| {
            (key == "SPOOLDESK_PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }
}
