// src/settings.rs

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const DEFAULT_SERVICE_URL: &str = "http://localhost:8000/analyse_app/api/analyse/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ROWS_PER_PAGE: u64 = 10;
const DEFAULT_LOG_LEVEL: &str = "info";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Use the built-in in-memory data service.
    #[arg(long)]
    pub mock: bool,

    /// URL of the analysis endpoint.
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Service {
    pub url: String,
    pub timeout_secs: u64,
    pub mock: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct View {
    pub rows_per_page: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Log {
    pub level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub service: Service,
    pub view: View,
    pub log: Log,
}

impl Settings {
    /// Load settings from the given TOML file, with sane defaults. Without a
    /// file only the defaults apply.
    pub fn from_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::<DefaultState>::default()
            .set_default("service.url", DEFAULT_SERVICE_URL)?
            .set_default("service.timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("service.mock", false)?
            .set_default("view.rows_per_page", DEFAULT_ROWS_PER_PAGE)?
            .set_default("log.level", DEFAULT_LOG_LEVEL)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder.build()?.try_deserialize()
    }

    /// Loads the file named on the command line, or the one in the platform
    /// config directory if present, then applies command-line overrides.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let path = args.config.clone().or_else(default_config_path);
        let mut settings = Self::from_file(path.as_deref())?;
        if args.mock {
            settings.service.mock = true;
        }
        if let Some(url) = &args.url {
            settings.service.url.clone_from(url);
        }
        Ok(settings)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }
}

/// `config.toml` in the platform config directory, if it exists.
fn default_config_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", env!("CARGO_PKG_NAME"))?;
    let path = dirs.config_dir().join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn defaults_without_file() {
        let settings = Settings::from_file(None).unwrap();
        assert_eq!(settings.service.url, DEFAULT_SERVICE_URL);
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert!(!settings.service.mock);
        assert_eq!(settings.view.rows_per_page, 10);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[service]\nurl = \"http://olap.internal/api/analyse/\"\ntimeout_secs = 5\n\n[view]\nrows_per_page = 25\n",
        )
        .unwrap();

        let settings = Settings::from_file(Some(&path)).unwrap();
        assert_eq!(settings.service.url, "http://olap.internal/api/analyse/");
        assert_eq!(settings.timeout(), Duration::from_secs(5));
        assert!(!settings.service.mock);
        assert_eq!(settings.view.rows_per_page, 25);
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn arguments_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[log]\nlevel = \"debug\"\n").unwrap();

        let args = Args::parse_from([
            "olap-explorer",
            "-c",
            path.to_str().unwrap(),
            "--mock",
            "--url",
            "http://127.0.0.1:9000/",
        ]);
        let settings = Settings::load(&args).unwrap();
        assert!(settings.service.mock);
        assert_eq!(settings.service.url, "http://127.0.0.1:9000/");
        assert_eq!(settings.log.level, "debug");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::from_file(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn malformed_value_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[view]\nrows_per_page = \"many\"\n").unwrap();
        assert!(Settings::from_file(Some(&path)).is_err());
    }
}
