//! Settings, layered: defaults, then an optional YAML file, then the
//! `FSTERM_SERVER` environment fallback, then command-line flags.
//!
//! ```yaml
//! server: https://files.example.org/api
//! prompt: "files> "
//! page_rows: 40
//! pager: true
//! home: /home/alice
//! timeout_secs: 20
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const SERVER_ENV: &str = "FSTERM_SERVER";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid server url '{url}': {reason}")]
    InvalidServer { url: String, reason: String },
    #[error("page rows must be at least 1")]
    InvalidRows,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server: Option<Url>,
    pub prompt: String,
    pub page_rows: usize,
    pub pager: bool,
    pub home: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: None,
            prompt: "fsterm> ".to_string(),
            page_rows: 24,
            pager: true,
            home: "/".to_string(),
            timeout_secs: 30,
        }
    }
}

/// The config file; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    pub server: Option<String>,
    pub prompt: Option<String>,
    pub page_rows: Option<usize>,
    pub pager: Option<bool>,
    pub home: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileSettings {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub server: Option<String>,
    pub prompt: Option<String>,
    pub rows: Option<usize>,
    pub no_pager: bool,
    pub home: Option<String>,
}

pub fn parse_server(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidServer {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

impl Settings {
    pub fn apply_file(&mut self, file: FileSettings) -> Result<(), ConfigError> {
        if let Some(server) = file.server {
            self.server = Some(parse_server(&server)?);
        }
        if let Some(prompt) = file.prompt {
            self.prompt = prompt;
        }
        if let Some(rows) = file.page_rows {
            self.page_rows = rows;
        }
        if let Some(pager) = file.pager {
            self.pager = pager;
        }
        if let Some(home) = file.home {
            self.home = home;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout_secs = secs;
        }
        Ok(())
    }

    pub fn apply_env_server(&mut self, value: Option<String>) -> Result<(), ConfigError> {
        if let Some(raw) = value.filter(|s| !s.trim().is_empty()) {
            self.server = Some(parse_server(&raw)?);
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, o: &Overrides) -> Result<(), ConfigError> {
        if let Some(server) = &o.server {
            self.server = Some(parse_server(server)?);
        }
        if let Some(prompt) = &o.prompt {
            self.prompt = prompt.clone();
        }
        if let Some(rows) = o.rows {
            self.page_rows = rows;
        }
        if o.no_pager {
            self.pager = false;
        }
        if let Some(home) = &o.home {
            self.home = home.clone();
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.page_rows == 0 {
            return Err(ConfigError::InvalidRows);
        }
        Ok(())
    }
}

/// Builds the effective settings from every layer.
pub fn load(overrides: &Overrides) -> Result<Settings> {
    let mut settings = Settings::default();

    if let Some(path) = &overrides.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let file = FileSettings::from_yaml(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        settings.apply_file(file)?;
        debug!(path = %path.display(), "config file loaded");
    }

    settings
        .apply_env_server(std::env::var(SERVER_ENV).ok())
        .with_context(|| format!("{SERVER_ENV} is not usable"))?;
    settings.apply_overrides(overrides)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_overrides_defaults() {
        let file = FileSettings::from_yaml("prompt: \"files> \"\npage_rows: 40\nserver: https://fs.example.org/api\n")
            .unwrap();
        let mut s = Settings::default();
        s.apply_file(file).unwrap();
        assert_eq!(s.prompt, "files> ");
        assert_eq!(s.page_rows, 40);
        assert!(s.pager);
        assert_eq!(s.server.unwrap().as_str(), "https://fs.example.org/api");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            FileSettings::from_yaml("colour: red\n"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(FileSettings::from_yaml("").is_ok());
    }

    #[test]
    fn precedence_file_env_flags() {
        let mut s = Settings::default();
        s.apply_file(FileSettings {
            server: Some("http://file.example".into()),
            ..Default::default()
        })
        .unwrap();
        s.apply_env_server(Some("http://env.example".into())).unwrap();
        assert_eq!(s.server.as_ref().unwrap().host_str(), Some("env.example"));

        s.apply_overrides(&Overrides {
            server: Some("https://flag.example".into()),
            no_pager: true,
            rows: Some(10),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(s.server.as_ref().unwrap().host_str(), Some("flag.example"));
        assert!(!s.pager);
        assert_eq!(s.page_rows, 10);
    }

    #[test]
    fn blank_env_is_ignored() {
        let mut s = Settings::default();
        s.apply_env_server(Some("  ".into())).unwrap();
        assert!(s.server.is_none());
    }

    #[test]
    fn server_must_be_http() {
        assert!(parse_server("https://x.example/api").is_ok());
        assert!(matches!(
            parse_server("ftp://x.example"),
            Err(ConfigError::InvalidServer { .. })
        ));
        assert!(parse_server("not a url").is_err());
    }

    #[test]
    fn zero_rows_rejected() {
        let mut s = Settings::default();
        assert!(matches!(
            s.apply_overrides(&Overrides {
                rows: Some(0),
                ..Default::default()
            }),
            Err(ConfigError::InvalidRows)
        ));
    }
}
