use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

use crate::core::filter::{DEFAULT_EVENT_TYPE, DEFAULT_TARGET_REF};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SECRET must be set to the webhook's shared secret")]
    MissingSecret,
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    #[error("missing value for {0}")]
    MissingFlagValue(String),
}

/// Shared webhook secret. Kept out of `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self(value.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// One versioned documentation site, served on its own host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Directory under the public dir (`docs`, `book`).
    pub name: String,
    /// Host header this site answers on.
    pub host: String,
    /// Host used when building redirect targets.
    pub base_url: String,
    /// Path inside each version directory that redirects land on.
    pub root: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub secret: Secret,
    pub port: u16,
    pub script_path: PathBuf,
    pub shell: PathBuf,
    pub event_type: String,
    pub target_ref: String,
    pub trigger_host: String,
    pub docs: SiteConfig,
    pub book: SiteConfig,
    pub public_dir: PathBuf,
    pub not_found_page: PathBuf,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from a variable lookup, applying defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let secret = lookup("SECRET")
            .filter(|s| !s.is_empty())
            .map(Secret::new)
            .ok_or(ConfigError::MissingSecret)?;
        let port = parse_port(&get_or("PORT", "3000"))?;

        Ok(Self {
            secret,
            port,
            script_path: PathBuf::from(get_or("SCRIPT", "./run.sh")),
            shell: PathBuf::from(get_or("SHELL_PATH", "/bin/sh")),
            event_type: DEFAULT_EVENT_TYPE.to_string(),
            target_ref: get_or("TARGET_REF", DEFAULT_TARGET_REF),
            trigger_host: get_or("TRIGGER_URL", "hook.amethyst.rs"),
            docs: SiteConfig {
                name: "docs".to_string(),
                host: get_or("DOCS_URL", "docs.amethyst.rs"),
                base_url: get_or("DOCS_BASE_URL", "docs.amethyst.rs"),
                root: "/amethyst/".to_string(),
            },
            book: SiteConfig {
                name: "book".to_string(),
                host: get_or("BOOK_URL", "book.amethyst.rs"),
                base_url: get_or("BOOK_BASE_URL", "book.amethyst.rs"),
                root: "/".to_string(),
            },
            public_dir: PathBuf::from(get_or("PUBLIC_DIR", "./public")),
            not_found_page: PathBuf::from(get_or("NOT_FOUND_PAGE", "./404.html")),
            log_level: get_or("LOG_LEVEL", "info"),
        })
    }

    /// Apply `--port`, `--script`, `--public-dir` and `--log-level` overrides.
    pub fn apply_flags(&mut self, args: &[String]) -> Result<(), ConfigError> {
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            if !matches!(flag, "--port" | "--script" | "--public-dir" | "--log-level") {
                i += 1;
                continue;
            }
            let value = args
                .get(i + 1)
                .ok_or_else(|| ConfigError::MissingFlagValue(flag.to_string()))?;
            match flag {
                "--port" => self.port = parse_port(value)?,
                "--script" => self.script_path = PathBuf::from(value),
                "--public-dir" => self.public_dir = PathBuf::from(value),
                _ => self.log_level = value.clone(),
            }
            i += 2;
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!("using script {}", self.script_path.display());
        info!("using docs base url: {}", self.docs.base_url);
        info!("using book base url: {}", self.book.base_url);
        info!(
            "triggering on {} to {} via {}",
            self.event_type, self.target_ref, self.trigger_host
        );
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPort(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_secret_fails_fast() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingSecret);

        let err = Config::from_lookup(lookup_from(&[("SECRET", "")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingSecret);
    }

    #[test]
    fn defaults_match_the_deployment() {
        let config = Config::from_lookup(lookup_from(&[("SECRET", "abc")])).unwrap();
        assert_eq!(config.secret.as_bytes(), b"abc");
        assert_eq!(config.port, 3000);
        assert_eq!(config.script_path, PathBuf::from("./run.sh"));
        assert_eq!(config.shell, PathBuf::from("/bin/sh"));
        assert_eq!(config.event_type, "push");
        assert_eq!(config.target_ref, "refs/heads/master");
        assert_eq!(config.trigger_host, "hook.amethyst.rs");
        assert_eq!(config.docs.host, "docs.amethyst.rs");
        assert_eq!(config.docs.root, "/amethyst/");
        assert_eq!(config.book.base_url, "book.amethyst.rs");
        assert_eq!(config.book.root, "/");
        assert_eq!(config.public_dir, PathBuf::from("./public"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("SECRET", "abc"),
            ("PORT", "8080"),
            ("SCRIPT", "/srv/deploy.sh"),
            ("TARGET_REF", "refs/heads/main"),
            ("DOCS_URL", "docs.localhost"),
            ("DOCS_BASE_URL", "docs.example.org"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.script_path, PathBuf::from("/srv/deploy.sh"));
        assert_eq!(config.target_ref, "refs/heads/main");
        assert_eq!(config.docs.host, "docs.localhost");
        assert_eq!(config.docs.base_url, "docs.example.org");
    }

    #[test]
    fn invalid_port_is_reported() {
        let err =
            Config::from_lookup(lookup_from(&[("SECRET", "abc"), ("PORT", "http")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort("http".to_string()));
    }

    #[test]
    fn flags_override_environment() {
        let mut config = Config::from_lookup(lookup_from(&[("SECRET", "abc")])).unwrap();
        let args: Vec<String> = ["--port", "9000", "--verbose", "--script", "./build.sh"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        config.apply_flags(&args).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.script_path, PathBuf::from("./build.sh"));
    }

    #[test]
    fn flag_without_value_is_an_error() {
        let mut config = Config::from_lookup(lookup_from(&[("SECRET", "abc")])).unwrap();
        let err = config.apply_flags(&["--port".to_string()]).unwrap_err();
        assert_eq!(err, ConfigError::MissingFlagValue("--port".to_string()));
    }

    #[test]
    fn secret_is_redacted_in_debug_output() {
        let config = Config::from_lookup(lookup_from(&[("SECRET", "hunter2")])).unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
