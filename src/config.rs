//! Configuration manager for Macro.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_PORT: u16 = 8080;

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Domain name of current instance. Used as token issuer.
    pub url: String,
    /// Icon shown on `/status.json`, unless `SERVER_ICON` is set.
    pub favicon: Option<String>,
    /// Listening port.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(skip)]
    path: PathBuf,
    /// Related to JsonWebToken configuration.
    #[serde(skip_serializing)]
    pub token: Option<Token>,
    /// Related to Sign in with Apple.
    #[serde(skip_serializing)]
    pub apple: Option<Apple>,
    /// YAML fixture loaded into the store on start.
    #[serde(skip_serializing)]
    pub seed: Option<PathBuf>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: String::default(),
            url: String::default(),
            favicon: None,
            port: DEFAULT_PORT,
            path: PathBuf::default(),
            token: None,
            apple: None,
            seed: None,
        }
    }
}

/// Json Web Token configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Token {
    pub key_id: Option<String>,
    pub public_key_pem: String,
    pub private_key_pem: String,
    /// Update token audience.
    /// Default is `macro`.
    pub audience: Option<String>,
}

/// Sign in with Apple configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Apple {
    /// Service identifier expected as identity token audience.
    pub client_id: String,
    /// Apple public keys, as published on `https://appleid.apple.com/auth/keys`.
    #[serde(default)]
    pub keys: Vec<AppleKey>,
}

/// RSA public key components.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct AppleKey {
    pub kid: String,
    /// Base64url modulus.
    pub n: String,
    /// Base64url exponent.
    pub e: String,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let mut config: Configuration =
                    match serde_yaml::from_reader(file) {
                        Ok(config) => config,
                        Err(err) => {
                            tracing::error!(
                                error = %err,
                                path = %file_path.display(),
                                "`config.yaml` is not valid"
                            );
                            return Ok(Arc::new(Self::default()));
                        },
                    };

                // normalize URLs.
                config.url = self.normalize_url(&config.url)?;
                config.favicon = config
                    .favicon
                    .map(|f| self.normalize_url(&f))
                    .transpose()?;

                Ok(Arc::new(config))
            },
            Err(err) => {
                tracing::error!(
                    error = %err,
                    path = %file_path.display(),
                    "`config.yaml` file not found"
                );
                Ok(Arc::new(Self::default()))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_read_and_normalize() {
        let path = std::env::temp_dir().join(format!("macro-config-{}.yaml", std::process::id()));
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            "name: Macro\n\
             url: api.macro.test\n\
             favicon: cdn.macro.test/icon.png\n\
             apple:\n  client_id: com.macro.app"
        )
        .unwrap();

        let config = Configuration::default().path(path.clone()).read().unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(config.name, "Macro");
        assert_eq!(config.url, "https://api.macro.test/");
        assert_eq!(config.favicon.as_deref(), Some("https://cdn.macro.test/icon.png"));
        assert_eq!(config.port, DEFAULT_PORT);
        let apple = config.apple.as_ref().unwrap();
        assert_eq!(apple.client_id, "com.macro.app");
        assert!(apple.keys.is_empty());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Configuration::default()
            .path(PathBuf::from("/nonexistent/macro.yaml"))
            .read()
            .unwrap();
        assert_eq!(*config, Configuration::default());
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let path = std::env::temp_dir().join(format!("macro-invalid-{}.yaml", std::process::id()));
        std::fs::write(&path, "name: [unclosed").unwrap();

        let config = Configuration::default().path(path.clone()).read().unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(*config, Configuration::default());
    }
}
