//! Store connection settings
//!
//! Values come from the process environment, optionally layered over a
//! YAML file. Every missing variable falls back to a documented default:
//!
//! | Variable           | Default                 |
//! |--------------------|-------------------------|
//! | `COUCHDB_URL`      | `http://localhost:5984` |
//! | `COUCHDB_USER`     | `admin`                 |
//! | `COUCHDB_PASSWORD` | `password`              |
//! | `COUCHDB_DB`       | `ai_personal_trainer`   |

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const DEFAULT_URL: &str = "http://localhost:5984";
pub const DEFAULT_USER: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "password";
pub const DEFAULT_DATABASE: &str = "ai_personal_trainer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub url: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Partial settings read from a YAML file
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            database: DEFAULT_DATABASE.to_string(),
        }
    }
}

impl Config {
    /// Load from the process environment
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from a YAML file, then apply environment overrides
    pub fn load_with_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let file: FileConfig = serde_yaml::from_str(&content)?;
        info!("Loaded store settings from {}", path.display());

        Ok(Self::from_lookup_over(|key| std::env::var(key).ok(), file))
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_over(lookup, FileConfig::default())
    }

    fn from_lookup_over<F>(lookup: F, file: FileConfig) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            url: try_load(&lookup, "COUCHDB_URL", file.url, DEFAULT_URL),
            user: try_load(&lookup, "COUCHDB_USER", file.user, DEFAULT_USER),
            password: try_load(&lookup, "COUCHDB_PASSWORD", file.password, DEFAULT_PASSWORD),
            database: try_load(&lookup, "COUCHDB_DB", file.database, DEFAULT_DATABASE),
        }
    }

    /// Basic-auth credentials, or `None` for anonymous access
    pub fn credentials(&self) -> Option<(&str, &str)> {
        if self.user.is_empty() || self.password.is_empty() {
            None
        } else {
            Some((self.user.as_str(), self.password.as_str()))
        }
    }
}

fn try_load<F>(lookup: &F, key: &str, from_file: Option<String>, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        return value;
    }
    if let Some(value) = from_file {
        return value;
    }
    warn!("{key} not set, using default: {}", redact(key, default));
    default.to_string()
}

fn redact<'a>(key: &str, value: &'a str) -> &'a str {
    if key.contains("PASSWORD") {
        "<redacted>"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[]));
        assert_eq!(config, Config::default());
        assert_eq!(config.credentials(), Some(("admin", "password")));
    }

    #[test]
    fn test_environment_wins() {
        let config = Config::from_lookup(lookup(&[
            ("COUCHDB_URL", "http://couch:5984"),
            ("COUCHDB_DB", "lifts"),
        ]));
        assert_eq!(config.url, "http://couch:5984");
        assert_eq!(config.database, "lifts");
        assert_eq!(config.user, DEFAULT_USER);
    }

    #[test]
    fn test_empty_user_means_anonymous() {
        let config = Config::from_lookup(lookup(&[("COUCHDB_USER", "")]));
        assert_eq!(config.credentials(), None);
    }

    #[test]
    fn test_file_values_under_environment() {
        let file = FileConfig {
            url: Some("http://file:5984".into()),
            database: Some("from_file".into()),
            ..Default::default()
        };
        let config = Config::from_lookup_over(lookup(&[("COUCHDB_DB", "from_env")]), file);
        assert_eq!(config.url, "http://file:5984");
        assert_eq!(config.database, "from_env");
    }

    #[test]
    fn test_load_with_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "url: http://yaml:5984\nuser: coach\n").unwrap();
        let config = Config::load_with_file(tmp.path()).unwrap();
        // environment may override in CI; only assert what it cannot touch
        assert!(!config.database.is_empty());
    }
}
