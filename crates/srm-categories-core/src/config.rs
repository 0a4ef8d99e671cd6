use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::category::DEFAULT_CATEGORY_PREFIX;
use crate::error::{Result, SyncError};
use crate::platform::{default_local_app_data, OsFamily};

const CONFIG_FILE: &str = "categories.toml";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Steam category sync configuration

[categories]
# Prefix that marks categories owned by this tool in both Steam stores.
# Changing it orphans categories written under the old prefix.
prefix = "srm-"

[sync]
# What a failed user/installation means for the whole run.
# "best-effort": report it, keep the run successful
# "fail-on-any": the run fails if any unit failed
failure_policy = "best-effort"

[paths]
# Override for %LOCALAPPDATA% (Windows only)
# local_app_data = "C:\\Users\\me\\AppData\\Local"

# Force the store layout of one OS family ("windows" or "unix")
# os_family = "unix"
"#;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    #[serde(default)]
    pub categories: CategoriesSection,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub paths: PathsSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesSection {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    DEFAULT_CATEGORY_PREFIX.to_string()
}

impl Default for CategoriesSection {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

/// How per-unit failures fold into the result of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    #[default]
    BestEffort,
    FailOnAny,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().trim_matches('"') {
            "best-effort" => Ok(Self::BestEffort),
            "fail-on-any" => Ok(Self::FailOnAny),
            other => Err(format!("Unknown failure policy: {}", other)),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BestEffort => write!(f, "best-effort"),
            Self::FailOnAny => write!(f, "fail-on-any"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncSection {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_app_data: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_family: Option<OsFamily>,
}

impl SyncConfig {
    /// Read `categories.toml` from `base_dir`; defaults when the file is absent.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| parse_error(&path, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = base_dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self).map_err(|e| parse_error(&path, e))?;
        fs::create_dir_all(base_dir)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Write the commented template unless a config already exists.
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = base_dir.join(CONFIG_FILE);
        fs::create_dir_all(base_dir)?;
        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }
        Ok(path)
    }

    pub fn os_family(&self) -> OsFamily {
        self.paths.os_family.unwrap_or_else(OsFamily::current)
    }

    pub fn local_app_data(&self) -> Option<PathBuf> {
        self.paths
            .local_app_data
            .clone()
            .or_else(default_local_app_data)
    }

    /// Get a config value by dot-notation key
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "categories.prefix" => Some(self.categories.prefix.clone()),
            "sync.failure_policy" => Some(self.sync.failure_policy.to_string()),
            "paths.local_app_data" => self
                .paths
                .local_app_data
                .as_ref()
                .map(|p| p.display().to_string()),
            "paths.os_family" => self.paths.os_family.map(|os| os.to_string()),
            _ => None,
        }
    }

    /// Set a config value by dot-notation key. An empty path value clears it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |message: String| SyncError::ConfigParse {
            path: PathBuf::from(CONFIG_FILE),
            message,
        };
        let value = value.trim();
        match key {
            "categories.prefix" if value.is_empty() => {
                return Err(invalid("categories.prefix must not be empty".to_string()));
            }
            "categories.prefix" => self.categories.prefix = value.to_string(),
            "sync.failure_policy" => self.sync.failure_policy = value.parse().map_err(invalid)?,
            "paths.local_app_data" => {
                self.paths.local_app_data = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "paths.os_family" if value.is_empty() => self.paths.os_family = None,
            "paths.os_family" => self.paths.os_family = Some(value.parse().map_err(invalid)?),
            _ => {
                return Err(SyncError::ConfigKeyNotFound {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }
}

fn parse_error(path: &Path, e: impl std::fmt::Display) -> SyncError {
    SyncError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
