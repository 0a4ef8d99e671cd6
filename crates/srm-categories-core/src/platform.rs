//! Where the client keeps its category cache
//!
//! On Windows the client keeps its HTML cache under the per-user local app
//! data directory, shared by every installation. Everywhere else it lives
//! inside the installation tree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

const CACHE_SEGMENTS: &[&str] = &["htmlcache", "Local Storage", "leveldb"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OsFamily {
    Windows,
    Unix,
}

impl OsFamily {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Unix => "unix",
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for OsFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" | "windows_nt" => Ok(Self::Windows),
            "unix" | "linux" | "macos" | "darwin" => Ok(Self::Unix),
            _ => Err(format!("Unknown OS family: {}", s)),
        }
    }
}

/// Binary store directory for an installation.
///
/// `local_app_data` is only consulted on Windows.
pub fn resolve_store_path(
    os: OsFamily,
    installation_root: &Path,
    local_app_data: Option<&Path>,
) -> Result<PathBuf> {
    let base = match os {
        OsFamily::Windows => local_app_data
            .ok_or(SyncError::LocalAppDataNotFound)?
            .join("Steam"),
        OsFamily::Unix => installation_root.join("config"),
    };
    Ok(CACHE_SEGMENTS
        .iter()
        .fold(base, |path, segment| path.join(segment)))
}

/// The current user's local app data directory, if the platform has one.
pub fn default_local_app_data() -> Option<PathBuf> {
    dirs::data_local_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_path_unix_is_under_installation() {
        let path = resolve_store_path(OsFamily::Unix, Path::new("/home/me/.steam/steam"), None)
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/home/me/.steam/steam/config/htmlcache/Local Storage/leveldb")
        );
    }

    #[test]
    fn test_store_path_unix_ignores_local_app_data() {
        let path = resolve_store_path(
            OsFamily::Unix,
            Path::new("/steam"),
            Some(Path::new("/appdata")),
        )
        .unwrap();
        assert!(path.starts_with("/steam"));
    }

    #[test]
    fn test_store_path_windows_is_under_local_app_data() {
        let path = resolve_store_path(
            OsFamily::Windows,
            Path::new("/steam"),
            Some(Path::new("/appdata/Local")),
        )
        .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/appdata/Local/Steam/htmlcache/Local Storage/leveldb")
        );
    }

    #[test]
    fn test_store_path_windows_requires_local_app_data() {
        let err = resolve_store_path(OsFamily::Windows, Path::new("/steam"), None).unwrap_err();
        assert!(matches!(err, SyncError::LocalAppDataNotFound));
    }

    #[test]
    fn test_os_family_from_str() {
        assert_eq!("Windows_NT".parse::<OsFamily>().unwrap(), OsFamily::Windows);
        assert_eq!("linux".parse::<OsFamily>().unwrap(), OsFamily::Unix);
        assert!("plan9".parse::<OsFamily>().is_err());
    }
}
