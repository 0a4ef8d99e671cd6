//! `localconfig.vdf` access
//!
//! Loads a user's `localconfig.vdf`, exposes the collections stored under
//! `UserLocalConfigStore/WebStorage/user-collections`, and writes the whole
//! file back.

pub mod keyvalues;
pub mod payload;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::category::UserCollections;
use crate::error::{Result, SyncError};
pub use keyvalues::{KeyValue, KeyValues, KeyValuesError};
pub use payload::{decode_collections, encode_collections, COLLECTIONS_KEY};

pub const ROOT_KEY: &str = "UserLocalConfigStore";
pub const WEB_STORAGE_KEY: &str = "WebStorage";

const STAGING_SUFFIX: &str = "srm-part";

/// Parse/stringify pair for the client's text config format.
pub trait TextConfigCodec: Send + Sync {
    fn parse(&self, text: &str) -> std::result::Result<KeyValues, KeyValuesError>;

    fn stringify(&self, tree: &KeyValues) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValuesCodec;

impl TextConfigCodec for KeyValuesCodec {
    fn parse(&self, text: &str) -> std::result::Result<KeyValues, KeyValuesError> {
        keyvalues::parse(text)
    }

    fn stringify(&self, tree: &KeyValues) -> String {
        keyvalues::stringify(tree)
    }
}

#[derive(Debug, Clone)]
pub struct LocalConfig {
    path: PathBuf,
    tree: KeyValues,
}

impl LocalConfig {
    pub fn from_tree(path: impl Into<PathBuf>, tree: KeyValues) -> Self {
        Self {
            path: path.into(),
            tree,
        }
    }

    pub async fn load(path: &Path, codec: &dyn TextConfigCodec) -> Result<Self> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SyncError::LocalConfigMissing {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let tree = codec
            .parse(&text)
            .map_err(|e| SyncError::TextConfigParse {
                path: path.to_path_buf(),
                line: e.line,
                message: e.message,
            })?;
        Ok(Self::from_tree(path, tree))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tree(&self) -> &KeyValues {
        &self.tree
    }

    /// Collections currently stored; an absent field is an empty set.
    pub fn collections(&self) -> Result<UserCollections> {
        match self
            .tree
            .get_path(&[ROOT_KEY, WEB_STORAGE_KEY, COLLECTIONS_KEY])
        {
            None => Ok(UserCollections::new()),
            Some(KeyValue::String(raw)) => decode_collections(raw),
            Some(KeyValue::Object(_)) => Err(structural(COLLECTIONS_KEY, "expected a string")),
        }
    }

    /// Store `collections`, creating the enclosing sections if needed.
    pub fn set_collections(&mut self, collections: &UserCollections) -> Result<()> {
        let encoded = encode_collections(collections)?;
        let web_storage = self
            .tree
            .object_mut(ROOT_KEY)
            .ok_or_else(|| structural(ROOT_KEY, "expected a section"))?
            .object_mut(WEB_STORAGE_KEY)
            .ok_or_else(|| structural(WEB_STORAGE_KEY, "expected a section"))?;
        web_storage.set(COLLECTIONS_KEY, KeyValue::String(encoded));
        Ok(())
    }

    /// Write the whole file through a sibling staging file.
    pub async fn save(&self, codec: &dyn TextConfigCodec) -> Result<()> {
        let content = codec.stringify(&self.tree);
        let staged = staging_path(&self.path);
        tokio::fs::write(&staged, content).await?;
        if let Err(e) = tokio::fs::rename(&staged, &self.path).await {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e.into());
        }
        debug!(path = %self.path.display(), "wrote localconfig");
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}

fn structural(key: &str, message: &str) -> SyncError {
    SyncError::Structural {
        key: key.to_string(),
        message: message.to_string(),
    }
}
