//! Sync input
//!
//! The caller describes, per Steam installation and per local account, which
//! shortcuts belong to which categories. Order is preserved: units are
//! processed in the order installations and users were added.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app_id::AppId;
use crate::error::{Result, SyncError};

/// A detected Steam installation, identified by its root directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Installation {
    root: PathBuf,
}

impl Installation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/userdata/<user>/config/localconfig.vdf`
    pub fn localconfig_path(&self, user: UserId) -> PathBuf {
        self.root
            .join("userdata")
            .join(user.to_string())
            .join("config")
            .join("localconfig.vdf")
    }
}

impl fmt::Display for Installation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

/// Steam account id of a local user profile (the `userdata/<id>` directory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| format!("Invalid user id: {}", s))
    }
}

/// One externally launched application and the categories it should be in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEntry {
    pub executable_location: String,
    pub title: String,
    #[serde(default)]
    pub steam_categories: Vec<String>,
}

impl ApplicationEntry {
    pub fn new(
        executable_location: impl Into<String>,
        title: impl Into<String>,
        categories: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            executable_location: executable_location.into(),
            title: title.into(),
            steam_categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn app_id(&self) -> AppId {
        AppId::generate(&self.executable_location, &self.title)
    }

    /// Like [`app_id`](Self::app_id), but refuses an entry with neither an
    /// executable location nor a title.
    pub fn checked_app_id(&self) -> Result<AppId> {
        if self.executable_location.is_empty() && self.title.is_empty() {
            return Err(SyncError::GeneratorInput {
                message: "entry has neither executable location nor title".to_string(),
            });
        }
        Ok(self.app_id())
    }
}

/// A single "app belongs to category" fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryFact {
    pub app_id: AppId,
    pub category: String,
}

impl CategoryFact {
    pub fn new(app_id: AppId, category: impl Into<String>) -> Self {
        Self {
            app_id,
            category: category.into(),
        }
    }
}

/// Everything one user should end up with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCategories {
    #[serde(default)]
    pub apps: Vec<ApplicationEntry>,
}

impl UserCategories {
    /// Flatten entries into facts.
    ///
    /// Blank category names are dropped and repeated (id, category) pairs
    /// collapse to one. Entries without any identity are skipped.
    pub fn facts(&self) -> Vec<CategoryFact> {
        let mut facts: Vec<CategoryFact> = Vec::new();
        for app in &self.apps {
            let app_id = match app.checked_app_id() {
                Ok(id) => id,
                Err(e) => {
                    warn!(categories = ?app.steam_categories, error = %e, "skipping entry");
                    continue;
                }
            };
            for name in &app.steam_categories {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let fact = CategoryFact::new(app_id, name);
                if !facts.contains(&fact) {
                    facts.push(fact);
                }
            }
        }
        facts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPlan {
    pub user: UserId,
    #[serde(flatten)]
    pub data: UserCategories,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationPlan {
    pub installation: Installation,
    #[serde(default)]
    pub users: Vec<UserPlan>,
}

/// Ordered per-installation, per-user desired categorisations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    #[serde(default)]
    pub installations: Vec<InstallationPlan>,
}

impl SyncPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry for a user, creating the installation and user slots
    /// on first use.
    pub fn add(&mut self, installation: &Installation, user: UserId, entry: ApplicationEntry) {
        self.user_mut(installation, user).apps.push(entry);
    }

    pub fn user_mut(&mut self, installation: &Installation, user: UserId) -> &mut UserCategories {
        let idx = match self
            .installations
            .iter()
            .position(|p| &p.installation == installation)
        {
            Some(idx) => idx,
            None => {
                self.installations.push(InstallationPlan {
                    installation: installation.clone(),
                    users: Vec::new(),
                });
                self.installations.len() - 1
            }
        };
        let users = &mut self.installations[idx].users;
        let user_idx = match users.iter().position(|u| u.user == user) {
            Some(idx) => idx,
            None => {
                users.push(UserPlan {
                    user,
                    data: UserCategories::default(),
                });
                users.len() - 1
            }
        };
        &mut users[user_idx].data
    }

    /// Number of (installation, user) units this plan produces.
    pub fn unit_count(&self) -> usize {
        self.installations.iter().map(|p| p.users.len()).sum()
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localconfig_path() {
        let install = Installation::new("/home/me/.steam/steam");
        assert_eq!(
            install.localconfig_path(UserId(42)),
            PathBuf::from("/home/me/.steam/steam/userdata/42/config/localconfig.vdf")
        );
    }

    #[test]
    fn test_user_id_from_str() {
        assert_eq!("12345".parse::<UserId>().unwrap(), UserId(12345));
        assert!("anonymous".parse::<UserId>().is_err());
    }

    #[test]
    fn test_facts_dedupe_and_skip_blank() {
        let data = UserCategories {
            apps: vec![ApplicationEntry::new(
                "retroarch",
                "Zelda",
                ["SNES", " ", "SNES", "Favourites "],
            )],
        };
        let facts = data.facts();
        let id = AppId::generate("retroarch", "Zelda");
        assert_eq!(
            facts,
            vec![
                CategoryFact::new(id, "SNES"),
                CategoryFact::new(id, "Favourites")
            ]
        );
    }

    #[test]
    fn test_facts_skip_entry_without_identity() {
        let data = UserCategories {
            apps: vec![
                ApplicationEntry::new("", "", ["SNES"]),
                ApplicationEntry::new("snes9x", "Earthbound", ["SNES"]),
            ],
        };
        assert!(matches!(
            data.apps[0].checked_app_id(),
            Err(SyncError::GeneratorInput { .. })
        ));
        assert_eq!(
            data.facts(),
            vec![CategoryFact::new(
                AppId::generate("snes9x", "Earthbound"),
                "SNES"
            )]
        );
    }

    #[test]
    fn test_plan_keeps_insertion_order() {
        let a = Installation::new("/steam/a");
        let b = Installation::new("/steam/b");
        let mut plan = SyncPlan::new();
        plan.add(&b, UserId(2), ApplicationEntry::new("x", "X", ["One"]));
        plan.add(&a, UserId(1), ApplicationEntry::new("y", "Y", ["Two"]));
        plan.add(&b, UserId(3), ApplicationEntry::new("z", "Z", ["Two"]));
        plan.add(&b, UserId(2), ApplicationEntry::new("w", "W", ["One"]));

        assert_eq!(plan.installations[0].installation, b);
        assert_eq!(plan.installations[1].installation, a);
        assert_eq!(plan.installations[0].users[0].user, UserId(2));
        assert_eq!(plan.installations[0].users[0].data.apps.len(), 2);
        assert_eq!(plan.unit_count(), 3);
    }

    #[test]
    fn test_plan_from_json() {
        let json = r#"{
            "installations": [{
                "installation": "/steam",
                "users": [{
                    "user": 7,
                    "apps": [{
                        "executableLocation": "\"/usr/bin/retroarch\"",
                        "title": "Chrono Trigger",
                        "steamCategories": ["SNES"]
                    }]
                }]
            }]
        }"#;
        let plan = SyncPlan::from_json(json).unwrap();
        assert_eq!(plan.unit_count(), 1);
        let user = &plan.installations[0].users[0];
        assert_eq!(user.user, UserId(7));
        assert_eq!(user.data.apps[0].steam_categories, vec!["SNES"]);
    }
}
