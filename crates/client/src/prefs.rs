use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::ClientError;

pub const DEFAULT_USER_NAME: &str = "Guest";
const PREFS_FILE: &str = "prefs.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPrefs {
    #[serde(default)]
    user_name: String,
    #[serde(default)]
    active: bool,
}

/// Display name and overlay switch, kept across sessions in a small JSON
/// file. Without a path nothing is written.
#[derive(Debug, Clone)]
pub struct LocalPrefs {
    path: Option<PathBuf>,
    user_name: String,
    active: bool,
}

/// `~/.config/pinboard/prefs.json`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pinboard").join(PREFS_FILE))
}

impl LocalPrefs {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            user_name: DEFAULT_USER_NAME.to_string(),
            active: false,
        }
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let stored: Option<StoredPrefs> = std::fs::read_to_string(path)
            .inspect_err(|e| debug!("failed to read prefs {}: {e}", path.display()))
            .ok()
            .and_then(|s| {
                serde_json::from_str(&s)
                    .inspect_err(|e| debug!("failed to parse prefs {}: {e}", path.display()))
                    .ok()
            });

        let mut prefs = Self::in_memory();
        prefs.path = Some(path.to_path_buf());
        if let Some(stored) = stored {
            if !stored.user_name.trim().is_empty() {
                prefs.user_name = stored.user_name;
            }
            prefs.active = stored.active;
        }
        prefs
    }

    /// 空白名字按 Guest 处理
    pub fn user_name(&self) -> &str {
        if self.user_name.trim().is_empty() {
            DEFAULT_USER_NAME
        } else {
            &self.user_name
        }
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn set_user_name(&mut self, name: &str) -> Result<(), ClientError> {
        self.user_name = name.to_string();
        self.save()
    }

    pub fn set_active(&mut self, active: bool) -> Result<(), ClientError> {
        self.active = active;
        self.save()
    }

    fn save(&self) -> Result<(), ClientError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let stored = StoredPrefs {
            user_name: self.user_name.clone(),
            active: self.active,
        };
        std::fs::write(path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }
}
