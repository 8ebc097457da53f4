//! Persisted user preferences: visual toggles and the last namespace.
//!
//! The engine reads them once at construction and writes on change. A failed
//! write is logged by the caller and otherwise ignored.

use crate::Result;
use crate::filter::VisualToggle;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub trait Preferences: Send {
    fn flag(&self, toggle: VisualToggle) -> Option<bool>;

    fn set_flag(&mut self, toggle: VisualToggle, value: bool) -> Result<()>;

    fn last_namespace(&self) -> Option<String>;

    fn set_last_namespace(&mut self, ns: &str) -> Result<()>;
}

/// On-disk shape of the preferences file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPrefs {
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,

    #[serde(default)]
    pub last_namespace: Option<String>,
}

impl StoredPrefs {
    fn flag(&self, toggle: VisualToggle) -> Option<bool> {
        self.flags.get(toggle.key()).copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    data: StoredPrefs,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self) -> &StoredPrefs {
        &self.data
    }
}

impl Preferences for MemoryPreferences {
    fn flag(&self, toggle: VisualToggle) -> Option<bool> {
        self.data.flag(toggle)
    }

    fn set_flag(&mut self, toggle: VisualToggle, value: bool) -> Result<()> {
        self.data.flags.insert(toggle.key().to_string(), value);
        Ok(())
    }

    fn last_namespace(&self) -> Option<String> {
        self.data.last_namespace.clone()
    }

    fn set_last_namespace(&mut self, ns: &str) -> Result<()> {
        self.data.last_namespace = Some(ns.to_string());
        Ok(())
    }
}

/// Preferences kept in a small JSON file, rewritten on every change.
#[derive(Debug, Clone)]
pub struct JsonFilePreferences {
    path: PathBuf,
    data: StoredPrefs,
}

impl JsonFilePreferences {
    /// A missing file means defaults; a malformed one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("read preferences file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parse preferences file {}", path.display()))?
        } else {
            StoredPrefs::default()
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stored(&self) -> &StoredPrefs {
        &self.data
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create directory {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, json)
            .with_context(|| format!("write preferences file {}", self.path.display()))
    }
}

impl Preferences for JsonFilePreferences {
    fn flag(&self, toggle: VisualToggle) -> Option<bool> {
        self.data.flag(toggle)
    }

    fn set_flag(&mut self, toggle: VisualToggle, value: bool) -> Result<()> {
        self.data.flags.insert(toggle.key().to_string(), value);
        self.save()
    }

    fn last_namespace(&self) -> Option<String> {
        self.data.last_namespace.clone()
    }

    fn set_last_namespace(&mut self, ns: &str) -> Result<()> {
        self.data.last_namespace = Some(ns.to_string());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_round_trips_flags_and_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let mut prefs = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(prefs.flag(VisualToggle::Host), None);

        prefs.set_flag(VisualToggle::Host, false).unwrap();
        prefs.set_last_namespace("shop").unwrap();

        let reopened = JsonFilePreferences::open(&path).unwrap();
        assert_eq!(reopened.flag(VisualToggle::Host), Some(false));
        assert_eq!(reopened.flag(VisualToggle::KubeDns), None);
        assert_eq!(reopened.last_namespace().as_deref(), Some("shop"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{not json").unwrap();
        assert!(JsonFilePreferences::open(&path).is_err());
    }
}
