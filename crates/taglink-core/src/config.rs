//! Sync configuration: where the corpus lives and how it is written back.

use crate::error::{Result, TagError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Optional per-corpus overrides, read from the corpus root.
pub const CONFIG_FILE_NAME: &str = "taglink.json";

/// How link-list lines credit referencing documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BacklinkStyle {
    /// Origin link only.
    None,
    /// `[doc.md](doc.md);` per referencing document.
    #[default]
    Plain,
    /// Back-links labelled with the time of the pass. Output changes on every
    /// run.
    Timestamped,
}

impl std::str::FromStr for BacklinkStyle {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "plain" => Ok(Self::Plain),
            "timestamped" => Ok(Self::Timestamped),
            other => Err(format!(
                "unknown backlink style '{other}' (expected none, plain or timestamped)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Corpus root. Never read from the config file itself.
    #[serde(skip)]
    pub root: PathBuf,
    /// Link-list file name, relative to the root.
    pub linklist_name: String,
    /// Index file name, relative to the root.
    pub index_name: String,
    /// Document extensions (lowercase, without dot).
    pub extensions: Vec<String>,
    /// Directory names to skip (exact match).
    pub exclude_dir_names: Vec<String>,
    /// Descend into subdirectories.
    pub recursive: bool,
    pub backlinks: BacklinkStyle,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            linklist_name: "linklist.md".to_string(),
            index_name: ".tag_index.json".to_string(),
            extensions: vec!["md".to_string()],
            exclude_dir_names: vec![
                ".git".to_string(),
                "target".to_string(),
                "node_modules".to_string(),
            ],
            recursive: true,
            backlinks: BacklinkStyle::Plain,
        }
    }
}

impl SyncConfig {
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Defaults for `root`, overlaid with `taglink.json` when present.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let path = root.join(CONFIG_FILE_NAME);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str::<SyncConfig>(&json)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(TagError::io(path, err)),
        };
        config.root = root;
        Ok(config)
    }

    pub fn linklist_path(&self) -> PathBuf {
        self.root.join(&self.linklist_name)
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(&self.index_name)
    }

    /// Whether `path` has one of the configured document extensions.
    pub fn is_document(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(&e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::for_root("notes");
        assert_eq!(config.linklist_path(), PathBuf::from("notes/linklist.md"));
        assert_eq!(config.index_path(), PathBuf::from("notes/.tag_index.json"));
        assert!(config.recursive);
        assert_eq!(config.backlinks, BacklinkStyle::Plain);
        assert!(config.is_document(Path::new("a/B.MD")));
        assert!(!config.is_document(Path::new("a/b.txt")));
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"linklist_name": "tags.md", "backlinks": "none", "recursive": false}"#,
        )
        .unwrap();
        let config = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(config.linklist_name, "tags.md");
        assert_eq!(config.backlinks, BacklinkStyle::None);
        assert!(!config.recursive);
        assert_eq!(config.index_name, ".tag_index.json");
        assert_eq!(config.root, dir.path());
    }

    #[test]
    fn backlink_style_parses() {
        assert_eq!("Timestamped".parse::<BacklinkStyle>(), Ok(BacklinkStyle::Timestamped));
        assert!("loud".parse::<BacklinkStyle>().is_err());
    }
}
