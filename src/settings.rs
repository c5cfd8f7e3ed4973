//! Persisted per-user settings (the saved API key).
//!
//! Stored as a flat JSON object at `~/.millsheet-renamer/config.json`, or at
//! the path in `MILLSHEET_RENAMER_CONFIG`. Loading never fails: a missing or
//! unreadable file yields empty settings so a damaged file can't lock the
//! user out. Keys this crate does not know about are carried through a
//! load/save cycle untouched. The file is written owner-only (0600) on Unix.

use crate::error::RenamerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the settings file location.
pub const SETTINGS_PATH_ENV: &str = "MILLSHEET_RENAMER_CONFIG";

const SETTINGS_DIR: &str = ".millsheet-renamer";
const SETTINGS_FILE: &str = "config.json";

/// Where the API key in use came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Given explicitly with `--api-key`.
    Flag,
    /// Read from `ANTHROPIC_API_KEY`.
    Environment,
    /// Loaded from the settings file.
    Saved,
}

impl KeySource {
    /// Only a key the user typed on the command line is written to disk.
    pub fn persists(self) -> bool {
        matches!(self, KeySource::Flag)
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Settings {
    /// Default settings location for the current user.
    pub fn default_path() -> PathBuf {
        if let Some(p) = std::env::var_os(SETTINGS_PATH_ENV) {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(SETTINGS_DIR)
            .join(SETTINGS_FILE)
    }

    /// Load from [`Settings::default_path`].
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path`; any failure yields empty settings.
    pub fn load_from(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring malformed settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save to [`Settings::default_path`].
    pub fn save(&self) -> Result<(), RenamerError> {
        self.save_to(&Self::default_path())
    }

    /// Write to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), RenamerError> {
        let write_err = |source| RenamerError::SettingsWrite {
            path: path.to_path_buf(),
            source,
        };

        let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent).map_err(write_err)?;
                parent
            }
            None => Path::new("."),
        };

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RenamerError::Internal(format!("settings serialise: {e}")))?;

        // NamedTempFile is created 0600; the rename keeps that mode.
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// The saved key, if non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Pick the key to use: `flag`, then `env`, then the saved key. Blank
    /// values are skipped.
    pub fn resolve_api_key(
        &self,
        flag: Option<&str>,
        env: Option<&str>,
    ) -> Option<(String, KeySource)> {
        fn given(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|k| !k.is_empty())
        }

        given(flag)
            .map(|k| (k.to_string(), KeySource::Flag))
            .or_else(|| given(env).map(|k| (k.to_string(), KeySource::Environment)))
            .or_else(|| self.api_key().map(|k| (k.to_string(), KeySource::Saved)))
    }

    /// Store `key`; returns `true` when it differs from the saved one.
    pub fn set_api_key(&mut self, key: &str) -> bool {
        let key = key.trim();
        if key.is_empty() || self.api_key() == Some(key) {
            return false;
        }
        self.api_key = Some(key.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let s = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn corrupt_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path).api_key(), None);
    }

    #[test]
    fn save_creates_directory_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/config.json");

        let mut s = Settings::default();
        assert!(s.set_api_key("  sk-ant-123  "));
        s.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.api_key(), Some("sk-ant-123"));
    }

    #[test]
    fn unknown_keys_survive_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_key":"old","window":"900x600"}"#).unwrap();

        let mut s = Settings::load_from(&path);
        assert!(s.set_api_key("new"));
        s.save_to(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["api_key"], "new");
        assert_eq!(raw["window"], "900x600");
    }

    #[test]
    fn set_api_key_ignores_blank_and_unchanged() {
        let mut s = Settings::default();
        assert!(!s.set_api_key("   "));
        assert!(s.set_api_key("k"));
        assert!(!s.set_api_key("k"));
    }

    #[test]
    fn debug_redacts_key() {
        let mut s = Settings::default();
        s.set_api_key("sk-secret");
        assert!(!format!("{s:?}").contains("sk-secret"));
    }

    #[test]
    fn flag_beats_environment_beats_saved() {
        let mut s = Settings::default();
        s.set_api_key("saved");

        assert_eq!(
            s.resolve_api_key(Some("flag"), Some("env")),
            Some(("flag".to_string(), KeySource::Flag))
        );
        assert_eq!(
            s.resolve_api_key(Some("  "), Some(" env ")),
            Some(("env".to_string(), KeySource::Environment))
        );
        assert_eq!(
            s.resolve_api_key(None, None),
            Some(("saved".to_string(), KeySource::Saved))
        );
        assert_eq!(Settings::default().resolve_api_key(None, Some("")), None);
    }

    #[test]
    fn only_flag_keys_are_persisted() {
        assert!(KeySource::Flag.persists());
        assert!(!KeySource::Environment.persists());
        assert!(!KeySource::Saved.persists());
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"api_key":"old"}"#).unwrap();

        let mut s = Settings::default();
        s.set_api_key("new");
        s.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path).api_key(), Some("new"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let mut s = Settings::default();
        s.set_api_key("sk-ant-secret");
        s.save_to(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
