//! Theme preference: a single `theme` → `light|dark` pair persisted to a JSON file.

pub mod handlers;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
}

impl ThemePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
        }
    }
}

impl FromStr for ThemePreference {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            other => Err(PreferenceError::UnknownTheme(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Unknown theme '{0}'")]
    UnknownTheme(String),

    #[error("Preference store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preference store encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// On-disk shape. The theme is kept as a raw string so an unexpected value is
/// treated as "not dark" rather than failing the read.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    theme: Option<String>,
}

/// File-backed key-value store for the theme.
pub struct ThemeStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ThemeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_raw(&self) -> Option<String> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_slice::<StoredPreferences>(&bytes) {
            Ok(stored) => stored.theme,
            Err(e) => {
                warn!("Ignoring malformed {}: {e}", self.path.display());
                None
            }
        }
    }

    /// The persisted theme, if one is stored and recognised.
    pub async fn load(&self) -> Option<ThemePreference> {
        self.read_raw().await.and_then(|raw| raw.parse().ok())
    }

    pub async fn save(&self, theme: ThemePreference) -> Result<(), PreferenceError> {
        let _guard = self.write_lock.lock().await;
        self.write_raw(theme).await
    }

    /// Caller must hold `write_lock`.
    async fn write_raw(&self, theme: ThemePreference) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&StoredPreferences {
            theme: Some(theme.as_str().to_string()),
        })?;
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }

    /// Startup resolution: saved value, else the system hint, else light.
    /// The resolved value is written back.
    pub async fn initialize(&self, prefers_dark: bool) -> Result<ThemePreference, PreferenceError> {
        let theme = match self.load().await {
            Some(saved) => saved,
            None if prefers_dark => ThemePreference::Dark,
            None => ThemePreference::Light,
        };
        self.save(theme).await?;
        info!("Theme preference: {}", theme.as_str());
        Ok(theme)
    }

    /// Flips the persisted value. Anything other than a stored "dark" becomes dark.
    pub async fn toggle(&self) -> Result<ThemePreference, PreferenceError> {
        let _guard = self.write_lock.lock().await;
        let next = match self.read_raw().await.as_deref() {
            Some("dark") => ThemePreference::Light,
            _ => ThemePreference::Dark,
        };
        self.write_raw(next).await?;
        Ok(next)
    }

    pub async fn current(&self) -> ThemePreference {
        self.load().await.unwrap_or(ThemePreference::Light)
    }
}
