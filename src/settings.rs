use std::path::{Path, PathBuf};

use crate::log_warn;

/// Application settings that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Directory the last image was opened from; seeds the file dialogs.
    pub last_dir: Option<PathBuf>,
    /// Initial state of the "Show result immediately" toggle in dialogs.
    pub live_preview: bool,
    pub dark_mode: bool,
    pub show_history: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            last_dir: None,
            live_preview: true,
            dark_mode: true,
            show_history: true,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/cvisiontool/cvisiontool_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\cvisiontool\cvisiontool_settings.cfg
    /// On macOS:   ~/Library/Application Support/cvisiontool/cvisiontool_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        Some(app_dir()?.join("cvisiontool_settings.cfg"))
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        self.save_to(&path);
    }

    pub fn save_to(&self, path: &Path) {
        if let Err(e) = std::fs::write(path, self.to_config()) {
            log_warn!("Could not write settings to {}: {}", path.display(), e);
        }
    }

    /// Load from disk; a missing or unreadable file yields the defaults.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };
        Self::parse(&content)
    }

    pub fn to_config(&self) -> String {
        let last_dir = self
            .last_dir
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "last_dir={}\n\
             live_preview={}\n\
             dark_mode={}\n\
             show_history={}\n",
            last_dir, self.live_preview, self.dark_mode, self.show_history,
        )
    }

    /// Parse `key=value` lines. Unknown keys and malformed lines are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "last_dir" => {
                    s.last_dir = (!val.is_empty()).then(|| PathBuf::from(val));
                }
                "live_preview" => s.live_preview = val == "true",
                "dark_mode" => s.dark_mode = val == "true",
                "show_history" => s.show_history = val == "true",
                _ => {}
            }
        }
        s
    }
}

/// Per-user `cvisiontool` directory holding settings and the session log.
pub fn app_dir() -> Option<PathBuf> {
    let dir = config_dir()?.join("cvisiontool");
    let _ = std::fs::create_dir_all(&dir);
    Some(dir)
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        return std::env::var("APPDATA")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from);
    }
    #[cfg(target_os = "macos")]
    {
        return std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library").join("Application Support"));
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg));
        }
        std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_and_junk_are_ignored() {
        let s = AppSettings::parse("theme=neon\nnot a pair\ndark_mode=false\n");
        assert_eq!(
            s,
            AppSettings {
                dark_mode: false,
                ..AppSettings::default()
            }
        );
    }

    #[test]
    fn empty_last_dir_means_none() {
        assert_eq!(AppSettings::parse("last_dir=\n").last_dir, None);
        assert_eq!(
            AppSettings::parse("last_dir = /tmp/images\n").last_dir,
            Some(PathBuf::from("/tmp/images"))
        );
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.cfg");
        let settings = AppSettings {
            last_dir: Some(PathBuf::from("/data/pictures")),
            live_preview: false,
            dark_mode: false,
            show_history: false,
        };
        settings.save_to(&path);
        assert_eq!(AppSettings::load_from(&path), settings);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            AppSettings::load_from(&dir.path().join("absent.cfg")),
            AppSettings::default()
        );
    }
}
