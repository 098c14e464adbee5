//! Session log for the GUI.
//!
//! One file, `cvisiontool.log`, lives next to the settings file and is
//! rewritten on every launch. Lines are stamped with the time since launch so
//! the edits of one session read in order.
//!
//! `log_info!` / `log_warn!` / `log_err!` write free-form lines and
//! [`session_event`] records what happened to the open image. Until `init`
//! runs (CLI mode, tests) nothing is written.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use crate::components::history::HistoryEntry;
use crate::settings::app_dir;

const LOG_FILE_NAME: &str = "cvisiontool.log";

static LOG: OnceLock<SessionLog> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

/// An open, truncated log file plus the instant it was opened.
pub struct SessionLog {
    path: PathBuf,
    started: Instant,
    file: Mutex<File>,
}

impl SessionLog {
    /// Create `path` (or wipe an existing one) and write the header line.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        writeln!(file, "CVisionTool {} session log", env!("CARGO_PKG_VERSION"))?;
        Ok(Self {
            path: path.to_path_buf(),
            started: Instant::now(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// I/O errors are dropped; a full disk must not stop the editor.
    pub fn write(&self, level: Level, msg: &str) {
        let line = format_line(self.started.elapsed(), level, msg);
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}", line);
        }
    }
}

/// Something that happened to the open image.
pub enum SessionEvent<'a> {
    Opened { path: &'a Path, width: u32, height: u32 },
    Applied(&'a HistoryEntry),
    Selected(&'a HistoryEntry),
    RevertedTo(&'a HistoryEntry),
    ImageSaved(&'a Path),
    RecipeExported { path: &'a Path, steps: usize },
}

impl SessionEvent<'_> {
    pub fn message(&self) -> String {
        match self {
            SessionEvent::Opened { path, width, height } => {
                format!("open {} ({}x{})", path.display(), width, height)
            }
            SessionEvent::Applied(entry) => format!("apply {}", entry.description()),
            SessionEvent::Selected(entry) => format!("select {}", entry.description()),
            SessionEvent::RevertedTo(entry) => format!("revert to {}", entry.description()),
            SessionEvent::ImageSaved(path) => format!("save image {}", path.display()),
            SessionEvent::RecipeExported { path, steps } => {
                format!("export {} step(s) to {}", steps, path.display())
            }
        }
    }
}

/// Open the log in the app directory and mirror panics into it.
pub fn init() {
    let Some(dir) = app_dir() else { return };
    let path = dir.join(LOG_FILE_NAME);
    match SessionLog::create(&path) {
        Ok(log) => {
            if LOG.set(log).is_err() {
                return;
            }
        }
        Err(e) => {
            eprintln!("could not open log file {}: {}", path.display(), e);
            return;
        }
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, &info.to_string());
        prev(info);
    }));
}

pub fn log_path() -> Option<&'static Path> {
    LOG.get().map(SessionLog::path)
}

pub fn write(level: Level, msg: &str) {
    if let Some(log) = LOG.get() {
        log.write(level, msg);
    }
}

pub fn session_event(event: SessionEvent<'_>) {
    write(Level::Info, &event.message());
}

fn format_line(elapsed: Duration, level: Level, msg: &str) -> String {
    format!("[{:>9.3}] {:<5} {}", elapsed.as_secs_f64(), level.tag(), msg)
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*));
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, MorphParams, MorphShape};
    use crate::ops::Mat;

    #[test]
    fn lines_carry_elapsed_time_and_level() {
        assert_eq!(
            format_line(Duration::from_millis(1500), Level::Warn, "careful"),
            "[    1.500] WARN  careful"
        );
        assert_eq!(
            format_line(Duration::ZERO, Level::Error, "boom"),
            "[    0.000] ERROR boom"
        );
    }

    #[test]
    fn create_writes_header_and_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("session.log");
        let log = SessionLog::create(&path).unwrap();
        log.write(Level::Info, "first");
        log.write(Level::Warn, "second");
        drop(log);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("CVisionTool "));
        assert!(lines[1].ends_with("INFO  first"));
        assert!(lines[2].ends_with("WARN  second"));
    }

    #[test]
    fn create_truncates_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let old = SessionLog::create(&path).unwrap();
        old.write(Level::Info, "from the last run");
        drop(old);

        let fresh = SessionLog::create(&path).unwrap();
        assert_eq!(fresh.path(), path.as_path());
        drop(fresh);
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("from the last run"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn history_events_name_the_entry() {
        let entry = HistoryEntry::new(Action::Dilation(MorphParams::new(MorphShape::Rect, 2)), Mat::new(1, 1));
        let desc = entry.description();
        assert_eq!(SessionEvent::Applied(&entry).message(), format!("apply {}", desc));
        assert_eq!(SessionEvent::RevertedTo(&entry).message(), format!("revert to {}", desc));
        assert_eq!(
            SessionEvent::RecipeExported { path: Path::new("r.json"), steps: 3 }.message(),
            "export 3 step(s) to r.json"
        );
    }

    #[test]
    fn logging_before_init_is_harmless() {
        crate::log_info!("nothing listens to {}", 42);
        session_event(SessionEvent::ImageSaved(Path::new("out.png")));
    }
}
