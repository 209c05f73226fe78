//! File-backed document host and terminal status line.

use parking_lot::{Mutex, RwLock};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::warn;
use weathernote_core::{ActiveDocument, DocumentHost, SlotId, StatusSurface, ViewMode};

use crate::preview;

/// Treats one file on disk as the active document.
///
/// In source mode the file is Markdown and insertions land on `cursor_line`
/// (or the end of the file). In preview mode it is rendered HTML carrying
/// `weather_current_N` markers.
#[derive(Debug)]
pub struct FileHost {
    path: RwLock<Option<PathBuf>>,
    mode: ViewMode,
    cursor_line: Option<usize>,
}

impl FileHost {
    pub fn new(path: impl Into<PathBuf>, mode: ViewMode) -> Self {
        Self {
            path: RwLock::new(Some(path.into())),
            mode,
            cursor_line: None,
        }
    }

    /// A host with no active document; documents are still reachable by path.
    pub fn unfocused(mode: ViewMode) -> Self {
        Self { path: RwLock::new(None), mode, cursor_line: None }
    }

    pub fn with_cursor_line(mut self, line: Option<usize>) -> Self {
        self.cursor_line = line;
        self
    }

    fn current_path(&self) -> Option<PathBuf> {
        self.path.read().clone()
    }

    fn read(&self) -> Option<(PathBuf, String)> {
        let path = self.current_path()?;
        let text = read_file(&path)?;
        Some((path, text))
    }

    fn write(&self, text: &str) {
        if let Some(path) = self.current_path() {
            write_file(&path, text);
        }
    }
}

fn read_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read document");
            None
        }
    }
}

fn write_file(path: &Path, text: &str) {
    if let Err(e) = fs::write(path, text) {
        warn!(path = %path.display(), error = %e, "failed to write document");
    }
}

impl DocumentHost for FileHost {
    fn active_document(&self) -> Option<ActiveDocument> {
        let (path, text) = self.read()?;
        Some(ActiveDocument { path: path.to_string_lossy().into_owned(), text })
    }

    fn view_mode(&self) -> Option<ViewMode> {
        self.current_path().map(|_| self.mode)
    }

    fn set_active_document_text(&self, text: &str) {
        self.write(text);
    }

    fn read_document(&self, path: &str) -> Option<ActiveDocument> {
        let text = read_file(Path::new(path))?;
        Some(ActiveDocument { path: path.to_string(), text })
    }

    fn write_document(&self, path: &str, text: &str) {
        write_file(Path::new(path), text);
    }

    fn replace_selection(&self, text: &str) {
        let Some((_, current)) = self.read() else {
            return;
        };
        self.write(&insert_at_line(&current, self.cursor_line, text));
    }

    fn preview_markers(&self) -> Vec<SlotId> {
        self.read()
            .map(|(_, html)| preview::mounted_markers(&html))
            .unwrap_or_default()
    }

    fn write_preview(&self, slot: SlotId, html: &str) {
        let Some((_, current)) = self.read() else {
            return;
        };
        if let Some(updated) = preview::write_marker(&current, slot, html) {
            self.write(&updated);
        }
    }

    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}

/// Insert `text` at the start of 1-based `line`, or append when `None`
/// or past the end.
pub fn insert_at_line(current: &str, line: Option<usize>, text: &str) -> String {
    let offset = line
        .filter(|l| *l > 0)
        .and_then(|l| {
            if l == 1 {
                return Some(0);
            }
            current
                .match_indices('\n')
                .nth(l - 2)
                .map(|(idx, _)| idx + 1)
        })
        .unwrap_or(current.len());

    let mut out = String::with_capacity(current.len() + text.len());
    out.push_str(&current[..offset]);
    out.push_str(text);
    out.push_str(&current[offset..]);
    out
}

/// Keeps the latest status text on a single terminal line.
#[derive(Debug, Default)]
pub struct TerminalStatus {
    last: Mutex<String>,
}

impl StatusSurface for TerminalStatus {
    fn set_text(&self, text: &str) {
        let mut last = self.last.lock();
        if *last == text {
            return;
        }
        *last = text.to_string();

        let mut out = io::stdout().lock();
        let line = text.replace('\n', " ");
        // Clear the line, then redraw.
        let _ = write!(out, "\r\x1b[2K{line}");
        let _ = out.flush();
    }
}
