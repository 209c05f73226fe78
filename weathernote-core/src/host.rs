//! Capabilities the embedding application lends to the orchestrator.
//!
//! The core never talks to an editor or a UI toolkit directly; a host
//! implements these traits over whatever document model it has.

use std::path::Path;

use crate::slots::SlotId;

/// How the active document is currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Raw text is being edited; insertions land at the cursor.
    Source,
    /// Rendered output; preview markers are mounted.
    Preview,
}

/// The document under edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    pub path: String,
    pub text: String,
}

impl ActiveDocument {
    /// True when the document lives directly inside `folder`.
    pub fn is_in_folder(&self, folder: &str) -> bool {
        !folder.is_empty()
            && Path::new(&self.path)
                .parent()
                .is_some_and(|parent| parent.ends_with(folder))
    }
}

pub trait DocumentHost: Send + Sync {
    fn active_document(&self) -> Option<ActiveDocument>;

    fn view_mode(&self) -> Option<ViewMode>;

    fn set_active_document_text(&self, text: &str);

    /// Document at `path`, whether or not it is the active one.
    fn read_document(&self, path: &str) -> Option<ActiveDocument> {
        self.active_document().filter(|doc| doc.path == path)
    }

    /// Overwrite the document at `path`.
    fn write_document(&self, path: &str, text: &str) {
        if self.active_document().is_some_and(|doc| doc.path == path) {
            self.set_active_document_text(text);
        }
    }

    /// Replace the current selection (or insert at the cursor).
    fn replace_selection(&self, text: &str);

    /// Preview marker slots currently mounted in the active view, at most one per slot.
    fn preview_markers(&self) -> Vec<SlotId>;

    fn write_preview(&self, slot: SlotId, html: &str);

    /// Transient user-facing message.
    fn notify(&self, message: &str);
}

/// The persistent one-line summary surface.
pub trait StatusSurface: Send + Sync {
    fn set_text(&self, text: &str);

    fn clear(&self) {
        self.set_text("");
    }
}
