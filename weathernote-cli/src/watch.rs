//! Polling directory watcher that turns file changes into lifecycle events.

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weathernote_core::{LifecycleEvent, RefreshOrchestrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified: SystemTime,
    pub len: u64,
}

pub type Snapshot = BTreeMap<PathBuf, FileStamp>;

/// Every Markdown file under `root`, recursively.
///
/// Entries that disappear while the scan is running are skipped; only the
/// root itself being unreadable is an error.
pub fn scan(root: &Path) -> Result<Snapshot> {
    let mut files = Snapshot::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound && dir != root => {
                debug!(dir = %dir.display(), "directory vanished during scan");
                continue;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read directory: {}", dir.display()));
            }
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            if file_type.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "md") {
                if let Some(stamp) = file_stamp(&path)? {
                    files.insert(path, stamp);
                }
            }
        }
    }

    Ok(files)
}

/// Size and mtime of `path`, or `None` when it no longer exists.
fn file_stamp(path: &Path) -> io::Result<Option<FileStamp>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(FileStamp { modified: meta.modified()?, len: meta.len() })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "file vanished during scan");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Events that explain how `prev` became `next`.
///
/// A file that shows up already holding content was both created and
/// written between polls, so it yields a create followed by a modify.
pub fn diff(prev: &Snapshot, next: &Snapshot) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();

    for (path, stamp) in next {
        let path_str = path.to_string_lossy().into_owned();
        match prev.get(path) {
            None => {
                events.push(LifecycleEvent::Created { path: path_str.clone(), is_folder: false });
                if stamp.len > 0 {
                    events.push(LifecycleEvent::Modified { path: path_str, is_folder: false });
                }
            }
            Some(old) if old != stamp => {
                events.push(LifecycleEvent::Modified { path: path_str, is_folder: false });
            }
            Some(_) => {}
        }
    }

    events
}

/// Feed the changes between two snapshots to the orchestrator.
///
/// Returns the follow-up tasks that were scheduled.
pub fn dispatch_changes(
    orchestrator: &Arc<RefreshOrchestrator>,
    prev: &Snapshot,
    next: &Snapshot,
) -> Vec<JoinHandle<()>> {
    diff(prev, next)
        .into_iter()
        .filter_map(|event| {
            debug!(?event, "file change");
            orchestrator.dispatch(event)
        })
        .collect()
}

pub async fn run(
    orchestrator: Arc<RefreshOrchestrator>,
    root: PathBuf,
    poll: Duration,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut known = scan(&root)?;
    info!(dir = %root.display(), files = known.len(), "watching for new notes");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(poll) => {}
        }

        let current = match scan(&root) {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "directory scan failed, retrying next poll");
                continue;
            }
        };
        dispatch_changes(&orchestrator, &known, &current);
        known = current;
    }

    Ok(())
}
