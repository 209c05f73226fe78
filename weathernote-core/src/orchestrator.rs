//! Decides when to fetch and fans one rendered snapshot out to every target.
//!
//! Three render targets are kept in sync: the status strip (timer driven),
//! `%weatherN%` placeholders in the active document (new-document lifecycle
//! and explicit commands) and `weather_current_N` preview markers (open and
//! layout events, timer ticks).

use parking_lot::{Mutex, RwLock};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::{RefreshInterval, Settings},
    debounce::SettleDebouncer,
    error::{CommandError, FetchError},
    host::{DocumentHost, StatusSurface, ViewMode},
    model::WeatherSnapshot,
    provider::WeatherFetcher,
    slots::SlotId,
    template::render_outcome,
};

/// Document and workspace signals the host forwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created { path: String, is_folder: bool },
    Renamed { old_path: String, new_path: String, is_folder: bool },
    Modified { path: String, is_folder: bool },
    Opened { path: String },
    LayoutChanged,
}

/// What a lifecycle event leads to once it has been folded into [`RefreshState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Ignored,
    /// The pending new-document path was recorded or moved.
    Tracked,
    /// After settling: substitute placeholders in this document, then refresh previews.
    SubstituteDocument(String),
    /// After settling: refresh previews.
    RefreshPreviews,
}

/// Process-wide scheduling state, mutated only by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RefreshState {
    /// Freshly created document still waiting for its first write.
    pub pending_path: Option<String>,
    /// The missing-configuration warning was already shown.
    pub config_warned: bool,
    pub interval: RefreshInterval,
}

/// Settle delays applied before acting on lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleDelays {
    pub modified: Duration,
    pub opened: Duration,
    pub layout: Duration,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            modified: Duration::from_secs(1),
            opened: Duration::from_secs(1),
            layout: Duration::from_secs(2),
        }
    }
}

/// Result of one status strip refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusRefresh {
    Disabled,
    ConfigMissing,
    Rendered(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerAction {
    Insert(SlotId),
    ReplaceAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerEntry {
    pub label: String,
    pub detail: String,
    pub action: PickerAction,
}

/// Chooser contents, rendered against a single snapshot when opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picker {
    pub entries: Vec<PickerEntry>,
    rendered: Vec<(SlotId, String)>,
}

impl Picker {
    fn rendered(&self, slot: SlotId) -> Option<&str> {
        self.rendered
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, text)| text.as_str())
    }
}

pub struct RefreshOrchestrator {
    settings: RwLock<Settings>,
    state: Mutex<RefreshState>,
    fetcher: Arc<dyn WeatherFetcher>,
    host: Arc<dyn DocumentHost>,
    status: Arc<dyn StatusSurface>,
    delays: SettleDelays,
    document_settle: SettleDebouncer,
    preview_settle: SettleDebouncer,
}

impl std::fmt::Debug for RefreshOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshOrchestrator")
            .field("state", &*self.state.lock())
            .field("fetcher", &self.fetcher)
            .field("delays", &self.delays)
            .finish_non_exhaustive()
    }
}

impl RefreshOrchestrator {
    pub fn new(
        settings: Settings,
        fetcher: Arc<dyn WeatherFetcher>,
        host: Arc<dyn DocumentHost>,
        status: Arc<dyn StatusSurface>,
    ) -> Self {
        let state = RefreshState { interval: settings.update_frequency, ..RefreshState::default() };
        Self {
            settings: RwLock::new(settings),
            state: Mutex::new(state),
            fetcher,
            host,
            status,
            delays: SettleDelays::default(),
            document_settle: SettleDebouncer::new("document"),
            preview_settle: SettleDebouncer::new("preview"),
        }
    }

    pub fn with_delays(mut self, delays: SettleDelays) -> Self {
        self.delays = delays;
        self
    }

    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Replace the settings; the missing-configuration warning may show again.
    pub fn update_settings(&self, settings: Settings) {
        let mut state = self.state.lock();
        state.config_warned = false;
        state.interval = settings.update_frequency;
        *self.settings.write() = settings;
    }

    pub fn state(&self) -> RefreshState {
        self.state.lock().clone()
    }

    /// Fold one lifecycle event into the pending-path state machine.
    pub fn transition(&self, event: &LifecycleEvent) -> Reaction {
        let mut state = self.state.lock();
        match event {
            LifecycleEvent::Created { is_folder: true, .. }
            | LifecycleEvent::Renamed { is_folder: true, .. }
            | LifecycleEvent::Modified { is_folder: true, .. } => Reaction::Ignored,
            LifecycleEvent::Created { path, .. } => {
                state.pending_path = Some(path.clone());
                Reaction::Tracked
            }
            LifecycleEvent::Renamed { old_path, new_path, .. } => {
                if state.pending_path.as_deref() == Some(old_path.as_str()) {
                    state.pending_path = Some(new_path.clone());
                    Reaction::Tracked
                } else {
                    Reaction::Ignored
                }
            }
            LifecycleEvent::Modified { path, .. } => {
                if state.pending_path.as_deref() == Some(path.as_str()) {
                    state.pending_path = None;
                    Reaction::SubstituteDocument(path.clone())
                } else {
                    Reaction::Ignored
                }
            }
            LifecycleEvent::Opened { .. } | LifecycleEvent::LayoutChanged => {
                Reaction::RefreshPreviews
            }
        }
    }

    /// Apply `event` and schedule its follow-up work behind the settle delay.
    ///
    /// A newer event for the same document (or, for previews, the same view)
    /// preempts a follow-up that is still waiting.
    pub fn dispatch(self: &Arc<Self>, event: LifecycleEvent) -> Option<JoinHandle<()>> {
        let reaction = self.transition(&event);
        debug!(?event, ?reaction, "lifecycle event");

        match reaction {
            Reaction::Ignored | Reaction::Tracked => None,
            Reaction::SubstituteDocument(path) => {
                let this = Arc::clone(self);
                let key = path.clone();
                Some(self.document_settle.schedule(key, self.delays.modified, async move {
                    this.settle_new_document(&path).await;
                }))
            }
            Reaction::RefreshPreviews => {
                let delay = match event {
                    LifecycleEvent::LayoutChanged => self.delays.layout,
                    _ => self.delays.opened,
                };
                let this = Arc::clone(self);
                Some(self.preview_settle.schedule("view", delay, async move {
                    this.refresh_previews().await;
                }))
            }
        }
    }

    async fn settle_new_document(&self, path: &str) {
        self.substitute_document(path).await;
        self.refresh_previews().await;
    }

    /// Refresh the status strip and mounted previews every configured interval
    /// until `shutdown` fires. The first refresh happens immediately.
    pub async fn run_timer(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            self.refresh_status_strip().await;
            self.refresh_previews().await;

            let interval = self.state.lock().interval.as_duration();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.document_settle.cancel();
        self.preview_settle.cancel();
        info!("refresh timer stopped");
    }

    async fn fetch_snapshot(&self, settings: &Settings) -> Result<WeatherSnapshot, FetchError> {
        let request = settings
            .fetch_request()
            .map_err(|_| FetchError::MissingCredentials)?;
        self.fetcher.fetch(&request).await
    }

    pub async fn refresh_status_strip(&self) -> StatusRefresh {
        let settings = self.settings();

        if !settings.statusbar_active {
            self.status.clear();
            return StatusRefresh::Disabled;
        }

        if !settings.has_credentials() {
            self.status.clear();
            let first_warning = !std::mem::replace(&mut self.state.lock().config_warned, true);
            if first_warning {
                warn!("weather settings are undefined");
                self.host.notify(&CommandError::ConfigMissing.notice());
            }
            return StatusRefresh::ConfigMissing;
        }

        let outcome = self.fetch_snapshot(&settings).await;
        let text = render_outcome(&outcome, &settings.statusbar_format);
        self.status.set_text(&text);
        StatusRefresh::Rendered(text)
    }

    /// Overwrite every mounted preview marker; returns how many were written.
    pub async fn refresh_previews(&self) -> usize {
        if self.host.view_mode() != Some(ViewMode::Preview) {
            return 0;
        }

        let markers = self.host.preview_markers();
        if markers.is_empty() {
            return 0;
        }

        let settings = self.settings();
        let outcome = self.fetch_snapshot(&settings).await;
        for slot in &markers {
            self.host.write_preview(*slot, &render_outcome(&outcome, settings.format(*slot)));
        }

        debug!(count = markers.len(), "preview markers refreshed");
        markers.len()
    }

    /// Replace every `%weatherN%` placeholder in the active document.
    ///
    /// Returns how many slots were substituted.
    pub async fn replace_template_strings(&self) -> Result<usize, CommandError> {
        self.substitute_active_document()
            .await
            .map_err(|e| self.report(e))
    }

    async fn substitute_active_document(&self) -> Result<usize, CommandError> {
        let document = self
            .host
            .active_document()
            .ok_or(CommandError::NoActiveDocument)?;
        Ok(self.substitute_document(&document.path).await)
    }

    /// Sweep the document at `path`; returns how many slots were substituted.
    async fn substitute_document(&self, path: &str) -> usize {
        let Some(document) = self.host.read_document(path) else {
            debug!(path, "document is gone, nothing to substitute");
            return 0;
        };
        let settings = self.settings();

        if document.is_in_folder(&settings.template_folder) {
            debug!(path, "document is a template, leaving placeholders alone");
            return 0;
        }

        let slots: Vec<SlotId> = settings
            .configured_slots()
            .filter(|slot| {
                slot.placeholder()
                    .is_some_and(|placeholder| document.text.contains(placeholder))
            })
            .collect();
        if slots.is_empty() {
            return 0;
        }

        let outcome = self.fetch_snapshot(&settings).await;
        let rendered: Vec<(SlotId, String)> = slots
            .into_iter()
            .map(|slot| (slot, render_outcome(&outcome, settings.format(slot))))
            .collect();

        self.apply_to_document(path, &rendered)
    }

    fn apply_to_document(&self, path: &str, rendered: &[(SlotId, String)]) -> usize {
        // Re-read: the document may have changed while the fetch was in flight.
        let Some(document) = self.host.read_document(path) else {
            return 0;
        };

        let (text, count) = apply_rendered(&document.text, rendered);
        if count > 0 {
            self.host.write_document(path, &text);
            info!(path, count, "template placeholders replaced");
        }
        count
    }

    /// Render one format and insert it at the cursor of the active document.
    pub async fn insert_format(&self, slot: SlotId) -> Result<String, CommandError> {
        let settings = self.settings();
        self.require_source_view().map_err(|e| self.report(e))?;

        let template = settings.format(slot);
        if template.is_empty() {
            return Err(self.report(CommandError::FormatUndefined(slot)));
        }

        let outcome = self.fetch_snapshot(&settings).await;
        let text = render_outcome(&outcome, template);
        self.host.replace_selection(&text);
        Ok(text)
    }

    /// Build the chooser: every configured format pre-rendered, plus replace-all.
    pub async fn open_picker(&self) -> Result<Picker, CommandError> {
        self.require_source_view().map_err(|e| self.report(e))?;

        let settings = self.settings();
        let slots: Vec<SlotId> = settings.configured_slots().collect();
        let rendered: Vec<(SlotId, String)> = if slots.is_empty() {
            Vec::new()
        } else {
            let outcome = self.fetch_snapshot(&settings).await;
            slots
                .into_iter()
                .map(|slot| (slot, render_outcome(&outcome, settings.format(slot))))
                .collect()
        };

        let mut entries: Vec<PickerEntry> = rendered
            .iter()
            .map(|(slot, text)| PickerEntry {
                label: format!("Insert Weather String - {slot}"),
                detail: text.clone(),
                action: PickerAction::Insert(*slot),
            })
            .collect();
        entries.push(PickerEntry {
            label: "Replace Template Strings".to_string(),
            detail: "Replace all occurrences of %weather1%, %weather2%, %weather3% and %weather4%\n\
                     in the current document."
                .to_string(),
            action: PickerAction::ReplaceAll,
        });

        Ok(Picker { entries, rendered })
    }

    /// Act on a chooser selection using the strings rendered when it opened.
    pub fn choose(&self, picker: &Picker, action: PickerAction) -> Result<usize, CommandError> {
        let document = self
            .host
            .active_document()
            .ok_or_else(|| self.report(CommandError::NoActiveDocument))?;

        match action {
            PickerAction::Insert(slot) => {
                let text = picker
                    .rendered(slot)
                    .ok_or_else(|| self.report(CommandError::FormatUndefined(slot)))?;
                self.host.replace_selection(text);
                Ok(1)
            }
            PickerAction::ReplaceAll => {
                if document.is_in_folder(&self.settings.read().template_folder) {
                    return Ok(0);
                }
                Ok(self.apply_to_document(&document.path, &picker.rendered))
            }
        }
    }

    fn require_source_view(&self) -> Result<(), CommandError> {
        if self.host.active_document().is_none() {
            return Err(CommandError::NoActiveDocument);
        }
        match self.host.view_mode() {
            Some(ViewMode::Source) => Ok(()),
            _ => Err(CommandError::SourceModeRequired),
        }
    }

    fn report(&self, error: CommandError) -> CommandError {
        self.host.notify(&error.notice());
        error
    }
}

/// Replace each slot's placeholder with its rendered text.
///
/// A slot applies when its lowercase placeholder is present; every
/// occurrence is then replaced regardless of ASCII case.
/// Returns the new text and how many slots applied.
pub fn apply_rendered(text: &str, rendered: &[(SlotId, String)]) -> (String, usize) {
    let mut out = text.to_string();
    let mut count = 0;

    for (slot, value) in rendered {
        let Some(placeholder) = slot.placeholder() else {
            continue;
        };
        if out.contains(placeholder) {
            out = replace_ignore_ascii_case(&out, placeholder, value);
            count += 1;
        }
    }

    (out, count)
}

fn replace_ignore_ascii_case(text: &str, needle: &str, with: &str) -> String {
    // ASCII lowercasing keeps byte offsets, so matches index `text` directly.
    let haystack = text.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (idx, _) in haystack.match_indices(&needle) {
        out.push_str(&text[last..idx]);
        out.push_str(with);
        last = idx + needle.len();
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{FetchRequest, UnitSystem},
        host::ActiveDocument,
        model::tests::raw_observation,
        template::UNAVAILABLE_MESSAGE,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::{
        collections::BTreeMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    #[derive(Debug, Default)]
    struct FakeFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl FakeFetcher {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherFetcher for FakeFetcher {
        async fn fetch(&self, _request: &FetchRequest) -> Result<WeatherSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FetchError::MissingField("main"));
            }
            WeatherSnapshot::derive(&raw_observation(), UnitSystem::Metric, &Utc)
                .ok_or(FetchError::InvalidTimestamp)
        }
    }

    #[derive(Debug, Default)]
    struct HostState {
        document: Option<ActiveDocument>,
        /// Documents that exist but are not the active one.
        files: BTreeMap<String, String>,
        mode: Option<ViewMode>,
        writes: usize,
        inserted: Vec<String>,
        markers: Vec<SlotId>,
        previews: BTreeMap<SlotId, String>,
        notices: Vec<String>,
    }

    #[derive(Debug, Default)]
    struct FakeHost(Mutex<HostState>);

    impl FakeHost {
        fn with_document(path: &str, text: &str, mode: ViewMode) -> Self {
            let host = FakeHost::default();
            {
                let mut state = host.0.lock();
                state.document = Some(ActiveDocument { path: path.into(), text: text.into() });
                state.mode = Some(mode);
            }
            host
        }

        fn text(&self) -> String {
            self.0.lock().document.as_ref().map(|d| d.text.clone()).unwrap_or_default()
        }

        fn file(&self, path: &str) -> Option<String> {
            self.0.lock().files.get(path).cloned()
        }
    }

    impl DocumentHost for FakeHost {
        fn active_document(&self) -> Option<ActiveDocument> {
            self.0.lock().document.clone()
        }

        fn view_mode(&self) -> Option<ViewMode> {
            self.0.lock().mode
        }

        fn set_active_document_text(&self, text: &str) {
            let mut state = self.0.lock();
            state.writes += 1;
            if let Some(doc) = state.document.as_mut() {
                doc.text = text.to_string();
            }
        }

        fn read_document(&self, path: &str) -> Option<ActiveDocument> {
            let state = self.0.lock();
            match &state.document {
                Some(doc) if doc.path == path => Some(doc.clone()),
                _ => state
                    .files
                    .get(path)
                    .map(|text| ActiveDocument { path: path.into(), text: text.clone() }),
            }
        }

        fn write_document(&self, path: &str, text: &str) {
            let mut state = self.0.lock();
            state.writes += 1;
            match state.document.as_mut() {
                Some(doc) if doc.path == path => doc.text = text.to_string(),
                _ => {
                    state.files.insert(path.to_string(), text.to_string());
                }
            }
        }

        fn replace_selection(&self, text: &str) {
            self.0.lock().inserted.push(text.to_string());
        }

        fn preview_markers(&self) -> Vec<SlotId> {
            self.0.lock().markers.clone()
        }

        fn write_preview(&self, slot: SlotId, html: &str) {
            self.0.lock().previews.insert(slot, html.to_string());
        }

        fn notify(&self, message: &str) {
            self.0.lock().notices.push(message.to_string());
        }
    }

    #[derive(Debug, Default)]
    struct FakeStatus(Mutex<Vec<String>>);

    impl StatusSurface for FakeStatus {
        fn set_text(&self, text: &str) {
            self.0.lock().push(text.to_string());
        }
    }

    fn settings() -> Settings {
        Settings {
            location: "zocca".into(),
            api_key: "KEY".into(),
            format1: "%temp%C".into(),
            format2: "%desc%".into(),
            format3: String::new(),
            format4: "%name%".into(),
            statusbar_format: "| %desc% %temp%° |".into(),
            ..Settings::default()
        }
    }

    struct Fixture {
        orchestrator: Arc<RefreshOrchestrator>,
        fetcher: Arc<FakeFetcher>,
        host: Arc<FakeHost>,
        status: Arc<FakeStatus>,
    }

    fn fixture(settings: Settings, host: FakeHost, fetcher: FakeFetcher) -> Fixture {
        let fetcher = Arc::new(fetcher);
        let host = Arc::new(host);
        let status = Arc::new(FakeStatus::default());
        let orchestrator = Arc::new(RefreshOrchestrator::new(
            settings,
            fetcher.clone(),
            host.clone(),
            status.clone(),
        ));
        Fixture { orchestrator, fetcher, host, status }
    }

    fn created(path: &str) -> LifecycleEvent {
        LifecycleEvent::Created { path: path.into(), is_folder: false }
    }

    fn modified(path: &str) -> LifecycleEvent {
        LifecycleEvent::Modified { path: path.into(), is_folder: false }
    }

    fn renamed(old: &str, new: &str) -> LifecycleEvent {
        LifecycleEvent::Renamed { old_path: old.into(), new_path: new.into(), is_folder: false }
    }

    #[test]
    fn modify_of_untracked_path_changes_nothing() {
        let f = fixture(settings(), FakeHost::default(), FakeFetcher::default());
        f.orchestrator.transition(&created("a.md"));
        let before = f.orchestrator.state();

        assert_eq!(f.orchestrator.transition(&modified("other.md")), Reaction::Ignored);
        assert_eq!(f.orchestrator.state(), before);
    }

    #[test]
    fn folder_events_are_ignored() {
        let f = fixture(settings(), FakeHost::default(), FakeFetcher::default());
        let folder = LifecycleEvent::Created { path: "Journal".into(), is_folder: true };

        assert_eq!(f.orchestrator.transition(&folder), Reaction::Ignored);
        assert_eq!(f.orchestrator.state().pending_path, None);
    }

    #[test]
    fn rename_of_other_file_keeps_pending_path() {
        let f = fixture(settings(), FakeHost::default(), FakeFetcher::default());
        f.orchestrator.transition(&created("a.md"));

        assert_eq!(f.orchestrator.transition(&renamed("x.md", "y.md")), Reaction::Ignored);
        assert_eq!(f.orchestrator.state().pending_path.as_deref(), Some("a.md"));
    }

    #[test]
    fn pending_path_is_consumed_once() {
        let f = fixture(settings(), FakeHost::default(), FakeFetcher::default());
        f.orchestrator.transition(&created("a.md"));

        assert_eq!(
            f.orchestrator.transition(&modified("a.md")),
            Reaction::SubstituteDocument("a.md".into())
        );
        assert_eq!(f.orchestrator.state().pending_path, None);
        assert_eq!(f.orchestrator.transition(&modified("a.md")), Reaction::Ignored);
    }

    #[tokio::test(start_paused = true)]
    async fn create_rename_modify_substitutes_once() {
        let host = FakeHost::with_document("b.md", "Weather: %weather1%", ViewMode::Source);
        let f = fixture(settings(), host, FakeFetcher::default());

        assert!(f.orchestrator.dispatch(created("a.md")).is_none());
        assert!(f.orchestrator.dispatch(renamed("a.md", "b.md")).is_none());
        let task = f.orchestrator.dispatch(modified("b.md")).expect("substitution scheduled");
        assert!(f.orchestrator.dispatch(modified("b.md")).is_none());

        task.await.expect("settle task completes");

        assert_eq!(f.host.text(), "Weather: 15C");
        assert_eq!(f.host.0.lock().writes, 1);
        assert_eq!(f.fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn substitution_waits_for_settle_delay() {
        let host = FakeHost::with_document("a.md", "%weather1%", ViewMode::Source);
        let f = fixture(settings(), host, FakeFetcher::default());

        f.orchestrator.dispatch(created("a.md"));
        let task = f.orchestrator.dispatch(modified("a.md")).expect("scheduled");

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(f.host.text(), "%weather1%");

        task.await.expect("settle task completes");
        assert_eq!(f.host.text(), "15C");
    }

    #[tokio::test(start_paused = true)]
    async fn substitution_targets_the_settled_path() {
        let host = FakeHost::with_document("old.md", "O %weather1%", ViewMode::Source);
        host.0.lock().files.insert("new.md".into(), "N %weather1%".into());
        let f = fixture(settings(), host, FakeFetcher::default());

        f.orchestrator.dispatch(created("new.md"));
        let task = f.orchestrator.dispatch(modified("new.md")).expect("scheduled");
        task.await.expect("settle task completes");

        assert_eq!(f.host.file("new.md").as_deref(), Some("N 15C"));
        assert_eq!(f.host.text(), "O %weather1%");
    }

    #[tokio::test(start_paused = true)]
    async fn separate_new_documents_do_not_preempt_each_other() {
        let host = FakeHost::default();
        {
            let mut state = host.0.lock();
            state.files.insert("a.md".into(), "A %weather1%".into());
            state.files.insert("b.md".into(), "B %weather1%".into());
        }
        let f = fixture(settings(), host, FakeFetcher::default());

        f.orchestrator.dispatch(created("a.md"));
        let first = f.orchestrator.dispatch(modified("a.md")).expect("scheduled");
        f.orchestrator.dispatch(created("b.md"));
        let second = f.orchestrator.dispatch(modified("b.md")).expect("scheduled");
        first.await.expect("settle task completes");
        second.await.expect("settle task completes");

        assert_eq!(f.host.file("a.md").as_deref(), Some("A 15C"));
        assert_eq!(f.host.file("b.md").as_deref(), Some("B 15C"));
        assert_eq!(f.fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_open_events_refresh_previews_once() {
        let host = FakeHost::with_document("a.md", "", ViewMode::Preview);
        host.0.lock().markers = vec![SlotId::Format2];
        let f = fixture(settings(), host, FakeFetcher::default());

        let first = f.orchestrator.dispatch(LifecycleEvent::Opened { path: "a.md".into() });
        let second = f.orchestrator.dispatch(LifecycleEvent::LayoutChanged);
        first.expect("scheduled").await.expect("completes");
        second.expect("scheduled").await.expect("completes");

        assert_eq!(f.fetcher.calls(), 1);
        assert_eq!(f.host.0.lock().previews.get(&SlotId::Format2).map(String::as_str), Some("Light Rain"));
    }

    #[tokio::test]
    async fn replace_fetches_once_for_all_slots() {
        let host = FakeHost::with_document(
            "Journal/today.md",
            "%weather1% | %weather2% | %weather2% | %weather3% | %weather9%",
            ViewMode::Source,
        );
        let f = fixture(settings(), host, FakeFetcher::default());

        let count = f.orchestrator.replace_template_strings().await.expect("replaced");

        assert_eq!(count, 2);
        assert_eq!(f.fetcher.calls(), 1);
        assert_eq!(f.host.text(), "15C | Light Rain | Light Rain | %weather3% | %weather9%");
    }

    #[tokio::test]
    async fn replace_without_placeholders_does_not_fetch() {
        let host = FakeHost::with_document("a.md", "plain text", ViewMode::Source);
        let f = fixture(settings(), host, FakeFetcher::default());

        assert_eq!(f.orchestrator.replace_template_strings().await, Ok(0));
        assert_eq!(f.fetcher.calls(), 0);
        assert_eq!(f.host.0.lock().writes, 0);
    }

    #[tokio::test]
    async fn template_folder_is_left_alone() {
        let host = FakeHost::with_document("Templates/daily.md", "%weather1%", ViewMode::Source);
        let f = fixture(settings(), host, FakeFetcher::default());

        assert_eq!(f.orchestrator.replace_template_strings().await, Ok(0));
        assert_eq!(f.host.text(), "%weather1%");
    }

    #[tokio::test]
    async fn failed_fetch_inserts_error_text() {
        let host = FakeHost::with_document("a.md", "> %weather1%", ViewMode::Source);
        let f = fixture(settings(), host, FakeFetcher { fail: true, ..Default::default() });

        f.orchestrator.replace_template_strings().await.expect("handled locally");
        assert_eq!(f.host.text(), format!("> {UNAVAILABLE_MESSAGE}"));
    }

    #[tokio::test]
    async fn replace_without_document_notifies() {
        let f = fixture(settings(), FakeHost::default(), FakeFetcher::default());

        let err = f.orchestrator.replace_template_strings().await.unwrap_err();
        assert_eq!(err, CommandError::NoActiveDocument);
        assert_eq!(f.host.0.lock().notices, vec!["Open a Markdown file first.".to_string()]);
    }

    #[tokio::test]
    async fn insert_format_places_rendered_text_at_cursor() {
        let host = FakeHost::with_document("a.md", "", ViewMode::Source);
        let f = fixture(settings(), host, FakeFetcher::default());

        let text = f.orchestrator.insert_format(SlotId::Format4).await.expect("inserted");
        assert_eq!(text, "Zocca");
        assert_eq!(f.host.0.lock().inserted, vec!["Zocca".to_string()]);
    }

    #[tokio::test]
    async fn insert_undefined_format_is_rejected() {
        let host = FakeHost::with_document("a.md", "", ViewMode::Source);
        let f = fixture(settings(), host, FakeFetcher::default());

        let err = f.orchestrator.insert_format(SlotId::Format3).await.unwrap_err();
        assert_eq!(err, CommandError::FormatUndefined(SlotId::Format3));
        assert_eq!(f.fetcher.calls(), 0);
        assert_eq!(f.host.0.lock().notices.len(), 1);
    }

    #[tokio::test]
    async fn insert_requires_source_mode() {
        let host = FakeHost::with_document("a.md", "", ViewMode::Preview);
        let f = fixture(settings(), host, FakeFetcher::default());

        let err = f.orchestrator.insert_format(SlotId::Format1).await.unwrap_err();
        assert_eq!(err, CommandError::SourceModeRequired);
    }

    #[tokio::test]
    async fn previews_only_refresh_in_preview_mode() {
        let host = FakeHost::with_document("a.md", "", ViewMode::Source);
        host.0.lock().markers = vec![SlotId::Format1, SlotId::Format4];
        let f = fixture(settings(), host, FakeFetcher::default());

        assert_eq!(f.orchestrator.refresh_previews().await, 0);
        assert_eq!(f.fetcher.calls(), 0);

        f.host.0.lock().mode = Some(ViewMode::Preview);
        assert_eq!(f.orchestrator.refresh_previews().await, 2);
        assert_eq!(f.fetcher.calls(), 1);

        let previews = f.host.0.lock().previews.clone();
        assert_eq!(previews.get(&SlotId::Format1).map(String::as_str), Some("15C"));
        assert_eq!(previews.get(&SlotId::Format4).map(String::as_str), Some("Zocca"));
    }

    #[tokio::test]
    async fn status_strip_renders_status_format() {
        let f = fixture(settings(), FakeHost::default(), FakeFetcher::default());

        let outcome = f.orchestrator.refresh_status_strip().await;
        assert_eq!(outcome, StatusRefresh::Rendered("| Light Rain 15° |".into()));
        assert_eq!(*f.status.0.lock(), vec!["| Light Rain 15° |".to_string()]);
    }

    #[tokio::test]
    async fn disabled_status_strip_is_cleared_without_fetching() {
        let settings = Settings { statusbar_active: false, ..settings() };
        let f = fixture(settings, FakeHost::default(), FakeFetcher::default());

        assert_eq!(f.orchestrator.refresh_status_strip().await, StatusRefresh::Disabled);
        assert_eq!(*f.status.0.lock(), vec![String::new()]);
        assert_eq!(f.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn missing_config_warns_once_until_settings_change() {
        let unset = Settings { api_key: String::new(), ..settings() };
        let f = fixture(unset.clone(), FakeHost::default(), FakeFetcher::default());

        for _ in 0..3 {
            assert_eq!(f.orchestrator.refresh_status_strip().await, StatusRefresh::ConfigMissing);
        }
        assert_eq!(f.host.0.lock().notices.len(), 1);
        assert_eq!(f.fetcher.calls(), 0);
        assert!(f.status.0.lock().iter().all(String::is_empty));

        f.orchestrator.update_settings(unset);
        f.orchestrator.refresh_status_strip().await;
        assert_eq!(f.host.0.lock().notices.len(), 2);
    }

    #[tokio::test]
    async fn picker_lists_configured_formats_and_replace_all() {
        let host = FakeHost::with_document("a.md", "%weather1% %weather4%", ViewMode::Source);
        let f = fixture(settings(), host, FakeFetcher::default());

        let picker = f.orchestrator.open_picker().await.expect("picker opens");
        let labels: Vec<&str> = picker.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Insert Weather String - Format 1",
                "Insert Weather String - Format 2",
                "Insert Weather String - Format 4",
                "Replace Template Strings",
            ]
        );
        assert_eq!(picker.entries[0].detail, "15C");

        assert_eq!(f.orchestrator.choose(&picker, PickerAction::ReplaceAll), Ok(2));
        assert_eq!(f.host.text(), "15C Zocca");

        f.orchestrator
            .choose(&picker, PickerAction::Insert(SlotId::Format2))
            .expect("inserted");
        assert_eq!(f.host.0.lock().inserted, vec!["Light Rain".to_string()]);
        assert_eq!(f.fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_refreshes_every_interval() {
        let settings = Settings { update_frequency: RefreshInterval::EveryMinute, ..settings() };
        let f = fixture(settings, FakeHost::default(), FakeFetcher::default());
        let shutdown = CancellationToken::new();

        let timer = tokio::spawn(f.orchestrator.clone().run_timer(shutdown.clone()));
        tokio::time::sleep(Duration::from_secs(150)).await;
        shutdown.cancel();
        timer.await.expect("timer stops");

        assert_eq!(f.status.0.lock().len(), 3);
        assert_eq!(f.fetcher.calls(), 3);
    }

    #[test]
    fn apply_rendered_counts_present_placeholders() {
        let rendered = vec![
            (SlotId::Format1, "one".to_string()),
            (SlotId::Format2, "two".to_string()),
        ];
        let (text, count) = apply_rendered("%weather2% and %weather2%", &rendered);
        assert_eq!(text, "two and two");
        assert_eq!(count, 1);
    }

    #[test]
    fn placeholders_match_any_case_once_lowercase_is_present() {
        let rendered = vec![(SlotId::Format1, "15C".to_string())];

        let (text, count) = apply_rendered("%weather1% and %WEATHER1% and %Weather1%", &rendered);
        assert_eq!(text, "15C and 15C and 15C");
        assert_eq!(count, 1);

        let (text, count) = apply_rendered("%WEATHER1%", &rendered);
        assert_eq!(text, "%WEATHER1%");
        assert_eq!(count, 0);
    }
}
