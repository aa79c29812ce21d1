//! Capture session: lifecycle, the ordered log and its queries
//!
//! A [`Session`] owns everything a capture needs: configuration, the record
//! log, the race window and the running tally. Interceptors installed by
//! [`Session::start`] hold only a weak reference to the session's core, so
//! dropping the session turns them into pass-throughs.
//!
//! All mutation of the log goes through one mutex. Initiator derivation,
//! classification, the window check, the push and the window update happen
//! inside a single acquisition; listeners are notified after it is released.

use crate::classify::{finding, Classifier, RaceSignal};
use crate::config::CaptureConfig;
use crate::context::{
    BacktraceCapture, FrameScanInitiator, InitiatorStrategy, StackCapture, NO_STACK,
};
use crate::curl_output;
use crate::error::{Result, SondaError};
use crate::export::{self, ExportFormat};
use crate::filter::RecordFilter;
use crate::overlay::Overlay;
use crate::race::RaceCorrelator;
use crate::record::{CapturedRequest, Tag, TagSet, TransportKind};
use crate::table;
use crate::transport::{self, TransportHost, Transports};
use regex::Regex;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Running counters handed to listeners on every appended record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub total: usize,
    pub auth: usize,
    pub input: usize,
    pub error: usize,
    pub race: usize,
}

impl Tally {
    fn count(&mut self, record: &CapturedRequest) {
        self.total += 1;
        if record.tags.contains(Tag::Auth) {
            self.auth += 1;
        }
        if record.tags.contains(Tag::Input) {
            self.input += 1;
        }
        if record.tags.contains(Tag::Error) {
            self.error += 1;
        }
        if record.tags.contains(Tag::Async) {
            self.race += 1;
        }
    }
}

/// Boundary consumer of session events
pub trait SessionListener: Send + Sync {
    fn on_record(&self, record: &CapturedRequest, tally: &Tally);

    /// A persistent-connection record changed state
    fn on_update(&self, _record: &CapturedRequest) {}

    fn on_clear(&self) {}
}

/// Handle returned by [`Session::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Lifecycle states of a persistent connection record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
    Error(String),
}

impl ConnectionState {
    pub fn status_text(&self) -> &'static str {
        match self {
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
            ConnectionState::Error(_) => "error",
        }
    }
}

struct LogState {
    records: Vec<CapturedRequest>,
    window: RaceCorrelator,
    tally: Tally,
    next_id: u64,
}

/// Shared state behind a session, reachable from interceptors
pub(crate) struct Core {
    config: CaptureConfig,
    classifier: Classifier,
    stack: Box<dyn StackCapture>,
    initiator: Box<dyn InitiatorStrategy>,
    base_url: Option<Url>,
    epoch: Instant,
    running: AtomicBool,
    state: Mutex<LogState>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn SessionListener>)>>,
    next_listener: AtomicU64,
}

impl Core {
    /// Upgrade an interceptor's handle, but only while capture is running
    pub(crate) fn active(core: &Weak<Core>) -> Option<Arc<Core>> {
        core.upgrade().filter(|core| core.is_running())
    }

    pub(crate) fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Milliseconds since the session was created
    pub(crate) fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    /// Absolute form of `raw`, or `raw` itself when it cannot be resolved
    pub(crate) fn resolve_url(&self, raw: &str) -> String {
        match Url::parse(raw) {
            Ok(url) => url.to_string(),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url
                .as_ref()
                .and_then(|base| base.join(raw).ok())
                .map(|url| url.to_string())
                .unwrap_or_else(|| raw.to_string()),
            Err(_) => raw.to_string(),
        }
    }

    /// Partial record with every call-time field filled in
    ///
    /// The stack is captured first, before anything else runs.
    pub(crate) fn partial(
        &self,
        kind: TransportKind,
        method: &str,
        url: &str,
        headers: std::collections::BTreeMap<String, String>,
        body: Option<&crate::body::RequestBody>,
    ) -> CapturedRequest {
        let stack = catch_unwind(AssertUnwindSafe(|| self.stack.capture())).unwrap_or_else(|_| {
            warn!("stack capture panicked");
            None
        });

        let mut record = CapturedRequest::new(kind, method, self.resolve_url(url));
        record.stack_trace = stack;
        record.monotonic_start = self.now_ms();
        record.request_headers = headers;
        if let Some(body) = body {
            record.request_body_preview = body.preview(self.config.body_limit);
        }
        record
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn derive_initiator(&self, stack: Option<&str>) -> String {
        catch_unwind(AssertUnwindSafe(|| self.initiator.derive(stack))).unwrap_or_else(|_| {
            warn!("initiator derivation panicked");
            NO_STACK.to_string()
        })
    }

    /// Classify a finalized record and push it onto the log
    pub(crate) fn append(&self, mut record: CapturedRequest) -> u64 {
        let tally = {
            let mut state = self.lock();
            record.id = state.next_id;
            state.next_id += 1;
            record.initiator = self.derive_initiator(record.stack_trace.as_deref());
            record.reset_classification();
            self.classifier
                .classify_with_window(&mut record, &mut state.window);
            state.tally.count(&record);
            state.records.push(record.clone());
            state.tally
        };

        debug!(
            id = record.id,
            kind = %record.transport_kind,
            method = %record.method,
            url = %record.url,
            tags = %record.tags.joined(),
            "captured"
        );
        self.notify(|listener| listener.on_record(&record, &tally));
        record.id
    }

    /// Push a lightweight message entry, tagged as event traffic only
    pub(crate) fn append_event(&self, mut record: CapturedRequest) -> u64 {
        let tally = {
            let mut state = self.lock();
            record.id = state.next_id;
            state.next_id += 1;
            record.reset_classification();
            record.tags.insert(Tag::Events);
            record.findings.push(finding(Tag::Events).to_string());
            state.records.push(record.clone());
            state.tally
        };

        debug!(id = record.id, method = %record.method, url = %record.url, "message");
        self.notify(|listener| listener.on_record(&record, &tally));
        record.id
    }

    /// Move a persistent-connection record to a new state
    ///
    /// Returns false when the record is gone, e.g. after a clear.
    pub(crate) fn update_connection(&self, id: u64, state: ConnectionState) -> bool {
        let updated = {
            let mut log = self.lock();
            let Ok(index) = log.records.binary_search_by_key(&id, |r| r.id) else {
                return false;
            };
            let record = &mut log.records[index];
            if record.transport_kind != TransportKind::Socket {
                return false;
            }
            record.status_text = state.status_text().to_string();
            match state {
                ConnectionState::Open => record.status = 101,
                ConnectionState::Error(text) => record.error_text = Some(text),
                ConnectionState::Closing | ConnectionState::Closed => {}
            }
            record.clone()
        };

        debug!(id, state = %updated.status_text, "connection state");
        self.notify(|listener| listener.on_update(&updated));
        true
    }

    fn notify(&self, event: impl Fn(&dyn SessionListener)) {
        let listeners: Vec<Arc<dyn SessionListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| event(listener.as_ref()))).is_err() {
                warn!("session listener panicked");
            }
        }
    }
}

struct Installed {
    host: Arc<TransportHost>,
    originals: Transports,
    overlay: Option<(ListenerId, Arc<Overlay>)>,
}

/// Configures the pluggable pieces of a [`Session`]
pub struct SessionBuilder {
    config: CaptureConfig,
    stack: Box<dyn StackCapture>,
    initiator: Box<dyn InitiatorStrategy>,
}

impl SessionBuilder {
    pub fn stack_capture(mut self, capture: impl StackCapture + 'static) -> Self {
        self.stack = Box::new(capture);
        self
    }

    pub fn initiator(mut self, strategy: impl InitiatorStrategy + 'static) -> Self {
        self.initiator = Box::new(strategy);
        self
    }

    pub fn build(self) -> Result<Session> {
        self.config.validate()?;
        let base_url = match &self.config.base_url {
            Some(base) => Some(Url::parse(base).map_err(|e| SondaError::Config(e.to_string()))?),
            None => None,
        };

        let core = Core {
            classifier: Classifier::from_config(&self.config),
            state: Mutex::new(LogState {
                records: Vec::new(),
                window: RaceCorrelator::new(self.config.race_window_ms),
                tally: Tally::default(),
                next_id: 1,
            }),
            config: self.config,
            stack: self.stack,
            initiator: self.initiator,
            base_url,
            epoch: Instant::now(),
            running: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        };

        Ok(Session {
            core: Arc::new(core),
            installed: Mutex::new(None),
        })
    }
}

/// A capture session
///
/// # Example
///
/// ```
/// use sonda::{CaptureConfig, Session};
///
/// let session = Session::new(CaptureConfig::quiet()).unwrap();
/// assert!(!session.is_running());
/// assert!(session.is_empty());
/// ```
pub struct Session {
    core: Arc<Core>,
    installed: Mutex<Option<Installed>>,
}

impl Session {
    /// Session with backtrace-based stack capture and frame-scan initiators
    pub fn new(config: CaptureConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: CaptureConfig) -> SessionBuilder {
        let marker = config.own_marker.clone();
        SessionBuilder {
            config,
            stack: Box::new(BacktraceCapture),
            initiator: Box::new(FrameScanInitiator::new(marker)),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.core.config
    }

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn installed(&self) -> MutexGuard<'_, Option<Installed>> {
        self.installed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install interceptors into `host` and begin capturing
    ///
    /// Returns false, and changes nothing, when capture is already running.
    pub fn start(&self, host: &Arc<TransportHost>) -> bool {
        let mut installed = self.installed();
        if installed.is_some() {
            warn!("capture already running; start ignored");
            return false;
        }

        let originals = host.snapshot();
        let interceptors = transport::intercept(&originals, Arc::downgrade(&self.core));
        host.replace(interceptors);

        let overlay = if self.core.config.overlay {
            let overlay = Arc::new(Overlay::new());
            let id = self.subscribe(overlay.clone());
            Some((id, overlay))
        } else {
            None
        };

        *installed = Some(Installed {
            host: Arc::clone(host),
            originals,
            overlay,
        });
        self.core.running.store(true, Ordering::SeqCst);
        debug!("capture started");
        true
    }

    /// Restore the original transports and stop capturing
    ///
    /// Returns false when capture was not running.
    pub fn stop(&self) -> bool {
        let Some(installed) = self.installed().take() else {
            warn!("capture not running; stop ignored");
            return false;
        };

        self.core.running.store(false, Ordering::SeqCst);
        installed.host.replace(installed.originals);
        if let Some((id, overlay)) = installed.overlay {
            overlay.detach();
            self.unsubscribe(id);
        }
        debug!("capture stopped");
        true
    }

    /// Drop every record and reset counters; running state is unaffected
    pub fn clear(&self) {
        {
            let mut state = self.core.lock();
            state.records.clear();
            state.window.clear();
            state.tally = Tally::default();
        }
        self.core.notify(|listener| listener.on_clear());
    }

    /// Hand a finalized record to the session; returns its id
    pub fn append(&self, record: CapturedRequest) -> u64 {
        self.core.append(record)
    }

    pub fn subscribe(&self, listener: Arc<dyn SessionListener>) -> ListenerId {
        let id = ListenerId(self.core.next_listener.fetch_add(1, Ordering::SeqCst));
        self.core
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .core
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// The overlay attached by [`Session::start`], if any
    pub fn overlay(&self) -> Option<Arc<Overlay>> {
        self.installed()
            .as_ref()
            .and_then(|installed| installed.overlay.as_ref())
            .map(|(_, overlay)| Arc::clone(overlay))
    }

    pub fn records(&self) -> Vec<CapturedRequest> {
        self.core.lock().records.clone()
    }

    pub fn get(&self, index: usize) -> Option<CapturedRequest> {
        self.core.lock().records.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.core.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.lock().records.is_empty()
    }

    pub fn tally(&self) -> Tally {
        self.core.lock().tally
    }

    /// Console table of every non-message record
    pub fn table(&self) -> String {
        table::render_table(&self.records())
    }

    pub fn summary(&self) -> String {
        table::render_summary(&self.records())
    }

    /// Records whose URL matches `pattern`
    pub fn find(&self, pattern: &str) -> Result<Vec<CapturedRequest>> {
        let re = Regex::new(pattern)?;
        Ok(self
            .core
            .lock()
            .records
            .iter()
            .filter(|record| re.is_match(&record.url))
            .cloned()
            .collect())
    }

    pub fn find_by_tag(&self, tag: Tag) -> Vec<CapturedRequest> {
        self.core
            .lock()
            .records
            .iter()
            .filter(|record| record.tags.contains(tag))
            .cloned()
            .collect()
    }

    pub fn filter(&self, filter: &RecordFilter) -> Vec<CapturedRequest> {
        self.core
            .lock()
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect()
    }

    /// Re-run classification on the record at `index`
    ///
    /// Record-local rules are re-evaluated; the race verdict is carried over
    /// because the window it was judged against no longer exists. Message
    /// entries keep their event tagging.
    pub fn reclassify(&self, index: usize) -> Option<TagSet> {
        let mut state = self.core.lock();
        let Some(record) = state.records.get_mut(index) else {
            warn!(index, "no record at index");
            return None;
        };
        if record.is_message() {
            return Some(record.tags.clone());
        }

        let race = RaceSignal::from(record.tags.contains(Tag::Async));
        record.initiator = self.core.derive_initiator(record.stack_trace.as_deref());
        record.reset_classification();
        self.core.classifier.classify(record, race);
        Some(record.tags.clone())
    }

    pub fn tags(&self, index: usize) -> Option<TagSet> {
        let tags = self.core.lock().records.get(index).map(|r| r.tags.clone());
        if tags.is_none() {
            warn!(index, "no record at index");
        }
        tags
    }

    pub fn export(&self, format: ExportFormat) -> Result<String> {
        export::render(&self.records(), format)
    }

    /// cURL command reproducing the record at `index`
    pub fn curl(&self, index: usize) -> Result<String> {
        let record = self.get(index).ok_or(SondaError::NoRecord(index))?;
        curl_output::to_curl(&record)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.installed().is_some() {
            self.stop();
        }
    }
}
