//! Scan coordination: one open file, one background scan.
//!
//! The foreground owns a `Viewer`. Opening a file starts a scan thread that
//! fills the shared `LineIndex`; the foreground reads lines from its own
//! handle while the scan runs and calls `poll` on a timer to pick up the
//! completion report exactly once.

mod progress;
mod worker;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::ViewerConfig;
use crate::error::ViewError;
use crate::filter::{self, FilterOptions, FilterSummary};
use crate::index::{LineIndex, LineRecord, FLAG_MATCHED};
use crate::input::{self, BuiltinCharsets, CharsetTable, EncodingState, OpenMode};

pub use progress::ScanProgress;
pub use worker::{ScanError, ScanOutcome};

use worker::{ScanReport, ScanShared};

/// Lifecycle of the scan behind an open file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Completed,
    Stopped,
    Failed(String),
}

impl ScanState {
    pub fn is_scanning(&self) -> bool {
        matches!(self, ScanState::Scanning)
    }

    fn from_report(result: &Result<ScanOutcome, ScanError>) -> Self {
        match result {
            Ok(ScanOutcome::Completed) => ScanState::Completed,
            Ok(ScanOutcome::Stopped) => ScanState::Stopped,
            Err(e) => ScanState::Failed(e.to_string()),
        }
    }
}

/// Everything tied to one open of one file
struct Session {
    path: PathBuf,
    mode: OpenMode,
    /// Handle for on-demand line reads; the scan thread has its own
    file: File,
    shared: Arc<ScanShared>,
    worker: Option<JoinHandle<()>>,
    done: Receiver<ScanReport>,
    started: Instant,
    elapsed: Option<Duration>,
    state: ScanState,
    /// Code page fixed when the scan finished
    code_page: Option<u16>,
}

impl Session {
    fn finish(&mut self, report: Option<ScanReport>, config: &ViewerConfig) {
        self.state = match &report {
            Some(report) => ScanState::from_report(&report.result),
            None => ScanState::Failed("scan thread exited without a report".to_string()),
        };
        self.elapsed = Some(report.as_ref().map_or_else(|| self.started.elapsed(), |r| r.elapsed));

        let detected = self
            .shared
            .encoding
            .get()
            .map_or(config.default_code_page, |state| state.final_code_page(config.default_code_page));
        self.code_page = Some(config.code_page_override.unwrap_or(detected));

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Scan thread for '{}' panicked", self.path.display());
            }
        }

        let lines = report.map_or_else(|| self.shared.index.len(), |r| r.lines);
        match &self.state {
            ScanState::Failed(reason) => warn!(
                "Scan of '{}' failed after {} lines: {}",
                self.path.display(),
                lines,
                reason
            ),
            _ => info!("{} ({})", self.progress(), self.path.display()),
        }
    }

    fn progress(&self) -> ScanProgress {
        ScanProgress {
            lines: self.shared.index.len(),
            elapsed: self.elapsed.unwrap_or_else(|| self.started.elapsed()),
            stopped: self.state == ScanState::Stopped,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.index.clear();
        }
    }
}

/// Foreground handle on the open file and its scan
pub struct Viewer {
    config: ViewerConfig,
    charsets: Arc<dyn CharsetTable + Send + Sync>,
    session: Option<Session>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_charsets(config, Arc::new(BuiltinCharsets))
    }

    pub fn with_charsets(config: ViewerConfig, charsets: Arc<dyn CharsetTable + Send + Sync>) -> Self {
        Self {
            config,
            charsets,
            session: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Open `path` and start scanning it in the background.
    ///
    /// Rejected with `ScanInProgress` while a scan is running. If either
    /// handle cannot be opened the current session is left as it was.
    pub fn open(&mut self, path: &Path, mode: OpenMode) -> Result<(), ViewError> {
        if self.state().is_scanning() {
            return Err(ViewError::ScanInProgress);
        }

        let (file, scan_file) = input::open_pair(path)?;
        // Tear down the previous session before the new scan allocates
        self.session = None;

        let shared = Arc::new(ScanShared::default());
        let (tx, done) = mpsc::channel();
        let file_type = self.config.file_types.classify(path);
        let charsets = Arc::clone(&self.charsets);
        let default_code_page = self.config.default_code_page;
        let worker_shared = Arc::clone(&shared);
        let started = Instant::now();

        let worker = thread::Builder::new()
            .name("plainview-scan".to_string())
            .spawn(move || {
                let result = worker::run_scan(
                    scan_file,
                    mode,
                    file_type,
                    charsets.as_ref(),
                    default_code_page,
                    &worker_shared,
                );
                let report = ScanReport {
                    result,
                    lines: worker_shared.index.len(),
                    elapsed: started.elapsed(),
                };
                if tx.send(report).is_err() {
                    debug!("Scan finished after its session was closed");
                }
            })
            .map_err(|e| ViewError::io(e, path))?;

        debug!("Scanning '{}' as {:?} ({:?})", path.display(), mode, file_type);
        self.session = Some(Session {
            path: path.to_path_buf(),
            mode,
            file,
            shared,
            worker: Some(worker),
            done,
            started,
            elapsed: None,
            state: ScanState::Scanning,
            code_page: None,
        });
        Ok(())
    }

    /// Re-open the current file with the current mode
    pub fn refresh(&mut self) -> Result<(), ViewError> {
        let (path, mode) = {
            let session = self.session.as_ref().ok_or(ViewError::NotOpen)?;
            (session.path.clone(), session.mode)
        };
        self.open(&path, mode)
    }

    /// Close the file, waiting for any scan thread to exit
    pub fn close(&mut self) {
        self.session = None;
    }

    /// Ask a running scan to stop. No effect in any other state.
    pub fn stop(&self) {
        if let Some(session) = &self.session {
            if session.state.is_scanning() {
                session.shared.stop.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Check for the scan's completion report.
    ///
    /// Returns the terminal state on the one call that observes the
    /// transition, `None` on every other call.
    pub fn poll(&mut self) -> Option<ScanState> {
        let session = self.session.as_mut()?;
        if !session.state.is_scanning() {
            return None;
        }
        let report = match session.done.try_recv() {
            Ok(report) => Some(report),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => None,
        };
        session.finish(report, &self.config);
        Some(session.state.clone())
    }

    /// Block until the scan finishes, logging progress at the poll interval
    pub fn wait(&mut self) -> ScanState {
        let interval = self.config.poll_interval;
        let Some(session) = self.session.as_mut() else {
            return ScanState::Idle;
        };
        while session.state.is_scanning() {
            let report = match session.done.recv_timeout(interval) {
                Ok(report) => Some(report),
                Err(RecvTimeoutError::Timeout) => {
                    debug!("{}", session.progress());
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => None,
            };
            session.finish(report, &self.config);
        }
        session.state.clone()
    }

    pub fn state(&self) -> ScanState {
        self.session
            .as_ref()
            .map_or(ScanState::Idle, |session| session.state.clone())
    }

    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|session| session.path.as_path())
    }

    /// Record delimiter of the open file
    pub fn delimiter(&self) -> u8 {
        self.session
            .as_ref()
            .map_or(b'\n', |session| session.mode.delimiter)
    }

    /// Encoding facts, once the scan has established them
    pub fn encoding(&self) -> Option<&EncodingState> {
        self.session.as_ref()?.shared.encoding.get()
    }

    /// Lines indexed so far
    pub fn line_count(&self) -> usize {
        self.index().map_or(0, LineIndex::len)
    }

    pub fn progress(&self) -> Option<ScanProgress> {
        self.session.as_ref().map(Session::progress)
    }

    pub fn index(&self) -> Option<&LineIndex> {
        self.session.as_ref().map(|session| &session.shared.index)
    }

    pub fn record(&self, line: usize) -> Option<LineRecord> {
        self.index()?.get(line)
    }

    /// Code page used to display lines: the user's override, else the one
    /// fixed at completion, else the best guess so far
    pub fn code_page(&self) -> u16 {
        if let Some(code_page) = self.config.code_page_override {
            return code_page;
        }
        let default = self.config.default_code_page;
        match &self.session {
            Some(Session {
                code_page: Some(code_page),
                ..
            }) => *code_page,
            Some(session) => session
                .shared
                .encoding
                .get()
                .map_or(default, |state| state.final_code_page(default)),
            None => default,
        }
    }

    /// Name of the display code page, when it came from the file's content
    /// or the default label rather than a Unicode encoding or an override
    pub fn code_page_name(&self) -> Option<&str> {
        let code_page = self.code_page();
        self.encoding()?
            .code_page
            .as_ref()
            .filter(|info| info.code_page == code_page)
            .map(|info| info.name.as_str())
    }

    /// Read one line through the display handle and decode it, terminator
    /// removed
    pub fn read_line(&self, line: usize) -> Option<String> {
        let session = self.session.as_ref()?;
        let record = session.shared.index.get(line)?;
        input::transcode_line(&session.file, &record, self.code_page(), session.mode.delimiter)
    }

    /// Run the external filter and flag matching lines
    pub fn filter(&mut self, pattern: &str, options: &FilterOptions) -> Result<FilterSummary, ViewError> {
        let code_page = self.code_page();
        let session = self.session.as_ref().ok_or(ViewError::NotOpen)?;
        if session.state.is_scanning() {
            return Err(ViewError::ScanInProgress);
        }
        filter::run(
            &self.config,
            &session.path,
            &session.shared.index,
            pattern,
            options,
            session.mode.delimiter,
            code_page,
        )
    }

    /// Nearest matched line after or before `from`, wrapping around
    pub fn next_match(&self, from: usize, forward: bool) -> Option<usize> {
        self.index()?.find_flagged(from, forward, FLAG_MATCHED)
    }
}
