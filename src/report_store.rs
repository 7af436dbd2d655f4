//! Reporting state: loaded reports per kind, the shared date filter, the
//! transient export banner and low-stock alerts.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::date_range::DateRange;
use crate::envelope::Envelope;
use crate::reports_api::{
    ExportArtifact, ExportFormat, ReportKind, ReportPayload, ReportsApi, StockAlert,
};
use crate::store::{begin, finish, ActionState};

/// How long a finished export's banner stays up.
pub const EXPORT_STATUS_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatusKind {
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportStatus {
    #[serde(rename = "type")]
    pub kind: ExportStatusKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportsState {
    pub reports: BTreeMap<ReportKind, ReportPayload>,
    pub date_range: DateRange,
    pub export_status: Option<ExportStatus>,
    pub stock_alerts: Vec<StockAlert>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for ReportsState {
    fn default() -> Self {
        Self {
            reports: BTreeMap::new(),
            date_range: DateRange::default_for_today(),
            export_status: None,
            stock_alerts: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl ReportsState {
    pub fn report(&self, kind: ReportKind) -> Option<&ReportPayload> {
        self.reports.get(&kind)
    }
}

impl ActionState for ReportsState {
    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }
}

/// Stops a stock-alert poll started by [`ReportsStore::spawn_stock_alert_poll`].
#[derive(Debug, Clone)]
pub struct PollHandle {
    running: Arc<AtomicBool>,
}

impl PollHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct ReportsStore {
    api: ReportsApi,
    state: Arc<watch::Sender<ReportsState>>,
    export_generation: Arc<AtomicU64>,
}

impl ReportsStore {
    pub fn new(api: ReportsApi) -> Self {
        Self::with_state(api, ReportsState::default())
    }

    pub fn with_state(api: ReportsApi, initial: ReportsState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            api,
            state: Arc::new(tx),
            export_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> ReportsState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReportsState> {
        self.state.subscribe()
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }

    pub fn set_date_range(&self, range: DateRange) {
        debug!(start = %range.start_param(), end = %range.end_param(), "report date range set");
        self.state.send_modify(|s| s.date_range = range);
    }

    pub async fn fetch_report(&self, kind: ReportKind, range: &DateRange) -> Envelope<ReportPayload> {
        begin(&self.state);
        let envelope = self.api.fetch(kind, range).await;
        finish(&self.state, "fetch_report", &envelope, |s, payload| {
            s.reports.insert(kind, payload.cloned().unwrap_or_default());
        });
        envelope
    }

    /// Load several reports for one view under a single loading cycle.
    /// Successful kinds are stored even when others fail; the first failure
    /// becomes the store error.
    pub async fn fetch_reports(
        &self,
        kinds: &[ReportKind],
        range: &DateRange,
    ) -> Envelope<Vec<ReportKind>> {
        begin(&self.state);
        let mut loaded = Vec::with_capacity(kinds.len());
        let mut first_failure: Option<String> = None;
        for &kind in kinds {
            let envelope = self.api.fetch(kind, range).await;
            if envelope.success {
                let payload = envelope.data.unwrap_or_default();
                self.state.send_modify(|s| {
                    s.reports.insert(kind, payload);
                });
                loaded.push(kind);
            } else if first_failure.is_none() {
                first_failure = Some(envelope.message);
            }
        }
        let envelope = match first_failure {
            None => Envelope::ok(loaded, "Reports loaded"),
            Some(message) => Envelope {
                success: false,
                data: Some(loaded),
                message,
            },
        };
        finish(&self.state, "fetch_reports", &envelope, |_, _| {});
        envelope
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    pub fn export_status(&self) -> Option<ExportStatus> {
        self.state.borrow().export_status.clone()
    }

    /// Replace the export banner. Finished states clear themselves after
    /// [`EXPORT_STATUS_TTL`] unless a newer status replaced them first.
    fn set_export_status(&self, kind: ExportStatusKind, message: String) {
        let generation = self.export_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .send_modify(|s| s.export_status = Some(ExportStatus { kind, message }));
        if kind == ExportStatusKind::Loading {
            return;
        }
        let state = self.state.clone();
        let current = self.export_generation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(EXPORT_STATUS_TTL).await;
            if current.load(Ordering::SeqCst) == generation {
                state.send_modify(|s| s.export_status = None);
            }
        });
    }

    pub async fn export_report(
        &self,
        kind: ReportKind,
        format: ExportFormat,
        range: &DateRange,
    ) -> Envelope<ExportArtifact> {
        self.set_export_status(
            ExportStatusKind::Loading,
            format!("Exporting {} report...", kind.export_name()),
        );
        let envelope = self.api.export(kind, format, range).await;
        match (&envelope.data, envelope.success) {
            (Some(artifact), true) => self.set_export_status(
                ExportStatusKind::Success,
                format!("Report exported as {}", artifact.filename),
            ),
            _ => self.set_export_status(ExportStatusKind::Error, envelope.message.clone()),
        }
        envelope
    }

    // -----------------------------------------------------------------------
    // Stock alerts
    // -----------------------------------------------------------------------

    pub async fn fetch_stock_alerts(&self) -> Envelope<Vec<StockAlert>> {
        begin(&self.state);
        let envelope = self.api.stock_alerts().await;
        finish(&self.state, "fetch_stock_alerts", &envelope, |s, alerts| {
            s.stock_alerts = alerts.cloned().unwrap_or_default();
        });
        envelope
    }

    /// Refresh stock alerts every `interval` until the handle is stopped.
    /// Each tick spawns its own fetch, so a slow response does not delay the
    /// next one.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime; the poll loop is started
    /// with `tokio::spawn`.
    pub fn spawn_stock_alert_poll(&self, interval: Duration) -> PollHandle {
        let running = Arc::new(AtomicBool::new(true));
        let handle = PollHandle {
            running: running.clone(),
        };
        let store = self.clone();
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "stock alert poll started");
            loop {
                tokio::time::sleep(interval).await;
                if !running.load(Ordering::SeqCst) {
                    info!("stock alert poll stopped");
                    break;
                }
                let tick = store.clone();
                tokio::spawn(async move {
                    tick.fetch_stock_alerts().await;
                });
            }
        });
        handle
    }
}
