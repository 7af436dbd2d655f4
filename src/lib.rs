//! Admin dashboard core.
//!
//! Notification management and business reporting on top of the admin REST
//! API: request wrappers that always answer with an [`Envelope`], two state
//! stores with the shared loading/error/pagination lifecycle, and the view
//! models of the report table and chart, which turn frequently-null report
//! payloads into render-ready rows, cells and series.

use std::sync::Arc;
use tracing::info;

pub mod client;
pub mod config;
pub mod confirm;
mod data_helpers;
pub mod date_range;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod notification_store;
pub mod notifications_api;
pub mod report_chart;
pub mod report_store;
pub mod report_table;
pub mod reports_api;
pub mod safe_render;
pub mod storage;
pub mod store;

pub use client::{HttpTransport, Transport};
pub use config::DashboardConfig;
pub use confirm::{Confirmation, CONFIRM_TOKEN};
pub use date_range::DateRange;
pub use envelope::Envelope;
pub use error::{ApiError, ConfigError, ValidationError};
pub use notification_store::{NotificationState, NotificationStore};
pub use notifications_api::NotificationsApi;
pub use report_store::{PollHandle, ReportsState, ReportsStore};
pub use report_table::{Column, ReportTable};
pub use reports_api::{ReportKind, ReportsApi};

/// Both stores wired to one transport.
#[derive(Clone)]
pub struct Dashboard {
    pub config: DashboardConfig,
    pub notifications: NotificationStore,
    pub reports: ReportsStore,
}

impl Dashboard {
    /// Connect to the admin API described by `config` over HTTP.
    pub fn connect(config: DashboardConfig) -> Result<Self, ApiError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        info!(base_url = %transport.base_url(), "admin dashboard connected");
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: DashboardConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            notifications: NotificationStore::new(NotificationsApi::new(transport.clone())),
            reports: ReportsStore::new(ReportsApi::new(transport)),
            config,
        }
    }

    /// A report table paged at the configured size.
    pub fn report_table(&self, columns: Vec<Column>) -> ReportTable {
        ReportTable::new(columns).with_page_size(self.config.page_size)
    }

    /// Start the low-stock poll at the configured interval. Like
    /// [`ReportsStore::spawn_stock_alert_poll`], this needs a running Tokio
    /// runtime.
    pub fn start_stock_alert_poll(&self) -> PollHandle {
        self.reports
            .spawn_stock_alert_poll(self.config.stock_alert_interval)
    }
}
