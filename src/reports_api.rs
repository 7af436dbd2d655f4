//! `/admin/reports/*` wrappers and report payload types.
//!
//! Report endpoints return either a summary record or a list of rows. The
//! shape is kept loose in [`ReportPayload`]; typed summaries decode from it
//! with every missing number defaulting to zero.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::{ApiRequest, Download, Transport};
use crate::data_helpers::{lenient_f64, lenient_string, lenient_u64, list_items};
use crate::date_range::DateRange;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::report_table::{normalize_rows, Row};
use crate::safe_render::{safe_array, safe_object};

const BASE: &str = "/admin/reports";

static NULL: Value = Value::Null;

const ROW_KEYS: [&str; 3] = ["data", "rows", "items"];

// ---------------------------------------------------------------------------
// Report kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    TotalSales,
    SalesByCategory,
    TopProducts,
    DailySales,
    CustomerEngagement,
    DeliveryPerformance,
    FeedbackRatings,
    InventoryStatus,
    Dashboard,
}

impl ReportKind {
    pub const ALL: [ReportKind; 9] = [
        ReportKind::TotalSales,
        ReportKind::SalesByCategory,
        ReportKind::TopProducts,
        ReportKind::DailySales,
        ReportKind::CustomerEngagement,
        ReportKind::DeliveryPerformance,
        ReportKind::FeedbackRatings,
        ReportKind::InventoryStatus,
        ReportKind::Dashboard,
    ];

    /// Path below `/admin/reports`.
    pub fn path(self) -> &'static str {
        match self {
            ReportKind::TotalSales => "sales/total",
            ReportKind::SalesByCategory => "sales/by-category",
            ReportKind::TopProducts => "sales/top-products",
            ReportKind::DailySales => "sales/daily",
            ReportKind::CustomerEngagement => "customers/engagement",
            ReportKind::DeliveryPerformance => "delivery/performance",
            ReportKind::FeedbackRatings => "feedback/ratings",
            ReportKind::InventoryStatus => "inventory/status",
            ReportKind::Dashboard => "dashboard",
        }
    }

    /// Slot name of this report in the reports state.
    pub fn key(self) -> &'static str {
        match self {
            ReportKind::TotalSales => "totalSales",
            ReportKind::SalesByCategory => "byCategory",
            ReportKind::TopProducts => "topProducts",
            ReportKind::DailySales => "dailySales",
            ReportKind::CustomerEngagement => "engagement",
            ReportKind::DeliveryPerformance => "deliveryPerformance",
            ReportKind::FeedbackRatings => "feedbackRatings",
            ReportKind::InventoryStatus => "inventoryStatus",
            ReportKind::Dashboard => "dashboard",
        }
    }

    /// Value of `report_type` on the export endpoint.
    pub fn export_name(self) -> &'static str {
        match self {
            ReportKind::TotalSales => "sales",
            ReportKind::SalesByCategory => "sales_by_category",
            ReportKind::TopProducts => "top_products",
            ReportKind::DailySales => "daily_sales",
            ReportKind::CustomerEngagement => "customers",
            ReportKind::DeliveryPerformance => "delivery",
            ReportKind::FeedbackRatings => "feedback",
            ReportKind::InventoryStatus => "inventory",
            ReportKind::Dashboard => "dashboard",
        }
    }

    pub fn endpoint(self) -> String {
        format!("{BASE}/{}", self.path())
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A report as the backend returned it: a summary record or tabular rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportPayload {
    Summary(Map<String, Value>),
    Rows(Vec<Value>),
}

impl Default for ReportPayload {
    fn default() -> Self {
        ReportPayload::Rows(Vec::new())
    }
}

impl ReportPayload {
    /// Arrays are rows. An object holding an array under `data`, `rows` or
    /// `items` is a list wrapper (possibly paginated) and is unwrapped.
    /// Other objects are summaries; anything else is an empty row set.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => ReportPayload::Rows(items),
            Value::Object(obj) => {
                let wrapped = ROW_KEYS
                    .iter()
                    .any(|k| obj.get(*k).is_some_and(Value::is_array));
                if wrapped {
                    ReportPayload::Rows(list_items(&Value::Object(obj), &ROW_KEYS))
                } else {
                    ReportPayload::Summary(obj)
                }
            }
            _ => ReportPayload::default(),
        }
    }

    pub fn rows(&self) -> &[Value] {
        match self {
            ReportPayload::Rows(rows) => rows,
            ReportPayload::Summary(_) => &[],
        }
    }

    pub fn summary(&self) -> &Map<String, Value> {
        match self {
            ReportPayload::Summary(obj) => obj,
            ReportPayload::Rows(_) => safe_object(&NULL),
        }
    }

    /// Rows normalized for a report table.
    pub fn table_rows(&self) -> Vec<Row> {
        normalize_rows(&Value::Array(self.rows().to_vec()))
    }

    /// Decode the summary into a typed record. Missing or malformed fields
    /// fall back to the type's defaults.
    pub fn summary_as<T: DeserializeOwned + Default>(&self) -> T {
        serde_json::from_value(Value::Object(self.summary().clone())).unwrap_or_else(|e| {
            warn!(error = %e, "report summary did not decode, using defaults");
            T::default()
        })
    }

    /// Rows of a nested list inside a summary, e.g. `dashboard.recent_orders`.
    pub fn nested_rows(&self, key: &str) -> Vec<Row> {
        let nested = self.summary().get(key).cloned().unwrap_or(Value::Null);
        normalize_rows(&Value::Array(safe_array(&nested).to_vec()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    #[serde(default, deserialize_with = "lenient_f64", alias = "revenue")]
    pub total_revenue: f64,
    #[serde(default, deserialize_with = "lenient_u64", alias = "orders")]
    pub total_orders: u64,
    #[serde(default, deserialize_with = "lenient_f64", alias = "avg_order_value")]
    pub average_order_value: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub growth_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementSummary {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_customers: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub active_customers: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub new_customers: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub returning_customers: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub retention_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliverySummary {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_deliveries: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub on_time_rate: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_delivery_minutes: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_revenue: f64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_orders: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_customers: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub pending_orders: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub average_rating: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockAlert {
    #[serde(default, deserialize_with = "lenient_string")]
    pub product_id: String,
    #[serde(default, deserialize_with = "lenient_string", alias = "name")]
    pub product_name: String,
    #[serde(default, deserialize_with = "lenient_f64", alias = "stock")]
    pub current_stock: f64,
    #[serde(default, deserialize_with = "lenient_f64", alias = "threshold")]
    pub reorder_level: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub severity: String,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Excel,
    Pdf,
    Json,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "excel",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Json => "json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Json => "json",
        }
    }
}

/// A downloaded report file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    fn from_download(download: Download, fallback_name: String) -> Self {
        let filename = download
            .filename
            .as_deref()
            .and_then(|name| Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or(fallback_name);
        Self {
            filename,
            content_type: download.content_type,
            bytes: download.bytes,
        }
    }

    /// Write the artifact into `dir` under its filename.
    pub fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        info!(path = %path.display(), bytes = self.bytes.len(), "report export saved");
        Ok(path)
    }
}

pub fn default_export_filename(kind: ReportKind, format: ExportFormat, range: &DateRange) -> String {
    format!(
        "{}_{}_{}.{}",
        kind.export_name(),
        range.start_param(),
        range.end_param(),
        format.extension()
    )
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ReportsApi {
    transport: Arc<dyn Transport>,
}

impl ReportsApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn fetch(&self, kind: ReportKind, range: &DateRange) -> Envelope<ReportPayload> {
        let request = range.apply(ApiRequest::get(kind.endpoint()));
        let result = self
            .transport
            .send(request)
            .await
            .map(ReportPayload::from_value);
        Envelope::from_result(result, "Report loaded")
    }

    pub async fn stock_alerts(&self) -> Envelope<Vec<StockAlert>> {
        let request = ApiRequest::get(format!("{BASE}/inventory/stock-alerts"));
        let result = self.transport.send(request).await.map(|v| {
            list_items(&v, &["alerts", "items", "data"])
                .into_iter()
                .filter_map(|item| serde_json::from_value::<StockAlert>(item).ok())
                .collect()
        });
        Envelope::from_result(result, "Stock alerts loaded")
    }

    pub async fn export(
        &self,
        kind: ReportKind,
        format: ExportFormat,
        range: &DateRange,
    ) -> Envelope<ExportArtifact> {
        let request = range.apply(
            ApiRequest::get(format!("{BASE}/export"))
                .query("report_type", kind.export_name())
                .query("format", format.as_str()),
        );
        let fallback = default_export_filename(kind, format, range);
        let result: Result<ExportArtifact, ApiError> = self
            .transport
            .download(request)
            .await
            .map(|d| ExportArtifact::from_download(d, fallback));
        if let Ok(artifact) = &result {
            info!(
                report = %kind,
                format = format.as_str(),
                filename = %artifact.filename,
                "report exported"
            );
        }
        Envelope::from_result(result, "Report exported")
    }
}
