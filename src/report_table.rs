//! Report table view model.
//!
//! Turns the raw rows of a report payload into something a table can render
//! without checks: cells are normalized once, paginated as a pure view, and
//! formatted through the safe-render layer. Sorting is only tracked here; the
//! caller refetches sorted data from the server.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::safe_render::{
    format_grouped, safe_format_dollar, safe_format_percent, safe_format_rating, Raw, SafeValue,
};

pub const DEFAULT_PAGE_SIZE: usize = 10;
const EMPTY_CELL: &str = "-";
const DEFAULT_EMPTY_MESSAGE: &str = "No data available";

/// One normalized table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Bool(bool),
    Number(f64),
    Text(String),
    Json(Value),
}

impl Cell {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Bool(b) => Cell::Bool(b),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Number(0.0)),
            Value::String(s) => Cell::Text(s),
            other => Cell::Json(other),
        }
    }

    /// NaN becomes 0, null becomes the empty string, everything else stays.
    pub fn normalized(self) -> Self {
        match self {
            Cell::Number(n) if n.is_nan() => Cell::Number(0.0),
            Cell::Json(Value::Null) => Cell::Text(String::new()),
            other => other,
        }
    }
}

impl SafeValue for Cell {
    fn raw(&self) -> Raw<'_> {
        match self {
            Cell::Bool(b) => Raw::Bool(*b),
            Cell::Number(n) => Raw::Number(*n),
            Cell::Text(s) => Raw::Text(s),
            Cell::Json(v) => v.raw(),
        }
    }
}

pub type Row = BTreeMap<String, Cell>;

/// Normalize a raw rows payload. Anything that is not an array of objects
/// yields no rows; non-object entries are skipped.
pub fn normalize_rows(data: &Value) -> Vec<Row> {
    let Some(items) = data.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), Cell::from_value(v.clone()).normalized()))
                .collect()
        })
        .collect()
}

pub fn normalize_row(row: Row) -> Row {
    row.into_iter().map(|(k, v)| (k, v.normalized())).collect()
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

pub fn total_pages(count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size)
}

/// 1-based page slice. Out-of-range pages are empty.
pub fn paginate<T>(items: &[T], page_size: usize, page: usize) -> &[T] {
    if page == 0 || page_size == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub key: Option<String>,
    pub direction: Option<SortDirection>,
}

impl SortState {
    /// Click on a column header: same column flips, another column starts
    /// ascending. Returns the new state for the caller to fetch with.
    pub fn toggle(&mut self, key: &str) -> SortState {
        let direction = match (&self.key, self.direction) {
            (Some(current), Some(SortDirection::Asc)) if current == key => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        self.key = Some(key.to_string());
        self.direction = Some(direction);
        self.clone()
    }

    pub fn direction_for(&self, key: &str) -> Option<SortDirection> {
        match &self.key {
            Some(current) if current == key => self.direction,
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Columns and cells
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct CellError(pub String);

impl From<String> for CellError {
    fn from(value: String) -> Self {
        CellError(value)
    }
}

impl From<&str> for CellError {
    fn from(value: &str) -> Self {
        CellError(value.to_string())
    }
}

pub type CellRenderer = Arc<dyn Fn(&Cell, &Row) -> Result<String, CellError> + Send + Sync>;

#[derive(Clone)]
pub struct Column {
    pub key: String,
    pub label: String,
    pub sortable: bool,
    render: Option<CellRenderer>,
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("sortable", &self.sortable)
            .field("custom_render", &self.render.is_some())
            .finish()
    }
}

impl Column {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            sortable: false,
            render: None,
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn with_render<F>(mut self, render: F) -> Self
    where
        F: Fn(&Cell, &Row) -> Result<String, CellError> + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(render));
        self
    }

    /// Render this column's cell for `row`. A failing custom renderer is
    /// logged and shown as `-`.
    pub fn render_cell(&self, row: &Row) -> String {
        let missing = Cell::Text(String::new());
        let cell = row.get(&self.key).unwrap_or(&missing);
        if let Some(render) = &self.render {
            return match render(cell, row) {
                Ok(text) => text,
                Err(e) => {
                    warn!(column = %self.key, error = %e, "cell renderer failed");
                    EMPTY_CELL.to_string()
                }
            };
        }
        format_cell(&self.key, cell)
    }
}

/// How a numeric column is formatted, picked from its field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericStyle {
    Dollar,
    Percent,
    Rating,
    Plain,
}

pub fn numeric_style(field: &str) -> NumericStyle {
    let field = field.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| field.contains(n));
    if has(&["amount", "price", "revenue", "total", "value"]) {
        NumericStyle::Dollar
    } else if has(&["percent", "rate"]) {
        NumericStyle::Percent
    } else if has(&["rating"]) {
        NumericStyle::Rating
    } else {
        NumericStyle::Plain
    }
}

/// Default cell formatting: booleans as Yes/No, blanks as `-`, numbers by
/// field-name heuristic, other values as text.
pub fn format_cell(field: &str, cell: &Cell) -> String {
    match cell {
        Cell::Bool(true) => "Yes".to_string(),
        Cell::Bool(false) => "No".to_string(),
        Cell::Number(n) => match numeric_style(field) {
            NumericStyle::Dollar => safe_format_dollar(n),
            NumericStyle::Percent => safe_format_percent(n, 1),
            NumericStyle::Rating => safe_format_rating(n),
            NumericStyle::Plain if n.is_nan() => "0".to_string(),
            NumericStyle::Plain => format_grouped(*n, 0, 3),
        },
        Cell::Text(s) if s.is_empty() => EMPTY_CELL.to_string(),
        Cell::Text(s) => s.clone(),
        Cell::Json(Value::Null) => EMPTY_CELL.to_string(),
        Cell::Json(v) => v.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderCell {
    pub key: String,
    pub label: String,
    pub sortable: bool,
    pub sort: Option<SortDirection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePage {
    pub headers: Vec<HeaderCell>,
    pub rows: Vec<Vec<String>>,
    pub page: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

/// What the table shows. Checked in this order: loading, error, empty, rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "content", rename_all = "lowercase")]
pub enum TableView {
    Loading,
    Error(String),
    Empty(String),
    Rows(TablePage),
}

#[derive(Debug, Clone)]
pub struct ReportTable {
    columns: Vec<Column>,
    rows: Vec<Row>,
    page_size: usize,
    current_page: usize,
    sort: SortState,
    loading: bool,
    error: Option<String>,
    empty_message: String,
}

impl ReportTable {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            current_page: 1,
            sort: SortState::default(),
            loading: false,
            error: None,
            empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_empty_message(mut self, message: impl Into<String>) -> Self {
        self.empty_message = message.into();
        self
    }

    /// Replace the rows with a freshly normalized payload and go back to the
    /// first page.
    pub fn set_data(&mut self, data: &Value) {
        self.rows = normalize_rows(data);
        self.current_page = 1;
    }

    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.rows = rows.into_iter().map(normalize_row).collect();
        self.current_page = 1;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.rows.len(), self.page_size)
    }

    pub fn set_page(&mut self, page: usize) {
        self.current_page = page;
    }

    pub fn next_page(&mut self) {
        if self.current_page < self.total_pages() {
            self.current_page += 1;
        }
    }

    pub fn prev_page(&mut self) {
        if self.current_page > 1 {
            self.current_page -= 1;
        }
    }

    pub fn page_rows(&self) -> &[Row] {
        paginate(&self.rows, self.page_size, self.current_page)
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    /// Header click. Unsortable columns are ignored; otherwise the new sort
    /// request is returned and rows are left untouched.
    pub fn on_sort(&mut self, key: &str) -> Option<SortState> {
        let sortable = self.columns.iter().any(|c| c.key == key && c.sortable);
        sortable.then(|| self.sort.toggle(key))
    }

    pub fn render(&self) -> TableView {
        if self.loading {
            return TableView::Loading;
        }
        if let Some(error) = &self.error {
            return TableView::Error(error.clone());
        }
        if self.rows.is_empty() {
            return TableView::Empty(self.empty_message.clone());
        }

        let headers = self
            .columns
            .iter()
            .map(|c| HeaderCell {
                key: c.key.clone(),
                label: c.label.clone(),
                sortable: c.sortable,
                sort: self.sort.direction_for(&c.key),
            })
            .collect();
        let rows = self
            .page_rows()
            .iter()
            .map(|row| self.columns.iter().map(|c| c.render_cell(row)).collect())
            .collect();

        TableView::Rows(TablePage {
            headers,
            rows,
            page: self.current_page,
            total_pages: self.total_pages(),
            total_rows: self.rows.len(),
        })
    }

    /// All rows (every page) as CSV, labels as the header line.
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.columns.iter().map(|c| c.label.as_str()))?;
        for row in &self.rows {
            writer.write_record(self.columns.iter().map(|c| c.render_cell(row)))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| {
            csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Value {
        Value::Array(
            (1..=n)
                .map(|i| json!({ "name": format!("item-{i}"), "total_amount": i }))
                .collect(),
        )
    }

    #[test]
    fn normalization_replaces_nulls_and_nans() {
        let data = json!([
            { "name": null, "revenue": 12.5, "active": true },
            "not a row",
            { "name": "Tea" }
        ]);
        let normalized = normalize_rows(&data);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0]["name"], Cell::Text(String::new()));
        assert_eq!(normalized[0]["revenue"], Cell::Number(12.5));
        assert_eq!(normalized[0]["active"], Cell::Bool(true));

        let mut raw = Row::new();
        raw.insert("rate".into(), Cell::Number(f64::NAN));
        raw.insert("note".into(), Cell::Json(Value::Null));
        let fixed = normalize_row(raw);
        assert_eq!(fixed["rate"], Cell::Number(0.0));
        assert_eq!(fixed["note"], Cell::Text(String::new()));
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_rows(&json!([
            { "a": null, "b": 3, "c": "x", "d": [1, null], "e": false }
        ]));
        let twice: Vec<Row> = once.clone().into_iter().map(normalize_row).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn non_array_payload_is_empty() {
        assert!(normalize_rows(&json!({ "rows": [] })).is_empty());
        assert!(normalize_rows(&Value::Null).is_empty());
    }

    #[test]
    fn pagination_over_23_rows() {
        let mut table = ReportTable::new(vec![Column::new("name", "Name")]);
        table.set_data(&rows(23));
        assert_eq!(table.total_pages(), 3);

        table.set_page(3);
        assert_eq!(table.page_rows().len(), 3);
        assert_eq!(table.page_rows()[0]["name"], Cell::Text("item-21".into()));

        table.set_page(4);
        assert!(table.page_rows().is_empty());
        table.set_page(0);
        assert!(table.page_rows().is_empty());
    }

    #[test]
    fn page_navigation_stays_in_range() {
        let mut table = ReportTable::new(vec![Column::new("name", "Name")]).with_page_size(5);
        table.set_data(&rows(7));
        table.prev_page();
        assert_eq!(table.current_page(), 1);
        table.next_page();
        table.next_page();
        assert_eq!(table.current_page(), 2);
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 0), 0);
    }

    #[test]
    fn sort_toggles_without_reordering() {
        let mut table = ReportTable::new(vec![
            Column::new("name", "Name").sortable(),
            Column::new("total_amount", "Total").sortable(),
            Column::new("note", "Note"),
        ]);
        table.set_data(&rows(3));

        let first = table.on_sort("name").expect("sortable");
        assert_eq!(first.direction, Some(SortDirection::Asc));
        let second = table.on_sort("name").expect("sortable");
        assert_eq!(second.direction, Some(SortDirection::Desc));
        let third = table.on_sort("total_amount").expect("sortable");
        assert_eq!(third.key.as_deref(), Some("total_amount"));
        assert_eq!(third.direction, Some(SortDirection::Asc));
        assert!(table.on_sort("note").is_none());

        assert_eq!(table.rows()[0]["name"], Cell::Text("item-1".into()));
    }

    #[test]
    fn cell_heuristics() {
        assert_eq!(format_cell("total_revenue", &Cell::Number(1234.5)), "$1,234.50");
        assert_eq!(format_cell("conversion_rate", &Cell::Number(12.34)), "12.3%");
        assert_eq!(format_cell("avg_rating", &Cell::Number(4.0)), "4.0");
        assert_eq!(format_cell("orders", &Cell::Number(12000.0)), "12,000");
        assert_eq!(format_cell("orders", &Cell::Number(0.0)), "0");
        assert_eq!(format_cell("active", &Cell::Bool(false)), "No");
        assert_eq!(format_cell("name", &Cell::Text(String::new())), "-");
        assert_eq!(format_cell("name", &Cell::Text("Latte".into())), "Latte");
        assert_eq!(numeric_style("PRICE"), NumericStyle::Dollar);
    }

    #[test]
    fn failing_renderer_falls_back_to_dash() {
        let columns = vec![
            Column::new("name", "Name")
                .with_render(|_, _| Err(CellError::from("boom"))),
            Column::new("total_amount", "Total"),
        ];
        let mut table = ReportTable::new(columns);
        table.set_data(&rows(1));
        match table.render() {
            TableView::Rows(page) => {
                assert_eq!(page.rows, vec![vec!["-".to_string(), "$1.00".to_string()]]);
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn render_branch_order() {
        let mut table = ReportTable::new(vec![Column::new("name", "Name")])
            .with_empty_message("Nothing here");
        assert_eq!(table.render(), TableView::Empty("Nothing here".into()));

        table.set_error(Some("offline".into()));
        assert_eq!(table.render(), TableView::Error("offline".into()));

        table.set_loading(true);
        assert_eq!(table.render(), TableView::Loading);
    }

    #[test]
    fn csv_export_uses_labels_and_cell_formatting() {
        let mut table = ReportTable::new(vec![
            Column::new("name", "Product"),
            Column::new("total_amount", "Total"),
        ]);
        table.set_data(&json!([
            { "name": "Flat white, large", "total_amount": 1200 },
            { "name": null, "total_amount": 3 }
        ]));
        let csv = table.to_csv().expect("csv");
        assert_eq!(
            csv,
            "Product,Total\n\"Flat white, large\",\"$1,200.00\"\n-,$3.00\n"
        );
    }
}
