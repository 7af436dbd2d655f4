//! Chart series adapter.
//!
//! Flat report rows become label + series vectors once; the chart type only
//! decides colors. Rendering itself belongs to whatever chart library the
//! caller uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::safe_render::{coerce_number, safe_object};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Line,
    Bar,
    Pie,
    Doughnut,
}

impl ChartType {
    pub fn is_radial(self) -> bool {
        matches!(self, ChartType::Pie | ChartType::Doughnut)
    }
}

/// One series pulled from `row[key]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub key: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Dataset {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub x_axis_key: String,
    pub y_axis_key: String,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub title: Option<String>,
}

impl ChartConfig {
    pub fn single(x_axis_key: impl Into<String>, y_axis_key: impl Into<String>) -> Self {
        Self {
            x_axis_key: x_axis_key.into(),
            y_axis_key: y_axis_key.into(),
            datasets: Vec::new(),
            title: None,
        }
    }

    pub fn with_datasets(mut self, datasets: Vec<Dataset>) -> Self {
        self.datasets = datasets;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Labels and series, independent of chart type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

/// Colors for one series under a given chart type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SeriesColors {
    Single(String),
    PerPoint(Vec<String>),
}

fn hsl(hue: f64) -> String {
    format!("hsl({}, 70%, 50%)", hue.round() as i64)
}

fn label_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn value_of(value: Option<&Value>) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(v) => {
            let n = coerce_number(v);
            if n.is_nan() {
                0.0
            } else {
                n
            }
        }
    }
}

impl ChartData {
    /// Build labels and series from rows. Returns `None` for empty input so
    /// callers show an empty state instead of an empty chart.
    pub fn from_rows(rows: &[Value], config: &ChartConfig) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        let objects: Vec<_> = rows.iter().map(safe_object).collect();
        let labels = objects
            .iter()
            .map(|row| label_of(row.get(&config.x_axis_key)))
            .collect();

        let series = if config.datasets.is_empty() {
            vec![Series {
                label: config
                    .title
                    .clone()
                    .unwrap_or_else(|| config.y_axis_key.clone()),
                values: objects
                    .iter()
                    .map(|row| value_of(row.get(&config.y_axis_key)))
                    .collect(),
                color: None,
            }]
        } else {
            config
                .datasets
                .iter()
                .map(|ds| Series {
                    label: ds.label.clone(),
                    values: objects.iter().map(|row| value_of(row.get(&ds.key))).collect(),
                    color: ds.color.clone(),
                })
                .collect()
        };

        Some(Self { labels, series })
    }

    /// Colors per series. Line/bar rotate the hue 60° per series; pie and
    /// doughnut spread slices over the full wheel.
    pub fn colors(&self, chart_type: ChartType) -> Vec<SeriesColors> {
        self.series
            .iter()
            .enumerate()
            .map(|(index, series)| {
                if let Some(color) = &series.color {
                    return SeriesColors::Single(color.clone());
                }
                if chart_type.is_radial() {
                    let count = series.values.len().max(1) as f64;
                    SeriesColors::PerPoint(
                        (0..series.values.len())
                            .map(|i| hsl(i as f64 * 360.0 / count))
                            .collect(),
                    )
                } else {
                    SeriesColors::Single(hsl((index as f64 * 60.0) % 360.0))
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ChartView {
    Empty,
    Chart {
        chart_type: ChartType,
        data: ChartData,
        colors: Vec<SeriesColors>,
    },
}

/// A chart whose type can be switched without touching its data.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportChart {
    chart_type: ChartType,
    data: Option<ChartData>,
}

impl ReportChart {
    pub fn new(rows: &[Value], config: &ChartConfig, chart_type: ChartType) -> Self {
        Self {
            chart_type,
            data: ChartData::from_rows(rows, config),
        }
    }

    pub fn chart_type(&self) -> ChartType {
        self.chart_type
    }

    pub fn set_type(&mut self, chart_type: ChartType) {
        self.chart_type = chart_type;
    }

    pub fn data(&self) -> Option<&ChartData> {
        self.data.as_ref()
    }

    pub fn view(&self) -> ChartView {
        match &self.data {
            None => ChartView::Empty,
            Some(data) => ChartView::Chart {
                chart_type: self.chart_type,
                data: data.clone(),
                colors: data.colors(self.chart_type),
            },
        }
    }
}
