//! Report date range filter.
//!
//! Dates stay `NaiveDate` inside the crate and only become `YYYY-MM-DD`
//! strings when attached to a request.

use chrono::{Datelike, Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::client::ApiRequest;
use crate::error::ValidationError;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidDateRange {
                start: start.format(DATE_FORMAT).to_string(),
                end: end.format(DATE_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// The `days` days ending on `today`, inclusive. A span reaching past
    /// the earliest representable date starts at `NaiveDate::MIN`.
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        let span = u64::from(days.max(1)) - 1;
        Self {
            start: today
                .checked_sub_days(Days::new(span))
                .unwrap_or(NaiveDate::MIN),
            end: today,
        }
    }

    pub fn month_to_date(today: NaiveDate) -> Self {
        Self {
            start: today.with_day(1).unwrap_or(today),
            end: today,
        }
    }

    /// Last 30 days up to today, the default filter of every report view.
    pub fn default_for_today() -> Self {
        Self::last_days(Local::now().date_naive(), 30)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn start_param(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn apply(&self, request: ApiRequest) -> ApiRequest {
        request
            .query("start_date", self.start_param())
            .query("end_date", self.end_param())
    }
}
