//! `/notifications/admin/*` wrappers.
//!
//! Every call resolves to an [`Envelope`]; transport and decode failures are
//! folded into `success: false` with a readable message. Send and broadcast
//! endpoints take their parameters as query strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::client::{call, ApiRequest, Transport};
use crate::confirm::{CleanupPhase, Confirmation};
use crate::data_helpers::{
    decode_or_default, lenient_count_map, lenient_opt_string, lenient_string, lenient_u64,
    list_items, value_u64,
};
use crate::envelope::Envelope;
use crate::error::{ApiError, ValidationError};

const BASE: &str = "/notifications/admin";

pub const DEFAULT_LIST_LIMIT: u32 = 20;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    Order,
    Payment,
    Delivery,
    Offer,
    Feedback,
    System,
}

impl NotificationType {
    pub const ALL: [NotificationType; 6] = [
        NotificationType::Order,
        NotificationType::Payment,
        NotificationType::Delivery,
        NotificationType::Offer,
        NotificationType::Feedback,
        NotificationType::System,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Order => "ORDER",
            NotificationType::Payment => "PAYMENT",
            NotificationType::Delivery => "DELIVERY",
            NotificationType::Offer => "OFFER",
            NotificationType::Feedback => "FEEDBACK",
            NotificationType::System => "SYSTEM",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub read_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationStats {
    #[serde(default, deserialize_with = "lenient_u64", alias = "total_notifications")]
    pub total: u64,
    #[serde(default, deserialize_with = "lenient_u64", alias = "unread_count")]
    pub unread: u64,
    #[serde(default, deserialize_with = "lenient_u64", alias = "read_count")]
    pub read: u64,
    #[serde(default, deserialize_with = "lenient_count_map")]
    pub by_type: BTreeMap<String, u64>,
}

/// One page of the admin notification list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub total: u64,
}

impl NotificationPage {
    /// Accepts a bare array or `{notifications|items|data, total}`. Rows
    /// that do not decode are dropped with a warning.
    pub fn from_value(value: &Value) -> Self {
        let items = list_items(value, &["notifications", "items", "data"]);
        let count = items.len() as u64;
        let notifications = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Notification>(item) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(error = %e, "skipping malformed notification row");
                    None
                }
            })
            .collect();
        let total = value_u64(value, &["total", "total_count", "count"]).unwrap_or(count);
        Self {
            notifications,
            total,
        }
    }
}

/// Filters and page for the list endpoint. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub kind: Option<NotificationType>,
    #[serde(default)]
    pub is_read: Option<bool>,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIST_LIMIT,
            user_id: None,
            kind: None,
            is_read: None,
        }
    }
}

impl NotificationQuery {
    pub fn skip(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendToUser {
    pub user_id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(default)]
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendToMultiple {
    pub user_ids: Vec<i64>,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
}

/// Fields an admin may change on an existing notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotificationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
}

/// Result of a send or broadcast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    #[serde(
        default,
        deserialize_with = "lenient_u64",
        alias = "count",
        alias = "sent_count",
        alias = "recipients"
    )]
    pub sent: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
}

/// Result of a cleanup preview or confirmed cleanup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupResult {
    pub phase: CleanupPhase,
    pub days: u32,
    /// Rows that would be (preview) or were (confirmed) removed.
    pub affected: u64,
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct NotificationsApi {
    transport: Arc<dyn Transport>,
}

impl NotificationsApi {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn send_value(&self, request: ApiRequest) -> Result<Value, ApiError> {
        self.transport.send(request).await
    }

    pub async fn list(&self, query: &NotificationQuery) -> Envelope<NotificationPage> {
        let request = ApiRequest::get(format!("{BASE}/all"))
            .query("skip", query.skip())
            .query("limit", query.limit)
            .query_opt("user_id", query.user_id)
            .query_opt("type", query.kind.map(NotificationType::as_str))
            .query_opt("is_read", query.is_read);
        let result = self
            .send_value(request)
            .await
            .map(|v| NotificationPage::from_value(&v));
        Envelope::from_result(result, "Notifications loaded")
    }

    pub async fn stats(&self) -> Envelope<NotificationStats> {
        let result = match self.send_value(ApiRequest::get(format!("{BASE}/stats"))).await {
            Ok(v) => decode_or_default(v),
            Err(e) => Err(e),
        };
        Envelope::from_result(result, "Statistics loaded")
    }

    pub async fn get(&self, id: i64) -> Envelope<Notification> {
        let result = call(self.transport.as_ref(), ApiRequest::get(format!("{BASE}/{id}"))).await;
        Envelope::from_result(result, "Notification loaded")
    }

    pub async fn send_to_user(&self, req: &SendToUser) -> Envelope<SendReceipt> {
        let result: Result<SendReceipt, ApiError> = async {
            require(&req.title, "Title")?;
            require(&req.message, "Message")?;
            let request = ApiRequest::post(format!("{BASE}/send-to-user"))
                .query("user_id", req.user_id)
                .query("title", &req.title)
                .query("message", &req.message)
                .query("type", req.kind)
                .query_opt("reference_id", req.reference_id.as_deref());
            decode_or_default(self.send_value(request).await?)
        }
        .await;
        if result.is_ok() {
            info!(user_id = req.user_id, kind = %req.kind, "notification sent to user");
        }
        Envelope::from_result(result, "Notification sent")
    }

    pub async fn send_to_multiple(&self, req: &SendToMultiple) -> Envelope<SendReceipt> {
        let result: Result<SendReceipt, ApiError> = async {
            if req.user_ids.is_empty() {
                return Err(ValidationError::NoRecipients.into());
            }
            require(&req.title, "Title")?;
            require(&req.message, "Message")?;
            let user_ids = req
                .user_ids
                .iter()
                .map(i64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let request = ApiRequest::post(format!("{BASE}/send-to-multiple"))
                .query("user_ids", user_ids)
                .query("title", &req.title)
                .query("message", &req.message)
                .query("type", req.kind);
            decode_or_default(self.send_value(request).await?)
        }
        .await;
        if result.is_ok() {
            info!(
                recipients = req.user_ids.len(),
                kind = %req.kind,
                "notification sent to multiple users"
            );
        }
        Envelope::from_result(result, "Notifications sent")
    }

    pub async fn broadcast(&self, req: &Broadcast) -> Envelope<SendReceipt> {
        let result: Result<SendReceipt, ApiError> = async {
            require(&req.title, "Title")?;
            require(&req.message, "Message")?;
            let request = ApiRequest::post(format!("{BASE}/broadcast"))
                .query("title", &req.title)
                .query("message", &req.message)
                .query("type", req.kind);
            decode_or_default(self.send_value(request).await?)
        }
        .await;
        if result.is_ok() {
            info!(kind = %req.kind, "notification broadcast");
        }
        Envelope::from_result(result, "Broadcast sent")
    }

    pub async fn update(&self, id: i64, update: &NotificationUpdate) -> Envelope<Value> {
        let result = match serde_json::to_value(update) {
            Ok(body) => {
                self.send_value(ApiRequest::put(format!("{BASE}/{id}")).json(body))
                    .await
            }
            Err(e) => Err(ApiError::Decode(e.to_string())),
        };
        Envelope::from_result(result, "Notification updated")
    }

    pub async fn mark_as_read(&self, id: i64) -> Envelope<Value> {
        let result = self
            .send_value(ApiRequest::put(format!("{BASE}/{id}/read")))
            .await;
        Envelope::from_result(result, "Notification marked as read")
    }

    pub async fn delete(&self, id: i64) -> Envelope<Value> {
        let result = self
            .send_value(ApiRequest::delete(format!("{BASE}/{id}")))
            .await;
        if result.is_ok() {
            info!(id, "notification deleted");
        }
        Envelope::from_result(result, "Notification deleted")
    }

    /// Delete notifications older than `days`. Without a confirmation this is
    /// a preview that only reports the count.
    pub async fn cleanup(
        &self,
        days: u32,
        confirmation: Option<Confirmation>,
    ) -> Envelope<CleanupResult> {
        let phase = CleanupPhase::for_confirmation(confirmation);
        let request = ApiRequest::delete(format!("{BASE}/cleanup"))
            .query("days", days)
            .query("confirm", phase.confirm_flag());
        let result = self.send_value(request).await.map(|v| CleanupResult {
            phase,
            days,
            affected: value_u64(
                &v,
                &[
                    "count",
                    "deleted_count",
                    "would_delete",
                    "affected",
                    "notifications_to_delete",
                ],
            )
            .unwrap_or(0),
        });
        if let Ok(r) = &result {
            info!(days, affected = r.affected, phase = ?phase, "notification cleanup");
        }
        let message = match phase {
            CleanupPhase::Preview => "Cleanup preview ready",
            CleanupPhase::Confirmed => "Old notifications deleted",
        };
        Envelope::from_result(result, message)
    }
}
