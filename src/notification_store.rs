//! Notification management state.
//!
//! Holds the current page of notifications, the stats card numbers, the
//! selection shown in the details modal and the last cleanup preview. Write
//! actions refresh the list and/or stats from the server afterwards instead
//! of predicting the result locally; mark-read and delete also patch the
//! in-memory list so the row updates immediately.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::confirm::Confirmation;
use crate::envelope::Envelope;
use crate::notifications_api::{
    Broadcast, CleanupResult, Notification, NotificationPage, NotificationQuery,
    NotificationStats, NotificationUpdate, NotificationsApi, SendReceipt, SendToMultiple,
    SendToUser,
};
use crate::store::{begin, finish, ActionState, Pagination};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationState {
    pub notifications: Vec<Notification>,
    /// Selection of the details modal.
    pub current: Option<Notification>,
    pub stats: Option<NotificationStats>,
    pub pagination: Pagination,
    /// Query of the last list fetch, reused by dependent refreshes.
    pub query: NotificationQuery,
    pub cleanup_preview: Option<CleanupResult>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ActionState for NotificationState {
    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }
}

/// Cheap-to-clone handle; clones share the same state.
#[derive(Clone)]
pub struct NotificationStore {
    api: NotificationsApi,
    state: Arc<watch::Sender<NotificationState>>,
}

impl NotificationStore {
    pub fn new(api: NotificationsApi) -> Self {
        let (tx, _rx) = watch::channel(NotificationState::default());
        Self {
            api,
            state: Arc::new(tx),
        }
    }

    pub fn snapshot(&self) -> NotificationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|s| s.error = None);
    }

    /// Close the details modal.
    pub fn clear_current(&self) {
        self.state.send_modify(|s| s.current = None);
    }

    // -----------------------------------------------------------------------
    // Fetches
    // -----------------------------------------------------------------------

    pub async fn fetch_notifications(&self, query: NotificationQuery) -> Envelope<NotificationPage> {
        begin(&self.state);
        let envelope = self.api.list(&query).await;
        finish(&self.state, "fetch_notifications", &envelope, |s, page| {
            let page = page.cloned().unwrap_or_default();
            s.pagination = Pagination::from_response(query.page.max(1), query.limit, page.total);
            s.notifications = page.notifications;
            s.query = query.clone();
        });
        envelope
    }

    pub async fn fetch_stats(&self) -> Envelope<NotificationStats> {
        begin(&self.state);
        let envelope = self.api.stats().await;
        finish(&self.state, "fetch_stats", &envelope, |s, stats| {
            s.stats = Some(stats.cloned().unwrap_or_default());
        });
        envelope
    }

    pub async fn fetch_notification(&self, id: i64) -> Envelope<Notification> {
        begin(&self.state);
        let envelope = self.api.get(id).await;
        finish(&self.state, "fetch_notification", &envelope, |s, n| {
            s.current = n.cloned();
        });
        envelope
    }

    async fn refresh_list(&self) {
        let query = self.state.borrow().query.clone();
        self.fetch_notifications(query).await;
    }

    async fn refresh_list_and_stats(&self) {
        self.refresh_list().await;
        self.fetch_stats().await;
    }

    // -----------------------------------------------------------------------
    // Sends
    // -----------------------------------------------------------------------

    pub async fn send_to_user(&self, req: &SendToUser) -> Envelope<SendReceipt> {
        begin(&self.state);
        let envelope = self.api.send_to_user(req).await;
        if finish(&self.state, "send_to_user", &envelope, |_, _| {}) {
            self.refresh_list_and_stats().await;
        }
        envelope
    }

    pub async fn send_to_multiple(&self, req: &SendToMultiple) -> Envelope<SendReceipt> {
        begin(&self.state);
        let envelope = self.api.send_to_multiple(req).await;
        if finish(&self.state, "send_to_multiple", &envelope, |_, _| {}) {
            self.refresh_list_and_stats().await;
        }
        envelope
    }

    pub async fn broadcast(&self, req: &Broadcast) -> Envelope<SendReceipt> {
        begin(&self.state);
        let envelope = self.api.broadcast(req).await;
        if finish(&self.state, "broadcast", &envelope, |_, _| {}) {
            self.refresh_list_and_stats().await;
        }
        envelope
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    pub async fn update_notification(
        &self,
        id: i64,
        update: &NotificationUpdate,
    ) -> Envelope<Value> {
        begin(&self.state);
        let envelope = self.api.update(id, update).await;
        if finish(&self.state, "update_notification", &envelope, |_, _| {}) {
            self.refresh_list().await;
        }
        envelope
    }

    pub async fn mark_as_read(&self, id: i64) -> Envelope<Value> {
        begin(&self.state);
        let envelope = self.api.mark_as_read(id).await;
        let read_at = Utc::now().to_rfc3339();
        if finish(&self.state, "mark_as_read", &envelope, |s, _| {
            for n in s.notifications.iter_mut().filter(|n| n.id == id) {
                n.is_read = true;
                n.read_at = Some(read_at.clone());
            }
            if let Some(current) = s.current.as_mut().filter(|n| n.id == id) {
                current.is_read = true;
                current.read_at = Some(read_at.clone());
            }
        }) {
            debug!(id, "notification marked read locally");
            self.fetch_stats().await;
        }
        envelope
    }

    pub async fn delete_notification(&self, id: i64) -> Envelope<Value> {
        begin(&self.state);
        let envelope = self.api.delete(id).await;
        if finish(&self.state, "delete_notification", &envelope, |s, _| {
            let before = s.notifications.len();
            s.notifications.retain(|n| n.id != id);
            if s.notifications.len() < before {
                s.pagination.remove_one();
            }
            if s.current.as_ref().is_some_and(|n| n.id == id) {
                s.current = None;
            }
        }) {
            self.fetch_stats().await;
        }
        envelope
    }

    // -----------------------------------------------------------------------
    // Cleanup
    // -----------------------------------------------------------------------

    /// Count what a cleanup of notifications older than `days` would remove.
    pub async fn preview_cleanup(&self, days: u32) -> Envelope<CleanupResult> {
        begin(&self.state);
        let envelope = self.api.cleanup(days, None).await;
        finish(&self.state, "preview_cleanup", &envelope, |s, preview| {
            s.cleanup_preview = preview.cloned();
        });
        envelope
    }

    /// Remove notifications older than `days`. `typed` is what the operator
    /// entered in the confirmation box; anything but the exact token is
    /// refused here and never reaches the server. A refusal is returned to
    /// the caller as an alert and does not touch the store error.
    pub async fn cleanup_old(&self, days: u32, typed: &str) -> Envelope<CleanupResult> {
        let confirmation = match Confirmation::parse(typed) {
            Ok(c) => c,
            Err(e) => {
                info!(days, "cleanup refused: confirmation text mismatch");
                return Envelope::fail(e.to_string());
            }
        };
        begin(&self.state);
        let envelope = self.api.cleanup(days, Some(confirmation)).await;
        if finish(&self.state, "cleanup_old", &envelope, |s, _| {
            s.cleanup_preview = None;
        }) {
            self.refresh_list_and_stats().await;
        }
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::ScriptedTransport;
    use crate::client::HttpMethod;
    use crate::error::ApiError;
    use crate::notifications_api::NotificationType;
    use serde_json::json;

    const LIST: &str = "/notifications/admin/all";
    const STATS: &str = "/notifications/admin/stats";

    fn row(id: i64, is_read: bool) -> Value {
        json!({
            "id": id,
            "user_id": 3,
            "title": format!("Notice {id}"),
            "message": "body",
            "type": "ORDER",
            "is_read": is_read,
            "created_at": "2026-03-01T09:00:00",
            "read_at": null
        })
    }

    fn setup() -> (Arc<ScriptedTransport>, NotificationStore) {
        let transport = Arc::new(ScriptedTransport::new());
        transport.reply(
            HttpMethod::Get,
            LIST,
            Ok(json!({ "notifications": [row(41, false), row(42, false), row(43, true)], "total": 23 })),
        );
        transport.reply(
            HttpMethod::Get,
            STATS,
            Ok(json!({ "total": 23, "unread": 2, "read": 21 })),
        );
        let store = NotificationStore::new(NotificationsApi::new(transport.clone()));
        (transport, store)
    }

    #[tokio::test]
    async fn fetch_replaces_list_and_derives_pagination() {
        let (_transport, store) = setup();
        let query = NotificationQuery {
            limit: 10,
            ..NotificationQuery::default()
        };
        let env = store.fetch_notifications(query.clone()).await;
        assert!(env.success);

        let state = store.snapshot();
        assert_eq!(state.notifications.len(), 3);
        assert_eq!(state.pagination, Pagination::from_response(1, 10, 23));
        assert_eq!(state.pagination.total_pages, 3);
        assert_eq!(state.query, query);
        assert!(!state.loading);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn failed_fetch_sets_error_and_keeps_list() {
        let (transport, store) = setup();
        transport.reply(
            HttpMethod::Get,
            LIST,
            Err(ApiError::Timeout("http://admin.test".into())),
        );
        // First call consumes the scripted success, the second gets the timeout.
        store.fetch_notifications(NotificationQuery::default()).await;
        store.fetch_notifications(NotificationQuery::default()).await;

        let state = store.snapshot();
        assert!(!state.loading);
        assert!(state.error.is_some());
        assert_eq!(state.notifications.len(), 3);

        store.clear_error();
        assert_eq!(store.snapshot().error, None);
    }

    #[tokio::test]
    async fn mark_as_read_patches_one_row_then_refreshes_stats() {
        let (transport, store) = setup();
        transport.reply(HttpMethod::Put, "/notifications/admin/42/read", Ok(json!({ "ok": true })));
        store.fetch_notifications(NotificationQuery::default()).await;
        let before = store.snapshot().notifications;
        transport.reset_calls();

        let env = store.mark_as_read(42).await;
        assert!(env.success);

        let after = store.snapshot().notifications;
        let marked = after.iter().find(|n| n.id == 42).expect("row 42");
        assert!(marked.is_read);
        assert!(marked.read_at.is_some());
        for (old, new) in before.iter().zip(after.iter()).filter(|(o, _)| o.id != 42) {
            assert_eq!(old, new);
        }
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, LIST), 0);
    }

    #[tokio::test]
    async fn broadcast_refreshes_list_and_stats_once_on_success() {
        let (transport, store) = setup();
        transport.reply(
            HttpMethod::Post,
            "/notifications/admin/broadcast",
            Ok(json!({ "count": 120, "message": "queued" })),
        );
        let req = Broadcast {
            title: "Maintenance".into(),
            message: "Back at 6am".into(),
            kind: NotificationType::System,
        };

        let env = store.broadcast(&req).await;
        assert!(env.success);
        assert_eq!(env.data.expect("receipt").sent, 120);
        assert_eq!(transport.calls_to(HttpMethod::Post, "/notifications/admin/broadcast"), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, LIST), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 1);
    }

    #[tokio::test]
    async fn failed_broadcast_refreshes_nothing() {
        let (transport, store) = setup();
        transport.reply(
            HttpMethod::Post,
            "/notifications/admin/broadcast",
            Err(ApiError::Status {
                status: 500,
                message: "queue down".into(),
            }),
        );
        let req = Broadcast {
            title: "Maintenance".into(),
            message: "Back at 6am".into(),
            kind: NotificationType::System,
        };

        let env = store.broadcast(&req).await;
        assert!(!env.success);
        assert_eq!(transport.calls_to(HttpMethod::Post, "/notifications/admin/broadcast"), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, LIST), 0);
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 0);
        assert_eq!(store.snapshot().error.as_deref(), Some("queue down"));
    }

    fn server_error() -> Result<Value, ApiError> {
        Err(ApiError::Status {
            status: 500,
            message: "queue down".into(),
        })
    }

    fn to_user() -> SendToUser {
        SendToUser {
            user_id: 7,
            title: "Order ready".into(),
            message: "Pick up at the counter".into(),
            kind: NotificationType::Order,
            reference_id: Some("A-1001".into()),
        }
    }

    fn to_many() -> SendToMultiple {
        SendToMultiple {
            user_ids: vec![1, 2, 3],
            title: "Promo".into(),
            message: "20% off today".into(),
            kind: NotificationType::Offer,
        }
    }

    #[tokio::test]
    async fn send_to_user_refreshes_list_and_stats_once_on_success() {
        let (transport, store) = setup();
        transport.reply(
            HttpMethod::Post,
            "/notifications/admin/send-to-user",
            Ok(json!({ "count": 1 })),
        );

        assert!(store.send_to_user(&to_user()).await.success);
        assert_eq!(transport.calls_to(HttpMethod::Post, "/notifications/admin/send-to-user"), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, LIST), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 1);
    }

    #[tokio::test]
    async fn failed_send_to_user_refreshes_nothing() {
        let (transport, store) = setup();
        transport.reply(HttpMethod::Post, "/notifications/admin/send-to-user", server_error());

        assert!(!store.send_to_user(&to_user()).await.success);
        assert_eq!(transport.calls_to(HttpMethod::Get, LIST), 0);
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 0);
        assert_eq!(store.snapshot().error.as_deref(), Some("queue down"));
    }

    #[tokio::test]
    async fn send_to_multiple_refreshes_list_and_stats_once_on_success() {
        let (transport, store) = setup();
        transport.reply(
            HttpMethod::Post,
            "/notifications/admin/send-to-multiple",
            Ok(json!({ "sent_count": 3 })),
        );

        let env = store.send_to_multiple(&to_many()).await;
        assert_eq!(env.data.map(|r| r.sent), Some(3));
        assert_eq!(
            transport.calls_to(HttpMethod::Post, "/notifications/admin/send-to-multiple"),
            1
        );
        assert_eq!(transport.calls_to(HttpMethod::Get, LIST), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 1);
    }

    #[tokio::test]
    async fn failed_send_to_multiple_refreshes_nothing() {
        let (transport, store) = setup();
        transport.reply(
            HttpMethod::Post,
            "/notifications/admin/send-to-multiple",
            server_error(),
        );

        assert!(!store.send_to_multiple(&to_many()).await.success);
        assert_eq!(transport.calls_to(HttpMethod::Get, LIST), 0);
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 0);
    }

    #[tokio::test]
    async fn update_refreshes_list_with_last_query() {
        let (transport, store) = setup();
        transport.reply(HttpMethod::Put, "/notifications/admin/42", Ok(json!({ "id": 42 })));
        let query = NotificationQuery {
            kind: Some(NotificationType::Order),
            ..NotificationQuery::default()
        };
        store.fetch_notifications(query).await;
        transport.reset_calls();

        let update = NotificationUpdate {
            title: Some("Renamed".into()),
            ..NotificationUpdate::default()
        };
        assert!(store.update_notification(42, &update).await.success);
        assert_eq!(transport.calls_to(HttpMethod::Put, "/notifications/admin/42"), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, LIST), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 0);

        let calls = transport.calls();
        let refetch = calls
            .iter()
            .find(|c| c.path == LIST)
            .expect("list refetched");
        assert_eq!(refetch.query_value("type"), Some("ORDER"));
    }

    #[tokio::test]
    async fn failed_update_does_not_refresh() {
        let (transport, store) = setup();
        transport.reply(HttpMethod::Put, "/notifications/admin/42", server_error());

        let update = NotificationUpdate {
            is_read: Some(true),
            ..NotificationUpdate::default()
        };
        assert!(!store.update_notification(42, &update).await.success);
        assert_eq!(transport.calls_to(HttpMethod::Get, LIST), 0);
    }

    #[tokio::test]
    async fn failed_mark_as_read_leaves_list_untouched() {
        let (transport, store) = setup();
        transport.reply(HttpMethod::Put, "/notifications/admin/42/read", server_error());
        store.fetch_notifications(NotificationQuery::default()).await;
        let before = store.snapshot().notifications;
        transport.reset_calls();

        assert!(!store.mark_as_read(42).await.success);
        let state = store.snapshot();
        assert_eq!(state.notifications, before);
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 0);
        assert_eq!(state.error.as_deref(), Some("queue down"));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn delete_removes_row_and_decrements_total() {
        let (transport, store) = setup();
        transport.reply(HttpMethod::Delete, "/notifications/admin/41", Ok(Value::Null));
        store
            .fetch_notifications(NotificationQuery {
                limit: 10,
                ..NotificationQuery::default()
            })
            .await;
        transport.reset_calls();

        assert!(store.delete_notification(41).await.success);
        let state = store.snapshot();
        assert!(state.notifications.iter().all(|n| n.id != 41));
        assert_eq!(state.pagination.total, 22);
        assert_eq!(state.pagination.total_pages, 3);
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 1);
    }

    #[tokio::test]
    async fn details_selection_is_set_and_cleared() {
        let (transport, store) = setup();
        transport.reply(HttpMethod::Get, "/notifications/admin/42", Ok(row(42, false)));
        store.fetch_notification(42).await;
        assert_eq!(store.snapshot().current.map(|n| n.id), Some(42));
        store.clear_current();
        assert_eq!(store.snapshot().current, None);
    }

    #[tokio::test]
    async fn cleanup_requires_exact_token_before_any_request() {
        let (transport, store) = setup();
        transport.reply(
            HttpMethod::Delete,
            "/notifications/admin/cleanup",
            Ok(json!({ "count": 17 })),
        );

        let preview = store.preview_cleanup(30).await;
        assert_eq!(preview.data.expect("preview").affected, 17);
        assert_eq!(transport.calls()[0].query_value("confirm"), Some("false"));
        assert!(store.snapshot().cleanup_preview.is_some());
        transport.reset_calls();

        let refused = store.cleanup_old(30, "delete").await;
        assert!(!refused.success);
        assert_eq!(refused.message, "Type DELETE to confirm this action");
        assert!(transport.calls().is_empty());
        assert_eq!(store.snapshot().error, None);

        let done = store.cleanup_old(30, "DELETE").await;
        assert!(done.success);
        assert_eq!(transport.calls()[0].query_value("confirm"), Some("true"));
        assert_eq!(store.snapshot().cleanup_preview, None);
        assert_eq!(transport.calls_to(HttpMethod::Get, LIST), 1);
        assert_eq!(transport.calls_to(HttpMethod::Get, STATS), 1);
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let (_transport, store) = setup();
        let mut rx = store.subscribe();
        store.fetch_stats().await;
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(rx.borrow_and_update().stats.as_ref().map(|s| s.unread), Some(2));
    }
}
