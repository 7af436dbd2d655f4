//! Pieces shared by the notification and report stores.
//!
//! Every fetch action follows the same lifecycle: `loading` goes up and the
//! error slot is cleared, the API wrapper runs, then either the data slice is
//! overwritten or the envelope message lands in `error`, and `loading` comes
//! back down. Stores keep their state in a `watch` channel so any number of
//! views can subscribe.
//!
//! There is one `loading` flag per store. Two overlapping fetches are not
//! told apart and the later response wins.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

use crate::envelope::Envelope;

/// Page bookkeeping derived from the last list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            total: 0,
            total_pages: 0,
        }
    }
}

impl Pagination {
    pub fn from_response(page: u32, limit: u32, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: pages_for(total, limit),
        }
    }

    /// Optimistic bookkeeping after a single-item delete.
    pub fn remove_one(&mut self) {
        self.total = self.total.saturating_sub(1);
        self.total_pages = pages_for(self.total, self.limit);
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

fn pages_for(total: u64, limit: u32) -> u64 {
    if limit == 0 {
        0
    } else {
        total.div_ceil(u64::from(limit))
    }
}

/// The two slots every store state carries.
pub trait ActionState {
    fn set_loading(&mut self, loading: bool);
    fn set_error(&mut self, error: Option<String>);
}

/// Enter an action: loading on, previous error cleared.
pub(crate) fn begin<S: ActionState>(state: &watch::Sender<S>) {
    state.send_modify(|s| {
        s.set_loading(true);
        s.set_error(None);
    });
}

/// Leave an action. On success `apply` receives the envelope data (which a
/// successful write call may legitimately omit); on failure the message
/// becomes the store error. Returns whether the action succeeded.
pub(crate) fn finish<S, T>(
    state: &watch::Sender<S>,
    action: &'static str,
    envelope: &Envelope<T>,
    apply: impl FnOnce(&mut S, Option<&T>),
) -> bool
where
    S: ActionState,
{
    state.send_modify(|s| {
        if envelope.success {
            apply(s, envelope.data.as_ref());
        } else {
            warn!(action, error = %envelope.message, "store action failed");
            s.set_error(Some(envelope.message.clone()));
        }
        s.set_loading(false);
    });
    envelope.success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Probe {
        loading: bool,
        error: Option<String>,
        items: Vec<u32>,
    }

    impl ActionState for Probe {
        fn set_loading(&mut self, loading: bool) {
            self.loading = loading;
        }
        fn set_error(&mut self, error: Option<String>) {
            self.error = error;
        }
    }

    #[test]
    fn pagination_is_derived_from_total() {
        let mut p = Pagination::from_response(1, 20, 41);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next());
        assert!(!p.has_prev());

        p.remove_one();
        assert_eq!((p.total, p.total_pages), (40, 2));

        let empty = Pagination::from_response(1, 0, 10);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn lifecycle_sets_and_clears_flags() {
        let (tx, rx) = watch::channel(Probe {
            error: Some("stale".into()),
            ..Probe::default()
        });

        begin(&tx);
        assert!(rx.borrow().loading);
        assert_eq!(rx.borrow().error, None);

        let ok = finish(&tx, "probe", &Envelope::ok(vec![1, 2], "ok"), |s, data| {
            s.items = data.cloned().unwrap_or_default();
        });
        assert!(ok);
        assert!(!rx.borrow().loading);
        assert_eq!(rx.borrow().items, vec![1, 2]);

        begin(&tx);
        let failed = finish(&tx, "probe", &Envelope::<Vec<u32>>::fail("boom"), |s, _| {
            s.items.clear();
        });
        assert!(!failed);
        assert!(!rx.borrow().loading);
        assert_eq!(rx.borrow().error.as_deref(), Some("boom"));
        assert_eq!(rx.borrow().items, vec![1, 2]);
    }
}
