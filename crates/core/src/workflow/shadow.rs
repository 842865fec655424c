use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::domain::request::{Request, RequestId};

#[derive(Clone, Debug)]
struct ShadowEntry {
    confirmed: Option<Request>,
    staged: Request,
}

/// Optimistic local copy of the requests with a write in flight.
///
/// A transition is staged first and never becomes visible through
/// [`ShadowView::current`]; readers see the copy the store last accepted.
/// Confirming or reverting drops the entry, so the map only holds writes
/// that have not settled yet.
#[derive(Debug, Default)]
pub struct ShadowView {
    entries: RwLock<HashMap<RequestId, ShadowEntry>>,
}

impl ShadowView {
    /// Records `next` as pending on top of `previous`, the value the store
    /// holds now (`None` for a new request).
    pub async fn stage(&self, previous: Option<Request>, next: Request) {
        let mut entries = self.entries.write().await;
        match entries.get_mut(&next.id) {
            Some(entry) => entry.staged = next,
            None => {
                entries.insert(next.id.clone(), ShadowEntry { confirmed: previous, staged: next });
            }
        }
    }

    /// Returns the value the store accepted.
    pub async fn confirm(&self, id: &RequestId) -> Option<Request> {
        self.entries.write().await.remove(id).map(|entry| entry.staged)
    }

    /// Drops the staged value and returns the last confirmed copy.
    pub async fn revert(&self, id: &RequestId) -> Option<Request> {
        self.entries.write().await.remove(id).and_then(|entry| entry.confirmed)
    }

    pub async fn current(&self, id: &RequestId) -> Option<Request> {
        self.entries.read().await.get(id).and_then(|entry| entry.confirmed.clone())
    }

    pub async fn has_staged(&self, id: &RequestId) -> bool {
        self.entries.read().await.contains_key(id)
    }

    pub async fn in_flight(&self) -> usize {
        self.entries.read().await.len()
    }
}
