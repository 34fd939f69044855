//! Edges parked on a missing endpoint identity
//!
//! An edge whose endpoint is not indexed yet waits here, keyed by the
//! `(vertex_type, domain_id)` it needs, instead of spinning through the
//! queue. Materializing that vertex releases the waiters back to the queue.
//!
//! Lost wakeups are ruled out by lock order: a vertex is indexed before its
//! waiters are released under the lock, and an edge re-checks the index
//! under the same lock before it parks.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::operation::EdgeSpec;
use crate::error::Result;
use crate::store::DomainId;

type WaitKey = (String, DomainId);

#[derive(Default)]
pub struct DeferredEdges {
    waiting: Mutex<HashMap<WaitKey, Vec<EdgeSpec>>>,
}

impl DeferredEdges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `edge` on `(vertex_type, id)` unless `resolved` reports the
    /// identity is indexed by now. Returns the edge back in that case.
    pub fn park_unless<F>(
        &self,
        vertex_type: &str,
        id: &DomainId,
        edge: EdgeSpec,
        resolved: F,
    ) -> Result<Option<EdgeSpec>>
    where
        F: FnOnce() -> Result<bool>,
    {
        let mut waiting = self.lock();
        if resolved()? {
            return Ok(Some(edge));
        }
        waiting
            .entry((vertex_type.to_string(), id.clone()))
            .or_default()
            .push(edge);
        Ok(None)
    }

    /// Take every edge waiting on `(vertex_type, id)`
    pub fn release(&self, vertex_type: &str, id: &DomainId) -> Vec<EdgeSpec> {
        let mut waiting = self.lock();
        if waiting.is_empty() {
            return Vec::new();
        }
        waiting
            .remove(&(vertex_type.to_string(), id.clone()))
            .unwrap_or_default()
    }

    /// Number of parked edges
    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take every parked edge, ordered by the identity it waits on
    pub fn drain(&self) -> Vec<EdgeSpec> {
        let mut entries: Vec<(WaitKey, Vec<EdgeSpec>)> = self.lock().drain().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().flat_map(|(_, edges)| edges).collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WaitKey, Vec<EdgeSpec>>> {
        self.waiting.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
