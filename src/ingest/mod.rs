//! Ingestion pipeline: operation queue, worker pool, edge resolution and
//! finalization
//!
//! ```text
//! add_vertex/add_edge ──► OperationQueue ──► Worker × N ──► GraphStore
//!                              ▲                 │
//!                              │   released /    │ endpoint missing
//!                              └── requeued ◄────┴──► DeferredEdges
//!
//! close(): wait_idle ─► Shutdown × N ─► join ─► Finalizer (single thread)
//! ```

mod deferred;
mod finalizer;
mod operation;
mod queue;
mod resolver;
mod stats;
mod worker;

pub use deferred::DeferredEdges;
pub use finalizer::{FinalizeSummary, Finalizer};
pub use operation::{EdgeSpec, Operation, VertexSpec};
pub use queue::OperationQueue;
pub use resolver::{resolve_edge, EdgeOutcome};
pub use stats::{LoadReport, LoadStats, StatsSnapshot};
pub use worker::{Worker, WorkerPool};

use std::sync::Arc;

use crate::store::{DomainId, GraphStore};

/// State shared by the producers, every worker and `close()`
pub struct IngestContext<S: GraphStore> {
    pub store: Arc<S>,
    pub queue: OperationQueue,
    pub deferred: DeferredEdges,
    pub stats: LoadStats,
}

impl<S: GraphStore> IngestContext<S> {
    pub fn new(store: S) -> Self {
        Self::with_shared_store(Arc::new(store))
    }

    pub fn with_shared_store(store: Arc<S>) -> Self {
        Self {
            store,
            queue: OperationQueue::new(),
            deferred: DeferredEdges::new(),
            stats: LoadStats::default(),
        }
    }

    /// Re-enqueue every edge parked on `(vertex_type, id)`; returns how many
    pub fn release(&self, vertex_type: &str, id: &DomainId) -> usize {
        let released = self.deferred.release(vertex_type, id);
        let count = released.len();
        for edge in released {
            self.queue.push(Operation::CreateEdge(edge));
        }
        if count > 0 {
            tracing::debug!("Released {} edge(s) waiting on {}[{}]", count, vertex_type, id);
        }
        count
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(self.deferred.len(), self.queue.outstanding())
    }
}
