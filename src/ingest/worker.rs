//! Worker pool draining the operation queue
//!
//! Architecture:
//! ```text
//! Producer(s)            Channel                  Worker threads
//!     │                     │                          │
//!     ├─ add_vertex() ─────►│ CreateVertex ───────────►│ create record, index id,
//!     │                     │                          │ release parked edges
//!     ├─ add_edge() ───────►│ CreateEdge ─────────────►│ resolve_edge()
//!     │                     │◄──── released/requeued ──┤
//!     ├─ close() ──────────►│ Shutdown × N ───────────►│ exit
//! ```

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::operation::{EdgeSpec, Operation, VertexSpec};
use super::resolver::{resolve_edge, EdgeOutcome};
use super::IngestContext;
use crate::error::{LoadError, Result};
use crate::store::{GraphStore, RecordKind, UniqueIndex};

/// One worker's execution context
pub struct Worker<S: GraphStore> {
    id: usize,
    ctx: Arc<IngestContext<S>>,
    /// Resolved unique index handles by vertex type
    indexes: HashMap<String, S::Index>,
}

impl<S: GraphStore> Worker<S> {
    pub fn new(id: usize, ctx: Arc<IngestContext<S>>) -> Self {
        Self {
            id,
            ctx,
            indexes: HashMap::new(),
        }
    }

    /// Drain the queue until a `Shutdown` arrives
    pub fn run(mut self) {
        tracing::debug!("Worker {} started", self.id);

        while let Some(op) = self.ctx.queue.pop() {
            match op {
                Operation::Shutdown => break,
                Operation::CreateVertex(spec) => {
                    if !self.guarded(|worker| worker.apply_vertex(&spec)) {
                        self.ctx.stats.vertex_dropped();
                    }
                }
                Operation::CreateEdge(spec) => {
                    if !self.guarded(|worker| worker.apply_edge(&spec)) {
                        self.ctx.stats.edge_dropped();
                    }
                }
            }
            self.ctx.queue.complete();
        }

        tracing::debug!("Worker {} stopped", self.id);
    }

    /// Run `f`, containing a panic to the current operation. False if it
    /// panicked.
    fn guarded(&mut self, f: impl FnOnce(&mut Self)) -> bool {
        let completed = panic::catch_unwind(AssertUnwindSafe(|| f(self))).is_ok();
        if !completed {
            tracing::error!("Worker {} panicked, operation dropped", self.id);
        }
        completed
    }

    /// Create one vertex. A failure is logged, counted and the vertex is
    /// discarded.
    pub fn apply_vertex(&mut self, spec: &VertexSpec) {
        if let Err(err) = self.create_vertex(spec) {
            self.ctx.stats.vertex_dropped();
            tracing::warn!("Worker {} dropped vertex {}: {}", self.id, spec, err);
        }
    }

    /// Create, park or requeue one edge. A failure is logged, counted and
    /// the edge is discarded.
    pub fn apply_edge(&mut self, spec: &EdgeSpec) {
        match self.create_edge(spec) {
            Ok(EdgeOutcome::Created(_)) => self.ctx.stats.edge_created(),
            Ok(EdgeOutcome::Parked) | Ok(EdgeOutcome::Requeued) => {}
            Err(err) => {
                self.ctx.stats.edge_dropped();
                tracing::warn!("Worker {} dropped edge {}: {}", self.id, spec, err);
            }
        }
    }

    fn index(&mut self, vertex_type: &str) -> Result<S::Index> {
        if let Some(index) = self.indexes.get(vertex_type) {
            return Ok(index.clone());
        }
        let index = self.ctx.store.unique_index(vertex_type)?;
        self.indexes.insert(vertex_type.to_string(), index.clone());
        Ok(index)
    }

    fn create_vertex(&mut self, spec: &VertexSpec) -> Result<()> {
        let index = self.index(&spec.vertex_type)?;
        if index.lookup(&spec.id)?.is_some() {
            return Err(LoadError::DuplicateVertex {
                vertex_type: spec.vertex_type.clone(),
                id: spec.id.to_string(),
            });
        }

        let store = &self.ctx.store;
        let kind = RecordKind::Vertex { id: spec.id.clone() };
        let properties = spec.properties.clone().unwrap_or_default();
        let record = store.create_record(&spec.vertex_type, kind, properties)?;

        // A concurrent duplicate can still win the index; drop our record.
        if let Err(err) = index.insert(&spec.id, record) {
            if let Err(cleanup) = store.remove_record(record) {
                tracing::warn!("Orphan record {} for {} left behind: {}", record, spec, cleanup);
            }
            return Err(err);
        }

        self.ctx.stats.vertex_created();
        self.ctx.release(&spec.vertex_type, &spec.id);
        Ok(())
    }

    fn create_edge(&mut self, spec: &EdgeSpec) -> Result<EdgeOutcome> {
        let to_index = self.index(&spec.to_type)?;
        let from_index = if spec.from_type == spec.to_type {
            to_index.clone()
        } else {
            self.index(&spec.from_type)?
        };
        resolve_edge(&self.ctx, &from_index, &to_index, spec)
    }
}

/// Fixed set of worker threads
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn<S: GraphStore>(ctx: &Arc<IngestContext<S>>, workers: usize) -> Result<Self> {
        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let worker = Worker::new(id, Arc::clone(ctx));
            let spawned = thread::Builder::new()
                .name(format!("graphload-worker-{}", id))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    let _ = Self { handles }.shutdown(ctx.as_ref());
                    return Err(err.into());
                }
            }
        }

        tracing::info!("Started {} ingestion worker(s)", workers);
        Ok(Self { handles })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Send exactly one `Shutdown` per worker and join them all. Returns
    /// how many workers had died instead of exiting on their pill.
    pub fn shutdown<S: GraphStore>(self, ctx: &IngestContext<S>) -> usize {
        for _ in 0..self.handles.len() {
            ctx.queue.push(Operation::Shutdown);
        }

        let mut lost = 0;
        for handle in self.handles {
            if handle.join().is_err() {
                lost += 1;
            }
        }
        if lost > 0 {
            tracing::error!("{} ingestion worker(s) died", lost);
        } else {
            tracing::info!("Ingestion workers stopped");
        }
        lost
    }
}
