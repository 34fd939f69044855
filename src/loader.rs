//! Public submission API

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::config::{Credentials, LoaderConfig, Target};
use crate::error::{LoadError, Result};
use crate::ingest::{
    EdgeSpec, FinalizeSummary, Finalizer, IngestContext, LoadReport, Operation, StatsSnapshot, VertexSpec,
    WorkerPool,
};
use crate::store::{DomainId, GraphStore, Properties, StoreHandle, EDGE_BASE, VERTEX_BASE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoaderState {
    Open,
    Closing,
    Closed,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Order-independent bulk loader.
///
/// Submissions are fire-and-forget and may come from any number of threads;
/// edges may arrive before the vertices they connect. [`Loader::close`]
/// drains everything, stops the workers and writes the embedded adjacency
/// fields.
pub struct Loader<S: GraphStore> {
    ctx: Arc<IngestContext<S>>,
    config: LoaderConfig,
    pool: Mutex<Option<WorkerPool>>,
    /// Submissions hold a read guard while enqueueing, `close()` takes the
    /// write side to stop them.
    state: RwLock<LoaderState>,
}

impl Loader<StoreHandle> {
    /// Connect to `memory:<name>`, `sled:<path>` or a bare sled path.
    /// Credentials default to `admin`/`admin`.
    pub fn connect(target: &str, credentials: Option<Credentials>) -> Result<Self> {
        let mut config = LoaderConfig::default();
        if let Some(credentials) = credentials {
            config.credentials = credentials;
        }
        Self::connect_with_config(target, config)
    }

    pub fn connect_with_config(target: &str, config: LoaderConfig) -> Result<Self> {
        let target = Target::parse(target)?;
        let store = StoreHandle::connect(&target, &config.credentials)?;
        Self::with_store(store, config)
    }
}

impl<S: GraphStore> Loader<S> {
    /// Start a loader over an already opened store
    pub fn with_store(store: S, config: LoaderConfig) -> Result<Self> {
        config.validate()?;
        store.declare_vertex_type(VERTEX_BASE, None)?;
        store.declare_edge_type(EDGE_BASE, None)?;

        let ctx = Arc::new(IngestContext::new(store));
        let pool = WorkerPool::spawn(&ctx, config.workers)?;

        Ok(Self {
            ctx,
            config,
            pool: Mutex::new(Some(pool)),
            state: RwLock::new(LoaderState::Open),
        })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.ctx.store
    }

    /// Run `f` only while the loader accepts submissions
    fn while_open<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if *state != LoaderState::Open {
            return Err(LoadError::Closed);
        }
        f()
    }

    // === SCHEMA ===

    /// Declare a vertex type (under `V` unless a superclass is named) and
    /// its unique domain-id index
    pub fn create_vertex_type(&self, name: &str, superclass: Option<&str>) -> Result<()> {
        self.while_open(|| {
            let superclass = superclass.unwrap_or(VERTEX_BASE);
            self.ctx.store.declare_vertex_type(name, Some(superclass))?;
            tracing::info!("Declared vertex type {} (extends {})", name, superclass);
            Ok(())
        })
    }

    /// Declare an edge type (under `E` unless a superclass is named) and
    /// its adjacency side-indexes
    pub fn create_edge_type(&self, name: &str, superclass: Option<&str>) -> Result<()> {
        self.while_open(|| {
            let superclass = superclass.unwrap_or(EDGE_BASE);
            self.ctx.store.declare_edge_type(name, Some(superclass))?;
            tracing::info!("Declared edge type {} (extends {})", name, superclass);
            Ok(())
        })
    }

    // === SUBMISSION ===

    pub fn add_vertex(
        &self,
        id: impl Into<DomainId>,
        vertex_type: &str,
        properties: Option<Properties>,
    ) -> Result<()> {
        self.submit(Operation::CreateVertex(VertexSpec {
            id: id.into(),
            vertex_type: vertex_type.to_string(),
            properties,
        }))
    }

    pub fn add_edge(
        &self,
        from_id: impl Into<DomainId>,
        from_type: &str,
        to_id: impl Into<DomainId>,
        to_type: &str,
        edge_type: &str,
        properties: Option<Properties>,
    ) -> Result<()> {
        self.submit(Operation::CreateEdge(EdgeSpec {
            from_id: from_id.into(),
            from_type: from_type.to_string(),
            to_id: to_id.into(),
            to_type: to_type.to_string(),
            edge_type: edge_type.to_string(),
            properties,
        }))
    }

    fn submit(&self, op: Operation) -> Result<()> {
        self.while_open(|| {
            self.ctx.queue.push(op);
            Ok(())
        })
    }

    // === PROGRESS ===

    /// Block until nothing is queued or executing. Parked edges do not count.
    pub fn wait_idle(&self) {
        self.ctx.queue.wait_idle();
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.snapshot()
    }

    // === SHUTDOWN ===

    /// Drain, stop the workers, finalize adjacency fields and report.
    ///
    /// Submissions are rejected from the moment this starts. Finalization
    /// covers every edge class in the store schema and is best-effort: field
    /// failures are counted in the report. The loader ends up closed even
    /// when the final flush fails. A second call returns
    /// [`LoadError::AlreadyClosed`] and changes nothing.
    pub fn close(&self) -> Result<LoadReport> {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state != LoaderState::Open {
                return Err(LoadError::AlreadyClosed);
            }
            *state = LoaderState::Closing;
        }

        let result = self.drain_and_finalize();
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = LoaderState::Closed;
        let report = result?;

        tracing::info!(
            "Load finished: {} vertices, {} edges, {} dropped, {} unresolved",
            report.vertices_created,
            report.edges_created,
            report.dropped_vertices + report.dropped_edges,
            report.unresolved_edges.len()
        );
        Ok(report)
    }

    fn drain_and_finalize(&self) -> Result<LoadReport> {
        self.ctx.queue.wait_idle();
        let workers_lost = match lock(&self.pool).take() {
            Some(pool) => pool.shutdown(&self.ctx),
            None => 0,
        };

        let unresolved = self.ctx.deferred.drain();
        for edge in &unresolved {
            tracing::warn!("Edge {} never resolved, dropped", edge);
        }

        let finalized = match self.ctx.store.edge_types() {
            Ok(edge_types) => {
                Finalizer::new(self.ctx.store.as_ref(), self.config.finalize_batch_size).run(&edge_types)
            }
            Err(err) => {
                tracing::error!("Edge classes could not be listed, nothing finalized: {}", err);
                FinalizeSummary { written: 0, failed: 1 }
            }
        };

        let stats = self.ctx.snapshot();
        let report = LoadReport {
            vertices_created: stats.vertices_created,
            edges_created: stats.edges_created,
            deferrals: stats.deferrals,
            dropped_vertices: stats.dropped_vertices,
            dropped_edges: stats.dropped_edges,
            unresolved_edges: unresolved,
            embedded_fields_written: finalized.written,
            embedded_fields_failed: finalized.failed,
            workers_lost,
        };

        self.ctx.store.flush()?;
        Ok(report)
    }

    pub fn is_closed(&self) -> bool {
        *self.state.read().unwrap_or_else(PoisonError::into_inner) != LoaderState::Open
    }
}

impl<S: GraphStore> Drop for Loader<S> {
    fn drop(&mut self) {
        let pool = self
            .pool
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            tracing::warn!("Loader dropped without close(); adjacency fields not finalized");
            pool.shutdown(&self.ctx);
        }
    }
}
