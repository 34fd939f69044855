//! Outcome counters shared by the workers

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::operation::EdgeSpec;

#[derive(Debug, Default)]
pub struct LoadStats {
    vertices_created: AtomicU64,
    edges_created: AtomicU64,
    deferrals: AtomicU64,
    dropped_vertices: AtomicU64,
    dropped_edges: AtomicU64,
}

impl LoadStats {
    pub fn vertex_created(&self) {
        self.vertices_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn edge_created(&self) {
        self.edges_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn deferred(&self) {
        self.deferrals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn vertex_dropped(&self) {
        self.dropped_vertices.fetch_add(1, Ordering::Relaxed);
    }

    pub fn edge_dropped(&self) {
        self.dropped_edges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, parked: usize, outstanding: usize) -> StatsSnapshot {
        StatsSnapshot {
            vertices_created: self.vertices_created.load(Ordering::Relaxed),
            edges_created: self.edges_created.load(Ordering::Relaxed),
            deferrals: self.deferrals.load(Ordering::Relaxed),
            dropped_vertices: self.dropped_vertices.load(Ordering::Relaxed),
            dropped_edges: self.dropped_edges.load(Ordering::Relaxed),
            parked,
            outstanding,
        }
    }
}

/// Point-in-time view of a running load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub vertices_created: u64,
    pub edges_created: u64,
    /// Times an edge was parked on a missing endpoint
    pub deferrals: u64,
    pub dropped_vertices: u64,
    pub dropped_edges: u64,
    /// Edges currently parked
    pub parked: usize,
    /// Operations queued or executing
    pub outstanding: usize,
}

/// Summary returned by [`Loader::close`](crate::Loader::close)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub vertices_created: u64,
    pub edges_created: u64,
    pub deferrals: u64,
    /// Vertex operations discarded on a store failure or duplicate identity
    pub dropped_vertices: u64,
    /// Edge operations discarded on a store failure
    pub dropped_edges: u64,
    /// Edges still waiting on an endpoint that never materialized
    pub unresolved_edges: Vec<EdgeSpec>,
    pub embedded_fields_written: u64,
    /// Embedded fields (or whole side-indexes) finalization could not write
    pub embedded_fields_failed: u64,
    /// Worker threads that died outside an operation
    pub workers_lost: usize,
}

impl LoadReport {
    /// True when nothing was dropped and nothing is left unresolved
    pub fn is_complete(&self) -> bool {
        self.dropped_vertices == 0
            && self.dropped_edges == 0
            && self.unresolved_edges.is_empty()
            && self.embedded_fields_failed == 0
            && self.workers_lost == 0
    }
}
