//! CreateEdge execution: resolve both endpoints or park

use super::operation::{EdgeSpec, Operation};
use super::IngestContext;
use crate::error::Result;
use crate::store::{Direction, DomainId, GraphStore, RecordKind, StoreRef, UniqueIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// Edge record and both adjacency entries written
    Created(StoreRef),
    /// Waiting on a missing endpoint
    Parked,
    /// Endpoint appeared while parking; sent back to the queue tail
    Requeued,
}

/// Materialize `spec` if both endpoints are indexed.
///
/// Target first, then source. Nothing is written until both resolve, so a
/// deferred edge leaves no trace in the store. Once both resolve, the edge
/// record is created and one entry goes into each side-index; these writes
/// are independent, and a failure part way leaves the earlier ones in place.
pub fn resolve_edge<S: GraphStore>(
    ctx: &IngestContext<S>,
    from_index: &S::Index,
    to_index: &S::Index,
    spec: &EdgeSpec,
) -> Result<EdgeOutcome> {
    let Some(to) = to_index.lookup(&spec.to_id)? else {
        return defer(ctx, to_index, &spec.to_type, &spec.to_id, spec);
    };
    let Some(from) = from_index.lookup(&spec.from_id)? else {
        return defer(ctx, from_index, &spec.from_type, &spec.from_id, spec);
    };

    let store = &ctx.store;
    let properties = spec.properties.clone().unwrap_or_default();
    let edge = store.create_record(&spec.edge_type, RecordKind::Edge { from, to }, properties)?;
    store.adjacency_insert(&spec.edge_type, Direction::Out, from, edge)?;
    store.adjacency_insert(&spec.edge_type, Direction::In, to, edge)?;

    tracing::trace!("Created edge {} as {}", spec, edge);
    Ok(EdgeOutcome::Created(edge))
}

fn defer<S: GraphStore>(
    ctx: &IngestContext<S>,
    index: &S::Index,
    vertex_type: &str,
    id: &DomainId,
    spec: &EdgeSpec,
) -> Result<EdgeOutcome> {
    let parked = ctx.deferred.park_unless(vertex_type, id, spec.clone(), || {
        Ok(index.lookup(id)?.is_some())
    })?;

    match parked {
        None => {
            ctx.stats.deferred();
            tracing::debug!("Parked edge {} on {}[{}]", spec, vertex_type, id);
            Ok(EdgeOutcome::Parked)
        }
        Some(edge) => {
            ctx.queue.push(Operation::CreateEdge(edge));
            Ok(EdgeOutcome::Requeued)
        }
    }
}
