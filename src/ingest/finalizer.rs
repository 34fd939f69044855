//! Consolidation of the adjacency side-indexes into embedded vertex fields

use std::collections::BTreeSet;

use crate::error::Result;
use crate::store::{Direction, GraphStore, StoreRef};

/// Fields written and fields that could not be written by one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeSummary {
    pub written: u64,
    pub failed: u64,
}

/// Single-threaded pass run once the worker pool has exited
pub struct Finalizer<'a, S: GraphStore> {
    store: &'a S,
    batch_size: usize,
}

impl<'a, S: GraphStore> Finalizer<'a, S> {
    pub fn new(store: &'a S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Write `out_<type>` / `in_<type>` on every vertex present in the
    /// side-indexes of `edge_types`.
    ///
    /// A failed field write is logged and counted, and the pass moves on.
    /// A failed key page ends that side-index only.
    pub fn run(&self, edge_types: &BTreeSet<String>) -> FinalizeSummary {
        let mut summary = FinalizeSummary::default();
        for edge_type in edge_types {
            for direction in Direction::ALL {
                let before = summary;
                if let Err(err) = self.populate(edge_type, direction, &mut summary) {
                    summary.failed += 1;
                    tracing::error!(
                        "Side-index {} of {} could not be read: {}",
                        direction,
                        edge_type,
                        err
                    );
                }
                tracing::info!(
                    "Finalized {} {} field(s) for edge type {} ({} failed)",
                    summary.written - before.written,
                    direction.field_name(edge_type),
                    edge_type,
                    summary.failed - before.failed
                );
            }
        }
        summary
    }

    /// One field write per vertex key; the side-index is paged by key
    fn populate(&self, edge_type: &str, direction: Direction, summary: &mut FinalizeSummary) -> Result<()> {
        let field = direction.field_name(edge_type);
        let mut after: Option<StoreRef> = None;

        loop {
            let keys = self
                .store
                .adjacency_keys(edge_type, direction, after, self.batch_size)?;
            let Some(&last) = keys.last() else {
                break;
            };

            for vertex in &keys {
                match self.write_field(edge_type, direction, *vertex, &field) {
                    Ok(()) => summary.written += 1,
                    Err(err) => {
                        summary.failed += 1;
                        tracing::warn!("Field {} on {} not written: {}", field, vertex, err);
                    }
                }
            }

            if keys.len() < self.batch_size {
                break;
            }
            after = Some(last);
        }
        Ok(())
    }

    fn write_field(&self, edge_type: &str, direction: Direction, vertex: StoreRef, field: &str) -> Result<()> {
        let edges = self.store.adjacency_lookup(edge_type, direction, vertex)?;
        self.store
            .set_embedded_field(vertex, field, edges.into_iter().collect())
    }
}
