//! Units of ingestion work

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::{DomainId, Properties};

/// Vertex to materialize; identity is `(vertex_type, id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VertexSpec {
    pub id: DomainId,
    pub vertex_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

/// Edge between two vertices given by domain identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    pub from_id: DomainId,
    pub from_type: String,
    pub to_id: DomainId,
    pub to_type: String,
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

impl fmt::Display for VertexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.vertex_type, self.id)
    }
}

impl fmt::Display for EdgeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] -{}-> {}[{}]",
            self.from_type, self.from_id, self.edge_type, self.to_type, self.to_id
        )
    }
}

/// Message carried by the operation queue
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateVertex(VertexSpec),
    CreateEdge(EdgeSpec),
    /// Poison pill: the worker that takes it exits
    Shutdown,
}

impl Operation {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Operation::Shutdown)
    }
}
