//! Record store contract consumed by the ingestion pipeline
//!
//! The loader never talks to a concrete database directly. Everything it
//! needs (schema declaration, the per-type unique domain-id index, the
//! per-(edge type, direction) adjacency side-index and plain record writes)
//! goes through [`GraphStore`].

pub mod handle;
pub mod memory;
pub mod sled_store;

pub use handle::{IndexHandle, StoreHandle};
pub use memory::{MemoryIndex, MemoryStore};
pub use sled_store::{SledIndex, SledStore};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

/// Free-form record properties
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Root class of every vertex type
pub const VERTEX_BASE: &str = "V";

/// Root class of every edge type
pub const EDGE_BASE: &str = "E";

/// Reference assigned by the store when a record is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreRef(pub u64);

impl StoreRef {
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_be_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
        Some(Self(u64::from_be_bytes(raw)))
    }
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Application-level vertex identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DomainId {
    Int(i64),
    Str(String),
}

impl DomainId {
    /// Tagged byte encoding used as an index key.
    ///
    /// The tag keeps `Int(0)` and `Str("")` apart.
    pub fn to_key(&self) -> Vec<u8> {
        match self {
            DomainId::Int(n) => {
                let mut key = Vec::with_capacity(9);
                key.push(0);
                key.extend_from_slice(&n.to_be_bytes());
                key
            }
            DomainId::Str(s) => {
                let mut key = Vec::with_capacity(s.len() + 1);
                key.push(1);
                key.extend_from_slice(s.as_bytes());
                key
            }
        }
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainId::Int(n) => write!(f, "{}", n),
            DomainId::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for DomainId {
    fn from(s: &str) -> Self {
        DomainId::Str(s.to_string())
    }
}

impl From<String> for DomainId {
    fn from(s: String) -> Self {
        DomainId::Str(s)
    }
}

impl From<i64> for DomainId {
    fn from(n: i64) -> Self {
        DomainId::Int(n)
    }
}

/// Side of an edge an adjacency entry is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Keyed by the edge's source vertex
    Out,
    /// Keyed by the edge's target vertex
    In,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Out, Direction::In];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Out => "out",
            Direction::In => "in",
        }
    }

    /// Name of the embedded vertex field holding this direction's edges,
    /// e.g. `out_Friend`
    pub fn field_name(self, edge_type: &str) -> String {
        format!("{}_{}", self.as_str(), edge_type)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Vertex,
    Edge,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Vertex => f.write_str("vertex type"),
            TypeKind::Edge => f.write_str("edge type"),
        }
    }
}

/// Declared class in the store schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub kind: TypeKind,
    pub superclass: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordKind {
    Vertex { id: DomainId },
    Edge { from: StoreRef, to: StoreRef },
}

/// Stored record as seen through the contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub class: String,
    pub kind: RecordKind,
    #[serde(default)]
    pub properties: Properties,
    /// Embedded reference collections written by finalization
    #[serde(default)]
    pub embedded: BTreeMap<String, Vec<StoreRef>>,
}

impl Record {
    pub fn new(class: impl Into<String>, kind: RecordKind, properties: Properties) -> Self {
        Self {
            class: class.into(),
            kind,
            properties,
            embedded: BTreeMap::new(),
        }
    }

    pub fn domain_id(&self) -> Option<&DomainId> {
        match &self.kind {
            RecordKind::Vertex { id } => Some(id),
            RecordKind::Edge { .. } => None,
        }
    }

    pub fn endpoints(&self) -> Option<(StoreRef, StoreRef)> {
        match self.kind {
            RecordKind::Edge { from, to } => Some((from, to)),
            RecordKind::Vertex { .. } => None,
        }
    }

    pub fn embedded(&self, field: &str) -> Option<&[StoreRef]> {
        self.embedded.get(field).map(|refs| refs.as_slice())
    }
}

/// Work out which classes a declaration has to create, in creation order.
///
/// Redeclaring a class of the same kind creates nothing. A named superclass
/// that does not exist yet is created first, as a root class of the same
/// kind.
pub(crate) fn plan_declaration<F>(
    lookup: F,
    name: &str,
    kind: TypeKind,
    superclass: Option<&str>,
) -> Result<Vec<(String, TypeDef)>>
where
    F: Fn(&str) -> Result<Option<TypeDef>>,
{
    let check_kind = |class: &str, def: &TypeDef| {
        if def.kind == kind {
            Ok(())
        } else {
            Err(LoadError::TypeKindMismatch {
                name: class.to_string(),
                existing: def.kind.to_string(),
            })
        }
    };

    if let Some(existing) = lookup(name)? {
        check_kind(name, &existing)?;
        return Ok(Vec::new());
    }

    let mut plan = Vec::with_capacity(2);
    if let Some(sup) = superclass {
        match lookup(sup)? {
            Some(def) => check_kind(sup, &def)?,
            None => plan.push((sup.to_string(), TypeDef { kind, superclass: None })),
        }
    }
    plan.push((
        name.to_string(),
        TypeDef {
            kind,
            superclass: superclass.map(str::to_string),
        },
    ));
    Ok(plan)
}

/// Fail unless `class` is declared with the given kind
pub(crate) fn require_kind(def: Option<TypeDef>, class: &str, kind: TypeKind) -> Result<()> {
    match def {
        Some(def) if def.kind == kind => Ok(()),
        Some(def) => Err(LoadError::TypeKindMismatch {
            name: class.to_string(),
            existing: def.kind.to_string(),
        }),
        None => Err(LoadError::UnknownType(class.to_string())),
    }
}

/// Handle to the unique domain-id index of one vertex type
pub trait UniqueIndex: Clone + Send + 'static {
    fn lookup(&self, id: &DomainId) -> Result<Option<StoreRef>>;

    /// Insert a new identity. Fails with `LoadError::DuplicateVertex` if the
    /// identity is already indexed.
    fn insert(&self, id: &DomainId, record: StoreRef) -> Result<()>;
}

/// Narrow store contract used by the loader
pub trait GraphStore: Send + Sync + 'static {
    type Index: UniqueIndex;

    // === SCHEMA ===

    /// Declare a vertex type and provision its unique domain-id index.
    /// Declaring an existing vertex type is a no-op.
    fn declare_vertex_type(&self, name: &str, superclass: Option<&str>) -> Result<()>;

    /// Declare an edge type and provision its two adjacency side-indexes.
    fn declare_edge_type(&self, name: &str, superclass: Option<&str>) -> Result<()>;

    fn type_def(&self, name: &str) -> Result<Option<TypeDef>>;

    /// Every declared edge class, base classes and earlier sessions included
    fn edge_types(&self) -> Result<BTreeSet<String>>;

    // === UNIQUE INDEX ===

    /// Resolve the unique index handle for a declared vertex type
    fn unique_index(&self, vertex_type: &str) -> Result<Self::Index>;

    // === ADJACENCY SIDE-INDEX ===

    fn adjacency_insert(
        &self,
        edge_type: &str,
        direction: Direction,
        vertex: StoreRef,
        edge: StoreRef,
    ) -> Result<()>;

    /// Distinct vertex keys strictly greater than `after`, ascending, at most
    /// `limit` of them
    fn adjacency_keys(
        &self,
        edge_type: &str,
        direction: Direction,
        after: Option<StoreRef>,
        limit: usize,
    ) -> Result<Vec<StoreRef>>;

    fn adjacency_lookup(
        &self,
        edge_type: &str,
        direction: Direction,
        vertex: StoreRef,
    ) -> Result<BTreeSet<StoreRef>>;

    // === RECORDS ===

    fn create_record(&self, class: &str, kind: RecordKind, properties: Properties) -> Result<StoreRef>;

    fn remove_record(&self, record: StoreRef) -> Result<()>;

    fn load_record(&self, record: StoreRef) -> Result<Option<Record>>;

    /// All records in ascending ref order
    fn scan_records(&self) -> Result<Vec<(StoreRef, Record)>>;

    fn set_embedded_field(&self, vertex: StoreRef, field: &str, refs: Vec<StoreRef>) -> Result<()>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
