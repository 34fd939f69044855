//! Store chosen at runtime from a connection target

use std::collections::BTreeSet;

use super::memory::MemoryIndex;
use super::sled_store::SledIndex;
use super::{
    Direction, DomainId, GraphStore, MemoryStore, Properties, Record, RecordKind, SledStore,
    StoreRef, TypeDef, UniqueIndex,
};
use crate::config::{Credentials, Target};
use crate::error::Result;

pub enum StoreHandle {
    Memory(MemoryStore),
    Sled(SledStore),
}

#[derive(Clone)]
pub enum IndexHandle {
    Memory(MemoryIndex),
    Sled(SledIndex),
}

impl StoreHandle {
    pub fn connect(target: &Target, credentials: &Credentials) -> Result<Self> {
        match target {
            Target::Memory => Ok(StoreHandle::Memory(MemoryStore::new())),
            Target::Sled(path) => Ok(StoreHandle::Sled(SledStore::open(path, credentials)?)),
        }
    }
}

macro_rules! delegate {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            StoreHandle::Memory($store) => $call,
            StoreHandle::Sled($store) => $call,
        }
    };
}

impl UniqueIndex for IndexHandle {
    fn lookup(&self, id: &DomainId) -> Result<Option<StoreRef>> {
        match self {
            IndexHandle::Memory(index) => index.lookup(id),
            IndexHandle::Sled(index) => index.lookup(id),
        }
    }

    fn insert(&self, id: &DomainId, record: StoreRef) -> Result<()> {
        match self {
            IndexHandle::Memory(index) => index.insert(id, record),
            IndexHandle::Sled(index) => index.insert(id, record),
        }
    }
}

impl GraphStore for StoreHandle {
    type Index = IndexHandle;

    fn declare_vertex_type(&self, name: &str, superclass: Option<&str>) -> Result<()> {
        delegate!(self, store => store.declare_vertex_type(name, superclass))
    }

    fn declare_edge_type(&self, name: &str, superclass: Option<&str>) -> Result<()> {
        delegate!(self, store => store.declare_edge_type(name, superclass))
    }

    fn type_def(&self, name: &str) -> Result<Option<TypeDef>> {
        delegate!(self, store => store.type_def(name))
    }

    fn edge_types(&self) -> Result<BTreeSet<String>> {
        delegate!(self, store => store.edge_types())
    }

    fn unique_index(&self, vertex_type: &str) -> Result<IndexHandle> {
        match self {
            StoreHandle::Memory(store) => store.unique_index(vertex_type).map(IndexHandle::Memory),
            StoreHandle::Sled(store) => store.unique_index(vertex_type).map(IndexHandle::Sled),
        }
    }

    fn adjacency_insert(
        &self,
        edge_type: &str,
        direction: Direction,
        vertex: StoreRef,
        edge: StoreRef,
    ) -> Result<()> {
        delegate!(self, store => store.adjacency_insert(edge_type, direction, vertex, edge))
    }

    fn adjacency_keys(
        &self,
        edge_type: &str,
        direction: Direction,
        after: Option<StoreRef>,
        limit: usize,
    ) -> Result<Vec<StoreRef>> {
        delegate!(self, store => store.adjacency_keys(edge_type, direction, after, limit))
    }

    fn adjacency_lookup(
        &self,
        edge_type: &str,
        direction: Direction,
        vertex: StoreRef,
    ) -> Result<BTreeSet<StoreRef>> {
        delegate!(self, store => store.adjacency_lookup(edge_type, direction, vertex))
    }

    fn create_record(&self, class: &str, kind: RecordKind, properties: Properties) -> Result<StoreRef> {
        delegate!(self, store => store.create_record(class, kind, properties))
    }

    fn remove_record(&self, record: StoreRef) -> Result<()> {
        delegate!(self, store => store.remove_record(record))
    }

    fn load_record(&self, record: StoreRef) -> Result<Option<Record>> {
        delegate!(self, store => store.load_record(record))
    }

    fn scan_records(&self) -> Result<Vec<(StoreRef, Record)>> {
        delegate!(self, store => store.scan_records())
    }

    fn set_embedded_field(&self, vertex: StoreRef, field: &str, refs: Vec<StoreRef>) -> Result<()> {
        delegate!(self, store => store.set_embedded_field(vertex, field, refs))
    }

    fn flush(&self) -> Result<()> {
        delegate!(self, store => store.flush())
    }
}
