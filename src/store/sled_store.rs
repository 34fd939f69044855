//! Persistent store on top of sled
//!
//! Layout (one sled tree each):
//! - `schema`: class name -> bincode [`TypeDef`]
//! - `records`: big-endian ref -> JSON [`Record`]
//! - `meta`: credential digest
//! - `idx:<VertexType>`: tagged domain id -> big-endian ref
//! - `adj:<EdgeType>:<out|in>`: vertex ref ++ edge ref -> empty

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use sled::{Db, IVec, Tree};

use super::{
    plan_declaration, require_kind, Direction, DomainId, GraphStore, Properties, Record,
    RecordKind, StoreRef, TypeDef, TypeKind, UniqueIndex,
};
use crate::config::Credentials;
use crate::error::{LoadError, Result};

const AUTH_KEY: &[u8] = b"auth";

fn unique_tree_name(vertex_type: &str) -> String {
    format!("idx:{}", vertex_type)
}

fn adjacency_tree_name(edge_type: &str, direction: Direction) -> String {
    format!("adj:{}:{}", edge_type, direction.as_str())
}

fn adjacency_key(vertex: StoreRef, edge: StoreRef) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&vertex.to_be_bytes());
    key[8..].copy_from_slice(&edge.to_be_bytes());
    key
}

fn decode_ref(bytes: &[u8]) -> Result<StoreRef> {
    StoreRef::from_be_slice(bytes)
        .ok_or_else(|| LoadError::InvalidFormat(format!("bad store ref ({} bytes)", bytes.len())))
}

/// Unique index handle of a [`SledStore`] vertex type
#[derive(Clone)]
pub struct SledIndex {
    vertex_type: String,
    tree: Tree,
}

impl UniqueIndex for SledIndex {
    fn lookup(&self, id: &DomainId) -> Result<Option<StoreRef>> {
        match self.tree.get(id.to_key())? {
            Some(value) => Ok(Some(decode_ref(&value)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, id: &DomainId, record: StoreRef) -> Result<()> {
        let swapped = self.tree.compare_and_swap(
            id.to_key(),
            None::<&[u8]>,
            Some(record.to_be_bytes().to_vec()),
        )?;
        swapped.map_err(|_| LoadError::DuplicateVertex {
            vertex_type: self.vertex_type.clone(),
            id: id.to_string(),
        })
    }
}

/// sled-backed [`GraphStore`]
pub struct SledStore {
    path: PathBuf,
    db: Db,
    schema: Tree,
    records: Tree,
    meta: Tree,
}

impl SledStore {
    /// Open or create a store directory.
    ///
    /// The first open records a digest of `credentials`; later opens must
    /// present the same ones.
    pub fn open<P: AsRef<Path>>(path: P, credentials: &Credentials) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path)?;
        let store = Self {
            schema: db.open_tree("schema")?,
            records: db.open_tree("records")?,
            meta: db.open_tree("meta")?,
            path,
            db,
        };
        store.authenticate(credentials)?;

        tracing::info!(
            "Opened store at {:?} ({} records)",
            store.path,
            store.records.len()
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn authenticate(&self, credentials: &Credentials) -> Result<()> {
        let digest = credentials.digest();
        let stored = self
            .meta
            .compare_and_swap(AUTH_KEY, None::<&[u8]>, Some(digest.to_vec()))?;
        match stored {
            Ok(()) => Ok(()),
            Err(existing) if existing.current.as_deref() == Some(&digest[..]) => Ok(()),
            Err(_) => Err(LoadError::Authentication(credentials.username.clone())),
        }
    }

    fn declare(&self, name: &str, kind: TypeKind, superclass: Option<&str>) -> Result<()> {
        let plan = plan_declaration(|class| self.type_def(class), name, kind, superclass)?;

        for (class, def) in plan {
            match def.kind {
                TypeKind::Vertex => {
                    self.db.open_tree(unique_tree_name(&class))?;
                }
                TypeKind::Edge => {
                    for direction in Direction::ALL {
                        self.db.open_tree(adjacency_tree_name(&class, direction))?;
                    }
                }
            }
            self.schema.insert(class.as_bytes(), bincode::serialize(&def)?)?;
        }
        Ok(())
    }

    fn adjacency_tree(&self, edge_type: &str, direction: Direction) -> Result<Tree> {
        require_kind(self.type_def(edge_type)?, edge_type, TypeKind::Edge)?;
        Ok(self.db.open_tree(adjacency_tree_name(edge_type, direction))?)
    }

    fn decode_record(bytes: &IVec) -> Result<Record> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl GraphStore for SledStore {
    type Index = SledIndex;

    fn declare_vertex_type(&self, name: &str, superclass: Option<&str>) -> Result<()> {
        self.declare(name, TypeKind::Vertex, superclass)
    }

    fn declare_edge_type(&self, name: &str, superclass: Option<&str>) -> Result<()> {
        self.declare(name, TypeKind::Edge, superclass)
    }

    fn type_def(&self, name: &str) -> Result<Option<TypeDef>> {
        match self.schema.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn edge_types(&self) -> Result<BTreeSet<String>> {
        let mut edge_types = BTreeSet::new();
        for entry in self.schema.iter() {
            let (name, bytes) = entry?;
            let def: TypeDef = bincode::deserialize(&bytes)?;
            if def.kind == TypeKind::Edge {
                let name = String::from_utf8(name.to_vec())
                    .map_err(|err| LoadError::InvalidFormat(format!("class name: {}", err)))?;
                edge_types.insert(name);
            }
        }
        Ok(edge_types)
    }

    fn unique_index(&self, vertex_type: &str) -> Result<SledIndex> {
        require_kind(self.type_def(vertex_type)?, vertex_type, TypeKind::Vertex)?;
        Ok(SledIndex {
            vertex_type: vertex_type.to_string(),
            tree: self.db.open_tree(unique_tree_name(vertex_type))?,
        })
    }

    fn adjacency_insert(
        &self,
        edge_type: &str,
        direction: Direction,
        vertex: StoreRef,
        edge: StoreRef,
    ) -> Result<()> {
        let tree = self.adjacency_tree(edge_type, direction)?;
        tree.insert(adjacency_key(vertex, edge), IVec::default())?;
        Ok(())
    }

    fn adjacency_keys(
        &self,
        edge_type: &str,
        direction: Direction,
        after: Option<StoreRef>,
        limit: usize,
    ) -> Result<Vec<StoreRef>> {
        let tree = self.adjacency_tree(edge_type, direction)?;
        let mut next = match after {
            Some(StoreRef(u64::MAX)) => return Ok(Vec::new()),
            Some(StoreRef(key)) => key + 1,
            None => 0,
        };

        // Keys are vertex ++ edge, so each distinct vertex is one seek.
        let mut keys = Vec::with_capacity(limit.min(1024));
        while keys.len() < limit {
            let start = adjacency_key(StoreRef(next), StoreRef(0));
            let Some(entry) = tree.range(start..).next() else {
                break;
            };
            let (key, _) = entry?;
            let vertex = decode_ref(&key)?;
            keys.push(vertex);
            if vertex.0 == u64::MAX {
                break;
            }
            next = vertex.0 + 1;
        }
        Ok(keys)
    }

    fn adjacency_lookup(
        &self,
        edge_type: &str,
        direction: Direction,
        vertex: StoreRef,
    ) -> Result<BTreeSet<StoreRef>> {
        let tree = self.adjacency_tree(edge_type, direction)?;
        tree.scan_prefix(vertex.to_be_bytes())
            .map(|entry| {
                let (key, _) = entry?;
                decode_ref(&key[8..])
            })
            .collect()
    }

    fn create_record(&self, class: &str, kind: RecordKind, properties: Properties) -> Result<StoreRef> {
        let expected = match kind {
            RecordKind::Vertex { .. } => TypeKind::Vertex,
            RecordKind::Edge { .. } => TypeKind::Edge,
        };
        require_kind(self.type_def(class)?, class, expected)?;

        let record_ref = StoreRef(self.db.generate_id()?);
        let record = Record::new(class, kind, properties);
        self.records
            .insert(record_ref.to_be_bytes(), serde_json::to_vec(&record)?)?;
        Ok(record_ref)
    }

    fn remove_record(&self, record: StoreRef) -> Result<()> {
        self.records
            .remove(record.to_be_bytes())?
            .map(|_| ())
            .ok_or(LoadError::RecordNotFound(record))
    }

    fn load_record(&self, record: StoreRef) -> Result<Option<Record>> {
        match self.records.get(record.to_be_bytes())? {
            Some(bytes) => Ok(Some(Self::decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_records(&self) -> Result<Vec<(StoreRef, Record)>> {
        self.records
            .iter()
            .map(|entry| {
                let (key, value) = entry?;
                Ok((decode_ref(&key)?, Self::decode_record(&value)?))
            })
            .collect()
    }

    fn set_embedded_field(&self, vertex: StoreRef, field: &str, refs: Vec<StoreRef>) -> Result<()> {
        let key = vertex.to_be_bytes();
        let bytes = self
            .records
            .get(key)?
            .ok_or(LoadError::RecordNotFound(vertex))?;
        let mut record = Self::decode_record(&bytes)?;
        record.embedded.insert(field.to_string(), refs);
        self.records.insert(key, serde_json::to_vec(&record)?)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
