//! In-process store backed by lock-protected maps

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    plan_declaration, require_kind, Direction, DomainId, GraphStore, Properties, Record,
    RecordKind, StoreRef, TypeDef, TypeKind, UniqueIndex,
};
use crate::error::{LoadError, Result};

type Adjacency = BTreeMap<StoreRef, BTreeSet<StoreRef>>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Unique index handle of a [`MemoryStore`] vertex type
#[derive(Clone)]
pub struct MemoryIndex {
    vertex_type: Arc<str>,
    entries: Arc<RwLock<HashMap<DomainId, StoreRef>>>,
}

impl UniqueIndex for MemoryIndex {
    fn lookup(&self, id: &DomainId) -> Result<Option<StoreRef>> {
        Ok(read(&self.entries).get(id).copied())
    }

    fn insert(&self, id: &DomainId, record: StoreRef) -> Result<()> {
        let mut entries = write(&self.entries);
        if entries.contains_key(id) {
            return Err(LoadError::DuplicateVertex {
                vertex_type: self.vertex_type.to_string(),
                id: id.to_string(),
            });
        }
        entries.insert(id.clone(), record);
        Ok(())
    }
}

/// Non-persistent [`GraphStore`]
#[derive(Default)]
pub struct MemoryStore {
    schema: RwLock<HashMap<String, TypeDef>>,
    unique: RwLock<HashMap<String, MemoryIndex>>,
    adjacency: RwLock<HashMap<(String, Direction), Adjacency>>,
    records: RwLock<BTreeMap<StoreRef, Record>>,
    next_ref: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(&self, name: &str, kind: TypeKind, superclass: Option<&str>) -> Result<()> {
        let mut schema = write(&self.schema);
        let plan = plan_declaration(|class| Ok(schema.get(class).cloned()), name, kind, superclass)?;

        for (class, def) in plan {
            match def.kind {
                TypeKind::Vertex => {
                    write(&self.unique).entry(class.clone()).or_insert_with(|| MemoryIndex {
                        vertex_type: Arc::from(class.as_str()),
                        entries: Arc::default(),
                    });
                }
                TypeKind::Edge => {
                    let mut adjacency = write(&self.adjacency);
                    for direction in Direction::ALL {
                        adjacency.entry((class.clone(), direction)).or_default();
                    }
                }
            }
            schema.insert(class, def);
        }
        Ok(())
    }

    fn with_adjacency<T>(
        &self,
        edge_type: &str,
        direction: Direction,
        f: impl FnOnce(&Adjacency) -> T,
    ) -> Result<T> {
        let adjacency = read(&self.adjacency);
        let index = adjacency
            .get(&(edge_type.to_string(), direction))
            .ok_or_else(|| LoadError::UnknownType(edge_type.to_string()))?;
        Ok(f(index))
    }
}

impl GraphStore for MemoryStore {
    type Index = MemoryIndex;

    fn declare_vertex_type(&self, name: &str, superclass: Option<&str>) -> Result<()> {
        self.declare(name, TypeKind::Vertex, superclass)
    }

    fn declare_edge_type(&self, name: &str, superclass: Option<&str>) -> Result<()> {
        self.declare(name, TypeKind::Edge, superclass)
    }

    fn type_def(&self, name: &str) -> Result<Option<TypeDef>> {
        Ok(read(&self.schema).get(name).cloned())
    }

    fn edge_types(&self) -> Result<BTreeSet<String>> {
        Ok(read(&self.schema)
            .iter()
            .filter(|(_, def)| def.kind == TypeKind::Edge)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn unique_index(&self, vertex_type: &str) -> Result<MemoryIndex> {
        read(&self.unique)
            .get(vertex_type)
            .cloned()
            .ok_or_else(|| LoadError::UnknownType(vertex_type.to_string()))
    }

    fn adjacency_insert(
        &self,
        edge_type: &str,
        direction: Direction,
        vertex: StoreRef,
        edge: StoreRef,
    ) -> Result<()> {
        let mut adjacency = write(&self.adjacency);
        let index = adjacency
            .get_mut(&(edge_type.to_string(), direction))
            .ok_or_else(|| LoadError::UnknownType(edge_type.to_string()))?;
        index.entry(vertex).or_default().insert(edge);
        Ok(())
    }

    fn adjacency_keys(
        &self,
        edge_type: &str,
        direction: Direction,
        after: Option<StoreRef>,
        limit: usize,
    ) -> Result<Vec<StoreRef>> {
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        self.with_adjacency(edge_type, direction, |index| {
            index
                .range((lower, Bound::Unbounded))
                .take(limit)
                .map(|(key, _)| *key)
                .collect()
        })
    }

    fn adjacency_lookup(
        &self,
        edge_type: &str,
        direction: Direction,
        vertex: StoreRef,
    ) -> Result<BTreeSet<StoreRef>> {
        self.with_adjacency(edge_type, direction, |index| {
            index.get(&vertex).cloned().unwrap_or_default()
        })
    }

    fn create_record(&self, class: &str, kind: RecordKind, properties: Properties) -> Result<StoreRef> {
        let expected = match kind {
            RecordKind::Vertex { .. } => TypeKind::Vertex,
            RecordKind::Edge { .. } => TypeKind::Edge,
        };
        require_kind(self.type_def(class)?, class, expected)?;

        let record_ref = StoreRef(self.next_ref.fetch_add(1, Ordering::Relaxed));
        write(&self.records).insert(record_ref, Record::new(class, kind, properties));
        Ok(record_ref)
    }

    fn remove_record(&self, record: StoreRef) -> Result<()> {
        write(&self.records)
            .remove(&record)
            .map(|_| ())
            .ok_or(LoadError::RecordNotFound(record))
    }

    fn load_record(&self, record: StoreRef) -> Result<Option<Record>> {
        Ok(read(&self.records).get(&record).cloned())
    }

    fn scan_records(&self) -> Result<Vec<(StoreRef, Record)>> {
        Ok(read(&self.records)
            .iter()
            .map(|(record_ref, record)| (*record_ref, record.clone()))
            .collect())
    }

    fn set_embedded_field(&self, vertex: StoreRef, field: &str, refs: Vec<StoreRef>) -> Result<()> {
        let mut records = write(&self.records);
        let record = records
            .get_mut(&vertex)
            .ok_or(LoadError::RecordNotFound(vertex))?;
        record.embedded.insert(field.to_string(), refs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.declare_vertex_type("Person", None).unwrap();
        store.declare_edge_type("Friend", None).unwrap();
        store
    }

    #[test]
    fn test_unique_index_rejects_duplicates() {
        let store = person_store();
        let index = store.unique_index("Person").unwrap();

        index.insert(&"luigi".into(), StoreRef(1)).unwrap();
        assert_eq!(index.lookup(&"luigi".into()).unwrap(), Some(StoreRef(1)));
        assert_eq!(index.lookup(&"luca".into()).unwrap(), None);

        let err = index.insert(&"luigi".into(), StoreRef(2)).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateVertex { .. }));
        assert_eq!(index.lookup(&"luigi".into()).unwrap(), Some(StoreRef(1)));
    }

    #[test]
    fn test_index_handles_share_state() {
        let store = person_store();
        let first = store.unique_index("Person").unwrap();
        let second = store.unique_index("Person").unwrap();

        first.insert(&DomainId::Int(7), StoreRef(3)).unwrap();
        assert_eq!(second.lookup(&DomainId::Int(7)).unwrap(), Some(StoreRef(3)));
    }

    #[test]
    fn test_undeclared_type_is_unknown() {
        let store = MemoryStore::new();
        assert!(matches!(store.unique_index("Ghost"), Err(LoadError::UnknownType(_))));
        assert!(matches!(
            store.create_record("Ghost", RecordKind::Vertex { id: "x".into() }, Properties::new()),
            Err(LoadError::UnknownType(_))
        ));
        assert!(matches!(
            store.adjacency_insert("Ghost", Direction::Out, StoreRef(0), StoreRef(1)),
            Err(LoadError::UnknownType(_))
        ));
    }

    #[test]
    fn test_record_kind_must_match_class() {
        let store = person_store();
        let err = store
            .create_record("Person", RecordKind::Edge { from: StoreRef(0), to: StoreRef(1) }, Properties::new())
            .unwrap_err();
        assert!(matches!(err, LoadError::TypeKindMismatch { .. }));
    }

    #[test]
    fn test_adjacency_keys_paginate() {
        let store = person_store();
        for vertex in [5u64, 1, 3, 9] {
            store.adjacency_insert("Friend", Direction::Out, StoreRef(vertex), StoreRef(100 + vertex)).unwrap();
        }
        store.adjacency_insert("Friend", Direction::Out, StoreRef(3), StoreRef(200)).unwrap();

        let first = store.adjacency_keys("Friend", Direction::Out, None, 2).unwrap();
        assert_eq!(first, vec![StoreRef(1), StoreRef(3)]);
        let rest = store.adjacency_keys("Friend", Direction::Out, Some(StoreRef(3)), 10).unwrap();
        assert_eq!(rest, vec![StoreRef(5), StoreRef(9)]);

        let edges = store.adjacency_lookup("Friend", Direction::Out, StoreRef(3)).unwrap();
        assert_eq!(edges.into_iter().collect::<Vec<_>>(), vec![StoreRef(103), StoreRef(200)]);
        assert!(store.adjacency_keys("Friend", Direction::In, None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_embedded_field_and_removal() {
        let store = person_store();
        let v = store
            .create_record("Person", RecordKind::Vertex { id: "andrey".into() }, Properties::new())
            .unwrap();

        store.set_embedded_field(v, "in_Friend", vec![StoreRef(4)]).unwrap();
        let record = store.load_record(v).unwrap().unwrap();
        assert_eq!(record.embedded("in_Friend"), Some(&[StoreRef(4)][..]));
        assert_eq!(record.domain_id(), Some(&DomainId::from("andrey")));

        store.remove_record(v).unwrap();
        assert!(store.load_record(v).unwrap().is_none());
        assert!(matches!(
            store.set_embedded_field(v, "in_Friend", Vec::new()),
            Err(LoadError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_superclass_is_created_on_demand() {
        let store = MemoryStore::new();
        store.declare_vertex_type("Employee", Some("Person")).unwrap();

        let person = store.type_def("Person").unwrap().unwrap();
        assert_eq!(person.superclass, None);
        let employee = store.type_def("Employee").unwrap().unwrap();
        assert_eq!(employee.superclass.as_deref(), Some("Person"));

        let err = store.declare_edge_type("Person", None).unwrap_err();
        assert!(matches!(err, LoadError::TypeKindMismatch { .. }));
    }

    #[test]
    fn test_edge_types_include_implicit_superclass() {
        let store = person_store();
        store.declare_edge_type("Follows", Some("Social")).unwrap();

        let edge_types: Vec<String> = store.edge_types().unwrap().into_iter().collect();
        assert_eq!(edge_types, vec!["Follows", "Friend", "Social"]);
    }
}
