//! Error types for the bulk loader

use thiserror::Error;

use crate::store::StoreRef;

pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Type {name} is already declared as {existing}")]
    TypeKindMismatch { name: String, existing: String },

    #[error("Duplicate vertex {vertex_type}[{id}]")]
    DuplicateVertex { vertex_type: String, id: String },

    #[error("Record not found: {0}")]
    RecordNotFound(StoreRef),

    #[error("Authentication failed for user {0}")]
    Authentication(String),

    #[error("Invalid connection target: {0}")]
    InvalidTarget(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Loader is closing, submissions are rejected")]
    Closed,

    #[error("Loader already closed")]
    AlreadyClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid record format: {0}")]
    InvalidFormat(String),
}
