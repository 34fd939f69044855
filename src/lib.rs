//! graphload - order-independent bulk loader for indexed graph stores
//!
//! # Architecture
//!
//! - **Operation queue**: unbounded FIFO of vertex/edge operations
//! - **Worker pool**: fixed set of threads applying operations to the store
//! - **Deferred edges**: an edge whose endpoint is not indexed yet parks
//!   until that vertex materializes, then goes back to the queue
//! - **Finalizer**: after the pool drains, adjacency side-indexes become
//!   embedded `out_<Type>` / `in_<Type>` fields on each vertex
//!
//! # Usage example
//!
//! ```no_run
//! use graphload::Loader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = Loader::connect("sled:./people.db", None)?;
//! loader.create_vertex_type("Person", None)?;
//! loader.create_edge_type("Friend", None)?;
//!
//! // Edges may come first
//! loader.add_edge("luigi", "Person", "luca", "Person", "Friend", None)?;
//! loader.add_vertex("luca", "Person", None)?;
//! loader.add_vertex("luigi", "Person", None)?;
//!
//! let report = loader.close()?;
//! println!("{} edges loaded", report.edges_created);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod store;

pub use config::{Credentials, LoaderConfig, Target};
pub use error::{LoadError, Result};
pub use ingest::{EdgeSpec, LoadReport, Operation, StatsSnapshot, VertexSpec};
pub use loader::Loader;
pub use store::{
    Direction, DomainId, GraphStore, MemoryStore, Properties, Record, RecordKind, SledStore,
    StoreHandle, StoreRef, UniqueIndex,
};
