pub mod document;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod store;

pub use manager::open_store;
pub use memory::MemoryStore;
pub use repository::Repository;
pub use store::{
    ArrayOp, Collection, Document, DocumentStore, Filter, Patch, StoreError, UpdateOptions, UpdateOutcome,
};
