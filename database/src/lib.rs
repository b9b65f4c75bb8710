//! SQLite persistence for the work-item graph.
//!
//! # Usage
//!
//! ```rust,no_run
//! use database::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::new(":memory:").await?;
//!     store.migrate().await?;
//!     store.health_check().await?;
//!     Ok(())
//! }
//! ```

mod common;
mod sqlite;

pub use sqlite::SqliteStore;

pub use work_item_core::{
    config::WorkflowConfig,
    error::{Result, WorkItemError},
    models::{
        Dependency, DependencyType, ItemFilter, NewDependency, NewWorkItem, Note, Priority, Role,
        RoleTransition, Trigger, UpdateWorkItem, UpsertNote, WorkItem,
    },
    store::{PendingTransition, Store, StoreStats},
};
