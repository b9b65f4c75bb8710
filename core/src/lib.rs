//! Work Item Core Library
//!
//! Domain models, error taxonomy, and the four core services that sit
//! underneath the MCP tool surface: the work-item graph, the role-based
//! workflow engine, the note-schema gate, and the cascade engine. Every
//! other crate in the workspace depends on the types defined here.
//!
//! # Architecture
//!
//! - [`models`] - work items, notes, dependencies, and the enums that
//!   drive the workflow (`Role`, `Priority`, `DependencyType`, `Trigger`)
//! - [`error`] - the `WorkItemError` taxonomy and `Result` alias
//! - [`store`] - the `Store` trait persistence boundary
//! - [`config`] - layered `.workflow/{config,schemas}.yaml` loading
//! - [`graph`] - ancestor/descendant traversal and cycle detection
//! - [`workflow`] - trigger resolution, gate enforcement, transition application
//! - [`note_schema`] - tag-matched note requirements per role phase
//! - [`cascade`] - upward propagation of role transitions
//! - [`validation`] - field-level validation for inbound tool payloads
//!
//! # Example
//!
//! ```rust
//! use work_item_core::{
//!     models::{NewWorkItem, Priority},
//!     validation::WorkItemValidator,
//! };
//!
//! let new_item = NewWorkItem {
//!     parent_id: None,
//!     title: "Design the schema".to_string(),
//!     description: Some("Draft the items/notes/dependencies tables".to_string()),
//!     tags: vec!["impl".to_string()],
//!     priority: Priority::Medium,
//!     status: None,
//! };
//!
//! WorkItemValidator::validate_new_item(&new_item).unwrap();
//! ```

pub mod cascade;
pub mod config;
pub mod error;
pub mod graph;
pub mod models;
pub mod note_schema;
pub mod store;
pub mod validation;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use cascade::{CascadeEngine, CascadeEvent, CascadeEventKind};
pub use config::{NoteSchemaConfig, WorkflowConfig};
pub use error::{Result, WorkItemError};
pub use graph::GraphService;
pub use models::{
    Dependency, DependencyType, NewDependency, NewWorkItem, Note, Priority, Role, RoleTransition,
    Trigger, UpdateWorkItem, UpsertNote, WorkItem,
};
pub use note_schema::NoteSchemaService;
pub use store::{PendingTransition, Store, StoreStats};
pub use validation::WorkItemValidator;
pub use workflow::{AppliedTransition, WorkflowEngine};

/// Current version of the core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
