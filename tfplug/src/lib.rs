//! tfplug - Terraform Plugin Framework for Rust
//!
//! Provider, resource and data source traits plus the value, schema and
//! planning machinery providers are written against, and the gRPC server
//! that exposes a provider to Terraform over plugin protocol v6.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Protocol modules
pub mod grpc;
pub mod proto;
pub mod server;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod import;
pub mod plan_modifier;
pub mod validator;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::{import_state_passthrough_id, is_import_read};
pub use provider::{DataSourceFactory, Provider, ResourceFactory};
pub use resource::{
    Resource, ResourceWithConfigure, ResourceWithImportState, ResourceWithModifyPlan,
};
pub use server::{serve, serve_default, ServerConfig};
pub use schema::{AttributeBuilder, AttributeType, NestedType, Schema, SchemaBuilder};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue, PrivateStateData};
