//! Plugin instance configuration: fields, tables and rows
//!
//! PingFederate never echoes sensitive values and fills in defaults for
//! anything left out, so state is rebuilt on every read by reconciling the
//! server response with what the prior plan declared.

pub mod client;
pub mod model;
pub mod plan;
pub mod schema;
pub mod state;
pub mod validator;

pub use client::to_client_struct;
pub use plan::{
    mark_computed_attrs_unknown, mark_computed_attrs_unknown_on_change, plan_encrypted_values,
    use_state_for_computed_attrs,
};
pub use schema::{data_source_attribute, resource_attribute};
pub use state::{to_data_source_state, to_state};
