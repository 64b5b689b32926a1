//! Data source implementations

pub mod common;
pub mod idp_adapter;
pub mod password_credential_validator;
pub mod plugin_instance;

pub use idp_adapter::IdpAdapterDataSource;
pub use password_credential_validator::PasswordCredentialValidatorDataSource;
pub use plugin_instance::PluginInstanceDataSource;
