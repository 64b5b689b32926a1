//! Resource implementations

pub mod attribute_mapping;
pub mod common;
pub mod idp_adapter;
pub mod password_credential_validator;
pub mod plugin_instance;

pub use idp_adapter::IdpAdapterResource;
pub use password_credential_validator::PasswordCredentialValidatorResource;
pub use plugin_instance::PluginInstanceResource;
