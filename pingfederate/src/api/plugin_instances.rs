//! Plugin instance endpoints that share one request/response shape

use super::models::PluginInstance;
use super::{ApiError, Client};

/// The plugin instance collections handled generically
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginInstanceKind {
    NotificationPublisher,
    SecretManager,
    CaptchaProvider,
}

impl PluginInstanceKind {
    pub fn api_path(&self) -> &'static str {
        match self {
            PluginInstanceKind::NotificationPublisher => "/notificationPublishers",
            PluginInstanceKind::SecretManager => "/secretManagers",
            PluginInstanceKind::CaptchaProvider => "/captchaProviders",
        }
    }

    /// Terraform attribute holding the user supplied id
    pub fn id_attribute(&self) -> &'static str {
        match self {
            PluginInstanceKind::NotificationPublisher => "publisher_id",
            PluginInstanceKind::SecretManager => "manager_id",
            PluginInstanceKind::CaptchaProvider => "provider_id",
        }
    }

    /// Suffix of the Terraform type name, e.g. `secret_manager`
    pub fn type_suffix(&self) -> &'static str {
        match self {
            PluginInstanceKind::NotificationPublisher => "notification_publisher",
            PluginInstanceKind::SecretManager => "secret_manager",
            PluginInstanceKind::CaptchaProvider => "captcha_provider",
        }
    }

    /// Human readable name used in diagnostics
    pub fn display_name(&self) -> &'static str {
        match self {
            PluginInstanceKind::NotificationPublisher => "Notification Publisher",
            PluginInstanceKind::SecretManager => "Secret Manager",
            PluginInstanceKind::CaptchaProvider => "Captcha Provider",
        }
    }

    pub fn all() -> [PluginInstanceKind; 3] {
        [
            PluginInstanceKind::NotificationPublisher,
            PluginInstanceKind::SecretManager,
            PluginInstanceKind::CaptchaProvider,
        ]
    }

    fn resource_path(&self, id: &str) -> String {
        format!("{}/{}", self.api_path(), urlencoding::encode(id))
    }
}

pub struct PluginInstancesApi<'a> {
    client: &'a Client,
    kind: PluginInstanceKind,
}

impl<'a> PluginInstancesApi<'a> {
    pub fn new(client: &'a Client, kind: PluginInstanceKind) -> Self {
        Self { client, kind }
    }

    pub async fn get(&self, id: &str) -> Result<PluginInstance, ApiError> {
        self.client.get(&self.kind.resource_path(id)).await
    }

    pub async fn create(&self, instance: &PluginInstance) -> Result<PluginInstance, ApiError> {
        self.client.post(self.kind.api_path(), instance).await
    }

    pub async fn update(
        &self,
        id: &str,
        instance: &PluginInstance,
    ) -> Result<PluginInstance, ApiError> {
        self.client
            .put(&self.kind.resource_path(id), instance)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&self.kind.resource_path(id)).await
    }
}
