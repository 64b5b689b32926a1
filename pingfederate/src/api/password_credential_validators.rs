//! Password credential validator API implementation

use super::models::PasswordCredentialValidator;
use super::{ApiError, Client};

pub const PASSWORD_CREDENTIAL_VALIDATORS_PATH: &str = "/passwordCredentialValidators";

fn resource_path(id: &str) -> String {
    format!(
        "{}/{}",
        PASSWORD_CREDENTIAL_VALIDATORS_PATH,
        urlencoding::encode(id)
    )
}

/// Password credential validators API
pub struct PasswordCredentialValidatorsApi<'a> {
    client: &'a Client,
}

impl<'a> PasswordCredentialValidatorsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /passwordCredentialValidators/{id}
    pub async fn get(&self, id: &str) -> Result<PasswordCredentialValidator, ApiError> {
        self.client.get(&resource_path(id)).await
    }

    /// POST /passwordCredentialValidators
    pub async fn create(
        &self,
        validator: &PasswordCredentialValidator,
    ) -> Result<PasswordCredentialValidator, ApiError> {
        self.client
            .post(PASSWORD_CREDENTIAL_VALIDATORS_PATH, validator)
            .await
    }

    /// PUT /passwordCredentialValidators/{id}
    pub async fn update(
        &self,
        id: &str,
        validator: &PasswordCredentialValidator,
    ) -> Result<PasswordCredentialValidator, ApiError> {
        self.client.put(&resource_path(id), validator).await
    }

    /// DELETE /passwordCredentialValidators/{id}
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&resource_path(id)).await
    }
}
