//! IdP adapter API implementation

use super::models::IdpAdapter;
use super::{ApiError, Client};

pub const IDP_ADAPTERS_PATH: &str = "/idp/adapters";

fn resource_path(id: &str) -> String {
    format!("{}/{}", IDP_ADAPTERS_PATH, urlencoding::encode(id))
}

pub struct IdpAdaptersApi<'a> {
    client: &'a Client,
}

impl<'a> IdpAdaptersApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// GET /idp/adapters/{id}
    pub async fn get(&self, id: &str) -> Result<IdpAdapter, ApiError> {
        self.client.get(&resource_path(id)).await
    }

    /// POST /idp/adapters
    pub async fn create(&self, adapter: &IdpAdapter) -> Result<IdpAdapter, ApiError> {
        self.client.post(IDP_ADAPTERS_PATH, adapter).await
    }

    /// PUT /idp/adapters/{id}
    pub async fn update(&self, id: &str, adapter: &IdpAdapter) -> Result<IdpAdapter, ApiError> {
        self.client.put(&resource_path(id), adapter).await
    }

    /// DELETE /idp/adapters/{id}
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&resource_path(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::Auth;
    use mockito::Server;

    #[tokio::test]
    async fn update_puts_to_encoded_id() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("PUT", "/idp/adapters/form%20one")
            .with_status(200)
            .with_body(r#"{"id":"form one","name":"Form","pluginDescriptorRef":{"id":"x"}}"#)
            .create_async()
            .await;

        let client = Client::new(&server.url(), Auth::AccessToken("token".to_string())).unwrap();
        let adapter = IdpAdapter {
            id: "form one".to_string(),
            name: "Form".to_string(),
            ..Default::default()
        };
        let updated = client.idp_adapters().update(&adapter.id, &adapter).await.unwrap();
        assert_eq!(updated.name, "Form");
        mock.assert_async().await;
    }
}
