//! Provider data passed to resources and data sources

use crate::api::Client;
use crate::config::ProductVersion;
use std::sync::Arc;

#[derive(Clone)]
pub struct PingFederateProviderData {
    pub client: Arc<Client>,
    pub product_version: ProductVersion,
}

impl PingFederateProviderData {
    pub fn new(client: Client, product_version: ProductVersion) -> Self {
        Self {
            client: Arc::new(client),
            product_version,
        }
    }
}
