//! PingFederate admin API client

pub mod auth;
pub mod client;
pub mod error;
pub mod idp_adapters;
pub mod models;
pub mod password_credential_validators;
pub mod plugin_instances;
pub mod pool;

pub use auth::{Auth, OAuthConfig};
pub use client::{Client, ClientSettings, RetryConfig};
pub use error::{ApiError, PingFederateErrorResponse, ValidationError};
pub use plugin_instances::PluginInstanceKind;
pub use pool::ConnectionSettings;

use std::future::Future;
use tfplug::Context;

/// Runs an API call, abandoning it when the request context is cancelled
pub async fn call<T, F>(ctx: &Context, request: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    if ctx.is_cancelled() {
        return Err(ApiError::Cancelled);
    }
    tokio::select! {
        result = request => result,
        _ = ctx.cancelled() => Err(ApiError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn call_returns_request_result() {
        let ctx = Context::new();
        let result = call(&ctx, async { Ok::<_, ApiError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn call_stops_on_cancelled_context() {
        let ctx = Context::new();
        ctx.cancel();
        let result = call(&ctx, std::future::pending::<Result<(), ApiError>>()).await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }
}
