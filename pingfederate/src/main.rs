use pingfederate::PingFederateProvider;
use tfplug::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // stdout carries the plugin handshake
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let provider = PingFederateProvider::new();
    tfplug::serve(provider, ServerConfig::default()).await?;

    Ok(())
}
