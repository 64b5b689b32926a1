//! Server module for running Terraform providers
//!
//! Performs the go-plugin handshake Terraform expects from a provider
//! binary: check the magic cookie, listen on a local port, print the
//! handshake line and serve gRPC until Terraform asks the plugin to shut
//! down.

use crate::error::{Result, TfplugError};
use crate::grpc::ProviderService;
use crate::proto::plugin::{self, ControllerServer, ControllerService};
use crate::proto::ProviderServer;
use crate::provider::Provider;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tonic::{Request, Response, Status};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const CORE_PROTOCOL_VERSION: u32 = 1;
const PROTOCOL_VERSION: u32 = 6;

/// Set by Terraform when it wants the plugin to generate its own
/// certificate (AutoMTLS)
const CLIENT_CERT_ENV: &str = "PLUGIN_CLIENT_CERT";

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PEM certificate used when Terraform does not negotiate AutoMTLS
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Maximum message size in bytes
    pub max_message_size: usize,
    /// Time in-flight requests get to finish after Shutdown
    pub shutdown_timeout: Duration,
    /// Skips the magic cookie check, for running under a debugger
    pub skip_cookie_check: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            max_message_size: 256 << 20, // 256MB
            shutdown_timeout: Duration::from_secs(30),
            skip_cookie_check: false,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cert_path(mut self, path: PathBuf) -> Self {
        self.cert_path = Some(path);
        self
    }

    pub fn with_key_path(mut self, path: PathBuf) -> Self {
        self.key_path = Some(path);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn without_cookie_check(mut self) -> Self {
        self.skip_cookie_check = true;
        self
    }
}

/// TLS material and the certificate advertised in the handshake line
struct Tls {
    config: ServerTlsConfig,
    /// DER of a generated certificate; Terraform pins it
    advertised: Option<Vec<u8>>,
}

/// Handles go-plugin's controller service
struct Controller {
    shutdown: watch::Sender<bool>,
}

#[tonic::async_trait]
impl ControllerService for Controller {
    async fn shutdown(
        &self,
        _request: Request<plugin::Empty>,
    ) -> std::result::Result<Response<plugin::Empty>, Status> {
        tracing::info!("shutdown requested by Terraform");
        self.shutdown.send_replace(true);
        Ok(Response::new(plugin::Empty {}))
    }
}

fn check_magic_cookie(value: Option<String>) -> Result<()> {
    match value {
        Some(cookie) if cookie == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(TfplugError::Handshake(
            "this binary is a Terraform plugin and is not meant to be executed directly"
                .to_string(),
        )),
    }
}

/// AutoMTLS: a fresh self-signed certificate for localhost
fn generated_tls() -> Result<Tls> {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| TfplugError::TlsError(format!("failed to generate certificate: {}", e)))?;
    let identity = Identity::from_pem(certified.cert.pem(), certified.key_pair.serialize_pem());
    Ok(Tls {
        config: ServerTlsConfig::new().identity(identity),
        advertised: Some(certified.cert.der().to_vec()),
    })
}

async fn file_tls(cert_path: &Path, key_path: &Path) -> Result<Tls> {
    let cert = tokio::fs::read(cert_path)
        .await
        .map_err(|e| TfplugError::TlsError(format!("Failed to read certificate: {}", e)))?;
    let key = tokio::fs::read(key_path)
        .await
        .map_err(|e| TfplugError::TlsError(format!("Failed to read key: {}", e)))?;
    Ok(Tls {
        config: ServerTlsConfig::new().identity(Identity::from_pem(cert, key)),
        advertised: None,
    })
}

async fn tls_for(config: &ServerConfig) -> Result<Option<Tls>> {
    if std::env::var_os(CLIENT_CERT_ENV).is_some() {
        return generated_tls().map(Some);
    }
    match (&config.cert_path, &config.key_path) {
        (Some(cert), Some(key)) => file_tls(cert, key).await.map(Some),
        _ => Ok(None),
    }
}

fn handshake_line(port: u16, certificate: Option<&[u8]>) -> String {
    let mut line = format!(
        "{}|{}|tcp|127.0.0.1:{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, port
    );
    if let Some(der) = certificate {
        line.push('|');
        line.push_str(&STANDARD_NO_PAD.encode(der));
    }
    line
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    if !config.skip_cookie_check {
        check_magic_cookie(std::env::var(MAGIC_COOKIE_KEY).ok())?;
    }

    // Already installed is fine; tonic only needs a process default
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let tls = tls_for(&config).await?;

    let provider_service = ProviderServer::new(ProviderService::new(provider))
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let controller = ControllerServer::new(Controller {
        shutdown: shutdown_tx,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let mut builder = Server::builder();
    let advertised = match tls {
        Some(tls) => {
            builder = builder.tls_config(tls.config)?;
            tls.advertised
        }
        None => None,
    };

    // Terraform reads the handshake from stdout; logs go to stderr
    println!("{}", handshake_line(port, advertised.as_deref()));
    tracing::info!(port, tls = advertised.is_some(), "provider server listening");

    // go-plugin servers leave interrupt handling to Terraform
    tokio::spawn(async {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("ignoring interrupt signal");
        }
    });

    let mut signal_rx = shutdown_rx.clone();
    let signal = async move {
        let _ = signal_rx.wait_for(|stop| *stop).await;
    };

    let server = builder
        .add_service(controller)
        .add_service(provider_service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal);
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map_err(TfplugError::from),
        _ = shutdown_rx.wait_for(|stop| *stop) => {}
    }

    let timeout = config.shutdown_timeout;
    tracing::info!(?timeout, "draining in-flight requests");
    match tokio::time::timeout(timeout, server).await {
        Ok(result) => result.map_err(TfplugError::from),
        Err(_) => {
            tracing::warn!("shutdown timeout elapsed, exiting");
            Ok(())
        }
    }
}

/// Convenience function to run a provider with default configuration
pub async fn serve_default<P: Provider + 'static>(provider: P) -> Result<()> {
    serve(provider, ServerConfig::default()).await
}
