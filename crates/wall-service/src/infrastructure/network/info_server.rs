//! TCP responder that tells clients how to reach the service.
//!
//! Every accepted connection receives one length-prefixed [`ServiceInfo`]
//! frame and is then closed. The responder needs no request, so a client can
//! query it with nothing but a host and port.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wall_core::ServiceInfo;

/// Error type for the info responder.
#[derive(Debug, Error)]
pub enum InfoServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind info responder on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The service info could not be serialised.
    #[error("failed to encode service info: {0}")]
    Encode(#[from] bincode::Error),
}

/// A running responder.
pub struct InfoServer {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl InfoServer {
    /// Binds `bind_address:port` (port 0 picks a free port) and starts
    /// answering connections with `info` on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`InfoServerError::BindFailed`] if the socket cannot be bound.
    pub async fn start(
        bind_address: &str,
        port: u16,
        info: &ServiceInfo,
    ) -> Result<Self, InfoServerError> {
        let addr = format!("{bind_address}:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| InfoServerError::BindFailed {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| InfoServerError::BindFailed { addr, source })?;
        let frame = info.to_frame()?;

        let task = tokio::spawn(async move {
            loop {
                let (mut stream, peer) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("info responder accept error: {e}");
                        continue;
                    }
                };
                let frame = frame.clone();
                tokio::spawn(async move {
                    match stream.write_all(&frame).await {
                        Ok(()) => debug!(%peer, "service info sent"),
                        Err(e) => warn!(%peer, "failed to send service info: {e}"),
                    }
                    let _ = stream.shutdown().await;
                });
            }
        });

        info!(addr = %local_addr, endpoint = %info.endpoint_name, "service info responder listening");
        Ok(Self { local_addr, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections.
    pub fn shutdown(self) {
        self.task.abort();
    }
}
