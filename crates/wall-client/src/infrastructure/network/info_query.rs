//! Asks a running service's info responder for its [`ServiceInfo`].

use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::warn;
use wall_core::protocol::service_info::MAX_SERVICE_INFO_LEN;
use wall_core::ServiceInfo;

/// How long a query may take before it is abandoned.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for the info query.
#[derive(Debug, Error)]
pub enum InfoQueryError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error reading service info: {0}")]
    Io(#[from] std::io::Error),

    #[error("service info of {0} bytes exceeds the limit")]
    TooLarge(usize),

    #[error("malformed service info: {0}")]
    Decode(#[from] bincode::Error),

    #[error("no answer from {0} within the timeout")]
    TimedOut(String),
}

/// Connects to `host:port` and reads one length-prefixed record.
///
/// # Errors
///
/// See [`InfoQueryError`].
pub async fn fetch_service_info(host: &str, port: u16) -> Result<ServiceInfo, InfoQueryError> {
    let addr = format!("{host}:{port}");
    timeout(QUERY_TIMEOUT, read_record(&addr))
        .await
        .map_err(|_| InfoQueryError::TimedOut(addr.clone()))?
}

async fn read_record(addr: &str) -> Result<ServiceInfo, InfoQueryError> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|source| InfoQueryError::Connect {
            addr: addr.to_string(),
            source,
        })?;

    let mut len = [0u8; 4];
    stream.read_exact(&mut len).await?;
    let len = u32::from_le_bytes(len) as usize;
    if len > MAX_SERVICE_INFO_LEN {
        return Err(InfoQueryError::TooLarge(len));
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(ServiceInfo::from_frame_body(&body)?)
}

/// Like [`fetch_service_info`], but a service that cannot be reached is
/// reported as [`ServiceInfo::unavailable`] (zero total pixels).
pub async fn query_service_info(host: &str, port: u16) -> ServiceInfo {
    match fetch_service_info(host, port).await {
        Ok(info) => info,
        Err(e) => {
            warn!(host, port, "service info query failed: {e}");
            ServiceInfo::unavailable()
        }
    }
}
