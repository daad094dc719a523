//! Outbound delivery of wire frames over short-lived TCP connections.
//!
//! Each delivery opens a fresh connection, writes one newline-terminated
//! frame, and closes. There is no retry: a failed delivery surfaces as a
//! transport error and the caller decides whether it aborts the whole send
//! (direct messages) or just skips one recipient (group fan-out).

use std::net::SocketAddr;
use std::time::Duration;

use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::transport::frame::Frame;
use crate::utils::{Result, TransportError};

/// Deliver one frame to a peer address
///
/// # Arguments
///
/// * `addr` - The recipient's listening address
/// * `frame` - The frame to write
/// * `connect_timeout` - How long to wait for the connection to establish
///
/// # Errors
///
/// Returns `TransportError::Timeout` if the connection does not establish in
/// time, `TransportError::Connect` if it is refused, and an I/O error if the
/// write fails mid-frame
pub async fn deliver(addr: SocketAddr, frame: &Frame, connect_timeout: Duration) -> Result<()> {
    let mut stream = match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return Err(TransportError::Connect {
                addr: addr.to_string(),
                reason: e.to_string(),
            }
            .into());
        }
        Err(_) => {
            return Err(TransportError::Timeout {
                addr: addr.to_string(),
            }
            .into());
        }
    };

    let mut line = frame.encode();
    line.push('\n');

    stream.write_all(line.as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await?;

    debug!("Delivered frame to {}", addr);
    Ok(())
}
