//! Validation port listener.
//!
//! # Responsibilities
//! - Bind the validation port with a small backlog
//! - Classify bind failures into the outcomes the parent understands
//! - Accept incoming TCP connections

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::lifecycle::control::ControlMessage;

/// Why the validation port could not be bound.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Permission denied binding validation port: {0}")]
    PermissionDenied(#[source] io::Error),

    #[error("Validation port already in use: {0}")]
    AddressInUse(#[source] io::Error),

    #[error("Failed to bind validation port: {0}")]
    Other(#[source] io::Error),
}

impl BindError {
    pub fn classify(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => BindError::PermissionDenied(error),
            io::ErrorKind::AddrInUse => BindError::AddressInUse(error),
            _ => BindError::Other(error),
        }
    }

    /// Control message to report, if this failure is one the parent expects.
    pub fn outcome(&self) -> Option<ControlMessage> {
        match self {
            BindError::PermissionDenied(_) => Some(ControlMessage::CannotBind),
            BindError::AddressInUse(_) => Some(ControlMessage::InUse),
            BindError::Other(_) => None,
        }
    }

    /// Exit status for the listener process.
    pub fn exit_code(&self) -> i32 {
        match self {
            BindError::PermissionDenied(_) | BindError::AddressInUse(_) => 1,
            BindError::Other(_) => 2,
        }
    }
}

/// Bound listening socket for the validation port.
pub struct ValidationListener {
    inner: TcpListener,
}

impl ValidationListener {
    /// Bind `addr` and start listening.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(addr: SocketAddr, backlog: u32) -> Result<Self, BindError> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(BindError::Other)?;

        socket.set_reuseaddr(true).map_err(BindError::Other)?;
        socket.bind(addr).map_err(BindError::classify)?;
        let inner = socket.listen(backlog).map_err(BindError::classify)?;

        tracing::info!(
            address = %addr,
            backlog,
            "Validation listener bound"
        );

        Ok(Self { inner })
    }

    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await?;
        tracing::debug!(peer_addr = %peer, "Connection accepted");
        Ok((stream, peer))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}
