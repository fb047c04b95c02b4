//! Listener-side teardown.
//!
//! Holds the sockets the listener process owns so a teardown request can
//! release them. Each release step runs even if an earlier one failed or had
//! nothing to do.

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::net::listener::ValidationListener;

/// Sockets owned by the listener process.
pub struct TeardownHandles {
    listener: Option<ValidationListener>,
    connection: Option<TcpStream>,
}

/// What `release` found to close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub connection_closed: bool,
    pub listener_closed: bool,
}

impl TeardownHandles {
    pub fn new(listener: ValidationListener) -> Self {
        Self {
            listener: Some(listener),
            connection: None,
        }
    }

    pub fn listener(&self) -> Option<&ValidationListener> {
        self.listener.as_ref()
    }

    /// Track the connection currently being answered.
    pub fn set_connection(&mut self, stream: TcpStream) {
        self.connection = Some(stream);
    }

    /// Shut down the live connection, then close the listening socket.
    pub async fn release(&mut self) -> ReleaseReport {
        let mut report = ReleaseReport::default();

        if let Some(mut stream) = self.connection.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(error = %e, "Live connection shutdown failed");
            }
            drop(stream);
            report.connection_closed = true;
        }

        if let Some(listener) = self.listener.take() {
            match listener.local_addr() {
                Ok(addr) => tracing::info!(address = %addr, "Closing validation listener"),
                Err(e) => tracing::debug!(error = %e, "Closing validation listener"),
            }
            drop(listener);
            report.listener_closed = true;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn releases_listener_without_live_connection() {
        let listener = ValidationListener::bind("127.0.0.1:0".parse().unwrap(), 1).unwrap();
        let addr = listener.local_addr().unwrap();
        let mut handles = TeardownHandles::new(listener);

        let report = handles.release().await;
        assert_eq!(
            report,
            ReleaseReport {
                connection_closed: false,
                listener_closed: true
            }
        );
        assert!(handles.listener().is_none());

        // Port is free again.
        let rebound = std::net::TcpListener::bind(addr);
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn shuts_down_live_connection() {
        let listener = ValidationListener::bind("127.0.0.1:0".parse().unwrap(), 1).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let (server_side, _) = listener.accept().await.unwrap();

        let mut handles = TeardownHandles::new(listener);
        handles.set_connection(server_side);
        let report = handles.release().await;
        assert!(report.connection_closed);
        assert!(report.listener_closed);

        let mut buf = [0u8; 1];
        let read = tokio::io::AsyncReadExt::read(&mut client, &mut buf).await.unwrap();
        assert_eq!(read, 0);
    }

    #[tokio::test]
    async fn second_release_is_empty() {
        let listener = ValidationListener::bind("127.0.0.1:0".parse().unwrap(), 1).unwrap();
        let mut handles = TeardownHandles::new(listener);
        handles.release().await;
        assert_eq!(handles.release().await, ReleaseReport::default());
    }
}
